use iced::mouse::{self, Cursor};
use iced::widget::canvas::{self, Program};
use iced::{Point, Rectangle, Renderer, Theme};

use crate::config::ViewerSettings;
use crate::Message;

/// Radians of orbit per dragged pixel
const DRAG_SENSITIVITY: f32 = 0.01;

/// Transparent overlay on top of the viewer image.
/// Drags orbit the camera, the wheel zooms. Nothing is drawn.
#[derive(Debug, Clone, Copy)]
pub struct OrbitControls {
    pub rotate: bool,
    pub zoom: bool,
}

impl From<&ViewerSettings> for OrbitControls {
    fn from(settings: &ViewerSettings) -> Self {
        Self {
            rotate: settings.enable_rotate,
            zoom: settings.enable_zoom,
        }
    }
}

impl Program<Message> for OrbitControls {
    type State = DragState;

    fn draw(
        &self,
        _state: &Self::State,
        _renderer: &Renderer,
        _theme: &Theme,
        _bounds: Rectangle,
        _cursor: Cursor,
    ) -> Vec<canvas::Geometry> {
        // The rendered frame is the image underneath
        vec![]
    }

    fn update(
        &self,
        state: &mut Self::State,
        event: canvas::Event,
        bounds: Rectangle,
        cursor: Cursor,
    ) -> (canvas::event::Status, Option<Message>) {
        match event {
            canvas::Event::Mouse(mouse::Event::WheelScrolled { delta })
                if self.zoom && cursor.is_over(bounds) =>
            {
                let amount = match delta {
                    mouse::ScrollDelta::Lines { y, .. } => y * 4.0,
                    mouse::ScrollDelta::Pixels { y, .. } => y * 0.1,
                };
                return (canvas::event::Status::Captured, Some(Message::Zoom(amount)));
            }

            canvas::Event::Mouse(mouse::Event::ButtonPressed(mouse::Button::Left))
                if self.rotate =>
            {
                if let Some(position) = cursor.position_over(bounds) {
                    state.is_dragging = true;
                    state.last_position = Some(position);
                    return (canvas::event::Status::Captured, None);
                }
            }

            canvas::Event::Mouse(mouse::Event::ButtonReleased(mouse::Button::Left)) => {
                if state.is_dragging {
                    *state = DragState::default();
                    return (canvas::event::Status::Captured, None);
                }
            }

            canvas::Event::Mouse(mouse::Event::CursorMoved { position }) => {
                if let (true, Some(last)) = (state.is_dragging, state.last_position) {
                    state.last_position = Some(position);
                    let message = Message::Orbit(
                        -(position.x - last.x) * DRAG_SENSITIVITY,
                        (position.y - last.y) * DRAG_SENSITIVITY,
                    );
                    return (canvas::event::Status::Captured, Some(message));
                }
            }

            _ => {}
        }

        (canvas::event::Status::Ignored, None)
    }

    fn mouse_interaction(
        &self,
        state: &Self::State,
        bounds: Rectangle,
        cursor: Cursor,
    ) -> mouse::Interaction {
        if state.is_dragging {
            mouse::Interaction::Grabbing
        } else if self.rotate && cursor.is_over(bounds) {
            mouse::Interaction::Grab
        } else {
            mouse::Interaction::default()
        }
    }
}

/// State for drag interactions
#[derive(Debug, Clone, Default)]
pub struct DragState {
    pub is_dragging: bool,
    pub last_position: Option<Point>,
}
