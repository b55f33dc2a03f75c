use iced::widget::{button, canvas, column, container, image, responsive, row, scrollable, stack, text, Column, Space};
use iced::{Alignment, Element, Length, Subscription, Task, Theme};
use rfd::FileDialog;
use std::path::PathBuf;
use std::time::Duration;

mod config;
mod error;
mod gpu;
mod logging;
mod store;
mod ui;
mod viewport;

use config::Settings;
use error::{StoreError, ViewportError};
use store::{AssetId, AssetStore, SkinPayload, SqliteStore};
use ui::{GalleryItem, OrbitControls};
use viewport::{DisplayRegion, GeometryObserver, SurfaceSize, ViewportManager};

/// How often the viewer panel picks up newly presented frames
const FRAME_POLL: Duration = Duration::from_millis(33);

/// Main application state
struct SkinShelf {
    settings: Settings,
    /// The skin collection
    store: AssetStore,
    /// Last projection of the store's mirror, in upload order
    gallery: Vec<GalleryItem>,
    /// Why the store could not be opened, if it could not
    store_error: Option<String>,
    selected: Option<AssetId>,
    /// `None` until the GPU is ready (or forever, if it never is)
    viewer: Option<ViewportManager>,
    /// Publishes the viewer panel size to the viewport
    observer: GeometryObserver,
    /// Frames presented by the live surface
    region: DisplayRegion,
    frame: Option<image::Handle>,
    frame_version: u64,
    /// Status message to display to the user
    status: String,
}

/// Application messages (events)
#[derive(Debug, Clone)]
pub enum Message {
    /// Store opened (or reloaded); its mirror as gallery items
    StoreReady(Result<Vec<GalleryItem>, StoreError>),
    RetryStore,
    /// User clicked "Upload skins"
    Upload,
    Uploaded(UploadReport),
    Select(AssetId),
    AssetShown(Result<(), ViewportError>),
    Delete(AssetId),
    /// Removed id plus the gallery after the removal
    Deleted(Result<(AssetId, Vec<GalleryItem>), StoreError>),
    Download(AssetId),
    Exported(Result<PathBuf, String>),
    ViewerReady(Result<ViewportManager, ViewportError>),
    /// Poll the display region for a new frame
    Tick,
    Orbit(f32, f32),
    Zoom(f32),
    DismissNotice,
}

/// Outcome of one multi-file upload
#[derive(Debug, Clone)]
pub struct UploadReport {
    added: usize,
    /// One message per rejected file
    failures: Vec<String>,
    gallery: Result<Vec<GalleryItem>, StoreError>,
}

impl SkinShelf {
    /// Create a new instance of the application
    fn new(settings: Settings) -> (Self, Task<Message>) {
        let store = AssetStore::new();
        let observer = GeometryObserver::new();
        let region = DisplayRegion::new();

        let tasks = Task::batch([
            open_store(store.clone()),
            Task::perform(
                start_viewer(region.clone(), observer.clone(), settings.viewer),
                Message::ViewerReady,
            ),
        ]);

        (
            SkinShelf {
                settings,
                store,
                gallery: Vec::new(),
                store_error: None,
                selected: None,
                viewer: None,
                observer,
                region,
                frame: None,
                frame_version: 0,
                status: "Opening skin library...".to_string(),
            },
            tasks,
        )
    }

    fn payload_of(&self, id: AssetId) -> Option<SkinPayload> {
        self.gallery
            .iter()
            .find(|item| item.record.id == id)
            .map(|item| item.record.payload.clone())
    }

    fn show(&self, payload: Option<SkinPayload>) -> Task<Message> {
        match self.viewer.clone() {
            Some(viewer) => Task::perform(
                async move { viewer.set_asset(payload).await },
                Message::AssetShown,
            ),
            None => Task::none(),
        }
    }

    /// Handle application messages and update state
    fn update(&mut self, message: Message) -> Task<Message> {
        match message {
            Message::StoreReady(Ok(gallery)) => {
                self.store_error = None;
                self.status = format!("Ready. {} skins in library.", gallery.len());
                self.gallery = gallery;
                if let Some(id) = self.selected {
                    if self.payload_of(id).is_none() {
                        self.selected = None;
                        return self.show(None);
                    }
                }
                Task::none()
            }
            Message::StoreReady(Err(e)) => {
                self.status = format!("❌ {}", e);
                self.store_error = Some(e.to_string());
                Task::none()
            }
            Message::RetryStore => {
                self.status = "Opening skin library...".to_string();
                open_store(self.store.clone())
            }
            Message::Upload => {
                // Show the native file picker dialog
                let picked = FileDialog::new()
                    .set_title("Select skin images")
                    .add_filter("Images", &["png", "jpg", "jpeg", "gif", "bmp", "webp"])
                    .pick_files();

                match picked {
                    Some(paths) if !paths.is_empty() => {
                        self.status = format!("Uploading {} file(s)...", paths.len());
                        Task::perform(
                            upload_files(self.store.clone(), paths, self.gallery.clone()),
                            Message::Uploaded,
                        )
                    }
                    _ => Task::none(),
                }
            }
            Message::Uploaded(report) => {
                for failure in &report.failures {
                    log::warn!("⚠️  Upload rejected: {}", failure);
                }
                match report.gallery {
                    Ok(gallery) => self.gallery = gallery,
                    Err(e) => log::error!("❌ Gallery not refreshed: {}", e),
                }

                self.status = match report.failures.first() {
                    None => format!("✅ Added {} skin(s).", report.added),
                    Some(first) => format!(
                        "Added {} skin(s), {} failed: {}",
                        report.added,
                        report.failures.len(),
                        first
                    ),
                };
                Task::none()
            }
            Message::Select(id) => {
                let Some(payload) = self.payload_of(id) else {
                    return Task::none();
                };
                self.selected = Some(id);
                self.show(Some(payload))
            }
            Message::AssetShown(Ok(())) | Message::AssetShown(Err(ViewportError::Superseded)) => {
                Task::none()
            }
            Message::AssetShown(Err(e)) => {
                self.status = format!("⚠️  Could not show skin: {}", e);
                Task::none()
            }
            Message::Delete(id) => {
                let Some(payload) = self.payload_of(id) else {
                    return Task::none();
                };
                let store = self.store.clone();
                let previous = self.gallery.clone();
                Task::perform(
                    async move {
                        let removed = store.remove(payload).await?;
                        let gallery = ui::gallery::sync(&store, previous).await?;
                        Ok((removed, gallery))
                    },
                    Message::Deleted,
                )
            }
            Message::Deleted(Ok((removed, gallery))) => {
                self.gallery = gallery;
                self.status = format!("🗑️  Deleted skin {}.", removed);
                if self.selected == Some(removed) {
                    self.selected = None;
                    return self.show(None);
                }
                Task::none()
            }
            Message::Deleted(Err(StoreError::NotFound)) => {
                // Someone else got there first; resync with the store
                let store = self.store.clone();
                let previous = self.gallery.clone();
                Task::perform(
                    async move {
                        store.load_all().await?;
                        ui::gallery::sync(&store, previous).await
                    },
                    Message::StoreReady,
                )
            }
            Message::Deleted(Err(e)) => {
                self.status = format!("❌ Delete failed: {}", e);
                Task::none()
            }
            Message::Download(id) => {
                let Some(payload) = self.payload_of(id) else {
                    return Task::none();
                };
                let target = FileDialog::new()
                    .set_title("Save skin")
                    .set_file_name(payload.suggested_file_name())
                    .save_file();

                match target {
                    Some(path) => Task::perform(
                        async move {
                            payload
                                .export(&path)
                                .await
                                .map(|()| path)
                                .map_err(|e| e.to_string())
                        },
                        Message::Exported,
                    ),
                    None => Task::none(),
                }
            }
            Message::Exported(Ok(path)) => {
                self.status = format!("💾 Saved {}", path.display());
                Task::none()
            }
            Message::Exported(Err(e)) => {
                self.status = format!("❌ Download failed: {}", e);
                Task::none()
            }
            Message::ViewerReady(Ok(viewer)) => {
                log::info!("🖼️  3D preview ready");
                self.viewer = Some(viewer);
                let selection = self.selected.and_then(|id| self.payload_of(id));
                match selection {
                    Some(payload) => self.show(Some(payload)),
                    None => Task::none(),
                }
            }
            Message::ViewerReady(Err(e)) => {
                log::error!("❌ 3D preview unavailable: {}", e);
                self.status = format!("3D preview unavailable: {}", e);
                Task::none()
            }
            Message::Tick => {
                let version = self.region.version();
                if version != self.frame_version {
                    self.frame_version = version;
                    self.frame = self.region.frame().map(|frame| {
                        image::Handle::from_rgba(
                            frame.size.width,
                            frame.size.height,
                            frame.rgba.to_vec(),
                        )
                    });
                }
                Task::none()
            }
            Message::Orbit(yaw, pitch) => {
                if let Some(viewer) = &self.viewer {
                    if let Err(e) = viewer.orbit(yaw, pitch) {
                        log::debug!("orbit dropped: {}", e);
                    }
                }
                Task::none()
            }
            Message::Zoom(delta) => {
                if let Some(viewer) = &self.viewer {
                    if let Err(e) = viewer.zoom(delta) {
                        log::debug!("zoom dropped: {}", e);
                    }
                }
                Task::none()
            }
            Message::DismissNotice => {
                self.settings.notice_dismissed = true;
                if let Some(path) = config::settings_path() {
                    if let Err(e) = self.settings.save(&path) {
                        log::warn!("⚠️  Could not save settings: {}", e);
                    }
                }
                Task::none()
            }
        }
    }

    /// Build the user interface
    fn view(&self) -> Element<Message> {
        let can_upload = self.store_error.is_none();
        let header = row![
            text("Skin Shelf").size(32),
            Space::with_width(Length::Fill),
            button("Upload skins")
                .on_press_maybe(can_upload.then_some(Message::Upload))
                .padding(10),
        ]
        .align_y(Alignment::Center);

        let notice = (!self.settings.notice_dismissed).then(|| {
            container(
                row![
                    text("Skins are stored locally on this device and never leave it.").size(14),
                    Space::with_width(Length::Fill),
                    button(text("Got it").size(14)).on_press(Message::DismissNotice),
                ]
                .align_y(Alignment::Center),
            )
            .padding(10)
            .style(container::rounded_box)
        });

        let retry = self.store_error.as_ref().map(|_| {
            row![
                text("The skin library could not be opened.").size(14),
                button(text("Retry").size(14)).on_press(Message::RetryStore),
            ]
            .spacing(10)
            .align_y(Alignment::Center)
        });

        let body = row![
            container(self.viewer_panel())
                .width(Length::FillPortion(3))
                .height(Length::Fill)
                .style(container::bordered_box),
            scrollable(ui::gallery::view(&self.gallery, self.selected))
                .width(Length::FillPortion(7))
                .height(Length::Fill),
        ]
        .spacing(20);

        let content: Column<Message> = column![header]
            .push_maybe(notice)
            .push_maybe(retry)
            .push(body)
            .push(text(&self.status).size(14))
            .spacing(16)
            .padding(20);

        container(content)
            .width(Length::Fill)
            .height(Length::Fill)
            .into()
    }

    fn viewer_panel(&self) -> Element<Message> {
        responsive(move |size| {
            // Measured during layout; the observer only publishes real changes
            self.observer
                .observe(SurfaceSize::from_measured(size.width, size.height));

            let overlay: Element<Message> = if self.selected.is_none() {
                container(text("Select a skin from the library").size(16))
                    .center(Length::Fill)
                    .into()
            } else {
                canvas(OrbitControls::from(&self.settings.viewer))
                    .width(Length::Fill)
                    .height(Length::Fill)
                    .into()
            };

            match &self.frame {
                Some(frame) => stack![
                    image(frame.clone()).width(Length::Fill).height(Length::Fill),
                    overlay,
                ]
                .into(),
                None => overlay,
            }
        })
        .into()
    }

    fn subscription(&self) -> Subscription<Message> {
        if self.viewer.is_some() {
            iced::time::every(FRAME_POLL).map(|_| Message::Tick)
        } else {
            Subscription::none()
        }
    }

    /// Set the application theme
    fn theme(&self) -> Theme {
        Theme::Dark
    }
}

fn main() -> iced::Result {
    let settings = Settings::load_default();
    logging::init_logging(logging::LoggingConfig {
        env_filter: settings.log_filter.clone(),
        ..Default::default()
    });

    iced::application("Skin Shelf", SkinShelf::update, SkinShelf::view)
        .subscription(SkinShelf::subscription)
        .theme(SkinShelf::theme)
        .centered()
        .run_with(move || SkinShelf::new(settings))
}

/// Open the on-disk library and build the gallery from everything in it
fn open_store(store: AssetStore) -> Task<Message> {
    Task::perform(
        async move {
            let path = config::database_path().ok_or_else(|| {
                StoreError::Unavailable("no per-user data directory".to_string())
            })?;
            store.initialize(move || SqliteStore::open(&path)).await?;
            ui::gallery::sync(&store, Vec::new()).await
        },
        Message::StoreReady,
    )
}

/// Bring up the GPU and attach the viewport to the viewer panel
async fn start_viewer(
    region: DisplayRegion,
    observer: GeometryObserver,
    settings: config::ViewerSettings,
) -> Result<ViewportManager, ViewportError> {
    let factory = gpu::GpuSurfaceFactory::new(&settings).await?;
    Ok(ViewportManager::attach(factory, region, &observer, settings))
}

/// Validate and store every picked file, one at a time, then refresh the
/// gallery from the store
async fn upload_files(
    store: AssetStore,
    paths: Vec<PathBuf>,
    previous: Vec<GalleryItem>,
) -> UploadReport {
    let mut added = 0;
    let mut failures = Vec::new();
    for path in paths {
        let result = match SkinPayload::read_file(&path).await {
            Ok(payload) => store.add(payload).await.map_err(|e| e.to_string()),
            Err(e) => Err(e.to_string()),
        };
        match result {
            Ok(_) => added += 1,
            Err(e) => failures.push(format!("{}: {}", path.display(), e)),
        }
    }

    UploadReport {
        added,
        failures,
        gallery: ui::gallery::sync(&store, previous).await,
    }
}
