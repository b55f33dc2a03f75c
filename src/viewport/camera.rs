/// Orbit camera for the skin preview
///
/// The model stands on the origin, 32 units tall, facing +Z. The camera
/// circles a point at chest height.

use cgmath::{perspective, Deg, Matrix4, Point3, Vector3};

use super::geometry::SurfaceSize;

/// wgpu clip space has z in [0, 1]; cgmath produces OpenGL's [-1, 1]
#[rustfmt::skip]
const OPENGL_TO_WGPU_MATRIX: Matrix4<f32> = Matrix4::new(
    1.0, 0.0, 0.0, 0.0,
    0.0, 1.0, 0.0, 0.0,
    0.0, 0.0, 0.5, 0.0,
    0.0, 0.0, 0.5, 1.0,
);

const TARGET: Point3<f32> = Point3::new(0.0, 16.0, 0.0);
const FIELD_OF_VIEW: f32 = 50.0;
const MIN_DISTANCE: f32 = 20.0;
const MAX_DISTANCE: f32 = 120.0;
const PITCH_LIMIT: f32 = std::f32::consts::FRAC_PI_2 - 0.05;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Camera {
    /// Radians around the vertical axis, 0 = looking at the model's face
    pub yaw: f32,
    /// Radians above the horizon
    pub pitch: f32,
    /// Distance from the orbit target in model units
    pub distance: f32,
}

impl Default for Camera {
    fn default() -> Self {
        Self {
            yaw: 0.5,
            pitch: 0.2,
            distance: 55.0,
        }
    }
}

impl Camera {
    /// Rotate around the model; pitch stops just short of straight up/down
    pub fn orbit(&mut self, delta_yaw: f32, delta_pitch: f32) {
        self.yaw = (self.yaw + delta_yaw).rem_euclid(std::f32::consts::TAU);
        self.pitch = (self.pitch + delta_pitch).clamp(-PITCH_LIMIT, PITCH_LIMIT);
    }

    /// Positive `delta` moves closer
    pub fn zoom(&mut self, delta: f32) {
        self.distance = (self.distance - delta).clamp(MIN_DISTANCE, MAX_DISTANCE);
    }

    pub fn eye(&self) -> Point3<f32> {
        let (sin_yaw, cos_yaw) = self.yaw.sin_cos();
        let (sin_pitch, cos_pitch) = self.pitch.sin_cos();
        TARGET
            + Vector3::new(cos_pitch * sin_yaw, sin_pitch, cos_pitch * cos_yaw) * self.distance
    }

    /// Combined view-projection matrix for a surface of `size`
    pub fn view_projection(&self, size: SurfaceSize) -> Matrix4<f32> {
        let view = Matrix4::look_at_rh(self.eye(), TARGET, Vector3::unit_y());
        let projection = perspective(Deg(FIELD_OF_VIEW), size.aspect(), 1.0, 500.0);
        OPENGL_TO_WGPU_MATRIX * projection * view
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cgmath::{InnerSpace, Vector4};

    #[test]
    fn test_pitch_is_clamped() {
        let mut camera = Camera::default();
        camera.orbit(0.0, 10.0);
        assert_eq!(camera.pitch, PITCH_LIMIT);
        camera.orbit(0.0, -20.0);
        assert_eq!(camera.pitch, -PITCH_LIMIT);
    }

    #[test]
    fn test_zoom_is_clamped() {
        let mut camera = Camera::default();
        camera.zoom(1000.0);
        assert_eq!(camera.distance, MIN_DISTANCE);
        camera.zoom(-1000.0);
        assert_eq!(camera.distance, MAX_DISTANCE);
    }

    #[test]
    fn test_eye_keeps_distance() {
        let mut camera = Camera::default();
        camera.orbit(1.3, 0.4);
        let offset = camera.eye() - TARGET;
        assert!((offset.magnitude() - camera.distance).abs() < 1e-3);
    }

    #[test]
    fn test_target_projects_to_screen_centre() {
        let camera = Camera::default();
        let clip = camera.view_projection(SurfaceSize::new(300, 600))
            * Vector4::new(TARGET.x, TARGET.y, TARGET.z, 1.0);
        let ndc = clip.truncate() / clip.w;
        assert!(ndc.x.abs() < 1e-4);
        assert!(ndc.y.abs() < 1e-4);
        assert!(ndc.z > 0.0 && ndc.z < 1.0);
    }
}
