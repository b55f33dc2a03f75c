/// 3D preview lifecycle module
///
/// Architecture:
/// - `geometry.rs` - container size values and the observer that publishes changes
/// - `camera.rs` - orbit camera shared by every surface
/// - `surface.rs` - rendering surface traits, decoded skin textures, the display region
/// - `manager.rs` - the actor that owns the one live surface
///
/// The GPU implementation of the surface traits lives in `crate::gpu`.

pub mod camera;
pub mod geometry;
pub mod manager;
pub mod surface;

pub use camera::Camera;
pub use geometry::{GeometryObserver, SurfaceSize};
pub use manager::{ViewportManager, ViewportPhase, ViewportStatus};
pub use surface::{DisplayRegion, Frame, RenderSurface, SkinTexture, SurfaceFactory, SurfaceTarget};
