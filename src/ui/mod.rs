/// Host widgets
///
/// - `gallery.rs` - thumbnail grid with per-skin actions
/// - `controls.rs` - mouse overlay that drives the viewer camera

pub mod controls;
pub mod gallery;

pub use controls::OrbitControls;
pub use gallery::GalleryItem;
