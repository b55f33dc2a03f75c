/// GPU-rendered 3D skin preview
///
/// This module provides the real `SurfaceFactory` used by the viewer, built
/// on wgpu and a small WGSL shader.
///
/// Architecture:
/// - `shaders.rs` - WGSL shader source code
/// - `model.rs` - player model geometry and UV layout
/// - `pipeline.rs` - device setup, offscreen targets, draw + readback

pub mod model;
pub mod pipeline;
pub mod shaders;

pub use pipeline::GpuSurfaceFactory;
