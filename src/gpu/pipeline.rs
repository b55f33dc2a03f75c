/// wgpu rendering surface for the skin preview
///
/// This module manages all the wgpu boilerplate:
/// - Device and queue initialization (once, shared by every surface)
/// - Offscreen color + depth targets sized to the viewer container
/// - Skin texture uploads
/// - Camera uniform buffer
/// - Draw + readback into the display region

// Use wgpu from iced to avoid dependency conflicts
use iced_wgpu::wgpu;
use std::sync::Arc;
use wgpu::util::DeviceExt;

use crate::config::ViewerSettings;
use crate::error::ViewportError;
use crate::viewport::{Camera, Frame, RenderSurface, SkinTexture, SurfaceFactory, SurfaceSize, SurfaceTarget};

use super::model;

const COLOR_FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::Rgba8Unorm;
const DEPTH_FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::Depth32Float;

/// Device state shared by every surface the factory creates
struct GpuContext {
    device: wgpu::Device,
    queue: wgpu::Queue,
    pipeline: wgpu::RenderPipeline,
    camera_layout: wgpu::BindGroupLayout,
    skin_layout: wgpu::BindGroupLayout,
    sampler: wgpu::Sampler,
    modern_model: wgpu::Buffer,
    modern_vertices: u32,
    legacy_model: wgpu::Buffer,
    legacy_vertices: u32,
    background: wgpu::Color,
}

/// Creates GPU surfaces on one shared device
#[derive(Clone)]
pub struct GpuSurfaceFactory {
    context: Arc<GpuContext>,
}

// Manual Debug implementation (wgpu types don't implement Debug)
impl std::fmt::Debug for GpuSurfaceFactory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GpuSurfaceFactory")
            .field("max_texture", &self.context.device.limits().max_texture_dimension_2d)
            .finish_non_exhaustive()
    }
}

impl GpuSurfaceFactory {
    /// Acquire an adapter and device and build the skin pipeline
    pub async fn new(settings: &ViewerSettings) -> Result<Self, ViewportError> {
        let instance = wgpu::Instance::new(wgpu::InstanceDescriptor {
            backends: wgpu::Backends::all(),
            ..Default::default()
        });

        let adapter = instance
            .request_adapter(&wgpu::RequestAdapterOptions {
                power_preference: wgpu::PowerPreference::LowPower,
                compatible_surface: None,
                force_fallback_adapter: false,
            })
            .await
            .ok_or_else(|| {
                ViewportError::GpuUnavailable("Failed to find suitable GPU adapter".to_string())
            })?;
        log::info!("🎮 Using GPU adapter: {}", adapter.get_info().name);

        let (device, queue) = adapter
            .request_device(
                &wgpu::DeviceDescriptor {
                    label: Some("Skin Viewer Device"),
                    required_features: wgpu::Features::empty(),
                    required_limits: wgpu::Limits::default(),
                },
                None,
            )
            .await
            .map_err(|e| ViewportError::GpuUnavailable(format!("Failed to create device: {}", e)))?;

        let camera_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("Camera Bind Group Layout"),
            entries: &[wgpu::BindGroupLayoutEntry {
                binding: 0,
                visibility: wgpu::ShaderStages::VERTEX,
                ty: wgpu::BindingType::Buffer {
                    ty: wgpu::BufferBindingType::Uniform,
                    has_dynamic_offset: false,
                    min_binding_size: None,
                },
                count: None,
            }],
        });

        let skin_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("Skin Bind Group Layout"),
            entries: &[
                wgpu::BindGroupLayoutEntry {
                    binding: 0,
                    visibility: wgpu::ShaderStages::FRAGMENT,
                    ty: wgpu::BindingType::Texture {
                        sample_type: wgpu::TextureSampleType::Float { filterable: true },
                        view_dimension: wgpu::TextureViewDimension::D2,
                        multisampled: false,
                    },
                    count: None,
                },
                wgpu::BindGroupLayoutEntry {
                    binding: 1,
                    visibility: wgpu::ShaderStages::FRAGMENT,
                    ty: wgpu::BindingType::Sampler(wgpu::SamplerBindingType::Filtering),
                    count: None,
                },
            ],
        });

        // Nearest filtering keeps skin pixels crisp
        let sampler = device.create_sampler(&wgpu::SamplerDescriptor {
            label: Some("Skin Sampler"),
            address_mode_u: wgpu::AddressMode::ClampToEdge,
            address_mode_v: wgpu::AddressMode::ClampToEdge,
            address_mode_w: wgpu::AddressMode::ClampToEdge,
            mag_filter: wgpu::FilterMode::Nearest,
            min_filter: wgpu::FilterMode::Nearest,
            mipmap_filter: wgpu::FilterMode::Nearest,
            ..Default::default()
        });

        let shader = device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label: Some("Skin Shader"),
            source: wgpu::ShaderSource::Wgsl(super::shaders::get_shader().into()),
        });

        let pipeline_layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some("Skin Pipeline Layout"),
            bind_group_layouts: &[&camera_layout, &skin_layout],
            push_constant_ranges: &[],
        });

        let pipeline = device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
            label: Some("Skin Render Pipeline"),
            layout: Some(&pipeline_layout),
            vertex: wgpu::VertexState {
                module: &shader,
                entry_point: "vs_main",
                buffers: &[model::Vertex::layout()],
            },
            fragment: Some(wgpu::FragmentState {
                module: &shader,
                entry_point: "fs_main",
                targets: &[Some(wgpu::ColorTargetState {
                    format: COLOR_FORMAT,
                    blend: Some(wgpu::BlendState::REPLACE),
                    write_mask: wgpu::ColorWrites::ALL,
                })],
            }),
            primitive: wgpu::PrimitiveState {
                topology: wgpu::PrimitiveTopology::TriangleList,
                strip_index_format: None,
                front_face: wgpu::FrontFace::Ccw,
                cull_mode: None, // Overlay layers must be visible from inside too
                unclipped_depth: false,
                polygon_mode: wgpu::PolygonMode::Fill,
                conservative: false,
            },
            depth_stencil: Some(wgpu::DepthStencilState {
                format: DEPTH_FORMAT,
                depth_write_enabled: true,
                depth_compare: wgpu::CompareFunction::Less,
                stencil: wgpu::StencilState::default(),
                bias: wgpu::DepthBiasState::default(),
            }),
            multisample: wgpu::MultisampleState {
                count: 1,
                mask: !0,
                alpha_to_coverage_enabled: false,
            },
            multiview: None,
        });

        let modern = model::build(false);
        let legacy = model::build(true);
        let modern_model = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some("Player Model (64x64)"),
            contents: bytemuck::cast_slice(&modern),
            usage: wgpu::BufferUsages::VERTEX,
        });
        let legacy_model = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some("Player Model (64x32)"),
            contents: bytemuck::cast_slice(&legacy),
            usage: wgpu::BufferUsages::VERTEX,
        });

        let [r, g, b] = settings.background_rgb();
        log::debug!("skin pipeline ready");

        Ok(Self {
            context: Arc::new(GpuContext {
                device,
                queue,
                pipeline,
                camera_layout,
                skin_layout,
                sampler,
                modern_model,
                modern_vertices: modern.len() as u32,
                legacy_model,
                legacy_vertices: legacy.len() as u32,
                background: wgpu::Color { r, g, b, a: 1.0 },
            }),
        })
    }
}

impl SurfaceFactory for GpuSurfaceFactory {
    type Surface = GpuSurface;

    fn create(
        &mut self,
        size: SurfaceSize,
        target: SurfaceTarget,
    ) -> Result<GpuSurface, ViewportError> {
        let context = &self.context;
        let max = context.device.limits().max_texture_dimension_2d;
        if size.width > max || size.height > max {
            return Err(ViewportError::SurfaceCreateFailed {
                width: size.width,
                height: size.height,
                reason: format!("larger than the GPU limit of {}", max),
            });
        }

        let extent = wgpu::Extent3d {
            width: size.width,
            height: size.height,
            depth_or_array_layers: 1,
        };

        let color = context.device.create_texture(&wgpu::TextureDescriptor {
            label: Some("Viewer Color Target"),
            size: extent,
            mip_level_count: 1,
            sample_count: 1,
            dimension: wgpu::TextureDimension::D2,
            format: COLOR_FORMAT,
            usage: wgpu::TextureUsages::RENDER_ATTACHMENT | wgpu::TextureUsages::COPY_SRC,
            view_formats: &[],
        });

        let depth = context.device.create_texture(&wgpu::TextureDescriptor {
            label: Some("Viewer Depth Target"),
            size: extent,
            mip_level_count: 1,
            sample_count: 1,
            dimension: wgpu::TextureDimension::D2,
            format: DEPTH_FORMAT,
            usage: wgpu::TextureUsages::RENDER_ATTACHMENT,
            view_formats: &[],
        });

        let identity: [[f32; 4]; 4] = cgmath::Matrix4::from_scale(1.0).into();
        let camera_buffer = context
            .device
            .create_buffer_init(&wgpu::util::BufferInitDescriptor {
                label: Some("Camera Uniform Buffer"),
                contents: bytemuck::cast_slice(&[identity]),
                usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
            });

        let camera_bind_group = context.device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("Camera Bind Group"),
            layout: &context.camera_layout,
            entries: &[wgpu::BindGroupEntry {
                binding: 0,
                resource: camera_buffer.as_entire_binding(),
            }],
        });

        log::debug!("GPU surface #{} allocated at {}", target.generation(), size);

        Ok(GpuSurface {
            context: context.clone(),
            target,
            size,
            color,
            depth,
            camera_buffer,
            camera_bind_group,
            skin: None,
        })
    }
}

/// Uploaded skin texture plus the model variant it needs
struct LoadedSkin {
    texture: wgpu::Texture,
    bind_group: wgpu::BindGroup,
    legacy: bool,
}

/// One offscreen render target bound to a display region
pub struct GpuSurface {
    context: Arc<GpuContext>,
    target: SurfaceTarget,
    size: SurfaceSize,
    color: wgpu::Texture,
    depth: wgpu::Texture,
    camera_buffer: wgpu::Buffer,
    camera_bind_group: wgpu::BindGroup,
    skin: Option<LoadedSkin>,
}

impl std::fmt::Debug for GpuSurface {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GpuSurface")
            .field("generation", &self.target.generation())
            .field("size", &self.size)
            .field("has_skin", &self.skin.is_some())
            .finish_non_exhaustive()
    }
}

impl GpuSurface {
    fn upload(&self, skin: &SkinTexture) -> LoadedSkin {
        let context = &self.context;
        let extent = wgpu::Extent3d {
            width: skin.width,
            height: skin.height,
            depth_or_array_layers: 1,
        };

        let texture = context.device.create_texture(&wgpu::TextureDescriptor {
            label: Some("Skin Texture"),
            size: extent,
            mip_level_count: 1,
            sample_count: 1,
            dimension: wgpu::TextureDimension::D2,
            format: wgpu::TextureFormat::Rgba8Unorm,
            usage: wgpu::TextureUsages::TEXTURE_BINDING | wgpu::TextureUsages::COPY_DST,
            view_formats: &[],
        });

        context.queue.write_texture(
            wgpu::ImageCopyTexture {
                texture: &texture,
                mip_level: 0,
                origin: wgpu::Origin3d::ZERO,
                aspect: wgpu::TextureAspect::All,
            },
            &skin.rgba,
            wgpu::ImageDataLayout {
                offset: 0,
                bytes_per_row: Some(4 * skin.width),
                rows_per_image: Some(skin.height),
            },
            extent,
        );

        let view = texture.create_view(&wgpu::TextureViewDescriptor::default());
        let bind_group = context.device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("Skin Bind Group"),
            layout: &context.skin_layout,
            entries: &[
                wgpu::BindGroupEntry {
                    binding: 0,
                    resource: wgpu::BindingResource::TextureView(&view),
                },
                wgpu::BindGroupEntry {
                    binding: 1,
                    resource: wgpu::BindingResource::Sampler(&context.sampler),
                },
            ],
        });

        LoadedSkin {
            texture,
            bind_group,
            legacy: skin.is_legacy(),
        }
    }

    /// Copy the color target back to the CPU as tightly packed RGBA
    fn read_back(&self, encoder: &mut wgpu::CommandEncoder) -> wgpu::Buffer {
        let SurfaceSize { width, height } = self.size;
        let padded_bytes_per_row = (width * 4 + 255) & !255;

        let output_buffer = self.context.device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("Viewer Readback Buffer"),
            size: (padded_bytes_per_row * height) as u64,
            usage: wgpu::BufferUsages::COPY_DST | wgpu::BufferUsages::MAP_READ,
            mapped_at_creation: false,
        });

        encoder.copy_texture_to_buffer(
            wgpu::ImageCopyTexture {
                texture: &self.color,
                mip_level: 0,
                origin: wgpu::Origin3d::ZERO,
                aspect: wgpu::TextureAspect::All,
            },
            wgpu::ImageCopyBuffer {
                buffer: &output_buffer,
                layout: wgpu::ImageDataLayout {
                    offset: 0,
                    bytes_per_row: Some(padded_bytes_per_row),
                    rows_per_image: Some(height),
                },
            },
            wgpu::Extent3d {
                width,
                height,
                depth_or_array_layers: 1,
            },
        );

        output_buffer
    }

    fn unpack(&self, output_buffer: &wgpu::Buffer) -> Result<Vec<u8>, ViewportError> {
        let SurfaceSize { width, height } = self.size;
        let padded_bytes_per_row = (width * 4 + 255) & !255;

        let buffer_slice = output_buffer.slice(..);
        let (tx, rx) = std::sync::mpsc::channel();
        buffer_slice.map_async(wgpu::MapMode::Read, move |result| {
            let _ = tx.send(result);
        });
        self.context.device.poll(wgpu::Maintain::Wait);
        rx.recv()
            .map_err(|e| ViewportError::GpuUnavailable(format!("Readback lost: {}", e)))?
            .map_err(|e| ViewportError::GpuUnavailable(format!("Readback failed: {}", e)))?;

        let data = buffer_slice.get_mapped_range();
        let mut output = Vec::with_capacity((width * height * 4) as usize);
        for y in 0..height {
            let start = (y * padded_bytes_per_row) as usize;
            let end = start + (width * 4) as usize;
            output.extend_from_slice(&data[start..end]);
        }

        drop(data);
        output_buffer.unmap();
        Ok(output)
    }
}

impl RenderSurface for GpuSurface {
    fn size(&self) -> SurfaceSize {
        self.size
    }

    fn load_skin(&mut self, skin: Option<&SkinTexture>) -> Result<(), ViewportError> {
        let next = skin.map(|skin| self.upload(skin));
        if let Some(previous) = std::mem::replace(&mut self.skin, next) {
            previous.texture.destroy();
        }
        Ok(())
    }

    fn render(&mut self, camera: &Camera) -> Result<(), ViewportError> {
        let context = &self.context;
        let view_proj: [[f32; 4]; 4] = camera.view_projection(self.size).into();
        context
            .queue
            .write_buffer(&self.camera_buffer, 0, bytemuck::cast_slice(&[view_proj]));

        let color_view = self.color.create_view(&wgpu::TextureViewDescriptor::default());
        let depth_view = self.depth.create_view(&wgpu::TextureViewDescriptor::default());
        let mut encoder = context
            .device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("Viewer Encoder"),
            });

        {
            let mut render_pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
                label: Some("Skin Render Pass"),
                color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                    view: &color_view,
                    resolve_target: None,
                    ops: wgpu::Operations {
                        load: wgpu::LoadOp::Clear(context.background),
                        store: wgpu::StoreOp::Store,
                    },
                })],
                depth_stencil_attachment: Some(wgpu::RenderPassDepthStencilAttachment {
                    view: &depth_view,
                    depth_ops: Some(wgpu::Operations {
                        load: wgpu::LoadOp::Clear(1.0),
                        store: wgpu::StoreOp::Store,
                    }),
                    stencil_ops: None,
                }),
                timestamp_writes: None,
                occlusion_query_set: None,
            });

            // Without a skin the empty scene is just the background
            if let Some(skin) = &self.skin {
                let (model, vertices) = if skin.legacy {
                    (&context.legacy_model, context.legacy_vertices)
                } else {
                    (&context.modern_model, context.modern_vertices)
                };
                render_pass.set_pipeline(&context.pipeline);
                render_pass.set_bind_group(0, &self.camera_bind_group, &[]);
                render_pass.set_bind_group(1, &skin.bind_group, &[]);
                render_pass.set_vertex_buffer(0, model.slice(..));
                render_pass.draw(0..vertices, 0..1);
            }
        }

        let output_buffer = self.read_back(&mut encoder);
        context.queue.submit(Some(encoder.finish()));
        let rgba = self.unpack(&output_buffer)?;
        output_buffer.destroy();

        self.target.present(Frame {
            size: self.size,
            rgba: rgba.into(),
        });
        Ok(())
    }

    fn dispose(self) {
        if let Some(skin) = &self.skin {
            skin.texture.destroy();
        }
        self.camera_buffer.destroy();
        self.depth.destroy();
        self.color.destroy();
        log::debug!("GPU surface #{} released", self.target.generation());
    }
}
