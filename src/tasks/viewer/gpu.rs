use std::collections::HashMap;
use std::ops::Range;
use std::sync::Arc;

use anyhow::{Context, Result};
use tracing::{debug, info, warn};
use wgpu::util::DeviceExt;
use winit::dpi::PhysicalSize;
use winit::window::Window;

use crate::config::RenderingOptions;

use super::context::DrawList;
use super::scene::{Quad, Shading, TexelFormat, TextureId, TextureUpload};

const WALL_SHADER: &str = include_str!("shaders/wall.wgsl");

#[repr(C)]
#[derive(Clone, Copy, bytemuck::Pod, bytemuck::Zeroable)]
struct Globals {
    view_proj: [[f32; 4]; 4],
    wall_tone: [f32; 4],
    params: [f32; 4],
}

#[repr(C)]
#[derive(Clone, Copy, bytemuck::Pod, bytemuck::Zeroable)]
struct CornerVertex {
    corner: [f32; 2],
    uv: [f32; 2],
}

#[repr(C)]
#[derive(Clone, Copy, bytemuck::Pod, bytemuck::Zeroable)]
struct QuadInstance {
    center_size: [f32; 4],
    uv: [f32; 4],
    color: [f32; 4],
    params: [f32; 4],
}

impl From<&Quad> for QuadInstance {
    fn from(q: &Quad) -> Self {
        let shading = match q.shading {
            Shading::Flat => 0.0,
            Shading::Photo => 1.0,
        };
        Self {
            center_size: [q.center.x, q.center.y, q.size.x, q.size.y],
            uv: [q.uv.scale[0], q.uv.scale[1], q.uv.offset[0], q.uv.offset[1]],
            color: q.color,
            params: [q.z, shading, 0.0, 0.0],
        }
    }
}

const CORNERS: [CornerVertex; 4] = [
    CornerVertex { corner: [-0.5, 0.5], uv: [0.0, 0.0] },
    CornerVertex { corner: [0.5, 0.5], uv: [1.0, 0.0] },
    CornerVertex { corner: [0.5, -0.5], uv: [1.0, 1.0] },
    CornerVertex { corner: [-0.5, -0.5], uv: [0.0, 1.0] },
];
const INDICES: [u16; 6] = [0, 1, 2, 0, 2, 3];

struct GpuTexture {
    _texture: wgpu::Texture,
    bind_group: Arc<wgpu::BindGroup>,
}

/// Owns the surface and every GPU resource of the wall.
pub struct WallRenderer {
    surface: wgpu::Surface<'static>,
    surface_config: wgpu::SurfaceConfiguration,
    device: wgpu::Device,
    queue: wgpu::Queue,
    pipeline: wgpu::RenderPipeline,
    globals_buf: wgpu::Buffer,
    globals_bg: wgpu::BindGroup,
    texture_bgl: wgpu::BindGroupLayout,
    sampler: wgpu::Sampler,
    vertex_buffer: wgpu::Buffer,
    index_buffer: wgpu::Buffer,
    instance_buffer: wgpu::Buffer,
    instance_capacity: usize,
    textures: HashMap<TextureId, GpuTexture>,
    max_texture_dim: u32,
}

pub enum FrameOutcome {
    Presented,
    Skipped,
    /// The device cannot continue; the caller should shut down.
    Fatal,
}

impl WallRenderer {
    pub fn new(window: Arc<Window>, opts: &RenderingOptions) -> Result<Self> {
        let instance = wgpu::Instance::default();
        let surface = instance
            .create_surface(window.clone())
            .context("failed to create surface")?;
        let adapter = pollster::block_on(instance.request_adapter(&wgpu::RequestAdapterOptions {
            power_preference: wgpu::PowerPreference::HighPerformance,
            compatible_surface: Some(&surface),
            force_fallback_adapter: false,
        }))
        .context("failed to acquire GPU adapter")?;

        let caps = surface.get_capabilities(&adapter);
        let format = caps
            .formats
            .iter()
            .copied()
            .find(|fmt| fmt.is_srgb())
            .or_else(|| caps.formats.first().copied())
            .context("surface reports no texture formats")?;

        let limits = adapter.limits();
        let (device, queue) = pollster::block_on(adapter.request_device(&wgpu::DeviceDescriptor {
            label: Some("wall-device"),
            required_features: wgpu::Features::empty(),
            required_limits: limits.clone(),
            experimental_features: wgpu::ExperimentalFeatures::default(),
            memory_hints: wgpu::MemoryHints::default(),
            trace: wgpu::Trace::default(),
        }))
        .context("failed to acquire GPU device")?;

        let size = window.inner_size();
        let surface_config = wgpu::SurfaceConfiguration {
            usage: wgpu::TextureUsages::RENDER_ATTACHMENT,
            format,
            width: size.width.max(1),
            height: size.height.max(1),
            present_mode: wgpu::PresentMode::AutoVsync,
            alpha_mode: caps
                .alpha_modes
                .first()
                .copied()
                .unwrap_or(wgpu::CompositeAlphaMode::Auto),
            view_formats: vec![],
            desired_maximum_frame_latency: 2,
        };
        surface.configure(&device, &surface_config);
        info!(
            width = surface_config.width,
            height = surface_config.height,
            format = ?surface_config.format,
            "wall surface configured",
        );

        let shader = device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label: Some("wall-shader"),
            source: wgpu::ShaderSource::Wgsl(WALL_SHADER.into()),
        });

        let globals_bgl = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("wall-globals-bgl"),
            entries: &[wgpu::BindGroupLayoutEntry {
                binding: 0,
                visibility: wgpu::ShaderStages::VERTEX | wgpu::ShaderStages::FRAGMENT,
                ty: wgpu::BindingType::Buffer {
                    ty: wgpu::BufferBindingType::Uniform,
                    has_dynamic_offset: false,
                    min_binding_size: None,
                },
                count: None,
            }],
        });
        let globals_buf = device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("wall-globals"),
            size: std::mem::size_of::<Globals>() as u64,
            usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });
        let globals_bg = device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("wall-globals-bg"),
            layout: &globals_bgl,
            entries: &[wgpu::BindGroupEntry {
                binding: 0,
                resource: globals_buf.as_entire_binding(),
            }],
        });

        let texture_bgl = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("wall-texture-bgl"),
            entries: &[
                wgpu::BindGroupLayoutEntry {
                    binding: 0,
                    visibility: wgpu::ShaderStages::FRAGMENT,
                    ty: wgpu::BindingType::Texture {
                        multisampled: false,
                        view_dimension: wgpu::TextureViewDimension::D2,
                        sample_type: wgpu::TextureSampleType::Float { filterable: true },
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

        let anisotropy = opts.anisotropy.clamp(1, 16);
        let sampler = device.create_sampler(&wgpu::SamplerDescriptor {
            label: Some("wall-sampler"),
            address_mode_u: wgpu::AddressMode::ClampToEdge,
            address_mode_v: wgpu::AddressMode::ClampToEdge,
            address_mode_w: wgpu::AddressMode::ClampToEdge,
            mag_filter: wgpu::FilterMode::Linear,
            min_filter: wgpu::FilterMode::Linear,
            mipmap_filter: wgpu::FilterMode::Linear,
            anisotropy_clamp: anisotropy,
            ..Default::default()
        });

        let vertex_buffer = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some("wall-corners"),
            contents: bytemuck::cast_slice(&CORNERS),
            usage: wgpu::BufferUsages::VERTEX,
        });
        let index_buffer = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some("wall-indices"),
            contents: bytemuck::cast_slice(&INDICES),
            usage: wgpu::BufferUsages::INDEX,
        });

        let pipeline_layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some("wall-pipeline-layout"),
            bind_group_layouts: &[&globals_bgl, &texture_bgl],
            push_constant_ranges: &[],
        });
        let pipeline = device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
            label: Some("wall-pipeline"),
            layout: Some(&pipeline_layout),
            vertex: wgpu::VertexState {
                module: &shader,
                entry_point: Some("vs_main"),
                buffers: &[
                    wgpu::VertexBufferLayout {
                        array_stride: std::mem::size_of::<CornerVertex>() as u64,
                        step_mode: wgpu::VertexStepMode::Vertex,
                        attributes: &wgpu::vertex_attr_array![0 => Float32x2, 1 => Float32x2],
                    },
                    wgpu::VertexBufferLayout {
                        array_stride: std::mem::size_of::<QuadInstance>() as u64,
                        step_mode: wgpu::VertexStepMode::Instance,
                        attributes: &wgpu::vertex_attr_array![
                            2 => Float32x4,
                            3 => Float32x4,
                            4 => Float32x4,
                            5 => Float32x4
                        ],
                    },
                ],
                compilation_options: wgpu::PipelineCompilationOptions::default(),
            },
            fragment: Some(wgpu::FragmentState {
                module: &shader,
                entry_point: Some("fs_main"),
                targets: &[Some(wgpu::ColorTargetState {
                    format,
                    blend: Some(wgpu::BlendState::ALPHA_BLENDING),
                    write_mask: wgpu::ColorWrites::ALL,
                })],
                compilation_options: wgpu::PipelineCompilationOptions::default(),
            }),
            primitive: wgpu::PrimitiveState {
                topology: wgpu::PrimitiveTopology::TriangleList,
                ..Default::default()
            },
            depth_stencil: None,
            multisample: wgpu::MultisampleState::default(),
            multiview: None,
            cache: None,
        });

        let instance_capacity = 256;
        let instance_buffer = Self::create_instance_buffer(&device, instance_capacity);
        let max_texture_dim = opts.max_texture_dim.min(limits.max_texture_dimension_2d);

        let mut renderer = Self {
            surface,
            surface_config,
            device,
            queue,
            pipeline,
            globals_buf,
            globals_bg,
            texture_bgl,
            sampler,
            vertex_buffer,
            index_buffer,
            instance_buffer,
            instance_capacity,
            textures: HashMap::new(),
            max_texture_dim,
        };
        let white = image::RgbaImage::from_pixel(1, 1, image::Rgba([255, 255, 255, 255]));
        renderer.create_texture(TextureId::WHITE, &white, TexelFormat::Linear);
        Ok(renderer)
    }

    fn create_instance_buffer(device: &wgpu::Device, capacity: usize) -> wgpu::Buffer {
        device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("wall-instances"),
            size: (capacity * std::mem::size_of::<QuadInstance>()) as u64,
            usage: wgpu::BufferUsages::VERTEX | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        })
    }

    fn ensure_instance_capacity(&mut self, count: usize) {
        if count <= self.instance_capacity {
            return;
        }
        let mut capacity = self.instance_capacity.max(256);
        while capacity < count {
            capacity *= 2;
        }
        self.instance_buffer = Self::create_instance_buffer(&self.device, capacity);
        self.instance_capacity = capacity;
        debug!(capacity, "instance buffer grown");
    }

    fn create_texture(&mut self, id: TextureId, image: &image::RgbaImage, format: TexelFormat) {
        let (w, h) = image.dimensions();
        let size = wgpu::Extent3d {
            width: w.max(1),
            height: h.max(1),
            depth_or_array_layers: 1,
        };
        let texture = self.device.create_texture(&wgpu::TextureDescriptor {
            label: Some("wall-texture"),
            size,
            mip_level_count: 1,
            sample_count: 1,
            dimension: wgpu::TextureDimension::D2,
            format: match format {
                TexelFormat::Srgb => wgpu::TextureFormat::Rgba8UnormSrgb,
                TexelFormat::Linear => wgpu::TextureFormat::Rgba8Unorm,
            },
            usage: wgpu::TextureUsages::TEXTURE_BINDING | wgpu::TextureUsages::COPY_DST,
            view_formats: &[],
        });
        self.queue.write_texture(
            wgpu::TexelCopyTextureInfo {
                texture: &texture,
                mip_level: 0,
                origin: wgpu::Origin3d::ZERO,
                aspect: wgpu::TextureAspect::All,
            },
            image.as_raw(),
            wgpu::TexelCopyBufferLayout {
                offset: 0,
                bytes_per_row: Some(4 * w),
                rows_per_image: Some(h),
            },
            size,
        );
        let view = texture.create_view(&wgpu::TextureViewDescriptor::default());
        let bind_group = Arc::new(self.device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("wall-texture-bg"),
            layout: &self.texture_bgl,
            entries: &[
                wgpu::BindGroupEntry {
                    binding: 0,
                    resource: wgpu::BindingResource::TextureView(&view),
                },
                wgpu::BindGroupEntry {
                    binding: 1,
                    resource: wgpu::BindingResource::Sampler(&self.sampler),
                },
            ],
        }));
        self.textures.insert(
            id,
            GpuTexture {
                _texture: texture,
                bind_group,
            },
        );
    }

    /// Uploads are applied before releases.
    pub fn sync_textures(&mut self, uploads: Vec<TextureUpload>, releases: Vec<TextureId>) {
        for upload in uploads {
            if upload.image.width() == 0 || upload.image.height() == 0 {
                warn!(id = upload.id.0, "skipping empty texture upload");
                continue;
            }
            let (w, h) = upload.image.dimensions();
            let max = self.max_texture_dim.max(1);
            if w > max || h > max {
                let scale = max as f32 / w.max(h) as f32;
                let nw = ((w as f32 * scale).round() as u32).clamp(1, max);
                let nh = ((h as f32 * scale).round() as u32).clamp(1, max);
                debug!(id = upload.id.0, w, h, nw, nh, "downscaling oversized texture");
                let resized = image::imageops::resize(&upload.image, nw, nh, image::imageops::FilterType::Triangle);
                self.create_texture(upload.id, &resized, upload.format);
            } else {
                self.create_texture(upload.id, &upload.image, upload.format);
            }
        }
        for id in releases {
            if id != TextureId::WHITE {
                self.textures.remove(&id);
            }
        }
    }

    pub fn resize(&mut self, new_size: PhysicalSize<u32>) {
        self.surface_config.width = new_size.width.max(1);
        self.surface_config.height = new_size.height.max(1);
        self.surface.configure(&self.device, &self.surface_config);
        debug!(
            width = self.surface_config.width,
            height = self.surface_config.height,
            "wall surface resized",
        );
    }

    fn surface_size(&self) -> PhysicalSize<u32> {
        PhysicalSize::new(self.surface_config.width, self.surface_config.height)
    }

    /// Consecutive quads sharing a texture, as instance ranges.
    fn batches(quads: &[Quad]) -> Vec<(Range<u32>, TextureId)> {
        let mut batches: Vec<(Range<u32>, TextureId)> = Vec::new();
        for (idx, quad) in quads.iter().enumerate() {
            let idx = idx as u32;
            match batches.last_mut() {
                Some((range, tex)) if *tex == quad.texture => range.end = idx + 1,
                _ => batches.push((idx..idx + 1, quad.texture)),
            }
        }
        batches
    }

    pub fn render(&mut self, list: &DrawList) -> FrameOutcome {
        let frame = match self.surface.get_current_texture() {
            Ok(frame) => frame,
            Err(wgpu::SurfaceError::Outdated) | Err(wgpu::SurfaceError::Lost) => {
                info!("wall surface lost; reconfiguring");
                self.resize(self.surface_size());
                return FrameOutcome::Skipped;
            }
            Err(wgpu::SurfaceError::OutOfMemory) => {
                tracing::error!("wall surface out of memory");
                return FrameOutcome::Fatal;
            }
            Err(wgpu::SurfaceError::Timeout) => {
                warn!("wall surface acquisition timed out");
                return FrameOutcome::Skipped;
            }
            Err(wgpu::SurfaceError::Other) => {
                warn!("wall surface reported an unknown error; retrying");
                self.resize(self.surface_size());
                return FrameOutcome::Skipped;
            }
        };

        let globals = Globals {
            view_proj: list.view_proj.to_cols_array_2d(),
            wall_tone: [list.wall_tone[0], list.wall_tone[1], list.wall_tone[2], list.tone_strength],
            params: [list.saturation, 0.0, 0.0, 0.0],
        };
        self.queue.write_buffer(&self.globals_buf, 0, bytemuck::bytes_of(&globals));

        let instances: Vec<QuadInstance> = list.quads.iter().map(QuadInstance::from).collect();
        self.ensure_instance_capacity(instances.len());
        if !instances.is_empty() {
            self.queue
                .write_buffer(&self.instance_buffer, 0, bytemuck::cast_slice(&instances));
        }
        let batches = Self::batches(&list.quads);

        let view = frame
            .texture
            .create_view(&wgpu::TextureViewDescriptor::default());
        let mut encoder = self.device.create_command_encoder(&wgpu::CommandEncoderDescriptor {
            label: Some("wall-encoder"),
        });
        {
            let [r, g, b] = list.clear_color;
            let mut pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
                label: Some("wall-pass"),
                color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                    view: &view,
                    depth_slice: None,
                    resolve_target: None,
                    ops: wgpu::Operations {
                        load: wgpu::LoadOp::Clear(wgpu::Color {
                            r: r as f64,
                            g: g as f64,
                            b: b as f64,
                            a: 1.0,
                        }),
                        store: wgpu::StoreOp::Store,
                    },
                })],
                depth_stencil_attachment: None,
                timestamp_writes: None,
                occlusion_query_set: None,
            });

            let surface = self.surface_size();
            let canvas = list.canvas;
            let x = canvas.x.clamp(0.0, surface.width as f32 - 1.0);
            let y = canvas.y.clamp(0.0, surface.height as f32 - 1.0);
            let w = canvas.width.min(surface.width as f32 - x).max(1.0);
            let h = canvas.height.min(surface.height as f32 - y).max(1.0);
            pass.set_viewport(x, y, w, h, 0.0, 1.0);
            pass.set_scissor_rect(x as u32, y as u32, w as u32, h as u32);

            pass.set_pipeline(&self.pipeline);
            pass.set_bind_group(0, &self.globals_bg, &[]);
            pass.set_vertex_buffer(0, self.vertex_buffer.slice(..));
            pass.set_vertex_buffer(1, self.instance_buffer.slice(..));
            pass.set_index_buffer(self.index_buffer.slice(..), wgpu::IndexFormat::Uint16);
            for (range, texture) in batches {
                let Some(gpu) = self.textures.get(&texture).or_else(|| self.textures.get(&TextureId::WHITE))
                else {
                    continue;
                };
                pass.set_bind_group(1, gpu.bind_group.as_ref(), &[]);
                pass.draw_indexed(0..INDICES.len() as u32, 0, range);
            }
        }
        self.queue.submit(std::iter::once(encoder.finish()));
        frame.present();
        FrameOutcome::Presented
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use glam::Vec2;

    #[test]
    fn batches_group_consecutive_textures() {
        let quad = |tex: u32| Quad::textured(Vec2::ZERO, Vec2::ONE, 0.0, TextureId(tex));
        let quads = [quad(3), quad(3), quad(0), quad(3)];
        let batches = WallRenderer::batches(&quads);
        assert_eq!(
            batches,
            vec![(0..2, TextureId(3)), (2..3, TextureId(0)), (3..4, TextureId(3))]
        );
    }

    #[test]
    fn photo_shading_restores_luminance_after_tint() {
        let fs = &WALL_SHADER[WALL_SHADER.find("fn fs_main").unwrap()..];
        let tint = fs.find("mix(rgb, tinted").unwrap();
        let lock = fs.find("rgb = rgb * (lum / max(luminance(rgb)").unwrap();
        assert!(lock > tint);
    }

    #[test]
    fn instance_layout_matches_shader() {
        assert_eq!(std::mem::size_of::<QuadInstance>(), 64);
        assert_eq!(std::mem::size_of::<Globals>(), 96);
        let q = Quad::flat(Vec2::new(1.0, 2.0), Vec2::new(3.0, 4.0), 0.5, [0.1, 0.2, 0.3, 0.4]);
        let inst = QuadInstance::from(&q);
        assert_eq!(inst.center_size, [1.0, 2.0, 3.0, 4.0]);
        assert_eq!(inst.params, [0.5, 0.0, 0.0, 0.0]);
    }
}
