//! GPU scene renderer
//!
//! Renders the shared scene off-screen with wgpu: one full-scene textured
//! quad sampling the scene image over a clear color, into an RGBA8 target of
//! fixed resolution. After every frame the target is copied into a mappable
//! staging buffer whose rows are padded to wgpu's copy alignment; the
//! compositor reads it back through [`SceneBackend::read_staging`].
//!
//! No swapchain is involved. The shard windows are plain CPU surfaces, so the
//! device runs without a compatible surface.

pub mod blit;
pub mod frame_pacing;
pub mod texture;

use log::{debug, info, warn};
use std::sync::mpsc;
use wgpu::util::DeviceExt;

use crate::error::{Result, ShatterError};
use crate::host::{SceneBackend, StagingView};
use crate::window::Size;

pub use blit::PixelBuffer;
pub use frame_pacing::{FramePacer, FrameStats};
pub use texture::SceneImage;

/// Format of the scene target and of the uploaded scene image. Linear, so
/// readback bytes equal the sampled image bytes.
pub const SCENE_FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::Rgba8Unorm;

#[repr(C)]
#[derive(Copy, Clone, Debug, bytemuck::Pod, bytemuck::Zeroable)]
struct Vertex {
    position: [f32; 3],
    tex_coords: [f32; 2],
}

impl Vertex {
    fn desc() -> wgpu::VertexBufferLayout<'static> {
        const ATTRIBUTES: [wgpu::VertexAttribute; 2] =
            wgpu::vertex_attr_array![0 => Float32x3, 1 => Float32x2];
        wgpu::VertexBufferLayout {
            array_stride: std::mem::size_of::<Vertex>() as wgpu::BufferAddress,
            step_mode: wgpu::VertexStepMode::Vertex,
            attributes: &ATTRIBUTES,
        }
    }
}

/// Clip-space quad covering the whole target; texture v grows downwards
const SCENE_QUAD: [Vertex; 4] = [
    Vertex { position: [-1.0, -1.0, 0.0], tex_coords: [0.0, 1.0] },
    Vertex { position: [1.0, -1.0, 0.0], tex_coords: [1.0, 1.0] },
    Vertex { position: [-1.0, 1.0, 0.0], tex_coords: [0.0, 0.0] },
    Vertex { position: [1.0, 1.0, 0.0], tex_coords: [1.0, 0.0] },
];

const SCENE_QUAD_INDICES: [u16; 6] = [0, 1, 2, 2, 1, 3];

/// Map a backend name from the configuration to wgpu backends
pub fn parse_backends(name: &str) -> Option<wgpu::Backends> {
    match name.to_ascii_lowercase().as_str() {
        "auto" => Some(wgpu::Backends::all()),
        "vulkan" => Some(wgpu::Backends::VULKAN),
        "gl" | "opengl" => Some(wgpu::Backends::GL),
        "metal" => Some(wgpu::Backends::METAL),
        "dx12" => Some(wgpu::Backends::DX12),
        _ => None,
    }
}

/// Bytes per staging row for a target `width` pixels wide
pub fn padded_bytes_per_row(width: u32) -> u32 {
    let unpadded = width * 4;
    let align = wgpu::COPY_BYTES_PER_ROW_ALIGNMENT;
    unpadded.div_ceil(align) * align
}

/// Off-screen wgpu renderer for the shared scene
pub struct SceneRenderer {
    device: wgpu::Device,
    queue: wgpu::Queue,
    size: Size,
    clear_color: wgpu::Color,

    target: wgpu::Texture,
    target_view: wgpu::TextureView,
    pipeline: wgpu::RenderPipeline,
    bind_group: wgpu::BindGroup,
    vertex_buffer: wgpu::Buffer,
    index_buffer: wgpu::Buffer,

    staging: wgpu::Buffer,
    staging_stride: u32,
    staged: bool,
    adapter_name: String,
}

impl SceneRenderer {
    /// Create a renderer with a `scene`-sized target showing `image`.
    pub fn new(
        scene: Size,
        backends: wgpu::Backends,
        clear_color: [f64; 4],
        image: &SceneImage,
    ) -> Result<Self> {
        pollster::block_on(Self::new_async(scene, backends, clear_color, image))
    }

    async fn new_async(
        scene: Size,
        backends: wgpu::Backends,
        clear_color: [f64; 4],
        image: &SceneImage,
    ) -> Result<Self> {
        info!(
            "🎨 Creating scene renderer {}x{} (backends={:?})",
            scene.width, scene.height, backends
        );
        if scene.is_empty() {
            return Err(ShatterError::BackendInit(format!(
                "scene size {}x{} is empty",
                scene.width, scene.height
            )));
        }

        let instance = wgpu::Instance::new(wgpu::InstanceDescriptor {
            backends,
            ..Default::default()
        });

        let mut adapter = None;
        for fallback in [false, true] {
            adapter = instance
                .request_adapter(&wgpu::RequestAdapterOptions {
                    power_preference: wgpu::PowerPreference::HighPerformance,
                    compatible_surface: None,
                    force_fallback_adapter: fallback,
                })
                .await;
            if adapter.is_some() {
                break;
            }
        }
        let adapter = adapter.ok_or(ShatterError::AdapterUnavailable)?;
        let adapter_name = adapter.get_info().name;
        info!("🖥️ Using GPU: {}", adapter_name);

        let (device, queue) = adapter
            .request_device(
                &wgpu::DeviceDescriptor {
                    label: Some("Shatter Device"),
                    required_features: wgpu::Features::empty(),
                    required_limits: wgpu::Limits::downlevel_defaults().using_resolution(adapter.limits()),
                },
                None,
            )
            .await?;

        let max_dim = device.limits().max_texture_dimension_2d;
        if scene.width > max_dim || scene.height > max_dim {
            return Err(ShatterError::BackendInit(format!(
                "scene size {}x{} exceeds the device limit of {}",
                scene.width, scene.height, max_dim
            )));
        }

        let fallback_image;
        let unusable = image.width == 0
            || image.height == 0
            || image.width > max_dim
            || image.height > max_dim
            || image.rgba.len() != image.width as usize * image.height as usize * 4;
        let image = if unusable {
            warn!(
                "⚠️ Scene image {}x{} is unusable on this device, using placeholder",
                image.width,
                image.height
            );
            fallback_image = SceneImage::placeholder();
            &fallback_image
        } else {
            image
        };

        let target = device.create_texture(&wgpu::TextureDescriptor {
            label: Some("Scene Target"),
            size: extent(scene.width, scene.height),
            mip_level_count: 1,
            sample_count: 1,
            dimension: wgpu::TextureDimension::D2,
            format: SCENE_FORMAT,
            usage: wgpu::TextureUsages::RENDER_ATTACHMENT | wgpu::TextureUsages::COPY_SRC,
            view_formats: &[],
        });
        let target_view = target.create_view(&wgpu::TextureViewDescriptor::default());

        let image_texture = device.create_texture(&wgpu::TextureDescriptor {
            label: Some("Scene Image"),
            size: extent(image.width, image.height),
            mip_level_count: 1,
            sample_count: 1,
            dimension: wgpu::TextureDimension::D2,
            format: SCENE_FORMAT,
            usage: wgpu::TextureUsages::TEXTURE_BINDING | wgpu::TextureUsages::COPY_DST,
            view_formats: &[],
        });
        queue.write_texture(
            wgpu::ImageCopyTexture {
                texture: &image_texture,
                mip_level: 0,
                origin: wgpu::Origin3d::ZERO,
                aspect: wgpu::TextureAspect::All,
            },
            &image.rgba,
            wgpu::ImageDataLayout {
                offset: 0,
                bytes_per_row: Some(4 * image.width),
                rows_per_image: Some(image.height),
            },
            extent(image.width, image.height),
        );
        let image_view = image_texture.create_view(&wgpu::TextureViewDescriptor::default());

        let sampler = device.create_sampler(&wgpu::SamplerDescriptor {
            label: Some("Scene Sampler"),
            address_mode_u: wgpu::AddressMode::ClampToEdge,
            address_mode_v: wgpu::AddressMode::ClampToEdge,
            address_mode_w: wgpu::AddressMode::ClampToEdge,
            mag_filter: wgpu::FilterMode::Linear,
            min_filter: wgpu::FilterMode::Linear,
            mipmap_filter: wgpu::FilterMode::Nearest,
            ..Default::default()
        });

        let bind_group_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("Scene Texture BGL"),
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

        let bind_group = device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("Scene Image BindGroup"),
            layout: &bind_group_layout,
            entries: &[
                wgpu::BindGroupEntry {
                    binding: 0,
                    resource: wgpu::BindingResource::TextureView(&image_view),
                },
                wgpu::BindGroupEntry {
                    binding: 1,
                    resource: wgpu::BindingResource::Sampler(&sampler),
                },
            ],
        });

        let pipeline_layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some("Scene Pipeline Layout"),
            bind_group_layouts: &[&bind_group_layout],
            push_constant_ranges: &[],
        });

        let shader = device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label: Some("Scene Quad Shader"),
            source: wgpu::ShaderSource::Wgsl(include_str!("./textured_quad.wgsl").into()),
        });

        let pipeline = device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
            label: Some("Scene Quad Pipeline"),
            layout: Some(&pipeline_layout),
            vertex: wgpu::VertexState {
                module: &shader,
                entry_point: "vs_main",
                buffers: &[Vertex::desc()],
            },
            fragment: Some(wgpu::FragmentState {
                module: &shader,
                entry_point: "fs_main",
                targets: &[Some(wgpu::ColorTargetState {
                    format: SCENE_FORMAT,
                    blend: Some(wgpu::BlendState::ALPHA_BLENDING),
                    write_mask: wgpu::ColorWrites::ALL,
                })],
            }),
            primitive: wgpu::PrimitiveState::default(),
            depth_stencil: None,
            multisample: wgpu::MultisampleState::default(),
            multiview: None,
        });

        let vertex_buffer = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some("Scene Quad Vertices"),
            contents: bytemuck::cast_slice(&SCENE_QUAD),
            usage: wgpu::BufferUsages::VERTEX,
        });
        let index_buffer = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some("Scene Quad Indices"),
            contents: bytemuck::cast_slice(&SCENE_QUAD_INDICES),
            usage: wgpu::BufferUsages::INDEX,
        });

        let staging_stride = padded_bytes_per_row(scene.width);
        let staging = device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("Scene Staging"),
            size: staging_stride as u64 * scene.height as u64,
            usage: wgpu::BufferUsages::COPY_DST | wgpu::BufferUsages::MAP_READ,
            mapped_at_creation: false,
        });

        let [r, g, b, a] = clear_color;
        info!("✅ Scene renderer ready (staging stride {} bytes)", staging_stride);

        Ok(Self {
            device,
            queue,
            size: scene,
            clear_color: wgpu::Color { r, g, b, a },
            target,
            target_view,
            pipeline,
            bind_group,
            vertex_buffer,
            index_buffer,
            staging,
            staging_stride,
            staged: false,
            adapter_name,
        })
    }

    pub fn adapter_name(&self) -> &str {
        &self.adapter_name
    }

    pub fn staging_stride(&self) -> u32 {
        self.staging_stride
    }
}

impl SceneBackend for SceneRenderer {
    fn scene_size(&self) -> Size {
        self.size
    }

    fn render_scene(&mut self) -> Result<()> {
        let mut encoder = self
            .device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("Scene Encoder"),
            });
        {
            let mut rpass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
                label: Some("Scene Pass"),
                color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                    view: &self.target_view,
                    resolve_target: None,
                    ops: wgpu::Operations {
                        load: wgpu::LoadOp::Clear(self.clear_color),
                        store: wgpu::StoreOp::Store,
                    },
                })],
                depth_stencil_attachment: None,
                occlusion_query_set: None,
                timestamp_writes: None,
            });
            rpass.set_pipeline(&self.pipeline);
            rpass.set_bind_group(0, &self.bind_group, &[]);
            rpass.set_vertex_buffer(0, self.vertex_buffer.slice(..));
            rpass.set_index_buffer(self.index_buffer.slice(..), wgpu::IndexFormat::Uint16);
            rpass.draw_indexed(0..SCENE_QUAD_INDICES.len() as u32, 0, 0..1);
        }
        self.queue.submit(std::iter::once(encoder.finish()));
        Ok(())
    }

    fn copy_to_staging(&mut self) -> Result<()> {
        let mut encoder = self
            .device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("Scene Readback Encoder"),
            });
        encoder.copy_texture_to_buffer(
            self.target.as_image_copy(),
            wgpu::ImageCopyBuffer {
                buffer: &self.staging,
                layout: wgpu::ImageDataLayout {
                    offset: 0,
                    bytes_per_row: Some(self.staging_stride),
                    rows_per_image: Some(self.size.height),
                },
            },
            extent(self.size.width, self.size.height),
        );
        self.queue.submit(std::iter::once(encoder.finish()));
        self.staged = true;
        Ok(())
    }

    fn read_staging(&mut self, sink: &mut dyn FnMut(&StagingView<'_>)) -> Result<()> {
        if !self.staged {
            return Err(ShatterError::StagingMap(
                "nothing has been copied to the staging buffer".into(),
            ));
        }

        let slice = self.staging.slice(..);
        let (tx, rx) = mpsc::channel();
        slice.map_async(wgpu::MapMode::Read, move |result| {
            let _ = tx.send(result);
        });
        self.device.poll(wgpu::Maintain::Wait);

        match rx.recv() {
            Ok(Ok(())) => {}
            Ok(Err(e)) => return Err(ShatterError::StagingMap(e.to_string())),
            Err(_) => {
                return Err(ShatterError::StagingMap(
                    "map callback was dropped".into(),
                ))
            }
        }

        {
            let data = slice.get_mapped_range();
            sink(&StagingView {
                bytes: &data,
                stride: self.staging_stride as usize,
                width: self.size.width,
                height: self.size.height,
            });
        }
        self.staging.unmap();
        debug!("Read back {} staging bytes", self.staging.size());
        Ok(())
    }
}

fn extent(width: u32, height: u32) -> wgpu::Extent3d {
    wgpu::Extent3d {
        width,
        height,
        depth_or_array_layers: 1,
    }
}
