//! WGPU-based render backend for the viewer window
//!
//! Implements [`RenderSink`] by recording the scene's command stream into a
//! [`DrawList`] and replaying it at [`RenderSink::end_frame`] in one render
//! pass. The pass writes pick tags into the stencil aspect of the depth
//! buffer, and [`PickBuffer::read_pick_id`] copies the texel under the
//! cursor back to the CPU.

use std::collections::HashMap;
use std::num::NonZeroU64;
use std::path::Path;
use std::sync::Arc;

use anyhow::Context;
use wgpu::util::DeviceExt;

use crate::error::{LoadError, Result};
use crate::gfx::rendering::draw_list::{DrawList, KeyframeOffsets, TextureSlots};
use crate::gfx::rendering::pipeline_manager::PipelineManager;
use crate::gfx::rendering::sink::{
    MeshHandle, PickBuffer, ProgramHandle, RenderSink, TextureHandle, UniformValue,
};
use crate::gfx::rendering::uniforms::DrawUniforms;
use crate::gfx::resources::material::Material;
use crate::gfx::resources::mesh::MeshGeometry;
use crate::gfx::resources::texture_resource::TextureResource;

/// Declarations every program shares: the uniform block, texture bindings
/// and the fog helper.
const COMMON_WGSL: &str = include_str!("../../shaders/common.wgsl");

/// Row pitch of the single-texel stencil readback.
const PICK_ROW_BYTES: u32 = wgpu::COPY_BYTES_PER_ROW_ALIGNMENT;

const CLEAR_COLOR: wgpu::Color = wgpu::Color {
    r: 0.0,
    g: 0.0,
    b: 0.0,
    a: 1.0,
};

struct GpuMesh {
    vertex_buffer: wgpu::Buffer,
    index_buffer: wgpu::Buffer,
    index_count: u32,
}

/// Core render backend owning the surface, device and every GPU resource
/// the scene created through handles.
pub struct RenderEngine {
    surface: wgpu::Surface<'static>,
    device: Arc<wgpu::Device>,
    queue: Arc<wgpu::Queue>,
    config: wgpu::SurfaceConfiguration,
    depth_stencil: TextureResource,
    pipeline_manager: PipelineManager,

    uniform_layout: wgpu::BindGroupLayout,
    uniform_buffer: wgpu::Buffer,
    uniform_bind_group: wgpu::BindGroup,
    uniform_stride: u64,
    uniform_capacity: usize,

    texture_layout: wgpu::BindGroupLayout,
    texture_bind_groups: HashMap<TextureSlots, wgpu::BindGroup>,
    repeat_sampler: wgpu::Sampler,
    clamp_sampler: wgpu::Sampler,
    white: TextureResource,
    black_cube: TextureResource,

    textures: Vec<TextureResource>,
    meshes: Vec<GpuMesh>,
    draw_list: DrawList,
}

impl RenderEngine {
    /// Creates a new render engine for the given window
    ///
    /// # Arguments
    /// * `window` - Window surface target for rendering
    /// * `width` - Initial surface width in pixels
    /// * `height` - Initial surface height in pixels
    pub async fn new(
        window: impl Into<wgpu::SurfaceTarget<'static>>,
        width: u32,
        height: u32,
    ) -> anyhow::Result<RenderEngine> {
        let instance = wgpu::Instance::new(&wgpu::InstanceDescriptor {
            backends: wgpu::Backends::all(),
            ..Default::default()
        });
        let surface = instance
            .create_surface(window)
            .context("failed to create surface")?;

        let adapter = instance
            .request_adapter(&wgpu::RequestAdapterOptions {
                power_preference: wgpu::PowerPreference::default(),
                compatible_surface: Some(&surface),
                force_fallback_adapter: false,
            })
            .await
            .context("failed to request adapter")?;

        let (device, queue) = adapter
            .request_device(&wgpu::DeviceDescriptor {
                label: Some("WGPU Device"),
                required_features: wgpu::Features::default(),
                required_limits: wgpu::Limits {
                    max_texture_dimension_2d: 4096,
                    ..wgpu::Limits::downlevel_defaults()
                },
                memory_hints: wgpu::MemoryHints::default(),
                trace: wgpu::Trace::Off,
            })
            .await
            .context("failed to request device")?;
        device.on_uncaptured_error(Box::new(|error: wgpu::Error| {
            log::error!("GPU error: {}", error);
        }));
        let device = Arc::new(device);
        let queue = Arc::new(queue);

        let surface_capabilities = surface.get_capabilities(&adapter);
        let format = surface_capabilities
            .formats
            .iter()
            .copied()
            .find(|f| f.is_srgb())
            .or_else(|| surface_capabilities.formats.first().copied())
            .context("surface reports no formats")?;

        let config = wgpu::SurfaceConfiguration {
            usage: wgpu::TextureUsages::RENDER_ATTACHMENT,
            format,
            width: width.max(1),
            height: height.max(1),
            present_mode: wgpu::PresentMode::AutoVsync,
            alpha_mode: surface_capabilities
                .alpha_modes
                .first()
                .copied()
                .unwrap_or(wgpu::CompositeAlphaMode::Auto),
            view_formats: vec![],
            desired_maximum_frame_latency: 2,
        };
        surface.configure(&device, &config);

        let depth_stencil =
            TextureResource::create_depth_stencil_texture(&device, &config, "depth_stencil");

        let uniform_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("Draw Uniforms Layout"),
            entries: &[wgpu::BindGroupLayoutEntry {
                binding: 0,
                visibility: wgpu::ShaderStages::VERTEX_FRAGMENT,
                ty: wgpu::BindingType::Buffer {
                    ty: wgpu::BufferBindingType::Uniform,
                    has_dynamic_offset: true,
                    min_binding_size: NonZeroU64::new(DrawUniforms::SIZE as u64),
                },
                count: None,
            }],
        });

        let texture_entry = |binding, view_dimension| wgpu::BindGroupLayoutEntry {
            binding,
            visibility: wgpu::ShaderStages::FRAGMENT,
            ty: wgpu::BindingType::Texture {
                sample_type: wgpu::TextureSampleType::Float { filterable: true },
                view_dimension,
                multisampled: false,
            },
            count: None,
        };
        let sampler_entry = |binding| wgpu::BindGroupLayoutEntry {
            binding,
            visibility: wgpu::ShaderStages::FRAGMENT,
            ty: wgpu::BindingType::Sampler(wgpu::SamplerBindingType::Filtering),
            count: None,
        };
        let texture_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("Textures Layout"),
            entries: &[
                texture_entry(0, wgpu::TextureViewDimension::D2),
                texture_entry(1, wgpu::TextureViewDimension::D2),
                texture_entry(2, wgpu::TextureViewDimension::Cube),
                sampler_entry(3),
                sampler_entry(4),
            ],
        });

        let repeat_sampler = device.create_sampler(&wgpu::SamplerDescriptor {
            label: Some("Repeat Sampler"),
            address_mode_u: wgpu::AddressMode::Repeat,
            address_mode_v: wgpu::AddressMode::Repeat,
            address_mode_w: wgpu::AddressMode::Repeat,
            mag_filter: wgpu::FilterMode::Linear,
            min_filter: wgpu::FilterMode::Linear,
            mipmap_filter: wgpu::FilterMode::Nearest,
            ..Default::default()
        });
        let clamp_sampler = device.create_sampler(&wgpu::SamplerDescriptor {
            label: Some("Clamp Sampler"),
            address_mode_u: wgpu::AddressMode::ClampToEdge,
            address_mode_v: wgpu::AddressMode::ClampToEdge,
            address_mode_w: wgpu::AddressMode::ClampToEdge,
            mag_filter: wgpu::FilterMode::Linear,
            min_filter: wgpu::FilterMode::Linear,
            mipmap_filter: wgpu::FilterMode::Nearest,
            ..Default::default()
        });

        let white = TextureResource::white(&device, &queue);
        let black_cube = TextureResource::black_cube(&device, &queue);

        let pipeline_manager =
            PipelineManager::new(device.clone(), &[&uniform_layout, &texture_layout], format);

        let uniform_stride = uniform_stride(device.limits().min_uniform_buffer_offset_alignment);
        let uniform_capacity = 64;
        let (uniform_buffer, uniform_bind_group) =
            create_uniform_buffer(&device, &uniform_layout, uniform_stride, uniform_capacity);

        log::info!(
            "Render engine ready: {} ({:?}, {}x{})",
            adapter.get_info().name,
            format,
            config.width,
            config.height
        );

        Ok(Self {
            surface,
            device,
            queue,
            config,
            depth_stencil,
            pipeline_manager,
            uniform_layout,
            uniform_buffer,
            uniform_bind_group,
            uniform_stride,
            uniform_capacity,
            texture_layout,
            texture_bind_groups: HashMap::new(),
            repeat_sampler,
            clamp_sampler,
            white,
            black_cube,
            textures: Vec::new(),
            meshes: Vec::new(),
            draw_list: DrawList::new(),
        })
    }

    /// Returns current surface dimensions
    pub fn get_surface_size(&self) -> (u32, u32) {
        (self.config.width, self.config.height)
    }

    pub fn device(&self) -> &wgpu::Device {
        &self.device
    }

    pub fn queue(&self) -> &wgpu::Queue {
        &self.queue
    }

    pub fn surface_format(&self) -> wgpu::TextureFormat {
        self.config.format
    }

    fn push_texture(&mut self, texture: TextureResource) -> TextureHandle {
        self.textures.push(texture);
        TextureHandle(self.textures.len() as u32 - 1)
    }

    fn ensure_uniform_capacity(&mut self, draws: usize) {
        if draws <= self.uniform_capacity {
            return;
        }
        let capacity = draws.next_power_of_two();
        let (buffer, bind_group) = create_uniform_buffer(
            &self.device,
            &self.uniform_layout,
            self.uniform_stride,
            capacity,
        );
        self.uniform_buffer = buffer;
        self.uniform_bind_group = bind_group;
        self.uniform_capacity = capacity;
        log::debug!("Uniform buffer grown to {} draws", capacity);
    }

    fn write_uniforms(&self) {
        let draws = self.draw_list.draws();
        if draws.is_empty() {
            return;
        }
        let stride = self.uniform_stride as usize;
        let mut bytes = vec![0u8; stride * draws.len()];
        for (i, draw) in draws.iter().enumerate() {
            let start = i * stride;
            bytes[start..start + DrawUniforms::SIZE]
                .copy_from_slice(bytemuck::bytes_of(&draw.uniforms));
        }
        self.queue.write_buffer(&self.uniform_buffer, 0, &bytes);
    }

    fn prepare_texture_bind_groups(&mut self) {
        for draw in self.draw_list.draws() {
            if self.texture_bind_groups.contains_key(&draw.textures) {
                continue;
            }
            let view_2d = |handle: Option<TextureHandle>| {
                handle
                    .and_then(|h| self.textures.get(h.0 as usize))
                    .map_or(&self.white.view, |t| &t.view)
            };
            let cube = draw
                .textures
                .cube
                .and_then(|h| self.textures.get(h.0 as usize))
                .map_or(&self.black_cube.view, |t| &t.view);

            let bind_group = self.device.create_bind_group(&wgpu::BindGroupDescriptor {
                label: Some("Textures Bind Group"),
                layout: &self.texture_layout,
                entries: &[
                    wgpu::BindGroupEntry {
                        binding: 0,
                        resource: wgpu::BindingResource::TextureView(view_2d(
                            draw.textures.diffuse,
                        )),
                    },
                    wgpu::BindGroupEntry {
                        binding: 1,
                        resource: wgpu::BindingResource::TextureView(view_2d(
                            draw.textures.specular,
                        )),
                    },
                    wgpu::BindGroupEntry {
                        binding: 2,
                        resource: wgpu::BindingResource::TextureView(cube),
                    },
                    wgpu::BindGroupEntry {
                        binding: 3,
                        resource: wgpu::BindingResource::Sampler(&self.repeat_sampler),
                    },
                    wgpu::BindGroupEntry {
                        binding: 4,
                        resource: wgpu::BindingResource::Sampler(&self.clamp_sampler),
                    },
                ],
            });
            self.texture_bind_groups.insert(draw.textures, bind_group);
        }
    }

    /// Replays the recorded draws into the surface and presents it.
    fn render_frame(&mut self) {
        let surface_texture = match self.surface.get_current_texture() {
            Ok(texture) => texture,
            Err(wgpu::SurfaceError::Lost | wgpu::SurfaceError::Outdated) => {
                log::debug!("Surface lost, reconfiguring");
                self.surface.configure(&self.device, &self.config);
                return;
            }
            Err(e) => {
                log::warn!("Dropped frame: {}", e);
                return;
            }
        };
        let surface_texture_view = surface_texture
            .texture
            .create_view(&wgpu::TextureViewDescriptor::default());

        self.ensure_uniform_capacity(self.draw_list.draws().len());
        self.write_uniforms();
        self.pipeline_manager
            .prepare(self.draw_list.draws().iter().map(|d| &d.key));
        self.prepare_texture_bind_groups();

        let mut encoder = self
            .device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("Render Encoder"),
            });

        {
            let mut render_pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
                label: Some("Scene Render Pass"),
                color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                    view: &surface_texture_view,
                    resolve_target: None,
                    ops: wgpu::Operations {
                        load: wgpu::LoadOp::Clear(CLEAR_COLOR),
                        store: wgpu::StoreOp::Store,
                    },
                })],
                depth_stencil_attachment: Some(wgpu::RenderPassDepthStencilAttachment {
                    view: &self.depth_stencil.view,
                    depth_ops: Some(wgpu::Operations {
                        load: wgpu::LoadOp::Clear(1.0),
                        store: wgpu::StoreOp::Store,
                    }),
                    stencil_ops: Some(wgpu::Operations {
                        load: wgpu::LoadOp::Clear(0),
                        store: wgpu::StoreOp::Store,
                    }),
                }),
                occlusion_query_set: None,
                timestamp_writes: None,
            });

            for (i, draw) in self.draw_list.draws().iter().enumerate() {
                let (Some(pipeline), Some(textures), Some(mesh)) = (
                    self.pipeline_manager.get_pipeline(&draw.key),
                    self.texture_bind_groups.get(&draw.textures),
                    self.meshes.get(draw.mesh.0 as usize),
                ) else {
                    continue;
                };
                if mesh.index_count == 0 {
                    continue;
                }

                let offset = (i as u64 * self.uniform_stride) as u32;
                render_pass.set_pipeline(pipeline);
                render_pass.set_bind_group(0, &self.uniform_bind_group, &[offset]);
                render_pass.set_bind_group(1, textures, &[]);
                render_pass.set_stencil_reference(u32::from(draw.stencil_tag));

                match draw.keyframes {
                    Some(KeyframeOffsets { current, next }) => {
                        render_pass.set_vertex_buffer(0, mesh.vertex_buffer.slice(current..));
                        render_pass.set_vertex_buffer(1, mesh.vertex_buffer.slice(next..));
                    }
                    None => render_pass.set_vertex_buffer(0, mesh.vertex_buffer.slice(..)),
                }
                render_pass.set_index_buffer(mesh.index_buffer.slice(..), wgpu::IndexFormat::Uint32);
                render_pass.draw_indexed(0..mesh.index_count, 0, 0..1);
            }
        }

        self.queue.submit(std::iter::once(encoder.finish()));
        surface_texture.present();
    }
}

impl RenderSink for RenderEngine {
    fn begin_frame(&mut self) {
        self.draw_list.begin_frame();
    }

    fn end_frame(&mut self) {
        self.render_frame();
    }

    /// Resizes the surface and the depth-stencil target
    ///
    /// Zero dimensions are ignored.
    fn resize(&mut self, width: u32, height: u32) {
        if width == 0 || height == 0 {
            return;
        }
        self.config.width = width;
        self.config.height = height;
        self.surface.configure(&self.device, &self.config);
        self.depth_stencil =
            TextureResource::create_depth_stencil_texture(&self.device, &self.config, "depth_stencil");
    }

    fn create_program(
        &mut self,
        name: &str,
        vertex: &Path,
        fragment: &Path,
    ) -> Result<ProgramHandle> {
        let mut source = COMMON_WGSL.to_string();
        for path in [vertex, fragment] {
            let stage = std::fs::read_to_string(path).map_err(|source| LoadError::Io {
                path: path.to_path_buf(),
                source,
            })?;
            source.push('\n');
            source.push_str(&stage);
        }

        self.pipeline_manager
            .load_shader(name, &source)
            .map_err(|message| LoadError::Shader {
                name: name.to_string(),
                message,
            })?;
        log::debug!("Compiled program '{}'", name);
        Ok(self.draw_list.add_program())
    }

    fn load_texture(&mut self, path: &Path) -> Result<TextureHandle> {
        let texture = TextureResource::from_path(&self.device, &self.queue, path)?;
        Ok(self.push_texture(texture))
    }

    fn load_cubemap(&mut self, faces: &[&Path; 6]) -> Result<TextureHandle> {
        let texture = TextureResource::cube_from_paths(&self.device, &self.queue, faces)?;
        Ok(self.push_texture(texture))
    }

    fn upload_mesh(&mut self, geometry: &MeshGeometry) -> Result<MeshHandle> {
        let vertex_buffer = self
            .device
            .create_buffer_init(&wgpu::util::BufferInitDescriptor {
                label: Some("Vertex Buffer"),
                contents: bytemuck::cast_slice(&geometry.vertices),
                usage: wgpu::BufferUsages::VERTEX,
            });
        let index_buffer = self
            .device
            .create_buffer_init(&wgpu::util::BufferInitDescriptor {
                label: Some("Index Buffer"),
                contents: bytemuck::cast_slice(&geometry.indices),
                usage: wgpu::BufferUsages::INDEX,
            });
        self.meshes.push(GpuMesh {
            vertex_buffer,
            index_buffer,
            index_count: geometry.indices.len() as u32,
        });
        Ok(MeshHandle(self.meshes.len() as u32 - 1))
    }

    fn use_program(&mut self, program: ProgramHandle) {
        self.draw_list.use_program(program);
    }

    fn set_uniform(&mut self, name: &str, value: UniformValue) {
        self.draw_list.set_uniform(name, value);
    }

    fn bind_material(&mut self, material: &Material) {
        self.draw_list.bind_material(material);
    }

    fn bind_texture(&mut self, unit: u32, texture: TextureHandle) {
        match self.textures.get(texture.0 as usize) {
            Some(resource) => self
                .draw_list
                .bind_texture(unit, texture, resource.dimension),
            None => log::warn!("Unknown texture {:?}", texture),
        }
    }

    fn set_depth_test(&mut self, enabled: bool) {
        self.draw_list.set_depth_test(enabled);
    }

    fn set_blending(&mut self, enabled: bool) {
        self.draw_list.set_blending(enabled);
    }

    fn set_stencil_tag(&mut self, tag: u8) {
        self.draw_list.set_stencil_tag(Some(tag));
    }

    fn clear_stencil_tag(&mut self) {
        self.draw_list.set_stencil_tag(None);
    }

    fn draw_mesh(&mut self, mesh: MeshHandle) {
        self.draw_list.push(mesh, None);
    }

    fn draw_keyframes(&mut self, mesh: MeshHandle, current_offset: usize, next_offset: usize) {
        self.draw_list.push(
            mesh,
            Some(KeyframeOffsets {
                current: current_offset as u64,
                next: next_offset as u64,
            }),
        );
    }
}

impl PickBuffer for RenderEngine {
    /// Copies one stencil texel of the last presented frame back to the CPU.
    fn read_pick_id(&self, x: u32, y: u32) -> u8 {
        let Some((column, row)) = pick_texel(x, y, self.config.width, self.config.height) else {
            return 0;
        };

        let staging_buffer = self.device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("Pick Readback Buffer"),
            size: u64::from(PICK_ROW_BYTES),
            usage: wgpu::BufferUsages::COPY_DST | wgpu::BufferUsages::MAP_READ,
            mapped_at_creation: false,
        });

        let mut encoder = self
            .device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("Pick Encoder"),
            });
        encoder.copy_texture_to_buffer(
            wgpu::TexelCopyTextureInfo {
                texture: &self.depth_stencil.texture,
                mip_level: 0,
                origin: wgpu::Origin3d {
                    x: column,
                    y: row,
                    z: 0,
                },
                aspect: wgpu::TextureAspect::StencilOnly,
            },
            wgpu::TexelCopyBufferInfo {
                buffer: &staging_buffer,
                layout: wgpu::TexelCopyBufferLayout {
                    offset: 0,
                    bytes_per_row: Some(PICK_ROW_BYTES),
                    rows_per_image: Some(1),
                },
            },
            wgpu::Extent3d {
                width: 1,
                height: 1,
                depth_or_array_layers: 1,
            },
        );
        self.queue.submit(std::iter::once(encoder.finish()));

        let slice = staging_buffer.slice(..);
        let (tx, rx) = futures::channel::oneshot::channel();
        slice.map_async(wgpu::MapMode::Read, move |result| {
            let _ = tx.send(result);
        });

        let _ = self.device.poll(wgpu::PollType::Wait);

        match futures::executor::block_on(rx) {
            Ok(Ok(())) => {
                let mapped = slice.get_mapped_range();
                let tag = mapped.first().copied().unwrap_or(0);
                drop(mapped);
                staging_buffer.unmap();
                tag
            }
            _ => {
                log::warn!("Failed to read back pick tag at ({}, {})", x, y);
                0
            }
        }
    }
}

/// Texel for a window position with the origin at the bottom left, or
/// `None` outside a `width` x `height` target.
pub fn pick_texel(x: u32, y: u32, width: u32, height: u32) -> Option<(u32, u32)> {
    (x < width && y < height).then(|| (x, height - 1 - y))
}

/// Distance between per-draw blocks in the dynamic uniform buffer.
pub fn uniform_stride(alignment: u32) -> u64 {
    let alignment = u64::from(alignment.max(1));
    (DrawUniforms::SIZE as u64).div_ceil(alignment) * alignment
}

fn create_uniform_buffer(
    device: &wgpu::Device,
    layout: &wgpu::BindGroupLayout,
    stride: u64,
    capacity: usize,
) -> (wgpu::Buffer, wgpu::BindGroup) {
    let buffer = device.create_buffer(&wgpu::BufferDescriptor {
        label: Some("Draw Uniforms Buffer"),
        size: stride * capacity as u64,
        usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
        mapped_at_creation: false,
    });
    let bind_group = device.create_bind_group(&wgpu::BindGroupDescriptor {
        label: Some("Draw Uniforms Bind Group"),
        layout,
        entries: &[wgpu::BindGroupEntry {
            binding: 0,
            resource: wgpu::BindingResource::Buffer(wgpu::BufferBinding {
                buffer: &buffer,
                offset: 0,
                size: NonZeroU64::new(DrawUniforms::SIZE as u64),
            }),
        }],
    });
    (buffer, bind_group)
}
