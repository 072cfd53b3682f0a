//! Render pipeline management for the wgpu backend
//!
//! A scene program is one compiled shader module. The fixed-function
//! switches the scene toggles between draws (depth test, blending, stencil
//! tagging, keyframe streams) become pipeline variants, created lazily on
//! first use and cached by [`PipelineKey`].

use std::collections::HashMap;
use std::sync::Arc;

use wgpu::*;

use crate::gfx::resources::texture_resource::TextureResource;
use crate::gfx::scene::vertex::Vertex3D;

/// Render state a pipeline variant bakes in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct PipelineKey {
    pub program: u32,
    pub depth_test: bool,
    pub blending: bool,
    /// Writes the stencil reference where fragments pass.
    pub stencil_write: bool,
    /// Reads a second vertex stream for the next keyframe.
    pub keyframes: bool,
}

impl PipelineKey {
    pub fn depth_stencil_state(&self) -> DepthStencilState {
        let stencil = if self.stencil_write {
            let face = StencilFaceState {
                compare: CompareFunction::Always,
                fail_op: StencilOperation::Keep,
                depth_fail_op: StencilOperation::Keep,
                pass_op: StencilOperation::Replace,
            };
            StencilState {
                front: face,
                back: face,
                read_mask: 0xff,
                write_mask: 0xff,
            }
        } else {
            StencilState::default()
        };

        DepthStencilState {
            format: TextureResource::DEPTH_STENCIL_FORMAT,
            depth_write_enabled: self.depth_test,
            depth_compare: if self.depth_test {
                CompareFunction::Less
            } else {
                CompareFunction::Always
            },
            stencil,
            bias: DepthBiasState::default(),
        }
    }

    pub fn blend_state(&self) -> Option<BlendState> {
        self.blending.then_some(BlendState::ALPHA_BLENDING)
    }
}

/// Caches pipeline variants per program
pub struct PipelineManager {
    device: Arc<Device>,
    layout: PipelineLayout,
    color_format: TextureFormat,
    shader_modules: Vec<ShaderModule>,
    pipelines: HashMap<PipelineKey, RenderPipeline>,
}

impl PipelineManager {
    /// Creates a new pipeline manager
    ///
    /// # Arguments
    /// * `device` - Shared wgpu device for creating resources
    /// * `bind_group_layouts` - Uniform and texture layouts shared by every program
    /// * `color_format` - Surface format pipelines render into
    pub fn new(
        device: Arc<Device>,
        bind_group_layouts: &[&BindGroupLayout],
        color_format: TextureFormat,
    ) -> Self {
        let layout = device.create_pipeline_layout(&PipelineLayoutDescriptor {
            label: Some("Scene Pipeline Layout"),
            bind_group_layouts,
            push_constant_ranges: &[],
        });
        Self {
            device,
            layout,
            color_format,
            shader_modules: Vec::new(),
            pipelines: HashMap::new(),
        }
    }

    /// Compiles a WGSL program and returns its index.
    ///
    /// Validation errors are captured and returned instead of reaching the
    /// device's uncaptured error handler.
    pub fn load_shader(&mut self, name: &str, source: &str) -> Result<u32, String> {
        self.device.push_error_scope(ErrorFilter::Validation);
        let module = self.device.create_shader_module(ShaderModuleDescriptor {
            label: Some(name),
            source: ShaderSource::Wgsl(source.into()),
        });
        if let Some(error) = pollster::block_on(self.device.pop_error_scope()) {
            return Err(error.to_string());
        }

        self.shader_modules.push(module);
        Ok(self.shader_modules.len() as u32 - 1)
    }

    /// Creates the variants for `keys` that do not exist yet.
    pub fn prepare<'a>(&mut self, keys: impl IntoIterator<Item = &'a PipelineKey>) {
        for key in keys {
            if self.pipelines.contains_key(key) {
                continue;
            }
            match self.create_pipeline(key) {
                Some(pipeline) => {
                    log::debug!("Created pipeline {:?}", key);
                    self.pipelines.insert(*key, pipeline);
                }
                None => log::error!("No shader module for pipeline {:?}", key),
            }
        }
    }

    /// Returns a variant created by [`PipelineManager::prepare`].
    pub fn get_pipeline(&self, key: &PipelineKey) -> Option<&RenderPipeline> {
        self.pipelines.get(key)
    }

    pub fn pipeline_count(&self) -> usize {
        self.pipelines.len()
    }

    fn create_pipeline(&self, key: &PipelineKey) -> Option<RenderPipeline> {
        let shader = self.shader_modules.get(key.program as usize)?;

        let vertex_buffers = if key.keyframes {
            vec![Vertex3D::desc(), Vertex3D::next_frame_desc()]
        } else {
            vec![Vertex3D::desc()]
        };
        let targets = [Some(ColorTargetState {
            format: self.color_format,
            blend: key.blend_state(),
            write_mask: ColorWrites::ALL,
        })];

        Some(self.device.create_render_pipeline(&RenderPipelineDescriptor {
            label: Some(&format!("Program {} Pipeline", key.program)),
            layout: Some(&self.layout),
            vertex: VertexState {
                module: shader,
                entry_point: Some("vs_main"),
                buffers: &vertex_buffers,
                compilation_options: PipelineCompilationOptions::default(),
            },
            fragment: Some(FragmentState {
                module: shader,
                entry_point: Some("fs_main"),
                targets: &targets,
                compilation_options: PipelineCompilationOptions::default(),
            }),
            primitive: PrimitiveState {
                topology: PrimitiveTopology::TriangleList,
                strip_index_format: None,
                front_face: FrontFace::Ccw,
                cull_mode: None,
                polygon_mode: PolygonMode::Fill,
                unclipped_depth: false,
                conservative: false,
            },
            depth_stencil: Some(key.depth_stencil_state()),
            multisample: MultisampleState::default(),
            multiview: None,
            cache: None,
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn key() -> PipelineKey {
        PipelineKey {
            program: 0,
            depth_test: true,
            blending: false,
            stencil_write: false,
            keyframes: false,
        }
    }

    #[test]
    fn test_disabled_depth_test_neither_tests_nor_writes() {
        let state = PipelineKey {
            depth_test: false,
            ..key()
        }
        .depth_stencil_state();
        assert_eq!(state.depth_compare, CompareFunction::Always);
        assert!(!state.depth_write_enabled);

        let state = key().depth_stencil_state();
        assert_eq!(state.depth_compare, CompareFunction::Less);
        assert!(state.depth_write_enabled);
    }

    #[test]
    fn test_stencil_written_only_for_tagged_draws() {
        let untagged = key().depth_stencil_state();
        assert_eq!(untagged.stencil.write_mask, 0);

        let tagged = PipelineKey {
            stencil_write: true,
            ..key()
        }
        .depth_stencil_state();
        assert_eq!(tagged.stencil.write_mask, 0xff);
        assert_eq!(tagged.stencil.front.pass_op, StencilOperation::Replace);
        assert_eq!(tagged.stencil.back.compare, CompareFunction::Always);
    }

    #[test]
    fn test_blending_variant() {
        assert_eq!(key().blend_state(), None);
        assert_eq!(
            PipelineKey {
                blending: true,
                ..key()
            }
            .blend_state(),
            Some(BlendState::ALPHA_BLENDING)
        );
    }
}
