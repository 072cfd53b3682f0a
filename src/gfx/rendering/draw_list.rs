//! Frame draw list of the wgpu backend.
//!
//! The scene issues state changes one call at a time. Each program keeps
//! its own parameter block across frames, the same way a linked shader
//! program keeps its uniforms, while texture bindings and fixed-function
//! switches are shared. Every draw snapshots the current state into a
//! [`DrawCall`] that the engine replays inside a single render pass.

use crate::gfx::rendering::pipeline_manager::PipelineKey;
use crate::gfx::rendering::sink::{MeshHandle, ProgramHandle, TextureHandle, UniformValue};
use crate::gfx::rendering::uniforms::DrawUniforms;
use crate::gfx::resources::material::Material;
use crate::gfx::resources::texture_resource::TextureDimension;

/// Textures bound for a draw. 2D units 0 and 1 map to the diffuse and
/// specular slots; cube maps have a slot of their own.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct TextureSlots {
    pub diffuse: Option<TextureHandle>,
    pub specular: Option<TextureHandle>,
    pub cube: Option<TextureHandle>,
}

impl TextureSlots {
    /// Returns `false` when `unit` has no 2D slot.
    pub fn bind(&mut self, unit: u32, texture: TextureHandle, dimension: TextureDimension) -> bool {
        let slot = match (dimension, unit) {
            (TextureDimension::Cube, _) => &mut self.cube,
            (TextureDimension::D2, 0) => &mut self.diffuse,
            (TextureDimension::D2, 1) => &mut self.specular,
            _ => return false,
        };
        *slot = Some(texture);
        true
    }
}

/// Byte offsets of the current and next keyframe in a packed stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct KeyframeOffsets {
    pub current: u64,
    pub next: u64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct DrawCall {
    pub key: PipelineKey,
    pub uniforms: DrawUniforms,
    pub textures: TextureSlots,
    pub mesh: MeshHandle,
    pub keyframes: Option<KeyframeOffsets>,
    pub stencil_tag: u8,
}

#[derive(Debug)]
pub struct DrawList {
    programs: Vec<DrawUniforms>,
    current: Option<ProgramHandle>,
    depth_test: bool,
    blending: bool,
    stencil_tag: Option<u8>,
    textures: TextureSlots,
    draws: Vec<DrawCall>,
}

impl Default for DrawList {
    fn default() -> Self {
        Self {
            programs: Vec::new(),
            current: None,
            depth_test: true,
            blending: false,
            stencil_tag: None,
            textures: TextureSlots::default(),
            draws: Vec::new(),
        }
    }
}

impl DrawList {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a program with a default parameter block.
    pub fn add_program(&mut self) -> ProgramHandle {
        self.programs.push(DrawUniforms::default());
        ProgramHandle(self.programs.len() as u32 - 1)
    }

    /// Drops the previous frame's draws. Program parameters persist.
    pub fn begin_frame(&mut self) {
        self.draws.clear();
    }

    pub fn draws(&self) -> &[DrawCall] {
        &self.draws
    }

    pub fn program_uniforms(&self, program: ProgramHandle) -> Option<&DrawUniforms> {
        self.programs.get(program.0 as usize)
    }

    pub fn use_program(&mut self, program: ProgramHandle) {
        if self.program_uniforms(program).is_none() {
            log::warn!("Unknown program {:?}", program);
            self.current = None;
            return;
        }
        self.current = Some(program);
    }

    fn current_uniforms(&mut self) -> Option<&mut DrawUniforms> {
        let program = self.current?;
        self.programs.get_mut(program.0 as usize)
    }

    pub fn set_uniform(&mut self, name: &str, value: UniformValue) {
        let Some(uniforms) = self.current_uniforms() else {
            log::warn!("Uniform '{}' set with no program selected", name);
            return;
        };
        if !uniforms.apply(name, value) {
            log::trace!("Ignoring uniform '{}' = {:?}", name, value);
        }
    }

    pub fn bind_material(&mut self, material: &Material) {
        if let Some(uniforms) = self.current_uniforms() {
            uniforms.bind_material(material);
        }
    }

    pub fn bind_texture(&mut self, unit: u32, texture: TextureHandle, dimension: TextureDimension) {
        if !self.textures.bind(unit, texture, dimension) {
            log::warn!("No texture slot for unit {}", unit);
        }
    }

    pub fn set_depth_test(&mut self, enabled: bool) {
        self.depth_test = enabled;
    }

    pub fn set_blending(&mut self, enabled: bool) {
        self.blending = enabled;
    }

    pub fn set_stencil_tag(&mut self, tag: Option<u8>) {
        self.stencil_tag = tag;
    }

    /// Records a draw of `mesh` with the current state.
    pub fn push(&mut self, mesh: MeshHandle, keyframes: Option<KeyframeOffsets>) {
        let Some(program) = self.current else {
            log::warn!("Draw of {:?} with no program selected", mesh);
            return;
        };
        let Some(uniforms) = self.program_uniforms(program).copied() else {
            return;
        };
        let key = PipelineKey {
            program: program.0,
            depth_test: self.depth_test,
            blending: self.blending,
            stencil_write: self.stencil_tag.is_some(),
            keyframes: keyframes.is_some(),
        };
        self.draws.push(DrawCall {
            key,
            uniforms,
            textures: self.textures,
            mesh,
            keyframes,
            stencil_tag: self.stencil_tag.unwrap_or(0),
        });
    }
}
