//! Command-recording backend.
//!
//! Stores every call in order instead of talking to a GPU, so tests can
//! inspect what the scene issued.

use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};

use crate::error::{LoadError, Result};
use crate::gfx::rendering::sink::{
    MeshHandle, PickBuffer, ProgramHandle, RenderSink, TextureHandle, UniformValue,
};
use crate::gfx::resources::material::Material;
use crate::gfx::resources::mesh::MeshGeometry;

#[derive(Debug, Clone, PartialEq)]
pub enum RenderCommand {
    UseProgram(ProgramHandle),
    SetUniform { name: String, value: UniformValue },
    BindMaterial(Material),
    BindTexture { unit: u32, texture: TextureHandle },
    DepthTest(bool),
    Blending(bool),
    StencilTag(u8),
    ClearStencilTag,
    DrawMesh(MeshHandle),
    DrawKeyframes {
        mesh: MeshHandle,
        current_offset: usize,
        next_offset: usize,
    },
}

#[derive(Debug, Default)]
pub struct RecordingSink {
    commands: Vec<RenderCommand>,
    programs: Vec<String>,
    textures: Vec<PathBuf>,
    meshes: Vec<usize>,
    failing_paths: HashSet<PathBuf>,
    picks: HashMap<(u32, u32), u8>,
    frames_finished: usize,
    target_size: Option<(u32, u32)>,
}

impl RecordingSink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes texture and program creation fail for `path`.
    pub fn fail_on(&mut self, path: impl Into<PathBuf>) {
        self.failing_paths.insert(path.into());
    }

    /// Pretends the previous frame wrote `id` into the stencil at `(x, y)`.
    pub fn set_pick(&mut self, x: u32, y: u32, id: u8) {
        self.picks.insert((x, y), id);
    }

    pub fn commands(&self) -> &[RenderCommand] {
        &self.commands
    }

    pub fn clear_commands(&mut self) {
        self.commands.clear();
    }

    pub fn program_name(&self, program: ProgramHandle) -> Option<&str> {
        self.programs.get(program.0 as usize).map(String::as_str)
    }

    pub fn texture_path(&self, texture: TextureHandle) -> Option<&Path> {
        self.textures.get(texture.0 as usize).map(PathBuf::as_path)
    }

    /// Frames closed by `end_frame`.
    pub fn frames_finished(&self) -> usize {
        self.frames_finished
    }

    /// Size passed to the last `resize`.
    pub fn target_size(&self) -> Option<(u32, u32)> {
        self.target_size
    }

    pub fn mesh_count(&self) -> usize {
        self.meshes.len()
    }

    /// Vertex count of an uploaded mesh.
    pub fn mesh_vertices(&self, mesh: MeshHandle) -> Option<usize> {
        self.meshes.get(mesh.0 as usize).copied()
    }

    /// Programs selected by `use_program`, in call order.
    pub fn program_sequence(&self) -> Vec<&str> {
        self.commands
            .iter()
            .filter_map(|c| match c {
                RenderCommand::UseProgram(p) => self.program_name(*p),
                _ => None,
            })
            .collect()
    }

    /// Every value set for `name`, in call order.
    pub fn uniform_values(&self, name: &str) -> Vec<UniformValue> {
        self.commands
            .iter()
            .filter_map(|c| match c {
                RenderCommand::SetUniform { name: n, value } if n == name => Some(*value),
                _ => None,
            })
            .collect()
    }

    pub fn last_uniform(&self, name: &str) -> Option<UniformValue> {
        self.uniform_values(name).pop()
    }

    pub fn draw_count(&self) -> usize {
        self.commands
            .iter()
            .filter(|c| {
                matches!(
                    c,
                    RenderCommand::DrawMesh(_) | RenderCommand::DrawKeyframes { .. }
                )
            })
            .count()
    }

    fn check_path(&self, path: &Path) -> std::result::Result<(), String> {
        if self.failing_paths.contains(path) {
            Err("backend rejected the resource".to_string())
        } else {
            Ok(())
        }
    }
}

impl RenderSink for RecordingSink {
    /// Drops the previous frame's commands.
    fn begin_frame(&mut self) {
        self.commands.clear();
    }

    fn end_frame(&mut self) {
        self.frames_finished += 1;
    }

    fn resize(&mut self, width: u32, height: u32) {
        self.target_size = Some((width, height));
    }

    fn create_program(
        &mut self,
        name: &str,
        vertex: &Path,
        fragment: &Path,
    ) -> Result<ProgramHandle> {
        for path in [vertex, fragment] {
            self.check_path(path).map_err(|message| LoadError::Shader {
                name: name.to_string(),
                message,
            })?;
        }
        self.programs.push(name.to_string());
        Ok(ProgramHandle(self.programs.len() as u32 - 1))
    }

    fn load_texture(&mut self, path: &Path) -> Result<TextureHandle> {
        self.check_path(path).map_err(|message| LoadError::Texture {
            path: path.to_path_buf(),
            message,
        })?;
        self.textures.push(path.to_path_buf());
        Ok(TextureHandle(self.textures.len() as u32 - 1))
    }

    fn load_cubemap(&mut self, faces: &[&Path; 6]) -> Result<TextureHandle> {
        for face in faces {
            self.check_path(face).map_err(|message| LoadError::Texture {
                path: face.to_path_buf(),
                message,
            })?;
        }
        self.textures.push(faces[0].to_path_buf());
        Ok(TextureHandle(self.textures.len() as u32 - 1))
    }

    fn upload_mesh(&mut self, geometry: &MeshGeometry) -> Result<MeshHandle> {
        self.meshes.push(geometry.vertex_count());
        Ok(MeshHandle(self.meshes.len() as u32 - 1))
    }

    fn use_program(&mut self, program: ProgramHandle) {
        self.commands.push(RenderCommand::UseProgram(program));
    }

    fn set_uniform(&mut self, name: &str, value: UniformValue) {
        self.commands.push(RenderCommand::SetUniform {
            name: name.to_string(),
            value,
        });
    }

    fn bind_material(&mut self, material: &Material) {
        self.commands.push(RenderCommand::BindMaterial(*material));
    }

    fn bind_texture(&mut self, unit: u32, texture: TextureHandle) {
        self.commands
            .push(RenderCommand::BindTexture { unit, texture });
    }

    fn set_depth_test(&mut self, enabled: bool) {
        self.commands.push(RenderCommand::DepthTest(enabled));
    }

    fn set_blending(&mut self, enabled: bool) {
        self.commands.push(RenderCommand::Blending(enabled));
    }

    fn set_stencil_tag(&mut self, tag: u8) {
        self.commands.push(RenderCommand::StencilTag(tag));
    }

    fn clear_stencil_tag(&mut self) {
        self.commands.push(RenderCommand::ClearStencilTag);
    }

    fn draw_mesh(&mut self, mesh: MeshHandle) {
        self.commands.push(RenderCommand::DrawMesh(mesh));
    }

    fn draw_keyframes(&mut self, mesh: MeshHandle, current_offset: usize, next_offset: usize) {
        self.commands.push(RenderCommand::DrawKeyframes {
            mesh,
            current_offset,
            next_offset,
        });
    }
}

impl PickBuffer for RecordingSink {
    fn read_pick_id(&self, x: u32, y: u32) -> u8 {
        self.picks.get(&(x, y)).copied().unwrap_or(0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gfx::rendering::sink::set;

    #[test]
    fn test_records_commands_in_order() {
        let mut sink = RecordingSink::new();
        let program = sink
            .create_program("light", Path::new("v.wgsl"), Path::new("f.wgsl"))
            .unwrap();
        sink.use_program(program);
        set(&mut sink, "IsWater", true);
        sink.set_depth_test(false);

        assert_eq!(sink.program_sequence(), vec!["light"]);
        assert_eq!(sink.last_uniform("IsWater"), Some(UniformValue::Bool(true)));
        assert_eq!(sink.commands().len(), 3);
    }

    #[test]
    fn test_failing_texture() {
        let mut sink = RecordingSink::new();
        sink.fail_on("missing.png");
        assert!(matches!(
            sink.load_texture(Path::new("missing.png")),
            Err(LoadError::Texture { .. })
        ));
        assert!(sink.load_texture(Path::new("ok.png")).is_ok());
    }

    #[test]
    fn test_pick_defaults_to_zero() {
        let mut sink = RecordingSink::new();
        sink.set_pick(10, 20, 2);
        assert_eq!(sink.read_pick_id(10, 20), 2);
        assert_eq!(sink.read_pick_id(0, 0), 0);
    }
}
