//! # Vertex Data Structures
//!
//! The single vertex layout shared by static meshes and keyframed meshes.

/// A 3D vertex with position, normal and texture coordinates.
///
/// `#[repr(C)]` and `Pod` let a slice of vertices be handed to a render
/// backend as raw bytes. Keyframe offsets are computed from
/// [`Vertex3D::STRIDE`], so the layout must stay tightly packed.
///
/// ```
/// use diorama::gfx::scene::vertex::Vertex3D;
///
/// let vertex = Vertex3D {
///     position: [0.0, 1.0, 0.0],
///     normal: [0.0, 1.0, 0.0],
///     tex_coords: [0.5, 0.5],
/// };
/// assert_eq!(bytemuck::bytes_of(&vertex).len(), Vertex3D::STRIDE);
/// ```
#[repr(C)]
#[derive(Copy, Clone, Debug, Default, PartialEq, bytemuck::Pod, bytemuck::Zeroable)]
pub struct Vertex3D {
    pub position: [f32; 3],
    pub normal: [f32; 3],
    pub tex_coords: [f32; 2],
}

const ATTRIBUTES: [wgpu::VertexAttribute; 3] =
    wgpu::vertex_attr_array![0 => Float32x3, 1 => Float32x3, 2 => Float32x2];

/// Second keyframe stream of an animated mesh, read at locations 3 to 5.
const NEXT_FRAME_ATTRIBUTES: [wgpu::VertexAttribute; 3] =
    wgpu::vertex_attr_array![3 => Float32x3, 4 => Float32x3, 5 => Float32x2];

impl Vertex3D {
    /// Size of one vertex in bytes.
    pub const STRIDE: usize = std::mem::size_of::<Vertex3D>();

    /// Vertex buffer layout for wgpu pipelines: position, normal and
    /// texture coordinates at shader locations 0, 1 and 2.
    pub fn desc() -> wgpu::VertexBufferLayout<'static> {
        wgpu::VertexBufferLayout {
            array_stride: Self::STRIDE as wgpu::BufferAddress,
            step_mode: wgpu::VertexStepMode::Vertex,
            attributes: &ATTRIBUTES,
        }
    }

    /// Layout of the next-keyframe stream bound next to [`Vertex3D::desc`].
    pub fn next_frame_desc() -> wgpu::VertexBufferLayout<'static> {
        wgpu::VertexBufferLayout {
            array_stride: Self::STRIDE as wgpu::BufferAddress,
            step_mode: wgpu::VertexStepMode::Vertex,
            attributes: &NEXT_FRAME_ATTRIBUTES,
        }
    }

    pub fn new(position: [f32; 3], normal: [f32; 3], tex_coords: [f32; 2]) -> Self {
        Self {
            position,
            normal,
            tex_coords,
        }
    }
}
