//! Texture resource management for wgpu
//!
//! GPU textures for the scene's image files and cube maps, plus the
//! depth-stencil target that doubles as the picking buffer.

use std::path::Path;

use image::RgbaImage;

use crate::error::{LoadError, Result};

/// Whether a texture binds to a 2D slot or the cube map slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TextureDimension {
    D2,
    Cube,
}

/// GPU texture resource containing texture and view
pub struct TextureResource {
    pub texture: wgpu::Texture,
    pub view: wgpu::TextureView,
    pub dimension: TextureDimension,
}

impl TextureResource {
    /// Depth buffer format with an 8-bit stencil aspect for pick tags.
    pub const DEPTH_STENCIL_FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::Depth24PlusStencil8;

    pub const COLOR_FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::Rgba8UnormSrgb;

    /// Creates a depth-stencil texture matching the surface configuration.
    /// The stencil aspect can be copied out for picking.
    pub fn create_depth_stencil_texture(
        device: &wgpu::Device,
        config: &wgpu::SurfaceConfiguration,
        label: &str,
    ) -> Self {
        let texture = device.create_texture(&wgpu::TextureDescriptor {
            label: Some(label),
            size: wgpu::Extent3d {
                width: config.width,
                height: config.height,
                depth_or_array_layers: 1,
            },
            mip_level_count: 1,
            sample_count: 1,
            dimension: wgpu::TextureDimension::D2,
            format: Self::DEPTH_STENCIL_FORMAT,
            usage: wgpu::TextureUsages::RENDER_ATTACHMENT | wgpu::TextureUsages::COPY_SRC,
            view_formats: &[],
        });
        let view = texture.create_view(&wgpu::TextureViewDescriptor::default());

        Self {
            texture,
            view,
            dimension: TextureDimension::D2,
        }
    }

    /// Loads an image file into a 2D texture.
    pub fn from_path(device: &wgpu::Device, queue: &wgpu::Queue, path: &Path) -> Result<Self> {
        let image = decode_image(path)?;
        let label = path.display().to_string();
        Ok(Self::create_from_rgba_data(
            device,
            queue,
            image.as_raw(),
            image.width(),
            image.height(),
            &label,
        ))
    }

    /// Creates a 2D texture from raw RGBA data.
    pub fn create_from_rgba_data(
        device: &wgpu::Device,
        queue: &wgpu::Queue,
        data: &[u8],
        width: u32,
        height: u32,
        label: &str,
    ) -> Self {
        let size = wgpu::Extent3d {
            width,
            height,
            depth_or_array_layers: 1,
        };
        let texture = device.create_texture(&wgpu::TextureDescriptor {
            label: Some(label),
            size,
            mip_level_count: 1,
            sample_count: 1,
            dimension: wgpu::TextureDimension::D2,
            format: Self::COLOR_FORMAT,
            usage: wgpu::TextureUsages::TEXTURE_BINDING | wgpu::TextureUsages::COPY_DST,
            view_formats: &[],
        });
        write_layer(queue, &texture, data, width, height, 0);
        let view = texture.create_view(&wgpu::TextureViewDescriptor::default());

        Self {
            texture,
            view,
            dimension: TextureDimension::D2,
        }
    }

    /// Loads six equally sized images (+X, -X, +Y, -Y, +Z, -Z) into a cube map.
    pub fn cube_from_paths(
        device: &wgpu::Device,
        queue: &wgpu::Queue,
        faces: &[&Path; 6],
    ) -> Result<Self> {
        let (size, images) = decode_cube_faces(faces)?;
        Ok(Self::create_cube_from_faces(device, queue, &images, size, "skybox"))
    }

    /// Creates a cube map from six square RGBA faces of `size` pixels.
    pub fn create_cube_from_faces(
        device: &wgpu::Device,
        queue: &wgpu::Queue,
        faces: &[RgbaImage],
        size: u32,
        label: &str,
    ) -> Self {
        let texture = device.create_texture(&wgpu::TextureDescriptor {
            label: Some(label),
            size: wgpu::Extent3d {
                width: size,
                height: size,
                depth_or_array_layers: 6,
            },
            mip_level_count: 1,
            sample_count: 1,
            dimension: wgpu::TextureDimension::D2,
            format: Self::COLOR_FORMAT,
            usage: wgpu::TextureUsages::TEXTURE_BINDING | wgpu::TextureUsages::COPY_DST,
            view_formats: &[],
        });
        for (layer, face) in faces.iter().enumerate() {
            write_layer(queue, &texture, face.as_raw(), size, size, layer as u32);
        }
        let view = texture.create_view(&wgpu::TextureViewDescriptor {
            label: Some(label),
            dimension: Some(wgpu::TextureViewDimension::Cube),
            ..Default::default()
        });

        Self {
            texture,
            view,
            dimension: TextureDimension::Cube,
        }
    }

    /// 1x1 white texture bound to empty 2D slots.
    pub fn white(device: &wgpu::Device, queue: &wgpu::Queue) -> Self {
        Self::create_from_rgba_data(device, queue, &[255; 4], 1, 1, "white")
    }

    /// 1x1 black cube map bound when no skybox is loaded.
    pub fn black_cube(device: &wgpu::Device, queue: &wgpu::Queue) -> Self {
        let face = RgbaImage::from_pixel(1, 1, image::Rgba([0, 0, 0, 255]));
        let faces: Vec<RgbaImage> = (0..6).map(|_| face.clone()).collect();
        Self::create_cube_from_faces(device, queue, &faces, 1, "black cube")
    }
}

fn write_layer(
    queue: &wgpu::Queue,
    texture: &wgpu::Texture,
    data: &[u8],
    width: u32,
    height: u32,
    layer: u32,
) {
    queue.write_texture(
        wgpu::TexelCopyTextureInfo {
            texture,
            mip_level: 0,
            origin: wgpu::Origin3d {
                x: 0,
                y: 0,
                z: layer,
            },
            aspect: wgpu::TextureAspect::All,
        },
        data,
        wgpu::TexelCopyBufferLayout {
            offset: 0,
            bytes_per_row: Some(4 * width),
            rows_per_image: Some(height),
        },
        wgpu::Extent3d {
            width,
            height,
            depth_or_array_layers: 1,
        },
    );
}

/// Reads an image file as 8-bit RGBA.
pub fn decode_image(path: &Path) -> Result<RgbaImage> {
    let image = image::open(path).map_err(|e| LoadError::Texture {
        path: path.to_path_buf(),
        message: e.to_string(),
    })?;
    Ok(image.to_rgba8())
}

/// Decodes six cube faces and checks they are square and the same size.
pub fn decode_cube_faces(faces: &[&Path; 6]) -> Result<(u32, Vec<RgbaImage>)> {
    let mut images = Vec::with_capacity(6);
    let mut size = None;
    for face in faces {
        let image = decode_image(face)?;
        let expected = *size.get_or_insert(image.width());
        if image.width() != expected || image.height() != expected {
            return Err(LoadError::Texture {
                path: face.to_path_buf(),
                message: format!(
                    "cube face is {}x{}, expected {}x{}",
                    image.width(),
                    image.height(),
                    expected,
                    expected
                ),
            });
        }
        images.push(image);
    }
    Ok((size.unwrap_or(0), images))
}
