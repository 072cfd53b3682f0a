//! Phong material parameters and the fixed per-role material table.

use crate::gfx::scene::object::ObjectRole;

/// Scalar Phong material. The shaders multiply these factors with the
/// light colours and the bound diffuse/specular textures.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Material {
    pub ambient: f32,
    pub diffuse: f32,
    pub specular: f32,
    pub shininess: f32,
}

impl Default for Material {
    fn default() -> Self {
        Self::new(0.15, 0.75, 0.5, 48.0)
    }
}

impl Material {
    pub const fn new(ambient: f32, diffuse: f32, specular: f32, shininess: f32) -> Self {
        Self {
            ambient,
            diffuse,
            specular,
            shininess,
        }
    }

    /// Material assigned to meshes first loaded by an object of `role`.
    pub fn for_role(role: ObjectRole) -> Self {
        match role {
            ObjectRole::House => Self::new(0.15, 0.75, 0.5, 42.0),
            ObjectRole::Church => Self::new(0.1, 0.75, 0.5, 36.0),
            ObjectRole::Revolver => Self::new(0.1, 0.85, 0.5, 32.0),
            _ => Self::default(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_material_table() {
        assert_eq!(Material::for_role(ObjectRole::House).shininess, 42.0);
        assert_eq!(Material::for_role(ObjectRole::Church).ambient, 0.1);
        assert_eq!(Material::for_role(ObjectRole::Revolver).diffuse, 0.85);
        assert_eq!(Material::for_role(ObjectRole::Water), Material::default());
        assert_eq!(Material::for_role(ObjectRole::Prop).shininess, 48.0);
    }
}
