//! Per-draw uniform block of the wgpu backend.
//!
//! The scene addresses shader parameters by name (`"PVMMatrix"`,
//! `"pointLights[1].position"`, ...). [`DrawUniforms`] is the fixed block
//! those names land in; every shader program declares the same layout in
//! `shaders/common.wgsl`. Every member is a `vec4` or `mat4x4`, so the Rust
//! and WGSL layouts agree without padding fields.

use cgmath::{Matrix4, SquareMatrix};

use crate::gfx::rendering::sink::UniformValue;
use crate::gfx::resources::material::Material;

/// Point lights the block has room for.
pub const MAX_POINT_LIGHTS: usize = 4;

type Vec4 = [f32; 4];
type Mat4 = [[f32; 4]; 4];

#[repr(C)]
#[derive(Copy, Clone, Debug, Default, PartialEq, bytemuck::Pod, bytemuck::Zeroable)]
pub struct DirectionalLightBlock {
    pub direction: Vec4,
    pub ambient: Vec4,
    pub diffuse: Vec4,
    pub specular: Vec4,
}

#[repr(C)]
#[derive(Copy, Clone, Debug, Default, PartialEq, bytemuck::Pod, bytemuck::Zeroable)]
pub struct PointLightBlock {
    /// `w` is 1 while the light is on.
    pub position: Vec4,
    pub ambient: Vec4,
    pub diffuse: Vec4,
    pub specular: Vec4,
    /// constant, linear, quadratic
    pub attenuation: Vec4,
}

#[repr(C)]
#[derive(Copy, Clone, Debug, Default, PartialEq, bytemuck::Pod, bytemuck::Zeroable)]
pub struct SpotLightBlock {
    pub direction: Vec4,
    pub ambient: Vec4,
    pub diffuse: Vec4,
    pub specular: Vec4,
    /// constant, linear, quadratic, cosine of the cutoff angle
    pub attenuation: Vec4,
    /// exponent
    pub params: Vec4,
}

#[repr(C)]
#[derive(Copy, Clone, Debug, PartialEq, bytemuck::Pod, bytemuck::Zeroable)]
pub struct DrawUniforms {
    pub pvm: Mat4,
    pub model: Mat4,
    pub view: Mat4,
    pub water_transform: Mat4,
    pub fog_color: Vec4,
    /// min distance, max distance
    pub fog: Vec4,
    /// ambient, diffuse, specular, shininess
    pub material: Vec4,
    /// is water, has specular map, spotlight on, point light count
    pub flags: Vec4,
    /// keyframe blend factor, sprite frame
    pub animation: Vec4,
    pub directional: DirectionalLightBlock,
    pub spot: SpotLightBlock,
    pub point_lights: [PointLightBlock; MAX_POINT_LIGHTS],
}

impl Default for DrawUniforms {
    fn default() -> Self {
        let identity: Mat4 = Matrix4::<f32>::identity().into();
        let mut uniforms = Self {
            pvm: identity,
            model: identity,
            view: identity,
            water_transform: identity,
            fog_color: [0.0; 4],
            fog: [0.0, 1.0e6, 0.0, 0.0],
            material: [0.0; 4],
            flags: [0.0; 4],
            animation: [0.0; 4],
            directional: DirectionalLightBlock::default(),
            spot: SpotLightBlock::default(),
            point_lights: [PointLightBlock::default(); MAX_POINT_LIGHTS],
        };
        uniforms.bind_material(&Material::default());
        uniforms
    }
}

impl DrawUniforms {
    /// Size of the block in bytes.
    pub const SIZE: usize = std::mem::size_of::<DrawUniforms>();

    pub fn bind_material(&mut self, material: &Material) {
        self.material = [
            material.ambient,
            material.diffuse,
            material.specular,
            material.shininess,
        ];
    }

    /// Stores `value` under the shader parameter `name`. Sampler names are
    /// accepted and ignored; texture units are bound separately. Returns
    /// `false` for names or value types the block has no slot for.
    pub fn apply(&mut self, name: &str, value: UniformValue) -> bool {
        if let Some(rest) = name.strip_prefix("pointLights[") {
            return self.apply_point_light(rest, value);
        }
        if let Some(rest) = name.strip_prefix("isPointLightActive[") {
            let Some(light) = indexed(rest).and_then(|(i, _)| self.point_lights.get_mut(i))
            else {
                return false;
            };
            return set_scalar(&mut light.position[3], value);
        }
        if let Some(field) = name.strip_prefix("directionalLight.") {
            let light = &mut self.directional;
            return match field {
                "direction" => set_vec3(&mut light.direction, value),
                _ => apply_color(
                    &mut light.ambient,
                    &mut light.diffuse,
                    &mut light.specular,
                    field,
                    value,
                ),
            };
        }
        if let Some(field) = name.strip_prefix("spotLight.") {
            let light = &mut self.spot;
            return match field {
                "direction" => set_vec3(&mut light.direction, value),
                "constant" => set_scalar(&mut light.attenuation[0], value),
                "linear" => set_scalar(&mut light.attenuation[1], value),
                "quadratic" => set_scalar(&mut light.attenuation[2], value),
                "cutoff" => set_scalar(&mut light.attenuation[3], value),
                "exponent" => set_scalar(&mut light.params[0], value),
                _ => apply_color(
                    &mut light.ambient,
                    &mut light.diffuse,
                    &mut light.specular,
                    field,
                    value,
                ),
            };
        }

        match name {
            "PVM" | "PVMMatrix" => set_mat4(&mut self.pvm, value),
            "M" | "MMatrix" => set_mat4(&mut self.model, value),
            "V" | "VMatrix" => set_mat4(&mut self.view, value),
            "WaterTransform" => set_mat4(&mut self.water_transform, value),
            "fogColor" => set_vec4(&mut self.fog_color, value),
            "fogMinDistance" => set_scalar(&mut self.fog[0], value),
            "fogMaxDistance" => set_scalar(&mut self.fog[1], value),
            "IsWater" => set_scalar(&mut self.flags[0], value),
            "material.hasSpecular" => set_scalar(&mut self.flags[1], value),
            "isSpotlightActive" => set_scalar(&mut self.flags[2], value),
            "nOfPointLights" => set_scalar(&mut self.flags[3], value),
            "AnimationAlpha" => set_scalar(&mut self.animation[0], value),
            "frame" => set_scalar(&mut self.animation[1], value),
            "skyboxTexture" | "texture_diffuse1" | "texSampler" => true,
            _ if name.starts_with("material.diffuse") || name.starts_with("material.specular") => {
                true
            }
            _ => false,
        }
    }

    fn apply_point_light(&mut self, rest: &str, value: UniformValue) -> bool {
        let Some((index, field)) = indexed(rest) else {
            return false;
        };
        let Some(light) = self.point_lights.get_mut(index) else {
            return false;
        };
        match field.strip_prefix('.').unwrap_or(field) {
            "position" => set_vec3(&mut light.position, value),
            "constant" => set_scalar(&mut light.attenuation[0], value),
            "linear" => set_scalar(&mut light.attenuation[1], value),
            "quadratic" => set_scalar(&mut light.attenuation[2], value),
            field => apply_color(
                &mut light.ambient,
                &mut light.diffuse,
                &mut light.specular,
                field,
                value,
            ),
        }
    }
}

/// Splits `"3].rest"` into `(3, ".rest")`.
fn indexed(rest: &str) -> Option<(usize, &str)> {
    let (index, tail) = rest.split_once(']')?;
    Some((index.parse().ok()?, tail))
}

fn apply_color(
    ambient: &mut Vec4,
    diffuse: &mut Vec4,
    specular: &mut Vec4,
    field: &str,
    value: UniformValue,
) -> bool {
    match field {
        "ambientColor" => set_vec3(ambient, value),
        "diffuseColor" => set_vec3(diffuse, value),
        "specularColor" => set_vec3(specular, value),
        _ => false,
    }
}

fn set_scalar(slot: &mut f32, value: UniformValue) -> bool {
    *slot = match value {
        UniformValue::Bool(b) => f32::from(u8::from(b)),
        UniformValue::Int(i) => i as f32,
        UniformValue::Float(f) => f,
        _ => return false,
    };
    true
}

/// Keeps `w`, which some blocks use for a flag.
fn set_vec3(slot: &mut Vec4, value: UniformValue) -> bool {
    let UniformValue::Vec3(v) = value else {
        return false;
    };
    slot[..3].copy_from_slice(&[v.x, v.y, v.z]);
    true
}

fn set_vec4(slot: &mut Vec4, value: UniformValue) -> bool {
    let UniformValue::Vec4(v) = value else {
        return false;
    };
    *slot = v.into();
    true
}

fn set_mat4(slot: &mut Mat4, value: UniformValue) -> bool {
    match value {
        UniformValue::Mat4(m) => *slot = m.into(),
        UniformValue::Mat3(m) => *slot = Matrix4::from(m).into(),
        _ => return false,
    }
    true
}

#[cfg(test)]
mod tests {
    use super::*;
    use cgmath::{Matrix3, Vector3, Vector4};

    #[test]
    fn test_block_size_is_vec4_aligned() {
        assert_eq!(DrawUniforms::SIZE % 16, 0);
        assert_eq!(DrawUniforms::SIZE, 4 * 64 + 5 * 16 + 4 * 16 + 6 * 16 + 4 * 5 * 16);
    }

    #[test]
    fn test_matrix_aliases_share_a_slot() {
        let mut uniforms = DrawUniforms::default();
        let m = Matrix4::from_translation(Vector3::new(1.0, 2.0, 3.0));
        assert!(uniforms.apply("PVMMatrix", m.into()));
        assert_eq!(uniforms.pvm, Into::<[[f32; 4]; 4]>::into(m));
        assert!(uniforms.apply("PVM", Matrix4::identity().into()));
        assert_eq!(uniforms.pvm, Into::<[[f32; 4]; 4]>::into(Matrix4::<f32>::identity()));

        assert!(uniforms.apply("MMatrix", Matrix3::from_value(2.0).into()));
        assert_eq!(uniforms.model[0][0], 2.0);
        assert_eq!(uniforms.model[3][3], 1.0);
    }

    #[test]
    fn test_indexed_point_light_fields() {
        let mut uniforms = DrawUniforms::default();
        assert!(uniforms.apply("pointLights[1].position", Vector3::new(3.0, 4.0, 5.0).into()));
        assert!(uniforms.apply("isPointLightActive[1]", true.into()));
        assert!(uniforms.apply("pointLights[1].quadratic", 0.032f32.into()));
        assert!(uniforms.apply("pointLights[1].diffuseColor", Vector3::new(0.8, 0.8, 0.8).into()));

        let light = uniforms.point_lights[1];
        assert_eq!(light.position, [3.0, 4.0, 5.0, 1.0]);
        assert_eq!(light.attenuation[2], 0.032);
        assert_eq!(light.diffuse[..3], [0.8, 0.8, 0.8]);
        assert_eq!(uniforms.point_lights[0], PointLightBlock::default());

        assert!(!uniforms.apply("pointLights[9].position", Vector3::new(0.0, 0.0, 0.0).into()));
        assert!(!uniforms.apply("pointLights[x].position", Vector3::new(0.0, 0.0, 0.0).into()));
    }

    #[test]
    fn test_scalar_flags_and_fog() {
        let mut uniforms = DrawUniforms::default();
        assert!(uniforms.apply("IsWater", true.into()));
        assert!(uniforms.apply("nOfPointLights", 2.into()));
        assert!(uniforms.apply("frame", 6.into()));
        assert!(uniforms.apply("fogMaxDistance", 20.0f32.into()));
        assert!(uniforms.apply("fogColor", Vector4::new(0.1, 0.1, 0.2, 1.0).into()));

        assert_eq!(uniforms.flags, [1.0, 0.0, 0.0, 2.0]);
        assert_eq!(uniforms.animation[1], 6.0);
        assert_eq!(uniforms.fog[1], 20.0);
        assert_eq!(uniforms.fog_color, [0.1, 0.1, 0.2, 1.0]);
    }

    #[test]
    fn test_spotlight_and_material() {
        let mut uniforms = DrawUniforms::default();
        assert!(uniforms.apply("spotLight.cutoff", 0.94f32.into()));
        assert!(uniforms.apply("spotLight.exponent", 32.0f32.into()));
        assert!(uniforms.apply("spotLight.direction", Vector3::new(0.0, 0.0, -1.0).into()));
        assert_eq!(uniforms.spot.attenuation[3], 0.94);
        assert_eq!(uniforms.spot.params[0], 32.0);
        assert_eq!(uniforms.spot.direction[..3], [0.0, 0.0, -1.0]);

        uniforms.bind_material(&Material::new(0.1, 0.85, 0.5, 32.0));
        assert_eq!(uniforms.material, [0.1, 0.85, 0.5, 32.0]);
    }

    #[test]
    fn test_unknown_names_and_mismatched_types() {
        let mut uniforms = DrawUniforms::default();
        let before = uniforms;
        assert!(uniforms.apply("texture_diffuse1", 0.into()));
        assert!(uniforms.apply("material.specular2", 3.into()));
        assert!(!uniforms.apply("cameraShake", 1.0f32.into()));
        assert!(!uniforms.apply("PVMMatrix", 1.0f32.into()));
        assert!(!uniforms.apply("fogMaxDistance", Vector3::new(1.0, 1.0, 1.0).into()));
        assert_eq!(uniforms, before);
    }
}
