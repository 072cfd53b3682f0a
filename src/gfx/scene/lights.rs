//! Fixed lighting rig: one directional light, point lights and a camera
//! spotlight. Constant parameters are uploaded once after load; positions,
//! directions and on/off state are refreshed every frame.

use cgmath::{Vector3, Vector4};

use crate::gfx::rendering::sink::{set, RenderSink};
use crate::gfx::scene::effects::FogParams;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Attenuation {
    pub constant: f32,
    pub linear: f32,
    pub quadratic: f32,
}

impl Default for Attenuation {
    fn default() -> Self {
        Self {
            constant: 1.0,
            linear: 0.09,
            quadratic: 0.032,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LightColors {
    pub ambient: Vector3<f32>,
    pub diffuse: Vector3<f32>,
    pub specular: Vector3<f32>,
}

impl LightColors {
    pub fn gray(ambient: f32, diffuse: f32, specular: f32) -> Self {
        Self {
            ambient: Vector3::new(ambient, ambient, ambient),
            diffuse: Vector3::new(diffuse, diffuse, diffuse),
            specular: Vector3::new(specular, specular, specular),
        }
    }

    fn upload(&self, sink: &mut dyn RenderSink, prefix: &str) {
        set(sink, &format!("{prefix}.ambientColor"), self.ambient);
        set(sink, &format!("{prefix}.diffuseColor"), self.diffuse);
        set(sink, &format!("{prefix}.specularColor"), self.specular);
    }
}

impl Attenuation {
    fn upload(&self, sink: &mut dyn RenderSink, prefix: &str) {
        set(sink, &format!("{prefix}.constant"), self.constant);
        set(sink, &format!("{prefix}.linear"), self.linear);
        set(sink, &format!("{prefix}.quadratic"), self.quadratic);
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PointLight {
    pub position: Vector3<f32>,
    pub active: bool,
}

#[derive(Debug, Clone)]
pub struct Lighting {
    pub directional_direction: Vector3<f32>,
    pub directional: LightColors,
    pub point_lights: Vec<PointLight>,
    pub point: LightColors,
    pub point_attenuation: Attenuation,
    pub spotlight_active: bool,
    pub spot: LightColors,
    pub spot_attenuation: Attenuation,
    pub spot_cutoff: f32,
    pub spot_exponent: f32,
}

impl Default for Lighting {
    fn default() -> Self {
        Self {
            directional_direction: Vector3::new(-1.0, 1.0, -1.0),
            directional: LightColors::gray(0.25, 0.6, 0.6),
            point_lights: vec![
                PointLight {
                    position: Vector3::new(4.0, 2.0, 0.0),
                    active: true,
                },
                PointLight {
                    position: Vector3::new(3.41, 6.9, 9.8),
                    active: true,
                },
            ],
            point: LightColors::gray(0.07, 0.8, 0.6),
            point_attenuation: Attenuation::default(),
            spotlight_active: false,
            spot: LightColors::gray(0.25, 0.8, 1.0),
            spot_attenuation: Attenuation::default(),
            spot_cutoff: 20.0f32.to_radians().cos(),
            spot_exponent: 32.0,
        }
    }
}

impl Lighting {
    pub fn toggle_spotlight(&mut self) {
        self.spotlight_active = !self.spotlight_active;
        log::info!("Spotlight {}", if self.spotlight_active { "on" } else { "off" });
    }

    pub fn toggle_point_lights(&mut self) {
        for light in &mut self.point_lights {
            light.active = !light.active;
        }
        log::debug!("Point lights toggled");
    }

    /// Constant parameters. Expects the lit program to be selected.
    pub fn upload_defaults(&self, sink: &mut dyn RenderSink) {
        set(sink, "directionalLight.direction", self.directional_direction);
        self.directional.upload(sink, "directionalLight");

        set(sink, "nOfPointLights", self.point_lights.len() as i32);
        for i in 0..self.point_lights.len() {
            let prefix = format!("pointLights[{i}]");
            self.point.upload(sink, &prefix);
            self.point_attenuation.upload(sink, &prefix);
        }

        set(sink, "isSpotlightActive", self.spotlight_active);
        self.spot.upload(sink, "spotLight");
        self.spot_attenuation.upload(sink, "spotLight");
        set(sink, "spotLight.cutoff", self.spot_cutoff);
        set(sink, "spotLight.exponent", self.spot_exponent);
    }

    /// Per-frame state. `camera_front` points the spotlight.
    pub fn upload_frame(&self, sink: &mut dyn RenderSink, camera_front: Vector3<f32>) {
        set(sink, "isSpotlightActive", self.spotlight_active);
        set(sink, "spotLight.direction", -camera_front);
        set(sink, "directionalLight.direction", self.directional_direction);
        for (i, light) in self.point_lights.iter().enumerate() {
            set(sink, &format!("pointLights[{i}].position"), light.position);
            set(sink, &format!("isPointLightActive[{i}]"), light.active);
        }
    }
}

/// Fog uniforms shared by the skybox, actor and lit programs.
pub fn upload_fog(sink: &mut dyn RenderSink, fog: &FogParams) {
    set::<Vector4<f32>>(sink, "fogColor", fog.color);
    set(sink, "fogMaxDistance", fog.max_distance);
    set(sink, "fogMinDistance", fog.min_distance);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gfx::rendering::recorder::RecordingSink;
    use crate::gfx::rendering::sink::UniformValue;

    #[test]
    fn test_toggle_point_lights_flips_each() {
        let mut lighting = Lighting::default();
        lighting.point_lights[1].active = false;
        lighting.toggle_point_lights();
        assert!(!lighting.point_lights[0].active);
        assert!(lighting.point_lights[1].active);
    }

    #[test]
    fn test_defaults_upload() {
        let mut sink = RecordingSink::new();
        Lighting::default().upload_defaults(&mut sink);

        assert_eq!(sink.last_uniform("nOfPointLights"), Some(UniformValue::Int(2)));
        assert_eq!(
            sink.last_uniform("pointLights[1].quadratic"),
            Some(UniformValue::Float(0.032))
        );
        match sink.last_uniform("spotLight.cutoff") {
            Some(UniformValue::Float(c)) => assert!((c - 0.9396926).abs() < 1e-5),
            other => panic!("unexpected cutoff {:?}", other),
        }
    }

    #[test]
    fn test_frame_upload_points_spotlight_backwards() {
        let mut sink = RecordingSink::new();
        Lighting::default().upload_frame(&mut sink, Vector3::new(0.0, 0.0, 1.0));
        assert_eq!(
            sink.last_uniform("spotLight.direction"),
            Some(UniformValue::Vec3(Vector3::new(0.0, 0.0, -1.0)))
        );
        assert_eq!(
            sink.last_uniform("isPointLightActive[0]"),
            Some(UniformValue::Bool(true))
        );
    }
}
