//! Lights and materials of the lit program.

use glam::{Vec3, Vec4};
use serde::{Deserialize, Serialize};

use crate::uniforms::{LightBlock, LightUniform, MAX_LIGHTS};

/// How a light's position is interpreted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum LightKind {
    /// `position` is the direction *towards* the light.
    Directional,
    /// `position` is a world-space point.
    Point,
}

impl LightKind {
    /// Value stored in `position.w` of the uniform record.
    pub fn tag(self) -> f32 {
        match self {
            Self::Directional => 0.0,
            Self::Point => 1.0,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LightRecord {
    pub kind: LightKind,
    pub position: Vec3,
    pub ambient: Vec3,
    pub diffuse: Vec3,
    pub specular: Vec3,
}

impl LightRecord {
    pub fn white(kind: LightKind, position: Vec3) -> Self {
        Self {
            kind,
            position,
            ambient: Vec3::ONE,
            diffuse: Vec3::ONE,
            specular: Vec3::ONE,
        }
    }

    /// Unit vector from `world_pos` towards the light.
    pub fn direction_from(&self, world_pos: Vec3) -> Vec3 {
        match self.kind {
            LightKind::Directional => self.position.normalize_or_zero(),
            LightKind::Point => (self.position - world_pos).normalize_or_zero(),
        }
    }

    pub fn to_uniform(&self) -> LightUniform {
        LightUniform {
            position: self.position.extend(self.kind.tag()).to_array(),
            ambient: self.ambient.extend(1.0).to_array(),
            diffuse: self.diffuse.extend(1.0).to_array(),
            specular: self.specular.extend(1.0).to_array(),
        }
    }
}

/// Packs up to [`MAX_LIGHTS`] lights; extra lights are ignored.
pub fn light_block(lights: &[LightRecord]) -> LightBlock {
    let mut block = LightBlock::default();
    for (slot, light) in block.lights.iter_mut().zip(lights) {
        *slot = light.to_uniform();
    }
    block.count = lights.len().min(MAX_LIGHTS) as u32;
    block
}

/// Surface reflectance. Specular `w` carries the shininess exponent.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Material {
    pub ambient: Vec4,
    pub diffuse: Vec4,
    pub specular: Vec4,
}

impl Default for Material {
    fn default() -> Self {
        Self {
            ambient: Vec4::splat(0.5),
            diffuse: Vec4::splat(1.0),
            specular: Vec3::ZERO.extend(32.0),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Inputs of one fragment.
    #[derive(Debug, Clone, Copy)]
    struct Fragment {
        /// Texture sample, or white for untextured objects.
        albedo: Vec3,
        normal: Vec3,
        world_pos: Vec3,
        camera_pos: Vec3,
    }

    /// Fragment stage of `lit.wgsl` restated on the CPU: ambient plus
    /// Lambertian diffuse plus specular, summed over lights. With
    /// `ignore_light` the albedo passes through untouched.
    fn shade(material: &Material, ignore_light: bool, fragment: &Fragment, lights: &[LightRecord]) -> Vec3 {
        if ignore_light {
            return fragment.albedo;
        }

        let normal = fragment.normal.normalize_or_zero();
        let to_eye = (fragment.camera_pos - fragment.world_pos).normalize_or_zero();
        let shininess = material.specular.w.max(1.0);

        lights
            .iter()
            .take(MAX_LIGHTS)
            .map(|light| {
                let to_light = light.direction_from(fragment.world_pos);
                let n_dot_l = normal.dot(to_light).max(0.0);
                let ambient = light.ambient * material.ambient.truncate() * fragment.albedo;
                let diffuse = n_dot_l * light.diffuse * material.diffuse.truncate() * fragment.albedo;
                let specular = if n_dot_l > 0.0 {
                    let half = (to_light + to_eye).normalize_or_zero();
                    normal.dot(half).max(0.0).powf(shininess) * light.specular * material.specular.truncate()
                } else {
                    Vec3::ZERO
                };
                ambient + diffuse + specular
            })
            .sum()
    }

    fn fragment() -> Fragment {
        Fragment {
            albedo: Vec3::new(0.8, 0.4, 0.2),
            normal: Vec3::Y,
            world_pos: Vec3::ZERO,
            camera_pos: Vec3::new(0.0, 2.0, 2.0),
        }
    }

    #[test]
    fn unlit_objects_ignore_every_light_set() {
        let material = Material::default();
        let fragment = fragment();
        let sets = [
            vec![],
            vec![LightRecord::white(LightKind::Point, Vec3::new(0.0, 5.0, 0.0))],
            vec![
                LightRecord::white(LightKind::Directional, Vec3::new(1.0, 1.0, 0.0)),
                LightRecord {
                    kind: LightKind::Point,
                    position: Vec3::new(-3.0, 1.0, 4.0),
                    ambient: Vec3::new(9.0, 0.0, 0.0),
                    diffuse: Vec3::splat(4.0),
                    specular: Vec3::splat(2.0),
                },
            ],
        ];
        for lights in &sets {
            assert_eq!(shade(&material, true, &fragment, lights), fragment.albedo);
        }
    }

    #[test]
    fn lit_objects_depend_on_lights() {
        let material = Material::default();
        let fragment = fragment();
        let dark = shade(&material, false, &fragment, &[]);
        let lit = shade(
            &material,
            false,
            &fragment,
            &[LightRecord::white(LightKind::Point, Vec3::new(0.0, 5.0, 0.0))],
        );
        assert_eq!(dark, Vec3::ZERO);
        // ambient 0.5 plus full diffuse facing the light
        assert!((lit - fragment.albedo * 1.5).length() < 1e-5);
    }

    #[test]
    fn light_kind_is_encoded_in_w() {
        let directional = LightRecord::white(LightKind::Directional, Vec3::Y).to_uniform();
        let point = LightRecord::white(LightKind::Point, Vec3::Y).to_uniform();
        assert_eq!(directional.position[3], 0.0);
        assert_eq!(point.position[3], 1.0);
    }

    #[test]
    fn directional_lights_ignore_fragment_position() {
        let light = LightRecord::white(LightKind::Directional, Vec3::new(0.0, 2.0, 0.0));
        assert_eq!(light.direction_from(Vec3::new(10.0, -4.0, 3.0)), Vec3::Y);
    }

    #[test]
    fn block_counts_lights() {
        let lights = [
            LightRecord::white(LightKind::Point, Vec3::ZERO),
            LightRecord::white(LightKind::Directional, Vec3::X),
        ];
        let block = light_block(&lights);
        assert_eq!(block.count, 2);
        assert_eq!(block.lights[1].position, [1.0, 0.0, 0.0, 0.0]);
    }
}
