//! The two scenes and everything they own.

use std::collections::HashMap;
use std::fmt::Write as _;
use std::fs;
use std::path::{Path, PathBuf};
use std::rc::Rc;

use glam::{Mat4, Vec3};
use log::{debug, info};
use serde::{Deserialize, Serialize};

use crate::camera::CameraState;
use crate::config::AssetPaths;
use crate::error::{RenderError, Result};
use crate::lighting::{LightKind, LightRecord};
use crate::mesh::{Mesh, MeshData, SharedMesh};
use crate::object::{ObjectFlags, SceneObject};
use crate::render::GpuBackend;

pub const CHICKEN_COUNT: usize = 7;

/// Which scene is presented.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SceneKind {
    Space,
    Room,
}

impl SceneKind {
    pub fn toggled(self) -> Self {
        match self {
            Self::Space => Self::Room,
            Self::Room => Self::Space,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            Self::Space => "space",
            Self::Room => "room",
        }
    }
}

/// Parameters of the scattering pass.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AtmosphereParams {
    /// Samples along the view ray inside the atmosphere.
    pub in_scatter_points: u32,
    /// Samples along each sun ray when integrating optical depth.
    pub optical_depth_points: u32,
    pub density_falloff: f32,
    /// Red, green and blue wavelengths in nanometres.
    pub wavelengths: [f32; 3],
    pub scattering_strength: f32,
    pub planet_radius: f32,
    pub atmosphere_radius: f32,
}

impl Default for AtmosphereParams {
    fn default() -> Self {
        Self {
            in_scatter_points: 10,
            optical_depth_points: 10,
            density_falloff: 4.3,
            wavelengths: [700.0, 530.0, 440.0],
            scattering_strength: 8.0,
            planet_radius: 1.0,
            atmosphere_radius: 1.25,
        }
    }
}

impl AtmosphereParams {
    pub fn load(path: &Path) -> Result<Self> {
        let text = fs::read_to_string(path).map_err(|source| RenderError::Io {
            path: PathBuf::from(path),
            source,
        })?;
        let params: Self = serde_json::from_str(&text)
            .map_err(|err| RenderError::Config(format!("{}: {err}", path.display())))?;
        params.validate()?;
        info!("loaded atmosphere preset {}", path.display());
        Ok(params)
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        let text = serde_json::to_string_pretty(self)
            .map_err(|err| RenderError::Config(err.to_string()))?;
        fs::write(path, text).map_err(|source| RenderError::Io {
            path: PathBuf::from(path),
            source,
        })
    }

    pub fn validate(&self) -> Result<()> {
        if self.in_scatter_points == 0 || self.optical_depth_points == 0 {
            return Err(RenderError::Config("sample counts must be positive".into()));
        }
        if self.wavelengths.iter().any(|w| *w <= 0.0) {
            return Err(RenderError::Config("wavelengths must be positive".into()));
        }
        if self.atmosphere_radius <= self.planet_radius || self.planet_radius <= 0.0 {
            return Err(RenderError::Config(
                "atmosphere radius must exceed a positive planet radius".into(),
            ));
        }
        Ok(())
    }

    /// Rayleigh coefficients: `(400 / wavelength)^4 * strength` per channel.
    pub fn scattering_coefficients(&self) -> Vec3 {
        Vec3::from_array(self.wavelengths.map(|w| (400.0 / w).powi(4) * self.scattering_strength))
    }
}

/// Sun and spinning earth, lit by a single light.
#[derive(Debug)]
pub struct SpaceScene {
    pub sun: SceneObject,
    pub earth: SceneObject,
    pub light: LightRecord,
    pub camera: CameraState,
    pub atmosphere: AtmosphereParams,
    earth_base: Mat4,
    earth_spin: f32,
}

impl SpaceScene {
    pub const SUN_LIGHT: Vec3 = Vec3::new(0.0, 6.0, 18.0);

    pub fn build(
        gpu: &mut dyn GpuBackend,
        assets: &AssetPaths,
        sphere: &SharedMesh,
        atmosphere: AtmosphereParams,
        aspect: f32,
    ) -> Result<Self> {
        let light = LightRecord::white(LightKind::Point, Self::SUN_LIGHT);
        let sun_model = Mat4::from_scale(Vec3::splat(5.0)) * Mat4::from_translation(light.position);
        let sun = SceneObject::load(
            gpu,
            assets,
            "sun",
            sun_model,
            Some(Rc::clone(sphere)),
            ObjectFlags::UNLIT,
        )?;

        let earth_base = Mat4::from_rotation_z(180f32.to_radians())
            * Mat4::from_translation(Vec3::new(0.0, 0.0, 1.0));
        let earth = match SceneObject::load(
            gpu,
            assets,
            "earth",
            earth_base,
            Some(Rc::clone(sphere)),
            ObjectFlags::TEXTURED,
        ) {
            Ok(earth) => earth,
            Err(err) => {
                sun.destroy(gpu);
                return Err(err);
            }
        };

        Ok(Self {
            sun,
            earth,
            light,
            camera: CameraState::new(Vec3::new(0.0, 0.0, 6.0), aspect),
            atmosphere,
            earth_base,
            earth_spin: 0.0,
        })
    }

    pub fn objects(&self) -> [&SceneObject; 2] {
        [&self.sun, &self.earth]
    }

    /// Accumulated earth rotation about +Y, in radians.
    pub fn earth_spin(&self) -> f32 {
        self.earth_spin
    }

    /// Earth model transform at construction time.
    pub fn earth_base(&self) -> Mat4 {
        self.earth_base
    }

    /// Advances the earth spin by `radians` and re-uploads its record.
    pub fn spin_earth(&mut self, gpu: &mut dyn GpuBackend, radians: f32) {
        self.earth_spin += radians;
        let model = self.earth_base * Mat4::from_rotation_y(self.earth_spin);
        self.earth.set_model(gpu, model);
    }

    /// World-space centre of the earth.
    pub fn planet_centre(&self) -> Vec3 {
        self.earth.model().transform_point3(Vec3::ZERO)
    }

    fn destroy(self, gpu: &mut dyn GpuBackend) {
        self.sun.destroy(gpu);
        self.earth.destroy(gpu);
    }
}

/// Static room contents plus the screen showing the space render.
#[derive(Debug)]
pub struct RoomScene {
    /// Everything but the screen, in draw order.
    pub objects: Vec<SceneObject>,
    pub screen: SceneObject,
    pub lights: [LightRecord; 2],
    pub camera: CameraState,
}

enum MeshSource {
    /// `<objects_dir>/<name>.obj`, loaded once per name.
    File,
    Sphere,
    Quad,
}

struct Placement {
    name: &'static str,
    model: Mat4,
    mesh: MeshSource,
    flags: ObjectFlags,
}

impl RoomScene {
    pub const POINT_LIGHT: Vec3 = Vec3::new(0.0, 3.0, 0.0);

    fn layout() -> Vec<Placement> {
        let mut layout = vec![
            Placement {
                name: "room",
                model: Mat4::IDENTITY,
                mesh: MeshSource::File,
                flags: ObjectFlags::TEXTURED,
            },
            Placement {
                name: "nature",
                model: Mat4::IDENTITY,
                mesh: MeshSource::File,
                flags: ObjectFlags::TEXTURED,
            },
            Placement {
                name: "airplane",
                model: Mat4::from_translation(Vec3::new(0.0, 2.6, 0.0))
                    * Mat4::from_scale(Vec3::splat(0.3)),
                mesh: MeshSource::File,
                flags: ObjectFlags::TEXTURED,
            },
        ];
        for index in 0..CHICKEN_COUNT {
            let x = (index as f32 - (CHICKEN_COUNT - 1) as f32 / 2.0) * 0.6;
            layout.push(Placement {
                name: "chicken",
                model: Mat4::from_translation(Vec3::new(x, 0.0, 1.0))
                    * Mat4::from_scale(Vec3::splat(0.2)),
                mesh: MeshSource::File,
                flags: ObjectFlags::TEXTURED,
            });
        }
        layout.push(Placement {
            name: "sun",
            model: Mat4::from_translation(Self::POINT_LIGHT) * Mat4::from_scale(Vec3::splat(0.15)),
            mesh: MeshSource::Sphere,
            flags: ObjectFlags::UNLIT,
        });
        layout.push(Placement {
            name: "screen",
            model: Mat4::from_translation(Vec3::new(0.0, 1.5, -2.9))
                * Mat4::from_scale(Vec3::new(1.6, 0.9, 1.0)),
            mesh: MeshSource::Quad,
            flags: ObjectFlags::UNLIT,
        });
        layout
    }

    pub fn build(
        gpu: &mut dyn GpuBackend,
        assets: &AssetPaths,
        sphere: &SharedMesh,
        aspect: f32,
    ) -> Result<Self> {
        let mut loaded: HashMap<&'static str, SharedMesh> = HashMap::new();
        let mut objects = Vec::new();
        for placement in Self::layout() {
            let mesh = match placement.mesh {
                MeshSource::File => loaded.get(placement.name).cloned(),
                MeshSource::Sphere => Some(Rc::clone(sphere)),
                MeshSource::Quad => Some(Mesh::upload(gpu, "screen-quad", &MeshData::screen_quad())),
            };
            match SceneObject::load(gpu, assets, placement.name, placement.model, mesh, placement.flags) {
                Ok(object) => {
                    if matches!(placement.mesh, MeshSource::File) {
                        loaded
                            .entry(placement.name)
                            .or_insert_with(|| Rc::clone(object.mesh()));
                    }
                    objects.push(object);
                }
                Err(err) => {
                    for mesh in loaded.into_values() {
                        Mesh::release(mesh, gpu);
                    }
                    for object in objects {
                        object.destroy(gpu);
                    }
                    return Err(err);
                }
            }
        }
        for mesh in loaded.into_values() {
            Mesh::release(mesh, gpu);
        }

        // The layout ends with the screen.
        let Some(screen) = objects.pop() else {
            return Err(RenderError::Config("room layout is empty".into()));
        };

        Ok(Self {
            objects,
            screen,
            lights: [
                LightRecord::white(LightKind::Point, Self::POINT_LIGHT),
                LightRecord::white(LightKind::Directional, Vec3::new(1.0, 1.0, 1.0)),
            ],
            camera: CameraState::new(Vec3::new(0.0, 1.5, 4.0), aspect),
        })
    }

    /// All objects including the screen.
    pub fn all_objects(&self) -> impl Iterator<Item = &SceneObject> {
        self.objects.iter().chain(std::iter::once(&self.screen))
    }

    fn destroy(self, gpu: &mut dyn GpuBackend) {
        for object in self.objects {
            object.destroy(gpu);
        }
        self.screen.destroy(gpu);
    }
}

/// Both scenes, built together and released together.
#[derive(Debug)]
pub struct SceneRegistry {
    pub space: SpaceScene,
    pub room: RoomScene,
}

impl SceneRegistry {
    pub fn build(
        gpu: &mut dyn GpuBackend,
        assets: &AssetPaths,
        atmosphere: AtmosphereParams,
        aspect: f32,
    ) -> Result<Self> {
        let sphere = Mesh::upload(gpu, "sphere", &MeshData::unit_sphere(32, 64));
        let built = SpaceScene::build(gpu, assets, &sphere, atmosphere, aspect).and_then(|space| {
            match RoomScene::build(gpu, assets, &sphere, aspect) {
                Ok(room) => Ok(Self { space, room }),
                Err(err) => {
                    space.destroy(gpu);
                    Err(err)
                }
            }
        });
        // Objects hold their own references from here on.
        Mesh::release(sphere, gpu);
        let registry = built?;
        info!(
            "scenes ready: {} space objects, {} room objects",
            registry.space.objects().len(),
            registry.room.all_objects().count()
        );
        Ok(registry)
    }

    pub fn camera(&self, kind: SceneKind) -> &CameraState {
        match kind {
            SceneKind::Space => &self.space.camera,
            SceneKind::Room => &self.room.camera,
        }
    }

    pub fn camera_mut(&mut self, kind: SceneKind) -> &mut CameraState {
        match kind {
            SceneKind::Space => &mut self.space.camera,
            SceneKind::Room => &mut self.room.camera,
        }
    }

    pub fn objects(&self, kind: SceneKind) -> Vec<&SceneObject> {
        match kind {
            SceneKind::Space => self.space.objects().to_vec(),
            SceneKind::Room => self.room.all_objects().collect(),
        }
    }

    pub fn light_count(&self, kind: SceneKind) -> usize {
        match kind {
            SceneKind::Space => 1,
            SceneKind::Room => self.room.lights.len(),
        }
    }

    /// Per-scene object listing printed by `--summary-only`.
    pub fn summary(&self) -> String {
        let mut out = String::new();
        for (kind, title) in [(SceneKind::Space, "Space"), (SceneKind::Room, "Room")] {
            let objects = self.objects(kind);
            let lights = self.light_count(kind);
            let _ = writeln!(
                out,
                "{title} scene: {} objects ({lights} light{})",
                objects.len(),
                if lights == 1 { "" } else { "s" }
            );
            for object in objects {
                let flags = object.flags();
                let mut notes = Vec::new();
                if flags.has_texture {
                    notes.push("textured");
                }
                if flags.ignore_light {
                    notes.push("unlit");
                }
                let _ = writeln!(out, " - {} ({})", object.name(), notes.join(", "));
            }
        }
        out
    }

    pub fn destroy(self, gpu: &mut dyn GpuBackend) {
        debug!("releasing scenes");
        self.space.destroy(gpu);
        self.room.destroy(gpu);
    }
}
