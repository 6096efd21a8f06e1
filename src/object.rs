use bytemuck::bytes_of;
use glam::{Mat4, Vec4};
use log::debug;

use crate::assets::{load_image, load_mesh};
use crate::config::AssetPaths;
use crate::error::Result;
use crate::frame::{DrawCmd, TextureSource};
use crate::lighting::Material;
use crate::mesh::{Mesh, SharedMesh};
use crate::render::{BufferHandle, GpuBackend, TextureHandle};
use crate::uniforms::ObjectUniform;

/// Shading switches of a scene object.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ObjectFlags {
    pub has_texture: bool,
    /// Render the albedo unlit (suns, the in-room screen).
    pub ignore_light: bool,
}

impl ObjectFlags {
    pub const TEXTURED: Self = Self {
        has_texture: true,
        ignore_light: false,
    };
    pub const UNLIT: Self = Self {
        has_texture: true,
        ignore_light: true,
    };
}

impl Default for ObjectFlags {
    fn default() -> Self {
        Self::TEXTURED
    }
}

/// Model transform plus material, mirrored into the object's uniform buffer.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MaterialTransform {
    pub model: Mat4,
    pub material: Material,
}

impl MaterialTransform {
    pub fn new(model: Mat4) -> Self {
        Self {
            model,
            material: Material::default(),
        }
    }

    pub fn to_uniform(&self) -> ObjectUniform {
        ObjectUniform {
            model: self.model.to_cols_array_2d(),
            ambient: self.material.ambient.to_array(),
            diffuse: self.material.diffuse.to_array(),
            specular: self.material.specular.to_array(),
            ..ObjectUniform::default()
        }
    }
}

/// A drawable: shared mesh, its own uniform buffer and optional texture.
#[derive(Debug)]
pub struct SceneObject {
    name: String,
    mesh: SharedMesh,
    transform: MaterialTransform,
    buffer: BufferHandle,
    texture: Option<TextureHandle>,
    flags: ObjectFlags,
}

impl SceneObject {
    /// Builds a fully initialised object.
    ///
    /// Without `mesh`, geometry is loaded from `<objects_dir>/<name>.obj`.
    /// Textured objects load `<images_dir>/<name>.jpg`. Any decode failure
    /// aborts construction and releases what was already allocated.
    pub fn load(
        gpu: &mut dyn GpuBackend,
        assets: &AssetPaths,
        name: &str,
        model: Mat4,
        mesh: Option<SharedMesh>,
        flags: ObjectFlags,
    ) -> Result<Self> {
        let mesh = match mesh {
            Some(mesh) => mesh,
            None => {
                let data = load_mesh(&assets.mesh(name))?;
                Mesh::upload(gpu, name, &data)
            }
        };

        let texture = if flags.has_texture {
            match load_image(&assets.image(name)) {
                Ok(image) => Some(gpu.create_texture(name, &image)),
                Err(err) => {
                    Mesh::release(mesh, gpu);
                    return Err(err);
                }
            }
        } else {
            None
        };

        let transform = MaterialTransform::new(model);
        let buffer = gpu.create_uniform_buffer(name, bytes_of(&transform.to_uniform()));
        debug!("created object {name} (textured: {}, unlit: {})", flags.has_texture, flags.ignore_light);

        Ok(Self {
            name: name.to_string(),
            mesh,
            transform,
            buffer,
            texture,
            flags,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn mesh(&self) -> &SharedMesh {
        &self.mesh
    }

    pub fn flags(&self) -> ObjectFlags {
        self.flags
    }

    pub fn texture(&self) -> Option<TextureHandle> {
        self.texture
    }

    pub fn buffer(&self) -> BufferHandle {
        self.buffer
    }

    pub fn transform(&self) -> &MaterialTransform {
        &self.transform
    }

    pub fn model(&self) -> Mat4 {
        self.transform.model
    }

    /// Replaces the model matrix and re-uploads the uniform record.
    pub fn set_model(&mut self, gpu: &mut dyn GpuBackend, model: Mat4) {
        self.transform.model = model;
        self.upload(gpu);
    }

    pub fn set_material(&mut self, gpu: &mut dyn GpuBackend, ambient: Vec4, diffuse: Vec4, specular: Vec4) {
        self.transform.material = Material {
            ambient,
            diffuse,
            specular,
        };
        self.upload(gpu);
    }

    fn upload(&self, gpu: &mut dyn GpuBackend) {
        gpu.write_buffer(self.buffer, bytes_of(&self.transform.to_uniform()));
    }

    /// Draw command using the object's own texture.
    pub fn draw(&self) -> DrawCmd {
        self.draw_with(self.texture.map(TextureSource::Texture))
    }

    /// Draw command sampling `source` instead of the object's own texture.
    ///
    /// The object itself is left untouched.
    pub fn draw_with(&self, source: Option<TextureSource>) -> DrawCmd {
        DrawCmd::Object {
            mesh: self.mesh.handle,
            index_count: self.mesh.index_count,
            object_buffer: self.buffer,
            texture: source,
            has_texture: self.flags.has_texture && source.is_some(),
            ignore_light: self.flags.ignore_light,
        }
    }

    /// Releases the buffer, the texture, and the mesh if no other object holds it.
    pub fn destroy(self, gpu: &mut dyn GpuBackend) {
        debug!("destroying object {}", self.name);
        gpu.destroy_buffer(self.buffer);
        if let Some(texture) = self.texture {
            gpu.destroy_texture(texture);
        }
        Mesh::release(self.mesh, gpu);
    }
}

#[cfg(test)]
mod tests {
    use std::rc::Rc;

    use super::*;
    use crate::mesh::MeshData;
    use crate::render::HeadlessBackend;
    use crate::test_support::fixture_assets;

    #[test]
    fn load_reads_mesh_and_texture_by_name() {
        let (_dir, assets) = fixture_assets();
        let mut gpu = HeadlessBackend::new(64, 64);
        let object = SceneObject::load(
            &mut gpu,
            &assets,
            "chicken",
            Mat4::IDENTITY,
            None,
            ObjectFlags::TEXTURED,
        )
        .unwrap();

        assert_eq!(gpu.live_meshes(), 1);
        assert_eq!(gpu.live_textures(), 1);
        let texture = gpu.texture(object.texture().unwrap()).unwrap();
        assert!(texture.mip_levels >= 1);

        let record: ObjectUniform = gpu.read_buffer(object.buffer()).unwrap();
        assert_eq!(record.ambient, [0.5; 4]);
        assert_eq!(record.diffuse, [1.0; 4]);
        assert_eq!(record.specular[..3], [0.0; 3]);
    }

    #[test]
    fn missing_texture_is_fatal_and_leaks_nothing() {
        let (_dir, assets) = fixture_assets();
        let mut gpu = HeadlessBackend::new(64, 64);
        let mesh = Mesh::upload(&mut gpu, "sphere", &MeshData::unit_sphere(4, 8));
        let result = SceneObject::load(
            &mut gpu,
            &assets,
            "no-such-image",
            Mat4::IDENTITY,
            Some(Rc::clone(&mesh)),
            ObjectFlags::TEXTURED,
        );
        assert!(result.is_err());
        assert_eq!(Rc::strong_count(&mesh), 1);
        assert_eq!(gpu.live_buffers(), 0);
        assert_eq!(gpu.live_textures(), 0);
    }

    #[test]
    fn set_model_reuploads_record() {
        let (_dir, assets) = fixture_assets();
        let mut gpu = HeadlessBackend::new(64, 64);
        let mut object = SceneObject::load(
            &mut gpu,
            &assets,
            "room",
            Mat4::IDENTITY,
            None,
            ObjectFlags::TEXTURED,
        )
        .unwrap();
        let model = Mat4::from_translation(glam::Vec3::new(1.0, 2.0, 3.0));
        object.set_model(&mut gpu, model);
        let record: ObjectUniform = gpu.read_buffer(object.buffer()).unwrap();
        assert_eq!(record.model, model.to_cols_array_2d());
    }

    #[test]
    fn drawing_another_source_leaves_own_texture() {
        let (_dir, assets) = fixture_assets();
        let mut gpu = HeadlessBackend::new(64, 64);
        let quad = Mesh::upload(&mut gpu, "quad", &MeshData::screen_quad());
        let object = SceneObject::load(
            &mut gpu,
            &assets,
            "screen",
            Mat4::IDENTITY,
            Some(quad),
            ObjectFlags::UNLIT,
        )
        .unwrap();
        let own = object.texture();
        let target = gpu
            .create_render_target(
                "feed",
                &crate::render::RenderTargetDesc {
                    width: 8,
                    height: 8,
                    with_depth: false,
                },
            )
            .unwrap();

        let DrawCmd::Object { texture, .. } = object.draw_with(Some(TextureSource::RenderTarget(target))) else {
            panic!("expected object draw");
        };
        assert_eq!(texture, Some(TextureSource::RenderTarget(target)));
        assert_eq!(object.texture(), own);
    }

    #[test]
    fn destroy_releases_everything_it_owns() {
        let (_dir, assets) = fixture_assets();
        let mut gpu = HeadlessBackend::new(64, 64);
        let object = SceneObject::load(
            &mut gpu,
            &assets,
            "airplane",
            Mat4::IDENTITY,
            None,
            ObjectFlags::TEXTURED,
        )
        .unwrap();
        object.destroy(&mut gpu);
        assert_eq!(gpu.live_buffers(), 0);
        assert_eq!(gpu.live_textures(), 0);
        assert_eq!(gpu.live_meshes(), 0);
    }
}
