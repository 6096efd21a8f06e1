use std::collections::BTreeMap;

use bytemuck::Pod;
use log::{debug, warn};

use super::{
    BufferHandle, GpuBackend, MeshHandle, RenderTargetDesc, RenderTargetHandle, TextureHandle,
};
use crate::assets::ImageData;
use crate::error::{RenderError, Result};
use crate::frame::{DrawCmd, Frame, Program, Target, TextureSource};
use crate::mesh::MeshData;
use crate::shaders::ShaderSet;

/// What the headless backend remembers about a texture.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TextureRecord {
    pub label: String,
    pub width: u32,
    pub height: u32,
    pub mip_levels: u32,
}

#[derive(Debug)]
struct BufferRecord {
    label: String,
    contents: Vec<u8>,
}

#[derive(Debug)]
struct MeshRecord {
    label: String,
    vertex_count: usize,
    index_count: usize,
}

/// Backend without a device.
///
/// Allocations are kept in a ledger so callers can check lifetimes, and
/// submitted frames are validated against it and retained for inspection.
#[derive(Debug)]
pub struct HeadlessBackend {
    next_id: u32,
    surface: (u32, u32),
    buffers: BTreeMap<u32, BufferRecord>,
    textures: BTreeMap<u32, TextureRecord>,
    meshes: BTreeMap<u32, MeshRecord>,
    targets: BTreeMap<u32, (String, RenderTargetDesc)>,
    program_loads: u32,
    frames_submitted: u64,
    last_frame: Option<Frame>,
}

impl HeadlessBackend {
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            next_id: 1,
            surface: (width, height),
            buffers: BTreeMap::new(),
            textures: BTreeMap::new(),
            meshes: BTreeMap::new(),
            targets: BTreeMap::new(),
            program_loads: 0,
            frames_submitted: 0,
            last_frame: None,
        }
    }

    fn allocate(&mut self) -> u32 {
        let id = self.next_id;
        self.next_id += 1;
        id
    }

    pub fn surface_size(&self) -> (u32, u32) {
        self.surface
    }

    pub fn live_buffers(&self) -> usize {
        self.buffers.len()
    }

    pub fn live_textures(&self) -> usize {
        self.textures.len()
    }

    pub fn live_meshes(&self) -> usize {
        self.meshes.len()
    }

    pub fn is_mesh_live(&self, mesh: MeshHandle) -> bool {
        self.meshes.contains_key(&mesh.0)
    }

    pub fn texture(&self, texture: TextureHandle) -> Option<&TextureRecord> {
        self.textures.get(&texture.0)
    }

    /// Live offscreen targets in allocation order.
    pub fn live_render_targets(&self) -> Vec<(RenderTargetHandle, RenderTargetDesc)> {
        self.targets
            .iter()
            .map(|(&id, (_, desc))| (RenderTargetHandle(id), *desc))
            .collect()
    }

    /// Current contents of a uniform buffer reinterpreted as `T`.
    ///
    /// `None` when the buffer is gone or its size differs from `T`.
    pub fn read_buffer<T: Pod>(&self, buffer: BufferHandle) -> Option<T> {
        let record = self.buffers.get(&buffer.0)?;
        bytemuck::try_pod_read_unaligned(&record.contents).ok()
    }

    /// Number of successful [`GpuBackend::load_programs`] calls.
    pub fn program_loads(&self) -> u32 {
        self.program_loads
    }

    pub fn frames_submitted(&self) -> u64 {
        self.frames_submitted
    }

    pub fn last_frame(&self) -> Option<&Frame> {
        self.last_frame.as_ref()
    }

    fn check_buffer(&self, buffer: Option<BufferHandle>, what: &str) -> Result<()> {
        match buffer {
            Some(handle) if !self.buffers.contains_key(&handle.0) => Err(RenderError::InvalidFrame(
                format!("released {what} buffer {}", handle.0),
            )),
            _ => Ok(()),
        }
    }

    fn check_source(&self, source: Option<TextureSource>) -> Result<()> {
        let live = match source {
            None => true,
            Some(TextureSource::Texture(handle)) => self.textures.contains_key(&handle.0),
            Some(TextureSource::RenderTarget(handle)) => self.targets.contains_key(&handle.0),
        };
        if live {
            Ok(())
        } else {
            Err(RenderError::InvalidFrame(format!("released image {source:?}")))
        }
    }

    fn validate(&self, frame: &Frame) -> Result<()> {
        if self.program_loads == 0 {
            return Err(RenderError::InvalidFrame("programs that were never loaded".into()));
        }
        for pass in &frame.passes {
            if let Target::Offscreen(target) = pass.target {
                if !self.targets.contains_key(&target.0) {
                    return Err(RenderError::InvalidFrame(format!(
                        "released target {} in pass {}",
                        target.0, pass.label
                    )));
                }
                if pass.samples(target) {
                    return Err(RenderError::InvalidFrame(format!(
                        "its own target in pass {}",
                        pass.label
                    )));
                }
            }
            self.check_buffer(pass.bindings.camera, "camera")?;
            self.check_buffer(pass.bindings.lights, "light")?;
            self.check_buffer(pass.bindings.post, "post-process")?;
            self.check_source(pass.bindings.source)?;
            if pass.program != Program::Lit && pass.bindings.source.is_none() {
                return Err(RenderError::InvalidFrame(format!(
                    "no source image in full-screen pass {}",
                    pass.label
                )));
            }

            for draw in &pass.draws {
                if let DrawCmd::Object {
                    mesh,
                    object_buffer,
                    texture,
                    ..
                } = draw
                {
                    if !self.meshes.contains_key(&mesh.0) {
                        return Err(RenderError::InvalidFrame(format!("released mesh {}", mesh.0)));
                    }
                    self.check_buffer(Some(*object_buffer), "object")?;
                    self.check_source(*texture)?;
                }
            }
        }
        Ok(())
    }
}

impl GpuBackend for HeadlessBackend {
    fn create_uniform_buffer(&mut self, label: &str, contents: &[u8]) -> BufferHandle {
        let id = self.allocate();
        self.buffers.insert(
            id,
            BufferRecord {
                label: label.to_string(),
                contents: contents.to_vec(),
            },
        );
        BufferHandle(id)
    }

    fn write_buffer(&mut self, buffer: BufferHandle, contents: &[u8]) {
        match self.buffers.get_mut(&buffer.0) {
            Some(record) => {
                if record.contents.len() != contents.len() {
                    warn!(
                        "buffer {} resized by write ({} -> {} bytes)",
                        record.label,
                        record.contents.len(),
                        contents.len()
                    );
                }
                record.contents = contents.to_vec();
            }
            None => warn!("write to released buffer {}", buffer.0),
        }
    }

    fn destroy_buffer(&mut self, buffer: BufferHandle) {
        if self.buffers.remove(&buffer.0).is_none() {
            warn!("buffer {} released twice", buffer.0);
        }
    }

    fn create_texture(&mut self, label: &str, image: &ImageData) -> TextureHandle {
        let id = self.allocate();
        self.textures.insert(
            id,
            TextureRecord {
                label: label.to_string(),
                width: image.width(),
                height: image.height(),
                mip_levels: image.mip_level_count(),
            },
        );
        TextureHandle(id)
    }

    fn destroy_texture(&mut self, texture: TextureHandle) {
        if self.textures.remove(&texture.0).is_none() {
            warn!("texture {} released twice", texture.0);
        }
    }

    fn create_mesh(&mut self, label: &str, mesh: &MeshData) -> MeshHandle {
        let id = self.allocate();
        self.meshes.insert(
            id,
            MeshRecord {
                label: label.to_string(),
                vertex_count: mesh.vertex_count(),
                index_count: mesh.indices.len(),
            },
        );
        MeshHandle(id)
    }

    fn destroy_mesh(&mut self, mesh: MeshHandle) {
        match self.meshes.remove(&mesh.0) {
            Some(record) => debug!(
                "released mesh {} ({} vertices, {} indices)",
                record.label, record.vertex_count, record.index_count
            ),
            None => warn!("mesh {} released twice", mesh.0),
        }
    }

    fn create_render_target(
        &mut self,
        label: &str,
        desc: &RenderTargetDesc,
    ) -> Result<RenderTargetHandle> {
        desc.validate(label)?;
        let id = self.allocate();
        self.targets.insert(id, (label.to_string(), *desc));
        Ok(RenderTargetHandle(id))
    }

    fn destroy_render_target(&mut self, target: RenderTargetHandle) {
        if self.targets.remove(&target.0).is_none() {
            warn!("render target {} released twice", target.0);
        }
    }

    fn resize_surface(&mut self, width: u32, height: u32) {
        self.surface = (width, height);
    }

    fn load_programs(&mut self, shaders: &ShaderSet) -> Result<()> {
        shaders.validate()?;
        self.program_loads += 1;
        Ok(())
    }

    fn submit(&mut self, frame: &Frame) -> Result<()> {
        self.validate(frame)?;
        self.frames_submitted += 1;
        self.last_frame = Some(frame.clone());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::frame::{Pass, PassBindings, PassState};

    fn loaded() -> HeadlessBackend {
        let mut gpu = HeadlessBackend::new(320, 240);
        gpu.load_programs(&ShaderSet::builtin()).unwrap();
        gpu
    }

    #[test]
    fn buffers_round_trip_contents() {
        let mut gpu = HeadlessBackend::new(320, 240);
        let buffer = gpu.create_uniform_buffer("value", bytemuck::bytes_of(&7u32));
        gpu.write_buffer(buffer, bytemuck::bytes_of(&9u32));
        assert_eq!(gpu.read_buffer::<u32>(buffer), Some(9));
        assert_eq!(gpu.read_buffer::<u64>(buffer), None);
        gpu.destroy_buffer(buffer);
        assert_eq!(gpu.read_buffer::<u32>(buffer), None);
    }

    #[test]
    fn submit_requires_loaded_programs() {
        let mut gpu = HeadlessBackend::new(320, 240);
        assert!(matches!(
            gpu.submit(&Frame::default()),
            Err(RenderError::InvalidFrame(_))
        ));
        gpu.load_programs(&ShaderSet::builtin()).unwrap();
        gpu.submit(&Frame::default()).unwrap();
        assert_eq!(gpu.frames_submitted(), 1);
    }

    #[test]
    fn pass_may_not_sample_its_own_target() {
        let mut gpu = loaded();
        let target = gpu
            .create_render_target(
                "loop",
                &RenderTargetDesc {
                    width: 4,
                    height: 4,
                    with_depth: false,
                },
            )
            .unwrap();
        let frame = Frame {
            passes: vec![Pass {
                label: "feedback",
                target: Target::Offscreen(target),
                clear: [0.0; 4],
                state: PassState::FULLSCREEN,
                program: Program::Screen,
                bindings: PassBindings {
                    source: Some(TextureSource::RenderTarget(target)),
                    ..PassBindings::default()
                },
                draws: vec![DrawCmd::FULLSCREEN_QUAD],
            }],
        };
        assert!(gpu.submit(&frame).is_err());
        assert_eq!(gpu.frames_submitted(), 0);
    }

    #[test]
    fn released_target_cannot_be_drawn_to() {
        let mut gpu = loaded();
        let desc = RenderTargetDesc {
            width: 4,
            height: 4,
            with_depth: true,
        };
        let target = gpu.create_render_target("gone", &desc).unwrap();
        gpu.destroy_render_target(target);
        let frame = Frame {
            passes: vec![Pass {
                label: "scene",
                target: Target::Offscreen(target),
                clear: [0.0; 4],
                state: PassState::SCENE,
                program: Program::Lit,
                bindings: PassBindings::default(),
                draws: Vec::new(),
            }],
        };
        assert!(gpu.submit(&frame).is_err());
    }
}
