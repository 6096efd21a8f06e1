//! GPU abstraction consumed by the scene and pipeline code.
//!
//! Scene code never touches a graphics API directly: it allocates resources
//! through [`GpuBackend`] and hands a finished [`Frame`](crate::frame::Frame)
//! to [`GpuBackend::submit`]. The native backend drives wgpu; the headless
//! backend keeps a ledger of allocations and submitted frames.

mod headless;
mod native;

pub use headless::{HeadlessBackend, TextureRecord};
pub use native::WgpuBackend;

use crate::assets::ImageData;
use crate::error::Result;
use crate::frame::Frame;
use crate::mesh::MeshData;
use crate::shaders::ShaderSet;

macro_rules! handle {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
        pub struct $name(pub(crate) u32);

        impl $name {
            pub fn id(self) -> u32 {
                self.0
            }
        }
    };
}

handle!(
    /// Uniform buffer owned by exactly one holder.
    BufferHandle
);
handle!(
    /// Sampled 2D texture with a full mip chain.
    TextureHandle
);
handle!(
    /// Vertex and index buffers of one mesh.
    MeshHandle
);
handle!(
    /// Offscreen color target, optionally paired with a depth attachment.
    RenderTargetHandle
);

/// Allocation parameters of an offscreen target.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RenderTargetDesc {
    pub width: u32,
    pub height: u32,
    pub with_depth: bool,
}

/// Largest edge accepted for offscreen targets; mirrors wgpu's default limit.
pub const MAX_TARGET_DIMENSION: u32 = 8192;

impl RenderTargetDesc {
    /// Rejects configurations the GPU would refuse to attach.
    pub fn validate(&self, label: &str) -> Result<()> {
        let reason = if self.width == 0 || self.height == 0 {
            "target has zero area"
        } else if self.width > MAX_TARGET_DIMENSION || self.height > MAX_TARGET_DIMENSION {
            "target exceeds the maximum texture dimension"
        } else {
            return Ok(());
        };
        Err(crate::RenderError::FramebufferIncomplete {
            label: label.to_string(),
            width: self.width,
            height: self.height,
            reason: reason.to_string(),
        })
    }
}

/// Resource creation and frame submission.
///
/// All calls happen on the render thread in issue order; a buffer written
/// before [`submit`](GpuBackend::submit) is visible to every draw in that frame.
pub trait GpuBackend {
    fn create_uniform_buffer(&mut self, label: &str, contents: &[u8]) -> BufferHandle;
    /// Overwrites the whole buffer.
    fn write_buffer(&mut self, buffer: BufferHandle, contents: &[u8]);
    fn destroy_buffer(&mut self, buffer: BufferHandle);

    fn create_texture(&mut self, label: &str, image: &ImageData) -> TextureHandle;
    fn destroy_texture(&mut self, texture: TextureHandle);

    fn create_mesh(&mut self, label: &str, mesh: &MeshData) -> MeshHandle;
    fn destroy_mesh(&mut self, mesh: MeshHandle);

    fn create_render_target(
        &mut self,
        label: &str,
        desc: &RenderTargetDesc,
    ) -> Result<RenderTargetHandle>;
    fn destroy_render_target(&mut self, target: RenderTargetHandle);

    /// Resizes the presentable surface (and its depth buffer).
    fn resize_surface(&mut self, width: u32, height: u32);

    /// Compiles and links every program in the set, replacing the old ones.
    fn load_programs(&mut self, shaders: &ShaderSet) -> Result<()>;

    fn submit(&mut self, frame: &Frame) -> Result<()>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn zero_area_target_is_incomplete() {
        let desc = RenderTargetDesc {
            width: 0,
            height: 720,
            with_depth: true,
        };
        let err = desc.validate("space").unwrap_err();
        assert!(err.to_string().contains("zero area"));
    }

    #[test]
    fn oversized_target_is_incomplete() {
        let desc = RenderTargetDesc {
            width: MAX_TARGET_DIMENSION + 1,
            height: 16,
            with_depth: false,
        };
        assert!(desc.validate("screen").is_err());
    }
}
