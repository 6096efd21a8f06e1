use log::debug;

use crate::error::Result;
use crate::frame::{Target, TextureSource};
use crate::render::{GpuBackend, RenderTargetDesc, RenderTargetHandle};

/// Offscreen color target (plus optional depth) sized to the viewport.
#[derive(Debug)]
pub struct OffscreenFramebuffer {
    label: &'static str,
    handle: RenderTargetHandle,
    desc: RenderTargetDesc,
}

impl OffscreenFramebuffer {
    pub fn create(
        gpu: &mut dyn GpuBackend,
        label: &'static str,
        width: u32,
        height: u32,
        with_depth: bool,
    ) -> Result<Self> {
        let desc = RenderTargetDesc {
            width,
            height,
            with_depth,
        };
        desc.validate(label)?;
        let handle = gpu.create_render_target(label, &desc)?;
        debug!("framebuffer {label} allocated at {width}x{height}");
        Ok(Self {
            label,
            handle,
            desc,
        })
    }

    /// Reallocates the attachments at the new size; contents are discarded.
    ///
    /// On failure the framebuffer keeps its previous allocation.
    pub fn resize(&mut self, gpu: &mut dyn GpuBackend, width: u32, height: u32) -> Result<()> {
        let desc = self.desc_at(width, height);
        desc.validate(self.label)?;
        let handle = gpu.create_render_target(self.label, &desc)?;
        gpu.destroy_render_target(std::mem::replace(&mut self.handle, handle));
        self.desc = desc;
        debug!("framebuffer {} rebuilt at {width}x{height}", self.label);
        Ok(())
    }

    /// This target's allocation parameters at another size.
    pub fn desc_at(&self, width: u32, height: u32) -> RenderTargetDesc {
        RenderTargetDesc {
            width,
            height,
            ..self.desc
        }
    }

    pub fn label(&self) -> &'static str {
        self.label
    }

    pub fn destroy(self, gpu: &mut dyn GpuBackend) {
        gpu.destroy_render_target(self.handle);
    }

    pub fn handle(&self) -> RenderTargetHandle {
        self.handle
    }

    pub fn size(&self) -> (u32, u32) {
        (self.desc.width, self.desc.height)
    }

    pub fn has_depth(&self) -> bool {
        self.desc.with_depth
    }

    pub fn target(&self) -> Target {
        Target::Offscreen(self.handle)
    }

    /// The color attachment as a texture for later passes.
    pub fn as_source(&self) -> TextureSource {
        TextureSource::RenderTarget(self.handle)
    }
}
