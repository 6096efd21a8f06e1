//! Backend-neutral description of one rendered frame.

use crate::render::{BufferHandle, MeshHandle, RenderTargetHandle, TextureHandle};

/// Where a pass writes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Target {
    Offscreen(RenderTargetHandle),
    Surface,
}

/// Image sampled by a draw or a full-screen pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TextureSource {
    Texture(TextureHandle),
    /// Color attachment of an offscreen target rendered earlier in the frame.
    RenderTarget(RenderTargetHandle),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Program {
    /// Phong-lit meshes.
    Lit,
    /// Atmospheric scattering over a rendered image.
    PostProcess,
    /// Plain copy of an image to the target.
    Screen,
}

impl Program {
    pub const ALL: [Program; 3] = [Program::Lit, Program::PostProcess, Program::Screen];

    pub fn name(self) -> &'static str {
        match self {
            Self::Lit => "lit",
            Self::PostProcess => "postprocess",
            Self::Screen => "screen",
        }
    }
}

/// Fixed-function state of a pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct PassState {
    pub depth_test: bool,
    pub cull_back: bool,
    pub alpha_blend: bool,
}

impl PassState {
    /// Depth test, back-face culling and src-alpha blending.
    pub const SCENE: Self = Self {
        depth_test: true,
        cull_back: true,
        alpha_blend: true,
    };
    pub const FULLSCREEN: Self = Self {
        depth_test: false,
        cull_back: false,
        alpha_blend: false,
    };
}

/// Buffers bound for the whole pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct PassBindings {
    pub camera: Option<BufferHandle>,
    pub lights: Option<BufferHandle>,
    /// Parameters of the post-process program.
    pub post: Option<BufferHandle>,
    /// Image read by full-screen programs.
    pub source: Option<TextureSource>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DrawCmd {
    Object {
        mesh: MeshHandle,
        index_count: u32,
        object_buffer: BufferHandle,
        texture: Option<TextureSource>,
        has_texture: bool,
        ignore_light: bool,
    },
    /// Two triangles covering the target, generated from the vertex index.
    Fullscreen { vertex_count: u32 },
}

impl DrawCmd {
    pub const FULLSCREEN_QUAD: Self = Self::Fullscreen { vertex_count: 6 };
}

/// One bind-clear-draw cycle against a single target.
#[derive(Debug, Clone, PartialEq)]
pub struct Pass {
    pub label: &'static str,
    pub target: Target,
    pub clear: [f64; 4],
    pub state: PassState,
    pub program: Program,
    pub bindings: PassBindings,
    pub draws: Vec<DrawCmd>,
}

/// Passes in submission order.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Frame {
    pub passes: Vec<Pass>,
}

impl Pass {
    /// Whether any binding or draw of this pass reads `target`.
    pub fn samples(&self, target: RenderTargetHandle) -> bool {
        let wanted = Some(TextureSource::RenderTarget(target));
        self.bindings.source == wanted
            || self.draws.iter().any(|draw| {
                matches!(draw, DrawCmd::Object { texture, .. } if *texture == wanted)
            })
    }
}

impl Frame {
    pub fn pass(&self, label: &str) -> Option<&Pass> {
        self.passes.iter().find(|pass| pass.label == label)
    }
}
