//! Real-time renderer with two switchable scenes.
//!
//! The space scene shows a textured sun and a spinning earth, post-processed
//! by an atmospheric scattering pass. The room scene is a lit interior whose
//! screen object displays the latest scattering result. Scene code talks to
//! the GPU only through [`render::GpuBackend`], so everything above the
//! backend runs unchanged against the headless implementation used by the
//! tests and `--summary-only`.

pub mod app;
pub mod assets;
pub mod camera;
pub mod config;
pub mod error;
pub mod frame;
pub mod framebuffer;
pub mod input;
pub mod lighting;
pub mod mesh;
pub mod obj;
pub mod object;
pub mod overlay;
pub mod pipeline;
pub mod render;
pub mod scene;
pub mod shaders;
pub mod state;
pub mod uniforms;

#[cfg(test)]
mod test_support;

pub use app::{AppOptions, Application};
pub use camera::{CameraState, LookState};
pub use config::{AssetPaths, Settings};
pub use error::{RenderError, Result};
pub use frame::{DrawCmd, Frame, Pass, Program, Target, TextureSource};
pub use input::{KeyAction, KeyCode, MouseButton, NamedKey};
pub use lighting::{LightKind, LightRecord};
pub use obj::load_obj_from_str;
pub use overlay::{Overlay, SliderId};
pub use render::{GpuBackend, HeadlessBackend, WgpuBackend};
pub use scene::{AtmosphereParams, SceneKind, SceneRegistry};
pub use state::{Command, RendererState};
