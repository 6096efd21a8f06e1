use std::path::PathBuf;

use thiserror::Error;

/// Failures surfaced by scene construction and frame rendering.
///
/// None of these are retried: the caller decides whether to abort.
#[derive(Debug, Error)]
pub enum RenderError {
    #[error("failed to decode image {path}")]
    Image {
        path: PathBuf,
        #[source]
        source: image::ImageError,
    },

    #[error("failed to load mesh {path}")]
    Mesh {
        path: PathBuf,
        #[source]
        source: anyhow::Error,
    },

    #[error("failed to read {path}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("framebuffer `{label}` ({width}x{height}) is incomplete: {reason}")]
    FramebufferIncomplete {
        label: String,
        width: u32,
        height: u32,
        reason: String,
    },

    #[error("shader program `{program}` failed to compile: {message}")]
    Shader { program: String, message: String },

    #[error("surface error: {0}")]
    Surface(String),

    #[error("frame references {0}")]
    InvalidFrame(String),

    #[error("invalid configuration: {0}")]
    Config(String),
}

pub type Result<T, E = RenderError> = std::result::Result<T, E>;
