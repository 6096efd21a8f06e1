//! Fixed-layout records mirrored into GPU uniform buffers.
//!
//! Every struct follows std140/WGSL uniform layout rules: `mat4x4<f32>` is 64
//! bytes and every vector is padded to 16 bytes.

use bytemuck::{Pod, Zeroable};

/// Maximum number of lights a scene may bind.
pub const MAX_LIGHTS: usize = 2;

/// Byte stride of the per-object record.
pub const OBJECT_UNIFORM_STRIDE: usize = 256;

/// Camera projection, view and position.
///
/// | Offset | Size | Field |
/// |--------|------|-------|
/// | 0      | 64   | projection |
/// | 64     | 64   | view |
/// | 128    | 16   | position |
#[repr(C)]
#[derive(Clone, Copy, Debug, Default, PartialEq, Pod, Zeroable)]
pub struct CameraUniform {
    pub projection: [[f32; 4]; 4],
    pub view: [[f32; 4]; 4],
    pub position: [f32; 4],
}

/// One light. `position.w` carries the light kind: 0 directional, 1 point.
#[repr(C)]
#[derive(Clone, Copy, Debug, Default, PartialEq, Pod, Zeroable)]
pub struct LightUniform {
    pub position: [f32; 4],
    pub ambient: [f32; 4],
    pub diffuse: [f32; 4],
    pub specular: [f32; 4],
}

/// Light set bound alongside the camera.
#[repr(C)]
#[derive(Clone, Copy, Debug, Default, PartialEq, Pod, Zeroable)]
pub struct LightBlock {
    pub lights: [LightUniform; MAX_LIGHTS],
    pub count: u32,
    pub _padding: [u32; 3],
}

/// Model transform and material, padded to [`OBJECT_UNIFORM_STRIDE`].
///
/// | Offset | Size | Field |
/// |--------|------|-------|
/// | 0      | 64   | model |
/// | 64     | 16   | ambient |
/// | 80     | 16   | diffuse |
/// | 96     | 16   | specular (shininess in `.w`) |
/// | 112    | 144  | padding |
#[repr(C)]
#[derive(Clone, Copy, Debug, Default, PartialEq, Pod, Zeroable)]
pub struct ObjectUniform {
    pub model: [[f32; 4]; 4],
    pub ambient: [f32; 4],
    pub diffuse: [f32; 4],
    pub specular: [f32; 4],
    pub _padding: [[f32; 4]; 9],
}

/// Per-draw switches of the lit program.
#[repr(C)]
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Pod, Zeroable)]
pub struct DrawFlags {
    pub has_texture: u32,
    pub ignore_light: u32,
    pub _padding: [u32; 2],
}

impl DrawFlags {
    pub fn new(has_texture: bool, ignore_light: bool) -> Self {
        Self {
            has_texture: has_texture as u32,
            ignore_light: ignore_light as u32,
            _padding: [0; 2],
        }
    }
}

/// Inputs of the atmospheric scattering pass.
#[repr(C)]
#[derive(Clone, Copy, Debug, Default, PartialEq, Pod, Zeroable)]
pub struct PostProcessUniform {
    pub inverse_projection: [[f32; 4]; 4],
    pub inverse_view: [[f32; 4]; 4],
    pub camera_position: [f32; 4],
    /// xyz position of the sun, w is the light kind.
    pub sun_position: [f32; 4],
    /// xyz planet centre, w planet radius.
    pub planet: [f32; 4],
    /// Red, green and blue wavelengths in nanometres.
    pub wavelengths: [f32; 4],
    /// atmosphere radius, density falloff, scattering strength, unused.
    pub params: [f32; 4],
    /// in-scatter samples, optical depth samples, unused, unused.
    pub samples: [u32; 4],
}
