//! Two-pass frame composition.
//!
//! Every frame renders the space scene into the `space` target and runs the
//! scattering pass from it into the `screen` target. Presentation then either
//! copies `screen` to the surface or draws the room, whose screen object
//! samples `screen` directly.

use bytemuck::bytes_of;
use glam::Vec4;
use log::{debug, warn};

use crate::camera::CameraState;
use crate::config::Settings;
use crate::error::Result;
use crate::frame::{DrawCmd, Frame, Pass, PassBindings, PassState, Program, Target};
use crate::framebuffer::OffscreenFramebuffer;
use crate::lighting::light_block;
use crate::render::{BufferHandle, GpuBackend};
use crate::scene::{SceneKind, SceneRegistry, SpaceScene};
use crate::uniforms::{CameraUniform, PostProcessUniform};

pub const SPACE_PASS: &str = "space";
pub const ATMOSPHERE_PASS: &str = "atmosphere";
pub const PRESENT_PASS: &str = "present";

const BLACK: [f64; 4] = [0.0, 0.0, 0.0, 1.0];

/// Uniform buffers and offscreen targets used by every frame.
#[derive(Debug)]
pub struct RenderPipeline {
    space_camera: BufferHandle,
    room_camera: BufferHandle,
    space_lights: BufferHandle,
    room_lights: BufferHandle,
    post: BufferHandle,
    space_fb: OffscreenFramebuffer,
    screen_fb: OffscreenFramebuffer,
    space_clear: [f64; 4],
    room_clear: [f64; 4],
}

impl RenderPipeline {
    pub fn new(
        gpu: &mut dyn GpuBackend,
        scenes: &SceneRegistry,
        width: u32,
        height: u32,
        settings: &Settings,
    ) -> Result<Self> {
        let space_fb = OffscreenFramebuffer::create(gpu, "space", width, height, true)?;
        let screen_fb = match OffscreenFramebuffer::create(gpu, "screen", width, height, false) {
            Ok(fb) => fb,
            Err(err) => {
                space_fb.destroy(gpu);
                return Err(err);
            }
        };

        let space_camera =
            gpu.create_uniform_buffer("space-camera", bytes_of(&scenes.space.camera.to_uniform()));
        let room_camera =
            gpu.create_uniform_buffer("room-camera", bytes_of(&scenes.room.camera.to_uniform()));
        let space_lights = gpu.create_uniform_buffer(
            "space-lights",
            bytes_of(&light_block(std::slice::from_ref(&scenes.space.light))),
        );
        let room_lights =
            gpu.create_uniform_buffer("room-lights", bytes_of(&light_block(&scenes.room.lights)));
        let post = gpu.create_uniform_buffer(
            "post",
            bytes_of(&post_uniform(&scenes.space, &scenes.space.camera)),
        );

        Ok(Self {
            space_camera,
            room_camera,
            space_lights,
            room_lights,
            post,
            space_fb,
            screen_fb,
            space_clear: settings.space_clear,
            room_clear: settings.room_clear,
        })
    }

    /// Uploads per-frame uniforms and describes the frame for `active`.
    ///
    /// Every pass is rendered from the active scene's camera.
    pub fn build_frame(
        &self,
        gpu: &mut dyn GpuBackend,
        scenes: &SceneRegistry,
        active: SceneKind,
    ) -> Frame {
        let camera = scenes.camera(active);
        let camera_buffer = self.camera_buffer(active);
        gpu.write_buffer(camera_buffer, bytes_of(&camera.to_uniform()));
        gpu.write_buffer(self.post, bytes_of(&post_uniform(&scenes.space, camera)));

        let space = Pass {
            label: SPACE_PASS,
            target: self.space_fb.target(),
            clear: self.space_clear,
            state: PassState::SCENE,
            program: Program::Lit,
            bindings: PassBindings {
                camera: Some(camera_buffer),
                lights: Some(self.space_lights),
                ..PassBindings::default()
            },
            draws: scenes.space.objects().iter().map(|object| object.draw()).collect(),
        };

        let atmosphere = Pass {
            label: ATMOSPHERE_PASS,
            target: self.screen_fb.target(),
            clear: BLACK,
            state: PassState::FULLSCREEN,
            program: Program::PostProcess,
            bindings: PassBindings {
                post: Some(self.post),
                source: Some(self.space_fb.as_source()),
                ..PassBindings::default()
            },
            draws: vec![DrawCmd::FULLSCREEN_QUAD],
        };

        let present = match active {
            SceneKind::Space => Pass {
                label: PRESENT_PASS,
                target: Target::Surface,
                clear: BLACK,
                state: PassState::FULLSCREEN,
                program: Program::Screen,
                bindings: PassBindings {
                    source: Some(self.screen_fb.as_source()),
                    ..PassBindings::default()
                },
                draws: vec![DrawCmd::FULLSCREEN_QUAD],
            },
            SceneKind::Room => {
                let mut draws: Vec<DrawCmd> =
                    scenes.room.objects.iter().map(|object| object.draw()).collect();
                draws.push(scenes.room.screen.draw_with(Some(self.screen_fb.as_source())));
                Pass {
                    label: PRESENT_PASS,
                    target: Target::Surface,
                    clear: self.room_clear,
                    state: PassState::SCENE,
                    program: Program::Lit,
                    bindings: PassBindings {
                        camera: Some(camera_buffer),
                        lights: Some(self.room_lights),
                        ..PassBindings::default()
                    },
                    draws,
                }
            }
        };

        Frame {
            passes: vec![space, atmosphere, present],
        }
    }

    fn camera_buffer(&self, kind: SceneKind) -> BufferHandle {
        match kind {
            SceneKind::Space => self.space_camera,
            SceneKind::Room => self.room_camera,
        }
    }

    /// Rebuilds both offscreen targets at the new viewport size.
    ///
    /// Either both targets take the new size or both keep the old one.
    pub fn resize(&mut self, gpu: &mut dyn GpuBackend, width: u32, height: u32) -> Result<()> {
        for fb in [&self.space_fb, &self.screen_fb] {
            fb.desc_at(width, height).validate(fb.label())?;
        }
        let (old_width, old_height) = self.space_fb.size();
        self.space_fb.resize(gpu, width, height)?;
        if let Err(err) = self.screen_fb.resize(gpu, width, height) {
            if let Err(rollback) = self.space_fb.resize(gpu, old_width, old_height) {
                warn!("could not restore the space target after a failed resize: {rollback}");
            }
            return Err(err);
        }
        debug!("pipeline targets now {width}x{height}");
        Ok(())
    }

    pub fn space_framebuffer(&self) -> &OffscreenFramebuffer {
        &self.space_fb
    }

    pub fn screen_framebuffer(&self) -> &OffscreenFramebuffer {
        &self.screen_fb
    }

    pub fn destroy(self, gpu: &mut dyn GpuBackend) {
        for buffer in [
            self.space_camera,
            self.room_camera,
            self.space_lights,
            self.room_lights,
            self.post,
        ] {
            gpu.destroy_buffer(buffer);
        }
        self.space_fb.destroy(gpu);
        self.screen_fb.destroy(gpu);
    }
}

/// Scattering parameters of `space` as seen from `camera`.
pub fn post_uniform(space: &SpaceScene, camera: &CameraState) -> PostProcessUniform {
    let atmosphere = &space.atmosphere;
    let [r, g, b] = atmosphere.wavelengths;
    PostProcessUniform {
        inverse_projection: camera.projection().inverse().to_cols_array_2d(),
        inverse_view: camera.view().inverse().to_cols_array_2d(),
        camera_position: camera.position.extend(1.0).to_array(),
        sun_position: space.light.position.extend(space.light.kind.tag()).to_array(),
        planet: space.planet_centre().extend(atmosphere.planet_radius).to_array(),
        wavelengths: Vec4::new(r, g, b, 0.0).to_array(),
        params: [
            atmosphere.atmosphere_radius,
            atmosphere.density_falloff,
            atmosphere.scattering_strength,
            0.0,
        ],
        samples: [atmosphere.in_scatter_points, atmosphere.optical_depth_points, 0, 0],
    }
}
