use std::path::{Path, PathBuf};

use glam::DVec2;
use log::{debug, error, info};

use crate::camera::CameraState;
use crate::config::{AssetPaths, Settings};
use crate::error::Result;
use crate::input::{KeyAction, KeyCode, MouseButton};
use crate::overlay::{Overlay, SliderId};
use crate::pipeline::RenderPipeline;
use crate::render::GpuBackend;
use crate::scene::{AtmosphereParams, SceneKind, SceneRegistry};
use crate::shaders::ShaderSet;
use crate::state::{Command, RendererState, LOOK_BUTTON};

/// Everything needed to build an [`Application`].
#[derive(Debug, Clone)]
pub struct AppOptions {
    pub assets: AssetPaths,
    pub settings: Settings,
    /// Directory of `.wgsl` overrides, re-read on recompile.
    pub shaders_dir: Option<PathBuf>,
    pub atmosphere: AtmosphereParams,
    pub width: u32,
    pub height: u32,
}

impl AppOptions {
    pub fn new(assets_root: impl Into<PathBuf>) -> Self {
        let settings = Settings::default();
        Self {
            assets: AssetPaths::new(assets_root.into()),
            width: settings.initial_width,
            height: settings.initial_height,
            settings,
            shaders_dir: None,
            atmosphere: AtmosphereParams::default(),
        }
    }
}

/// Scenes, interaction state and the render pipeline on top of a backend.
pub struct Application<G: GpuBackend> {
    gpu: G,
    settings: Settings,
    shaders_dir: Option<PathBuf>,
    state: RendererState,
    scenes: SceneRegistry,
    pipeline: RenderPipeline,
}

impl<G: GpuBackend> Application<G> {
    pub fn new(mut gpu: G, options: AppOptions) -> Result<Self> {
        let shaders = ShaderSet::load(options.shaders_dir.as_deref())?;
        gpu.load_programs(&shaders)?;

        let aspect = options.width.max(1) as f32 / options.height.max(1) as f32;
        let scenes = SceneRegistry::build(&mut gpu, &options.assets, options.atmosphere, aspect)?;
        let pipeline = match RenderPipeline::new(
            &mut gpu,
            &scenes,
            options.width,
            options.height,
            &options.settings,
        ) {
            Ok(pipeline) => pipeline,
            Err(err) => {
                scenes.destroy(&mut gpu);
                return Err(err);
            }
        };
        info!("application ready at {}x{}", options.width, options.height);

        Ok(Self {
            gpu,
            state: RendererState::new(&options.settings),
            settings: options.settings,
            shaders_dir: options.shaders_dir,
            scenes,
            pipeline,
        })
    }

    /// Moves the active camera and spins the earth.
    pub fn update(&mut self, delta_ms: f32) {
        let distance = self.state.travel(delta_ms);
        if distance != 0.0 {
            self.scenes.camera_mut(self.state.active).advance(distance);
        }
        let spin = (self.settings.earth_degrees_per_ms * delta_ms).to_radians();
        self.scenes.space.spin_earth(&mut self.gpu, spin);
    }

    pub fn render(&mut self) -> Result<()> {
        let frame = self
            .pipeline
            .build_frame(&mut self.gpu, &self.scenes, self.state.active);
        self.gpu.submit(&frame)
    }

    /// Zero-sized viewports (minimized windows) are ignored.
    pub fn resize(&mut self, width: u32, height: u32) -> Result<()> {
        if width == 0 || height == 0 {
            return Ok(());
        }
        self.gpu.resize_surface(width, height);
        self.pipeline.resize(&mut self.gpu, width, height)?;
        for kind in [SceneKind::Space, SceneKind::Room] {
            self.scenes.camera_mut(kind).set_viewport(width, height);
        }
        Ok(())
    }

    /// Handles a key event; returns the commands the host has to act on.
    pub fn on_key(&mut self, key: KeyCode, action: KeyAction) -> Option<Command> {
        match self.state.on_key(key, action)? {
            Command::Recompile => {
                if let Err(err) = self.recompile() {
                    error!("shader recompilation failed, keeping previous programs: {err}");
                }
                None
            }
            Command::Quit => Some(Command::Quit),
        }
    }

    /// Releasing the look button re-arms both cameras, so switching scenes
    /// in between cannot leave a stale cursor behind.
    pub fn on_mouse_button(&mut self, button: MouseButton, pressed: bool) {
        self.state.on_mouse_button(button, pressed);
        if button == LOOK_BUTTON && !pressed {
            for kind in [SceneKind::Space, SceneKind::Room] {
                self.scenes.camera_mut(kind).release_look();
            }
        }
    }

    /// Feeds the cursor to the active scene's look controller.
    pub fn on_cursor_moved(&mut self, position: DVec2) {
        let looking = self.state.looking;
        let sensitivity = self.settings.mouse_sensitivity;
        self.scenes
            .camera_mut(self.state.active)
            .on_cursor(position, sensitivity, looking);
    }

    /// Re-reads the shader set and reloads every program.
    pub fn recompile(&mut self) -> Result<()> {
        let shaders = ShaderSet::load(self.shaders_dir.as_deref())?;
        self.gpu.load_programs(&shaders)?;
        info!("shaders recompiled");
        Ok(())
    }

    pub fn overlay(&self) -> Overlay {
        Overlay::build(&self.state, &self.scenes.space.atmosphere)
    }

    /// Applies an overlay slider and returns the value after clamping.
    ///
    /// `None` unless the atmosphere panel is showing, i.e. the space scene is
    /// active with the menu on.
    pub fn set_atmosphere(&mut self, id: SliderId, value: f32) -> Option<f32> {
        if !matches!(self.overlay(), Overlay::Atmosphere(_)) {
            debug!("ignoring {} change outside the atmosphere panel", id.label());
            return None;
        }
        Some(self.scenes.space.atmosphere.apply_slider(id, value))
    }

    /// Writes the current atmosphere parameters as a JSON preset.
    pub fn save_atmosphere(&self, path: &Path) -> Result<()> {
        self.scenes.space.atmosphere.save(path)?;
        info!("saved atmosphere preset {}", path.display());
        Ok(())
    }

    pub fn summary(&self) -> String {
        self.scenes.summary()
    }

    pub fn state(&self) -> &RendererState {
        &self.state
    }

    pub fn scenes(&self) -> &SceneRegistry {
        &self.scenes
    }

    pub fn active_camera(&self) -> &CameraState {
        self.scenes.camera(self.state.active)
    }

    pub fn pipeline(&self) -> &RenderPipeline {
        &self.pipeline
    }

    pub fn gpu(&self) -> &G {
        &self.gpu
    }

    pub fn gpu_mut(&mut self) -> &mut G {
        &mut self.gpu
    }

    /// Releases every GPU resource and hands the backend back.
    pub fn shutdown(mut self) -> G {
        self.scenes.destroy(&mut self.gpu);
        self.pipeline.destroy(&mut self.gpu);
        info!("application shut down");
        self.gpu
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::input::KeyCode;
    use crate::render::HeadlessBackend;
    use crate::test_support::fixture_assets;

    fn app() -> (tempfile::TempDir, Application<HeadlessBackend>) {
        let (dir, _) = fixture_assets();
        let mut options = AppOptions::new(dir.path());
        options.width = 320;
        options.height = 240;
        let app = Application::new(HeadlessBackend::new(320, 240), options).unwrap();
        (dir, app)
    }

    #[test]
    fn holding_w_moves_only_the_active_camera() {
        let (_dir, mut app) = app();
        let room_before = app.scenes().room.camera.position;
        app.on_key(KeyCode::character('w'), KeyAction::Press);
        app.update(100.0);
        // speed 0.02 units/ms along -Z
        let space = app.scenes().space.camera.position;
        assert!((space.z - (6.0 - 2.0)).abs() < 1e-4);
        assert_eq!(app.scenes().room.camera.position, room_before);
    }

    #[test]
    fn look_only_while_button_held() {
        let (_dir, mut app) = app();
        let front = app.active_camera().front;
        app.on_cursor_moved(DVec2::new(10.0, 10.0));
        app.on_cursor_moved(DVec2::new(200.0, 10.0));
        assert_eq!(app.active_camera().front, front);

        app.on_mouse_button(MouseButton::LEFT, true);
        app.on_cursor_moved(DVec2::new(200.0, 10.0));
        assert_eq!(app.active_camera().front, front, "first move only seeds");
        app.on_cursor_moved(DVec2::new(300.0, 10.0));
        assert_ne!(app.active_camera().front, front);
    }

    #[test]
    fn recompile_reloads_programs() {
        let (_dir, mut app) = app();
        assert_eq!(app.gpu().program_loads(), 1);
        app.on_key(KeyCode::character('r'), KeyAction::Press);
        assert_eq!(app.gpu().program_loads(), 2);
    }

    #[test]
    fn broken_override_keeps_previous_programs() {
        let (dir, mut app) = app();
        let shaders = dir.path().join("shaders");
        std::fs::create_dir_all(&shaders).unwrap();
        std::fs::write(shaders.join("lit.wgsl"), "// nothing here").unwrap();
        app.shaders_dir = Some(shaders);
        app.on_key(KeyCode::character('r'), KeyAction::Press);
        assert_eq!(app.gpu().program_loads(), 1);
        app.render().unwrap();
    }

    #[test]
    fn escape_is_passed_to_the_host() {
        let (_dir, mut app) = app();
        let escape = KeyCode::Named(crate::input::NamedKey::Escape);
        assert_eq!(app.on_key(escape, KeyAction::Press), Some(Command::Quit));
        assert_eq!(app.on_key(KeyCode::character('r'), KeyAction::Press), None);
    }

    #[test]
    fn releasing_look_rearms_the_inactive_camera() {
        let (_dir, mut app) = app();
        app.on_mouse_button(MouseButton::LEFT, true);
        app.on_cursor_moved(DVec2::new(0.0, 0.0));
        app.on_cursor_moved(DVec2::new(10.0, 0.0));
        app.on_mouse_button(MouseButton::LEFT, false);
        assert!(app.scenes().space.camera.look.first_move);
        assert!(app.scenes().room.camera.look.first_move);
    }

    #[test]
    fn atmosphere_locked_outside_the_panel() {
        let (_dir, mut app) = app();
        assert_eq!(app.set_atmosphere(SliderId::DensityFalloff, 12.0), None);
        app.on_key(KeyCode::character('m'), KeyAction::Press);
        assert_eq!(app.set_atmosphere(SliderId::DensityFalloff, 12.0), Some(12.0));
        app.on_key(KeyCode::character('t'), KeyAction::Press);
        assert_eq!(app.set_atmosphere(SliderId::DensityFalloff, 3.0), None);
        assert_eq!(app.scenes().space.atmosphere.density_falloff, 12.0);
    }

    #[test]
    fn minimized_window_keeps_targets() {
        let (_dir, mut app) = app();
        app.resize(0, 0).unwrap();
        assert_eq!(app.pipeline().screen_framebuffer().size(), (320, 240));
    }

    #[test]
    fn shutdown_leaks_nothing() {
        let (_dir, mut app) = app();
        app.update(16.0);
        app.render().unwrap();
        let gpu = app.shutdown();
        assert_eq!(gpu.live_buffers(), 0);
        assert_eq!(gpu.live_textures(), 0);
        assert_eq!(gpu.live_meshes(), 0);
        assert!(gpu.live_render_targets().is_empty());
    }
}
