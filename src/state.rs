use log::{debug, info};

use crate::config::Settings;
use crate::input::{KeyAction, KeyCode, MouseButton, NamedKey};
use crate::scene::SceneKind;

/// Button that enables mouse look while held.
pub const LOOK_BUTTON: MouseButton = MouseButton::LEFT;

/// Something the application has to act on after a key event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    Recompile,
    Quit,
}

/// Interaction state shared by update and render.
#[derive(Debug, Clone, PartialEq)]
pub struct RendererState {
    pub active: SceneKind,
    pub forward: bool,
    pub backward: bool,
    /// World units per millisecond.
    pub speed: f32,
    pub show_menu: bool,
    pub looking: bool,
    min_speed: f32,
    max_speed: f32,
}

impl RendererState {
    pub fn new(settings: &Settings) -> Self {
        Self {
            active: SceneKind::Space,
            forward: false,
            backward: false,
            speed: settings.base_speed,
            show_menu: false,
            looking: false,
            min_speed: settings.min_speed(),
            max_speed: settings.max_speed(),
        }
    }

    pub fn toggle_scene(&mut self) {
        self.active = self.active.toggled();
        info!("switched to the {} scene", self.active.name());
    }

    /// Signed distance to travel along the view direction in `delta_ms`.
    pub fn travel(&self, delta_ms: f32) -> f32 {
        let direction = match (self.forward, self.backward) {
            (true, false) => 1.0,
            (false, true) => -1.0,
            _ => 0.0,
        };
        direction * self.speed * delta_ms
    }

    /// Doubles (`faster`) or halves the speed within the configured bounds.
    pub fn scale_speed(&mut self, faster: bool) {
        let speed = if faster { self.speed * 2.0 } else { self.speed / 2.0 };
        self.speed = speed.clamp(self.min_speed, self.max_speed);
        debug!("camera speed {:.5} units/ms", self.speed);
    }

    /// W/S are held; everything else reacts to the initial press only.
    pub fn on_key(&mut self, key: KeyCode, action: KeyAction) -> Option<Command> {
        let ch = match key {
            KeyCode::Named(NamedKey::Escape) if action == KeyAction::Press => {
                return Some(Command::Quit)
            }
            KeyCode::Named(_) => return None,
            KeyCode::Character(ch) => ch,
        };
        match (ch, action) {
            ('W', KeyAction::Press) => self.forward = true,
            ('W', KeyAction::Release) => self.forward = false,
            ('S', KeyAction::Press) => self.backward = true,
            ('S', KeyAction::Release) => self.backward = false,
            ('A', KeyAction::Press) => self.scale_speed(true),
            ('D', KeyAction::Press) => self.scale_speed(false),
            ('T', KeyAction::Press) => self.toggle_scene(),
            ('M', KeyAction::Press) => self.show_menu = !self.show_menu,
            ('R', KeyAction::Press) => return Some(Command::Recompile),
            _ => {}
        }
        None
    }

    pub fn on_mouse_button(&mut self, button: MouseButton, pressed: bool) {
        if button == LOOK_BUTTON {
            self.looking = pressed;
        }
    }
}
