use glam::{DVec2, Mat4, Vec3};
use serde::{Deserialize, Serialize};

use crate::uniforms::CameraUniform;

/// Pitch limit in degrees; keeps the view away from the poles.
pub const PITCH_LIMIT: f64 = 89.0;

/// Free-flying perspective camera.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CameraState {
    /// Vertical field of view in degrees.
    pub fov_y: f32,
    pub aspect: f32,
    pub near: f32,
    pub far: f32,
    pub position: Vec3,
    /// Unit view direction.
    pub front: Vec3,
    pub look: LookState,
}

impl CameraState {
    pub fn new(position: Vec3, aspect: f32) -> Self {
        let look = LookState::default();
        Self {
            fov_y: 45.0,
            aspect,
            near: 0.01,
            far: 1000.0,
            position,
            front: look.direction(),
            look,
        }
    }

    pub fn projection(&self) -> Mat4 {
        Mat4::perspective_rh(self.fov_y.to_radians(), self.aspect.max(0.01), self.near, self.far)
    }

    /// Always rebuilt from `position` and `front`.
    pub fn view(&self) -> Mat4 {
        Mat4::look_at_rh(self.position, self.position + self.front, Vec3::Y)
    }

    pub fn set_viewport(&mut self, width: u32, height: u32) {
        if height > 0 {
            self.aspect = width as f32 / height as f32;
        }
    }

    /// Moves along the view direction; negative distances move backwards.
    pub fn advance(&mut self, distance: f32) {
        self.position += self.front * distance;
    }

    /// Feeds a cursor position to the look controller.
    ///
    /// The recomputed direction is committed only while `looking` is set.
    pub fn on_cursor(&mut self, cursor: DVec2, sensitivity: f64, looking: bool) {
        if let Some(front) = self.look.track(cursor, sensitivity, looking) {
            self.front = front;
        }
    }

    /// Arms the first-move seed so the next acquisition does not jump.
    pub fn release_look(&mut self) {
        self.look.first_move = true;
    }

    pub fn to_uniform(&self) -> CameraUniform {
        CameraUniform {
            projection: self.projection().to_cols_array_2d(),
            view: self.view().to_cols_array_2d(),
            position: self.position.extend(1.0).to_array(),
        }
    }
}

/// Mouse-look orientation state of one camera.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LookState {
    /// Degrees; unbounded.
    pub yaw: f64,
    /// Degrees; clamped to ±[`PITCH_LIMIT`].
    pub pitch: f64,
    /// Set when the next cursor sample only seeds `last_cursor`.
    pub first_move: bool,
    pub last_cursor: DVec2,
}

impl Default for LookState {
    fn default() -> Self {
        Self {
            yaw: -90.0,
            pitch: 0.0,
            first_move: true,
            last_cursor: DVec2::ZERO,
        }
    }
}

impl LookState {
    /// Unit vector for the current yaw and pitch.
    pub fn direction(&self) -> Vec3 {
        let (yaw, pitch) = (self.yaw.to_radians(), self.pitch.to_radians());
        Vec3::new(
            (yaw.cos() * pitch.cos()) as f32,
            pitch.sin() as f32,
            (yaw.sin() * pitch.cos()) as f32,
        )
        .normalize()
    }

    /// Accumulates a cursor sample and returns the new direction while
    /// `looking`. Releasing arms `first_move` so re-acquiring does not snap.
    pub fn track(&mut self, cursor: DVec2, sensitivity: f64, looking: bool) -> Option<Vec3> {
        if !looking {
            self.first_move = true;
            return None;
        }
        if self.first_move {
            self.last_cursor = cursor;
            self.first_move = false;
        }

        let offset = (cursor - self.last_cursor) * sensitivity;
        self.last_cursor = cursor;
        self.yaw += offset.x;
        // screen y grows downwards
        self.pitch = (self.pitch - offset.y).clamp(-PITCH_LIMIT, PITCH_LIMIT);
        Some(self.direction())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_camera_looks_down_negative_z() {
        let camera = CameraState::new(Vec3::ZERO, 16.0 / 9.0);
        assert!((camera.front - Vec3::NEG_Z).length() < 1e-6);
    }

    #[test]
    fn first_sample_after_acquire_does_not_snap() {
        let mut look = LookState::default();
        let front = look.track(DVec2::new(500.0, 300.0), 0.3, true).unwrap();
        assert_eq!(look.yaw, -90.0);
        assert_eq!(look.pitch, 0.0);
        assert!((front - Vec3::NEG_Z).length() < 1e-6);

        look.track(DVec2::new(510.0, 300.0), 0.3, true);
        assert!((look.yaw - (-87.0)).abs() < 1e-9);
    }

    #[test]
    fn pitch_stays_clamped_for_any_input() {
        let mut look = LookState::default();
        look.track(DVec2::ZERO, 1.0, true);
        let samples = [-1.0e9, 3.0e4, -250.0, 1.0e12, 0.5, -7.0e5, 89.5, -89.5];
        let mut cursor = DVec2::ZERO;
        for dy in samples {
            cursor.y += dy;
            look.track(cursor, 0.3, true);
            assert!(look.pitch.abs() <= PITCH_LIMIT, "pitch {}", look.pitch);
            assert!(look.direction().is_finite());
        }
    }

    #[test]
    fn releasing_freezes_orientation_and_rearms() {
        let mut camera = CameraState::new(Vec3::ZERO, 1.0);
        camera.on_cursor(DVec2::new(0.0, 0.0), 0.3, true);
        camera.on_cursor(DVec2::new(100.0, 0.0), 0.3, true);
        let frozen = camera.front;

        camera.on_cursor(DVec2::new(900.0, 400.0), 0.3, false);
        assert_eq!(camera.front, frozen);
        assert!(camera.look.first_move);

        // re-acquiring far away seeds the cursor without a jump
        camera.on_cursor(DVec2::new(900.0, 400.0), 0.3, true);
        assert!((camera.front - frozen).length() < 1e-6);
    }

    #[test]
    fn view_tracks_position_and_front() {
        let mut camera = CameraState::new(Vec3::new(0.0, 0.0, 6.0), 1.0);
        camera.advance(2.0);
        assert!((camera.position - Vec3::new(0.0, 0.0, 4.0)).length() < 1e-6);
        let eye_space = camera.view().transform_point3(Vec3::new(0.0, 0.0, 1.0));
        assert!((eye_space - Vec3::new(0.0, 0.0, -3.0)).length() < 1e-5);
    }
}
