use std::path::{Path, PathBuf};

/// Tunable constants for input handling, animation and presentation.
#[derive(Debug, Clone, PartialEq)]
pub struct Settings {
    /// Degrees of yaw/pitch per pixel of cursor travel.
    pub mouse_sensitivity: f64,
    /// Initial camera speed in world units per millisecond.
    pub base_speed: f32,
    /// Number of doublings (or halvings) allowed away from `base_speed`.
    pub speed_steps: i32,
    /// Earth spin in degrees per millisecond of frame time.
    pub earth_degrees_per_ms: f32,
    pub initial_width: u32,
    pub initial_height: u32,
    pub space_clear: [f64; 4],
    pub room_clear: [f64; 4],
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            mouse_sensitivity: 0.3,
            base_speed: 0.02,
            speed_steps: 6,
            earth_degrees_per_ms: 360.0 / 10_000.0,
            initial_width: 1280,
            initial_height: 720,
            space_clear: [0.0, 0.0, 0.0, 1.0],
            room_clear: [0.3, 0.3, 0.9, 1.0],
        }
    }
}

impl Settings {
    pub fn min_speed(&self) -> f32 {
        self.base_speed / 2f32.powi(self.speed_steps)
    }

    pub fn max_speed(&self) -> f32 {
        self.base_speed * 2f32.powi(self.speed_steps)
    }
}

/// Resolves asset names to files under an asset root.
///
/// Textures live in `<root>/images/<name>.jpg`, meshes in
/// `<root>/objects/<name>.obj`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AssetPaths {
    pub images_dir: PathBuf,
    pub objects_dir: PathBuf,
}

impl AssetPaths {
    pub fn new(root: impl AsRef<Path>) -> Self {
        let root = root.as_ref();
        Self {
            images_dir: root.join("images"),
            objects_dir: root.join("objects"),
        }
    }

    pub fn image(&self, name: &str) -> PathBuf {
        self.images_dir.join(format!("{name}.jpg"))
    }

    pub fn mesh(&self, name: &str) -> PathBuf {
        self.objects_dir.join(format!("{name}.obj"))
    }
}
