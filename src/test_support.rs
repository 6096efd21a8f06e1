use std::fs;

use image::{Rgb, RgbImage};
use tempfile::TempDir;

use crate::config::AssetPaths;

pub const IMAGES: [&str; 7] = ["room", "nature", "airplane", "chicken", "sun", "screen", "earth"];
pub const MESHES: [&str; 4] = ["room", "nature", "airplane", "chicken"];

const QUAD_OBJ: &str = "\
v -1 0 -1
v 1 0 -1
v 1 0 1
v -1 0 1
vt 0 0
vt 1 0
vt 1 1
vt 0 1
vn 0 1 0
f 1/1/1 4/4/1 3/3/1 2/2/1
";

/// Asset tree with every file the scenes reference.
pub fn fixture_assets() -> (TempDir, AssetPaths) {
    let dir = tempfile::tempdir().unwrap();
    let assets = AssetPaths::new(dir.path());
    fs::create_dir_all(&assets.images_dir).unwrap();
    fs::create_dir_all(&assets.objects_dir).unwrap();
    for (index, name) in IMAGES.iter().enumerate() {
        let shade = (index * 30) as u8;
        RgbImage::from_pixel(8, 8, Rgb([shade, 128, 255 - shade]))
            .save(assets.image(name))
            .unwrap();
    }
    for name in MESHES {
        fs::write(assets.mesh(name), QUAD_OBJ).unwrap();
    }
    (dir, assets)
}
