#![allow(dead_code)]

use std::fs;
use std::path::Path;

use image::{Rgb, RgbImage};
use tempfile::TempDir;

pub const IMAGES: [&str; 7] = ["room", "nature", "airplane", "chicken", "sun", "screen", "earth"];
pub const MESHES: [&str; 4] = ["room", "nature", "airplane", "chicken"];

const TRIANGLE_OBJ: &str = "\
v 0 0 0
v 1 0 0
v 0 1 0
vt 0 0
vt 1 0
vt 0 1
f 1/1 2/2 3/3
";

/// Writes `images/*.jpg` and `objects/*.obj` for every asset the scenes load.
pub fn write_assets(root: &Path) {
    let images = root.join("images");
    let objects = root.join("objects");
    fs::create_dir_all(&images).unwrap();
    fs::create_dir_all(&objects).unwrap();
    for name in IMAGES {
        RgbImage::from_fn(16, 16, |x, y| Rgb([(x * 16) as u8, (y * 16) as u8, 96]))
            .save(images.join(format!("{name}.jpg")))
            .unwrap();
    }
    for name in MESHES {
        fs::write(objects.join(format!("{name}.obj")), TRIANGLE_OBJ).unwrap();
    }
}

pub fn asset_dir() -> TempDir {
    let dir = tempfile::tempdir().unwrap();
    write_assets(dir.path());
    dir
}
