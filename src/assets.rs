use std::fs;
use std::path::Path;

use image::imageops::FilterType;
use image::RgbaImage;
use log::debug;

use crate::error::{RenderError, Result};
use crate::mesh::MeshData;
use crate::obj::load_obj_from_str;

/// One level of a texture's mip chain, tightly packed RGBA8.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MipLevel {
    pub width: u32,
    pub height: u32,
    pub pixels: Vec<u8>,
}

/// Decoded RGBA image with its complete mip chain.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageData {
    pub levels: Vec<MipLevel>,
}

impl ImageData {
    /// Builds the mip chain for `image`.
    ///
    /// The chain has `max(1, floor(log2(min(width, height))))` levels, each half
    /// the size of the previous one.
    pub fn from_rgba(image: RgbaImage) -> Self {
        let count = mip_level_count(image.width(), image.height());
        let mut levels = Vec::with_capacity(count as usize);
        let mut current = image;
        for level in 0..count {
            if level > 0 {
                let width = (current.width() / 2).max(1);
                let height = (current.height() / 2).max(1);
                current = image::imageops::resize(&current, width, height, FilterType::Triangle);
            }
            levels.push(MipLevel {
                width: current.width(),
                height: current.height(),
                pixels: current.as_raw().clone(),
            });
        }
        Self { levels }
    }

    pub fn width(&self) -> u32 {
        self.levels[0].width
    }

    pub fn height(&self) -> u32 {
        self.levels[0].height
    }

    pub fn mip_level_count(&self) -> u32 {
        self.levels.len() as u32
    }
}

pub fn mip_level_count(width: u32, height: u32) -> u32 {
    width.min(height).max(1).ilog2().max(1)
}

/// Decodes an image file into RGBA8 with mipmaps.
pub fn load_image(path: &Path) -> Result<ImageData> {
    let image = image::open(path)
        .map_err(|source| RenderError::Image {
            path: path.to_path_buf(),
            source,
        })?
        .to_rgba8();
    debug!(
        "decoded {} ({}x{})",
        path.display(),
        image.width(),
        image.height()
    );
    Ok(ImageData::from_rgba(image))
}

/// Reads and parses an OBJ mesh.
pub fn load_mesh(path: &Path) -> Result<MeshData> {
    let contents = fs::read_to_string(path).map_err(|source| RenderError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    load_obj_from_str(&contents).map_err(|source| RenderError::Mesh {
        path: path.to_path_buf(),
        source,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgba;

    #[test]
    fn mip_count_follows_shorter_edge() {
        assert_eq!(mip_level_count(1024, 512), 9);
        assert_eq!(mip_level_count(4, 4), 2);
        assert_eq!(mip_level_count(1, 1), 1);
    }

    #[test]
    fn mip_chain_halves_each_level() {
        let image = RgbaImage::from_pixel(16, 8, Rgba([255, 0, 0, 255]));
        let data = ImageData::from_rgba(image);
        assert_eq!(data.mip_level_count(), 3);
        let sizes: Vec<_> = data.levels.iter().map(|l| (l.width, l.height)).collect();
        assert_eq!(sizes, vec![(16, 8), (8, 4), (4, 2)]);
        for level in &data.levels {
            assert_eq!(level.pixels.len(), (level.width * level.height * 4) as usize);
        }
    }

    #[test]
    fn missing_image_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let err = load_image(&dir.path().join("nope.jpg")).unwrap_err();
        assert!(matches!(err, RenderError::Image { .. }));
    }

    #[test]
    fn corrupt_mesh_reports_path() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("broken.obj");
        fs::write(&path, "v 0 0\n").unwrap();
        let err = load_mesh(&path).unwrap_err();
        assert!(matches!(err, RenderError::Mesh { .. }));
        assert!(err.to_string().contains("broken.obj"));
    }
}
