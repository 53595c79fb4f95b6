//! Built-in placeholder seal

use crate::error::SealError;
use image::{ImageFormat, Rgba, RgbaImage};
use std::path::Path;

const SIZE: u32 = 100;
const OUTER_RADIUS: f32 = 45.0;
const STROKE: f32 = 3.0;
const SEAL_RED: Rgba<u8> = Rgba([220, 20, 20, 255]);

/// A red ring on a transparent square
pub fn default_seal_image() -> RgbaImage {
    let center = (SIZE as f32 - 1.0) / 2.0;
    RgbaImage::from_fn(SIZE, SIZE, |x, y| {
        let d = (x as f32 - center).hypot(y as f32 - center);
        if d <= OUTER_RADIUS && d >= OUTER_RADIUS - STROKE {
            SEAL_RED
        } else {
            Rgba([0, 0, 0, 0])
        }
    })
}

/// Write the built-in seal as a PNG file
pub fn write_default_seal(path: impl AsRef<Path>) -> Result<(), SealError> {
    default_seal_image().save_with_format(path.as_ref(), ImageFormat::Png)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ring_is_red_and_centre_transparent() {
        let seal = default_seal_image();
        assert_eq!(seal.dimensions(), (100, 100));
        assert_eq!(seal.get_pixel(50, 50)[3], 0);
        assert_eq!(*seal.get_pixel(50, 6), SEAL_RED);
        assert_eq!(seal.get_pixel(0, 0)[3], 0);
    }

    #[test]
    fn test_written_seal_reloads() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("seal.png");
        write_default_seal(&path).unwrap();
        let loaded = image::open(&path).unwrap().to_rgba8();
        assert_eq!(loaded, default_seal_image());
    }
}
