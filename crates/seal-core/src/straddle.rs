//! Straddle (cross-page) seal slicing
//!
//! The seal image is cut into one vertical strip per page. Strip `i` goes on
//! page `i` at the same distance from the right edge, so the full seal
//! reappears when the stacked pages are fanned out along that edge.

use crate::error::SealError;
use image::imageops::{self, FilterType};
use image::RgbaImage;
use shared_types::Rect;

/// Width of each strip on the page: `total_px / page_count`, remainder dropped
pub fn part_width(total_px: u32, page_count: usize) -> u32 {
    match u32::try_from(page_count) {
        Ok(0) | Err(_) => 0,
        Ok(count) => total_px / count,
    }
}

/// `(x, width)` of each source slice.
///
/// Slices are `image_width / page_count` wide; the last one runs to the
/// image edge so no column is lost to rounding.
pub fn slice_bounds(image_width: u32, page_count: usize) -> Result<Vec<(u32, u32)>, SealError> {
    let count = u32::try_from(page_count)
        .ok()
        .filter(|c| *c > 0)
        .ok_or_else(|| SealError::Image(format!("cannot slice for {} pages", page_count)))?;
    if image_width < count {
        return Err(SealError::Image(format!(
            "seal image is {} px wide, too narrow for {} pages",
            image_width, page_count
        )));
    }

    let slice_width = image_width / count;
    Ok((0..count)
        .map(|i| {
            let x = i * slice_width;
            let width = if i + 1 == count { image_width - x } else { slice_width };
            (x, width)
        })
        .collect())
}

/// Where the strip sits on a page, in top-left page coordinates
pub fn strip_rect(page_width: f64, page_height: f64, part_width: u32, total_px: u32, margin: f64) -> Rect {
    let part = f64::from(part_width);
    let total = f64::from(total_px);
    let x0 = page_width - part - margin;
    let y0 = (page_height - total) / 2.0;
    Rect::new(x0, y0, page_width - margin, y0 + total)
}

/// Cut the seal into `page_count` strips, each resized to `part_width × total_px`
pub fn slice_seal(seal: &RgbaImage, page_count: usize, total_px: u32) -> Result<Vec<RgbaImage>, SealError> {
    let part = part_width(total_px, page_count);
    if part == 0 {
        return Err(SealError::Image(format!(
            "{} pages leave no width for a {} px straddle seal",
            page_count, total_px
        )));
    }

    let bounds = slice_bounds(seal.width(), page_count)?;
    Ok(bounds
        .into_iter()
        .map(|(x, width)| {
            let slice = imageops::crop_imm(seal, x, 0, width, seal.height()).to_image();
            imageops::resize(&slice, part, total_px, FilterType::Lanczos3)
        })
        .collect())
}
