//! Coordinate transformation between PDF user space and top-left page space
//!
//! PDF user space has its origin at the bottom-left of the MediaBox with y
//! growing upward. Everything above this crate (spans, candidates, stamp
//! positions) uses a top-left origin with y growing downward, in points.

use shared_types::Rect;

/// Page MediaBox as origin plus size
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MediaBox {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
}

impl MediaBox {
    /// US Letter, used when a page carries no usable MediaBox
    pub const LETTER: MediaBox = MediaBox {
        x: 0.0,
        y: 0.0,
        width: 612.0,
        height: 792.0,
    };

    /// Build from the raw `[x1 y1 x2 y2]` array, normalising inverted corners
    pub fn from_corners(x1: f64, y1: f64, x2: f64, y2: f64) -> Self {
        Self {
            x: x1.min(x2),
            y: y1.min(y2),
            width: (x2 - x1).abs(),
            height: (y2 - y1).abs(),
        }
    }
}

/// Convert top-left page coordinates to PDF user space
pub fn top_left_to_pdf(x: f64, y: f64, media_box: MediaBox) -> (f64, f64) {
    (media_box.x + x, media_box.y + media_box.height - y)
}

/// Convert PDF user space coordinates to top-left page coordinates
pub fn pdf_to_top_left(pdf_x: f64, pdf_y: f64, media_box: MediaBox) -> (f64, f64) {
    (pdf_x - media_box.x, media_box.y + media_box.height - pdf_y)
}

/// Convert a top-left rectangle to `[x, y, width, height]` in PDF user space,
/// where `(x, y)` is the lower-left corner.
pub fn rect_to_pdf(rect: &Rect, media_box: MediaBox) -> [f64; 4] {
    let (llx, lly) = top_left_to_pdf(rect.x0, rect.y1, media_box);
    [llx, lly, rect.width(), rect.height()]
}
