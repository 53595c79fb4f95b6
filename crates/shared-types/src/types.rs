use std::path::PathBuf;

/// Axis-aligned rectangle in page units.
///
/// Coordinates use a top-left origin with y growing downward, the same
/// space text spans, candidates and stamp positions are expressed in.
#[derive(Debug, Clone, Copy, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct Rect {
    pub x0: f64,
    pub y0: f64,
    pub x1: f64,
    pub y1: f64,
}

impl Rect {
    pub const fn new(x0: f64, y0: f64, x1: f64, y1: f64) -> Self {
        Self { x0, y0, x1, y1 }
    }

    /// Build a rectangle from its top-left corner and size
    pub fn from_origin(x: f64, y: f64, width: f64, height: f64) -> Self {
        Self::new(x, y, x + width, y + height)
    }

    pub fn width(&self) -> f64 {
        self.x1 - self.x0
    }

    pub fn height(&self) -> f64 {
        self.y1 - self.y0
    }

    /// Area, zero for degenerate or inverted rectangles
    pub fn area(&self) -> f64 {
        self.width().max(0.0) * self.height().max(0.0)
    }

    pub fn center(&self) -> (f64, f64) {
        ((self.x0 + self.x1) / 2.0, (self.y0 + self.y1) / 2.0)
    }

    /// Smallest rectangle containing both
    pub fn union(&self, other: &Rect) -> Rect {
        Rect::new(
            self.x0.min(other.x0),
            self.y0.min(other.y0),
            self.x1.max(other.x1),
            self.y1.max(other.y1),
        )
    }
}

/// One contiguous run of text sharing font and size
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct TextSpan {
    pub text: String,
    pub bbox: Rect,
    pub font: String,
    pub size: f64,
}

/// Extracted text layout of a single page
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct PageLayout {
    /// 0-based page index
    pub page_index: usize,
    pub width: f64,
    pub height: f64,
    /// Spans in content-stream order
    pub spans: Vec<TextSpan>,
}

impl PageLayout {
    pub fn new(page_index: usize, width: f64, height: f64) -> Self {
        Self {
            page_index,
            width,
            height,
            spans: Vec::new(),
        }
    }

    /// A page without any extractable text
    pub fn is_blank(&self) -> bool {
        self.spans.is_empty()
    }

    /// Concatenated span text, one span per line
    pub fn text(&self) -> String {
        self.spans
            .iter()
            .map(|s| s.text.as_str())
            .collect::<Vec<_>>()
            .join("\n")
    }
}

/// A suggested place to put a seal
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct CandidatePosition {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
    pub score: f64,
    /// Human readable explanation of where the candidate came from
    pub reason: String,
    /// 0-based page index
    pub page: usize,
}

impl CandidatePosition {
    pub fn center(&self) -> (f64, f64) {
        (self.x + self.width / 2.0, self.y + self.height / 2.0)
    }

    pub fn rect(&self) -> Rect {
        Rect::from_origin(self.x, self.y, self.width, self.height)
    }

    /// The stamp request entry that places a seal at this candidate
    pub fn to_stamp_position(&self) -> StampPosition {
        StampPosition {
            page: self.page,
            x: self.x,
            y: self.y,
            width: Some(self.width),
            height: Some(self.height),
        }
    }
}

/// Where a seal goes: page plus top-left corner.
///
/// `width` and `height` are carried for display only, the renderer always
/// uses the configured physical seal size.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct StampPosition {
    #[serde(default)]
    pub page: usize,
    #[serde(default)]
    pub x: f64,
    #[serde(default)]
    pub y: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub width: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub height: Option<f64>,
}

impl StampPosition {
    pub fn new(page: usize, x: f64, y: f64) -> Self {
        Self {
            page,
            x,
            y,
            width: None,
            height: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct StampRequest {
    pub source_pdf: PathBuf,
    pub seal_image: PathBuf,
    pub output_pdf: PathBuf,
    pub positions: Vec<StampPosition>,
}


#[cfg(test)]
mod proptests {
    use super::*;
    use proptest::prelude::*;

    proptest! {
        #[test]
        fn union_contains_both(
            ax in -500.0f64..500.0, ay in -500.0f64..500.0, aw in 0.0f64..300.0, ah in 0.0f64..300.0,
            bx in -500.0f64..500.0, by in -500.0f64..500.0, bw in 0.0f64..300.0, bh in 0.0f64..300.0,
        ) {
            let a = Rect::from_origin(ax, ay, aw, ah);
            let b = Rect::from_origin(bx, by, bw, bh);
            let u = a.union(&b);
            prop_assert!(u.x0 <= a.x0 && u.x0 <= b.x0);
            prop_assert!(u.y0 <= a.y0 && u.y0 <= b.y0);
            prop_assert!(u.x1 >= a.x1 && u.x1 >= b.x1);
            prop_assert!(u.y1 >= a.y1 && u.y1 >= b.y1);
        }

        #[test]
        fn area_is_never_negative(x0 in -1e4f64..1e4, y0 in -1e4f64..1e4, x1 in -1e4f64..1e4, y1 in -1e4f64..1e4) {
            prop_assert!(Rect::new(x0, y0, x1, y1).area() >= 0.0);
        }
    }
}
