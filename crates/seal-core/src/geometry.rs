//! Page regions and rectangle arithmetic

use serde::{Deserialize, Serialize};
use shared_types::Rect;
use std::fmt;

/// One cell of a page split into a 3×3 grid
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Region {
    TopLeft,
    TopMiddle,
    TopRight,
    MiddleLeft,
    MiddleMiddle,
    MiddleRight,
    BottomLeft,
    BottomMiddle,
    BottomRight,
}

impl Region {
    /// Row-major order, top-left first
    pub const ALL: [Region; 9] = [
        Region::TopLeft,
        Region::TopMiddle,
        Region::TopRight,
        Region::MiddleLeft,
        Region::MiddleMiddle,
        Region::MiddleRight,
        Region::BottomLeft,
        Region::BottomMiddle,
        Region::BottomRight,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            Region::TopLeft => "top_left",
            Region::TopMiddle => "top_middle",
            Region::TopRight => "top_right",
            Region::MiddleLeft => "middle_left",
            Region::MiddleMiddle => "middle_middle",
            Region::MiddleRight => "middle_right",
            Region::BottomLeft => "bottom_left",
            Region::BottomMiddle => "bottom_middle",
            Region::BottomRight => "bottom_right",
        }
    }
}

impl fmt::Display for Region {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Split a page into thirds along both axes.
///
/// The last row and column end exactly at the page edge so the cells tile
/// the page without gaps.
pub fn divide_into_regions(page_width: f64, page_height: f64) -> [(Region, Rect); 9] {
    let xs = [0.0, page_width / 3.0, 2.0 * page_width / 3.0, page_width];
    let ys = [0.0, page_height / 3.0, 2.0 * page_height / 3.0, page_height];

    Region::ALL.map(|region| {
        let index = region as usize;
        let (row, col) = (index / 3, index % 3);
        (region, Rect::new(xs[col], ys[row], xs[col + 1], ys[row + 1]))
    })
}

/// Intersection area of two rectangles, 0 when they only touch
pub fn overlap_area(a: &Rect, b: &Rect) -> f64 {
    let x0 = a.x0.max(b.x0);
    let y0 = a.y0.max(b.y0);
    let x1 = a.x1.min(b.x1);
    let y1 = a.y1.min(b.y1);

    if x1 > x0 && y1 > y0 {
        (x1 - x0) * (y1 - y0)
    } else {
        0.0
    }
}

pub fn distance(a: (f64, f64), b: (f64, f64)) -> f64 {
    (a.0 - b.0).hypot(a.1 - b.1)
}


#[cfg(test)]
mod proptests {
    use super::*;
    use proptest::prelude::*;

    fn rect() -> impl Strategy<Value = Rect> {
        (-500.0f64..500.0, -500.0f64..500.0, 0.0f64..400.0, 0.0f64..400.0)
            .prop_map(|(x, y, w, h)| Rect::from_origin(x, y, w, h))
    }

    proptest! {
        #[test]
        fn overlap_is_symmetric(a in rect(), b in rect()) {
            prop_assert_eq!(overlap_area(&a, &b), overlap_area(&b, &a));
        }

        #[test]
        fn overlap_never_exceeds_either_area(a in rect(), b in rect()) {
            let o = overlap_area(&a, &b);
            prop_assert!(o >= 0.0);
            prop_assert!(o <= a.area() + 1e-9);
            prop_assert!(o <= b.area() + 1e-9);
        }

        #[test]
        fn regions_tile_the_page(w in 1.0f64..3000.0, h in 1.0f64..3000.0) {
            let regions = divide_into_regions(w, h);
            let total: f64 = regions.iter().map(|(_, r)| r.area()).sum();
            prop_assert!((total - w * h).abs() < 1e-6 * w * h);

            for (i, (_, a)) in regions.iter().enumerate() {
                for (_, b) in regions.iter().skip(i + 1) {
                    prop_assert_eq!(overlap_area(a, b), 0.0);
                }
            }
            prop_assert_eq!(regions[8].1.x1, w);
            prop_assert_eq!(regions[8].1.y1, h);
        }
    }
}
