//! Box geometry for layout matching.
//!
//! All positions are `(left, top, width, height)` in centimeters, the unit the
//! upstream shape feed reports after EMU conversion.

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};

/// IOU threshold used when a rule or layout does not specify one.
pub const DEFAULT_IOU_THRESHOLD: f64 = 0.3;

/// An axis-aligned rectangle in slide space.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "Vec<f64>", into = "[f64; 4]")]
pub struct BoundingBox {
    pub left: f64,
    pub top: f64,
    pub width: f64,
    pub height: f64,
}

impl BoundingBox {
    /// Create a box, rejecting negative or non-finite dimensions.
    pub fn new(left: f64, top: f64, width: f64, height: f64) -> Result<Self> {
        if ![left, top, width, height].iter().all(|v| v.is_finite()) {
            return Err(Error::ConfigError(format!(
                "box ({}, {}, {}, {}) has non-finite coordinates",
                left, top, width, height
            )));
        }
        if width < 0.0 || height < 0.0 {
            return Err(Error::ConfigError(format!(
                "box ({}, {}, {}, {}) has negative size",
                left, top, width, height
            )));
        }
        Ok(Self {
            left,
            top,
            width,
            height,
        })
    }

    /// Build a box from a coordinate list, which must hold exactly 4 values.
    pub fn from_slice(coords: &[f64]) -> Result<Self> {
        match coords {
            [left, top, width, height] => Self::new(*left, *top, *width, *height),
            _ => Err(Error::ConfigError(format!(
                "box needs 4 coordinates (left, top, width, height), got {}",
                coords.len()
            ))),
        }
    }

    pub fn right(&self) -> f64 {
        self.left + self.width
    }

    pub fn bottom(&self) -> f64 {
        self.top + self.height
    }

    pub fn area(&self) -> f64 {
        self.width * self.height
    }

    /// Center point as `(x, y)`.
    pub fn center(&self) -> (f64, f64) {
        (self.left + self.width / 2.0, self.top + self.height / 2.0)
    }

    /// Euclidean distance between the centers of two boxes.
    pub fn center_distance(&self, other: &BoundingBox) -> f64 {
        let (ax, ay) = self.center();
        let (bx, by) = other.center();
        (bx - ax).hypot(by - ay)
    }

    /// Intersection-over-union with another box.
    pub fn iou(&self, other: &BoundingBox) -> f64 {
        calculate_iou(self, other)
    }
}

impl TryFrom<Vec<f64>> for BoundingBox {
    type Error = Error;

    fn try_from(coords: Vec<f64>) -> Result<Self> {
        Self::from_slice(&coords)
    }
}

impl From<BoundingBox> for [f64; 4] {
    fn from(b: BoundingBox) -> Self {
        [b.left, b.top, b.width, b.height]
    }
}

/// Intersection-over-union of two boxes, in `[0, 1]`.
///
/// Non-overlapping boxes give 0. Degenerate pairs whose union is empty also
/// give 0 instead of dividing by zero.
pub fn calculate_iou(a: &BoundingBox, b: &BoundingBox) -> f64 {
    let inter_left = a.left.max(b.left);
    let inter_top = a.top.max(b.top);
    let inter_right = a.right().min(b.right());
    let inter_bottom = a.bottom().min(b.bottom());

    let inter_area = (inter_right - inter_left).max(0.0) * (inter_bottom - inter_top).max(0.0);
    let union_area = a.area() + b.area() - inter_area;

    if union_area == 0.0 {
        0.0
    } else {
        inter_area / union_area
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn bx(left: f64, top: f64, width: f64, height: f64) -> BoundingBox {
        BoundingBox::new(left, top, width, height).unwrap()
    }

    #[test]
    fn test_iou_identical_is_one() {
        let b = bx(1.5, 2.0, 4.0, 3.0);
        assert_eq!(calculate_iou(&b, &b), 1.0);
    }

    #[test]
    fn test_iou_disjoint_is_zero() {
        let a = bx(0.0, 0.0, 1.0, 1.0);
        let b = bx(5.0, 5.0, 1.0, 1.0);
        assert_eq!(calculate_iou(&a, &b), 0.0);

        // Touching edges share no area.
        let c = bx(1.0, 0.0, 1.0, 1.0);
        assert_eq!(calculate_iou(&a, &c), 0.0);
    }

    #[test]
    fn test_iou_symmetric() {
        let a = bx(0.0, 0.0, 4.0, 2.0);
        let b = bx(1.0, 1.0, 4.0, 4.0);
        assert_eq!(calculate_iou(&a, &b), calculate_iou(&b, &a));
    }

    #[test]
    fn test_iou_partial_overlap() {
        let a = bx(0.0, 0.0, 2.0, 2.0);
        let b = bx(1.0, 0.0, 2.0, 2.0);
        // intersection 2, union 6
        assert!((calculate_iou(&a, &b) - 1.0 / 3.0).abs() < 1e-12);
    }

    #[test]
    fn test_iou_degenerate_union() {
        let a = bx(3.0, 3.0, 0.0, 0.0);
        assert_eq!(calculate_iou(&a, &a), 0.0);
    }

    #[test]
    fn test_from_slice_rejects_short_lists() {
        assert!(BoundingBox::from_slice(&[1.0, 2.0, 3.0]).is_err());
        assert!(BoundingBox::from_slice(&[1.0, 2.0, 3.0, 4.0, 5.0]).is_err());
        assert!(BoundingBox::from_slice(&[1.0, 2.0, -3.0, 4.0]).is_err());
        assert!(BoundingBox::from_slice(&[1.0, 2.0, 3.0, 4.0]).is_ok());
    }

    #[test]
    fn test_center_and_distance() {
        let a = bx(0.0, 0.0, 2.0, 2.0);
        let b = bx(3.0, 4.0, 2.0, 2.0);
        assert_eq!(a.center(), (1.0, 1.0));
        assert_eq!(a.center_distance(&b), 5.0);
    }

    #[test]
    fn test_serde_array_form() {
        let b: BoundingBox = serde_json::from_str("[1.0, 2.0, 3.0, 4.0]").unwrap();
        assert_eq!(b, bx(1.0, 2.0, 3.0, 4.0));
        assert_eq!(serde_json::to_string(&b).unwrap(), "[1.0,2.0,3.0,4.0]");
        assert!(serde_json::from_str::<BoundingBox>("[1.0, 2.0]").is_err());
    }
}
