//! Oriented bounding boxes and bird's-eye-view IoU

use crate::polygon::{area, clip};
use serde::Serialize;

/// Epsilon below which intersection/union areas are treated as zero.
///
/// Guards the IoU ratio against 0/0 for degenerate boxes.
const AREA_EPSILON: f64 = 1e-10;

/// A 2D point in the ground plane.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Point2 {
    pub x: f64,
    pub y: f64,
}

impl Point2 {
    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }
}

/// Oriented rectangle in the ground plane.
///
/// `length` extends along the heading direction, `width` across it.
/// Corners are always derived, never stored.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct OrientedBox {
    pub center_x: f64,
    pub center_y: f64,
    /// Extent along the heading direction.
    pub length: f64,
    /// Extent across the heading direction.
    pub width: f64,
    /// Rotation about the vertical axis, radians.
    pub heading: f64,
}

impl OrientedBox {
    pub fn new(center_x: f64, center_y: f64, length: f64, width: f64, heading: f64) -> Self {
        Self {
            center_x,
            center_y,
            length,
            width,
            heading,
        }
    }

    /// Four corners in fixed rotational order:
    /// front-right, front-left, rear-left, rear-right.
    ///
    /// Counter-clockwise for positive extents, which is what the clipping
    /// inside-test expects.
    pub fn corners(&self) -> [Point2; 4] {
        let (sin, cos) = self.heading.sin_cos();
        let hl = self.length / 2.0;
        let hw = self.width / 2.0;

        // Unit vectors along and across the heading.
        let (ax, ay) = (cos, sin);
        let (px, py) = (-sin, cos);

        let corner = |l: f64, w: f64| {
            Point2::new(
                self.center_x + ax * l + px * w,
                self.center_y + ay * l + py * w,
            )
        };

        [
            corner(hl, -hw), // front-right
            corner(hl, hw),  // front-left
            corner(-hl, hw), // rear-left
            corner(-hl, -hw), // rear-right
        ]
    }

    /// Area of the box itself.
    pub fn area(&self) -> f64 {
        (self.length * self.width).abs()
    }
}

/// Intersection-over-union of two oriented boxes in the ground plane.
///
/// Returns a value in `[0, 1]`; symmetric in its arguments. Degenerate
/// boxes (zero union or vanishing intersection) yield `0.0` rather than NaN.
pub fn iou(a: &OrientedBox, b: &OrientedBox) -> f64 {
    iou_corners(&a.corners(), a.area(), &b.corners(), b.area())
}

/// IoU from precomputed corner quads and areas.
///
/// Used by the classifier to avoid re-deriving ground-truth corners for
/// every prediction pairing.
pub fn iou_corners(a: &[Point2; 4], a_area: f64, b: &[Point2; 4], b_area: f64) -> f64 {
    let intersection = clip(a, b);
    let inter_area = area(&intersection);
    if inter_area < AREA_EPSILON {
        return 0.0;
    }
    let union = a_area + b_area - inter_area;
    if union < AREA_EPSILON {
        return 0.0;
    }
    inter_area / union
}

/// Corner quad plus area for a box, the unit of precomputation.
pub fn corner_area(bbox: &OrientedBox) -> ([Point2; 4], f64) {
    (bbox.corners(), bbox.area())
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;
    use std::f64::consts::FRAC_PI_2;

    #[test]
    fn test_corners_axis_aligned() {
        let bbox = OrientedBox::new(0.0, 0.0, 4.0, 2.0, 0.0);
        let c = bbox.corners();
        // front-right, front-left, rear-left, rear-right
        assert_abs_diff_eq!(c[0].x, 2.0, epsilon = 1e-12);
        assert_abs_diff_eq!(c[0].y, -1.0, epsilon = 1e-12);
        assert_abs_diff_eq!(c[1].x, 2.0, epsilon = 1e-12);
        assert_abs_diff_eq!(c[1].y, 1.0, epsilon = 1e-12);
        assert_abs_diff_eq!(c[2].x, -2.0, epsilon = 1e-12);
        assert_abs_diff_eq!(c[2].y, 1.0, epsilon = 1e-12);
        assert_abs_diff_eq!(c[3].x, -2.0, epsilon = 1e-12);
        assert_abs_diff_eq!(c[3].y, -1.0, epsilon = 1e-12);
    }

    #[test]
    fn test_corners_rotated_quarter_turn() {
        // Heading of pi/2 points the length axis along +y.
        let bbox = OrientedBox::new(1.0, 1.0, 4.0, 2.0, FRAC_PI_2);
        let c = bbox.corners();
        assert_abs_diff_eq!(c[0].x, 2.0, epsilon = 1e-12); // front-right
        assert_abs_diff_eq!(c[0].y, 3.0, epsilon = 1e-12);
        assert_abs_diff_eq!(c[2].x, 0.0, epsilon = 1e-12); // rear-left
        assert_abs_diff_eq!(c[2].y, -1.0, epsilon = 1e-12);
    }

    #[test]
    fn test_iou_identical_box_is_one() {
        let bbox = OrientedBox::new(3.0, -2.0, 4.5, 1.8, 0.7);
        assert_abs_diff_eq!(iou(&bbox, &bbox), 1.0, epsilon = 1e-9);
    }

    #[test]
    fn test_iou_disjoint_is_zero() {
        let a = OrientedBox::new(0.0, 0.0, 4.0, 2.0, 0.0);
        let b = OrientedBox::new(100.0, 100.0, 4.0, 2.0, 1.1);
        assert_eq!(iou(&a, &b), 0.0);
    }

    #[test]
    fn test_iou_symmetric() {
        let a = OrientedBox::new(0.0, 0.0, 4.0, 2.0, 0.3);
        let b = OrientedBox::new(1.0, 0.5, 3.0, 2.0, -0.4);
        assert_abs_diff_eq!(iou(&a, &b), iou(&b, &a), epsilon = 1e-12);
    }

    #[test]
    fn test_iou_shifted_along_length() {
        // 4x2 box shifted by 2 along its length axis: intersection 2x2 = 4,
        // union 8 + 8 - 4 = 12.
        let a = OrientedBox::new(0.0, 0.0, 4.0, 2.0, 0.0);
        let b = OrientedBox::new(2.0, 0.0, 4.0, 2.0, 0.0);
        assert_abs_diff_eq!(iou(&a, &b), 1.0 / 3.0, epsilon = 1e-9);
    }

    #[test]
    fn test_iou_rotated_overlap() {
        // A square and the same square rotated 90 degrees overlap fully.
        let a = OrientedBox::new(0.0, 0.0, 2.0, 2.0, 0.0);
        let b = OrientedBox::new(0.0, 0.0, 2.0, 2.0, FRAC_PI_2);
        assert_abs_diff_eq!(iou(&a, &b), 1.0, epsilon = 1e-9);
    }

    #[test]
    fn test_iou_degenerate_box_no_nan() {
        let a = OrientedBox::new(0.0, 0.0, 0.0, 0.0, 0.0);
        let b = OrientedBox::new(0.0, 0.0, 0.0, 0.0, 0.0);
        let value = iou(&a, &b);
        assert!(value.is_finite());
        assert_eq!(value, 0.0);
    }

    #[test]
    fn test_iou_corners_matches_iou() {
        let a = OrientedBox::new(0.5, -0.5, 3.0, 1.5, 0.2);
        let b = OrientedBox::new(0.0, 0.0, 3.0, 1.5, 0.1);
        let (ca, aa) = corner_area(&a);
        let (cb, ab) = corner_area(&b);
        assert_abs_diff_eq!(iou(&a, &b), iou_corners(&ca, aa, &cb, ab), epsilon = 1e-12);
    }
}
