//! Convex polygon clipping and area

use crate::obb::Point2;

/// Denominator threshold below which two edges are treated as parallel.
const PARALLEL_EPSILON: f64 = 1e-12;

/// Sutherland-Hodgman clipping of `subject` against the convex polygon
/// `window`.
///
/// `window` vertices must be in counter-clockwise order (as produced by
/// [`crate::OrientedBox::corners`]). Returns the intersection polygon, or an
/// empty vector when the polygons do not overlap. Near-parallel edge pairs
/// are skipped rather than producing NaN vertices.
pub fn clip(subject: &[Point2], window: &[Point2]) -> Vec<Point2> {
    let mut output: Vec<Point2> = subject.to_vec();

    for i in 0..window.len() {
        if output.is_empty() {
            return output;
        }
        let edge_start = window[i];
        let edge_end = window[(i + 1) % window.len()];

        let input = std::mem::take(&mut output);
        for (j, &current) in input.iter().enumerate() {
            let previous = input[(j + input.len() - 1) % input.len()];
            let current_inside = is_inside(edge_start, edge_end, current);
            let previous_inside = is_inside(edge_start, edge_end, previous);

            if current_inside {
                if !previous_inside {
                    if let Some(p) = intersect(edge_start, edge_end, previous, current) {
                        output.push(p);
                    }
                }
                output.push(current);
            } else if previous_inside {
                if let Some(p) = intersect(edge_start, edge_end, previous, current) {
                    output.push(p);
                }
            }
        }
    }

    output
}

/// Shoelace area of a polygon; `0.0` for fewer than three vertices.
pub fn area(polygon: &[Point2]) -> f64 {
    if polygon.len() < 3 {
        return 0.0;
    }
    let mut twice_area = 0.0;
    for i in 0..polygon.len() {
        let a = polygon[i];
        let b = polygon[(i + 1) % polygon.len()];
        twice_area += a.x * b.y - b.x * a.y;
    }
    twice_area.abs() / 2.0
}

/// Cross-product sign test: is `p` on the left of (or on) the directed edge
/// `a -> b`?
fn is_inside(a: Point2, b: Point2, p: Point2) -> bool {
    (b.x - a.x) * (p.y - a.y) - (b.y - a.y) * (p.x - a.x) >= 0.0
}

/// Intersection of the infinite line through `a`-`b` with the segment
/// `p`-`q`. `None` when the lines are (near-)parallel.
fn intersect(a: Point2, b: Point2, p: Point2, q: Point2) -> Option<Point2> {
    let d1x = b.x - a.x;
    let d1y = b.y - a.y;
    let d2x = q.x - p.x;
    let d2y = q.y - p.y;

    let denom = d1x * d2y - d1y * d2x;
    if denom.abs() < PARALLEL_EPSILON {
        return None;
    }

    let t = ((p.x - a.x) * d1y - (p.y - a.y) * d1x) / denom;
    Some(Point2::new(p.x + t * d2x, p.y + t * d2y))
}
