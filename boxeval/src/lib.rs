//! Oriented bounding-box evaluation library
//!
//! This crate provides the geometry and matching primitives used to score
//! detector output against ground truth in the bird's-eye view:
//!
//! - oriented rectangle corner derivation, convex polygon clipping
//!   (Sutherland-Hodgman) and shoelace area,
//! - oriented-box IoU built on top of those primitives,
//! - greedy confidence-ordered TP/FP/FN classification of predictions
//!   against a ground-truth set.
//!
//! All operations are pure and stateless, so evaluators for multiple
//! detector branches can share them freely.
//!
//! ```rust,ignore
//! use boxeval::{classify, Detection, OrientedBox};
//!
//! let result = classify(&predictions, &ground_truth, 0.5);
//! ```

pub mod classify;
pub mod obb;
pub mod polygon;

pub use classify::{
    classify, ClassificationResult, Detection, GroundTruthSet, ObjectClass, Outcome,
    DEFAULT_IOU_THRESHOLD,
};
pub use obb::{corner_area, iou, iou_corners, OrientedBox, Point2};
pub use polygon::{area, clip};
