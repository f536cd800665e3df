//! Greedy confidence-ordered detection classification
//!
//! Scores a set of predicted boxes against ground truth: every prediction
//! becomes a true positive or false positive, every unclaimed ground-truth
//! box a false negative. Matching is greedy in confidence order by design;
//! a globally optimal assignment would change which prediction claims a
//! contested box and is deliberately not used.

use crate::obb::{corner_area, iou_corners, OrientedBox, Point2};
use ndarray::Array2;
use rayon::prelude::*;
use serde::Serialize;
use std::collections::HashMap;

/// Object classes recognized by the evaluator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ObjectClass {
    Vehicle,
    Pedestrian,
    Cyclist,
}

impl ObjectClass {
    /// Map a numeric dataset label to a class.
    ///
    /// 1 -> vehicle, 2 -> pedestrian, 3 -> cyclist; anything else is
    /// unknown and should be dropped by the caller.
    pub fn from_label(label: i64) -> Option<Self> {
        match label {
            1 => Some(ObjectClass::Vehicle),
            2 => Some(ObjectClass::Pedestrian),
            3 => Some(ObjectClass::Cyclist),
            _ => None,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            ObjectClass::Vehicle => "vehicle",
            ObjectClass::Pedestrian => "pedestrian",
            ObjectClass::Cyclist => "cyclist",
        }
    }
}

/// A single detection, predicted or ground truth.
///
/// Ground-truth detections carry confidence 1.0.
#[derive(Debug, Clone, Serialize)]
pub struct Detection {
    pub id: String,
    pub class: Option<ObjectClass>,
    pub bbox: OrientedBox,
    pub confidence: f64,
}

/// Classification outcome for a single detection id.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Outcome {
    #[serde(rename = "tp")]
    TruePositive,
    #[serde(rename = "fp")]
    FalsePositive,
    #[serde(rename = "fn")]
    FalseNegative,
}

/// Map from detection id to outcome.
///
/// Every prediction id appears exactly once as tp or fp; ground-truth ids
/// appear only when unmatched, as fn.
pub type ClassificationResult = HashMap<String, Outcome>;

/// Ground-truth detections with corner quads and areas computed once.
///
/// Lets two detector branches evaluated against the same frame share the
/// corner derivation.
#[derive(Debug, Clone)]
pub struct GroundTruthSet {
    detections: Vec<Detection>,
    corners: Vec<[Point2; 4]>,
    areas: Vec<f64>,
}

impl GroundTruthSet {
    pub fn new(ground_truth: &[Detection]) -> Self {
        let (corners, areas) = ground_truth
            .iter()
            .map(|det| corner_area(&det.bbox))
            .unzip();
        Self {
            detections: ground_truth.to_vec(),
            corners,
            areas,
        }
    }

    pub fn detections(&self) -> &[Detection] {
        &self.detections
    }

    pub fn len(&self) -> usize {
        self.detections.len()
    }

    pub fn is_empty(&self) -> bool {
        self.detections.is_empty()
    }

    /// Classify `predictions` against this ground-truth set.
    ///
    /// Greedy matching in descending confidence order; the sort is stable,
    /// so equal-confidence predictions keep their input order and the
    /// earlier one claims a contested ground-truth box.
    pub fn classify(&self, predictions: &[Detection], iou_threshold: f64) -> ClassificationResult {
        let mut order: Vec<usize> = (0..predictions.len()).collect();
        order.sort_by(|&a, &b| {
            predictions[b]
                .confidence
                .partial_cmp(&predictions[a].confidence)
                .unwrap_or(std::cmp::Ordering::Equal)
        });

        let ious = self.iou_matrix(predictions);

        let mut result = ClassificationResult::with_capacity(predictions.len() + self.len());
        let mut matched = vec![false; self.len()];

        for &pred_idx in &order {
            let mut best_iou = 0.0;
            let mut best_gt: Option<usize> = None;
            for gt_idx in 0..self.len() {
                if matched[gt_idx] {
                    continue;
                }
                let value = ious[(pred_idx, gt_idx)];
                if value > best_iou {
                    best_iou = value;
                    best_gt = Some(gt_idx);
                }
            }

            let outcome = match best_gt {
                Some(gt_idx) if best_iou >= iou_threshold => {
                    matched[gt_idx] = true;
                    Outcome::TruePositive
                }
                _ => Outcome::FalsePositive,
            };
            result.insert(predictions[pred_idx].id.clone(), outcome);
        }

        for (gt_idx, det) in self.detections.iter().enumerate() {
            if !matched[gt_idx] {
                result.insert(det.id.clone(), Outcome::FalseNegative);
            }
        }

        result
    }

    /// Pairwise IoU matrix, predictions x ground truth.
    fn iou_matrix(&self, predictions: &[Detection]) -> Array2<f64> {
        let n_preds = predictions.len();
        let n_gt = self.len();
        if n_preds == 0 || n_gt == 0 {
            return Array2::zeros((n_preds, n_gt));
        }

        let data: Vec<f64> = predictions
            .par_iter()
            .flat_map(|pred| {
                let (pred_corners, pred_area) = corner_area(&pred.bbox);
                (0..n_gt)
                    .map(|gt_idx| {
                        iou_corners(
                            &pred_corners,
                            pred_area,
                            &self.corners[gt_idx],
                            self.areas[gt_idx],
                        )
                    })
                    .collect::<Vec<_>>()
            })
            .collect();

        Array2::from_shape_vec((n_preds, n_gt), data)
            .unwrap_or_else(|_| Array2::zeros((n_preds, n_gt)))
    }
}

/// Classify `predictions` against `ground_truth` at `iou_threshold`.
///
/// One-shot convenience over [`GroundTruthSet::classify`]; builds the
/// corner precomputation internally.
pub fn classify(
    predictions: &[Detection],
    ground_truth: &[Detection],
    iou_threshold: f64,
) -> ClassificationResult {
    GroundTruthSet::new(ground_truth).classify(predictions, iou_threshold)
}

/// Default IoU threshold for tp/fp assignment.
pub const DEFAULT_IOU_THRESHOLD: f64 = 0.5;

#[cfg(test)]
mod tests {
    use super::*;

    fn det(id: &str, x: f64, y: f64, confidence: f64) -> Detection {
        Detection {
            id: id.to_string(),
            class: Some(ObjectClass::Vehicle),
            bbox: OrientedBox::new(x, y, 4.0, 2.0, 0.0),
            confidence,
        }
    }

    #[test]
    fn test_from_label_mapping() {
        assert_eq!(ObjectClass::from_label(1), Some(ObjectClass::Vehicle));
        assert_eq!(ObjectClass::from_label(2), Some(ObjectClass::Pedestrian));
        assert_eq!(ObjectClass::from_label(3), Some(ObjectClass::Cyclist));
        assert_eq!(ObjectClass::from_label(0), None);
        assert_eq!(ObjectClass::from_label(42), None);
    }

    #[test]
    fn test_perfect_match_is_tp() {
        let preds = vec![det("det-0", 0.0, 0.0, 0.9)];
        let gt = vec![det("gt-0", 0.0, 0.0, 1.0)];
        let result = classify(&preds, &gt, 0.5);
        assert_eq!(result.get("det-0"), Some(&Outcome::TruePositive));
        assert_eq!(result.get("gt-0"), None); // matched gt is implicit
        assert_eq!(result.len(), 1);
    }

    #[test]
    fn test_miss_is_fp_and_fn() {
        let preds = vec![det("det-0", 50.0, 50.0, 0.9)];
        let gt = vec![det("gt-0", 0.0, 0.0, 1.0)];
        let result = classify(&preds, &gt, 0.5);
        assert_eq!(result.get("det-0"), Some(&Outcome::FalsePositive));
        assert_eq!(result.get("gt-0"), Some(&Outcome::FalseNegative));
    }

    #[test]
    fn test_counts_invariant() {
        let preds = vec![
            det("det-0", 0.0, 0.0, 0.9),
            det("det-1", 0.2, 0.1, 0.8),
            det("det-2", 30.0, 30.0, 0.7),
        ];
        let gt = vec![det("gt-0", 0.0, 0.0, 1.0), det("gt-1", 10.0, 10.0, 1.0)];
        let result = classify(&preds, &gt, 0.5);

        let tp = result.values().filter(|o| **o == Outcome::TruePositive).count();
        let fp = result.values().filter(|o| **o == Outcome::FalsePositive).count();
        let fn_ = result
            .values()
            .filter(|o| **o == Outcome::FalseNegative)
            .count();

        assert_eq!(tp + fp, preds.len());
        // matched ground truth is implicit, so fn + matched == |gt|
        assert_eq!(fn_ + tp, gt.len());
    }

    #[test]
    fn test_confidence_order_wins_over_iou() {
        // High-confidence prediction slightly off the gt box; low-confidence
        // prediction perfectly on it. Greedy confidence order gives the tp
        // to the high-confidence one.
        let preds = vec![det("det-hi", 0.5, 0.0, 0.9), det("det-lo", 0.0, 0.0, 0.5)];
        let gt = vec![det("gt-0", 0.0, 0.0, 1.0)];
        let result = classify(&preds, &gt, 0.5);
        assert_eq!(result.get("det-hi"), Some(&Outcome::TruePositive));
        assert_eq!(result.get("det-lo"), Some(&Outcome::FalsePositive));
    }

    #[test]
    fn test_equal_confidence_ties_keep_input_order() {
        let preds = vec![det("det-a", 0.3, 0.0, 0.7), det("det-b", 0.0, 0.0, 0.7)];
        let gt = vec![det("gt-0", 0.0, 0.0, 1.0)];
        let result = classify(&preds, &gt, 0.5);
        // det-a comes first in input order, so it claims the box.
        assert_eq!(result.get("det-a"), Some(&Outcome::TruePositive));
        assert_eq!(result.get("det-b"), Some(&Outcome::FalsePositive));
    }

    #[test]
    fn test_below_threshold_is_fp() {
        // Overlap exists but IoU 1/3 < 0.5.
        let preds = vec![det("det-0", 2.0, 0.0, 0.9)];
        let gt = vec![det("gt-0", 0.0, 0.0, 1.0)];
        let result = classify(&preds, &gt, 0.5);
        assert_eq!(result.get("det-0"), Some(&Outcome::FalsePositive));
        assert_eq!(result.get("gt-0"), Some(&Outcome::FalseNegative));
    }

    #[test]
    fn test_empty_predictions_all_fn() {
        let gt = vec![det("gt-0", 0.0, 0.0, 1.0), det("gt-1", 10.0, 0.0, 1.0)];
        let result = classify(&[], &gt, 0.5);
        assert_eq!(result.len(), 2);
        assert!(result.values().all(|o| *o == Outcome::FalseNegative));
    }

    #[test]
    fn test_empty_ground_truth_all_fp() {
        let preds = vec![det("det-0", 0.0, 0.0, 0.9)];
        let result = classify(&preds, &[], 0.5);
        assert_eq!(result.get("det-0"), Some(&Outcome::FalsePositive));
        assert_eq!(result.len(), 1);
    }

    #[test]
    fn test_precomputed_set_matches_free_function() {
        let preds = vec![det("det-0", 0.1, 0.0, 0.9), det("det-1", 9.9, 0.2, 0.8)];
        let gt = vec![det("gt-0", 0.0, 0.0, 1.0), det("gt-1", 10.0, 0.0, 1.0)];
        let set = GroundTruthSet::new(&gt);
        assert_eq!(set.classify(&preds, 0.5), classify(&preds, &gt, 0.5));
    }
}
