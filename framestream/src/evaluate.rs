//! Per-frame evaluation of detector branches against ground truth
//!
//! Converts a fetched [`RawFrame`] into the [`StreamedFrame`] handed to
//! consumers: every branch's detections are classified tp/fp/fn against the
//! frame's ground truth, with an optional simulated staleness applied to a
//! designated baseline branch.

use crate::frame_fetcher::RawFrame;
use boxeval::{ClassificationResult, Detection, GroundTruthSet};
use std::collections::{BTreeMap, VecDeque};
use std::sync::Arc;

/// Linear-growth delay model for the lagging-baseline simulation.
///
/// `delay_at(i) = min(max_delay, initial_delay + i * growth_rate)`, in
/// frames.
#[derive(Debug, Clone)]
pub struct DelayPolicy {
    pub initial_delay: f64,
    pub growth_rate: f64,
    pub max_delay: f64,
}

impl DelayPolicy {
    pub fn delay_at(&self, index: usize) -> f64 {
        (self.initial_delay + index as f64 * self.growth_rate).min(self.max_delay)
    }
}

/// One branch's detections plus their classification for a frame.
#[derive(Debug, Clone)]
pub struct BranchEvaluation {
    pub detections: Vec<Detection>,
    pub classification: ClassificationResult,
    /// Simulated staleness in frames, reported only for the baseline branch
    /// when a delay policy is active.
    pub simulated_delay: Option<f64>,
}

/// The frame as exposed to consumers.
///
/// Ownership transfers wholly to the receiver; the controller keeps no
/// emitted frames around.
#[derive(Debug, Clone)]
pub struct StreamedFrame {
    pub index: usize,
    /// Interleaved x,y,z point coordinates.
    pub points: Vec<f32>,
    pub ground_truth: Vec<Detection>,
    pub branches: BTreeMap<String, BranchEvaluation>,
}

/// Stateful evaluator: classifies frames in cursor order and keeps the
/// short ground-truth history the delay simulation reads from.
pub struct FrameEvaluator {
    iou_threshold: f64,
    baseline_branch: Option<String>,
    delay: Option<DelayPolicy>,
    /// Recent (index, ground-truth set) pairs, newest at the back.
    history: VecDeque<(usize, Arc<GroundTruthSet>)>,
    history_capacity: usize,
}

impl FrameEvaluator {
    pub fn new(
        iou_threshold: f64,
        baseline_branch: Option<String>,
        delay: Option<DelayPolicy>,
    ) -> Self {
        let history_capacity = delay
            .as_ref()
            .map(|d| d.max_delay.floor() as usize + 1)
            .unwrap_or(1);
        Self {
            iou_threshold,
            baseline_branch,
            delay,
            history: VecDeque::with_capacity(history_capacity),
            history_capacity,
        }
    }

    /// Drop the ground-truth history (start, seek, loop wrap).
    pub fn reset(&mut self) {
        self.history.clear();
    }

    /// Evaluate one frame. Must be called in cursor order for the delay
    /// simulation to see a contiguous history.
    pub fn evaluate(&mut self, raw: RawFrame) -> StreamedFrame {
        let current_set = Arc::new(GroundTruthSet::new(&raw.ground_truth));
        if self.history.len() == self.history_capacity {
            self.history.pop_front();
        }
        self.history.push_back((raw.index, current_set.clone()));

        let mut branches = BTreeMap::new();
        for (branch, detections) in raw.branches {
            let is_baseline = self.baseline_branch.as_deref() == Some(branch.as_str());
            let (set, simulated_delay) = match (&self.delay, is_baseline) {
                (Some(policy), true) => {
                    let delay = policy.delay_at(raw.index);
                    let target = raw.index.saturating_sub(delay.floor() as usize);
                    (self.lookup(target).unwrap_or_else(|| current_set.clone()), Some(delay))
                }
                _ => (current_set.clone(), None),
            };

            let classification = set.classify(&detections, self.iou_threshold);
            branches.insert(
                branch,
                BranchEvaluation {
                    detections,
                    classification,
                    simulated_delay,
                },
            );
        }

        StreamedFrame {
            index: raw.index,
            points: raw.points,
            ground_truth: raw.ground_truth,
            branches,
        }
    }

    fn lookup(&self, index: usize) -> Option<Arc<GroundTruthSet>> {
        self.history
            .iter()
            .find(|(i, _)| *i == index)
            .map(|(_, set)| set.clone())
    }
}
