//! Whole-frame fetch glue
//!
//! Combines the per-locator [`FrameSource`] calls for one frame index into
//! a single retried operation producing a [`RawFrame`], the pre-evaluation
//! form of a frame.

use crate::error::{Result, StreamError};
use crate::fetch::{fetch_with_retry, RetryPolicy};
use crate::manifest::{FrameDescriptor, Manifest};
use crate::source::{branch_detections, decode_points, ground_truth_detections, FrameSource};
use boxeval::Detection;
use std::collections::BTreeMap;
use std::sync::Arc;

/// A fully fetched, not yet evaluated frame.
#[derive(Debug, Clone)]
pub struct RawFrame {
    pub index: usize,
    /// Interleaved x,y,z point coordinates.
    pub points: Vec<f32>,
    pub ground_truth: Vec<Detection>,
    /// Score-filtered detections per branch.
    pub branches: BTreeMap<String, Vec<Detection>>,
}

/// Fetches complete frames through an abstract source with retries.
///
/// Owns the descriptor table for one sequence; cheap to share across
/// prefetch tasks behind an `Arc`.
pub struct FrameFetcher {
    source: Arc<dyn FrameSource>,
    sequence_id: String,
    descriptors: Vec<FrameDescriptor>,
    retry: RetryPolicy,
    min_score: f64,
}

impl FrameFetcher {
    pub fn new(
        source: Arc<dyn FrameSource>,
        manifest: &Manifest,
        retry: RetryPolicy,
        min_score: f64,
    ) -> Self {
        Self {
            source,
            sequence_id: manifest.sequence_id.clone(),
            descriptors: manifest.descriptors(),
            retry,
            min_score,
        }
    }

    pub fn frame_count(&self) -> usize {
        self.descriptors.len()
    }

    /// Fetch and decode every payload of one frame.
    ///
    /// Each locator fetch is independently retried per the policy; the
    /// first exhausted retry sequence fails the whole frame.
    pub async fn fetch_frame(&self, index: usize) -> Result<RawFrame> {
        let descriptor = self
            .descriptors
            .get(index)
            .ok_or(StreamError::IndexOutOfRange {
                index,
                count: self.descriptors.len(),
            })?;

        let bytes = fetch_with_retry(&self.retry, || {
            self.source
                .fetch_points(&self.sequence_id, &descriptor.points_locator)
        })
        .await?;
        let points = decode_points(&bytes)?;

        let ground_truth = match &descriptor.ground_truth_locator {
            Some(locator) => {
                let file = fetch_with_retry(&self.retry, || {
                    self.source.fetch_ground_truth(&self.sequence_id, locator)
                })
                .await?;
                ground_truth_detections(&file)
            }
            None => Vec::new(),
        };

        let mut branches = BTreeMap::new();
        for (branch, locator) in &descriptor.detection_locators {
            let file = fetch_with_retry(&self.retry, || {
                self.source.fetch_detections(&self.sequence_id, locator)
            })
            .await?;
            branches.insert(branch.clone(), branch_detections(&file, self.min_score));
        }

        log::debug!(
            "fetched frame {} ({} points, {} gt boxes, {} branches)",
            index,
            points.len() / 3,
            ground_truth.len(),
            branches.len()
        );

        Ok(RawFrame {
            index,
            points,
            ground_truth,
            branches,
        })
    }
}
