//! Sequence manifest parsing
//!
//! A manifest describes one recorded sequence: playback rate, detector
//! branches, and per-frame locators for the point cloud, ground truth, and
//! each branch's detections. It is loaded once per sequence and turned into
//! an immutable table of [`FrameDescriptor`]s.

use crate::error::{Result, StreamError};
use serde::Deserialize;
use std::collections::BTreeMap;

/// Top-level sequence manifest.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Manifest {
    pub version: u32,
    pub sequence_id: String,
    #[serde(default)]
    pub fps: Option<f64>,
    #[serde(default)]
    pub branches: Option<Vec<String>>,
    pub frames: Vec<ManifestFrame>,
}

/// One frame entry in the manifest.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ManifestFrame {
    pub id: String,
    #[serde(default)]
    pub ts: Option<f64>,
    #[serde(default)]
    pub point_count: Option<usize>,
    pub urls: FrameUrls,
}

/// Locators for one frame's payloads.
#[derive(Debug, Clone, Deserialize)]
pub struct FrameUrls {
    pub points: String,
    #[serde(default)]
    pub gt: Option<String>,
    #[serde(default)]
    pub det: BTreeMap<String, String>,
}

/// Immutable per-frame fetch targets derived from the manifest.
#[derive(Debug, Clone)]
pub struct FrameDescriptor {
    pub index: usize,
    pub points_locator: String,
    pub ground_truth_locator: Option<String>,
    pub detection_locators: BTreeMap<String, String>,
}

impl Manifest {
    /// Parse a manifest from its JSON text.
    pub fn from_json(json: &str) -> Result<Self> {
        let manifest: Manifest = serde_json::from_str(json)?;
        if manifest.frames.is_empty() {
            return Err(StreamError::manifest("manifest frames missing or empty"));
        }
        Ok(manifest)
    }

    pub fn frame_count(&self) -> usize {
        self.frames.len()
    }

    /// Detector branches for this sequence.
    ///
    /// Prefers the declared top-level list; falls back to the (sorted) key
    /// set of the first frame's detection URLs. A declared list that
    /// disagrees with the actual keys is reported but still honored.
    pub fn branch_names(&self) -> Vec<String> {
        let actual: Vec<String> = self
            .frames
            .first()
            .map(|f| f.urls.det.keys().cloned().collect())
            .unwrap_or_default();

        match &self.branches {
            Some(declared) => {
                if !actual.is_empty() && declared.len() != actual.len() {
                    log::warn!(
                        "manifest for '{}' declares {} branches but frames carry {}",
                        self.sequence_id,
                        declared.len(),
                        actual.len()
                    );
                }
                declared.clone()
            }
            None => actual,
        }
    }

    /// Build the full descriptor table.
    pub fn descriptors(&self) -> Vec<FrameDescriptor> {
        self.frames
            .iter()
            .enumerate()
            .map(|(index, frame)| FrameDescriptor {
                index,
                points_locator: frame.urls.points.clone(),
                ground_truth_locator: frame.urls.gt.clone(),
                detection_locators: frame.urls.det.clone(),
            })
            .collect()
    }

    /// Look up one frame, failing fast on an out-of-range index.
    pub fn frame(&self, index: usize) -> Result<&ManifestFrame> {
        self.frames.get(index).ok_or(StreamError::IndexOutOfRange {
            index,
            count: self.frames.len(),
        })
    }
}
