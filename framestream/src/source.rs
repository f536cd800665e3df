//! Abstract frame source and raw payload decoding
//!
//! The engine never talks to the network or disk directly; everything goes
//! through the [`FrameSource`] trait, so HTTP, filesystem, and in-memory
//! test sources are interchangeable.

use crate::error::{Result, StreamError};
use async_trait::async_trait;
use boxeval::{Detection, ObjectClass, OrientedBox};
use serde::Deserialize;

/// Common interface for frame payload providers
///
/// Implementations are expected to be cheap to share (`Arc`) and to report
/// transport problems via [`StreamError::Transport`]; retry handling lives
/// above this trait.
#[async_trait]
pub trait FrameSource: Send + Sync {
    /// Fetch the raw point cloud payload for one frame.
    async fn fetch_points(&self, sequence_id: &str, locator: &str) -> Result<Vec<u8>>;

    /// Fetch the ground-truth box file for one frame.
    async fn fetch_ground_truth(&self, sequence_id: &str, locator: &str) -> Result<BoxFile>;

    /// Fetch one detector branch's box file for one frame.
    async fn fetch_detections(&self, sequence_id: &str, locator: &str) -> Result<BoxFile>;
}

/// On-the-wire box record (OpenPCDet layout: dx along heading, dy across).
#[derive(Debug, Clone, Deserialize)]
pub struct RawBox {
    pub x: f64,
    pub y: f64,
    pub z: f64,
    pub dx: f64,
    pub dy: f64,
    pub dz: f64,
    pub heading: f64,
    #[serde(default)]
    pub label: Option<i64>,
    #[serde(default)]
    pub score: Option<f64>,
}

/// A fetched ground-truth or detection file.
#[derive(Debug, Clone, Deserialize)]
pub struct BoxFile {
    pub boxes: Vec<RawBox>,
}

impl RawBox {
    fn oriented_box(&self) -> OrientedBox {
        OrientedBox::new(self.x, self.y, self.dx, self.dy, self.heading)
    }
}

/// Convert a ground-truth box file into detections.
///
/// Labels map 1/2/3 to vehicle/pedestrian/cyclist; unknown labels are
/// dropped with a warning, never fatal. Confidence is fixed at 1.0.
pub fn ground_truth_detections(file: &BoxFile) -> Vec<Detection> {
    let mut detections = Vec::with_capacity(file.boxes.len());
    for (i, raw) in file.boxes.iter().enumerate() {
        let class = raw.label.and_then(ObjectClass::from_label);
        if raw.label.is_some() && class.is_none() {
            log::warn!(
                "dropping ground-truth box {} with unknown label {:?}",
                i,
                raw.label
            );
            continue;
        }
        detections.push(Detection {
            id: format!("gt-{i}"),
            class,
            bbox: raw.oriented_box(),
            confidence: 1.0,
        });
    }
    detections
}

/// Convert a detection box file, keeping only boxes at or above `min_score`.
pub fn branch_detections(file: &BoxFile, min_score: f64) -> Vec<Detection> {
    file.boxes
        .iter()
        .enumerate()
        .filter_map(|(i, raw)| {
            let score = raw.score.unwrap_or(0.0);
            if score < min_score {
                return None;
            }
            Some(Detection {
                id: format!("det-{i}"),
                class: raw.label.and_then(ObjectClass::from_label),
                bbox: raw.oriented_box(),
                confidence: score,
            })
        })
        .collect()
}

/// Decode an interleaved x,y,z little-endian f32 point payload.
pub fn decode_points(bytes: &[u8]) -> Result<Vec<f32>> {
    if bytes.len() % 12 != 0 {
        return Err(StreamError::PointBuffer { len: bytes.len() });
    }
    Ok(bytes
        .chunks_exact(4)
        .map(|chunk| f32::from_le_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]))
        .collect())
}
