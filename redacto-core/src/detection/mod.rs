// ============================================================================
// redacto-core/src/detection/mod.rs
// ============================================================================
//
// DETECTION: Region Detector Contract and Provided Detectors
//
// The object detector is an external collaborator: given one frame it
// returns every classified bounding box it found, in any order. This module
// defines that contract, the box type and the detection error, and hosts the
// concrete detectors shipped with the library.
//
// KEY COMPONENTS:
// - RegionDetector: trait injected into the pipeline at construction time
// - DetectionBox: classified rectangle in (possibly out-of-frame) pixels
// - TargetClasses / select_regions: label filter and clamping to the frame
// - CommandDetector: long-lived detector process speaking a line protocol
// - PrecomputedDetector: detections read from a JSON file

use crate::frame::Frame;

use serde::{Deserialize, Deserializer, Serialize};
use std::io;
use std::time::Duration;
use thiserror::Error;

pub mod command;
pub mod precomputed;
pub mod targets;

pub use command::CommandDetector;
pub use precomputed::PrecomputedDetector;
pub use targets::{TargetClasses, select_regions};

/// A classified axis-aligned rectangle produced for a single frame.
///
/// Coordinates are signed because detectors may report boxes that extend
/// past the frame edges. They are clamped before use, see
/// [`DetectionBox::clamp_to`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DetectionBox {
    pub label: String,
    #[serde(default)]
    pub confidence: f32,
    #[serde(deserialize_with = "pixel_coordinate")]
    pub x1: i64,
    #[serde(deserialize_with = "pixel_coordinate")]
    pub y1: i64,
    #[serde(deserialize_with = "pixel_coordinate")]
    pub x2: i64,
    #[serde(deserialize_with = "pixel_coordinate")]
    pub y2: i64,
}

impl DetectionBox {
    pub fn new(label: impl Into<String>, confidence: f32, x1: i64, y1: i64, x2: i64, y2: i64) -> Self {
        Self {
            label: label.into(),
            confidence,
            x1,
            y1,
            x2,
            y2,
        }
    }
}

/// Detectors commonly emit float coordinates; they are truncated toward
/// zero like an integer cast.
fn pixel_coordinate<'de, D>(deserializer: D) -> Result<i64, D::Error>
where
    D: Deserializer<'de>,
{
    let value = f64::deserialize(deserializer)?;
    if !value.is_finite() {
        return Err(serde::de::Error::custom("coordinate is not a finite number"));
    }
    Ok(value.trunc() as i64)
}

/// Failure of a single frame's detection call.
#[derive(Error, Debug)]
pub enum DetectionError {
    #[error("failed to start detector '{0}': {1}")]
    Spawn(String, #[source] io::Error),

    #[error("detector I/O failed: {0}")]
    Io(#[from] io::Error),

    #[error("detector did not answer within {0:?}")]
    Timeout(Duration),

    #[error("detector process exited: {0}")]
    Exited(String),

    #[error("malformed detector reply: {0}")]
    Protocol(String),

    #[error("invalid detection data: {0}")]
    Json(#[from] serde_json::Error),

    #[error("{0}")]
    Model(String),
}

/// Finds classified regions in a frame.
///
/// Called exactly once per frame, in frame order. Implementations may keep
/// state between calls (a model session, a worker process), hence
/// `&mut self`.
pub trait RegionDetector {
    fn detect(&mut self, frame: &Frame) -> Result<Vec<DetectionBox>, DetectionError>;
}

impl<F> RegionDetector for F
where
    F: FnMut(&Frame) -> Result<Vec<DetectionBox>, DetectionError>,
{
    fn detect(&mut self, frame: &Frame) -> Result<Vec<DetectionBox>, DetectionError> {
        self(frame)
    }
}
