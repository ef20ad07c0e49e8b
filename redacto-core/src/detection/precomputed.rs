//! Detector answering from detections computed ahead of time.
//!
//! The file maps zero-based frame indices to box lists:
//!
//! ```json
//! {"frames": {"0": [], "3": [{"label": "person", "confidence": 0.9, "x1": 10, "y1": 10, "x2": 30, "y2": 30}]}}
//! ```
//!
//! Frames without an entry have no detections.

use super::{DetectionBox, DetectionError, RegionDetector};
use crate::error::{CoreError, CoreResult};
use crate::frame::Frame;

use serde::Deserialize;
use std::collections::HashMap;
use std::fs;
use std::path::Path;

#[derive(Deserialize)]
struct DetectionFile {
    frames: HashMap<String, Vec<DetectionBox>>,
}

#[derive(Debug, Clone, Default)]
pub struct PrecomputedDetector {
    frames: HashMap<u64, Vec<DetectionBox>>,
}

impl PrecomputedDetector {
    #[must_use]
    pub fn new(frames: HashMap<u64, Vec<DetectionBox>>) -> Self {
        Self { frames }
    }

    /// Loads a detections file.
    pub fn from_path(path: &Path) -> CoreResult<Self> {
        let json = fs::read_to_string(path)?;
        Self::from_json(&json).map_err(|e| match e {
            CoreError::Config(reason) => {
                CoreError::Config(format!("detections file {}: {}", path.display(), reason))
            }
            other => other,
        })
    }

    pub fn from_json(json: &str) -> CoreResult<Self> {
        let file: DetectionFile =
            serde_json::from_str(json).map_err(|e| CoreError::Config(e.to_string()))?;

        let mut frames = HashMap::with_capacity(file.frames.len());
        for (key, boxes) in file.frames {
            let index = key
                .trim()
                .parse::<u64>()
                .map_err(|_| CoreError::Config(format!("'{key}' is not a frame index")))?;
            frames.insert(index, boxes);
        }
        log::debug!("Loaded precomputed detections for {} frame(s)", frames.len());
        Ok(Self { frames })
    }

    /// Number of frames with an entry.
    #[must_use]
    pub fn len(&self) -> usize {
        self.frames.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }
}

impl RegionDetector for PrecomputedDetector {
    fn detect(&mut self, frame: &Frame) -> Result<Vec<DetectionBox>, DetectionError> {
        Ok(self.frames.get(&frame.index).cloned().unwrap_or_default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_json() {
        let json = r#"{"frames": {"2": [{"label": "person", "confidence": 0.5, "x1": 10, "y1": 10, "x2": 30, "y2": 30}], "4": []}}"#;
        let mut detector = PrecomputedDetector::from_json(json).unwrap();
        assert_eq!(detector.len(), 2);

        let boxes = detector.detect(&Frame::filled(2, 64, 48, [0, 0, 0])).unwrap();
        assert_eq!(boxes, vec![DetectionBox::new("person", 0.5, 10, 10, 30, 30)]);
        assert!(detector.detect(&Frame::filled(0, 64, 48, [0, 0, 0])).unwrap().is_empty());
        assert!(detector.detect(&Frame::filled(4, 64, 48, [0, 0, 0])).unwrap().is_empty());
    }

    #[test]
    fn test_bad_frame_key() {
        let err = PrecomputedDetector::from_json(r#"{"frames": {"first": []}}"#).unwrap_err();
        assert!(matches!(err, CoreError::Config(ref reason) if reason.contains("first")));
    }

    #[test]
    fn test_missing_frames_key() {
        assert!(PrecomputedDetector::from_json(r#"{"boxes": []}"#).is_err());
    }
}
