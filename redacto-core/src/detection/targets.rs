//! Label filtering and clamping of detector output.
//!
//! The detector reports every class it knows about; only boxes whose label is
//! one of the configured target classes are redacted. Surviving boxes are
//! clamped to the frame so no later stage can index outside the pixel grid.

use super::DetectionBox;
use crate::redaction::RedactionRegion;

use std::collections::BTreeSet;

/// Label the pipeline redacts when nothing else is configured.
pub const DEFAULT_TARGET_CLASS: &str = "person";

/// Set of detector labels that should be redacted. Matching is
/// case-insensitive.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TargetClasses(BTreeSet<String>);

impl TargetClasses {
    pub fn new<I, S>(labels: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        Self(
            labels
                .into_iter()
                .map(|label| label.as_ref().trim().to_lowercase())
                .filter(|label| !label.is_empty())
                .collect(),
        )
    }

    #[must_use]
    pub fn contains(&self, label: &str) -> bool {
        self.0.contains(&label.trim().to_lowercase())
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.0.iter().map(String::as_str)
    }
}

impl Default for TargetClasses {
    fn default() -> Self {
        Self::new([DEFAULT_TARGET_CLASS])
    }
}

impl DetectionBox {
    /// Clamps the box to a `width` x `height` frame.
    ///
    /// Returns `None` when nothing of the box remains inside the frame, or
    /// when the box is empty or inverted (`x2 <= x1` or `y2 <= y1`).
    #[must_use]
    pub fn clamp_to(&self, width: u32, height: u32) -> Option<RedactionRegion> {
        let clamp = |value: i64, max: u32| value.clamp(0, i64::from(max)) as u32;

        let x1 = clamp(self.x1, width);
        let x2 = clamp(self.x2, width);
        let y1 = clamp(self.y1, height);
        let y2 = clamp(self.y2, height);

        if x2 <= x1 || y2 <= y1 {
            return None;
        }

        Some(RedactionRegion {
            x: x1,
            y: y1,
            width: x2 - x1,
            height: y2 - y1,
        })
    }
}

/// Keeps the boxes that should be redacted and converts them to in-frame
/// regions.
///
/// A box survives when its label is a target class, its confidence is at
/// least `min_confidence`, and it still covers at least one pixel after
/// clamping. Order is preserved and overlapping boxes are not merged.
pub fn select_regions(
    boxes: &[DetectionBox],
    targets: &TargetClasses,
    min_confidence: f32,
    width: u32,
    height: u32,
) -> Vec<RedactionRegion> {
    boxes
        .iter()
        .filter(|detection| targets.contains(&detection.label))
        .filter(|detection| detection.confidence >= min_confidence)
        .filter_map(|detection| {
            let region = detection.clamp_to(width, height);
            if region.is_none() {
                log::debug!(
                    "Discarding '{}' box ({}, {})-({}, {}) outside {}x{} frame",
                    detection.label,
                    detection.x1,
                    detection.y1,
                    detection.x2,
                    detection.y2,
                    width,
                    height
                );
            }
            region
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn person(x1: i64, y1: i64, x2: i64, y2: i64) -> DetectionBox {
        DetectionBox::new("person", 0.9, x1, y1, x2, y2)
    }

    #[test]
    fn test_default_targets_person_only() {
        let targets = TargetClasses::default();
        assert_eq!(targets.len(), 1);
        assert!(targets.contains("person"));
        assert!(targets.contains("Person"));
        assert!(targets.contains(" PERSON "));
        assert!(!targets.contains("car"));
    }

    #[test]
    fn test_custom_targets_skip_blank_labels() {
        let targets = TargetClasses::new(["Face", "", "  ", "license_plate"]);
        assert_eq!(targets.iter().collect::<Vec<_>>(), vec!["face", "license_plate"]);
        assert!(TargetClasses::new(Vec::<String>::new()).is_empty());
    }

    #[test]
    fn test_clamp_inside_frame() {
        let region = person(10, 10, 30, 30).clamp_to(64, 48).unwrap();
        assert_eq!(
            region,
            RedactionRegion {
                x: 10,
                y: 10,
                width: 20,
                height: 20
            }
        );
    }

    #[test]
    fn test_clamp_partially_outside() {
        let region = person(-5, 40, 70, 60).clamp_to(64, 48).unwrap();
        assert_eq!(
            region,
            RedactionRegion {
                x: 0,
                y: 40,
                width: 64,
                height: 8
            }
        );
    }

    #[test]
    fn test_clamp_discards_degenerate_boxes() {
        assert_eq!(person(70, 10, 90, 20).clamp_to(64, 48), None);
        assert_eq!(person(-20, 10, -1, 20).clamp_to(64, 48), None);
        assert_eq!(person(30, 10, 10, 20).clamp_to(64, 48), None);
        assert_eq!(person(10, 10, 10, 20).clamp_to(64, 48), None);
    }

    #[test]
    fn test_select_regions_filters_label_and_confidence() {
        let boxes = vec![
            person(0, 0, 4, 4),
            DetectionBox::new("car", 0.99, 0, 0, 8, 8),
            DetectionBox::new("PERSON", 0.2, 1, 1, 5, 5),
            person(100, 100, 120, 120),
        ];

        let all = select_regions(&boxes, &TargetClasses::default(), 0.0, 64, 48);
        assert_eq!(all.len(), 2);
        assert_eq!(all[1].x, 1);

        let confident = select_regions(&boxes, &TargetClasses::default(), 0.5, 64, 48);
        assert_eq!(confident.len(), 1);
        assert_eq!(confident[0].width, 4);
    }

    #[test]
    fn test_select_regions_keeps_overlaps() {
        let boxes = vec![person(10, 10, 30, 30), person(20, 20, 40, 40)];
        let regions = select_regions(&boxes, &TargetClasses::default(), 0.0, 64, 48);
        assert_eq!(regions.len(), 2);
    }
}
