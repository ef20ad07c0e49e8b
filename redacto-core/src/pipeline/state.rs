//! Run state of the pipeline: lifecycle stage and frame accounting.

use crate::frame::VideoGeometry;

use std::fmt;

/// Lifecycle of one pipeline run.
///
/// `Idle -> Opened -> Processing -> Finalizing -> Done`, with `Errored`
/// reachable from every stage after `Idle`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PipelineStage {
    Idle,
    Opened,
    Processing,
    Finalizing,
    Done,
    Errored,
}

impl fmt::Display for PipelineStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            PipelineStage::Idle => "idle",
            PipelineStage::Opened => "opened",
            PipelineStage::Processing => "processing",
            PipelineStage::Finalizing => "finalizing",
            PipelineStage::Done => "done",
            PipelineStage::Errored => "errored",
        };
        write!(f, "{name}")
    }
}

/// Frame counter and progress fraction of a run.
///
/// The fraction is `processed / declared`, capped at 1.0 and never allowed
/// to decrease. Without a declared total it stays at 0.0 until
/// [`PipelineState::finish`]. A declared total also bounds the run; an
/// estimated one only scales the fraction.
#[derive(Debug, Clone, PartialEq)]
pub struct PipelineState {
    frames_processed: u64,
    total_declared: Option<u64>,
    estimated: bool,
    fraction: f64,
}

impl PipelineState {
    /// A declared total of zero is treated as unknown.
    #[must_use]
    pub fn new(total_declared: Option<u64>) -> Self {
        Self {
            frames_processed: 0,
            total_declared: total_declared.filter(|&total| total > 0),
            estimated: false,
            fraction: 0.0,
        }
    }

    /// State for a run over `geometry`, honouring whether its frame count
    /// was estimated.
    #[must_use]
    pub fn for_geometry(geometry: &VideoGeometry) -> Self {
        Self {
            estimated: geometry.frame_count_estimated,
            ..Self::new(geometry.total_frames)
        }
    }

    #[must_use]
    pub fn frames_processed(&self) -> u64 {
        self.frames_processed
    }

    #[must_use]
    pub fn total_declared(&self) -> Option<u64> {
        self.total_declared
    }

    #[must_use]
    pub fn fraction(&self) -> f64 {
        self.fraction
    }

    /// Whether the declared number of frames has been processed. Never true
    /// for an estimated total.
    #[must_use]
    pub fn budget_exhausted(&self) -> bool {
        !self.estimated
            && self
                .total_declared
                .is_some_and(|total| self.frames_processed >= total)
    }

    /// Counts one processed frame and returns the new fraction.
    pub fn advance(&mut self) -> f64 {
        self.frames_processed += 1;
        if let Some(total) = self.total_declared {
            let fraction = (self.frames_processed as f64 / total as f64).min(1.0);
            self.fraction = self.fraction.max(fraction);
        }
        self.fraction
    }

    /// Marks the run complete. Always yields 1.0.
    pub fn finish(&mut self) -> f64 {
        self.fraction = 1.0;
        self.fraction
    }

    /// Status line for the most recently processed frame (1-based).
    #[must_use]
    pub fn message(&self) -> String {
        match self.total_declared {
            Some(total) if self.estimated => {
                format!("Processing frame {} of ~{}", self.frames_processed, total)
            }
            Some(total) => format!("Processing frame {} of {}", self.frames_processed, total),
            None => format!("Processing frame {}", self.frames_processed),
        }
    }
}
