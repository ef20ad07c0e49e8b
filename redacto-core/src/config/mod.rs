//! Configuration structures and constants for the redacto-core library.
//!
//! This module provides the configuration of a redaction run: which detector
//! labels are redacted, how strongly, how the output is encoded and how
//! detection failures and scratch files are handled.

mod builder;

use crate::detection::TargetClasses;
use crate::error::{CoreError, CoreResult};
use crate::redaction::{DEFAULT_KERNEL_SIZE, DEFAULT_SIGMA, MAX_KERNEL_SIZE};

use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

pub use builder::CoreConfigBuilder;

/// Default minimum detector confidence. Every target box is redacted.
pub const DEFAULT_MIN_CONFIDENCE: f32 = 0.0;

/// Video codec of the redacted output.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OutputCodec {
    /// MPEG-4 Part 2 in an MP4 container, tag `mp4v`.
    #[default]
    Mp4v,
    /// H.264 via libx264, tag `avc1`, playable in browsers.
    H264,
}

impl OutputCodec {
    /// ffmpeg encoder arguments for this codec.
    #[must_use]
    pub fn ffmpeg_args(&self) -> &'static [&'static str] {
        match self {
            OutputCodec::Mp4v => &["-c:v", "mpeg4", "-tag:v", "mp4v", "-q:v", "2"],
            OutputCodec::H264 => &[
                "-c:v",
                "libx264",
                "-tag:v",
                "avc1",
                "-pix_fmt",
                "yuv420p",
                "-movflags",
                "+faststart",
            ],
        }
    }
}

impl OutputCodec {
    /// Largest time base denominator the encoder accepts, when it has one.
    #[must_use]
    pub fn max_time_base_den(&self) -> Option<u32> {
        match self {
            OutputCodec::Mp4v => Some(65535),
            OutputCodec::H264 => None,
        }
    }
}

impl fmt::Display for OutputCodec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OutputCodec::Mp4v => write!(f, "mp4v"),
            OutputCodec::H264 => write!(f, "h264"),
        }
    }
}

impl FromStr for OutputCodec {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "mp4v" | "mpeg4" => Ok(OutputCodec::Mp4v),
            "h264" | "avc1" | "x264" => Ok(OutputCodec::H264),
            other => Err(CoreError::Config(format!("unknown output codec '{other}'"))),
        }
    }
}

/// What the pipeline does when the detector fails on a frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DetectionFailurePolicy {
    /// Stop the run with a detection error.
    #[default]
    Abort,
    /// Log a warning and write the frame without redaction.
    PassThrough,
}

impl fmt::Display for DetectionFailurePolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DetectionFailurePolicy::Abort => write!(f, "abort"),
            DetectionFailurePolicy::PassThrough => write!(f, "pass-through"),
        }
    }
}

impl FromStr for DetectionFailurePolicy {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "abort" => Ok(DetectionFailurePolicy::Abort),
            "pass-through" | "passthrough" | "skip" => Ok(DetectionFailurePolicy::PassThrough),
            other => Err(CoreError::Config(format!(
                "unknown detection failure policy '{other}'"
            ))),
        }
    }
}

/// Main configuration structure for the redacto-core library.
///
/// Created by the consumer (e.g. redacto-cli), usually through
/// [`CoreConfigBuilder`], and handed to the pipeline and session functions.
///
/// # Examples
///
/// ```rust
/// use redacto_core::config::{CoreConfigBuilder, OutputCodec};
///
/// let config = CoreConfigBuilder::new()
///     .target_classes(["person", "face"])
///     .min_confidence(0.4)
///     .codec(OutputCodec::H264)
///     .build();
/// assert!(config.validate().is_ok());
/// ```
#[derive(Debug, Clone)]
pub struct CoreConfig {
    /// Detector labels whose boxes are redacted
    pub target_classes: TargetClasses,

    /// Boxes below this confidence are ignored
    pub min_confidence: f32,

    /// Blur kernel edge length in pixels (even values are bumped to odd)
    pub kernel_size: u32,

    /// Gaussian standard deviation of the blur
    pub sigma: f64,

    /// Output video codec
    pub codec: OutputCodec,

    /// Behaviour when the detector fails on a frame
    pub detection_failure_policy: DetectionFailurePolicy,

    /// Per-frame deadline for process-backed detectors
    pub detection_timeout: Option<Duration>,

    /// Base directory for scratch files (defaults to the system temp dir)
    pub temp_dir: Option<PathBuf>,

    /// Keep scratch files after the run
    pub keep_temp: bool,
}

impl Default for CoreConfig {
    fn default() -> Self {
        Self {
            target_classes: TargetClasses::default(),
            min_confidence: DEFAULT_MIN_CONFIDENCE,
            kernel_size: DEFAULT_KERNEL_SIZE,
            sigma: DEFAULT_SIGMA,
            codec: OutputCodec::default(),
            detection_failure_policy: DetectionFailurePolicy::default(),
            detection_timeout: None,
            temp_dir: None,
            keep_temp: false,
        }
    }
}

impl CoreConfig {
    /// Checks the values a run cannot proceed with.
    pub fn validate(&self) -> CoreResult<()> {
        if self.target_classes.is_empty() {
            return Err(CoreError::Config(
                "at least one target class is required".to_string(),
            ));
        }
        if !(0.0..=1.0).contains(&self.min_confidence) {
            return Err(CoreError::Config(format!(
                "minimum confidence must be within [0, 1], got {}",
                self.min_confidence
            )));
        }
        if self.kernel_size == 0 || self.kernel_size > MAX_KERNEL_SIZE {
            return Err(CoreError::Config(format!(
                "blur kernel size must be between 1 and {MAX_KERNEL_SIZE}, got {}",
                self.kernel_size
            )));
        }
        if !(self.sigma.is_finite() && self.sigma > 0.0) {
            return Err(CoreError::Config(format!(
                "blur sigma must be positive, got {}",
                self.sigma
            )));
        }
        if self.detection_timeout == Some(Duration::ZERO) {
            return Err(CoreError::Config(
                "detection timeout must be greater than zero".to_string(),
            ));
        }
        Ok(())
    }
}
