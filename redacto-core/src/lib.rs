//! Core library for batch video redaction using ffmpeg and ffprobe.
//!
//! Every frame of an input video is decoded, handed to an object detector,
//! and the regions classified as a target class ("person" by default) are
//! blurred before the frame is re-encoded into a new video with the same
//! dimensions and frame rate.
//!
//! ## Usage Example
//!
//! ```rust,no_run
//! use redacto_core::config::CoreConfigBuilder;
//! use redacto_core::detection::CommandDetector;
//! use redacto_core::media::FfmpegBackend;
//! use redacto_core::pipeline::RedactionPipeline;
//! use std::path::Path;
//!
//! let config = CoreConfigBuilder::new().min_confidence(0.3).build();
//! let detector = CommandDetector::from_command_line("python3 serve_model.py").unwrap();
//! let mut pipeline = RedactionPipeline::new(&config, detector).unwrap();
//!
//! let report = pipeline
//!     .run(
//!         &FfmpegBackend::new(config.codec),
//!         Path::new("input.mp4"),
//!         Path::new("redacted.mp4"),
//!     )
//!     .unwrap();
//! println!("{} frame(s), {} region(s) blurred", report.frames_processed, report.regions_redacted);
//! ```

pub mod config;
pub mod detection;
pub mod error;
pub mod frame;
pub mod media;
pub mod mocks;
pub mod pipeline;
pub mod progress;
pub mod redaction;
pub mod scratch;
pub mod session;
pub mod utils;

// Re-exports for public API
pub use config::{CoreConfig, CoreConfigBuilder, DetectionFailurePolicy, OutputCodec};
pub use detection::{DetectionBox, DetectionError, RegionDetector, TargetClasses};
pub use error::{CoreError, CoreResult};
pub use frame::{Frame, FrameRate, VideoGeometry};
pub use media::{FfmpegBackend, FrameSink, FrameSource, MediaBackend};
pub use pipeline::{CancellationToken, PipelineStage, RedactionPipeline, RedactionReport};
pub use progress::{LogProgressReporter, NullProgressReporter, ProgressReporter};
pub use redaction::{GaussianRedactor, RedactionRegion, RegionRedactor};
pub use scratch::{CleanupWarning, ScratchFiles};
pub use session::{ScratchOptions, redact_file, redact_upload};
pub use utils::{format_bytes, format_duration, is_supported_video};
