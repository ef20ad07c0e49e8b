// ============================================================================
// redacto-core/src/error.rs
// ============================================================================
//
// ERROR HANDLING: Custom Error Types for Redacto Core
//
// This module defines the error types used throughout the redacto-core
// library. It uses thiserror for deriving error implementations and provides
// helper functions for creating command-related errors.
//
// KEY COMPONENTS:
// - CoreError: Main error enum with the fatal pipeline failures
// - CoreResult: Type alias for Result with CoreError
// - Helper functions for creating ffmpeg/ffprobe command errors
//
// Non-fatal conditions (scratch file deletion failures) are not errors; see
// `scratch::CleanupWarning`.

use crate::detection::DetectionError;

use std::io;
use std::path::{Path, PathBuf};
use std::process::ExitStatus;
use thiserror::Error;

/// Fatal failures of a redaction run.
#[derive(Error, Debug)]
pub enum CoreError {
    /// The input video is missing, unreadable, empty or not a decodable
    /// container. Raised before any frame is processed.
    #[error("Could not open input video '{path}': {reason}")]
    Open { path: PathBuf, reason: String },

    /// The output video could not be created.
    #[error("Could not create output video '{path}': {reason}")]
    Create { path: PathBuf, reason: String },

    /// A frame did not match the geometry announced when the sink was opened,
    /// or the sink could not accept it.
    #[error("Could not write frame {frame_index}: {reason}")]
    Write { frame_index: u64, reason: String },

    /// The encoder failed while finalizing the output container.
    #[error("Encoding failed for '{path}': {reason}")]
    Encode { path: PathBuf, reason: String },

    #[error("Detection failed on frame {frame_index}: {source}")]
    Detection {
        frame_index: u64,
        #[source]
        source: DetectionError,
    },

    #[error("Redaction run was cancelled after {frames_processed} frame(s)")]
    Cancelled { frames_processed: u64 },

    #[error("Invalid configuration: {0}")]
    Config(String),

    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    #[error("Failed to execute {0}: {1}")]
    CommandStart(String, io::Error),

    #[error("Failed to wait for {0}: {1}")]
    CommandWait(String, io::Error),

    #[error("Command {cmd} failed with status {status}. Stderr: {stderr}")]
    CommandFailed {
        cmd: String,
        status: ExitStatus,
        stderr: String,
    },

    #[error("ffprobe output parsing error: {0}")]
    FfprobeParse(String),

    #[error("Path error: {0}")]
    PathError(String),

    #[error("Operation failed: {0}")]
    OperationFailed(String),

    /// Another error, prefixed with what was being attempted.
    #[error("{context}: {source}")]
    Context {
        context: String,
        #[source]
        source: Box<CoreError>,
    },
}

/// Result type for redacto-core operations.
pub type CoreResult<T> = Result<T, CoreError>;

impl CoreError {
    /// Whether this error was raised before any frame could be processed.
    #[must_use]
    pub fn is_open_error(&self) -> bool {
        match self {
            CoreError::Open { .. } => true,
            CoreError::Context { source, .. } => source.is_open_error(),
            _ => false,
        }
    }

    /// Wraps this error with a description of the failed step.
    #[must_use]
    pub fn context(self, context: impl Into<String>) -> Self {
        CoreError::Context {
            context: context.into(),
            source: Box::new(self),
        }
    }
}

/// Builds an [`CoreError::Open`] for `path`.
pub fn open_error(path: &Path, reason: impl Into<String>) -> CoreError {
    CoreError::Open {
        path: path.to_path_buf(),
        reason: reason.into(),
    }
}

/// Builds a [`CoreError::Create`] for `path`.
pub fn create_error(path: &Path, reason: impl Into<String>) -> CoreError {
    CoreError::Create {
        path: path.to_path_buf(),
        reason: reason.into(),
    }
}

pub fn command_start_error(cmd: impl Into<String>, err: io::Error) -> CoreError {
    CoreError::CommandStart(cmd.into(), err)
}

pub fn command_wait_error(cmd: impl Into<String>, err: io::Error) -> CoreError {
    CoreError::CommandWait(cmd.into(), err)
}

pub fn command_failed_error(
    cmd: impl Into<String>,
    status: ExitStatus,
    stderr: impl Into<String>,
) -> CoreError {
    CoreError::CommandFailed {
        cmd: cmd.into(),
        status,
        stderr: stderr.into(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_open_error_message_names_path() {
        let err = open_error(Path::new("/tmp/missing.mp4"), "file does not exist");
        assert!(err.is_open_error());
        assert_eq!(
            err.to_string(),
            "Could not open input video '/tmp/missing.mp4': file does not exist"
        );
    }

    #[test]
    fn test_context_keeps_open_classification() {
        let err = open_error(Path::new("/tmp/a.mkv"), "file is empty").context("Failed to probe /tmp/a.mkv");
        assert!(err.is_open_error());
        assert_eq!(
            err.to_string(),
            "Failed to probe /tmp/a.mkv: Could not open input video '/tmp/a.mkv': file is empty"
        );
        assert!(std::error::Error::source(&err).is_some());
    }

    #[test]
    fn test_detection_error_keeps_source() {
        let err = CoreError::Detection {
            frame_index: 7,
            source: DetectionError::Protocol("truncated reply".to_string()),
        };
        assert!(!err.is_open_error());
        assert!(err.to_string().contains("frame 7"));
        assert!(std::error::Error::source(&err).is_some());
    }
}
