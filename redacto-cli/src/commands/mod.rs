//! Command implementations for the CLI.
//!
//! Each submodule contains the implementation of a specific command.

/// Module containing the implementation of the `redact` command.
/// This command blurs detected people in a video and writes a new video.
pub mod redact;

/// Module containing the implementation of the `probe` command.
pub mod probe;
