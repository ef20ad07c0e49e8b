// redacto-cli/src/error.rs
//
// Every failure reaching `main` is a CoreError. Commands only add a line of
// context in front of the core message, e.g.
//
//   Failed to load detections from d.json: I/O error: No such file or directory

use redacto_core::{CoreError, CoreResult};

use std::fmt::Display;

pub type CliResult<T> = CoreResult<T>;

/// Adds the step that failed to a `Result` or a missing `Option` value.
pub trait CliErrorContext<T> {
    fn cli_context(self, context: impl Display) -> CliResult<T>;

    /// Like [`CliErrorContext::cli_context`], building the message only on
    /// failure.
    fn cli_with_context<C: Display>(self, f: impl FnOnce() -> C) -> CliResult<T>;
}

impl<T, E: Into<CoreError>> CliErrorContext<T> for Result<T, E> {
    fn cli_context(self, context: impl Display) -> CliResult<T> {
        self.map_err(|e| e.into().context(context.to_string()))
    }

    fn cli_with_context<C: Display>(self, f: impl FnOnce() -> C) -> CliResult<T> {
        self.map_err(|e| e.into().context(f().to_string()))
    }
}

impl<T> CliErrorContext<T> for Option<T> {
    fn cli_context(self, context: impl Display) -> CliResult<T> {
        self.ok_or_else(|| CoreError::OperationFailed(context.to_string()))
    }

    fn cli_with_context<C: Display>(self, f: impl FnOnce() -> C) -> CliResult<T> {
        self.ok_or_else(|| CoreError::OperationFailed(f().to_string()))
    }
}
