// redacto-cli/src/lib.rs
//
// Library portion of the Redacto CLI application.
// Contains argument definitions and command logic.

pub mod cli;
pub mod commands;
pub mod error;
pub mod logging;
pub mod terminal;

// Re-export items needed by the binary or integration tests
pub use cli::{Cli, Commands, ProbeArgs, RedactArgs};
pub use commands::probe::run_probe;
pub use commands::redact::{build_config, build_detector, run_redact};
pub use error::{CliErrorContext, CliResult};
