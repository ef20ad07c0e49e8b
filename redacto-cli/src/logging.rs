// ============================================================================
// redacto-cli/src/logging.rs
// ============================================================================
//
// LOGGING SETUP: fern Dispatch for Console and Run Log
//
// Console lines go to stderr through the terminal module so they do not
// tear the progress bar, with the level coloured unless NO_COLOR is set.
// When a log directory is given, a second uncoloured dispatch writes every
// record to `redacto_run_YYYYMMDD_HHMMSS.log` in it.
//
// USAGE:
// - default: info and above
// - -v/--verbose: debug and above
// - ffmpeg_sidecar is capped at warn either way

use crate::error::{CliErrorContext, CliResult};
use crate::terminal;

use log::{Level, LevelFilter};
use owo_colors::OwoColorize;
use std::fs;
use std::path::{Path, PathBuf};

/// Returns the current local timestamp formatted as "YYYYMMDD_HHMMSS".
pub fn get_timestamp() -> String {
    chrono::Local::now().format("%Y%m%d_%H%M%S").to_string()
}

/// Name of the run log file for a given timestamp.
pub fn run_log_name(timestamp: &str) -> String {
    format!("redacto_run_{timestamp}.log")
}

fn level_label(level: Level, color: bool) -> String {
    let label = format!("{:<5}", level);
    if !color {
        return label;
    }
    match level {
        Level::Error => label.bright_red().bold().to_string(),
        Level::Warn => label.yellow().to_string(),
        Level::Info => label.green().to_string(),
        Level::Debug => label.blue().to_string(),
        Level::Trace => label.magenta().to_string(),
    }
}

/// Installs the global logger. Returns the run log path when `log_dir` is
/// set.
pub fn init_logging(verbose: bool, log_dir: Option<&Path>) -> CliResult<Option<PathBuf>> {
    let level = if verbose {
        LevelFilter::Debug
    } else {
        LevelFilter::Info
    };
    let color = terminal::should_use_color();

    let console = fern::Dispatch::new()
        .format(move |out, message, record| {
            out.finish(format_args!(
                "{} {} {}",
                chrono::Local::now().format("%H:%M:%S"),
                level_label(record.level(), color),
                message
            ))
        })
        .chain(fern::Output::call(|record| {
            terminal::write_log_line(&record.args().to_string());
        }));

    let mut dispatch = fern::Dispatch::new()
        .level(level)
        .level_for("ffmpeg_sidecar", LevelFilter::Warn)
        .chain(console);

    let mut log_path = None;
    if let Some(dir) = log_dir {
        fs::create_dir_all(dir)
            .cli_with_context(|| format!("Failed to create log directory {}", dir.display()))?;
        let path = dir.join(run_log_name(&get_timestamp()));
        let file = fern::log_file(&path)
            .cli_with_context(|| format!("Failed to create log file {}", path.display()))?;
        dispatch = dispatch.chain(
            fern::Dispatch::new()
                .format(|out, message, record| {
                    out.finish(format_args!(
                        "{} {:<5} [{}] {}",
                        chrono::Local::now().format("%Y-%m-%d %H:%M:%S"),
                        record.level(),
                        record.target(),
                        message
                    ))
                })
                .chain(file),
        );
        log_path = Some(path);
    }

    dispatch
        .apply()
        .map_err(|e| redacto_core::CoreError::OperationFailed(format!("Failed to initialise logging: {e}")))?;
    Ok(log_path)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_run_log_name() {
        assert_eq!(run_log_name("20240601_123045"), "redacto_run_20240601_123045.log");
        assert_eq!(get_timestamp().len(), 15);
    }

    #[test]
    fn test_plain_level_label() {
        assert_eq!(level_label(Level::Info, false), "INFO ");
        assert_eq!(level_label(Level::Error, false), "ERROR");
        assert!(level_label(Level::Warn, true).contains("WARN"));
    }
}
