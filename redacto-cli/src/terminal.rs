//! Terminal output for the CLI: the redaction progress bar, log lines that
//! do not tear it, and the run summary.

use indicatif::{MultiProgress, ProgressBar, ProgressStyle};
use owo_colors::OwoColorize;
use redacto_core::{ProgressReporter, RedactionReport, format_duration};
use std::sync::{LazyLock, Mutex};
use std::time::Duration;

/// Resolution of the bar; fractions are mapped onto this many steps.
const BAR_STEPS: u64 = 1000;

static BARS: LazyLock<MultiProgress> = LazyLock::new(MultiProgress::new);

/// Check if color should be used (respects NO_COLOR environment variable)
pub fn should_use_color() -> bool {
    std::env::var_os("NO_COLOR").is_none()
}

/// Writes a log line to stderr, hiding any progress bar while it prints.
pub fn write_log_line(line: &str) {
    BARS.suspend(|| eprintln!("{line}"));
}

/// Print a section header
pub fn print_section(title: &str) {
    if should_use_color() {
        println!("\n{}", title.to_uppercase().bold().cyan());
    } else {
        println!("\n{}", title.to_uppercase());
    }
}

/// Print a label/value line under a section
pub fn print_status(label: &str, value: impl std::fmt::Display) {
    let label = format!("{label}:");
    if should_use_color() {
        println!("  {:<14} {}", label.bold(), value);
    } else {
        println!("  {:<14} {}", label, value);
    }
}

/// Prints the outcome of a successful run, including cleanup warnings.
pub fn print_report(report: &RedactionReport) {
    print_section("Results");
    print_status("Input", report.input.display());
    print_status("Output", report.output.display());
    print_status(
        "Geometry",
        format!(
            "{}x{} @ {} fps",
            report.geometry.width, report.geometry.height, report.geometry.frame_rate
        ),
    );
    print_status("Frames", report.frames_processed);
    print_status(
        "Redacted",
        format!(
            "{} region(s) in {} frame(s)",
            report.regions_redacted, report.frames_redacted
        ),
    );
    if report.detection_failures > 0 {
        print_status("Undetected", format!("{} frame(s) written unredacted", report.detection_failures));
    }
    print_status("Started", report.started_at.format("%Y-%m-%d %H:%M:%S"));
    print_status("Time", format_duration(report.elapsed.as_secs_f64()));

    for warning in &report.cleanup_warnings {
        if should_use_color() {
            println!("  {}", format!("WARN: {warning}").yellow().bold());
        } else {
            println!("  WARN: {warning}");
        }
    }
}

/// Progress reporter drawing an indicatif bar on stderr.
///
/// The bar is created on the first update and finished by
/// [`TerminalProgressReporter::finish`] or when the reporter is dropped.
#[derive(Default)]
pub struct TerminalProgressReporter {
    bar: Mutex<Option<ProgressBar>>,
}

impl TerminalProgressReporter {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn create_bar() -> ProgressBar {
        let bar = BARS.add(ProgressBar::new(BAR_STEPS));
        if let Ok(style) =
            ProgressStyle::default_bar().template("Redacting [{bar:40}] {percent:>3}% | {msg}")
        {
            bar.set_style(style.progress_chars("=> "));
        }
        bar.enable_steady_tick(Duration::from_millis(120));
        bar
    }

    /// Finishes the bar, keeping its last state on screen.
    pub fn finish(&self) {
        if let Some(bar) = self.lock().take() {
            bar.finish();
        }
    }

    /// Removes the bar without leaving a trace, for failed runs.
    pub fn abandon(&self) {
        if let Some(bar) = self.lock().take() {
            bar.finish_and_clear();
        }
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Option<ProgressBar>> {
        match self.bar.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }
}

impl ProgressReporter for TerminalProgressReporter {
    fn progress(&self, fraction: f64, message: &str) {
        let mut bar = self.lock();
        let bar = bar.get_or_insert_with(Self::create_bar);
        bar.set_position((fraction.clamp(0.0, 1.0) * BAR_STEPS as f64).round() as u64);
        bar.set_message(message.to_string());
    }
}

impl Drop for TerminalProgressReporter {
    fn drop(&mut self) {
        self.finish();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bar_created_lazily_and_finished() {
        let reporter = TerminalProgressReporter::new();
        assert!(reporter.lock().is_none());

        reporter.progress(0.25, "Processing frame 1 of 4");
        assert_eq!(reporter.lock().as_ref().map(ProgressBar::position), Some(250));

        reporter.progress(1.0, "Finished 4 frame(s)");
        assert_eq!(reporter.lock().as_ref().map(ProgressBar::position), Some(BAR_STEPS));

        reporter.finish();
        assert!(reporter.lock().is_none());
    }
}
