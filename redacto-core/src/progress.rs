// ============================================================================
// redacto-core/src/progress.rs
// ============================================================================
//
// PROGRESS REPORTING: Per-Frame Progress Notifications
//
// The pipeline notifies a reporter after every processed frame with the
// fraction of the declared total completed so far and a human readable
// status message. Front ends (terminal progress bar, web UI) implement the
// trait; the core ships a log-based reporter and a no-op reporter.
//
// KEY COMPONENTS:
// - ProgressReporter: Trait receiving (fraction, message) updates
// - LogProgressReporter: Logs at whole-percent steps
// - NullProgressReporter: Discards progress, keeps warnings in the log

use std::sync::Mutex;

/// Receives progress updates from a running pipeline.
///
/// `fraction` is in `[0, 1]` and never decreases within one run. The final
/// call of a successful run always carries `1.0`.
pub trait ProgressReporter: Send + Sync {
    fn progress(&self, fraction: f64, message: &str);

    /// Non-fatal conditions the front end may want to surface, such as a
    /// scratch file that could not be deleted.
    fn warning(&self, message: &str) {
        log::warn!("{}", message);
    }
}

/// Reporter that writes progress to the `log` facade, once per whole
/// percent.
#[derive(Debug, Default)]
pub struct LogProgressReporter {
    last_percent: Mutex<Option<u32>>,
}

impl LogProgressReporter {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

impl ProgressReporter for LogProgressReporter {
    fn progress(&self, fraction: f64, message: &str) {
        let percent = (fraction.clamp(0.0, 1.0) * 100.0).floor() as u32;
        let mut last = match self.last_percent.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        if *last == Some(percent) && percent != 100 {
            log::trace!("{}", message);
            return;
        }
        *last = Some(percent);
        log::info!("[{:>3}%] {}", percent, message);
    }
}

/// Reporter that ignores progress updates. Warnings still reach the log.
#[derive(Debug, Clone, Copy, Default)]
pub struct NullProgressReporter;

impl ProgressReporter for NullProgressReporter {
    fn progress(&self, _fraction: f64, _message: &str) {}
}
