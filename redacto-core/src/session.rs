// ============================================================================
// redacto-core/src/session.rs
// ============================================================================
//
// SESSION: Upload, Process, Deliver, Clean Up
//
// The host-facing flow around one pipeline run. An upload is staged into a
// scratch directory, redacted into a scratch output, handed to the host's
// delivery callback (a download, a copy to the requested location) and the
// scratch files are deleted. Failed deletions are attached to the report as
// warnings and never fail the session.

use crate::config::CoreConfig;
use crate::error::{CoreError, CoreResult, open_error};
use crate::media::MediaBackend;
use crate::pipeline::{RedactionPipeline, RedactionReport};
use crate::scratch::{CleanupWarning, ScratchFiles};

use std::fs;
use std::io::Read;
use std::path::{Path, PathBuf};

/// Where scratch files go and whether they survive the session.
#[derive(Debug, Clone, Default)]
pub struct ScratchOptions {
    pub temp_dir: Option<PathBuf>,
    pub keep: bool,
}

impl From<&CoreConfig> for ScratchOptions {
    fn from(config: &CoreConfig) -> Self {
        Self {
            temp_dir: config.temp_dir.clone(),
            keep: config.keep_temp,
        }
    }
}

/// Redacts an uploaded video.
///
/// `deliver` receives the finished scratch output and returns where the
/// video ended up; that location becomes the report's `output`. Scratch
/// files are removed afterwards on success and on failure alike.
pub fn redact_upload<B, R, F>(
    pipeline: &mut RedactionPipeline<'_>,
    backend: &B,
    options: &ScratchOptions,
    upload: &mut R,
    extension: &str,
    deliver: F,
) -> CoreResult<RedactionReport>
where
    B: MediaBackend,
    R: Read + ?Sized,
    F: FnOnce(&Path) -> CoreResult<PathBuf>,
{
    let scratch = ScratchFiles::stage(options.temp_dir.as_deref(), upload, extension, options.keep)?;
    log::debug!("Scratch directory: {}", scratch.dir().display());

    let result = pipeline
        .run(backend, scratch.input_path(), scratch.output_path())
        .and_then(|report| {
            let delivered = deliver(scratch.output_path())?;
            Ok(RedactionReport {
                output: delivered,
                ..report
            })
        });

    let warnings = scratch.cleanup();
    report_warnings(pipeline, &warnings);

    result.map(|mut report| {
        report.cleanup_warnings = warnings;
        report
    })
}

/// Redacts the video at `input` into `output` through a scratch session.
pub fn redact_file<B: MediaBackend>(
    pipeline: &mut RedactionPipeline<'_>,
    backend: &B,
    options: &ScratchOptions,
    input: &Path,
    output: &Path,
) -> CoreResult<RedactionReport> {
    let metadata = fs::metadata(input).map_err(|e| open_error(input, e.to_string()))?;
    if !metadata.is_file() {
        return Err(open_error(input, "not a regular file"));
    }
    let mut upload = fs::File::open(input).map_err(|e| open_error(input, e.to_string()))?;
    let extension = input
        .extension()
        .and_then(|ext| ext.to_str())
        .unwrap_or("mp4")
        .to_string();

    let mut report = redact_upload(
        pipeline,
        backend,
        options,
        &mut upload,
        &extension,
        |scratch_output| deliver_copy(scratch_output, output),
    )?;
    report.input = input.to_path_buf();
    Ok(report)
}

/// Copies the finished video to `destination`.
pub fn deliver_copy(scratch_output: &Path, destination: &Path) -> CoreResult<PathBuf> {
    fs::copy(scratch_output, destination).map_err(|e| {
        CoreError::OperationFailed(format!(
            "could not copy redacted video to {}: {}",
            destination.display(),
            e
        ))
    })?;
    log::debug!("Delivered {}", destination.display());
    Ok(destination.to_path_buf())
}

fn report_warnings(pipeline: &RedactionPipeline<'_>, warnings: &[CleanupWarning]) {
    for warning in warnings {
        pipeline.reporter().warning(&warning.to_string());
    }
}
