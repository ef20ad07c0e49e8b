// ============================================================================
// redacto-cli/src/commands/redact.rs
// ============================================================================
//
// REDACT COMMAND: Stage, Redact, Deliver
//
// Maps the command-line arguments onto a CoreConfig, picks the detector,
// and runs one upload session: the input file is staged into a scratch
// directory, redacted into a scratch output, copied to the requested output
// path and the scratch files are deleted.

use crate::cli::RedactArgs;
use crate::error::{CliErrorContext, CliResult};
use crate::terminal::{self, TerminalProgressReporter};

use redacto_core::detection::{CommandDetector, PrecomputedDetector, RegionDetector};
use redacto_core::pipeline::{RedactionPipeline, RedactionReport};
use redacto_core::{
    CoreConfig, CoreConfigBuilder, CoreError, FfmpegBackend, ScratchOptions, format_bytes,
    is_supported_video, redact_file, utils,
};

use log::info;
use std::fs;
use std::sync::Arc;
use std::time::Duration;

/// Builds the core configuration from the command-line arguments.
pub fn build_config(args: &RedactArgs) -> CliResult<CoreConfig> {
    let mut builder = CoreConfigBuilder::new()
        .codec(args.codec)
        .detection_failure_policy(args.detection_failure_policy)
        .keep_temp(args.keep_temp);

    if !args.target_classes.is_empty() {
        builder = builder.target_classes(&args.target_classes);
    }
    if let Some(confidence) = args.min_confidence {
        builder = builder.min_confidence(confidence);
    }
    if let Some(size) = args.kernel_size {
        builder = builder.kernel_size(size);
    }
    if let Some(sigma) = args.sigma {
        builder = builder.sigma(sigma);
    }
    if let Some(ms) = args.detection_timeout_ms {
        builder = builder.detection_timeout(Duration::from_millis(ms));
    }
    if let Some(dir) = &args.temp_dir {
        builder = builder.temp_dir(dir.clone());
    }

    let config = builder.build();
    config.validate()?;
    Ok(config)
}

/// Chooses the detector: a detections file when given, otherwise the
/// detector process command.
pub fn build_detector(
    args: &RedactArgs,
    config: &CoreConfig,
) -> CliResult<Box<dyn RegionDetector>> {
    if let Some(path) = &args.detections {
        let detector = PrecomputedDetector::from_path(path)
            .cli_with_context(|| format!("Failed to load detections from {}", path.display()))?;
        info!(
            "Using precomputed detections for {} frame(s) from {}",
            detector.len(),
            path.display()
        );
        return Ok(Box::new(detector));
    }

    let command = args
        .detector_cmd
        .as_deref()
        .filter(|cmd| !cmd.trim().is_empty())
        .cli_context("No detector configured: pass --detector-cmd, set REDACTO_DETECTOR or pass --detections")?;
    let detector = CommandDetector::from_command_line(command)
        .map_err(|e| CoreError::Config(e.to_string()))?
        .with_timeout(config.detection_timeout);
    info!("Using detector process: {}", detector.command_line());
    Ok(Box::new(detector))
}

fn check_paths(args: &RedactArgs) -> CliResult<()> {
    let input = &args.input_path;
    if !input.is_file() {
        return Err(CoreError::PathError(format!(
            "Input file '{}' does not exist or is not a file",
            input.display()
        )));
    }
    if !is_supported_video(input) {
        return Err(CoreError::PathError(format!(
            "Input file '{}' is not a supported video (expected one of: {})",
            input.display(),
            utils::SUPPORTED_EXTENSIONS.join(", ")
        )));
    }
    if let (Ok(a), Ok(b)) = (input.canonicalize(), args.output_path.canonicalize()) {
        if a == b {
            return Err(CoreError::PathError(
                "Output path must differ from the input path".to_string(),
            ));
        }
    }
    if let Some(parent) = args.output_path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)
            .cli_with_context(|| format!("Failed to create output directory {}", parent.display()))?;
    }
    Ok(())
}

/// Runs the `redact` command.
pub fn run_redact(args: RedactArgs) -> CliResult<RedactionReport> {
    check_paths(&args)?;
    let config = build_config(&args)?;
    let detector = build_detector(&args, &config)?;

    terminal::print_section("Redaction");
    terminal::print_status("Input", args.input_path.display());
    if let Some(size) = utils::file_size(&args.input_path) {
        terminal::print_status("Size", format_bytes(size));
    }
    terminal::print_status("Output", args.output_path.display());
    terminal::print_status(
        "Targets",
        config.target_classes.iter().collect::<Vec<_>>().join(", "),
    );
    terminal::print_status("Codec", config.codec);
    terminal::print_status("On failure", config.detection_failure_policy);

    let reporter = Arc::new(TerminalProgressReporter::new());
    let mut pipeline =
        RedactionPipeline::with_boxed_detector(&config, detector)?.with_reporter(reporter.clone());

    let result = redact_file(
        &mut pipeline,
        &FfmpegBackend::new(config.codec),
        &ScratchOptions::from(&config),
        &args.input_path,
        &args.output_path,
    );

    match result {
        Ok(report) => {
            reporter.finish();
            terminal::print_report(&report);
            Ok(report)
        }
        Err(e) => {
            reporter.abandon();
            Err(e)
        }
    }
}
