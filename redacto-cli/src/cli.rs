// redacto-cli/src/cli.rs
//
// Defines the command-line argument structures using clap.

use clap::{Args, Parser, Subcommand};
use redacto_core::config::{DetectionFailurePolicy, OutputCodec};
use std::path::PathBuf;

// --- CLI Argument Definition ---

#[derive(Parser, Debug)]
#[command(
    author,
    version, // Reads from Cargo.toml via "cargo" feature in clap
    about = "Redacto: Video redaction tool",
    long_about = "Blurs every detected person in a video, frame by frame, using ffmpeg and an external object detector."
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Enable debug output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Optional: Directory for a per-run log file
    #[arg(long, global = true, value_name = "LOG_DIR")]
    pub log_dir: Option<PathBuf>,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Redacts a video file and writes the result to OUTPUT
    Redact(RedactArgs),
    /// Prints the geometry and declared frame count of a video file
    Probe(ProbeArgs),
}

#[derive(Args, Debug)]
pub struct RedactArgs {
    /// Input video (.mp4, .avi, .mov or .mkv)
    #[arg(short = 'i', long = "input", required = true, value_name = "INPUT")]
    pub input_path: PathBuf,

    /// Where the redacted video is written
    #[arg(short = 'o', long = "output", required = true, value_name = "OUTPUT")]
    pub output_path: PathBuf,

    // --- Detection ---
    /// Detector process command line, e.g. "python3 serve_model.py --weights yolov8n.pt".
    /// Can also be set via the REDACTO_DETECTOR environment variable.
    #[arg(long, value_name = "CMD", env = "REDACTO_DETECTOR")]
    pub detector_cmd: Option<String>,

    /// JSON file of precomputed detections keyed by frame index. Takes
    /// precedence over --detector-cmd.
    #[arg(long, value_name = "FILE")]
    pub detections: Option<PathBuf>,

    /// Detector label to redact (repeatable, default: person)
    #[arg(long = "target-class", value_name = "LABEL")]
    pub target_classes: Vec<String>,

    /// Ignore boxes below this confidence (0.0-1.0)
    #[arg(long, value_name = "F")]
    pub min_confidence: Option<f32>,

    /// Fail a frame whose detection takes longer than this
    #[arg(long, value_name = "MS", value_parser = clap::value_parser!(u64).range(1..))]
    pub detection_timeout_ms: Option<u64>,

    /// What to do when detection fails on a frame
    #[arg(long = "on-detection-failure", value_name = "POLICY", default_value_t = DetectionFailurePolicy::Abort)]
    pub detection_failure_policy: DetectionFailurePolicy,

    // --- Redaction ---
    /// Blur kernel size in pixels (even sizes are rounded up)
    #[arg(long, value_name = "N")]
    pub kernel_size: Option<u32>,

    /// Gaussian blur standard deviation
    #[arg(long, value_name = "F")]
    pub sigma: Option<f64>,

    /// Output video codec (mp4v or h264)
    #[arg(long, value_name = "CODEC", default_value_t = OutputCodec::Mp4v)]
    pub codec: OutputCodec,

    // --- Scratch Files ---
    /// Directory for scratch files (defaults to the system temp directory)
    #[arg(long, value_name = "DIR")]
    pub temp_dir: Option<PathBuf>,

    /// Keep scratch files after the run
    #[arg(long)]
    pub keep_temp: bool,
}

#[derive(Args, Debug)]
pub struct ProbeArgs {
    /// Video file to inspect
    #[arg(short = 'i', long = "input", required = true, value_name = "INPUT")]
    pub input_path: PathBuf,
}
