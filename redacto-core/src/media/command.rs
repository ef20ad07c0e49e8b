//! FFmpeg command construction for the decoder and encoder processes.
//!
//! Both ends of the pipeline talk to ffmpeg through raw RGB24 pipes: the
//! decoder writes packed frames to stdout, the encoder reads them from stdin.

use crate::config::OutputCodec;
use crate::frame::{FrameRate, VideoGeometry};

use ffmpeg_sidecar::command::FfmpegCommand;
use std::path::Path;

/// Builder for the ffmpeg commands both ends of the pipeline start from.
/// The banner is always hidden.
pub struct FfmpegCommandBuilder {
    cmd: FfmpegCommand,
    log_level: Option<&'static str>,
}

impl Default for FfmpegCommandBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl FfmpegCommandBuilder {
    #[must_use]
    pub fn new() -> Self {
        Self {
            cmd: FfmpegCommand::new(),
            log_level: None,
        }
    }

    /// Restricts ffmpeg's stderr output to the given level (e.g. `error`).
    #[must_use]
    pub fn with_log_level(mut self, level: &'static str) -> Self {
        self.log_level = Some(level);
        self
    }

    #[must_use]
    pub fn build(mut self) -> FfmpegCommand {
        self.cmd.hide_banner();
        if let Some(level) = self.log_level {
            self.cmd.args(["-loglevel", level, "-nostats"]);
        }
        self.cmd
    }
}

/// Decoder: first video stream of `input` as packed RGB24 on stdout.
///
/// Audio and subtitles are dropped; stream metadata stays on stderr so the
/// frame reader can size the raw frames. Display-matrix rotation is not
/// applied, so frames keep the coded width and height that ffprobe reports.
#[must_use]
pub fn decode_command(input: &Path) -> FfmpegCommand {
    let mut cmd = FfmpegCommandBuilder::new().build();
    cmd.arg("-noautorotate");
    cmd.input(input.to_string_lossy().as_ref());
    cmd.args(["-map", "0:v:0", "-an", "-sn"]);
    cmd.rawvideo();
    cmd
}

/// Encoder: packed RGB24 frames of `geometry` on stdin into `output`.
#[must_use]
pub fn encode_command(output: &Path, geometry: &VideoGeometry, codec: OutputCodec) -> FfmpegCommand {
    let frame_rate = encoder_frame_rate(geometry.frame_rate, codec);
    let mut cmd = FfmpegCommandBuilder::new().with_log_level("error").build();
    cmd.args(["-f", "rawvideo", "-pix_fmt", "rgb24"]);
    cmd.args(["-s", format!("{}x{}", geometry.width, geometry.height).as_str()]);
    cmd.args(["-framerate", frame_rate.to_string().as_str()]);
    cmd.input("-");
    cmd.arg("-an");
    cmd.args(codec.ffmpeg_args());
    cmd.overwrite();
    cmd.output(output.to_string_lossy().as_ref());
    cmd
}

/// The input rate, approximated where the codec bounds the time base.
fn encoder_frame_rate(rate: FrameRate, codec: OutputCodec) -> FrameRate {
    let Some(max) = codec.max_time_base_den() else {
        return rate;
    };
    let limited = rate.limit_numerator(max);
    if limited.num != rate.num {
        log::debug!("Encoding {} fps as {} for {}", rate, limited, codec);
    }
    limited
}

/// Renders the argument list of a command for log output.
#[must_use]
pub fn command_args(cmd: &mut FfmpegCommand) -> Vec<String> {
    cmd.as_inner()
        .get_args()
        .map(|arg| arg.to_string_lossy().into_owned())
        .collect()
}

/// Known ffmpeg error lines that do not indicate a broken stream.
#[must_use]
pub fn is_non_critical_ffmpeg_message(message: &str) -> bool {
    const NON_CRITICAL: &[&str] = &[
        "deprecated pixel format used",
        "Last message repeated",
        "co located POCs unavailable",
        "Application provided invalid, non monotonically increasing dts",
    ];
    NON_CRITICAL.iter().any(|pattern| message.contains(pattern))
}
