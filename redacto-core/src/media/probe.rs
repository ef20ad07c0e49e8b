//! FFprobe integration for reading stream geometry.
//!
//! The geometry read here (dimensions, frame rate, declared frame count) is
//! what the output video is created with, so it is read once when the input
//! is opened and trusted from then on.

use crate::error::{CoreError, CoreResult, command_failed_error, command_start_error};
use crate::frame::{FrameRate, VideoGeometry};

use ffprobe::{FfProbeError, ffprobe};
use std::path::Path;

/// Geometry plus descriptive properties of the first video stream.
#[derive(Debug, Clone, PartialEq)]
pub struct VideoProbe {
    pub geometry: VideoGeometry,
    /// Decoder name reported by ffprobe (e.g. `h264`)
    pub codec_name: Option<String>,
    /// Duration in seconds, from the stream or the container
    pub duration_secs: Option<f64>,
}

/// Probes `input_path` for its first video stream.
pub fn probe_video(input_path: &Path) -> CoreResult<VideoProbe> {
    log::debug!(
        "Running ffprobe (via crate) for video geometry on: {}",
        input_path.display()
    );

    let metadata = ffprobe(input_path).map_err(|err| {
        log::debug!("ffprobe failed on {}: {:?}", input_path.display(), err);
        map_ffprobe_error(err, "video geometry")
    })?;

    let stream = metadata
        .streams
        .iter()
        .find(|s| s.codec_type.as_deref() == Some("video"))
        .ok_or_else(|| {
            CoreError::FfprobeParse(format!("No video stream found in {}", input_path.display()))
        })?;

    let (width, height) = match (stream.width, stream.height) {
        (Some(w), Some(h)) if w > 0 && h > 0 => (w as u32, h as u32),
        (w, h) => {
            return Err(CoreError::FfprobeParse(format!(
                "Invalid video dimensions in {}: width={:?}, height={:?}",
                input_path.display(),
                w,
                h
            )));
        }
    };

    let frame_rate = FrameRate::parse(&stream.avg_frame_rate)
        .or_else(|| FrameRate::parse(&stream.r_frame_rate))
        .ok_or_else(|| {
            CoreError::FfprobeParse(format!(
                "No usable frame rate in {} (avg={}, r={})",
                input_path.display(),
                stream.avg_frame_rate,
                stream.r_frame_rate
            ))
        })?;

    let duration_secs = parse_seconds(stream.duration.as_deref())
        .or_else(|| parse_seconds(metadata.format.duration.as_deref()));

    let declared = stream
        .nb_frames
        .as_deref()
        .and_then(|f| f.trim().parse::<u64>().ok())
        .filter(|&count| count > 0);

    let (total_frames, frame_count_estimated) = match declared {
        Some(count) => (Some(count), false),
        None => {
            let estimate = estimate_frame_count(duration_secs, frame_rate);
            (estimate, estimate.is_some())
        }
    };

    log::debug!(
        "Probed {}: {}x{} @ {} fps, frames={:?}{}",
        input_path.display(),
        width,
        height,
        frame_rate,
        total_frames,
        if frame_count_estimated { " (estimated)" } else { "" }
    );

    Ok(VideoProbe {
        geometry: VideoGeometry {
            width,
            height,
            frame_rate,
            total_frames,
            frame_count_estimated,
        },
        codec_name: stream.codec_name.clone(),
        duration_secs,
    })
}

fn parse_seconds(value: Option<&str>) -> Option<f64> {
    value
        .and_then(|d| d.trim().parse::<f64>().ok())
        .filter(|d| d.is_finite() && *d > 0.0)
}

/// Frame count implied by a duration at a frame rate, rounded to the
/// nearest frame.
#[must_use]
pub fn estimate_frame_count(duration_secs: Option<f64>, frame_rate: FrameRate) -> Option<u64> {
    let duration = duration_secs?;
    let frames = (duration * frame_rate.as_f64()).round();
    (frames >= 1.0).then_some(frames as u64)
}

fn map_ffprobe_error(err: FfProbeError, context: &str) -> CoreError {
    match err {
        FfProbeError::Io(io_err) => command_start_error(format!("ffprobe ({context})"), io_err),
        FfProbeError::Status(output) => {
            let stderr = String::from_utf8_lossy(&output.stderr).trim().to_string();
            command_failed_error(format!("ffprobe ({context})"), output.status, stderr)
        }
        FfProbeError::Deserialize(err) => {
            CoreError::FfprobeParse(format!("ffprobe {context} output deserialization: {err}"))
        }
        _ => CoreError::FfprobeParse(format!("Unknown ffprobe error during {context}: {err:?}")),
    }
}
