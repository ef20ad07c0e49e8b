// redacto-cli/src/commands/probe.rs
//
// Prints what the pipeline would read from a video before redacting it.

use crate::cli::ProbeArgs;
use crate::error::{CliErrorContext, CliResult};
use crate::terminal;

use redacto_core::media::{VideoProbe, probe_video};
use redacto_core::{format_bytes, format_duration, utils};

pub fn run_probe(args: ProbeArgs) -> CliResult<VideoProbe> {
    let probe = probe_video(&args.input_path)
        .cli_with_context(|| format!("Failed to probe {}", args.input_path.display()))?;

    terminal::print_section("Video");
    terminal::print_status("File", args.input_path.display());
    if let Some(size) = utils::file_size(&args.input_path) {
        terminal::print_status("Size", format_bytes(size));
    }
    terminal::print_status(
        "Dimensions",
        format!("{}x{}", probe.geometry.width, probe.geometry.height),
    );
    terminal::print_status(
        "Frame rate",
        format!("{} ({:.3} fps)", probe.geometry.frame_rate, probe.geometry.frame_rate.as_f64()),
    );
    terminal::print_status("Frames", describe_frame_count(&probe));
    if let Some(codec) = &probe.codec_name {
        terminal::print_status("Codec", codec);
    }
    if let Some(duration) = probe.duration_secs {
        terminal::print_status("Duration", format_duration(duration));
    }
    Ok(probe)
}

fn describe_frame_count(probe: &VideoProbe) -> String {
    match probe.geometry.total_frames {
        Some(n) if probe.geometry.frame_count_estimated => format!("~{n} (estimated from duration)"),
        Some(n) => n.to_string(),
        None => "unknown".to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use redacto_core::{FrameRate, VideoGeometry};

    fn probe(total: Option<u64>, estimated: bool) -> VideoProbe {
        VideoProbe {
            geometry: VideoGeometry {
                width: 640,
                height: 480,
                frame_rate: FrameRate::new(30000, 1001),
                total_frames: total,
                frame_count_estimated: estimated,
            },
            codec_name: Some("h264".to_string()),
            duration_secs: Some(10.0),
        }
    }

    #[test]
    fn test_describe_frame_count() {
        assert_eq!(describe_frame_count(&probe(Some(300), false)), "300");
        assert_eq!(
            describe_frame_count(&probe(Some(299), true)),
            "~299 (estimated from duration)"
        );
        assert_eq!(describe_frame_count(&probe(None, false)), "unknown");
    }
}
