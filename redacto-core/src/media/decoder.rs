// ============================================================================
// redacto-core/src/media/decoder.rs
// ============================================================================
//
// FRAME SOURCE: Decoding an Input Video into RGB24 Frames
//
// Opening probes the input with ffprobe, then starts an ffmpeg decoder that
// streams raw frames to stdout. ffmpeg-sidecar parses the stream metadata on
// stderr and hands back whole frames as OutputFrame events, which this
// module turns into indexed Frames.
//
// Error lines the decoder prints mid-stream are logged and the stream ends
// where decoding stopped. A decoder that fails before producing a single
// frame is reported as an open error.

use super::FrameSource;
use super::command::{command_args, decode_command, is_non_critical_ffmpeg_message};
use super::probe::probe_video;
use crate::error::{CoreResult, open_error};
use crate::frame::{Frame, VideoGeometry};

use ffmpeg_sidecar::child::FfmpegChild;
use ffmpeg_sidecar::event::{FfmpegEvent, LogLevel};
use ffmpeg_sidecar::iter::FfmpegIterator;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

/// Input video decoded by an ffmpeg child process.
pub struct FfmpegFrameSource {
    path: PathBuf,
    geometry: VideoGeometry,
    child: Option<FfmpegChild>,
    events: Option<FfmpegIterator>,
    next_index: u64,
    decoder_errors: Vec<String>,
}

impl FfmpegFrameSource {
    /// Opens `path` for decoding.
    ///
    /// Fails with an open error when the file is missing, empty, not a
    /// regular file, has no video stream, or ffmpeg cannot be started.
    pub fn open(path: &Path) -> CoreResult<Self> {
        check_input_file(path)?;

        let probe = probe_video(path).map_err(|e| open_error(path, e.to_string()))?;

        let mut cmd = decode_command(path);
        log::debug!("Starting decoder: ffmpeg {}", command_args(&mut cmd).join(" "));

        let mut child = cmd
            .spawn()
            .map_err(|e| open_error(path, format!("failed to start ffmpeg decoder: {e}")))?;
        let events = match child.iter() {
            Ok(events) => events,
            Err(e) => {
                let _ = child.kill();
                let _ = child.wait();
                return Err(open_error(path, format!("failed to read decoder output: {e}")));
            }
        };

        Ok(Self {
            path: path.to_path_buf(),
            geometry: probe.geometry,
            child: Some(child),
            events: Some(events),
            next_index: 0,
            decoder_errors: Vec::new(),
        })
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn end_of_stream(&mut self) -> CoreResult<Option<Frame>> {
        self.events = None;
        if self.next_index == 0 && !self.decoder_errors.is_empty() {
            let reason = self.decoder_errors.join("; ");
            self.close();
            return Err(open_error(&self.path, format!("decoder produced no frames: {reason}")));
        }
        if !self.decoder_errors.is_empty() {
            log::warn!(
                "Decoding of {} stopped after {} frame(s) with {} error(s)",
                self.path.display(),
                self.next_index,
                self.decoder_errors.len()
            );
        }
        log::debug!("End of stream after {} frame(s)", self.next_index);
        Ok(None)
    }
}

impl FrameSource for FfmpegFrameSource {
    fn geometry(&self) -> &VideoGeometry {
        &self.geometry
    }

    fn next_frame(&mut self) -> CoreResult<Option<Frame>> {
        loop {
            let Some(event) = self.events.as_mut().and_then(Iterator::next) else {
                if self.events.is_none() {
                    return Ok(None);
                }
                return self.end_of_stream();
            };

            match event {
                FfmpegEvent::OutputFrame(output) => {
                    let frame = Frame::from_rgb(self.next_index, output.width, output.height, output.data)?;
                    self.next_index += 1;
                    return Ok(Some(frame));
                }
                FfmpegEvent::Error(message)
                | FfmpegEvent::Log(LogLevel::Error | LogLevel::Fatal, message) => {
                    if is_non_critical_ffmpeg_message(&message) {
                        log::debug!("Decoder: {}", message);
                    } else {
                        log::warn!("Decoder error at frame {}: {}", self.next_index, message);
                        self.decoder_errors.push(message);
                    }
                }
                FfmpegEvent::Done => return self.end_of_stream(),
                _ => {}
            }
        }
    }

    fn close(&mut self) {
        self.events = None;
        if let Some(mut child) = self.child.take() {
            if let Err(e) = child.kill() {
                log::debug!("Decoder for {} already stopped: {}", self.path.display(), e);
            }
            match child.wait() {
                Ok(status) => log::debug!("Decoder exited with {}", status),
                Err(e) => log::warn!("Failed to wait for decoder of {}: {}", self.path.display(), e),
            }
        }
    }
}

impl Drop for FfmpegFrameSource {
    fn drop(&mut self) {
        self.close();
    }
}

/// Rejects inputs that cannot possibly decode before anything is spawned.
fn check_input_file(path: &Path) -> CoreResult<()> {
    let metadata = fs::metadata(path).map_err(|e| match e.kind() {
        io::ErrorKind::NotFound => open_error(path, "file does not exist"),
        _ => open_error(path, e.to_string()),
    })?;
    if !metadata.is_file() {
        return Err(open_error(path, "not a regular file"));
    }
    if metadata.len() == 0 {
        return Err(open_error(path, "file is empty"));
    }
    fs::File::open(path).map_err(|e| open_error(path, e.to_string()))?;
    Ok(())
}
