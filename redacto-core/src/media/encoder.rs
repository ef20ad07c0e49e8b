// ============================================================================
// redacto-core/src/media/encoder.rs
// ============================================================================
//
// FRAME SINK: Encoding RGB24 Frames into the Output Video
//
// The sink owns an ffmpeg child reading raw frames from stdin. Frames are
// checked against the geometry the sink was opened with before a single
// byte is written. The encoder's stderr is drained on a helper thread so a
// chatty encoder can never block the pipe the pipeline writes into.
//
// Closing sends EOF, waits for the encoder and turns a non-zero exit into
// an encode error. Closing again is a no-op.

use super::command::{command_args, encode_command};
use super::{FrameSink, check_frame_geometry};
use crate::config::OutputCodec;
use crate::error::{CoreError, CoreResult, command_wait_error, create_error};
use crate::frame::{Frame, VideoGeometry};

use ffmpeg_sidecar::child::FfmpegChild;
use std::fs;
use std::io::{BufRead, BufReader, Read, Write};
use std::path::{Path, PathBuf};
use std::process::ChildStdin;
use std::thread::{self, JoinHandle};

/// Lines of encoder stderr kept for error messages.
const STDERR_TAIL_LINES: usize = 20;

/// Output video written by an ffmpeg child process.
pub struct FfmpegFrameSink {
    path: PathBuf,
    geometry: VideoGeometry,
    child: Option<FfmpegChild>,
    stdin: Option<ChildStdin>,
    stderr_reader: Option<JoinHandle<Vec<String>>>,
    frames_written: u64,
    closed: bool,
}

impl FfmpegFrameSink {
    /// Creates `path` and starts the encoder for frames of `geometry`.
    pub fn open(path: &Path, geometry: &VideoGeometry, codec: OutputCodec) -> CoreResult<Self> {
        check_output_location(path)?;
        if geometry.width == 0 || geometry.height == 0 {
            return Err(create_error(
                path,
                format!("invalid frame size {}x{}", geometry.width, geometry.height),
            ));
        }

        let mut cmd = encode_command(path, geometry, codec);
        log::debug!("Starting encoder: ffmpeg {}", command_args(&mut cmd).join(" "));

        let mut child = cmd
            .spawn()
            .map_err(|e| create_error(path, format!("failed to start ffmpeg encoder: {e}")))?;

        let Some(stdin) = child.take_stdin() else {
            let _ = child.kill();
            let _ = child.wait();
            return Err(create_error(path, "encoder stdin is not available"));
        };
        let stderr_reader = child.take_stderr().map(spawn_stderr_reader);

        Ok(Self {
            path: path.to_path_buf(),
            geometry: *geometry,
            child: Some(child),
            stdin: Some(stdin),
            stderr_reader,
            frames_written: 0,
            closed: false,
        })
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    #[must_use]
    pub fn frames_written(&self) -> u64 {
        self.frames_written
    }

    fn collect_stderr(&mut self) -> String {
        self.stderr_reader
            .take()
            .and_then(|reader| reader.join().ok())
            .map(|lines| lines.join("\n"))
            .unwrap_or_default()
    }
}

impl FrameSink for FfmpegFrameSink {
    fn geometry(&self) -> &VideoGeometry {
        &self.geometry
    }

    fn write_frame(&mut self, frame: &Frame) -> CoreResult<()> {
        check_frame_geometry(&self.geometry, frame)?;
        let Some(stdin) = self.stdin.as_mut() else {
            return Err(CoreError::Write {
                frame_index: frame.index,
                reason: "output video is already closed".to_string(),
            });
        };
        stdin.write_all(frame.data()).map_err(|e| CoreError::Write {
            frame_index: frame.index,
            reason: format!("encoder rejected frame data: {e}"),
        })?;
        self.frames_written += 1;
        Ok(())
    }

    fn close(&mut self) -> CoreResult<()> {
        if self.closed {
            return Ok(());
        }
        self.closed = true;

        // EOF on stdin lets ffmpeg flush and write the container trailer.
        drop(self.stdin.take());
        let stderr = self.collect_stderr();

        let Some(mut child) = self.child.take() else {
            return Ok(());
        };
        let status = child
            .wait()
            .map_err(|e| command_wait_error("ffmpeg (encoder)", e))?;

        if !status.success() {
            log::error!("Encoder for {} failed with {}", self.path.display(), status);
            return Err(CoreError::Encode {
                path: self.path.clone(),
                reason: if stderr.trim().is_empty() {
                    format!("ffmpeg exited with {status}")
                } else {
                    format!("ffmpeg exited with {status}: {}", stderr.trim())
                },
            });
        }

        log::debug!(
            "Encoder finished {} ({} frame(s))",
            self.path.display(),
            self.frames_written
        );
        Ok(())
    }
}

impl Drop for FfmpegFrameSink {
    fn drop(&mut self) {
        if let Err(e) = self.close() {
            log::warn!("Closing output video on drop failed: {}", e);
        }
    }
}

/// The output's parent directory must exist and be writable.
fn check_output_location(path: &Path) -> CoreResult<()> {
    let parent = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };
    let metadata = fs::metadata(parent)
        .map_err(|e| create_error(path, format!("output directory {}: {e}", parent.display())))?;
    if !metadata.is_dir() {
        return Err(create_error(
            path,
            format!("{} is not a directory", parent.display()),
        ));
    }
    if metadata.permissions().readonly() {
        return Err(create_error(
            path,
            format!("output directory {} is read-only", parent.display()),
        ));
    }
    Ok(())
}

fn spawn_stderr_reader<R: Read + Send + 'static>(stderr: R) -> JoinHandle<Vec<String>> {
    thread::spawn(move || {
        let mut tail = Vec::new();
        for line in BufReader::new(stderr).lines().map_while(Result::ok) {
            log::debug!("Encoder: {}", line);
            if tail.len() == STDERR_TAIL_LINES {
                tail.remove(0);
            }
            tail.push(line);
        }
        tail
    })
}
