// ============================================================================
// redacto-core/src/detection/command.rs
// ============================================================================
//
// COMMAND DETECTOR: Detection Served by a Long-Lived External Process
//
// The model runs in its own process (typically a Python model server) that
// is started once and fed one frame at a time over stdin:
//
//   {"frame": 3, "width": 640, "height": 480, "format": "rgb24"}\n
//   <width * height * 3 raw bytes>
//
// and answers each frame with exactly one line on stdout holding a JSON
// array of boxes:
//
//   [{"label": "person", "confidence": 0.91, "x1": 10, "y1": 12, "x2": 80, "y2": 200}]
//
// Frames are written and replies are read on helper threads, so the
// per-frame deadline covers the whole exchange: a worker that stops reading
// its stdin times out the same way as one that never answers. A worker that
// times out, exits or breaks the pipe is killed and a fresh one is started
// on the next call.

use super::{DetectionBox, DetectionError, RegionDetector};
use crate::frame::Frame;

use serde::Serialize;
use std::io::{self, BufRead, BufReader, Write};
use std::process::{Child, ChildStdin, Command, Stdio};
use std::sync::mpsc::{self, Receiver, RecvTimeoutError, Sender};
use std::thread;
use std::time::{Duration, Instant};

#[derive(Serialize)]
struct FrameHeader {
    frame: u64,
    width: u32,
    height: u32,
    format: &'static str,
}

/// What the helper threads report back to the detector.
enum WorkerEvent {
    Reply(String),
    WriteFailed(io::Error),
    ReadFailed(io::Error),
    StdoutClosed,
}

struct Worker {
    child: Child,
    requests: Option<Sender<Vec<u8>>>,
    events: Receiver<WorkerEvent>,
}

impl Worker {
    fn shutdown(mut self) {
        // The writer thread may be blocked on a full pipe; it is released
        // by the kill and is not joined.
        drop(self.requests.take());
        let _ = self.child.kill();
        match self.child.wait() {
            Ok(status) => log::debug!("Detector process exited with {}", status),
            Err(e) => log::warn!("Failed to wait for detector process: {}", e),
        }
    }
}

/// Detector backed by an external process speaking the frame/reply line
/// protocol described in the module docs.
pub struct CommandDetector {
    program: String,
    args: Vec<String>,
    timeout: Option<Duration>,
    worker: Option<Worker>,
}

impl CommandDetector {
    /// Detector running `program` with `args`. The process is started on the
    /// first frame.
    pub fn new<I, S>(program: impl Into<String>, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            program: program.into(),
            args: args.into_iter().map(Into::into).collect(),
            timeout: None,
            worker: None,
        }
    }

    /// Parses a whitespace separated command line such as
    /// `python3 serve_model.py --weights yolov8n.pt`. No shell quoting is
    /// interpreted.
    pub fn from_command_line(command_line: &str) -> Result<Self, DetectionError> {
        let mut parts = command_line.split_whitespace();
        let program = parts
            .next()
            .ok_or_else(|| DetectionError::Protocol("detector command is empty".to_string()))?;
        Ok(Self::new(program, parts))
    }

    /// Fails a frame whose exchange (writing the frame and reading the
    /// reply) takes longer than `timeout`.
    #[must_use]
    pub fn with_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.timeout = timeout;
        self
    }

    /// The command line, for log output.
    #[must_use]
    pub fn command_line(&self) -> String {
        std::iter::once(self.program.as_str())
            .chain(self.args.iter().map(String::as_str))
            .collect::<Vec<_>>()
            .join(" ")
    }

    fn spawn(&self) -> Result<Worker, DetectionError> {
        log::debug!("Starting detector process: {}", self.command_line());
        let mut child = Command::new(&self.program)
            .args(&self.args)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|e| DetectionError::Spawn(self.command_line(), e))?;

        let stdin = child.stdin.take();
        let stdout = child.stdout.take();
        let (Some(stdin), Some(stdout)) = (stdin, stdout) else {
            let _ = child.kill();
            let _ = child.wait();
            return Err(DetectionError::Exited(
                "detector pipes are not available".to_string(),
            ));
        };

        let (event_tx, events) = mpsc::channel();
        let (requests, request_rx) = mpsc::channel();
        spawn_writer(stdin, request_rx, event_tx.clone());
        spawn_reader(stdout, event_tx);

        if let Some(stderr) = child.stderr.take() {
            thread::spawn(move || {
                for line in BufReader::new(stderr).lines().map_while(Result::ok) {
                    log::debug!("Detector: {}", line);
                }
            });
        }

        Ok(Worker {
            child,
            requests: Some(requests),
            events,
        })
    }

    fn exchange(&self, worker: &mut Worker, frame: &Frame) -> Result<Vec<DetectionBox>, DetectionError> {
        let deadline = self.timeout.map(|timeout| (timeout, Instant::now() + timeout));

        let header = serde_json::to_string(&FrameHeader {
            frame: frame.index,
            width: frame.width,
            height: frame.height,
            format: "rgb24",
        })?;
        let mut payload = Vec::with_capacity(header.len() + 1 + frame.data().len());
        payload.extend_from_slice(header.as_bytes());
        payload.push(b'\n');
        payload.extend_from_slice(frame.data());

        let sent = worker
            .requests
            .as_ref()
            .is_some_and(|requests| requests.send(payload).is_ok());
        if !sent {
            return Err(DetectionError::Exited("detector stdin is closed".to_string()));
        }

        loop {
            let event = match deadline {
                Some((timeout, deadline)) => {
                    let remaining = deadline.saturating_duration_since(Instant::now());
                    match worker.events.recv_timeout(remaining) {
                        Ok(event) => event,
                        Err(RecvTimeoutError::Timeout) => return Err(DetectionError::Timeout(timeout)),
                        Err(RecvTimeoutError::Disconnected) => return Err(exited(worker)),
                    }
                }
                None => match worker.events.recv() {
                    Ok(event) => event,
                    Err(_) => return Err(exited(worker)),
                },
            };

            match event {
                WorkerEvent::Reply(line) if line.trim().is_empty() => continue,
                WorkerEvent::Reply(line) => return Ok(serde_json::from_str(line.trim())?),
                WorkerEvent::WriteFailed(e) | WorkerEvent::ReadFailed(e) => return Err(e.into()),
                WorkerEvent::StdoutClosed => return Err(exited(worker)),
            }
        }
    }
}

/// Writes queued frames to the worker's stdin until the queue is dropped or
/// a write fails.
fn spawn_writer(mut stdin: ChildStdin, requests: Receiver<Vec<u8>>, events: Sender<WorkerEvent>) {
    thread::spawn(move || {
        for payload in requests {
            if let Err(e) = stdin.write_all(&payload).and_then(|()| stdin.flush()) {
                let _ = events.send(WorkerEvent::WriteFailed(e));
                break;
            }
        }
    });
}

fn spawn_reader<R: io::Read + Send + 'static>(stdout: R, events: Sender<WorkerEvent>) {
    thread::spawn(move || {
        for line in BufReader::new(stdout).lines() {
            let event = match line {
                Ok(line) => WorkerEvent::Reply(line),
                Err(e) => {
                    let _ = events.send(WorkerEvent::ReadFailed(e));
                    return;
                }
            };
            if events.send(event).is_err() {
                return;
            }
        }
        let _ = events.send(WorkerEvent::StdoutClosed);
    });
}

fn exited(worker: &mut Worker) -> DetectionError {
    let status = match worker.child.try_wait() {
        Ok(Some(status)) => status.to_string(),
        Ok(None) => "stdout closed".to_string(),
        Err(e) => e.to_string(),
    };
    DetectionError::Exited(status)
}

impl RegionDetector for CommandDetector {
    fn detect(&mut self, frame: &Frame) -> Result<Vec<DetectionBox>, DetectionError> {
        let mut worker = match self.worker.take() {
            Some(worker) => worker,
            None => self.spawn()?,
        };

        match self.exchange(&mut worker, frame) {
            Ok(boxes) => {
                log::trace!("Detector returned {} box(es) for frame {}", boxes.len(), frame.index);
                self.worker = Some(worker);
                Ok(boxes)
            }
            // The reply line was consumed, the worker is still in step.
            Err(err @ DetectionError::Json(_)) => {
                self.worker = Some(worker);
                Err(err)
            }
            Err(err) => {
                log::warn!(
                    "Stopping detector process after failure on frame {}: {}",
                    frame.index,
                    err
                );
                worker.shutdown();
                Err(err)
            }
        }
    }
}

impl Drop for CommandDetector {
    fn drop(&mut self) {
        if let Some(worker) = self.worker.take() {
            worker.shutdown();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_command_line() {
        let detector = CommandDetector::from_command_line("  python3 serve.py --weights w.pt ").unwrap();
        assert_eq!(detector.program, "python3");
        assert_eq!(detector.args, vec!["serve.py", "--weights", "w.pt"]);
        assert_eq!(detector.command_line(), "python3 serve.py --weights w.pt");
        assert!(CommandDetector::from_command_line("   ").is_err());
    }

    #[test]
    fn test_header_format() {
        let header = serde_json::to_string(&FrameHeader {
            frame: 3,
            width: 64,
            height: 48,
            format: "rgb24",
        })
        .unwrap();
        assert_eq!(header, r#"{"frame":3,"width":64,"height":48,"format":"rgb24"}"#);
    }

    #[test]
    fn test_missing_program_is_spawn_error() {
        let mut detector = CommandDetector::new("/nonexistent/redacto-detector", Vec::<String>::new());
        let err = detector.detect(&Frame::filled(0, 2, 2, [0, 0, 0])).unwrap_err();
        assert!(matches!(err, DetectionError::Spawn(..)));
    }
}
