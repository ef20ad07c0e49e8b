// ============================================================================
// redacto-core/src/mocks.rs
// ============================================================================
//
// TEST DOUBLES: In-Memory Media, Scripted Detection, Recorded Progress
//
// Collaborators for exercising the pipeline without ffmpeg or a model. They
// share their recordings through Arc<Mutex<..>> so a test can keep a clone
// while the pipeline owns the original.

use crate::detection::{DetectionBox, DetectionError, RegionDetector};
use crate::error::{CoreError, CoreResult, create_error, open_error};
use crate::frame::{Frame, VideoGeometry};
use crate::media::{FrameSink, FrameSource, MediaBackend, check_frame_geometry};
use crate::progress::ProgressReporter;

use std::collections::{HashMap, HashSet, VecDeque};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard};

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    match mutex.lock() {
        Ok(guard) => guard,
        Err(poisoned) => poisoned.into_inner(),
    }
}

/// Deterministic RGB noise, for checks that need texture to blur.
#[must_use]
pub fn noise_frame(index: u64, width: u32, height: u32, seed: u32) -> Frame {
    let mut state = seed.wrapping_mul(2_654_435_761).wrapping_add(index as u32);
    let mut frame = Frame::filled(index, width, height, [0, 0, 0]);
    for byte in frame.data_mut() {
        state = state.wrapping_mul(1_664_525).wrapping_add(1_013_904_223);
        *byte = (state >> 24) as u8;
    }
    frame
}

// ---- Media ----

/// Backend serving a fixed list of frames and capturing what is written.
#[derive(Clone)]
pub struct MemoryBackend {
    geometry: VideoGeometry,
    frames: Vec<Frame>,
    written: Arc<Mutex<Vec<Frame>>>,
    events: Arc<Mutex<Vec<String>>>,
    sink_path: Arc<Mutex<Option<PathBuf>>>,
    fail_source_open: bool,
    fail_sink_open: bool,
    fail_sink_close: bool,
    decode_error_at: Option<u64>,
}

impl MemoryBackend {
    /// `geometry` is what the source announces; `frames` is what it
    /// actually yields, so the two can disagree on purpose.
    #[must_use]
    pub fn new(geometry: VideoGeometry, frames: Vec<Frame>) -> Self {
        Self {
            geometry,
            frames,
            written: Arc::default(),
            events: Arc::default(),
            sink_path: Arc::default(),
            fail_source_open: false,
            fail_sink_open: false,
            fail_sink_close: false,
            decode_error_at: None,
        }
    }

    #[must_use]
    pub fn with_failing_source_open(mut self) -> Self {
        self.fail_source_open = true;
        self
    }

    #[must_use]
    pub fn with_failing_sink_open(mut self) -> Self {
        self.fail_sink_open = true;
        self
    }

    #[must_use]
    pub fn with_failing_sink_close(mut self) -> Self {
        self.fail_sink_close = true;
        self
    }

    /// Makes `next_frame` fail when frame `index` would be returned.
    #[must_use]
    pub fn with_decode_error_at(mut self, index: u64) -> Self {
        self.decode_error_at = Some(index);
        self
    }

    /// Frames the sink received, in order.
    #[must_use]
    pub fn written_frames(&self) -> Vec<Frame> {
        lock(&self.written).clone()
    }

    /// Lifecycle calls in order: `source.open`, `sink.open`, `sink.close`,
    /// `source.close`.
    #[must_use]
    pub fn events(&self) -> Vec<String> {
        lock(&self.events).clone()
    }

    /// Path the sink was opened with, if it was.
    #[must_use]
    pub fn sink_path(&self) -> Option<PathBuf> {
        lock(&self.sink_path).clone()
    }
}

impl MediaBackend for MemoryBackend {
    type Source = MemoryFrameSource;
    type Sink = MemoryFrameSink;

    fn open_source(&self, path: &Path) -> CoreResult<Self::Source> {
        if self.fail_source_open {
            return Err(open_error(path, "unreadable test input"));
        }
        lock(&self.events).push("source.open".to_string());
        Ok(MemoryFrameSource {
            geometry: self.geometry,
            frames: self.frames.iter().cloned().collect(),
            events: Arc::clone(&self.events),
            decode_error_at: self.decode_error_at,
            closed: false,
        })
    }

    fn open_sink(&self, path: &Path, geometry: &VideoGeometry) -> CoreResult<Self::Sink> {
        if self.fail_sink_open {
            return Err(create_error(path, "unwritable test output"));
        }
        lock(&self.events).push("sink.open".to_string());
        *lock(&self.sink_path) = Some(path.to_path_buf());
        Ok(MemoryFrameSink {
            geometry: *geometry,
            written: Arc::clone(&self.written),
            events: Arc::clone(&self.events),
            path: path.to_path_buf(),
            fail_close: self.fail_sink_close,
            closed: false,
        })
    }
}

pub struct MemoryFrameSource {
    geometry: VideoGeometry,
    frames: VecDeque<Frame>,
    events: Arc<Mutex<Vec<String>>>,
    decode_error_at: Option<u64>,
    closed: bool,
}

impl FrameSource for MemoryFrameSource {
    fn geometry(&self) -> &VideoGeometry {
        &self.geometry
    }

    fn next_frame(&mut self) -> CoreResult<Option<Frame>> {
        if self.closed {
            return Ok(None);
        }
        let next_index = self.frames.front().map(|frame| frame.index);
        if next_index.is_some() && next_index == self.decode_error_at {
            return Err(CoreError::OperationFailed(format!(
                "test decode failure at frame {}",
                next_index.unwrap_or_default()
            )));
        }
        Ok(self.frames.pop_front())
    }

    fn close(&mut self) {
        if !self.closed {
            self.closed = true;
            lock(&self.events).push("source.close".to_string());
        }
    }
}

pub struct MemoryFrameSink {
    geometry: VideoGeometry,
    written: Arc<Mutex<Vec<Frame>>>,
    events: Arc<Mutex<Vec<String>>>,
    path: PathBuf,
    fail_close: bool,
    closed: bool,
}

impl FrameSink for MemoryFrameSink {
    fn geometry(&self) -> &VideoGeometry {
        &self.geometry
    }

    fn write_frame(&mut self, frame: &Frame) -> CoreResult<()> {
        if self.closed {
            return Err(CoreError::Write {
                frame_index: frame.index,
                reason: "output video is already closed".to_string(),
            });
        }
        check_frame_geometry(&self.geometry, frame)?;
        lock(&self.written).push(frame.clone());
        Ok(())
    }

    fn close(&mut self) -> CoreResult<()> {
        if self.closed {
            return Ok(());
        }
        self.closed = true;
        lock(&self.events).push("sink.close".to_string());
        if self.fail_close {
            return Err(CoreError::Encode {
                path: self.path.clone(),
                reason: "test encoder failure".to_string(),
            });
        }
        Ok(())
    }
}

// ---- Detection ----

/// Detector returning prepared boxes per frame index and recording calls.
#[derive(Clone, Default)]
pub struct ScriptedDetector {
    boxes: HashMap<u64, Vec<DetectionBox>>,
    failures: HashSet<u64>,
    calls: Arc<Mutex<Vec<u64>>>,
}

impl ScriptedDetector {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_boxes(mut self, frame_index: u64, boxes: Vec<DetectionBox>) -> Self {
        self.boxes.insert(frame_index, boxes);
        self
    }

    #[must_use]
    pub fn failing_on(mut self, frame_index: u64) -> Self {
        self.failures.insert(frame_index);
        self
    }

    /// Frame indices the detector was called with, in order.
    #[must_use]
    pub fn calls(&self) -> Vec<u64> {
        lock(&self.calls).clone()
    }
}

impl RegionDetector for ScriptedDetector {
    fn detect(&mut self, frame: &Frame) -> Result<Vec<DetectionBox>, DetectionError> {
        lock(&self.calls).push(frame.index);
        if self.failures.contains(&frame.index) {
            return Err(DetectionError::Model(format!(
                "scripted failure on frame {}",
                frame.index
            )));
        }
        Ok(self.boxes.get(&frame.index).cloned().unwrap_or_default())
    }
}

// ---- Progress ----

/// Reporter keeping every update and warning.
#[derive(Debug, Default)]
pub struct RecordingReporter {
    updates: Mutex<Vec<(f64, String)>>,
    warnings: Mutex<Vec<String>>,
}

impl RecordingReporter {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn updates(&self) -> Vec<(f64, String)> {
        lock(&self.updates).clone()
    }

    #[must_use]
    pub fn fractions(&self) -> Vec<f64> {
        lock(&self.updates).iter().map(|(fraction, _)| *fraction).collect()
    }

    #[must_use]
    pub fn warnings(&self) -> Vec<String> {
        lock(&self.warnings).clone()
    }
}

impl ProgressReporter for RecordingReporter {
    fn progress(&self, fraction: f64, message: &str) {
        lock(&self.updates).push((fraction, message.to_string()));
    }

    fn warning(&self, message: &str) {
        log::warn!("{}", message);
        lock(&self.warnings).push(message.to_string());
    }
}
