// ============================================================================
// redacto-core/src/pipeline/mod.rs
// ============================================================================
//
// PIPELINE: Decode, Detect, Redact, Encode
//
// RedactionPipeline drives one input video through the frame loop:
//
//   decode -> detect -> select regions -> redact -> encode -> report progress
//
// one frame at a time, in order, on the calling thread. It owns the frame
// source and sink for the duration of a run and releases both (sink first)
// however the loop ends.
//
// KEY COMPONENTS:
// - RedactionPipeline: the orchestrator with its injected collaborators
// - RedactionReport: what a successful run did
// - CancellationToken: host-side stop flag checked once per frame
// - PipelineState / PipelineStage: frame accounting and lifecycle (state.rs)

mod state;

pub use state::{PipelineStage, PipelineState};

use crate::config::{CoreConfig, DetectionFailurePolicy};
use crate::detection::{RegionDetector, TargetClasses, select_regions};
use crate::error::{CoreError, CoreResult};
use crate::frame::{Frame, VideoGeometry};
use crate::media::{FrameSink, FrameSource, MediaBackend};
use crate::progress::{LogProgressReporter, ProgressReporter};
use crate::redaction::{GaussianRedactor, RedactionRegion, RegionRedactor};
use crate::scratch::CleanupWarning;
use crate::utils::format_duration;

use chrono::{DateTime, Local};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};

/// Stop flag shared between the host and a running pipeline.
#[derive(Debug, Clone, Default)]
pub struct CancellationToken(Arc<AtomicBool>);

impl CancellationToken {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// Outcome of a successful run.
#[derive(Debug, Clone)]
pub struct RedactionReport {
    pub input: PathBuf,
    pub output: PathBuf,
    pub geometry: VideoGeometry,
    pub frames_processed: u64,
    /// Frames with at least one redacted region
    pub frames_redacted: u64,
    pub regions_redacted: u64,
    /// Frames whose detection failed and were written unredacted
    pub detection_failures: u64,
    pub started_at: DateTime<Local>,
    pub elapsed: Duration,
    /// Scratch files that could not be removed after the run
    pub cleanup_warnings: Vec<CleanupWarning>,
}

#[derive(Debug, Default)]
struct FrameTally {
    frames_redacted: u64,
    regions_redacted: u64,
    detection_failures: u64,
}

/// Frame loop orchestrator.
///
/// The detector is injected at construction and lives as long as the
/// pipeline, so a model loaded once is reused for every frame of every run.
pub struct RedactionPipeline<'a> {
    detector: Box<dyn RegionDetector + 'a>,
    redactor: Box<dyn RegionRedactor>,
    reporter: Arc<dyn ProgressReporter>,
    targets: TargetClasses,
    min_confidence: f32,
    failure_policy: DetectionFailurePolicy,
    cancellation: Option<CancellationToken>,
    stage: PipelineStage,
}

impl<'a> RedactionPipeline<'a> {
    /// Builds a pipeline with a Gaussian redactor configured from `config`
    /// and a log-based progress reporter.
    pub fn new<D>(config: &CoreConfig, detector: D) -> CoreResult<Self>
    where
        D: RegionDetector + 'a,
    {
        Self::with_boxed_detector(config, Box::new(detector))
    }

    /// Same as [`RedactionPipeline::new`] for a detector chosen at runtime.
    pub fn with_boxed_detector(
        config: &CoreConfig,
        detector: Box<dyn RegionDetector + 'a>,
    ) -> CoreResult<Self> {
        config.validate()?;
        let redactor = GaussianRedactor::new(config.kernel_size, config.sigma)?;
        Ok(Self {
            detector,
            redactor: Box::new(redactor),
            reporter: Arc::new(LogProgressReporter::new()),
            targets: config.target_classes.clone(),
            min_confidence: config.min_confidence,
            failure_policy: config.detection_failure_policy,
            cancellation: None,
            stage: PipelineStage::Idle,
        })
    }

    #[must_use]
    pub fn with_redactor(mut self, redactor: Box<dyn RegionRedactor>) -> Self {
        self.redactor = redactor;
        self
    }

    #[must_use]
    pub fn with_reporter(mut self, reporter: Arc<dyn ProgressReporter>) -> Self {
        self.reporter = reporter;
        self
    }

    #[must_use]
    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancellation = Some(token);
        self
    }

    #[must_use]
    pub fn reporter(&self) -> &Arc<dyn ProgressReporter> {
        &self.reporter
    }

    /// Stage the most recent run ended in (or is in).
    #[must_use]
    pub fn stage(&self) -> PipelineStage {
        self.stage
    }

    /// Redacts `input` into `output`.
    ///
    /// Open failures are returned before any frame is read. Once both ends
    /// are open, the sink is closed and then the source released whether the
    /// loop finished, hit an error or was cancelled. Partially written
    /// output is left in place on failure.
    pub fn run<B: MediaBackend>(
        &mut self,
        backend: &B,
        input: &Path,
        output: &Path,
    ) -> CoreResult<RedactionReport> {
        let started_at = Local::now();
        let timer = Instant::now();
        self.stage = PipelineStage::Idle;
        log::info!("Redacting {} -> {}", input.display(), output.display());

        let mut source = match backend.open_source(input) {
            Ok(source) => source,
            Err(e) => return Err(self.fail(e)),
        };
        let geometry = *source.geometry();
        self.transition(PipelineStage::Opened);
        log::info!(
            "Input: {}x{} @ {} fps, {} frame(s) {}",
            geometry.width,
            geometry.height,
            geometry.frame_rate,
            geometry
                .total_frames
                .map_or_else(|| "unknown".to_string(), |n| n.to_string()),
            if geometry.frame_count_estimated { "estimated" } else { "declared" }
        );

        let mut sink = match backend.open_sink(output, &geometry) {
            Ok(sink) => sink,
            Err(e) => {
                source.close();
                return Err(self.fail(e));
            }
        };
        self.transition(PipelineStage::Processing);

        let mut state = PipelineState::for_geometry(&geometry);
        let mut tally = FrameTally::default();
        let loop_result = self.process_frames(&mut source, &mut sink, &mut state, &mut tally);

        self.transition(PipelineStage::Finalizing);
        let close_result = sink.close();
        source.close();

        match (loop_result, close_result) {
            (Err(e), close_result) => {
                if let Err(close_err) = close_result {
                    log::warn!("Output could not be finalized after failure: {}", close_err);
                }
                return Err(self.fail(e));
            }
            (Ok(()), Err(e)) => return Err(self.fail(e)),
            (Ok(()), Ok(())) => {}
        }

        self.reporter.progress(
            state.finish(),
            &format!("Finished {} frame(s)", state.frames_processed()),
        );
        self.transition(PipelineStage::Done);

        let elapsed = timer.elapsed();
        log::info!(
            "Redacted {} region(s) in {} of {} frame(s) in {}",
            tally.regions_redacted,
            tally.frames_redacted,
            state.frames_processed(),
            format_duration(elapsed.as_secs_f64())
        );

        Ok(RedactionReport {
            input: input.to_path_buf(),
            output: output.to_path_buf(),
            geometry,
            frames_processed: state.frames_processed(),
            frames_redacted: tally.frames_redacted,
            regions_redacted: tally.regions_redacted,
            detection_failures: tally.detection_failures,
            started_at,
            elapsed,
            cleanup_warnings: Vec::new(),
        })
    }

    fn process_frames<S: FrameSource, K: FrameSink>(
        &mut self,
        source: &mut S,
        sink: &mut K,
        state: &mut PipelineState,
        tally: &mut FrameTally,
    ) -> CoreResult<()> {
        loop {
            if self
                .cancellation
                .as_ref()
                .is_some_and(CancellationToken::is_cancelled)
            {
                log::info!("Cancellation requested");
                return Err(CoreError::Cancelled {
                    frames_processed: state.frames_processed(),
                });
            }

            if state.budget_exhausted() {
                log::debug!(
                    "Declared frame count {} reached, stopping",
                    state.frames_processed()
                );
                return Ok(());
            }

            let Some(mut frame) = source.next_frame()? else {
                if let Some(total) = state.total_declared() {
                    if state.frames_processed() < total {
                        log::info!(
                            "Input ended after {} of {} declared frame(s)",
                            state.frames_processed(),
                            total
                        );
                    }
                }
                return Ok(());
            };

            let regions = self.detect_regions(&frame, tally)?;
            self.redact_frame(&mut frame, &regions, tally);
            sink.write_frame(&frame)?;

            let fraction = state.advance();
            self.reporter.progress(fraction, &state.message());
        }
    }

    /// Runs the detector and keeps the in-frame target regions, applying the
    /// failure policy when the detector errors.
    fn detect_regions(
        &mut self,
        frame: &Frame,
        tally: &mut FrameTally,
    ) -> CoreResult<Vec<RedactionRegion>> {
        let boxes = match self.detector.detect(frame) {
            Ok(boxes) => boxes,
            Err(source) => match self.failure_policy {
                DetectionFailurePolicy::Abort => {
                    return Err(CoreError::Detection {
                        frame_index: frame.index,
                        source,
                    });
                }
                DetectionFailurePolicy::PassThrough => {
                    tally.detection_failures += 1;
                    self.reporter.warning(&format!(
                        "Detection failed on frame {}, writing it unredacted: {}",
                        frame.index, source
                    ));
                    return Ok(Vec::new());
                }
            },
        };

        let regions = select_regions(
            &boxes,
            &self.targets,
            self.min_confidence,
            frame.width,
            frame.height,
        );
        log::trace!(
            "Frame {}: {} box(es), {} target region(s)",
            frame.index,
            boxes.len(),
            regions.len()
        );
        Ok(regions)
    }

    fn redact_frame(&self, frame: &mut Frame, regions: &[RedactionRegion], tally: &mut FrameTally) {
        for region in regions {
            self.redactor.redact(frame, region);
        }
        if !regions.is_empty() {
            tally.frames_redacted += 1;
            tally.regions_redacted += regions.len() as u64;
        }
    }

    fn transition(&mut self, next: PipelineStage) {
        log::info!("Pipeline stage: {} -> {}", self.stage, next);
        self.stage = next;
    }

    fn fail(&mut self, err: CoreError) -> CoreError {
        log::error!("Pipeline failed while {}: {}", self.stage, err);
        self.stage = PipelineStage::Errored;
        err
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::detection::{DetectionBox, DetectionError};
    use crate::frame::FrameRate;
    use crate::mocks::MemoryBackend;
    use crate::progress::NullProgressReporter;

    fn geometry(total: Option<u64>) -> VideoGeometry {
        VideoGeometry {
            width: 8,
            height: 6,
            frame_rate: FrameRate::from_fps(10),
            total_frames: total,
            frame_count_estimated: false,
        }
    }

    fn no_detections(_: &Frame) -> Result<Vec<DetectionBox>, DetectionError> {
        Ok(Vec::new())
    }

    fn frames(count: u64) -> Vec<Frame> {
        (0..count)
            .map(|i| Frame::filled(i, 8, 6, [i as u8, 0, 0]))
            .collect()
    }

    #[test]
    fn test_stage_done_after_success() {
        let backend = MemoryBackend::new(geometry(Some(3)), frames(3));
        let mut pipeline = RedactionPipeline::new(&CoreConfig::default(), no_detections)
            .unwrap()
            .with_reporter(Arc::new(NullProgressReporter));

        assert_eq!(pipeline.stage(), PipelineStage::Idle);
        let report = pipeline
            .run(&backend, Path::new("in.mp4"), Path::new("out.mp4"))
            .unwrap();
        assert_eq!(pipeline.stage(), PipelineStage::Done);
        assert_eq!(report.frames_processed, 3);
        assert_eq!(backend.written_frames().len(), 3);
    }

    #[test]
    fn test_detection_abort_is_errored() {
        let backend = MemoryBackend::new(geometry(Some(3)), frames(3));
        let failing = |frame: &Frame| -> Result<Vec<DetectionBox>, DetectionError> {
            if frame.index == 1 {
                Err(DetectionError::Model("model crashed".to_string()))
            } else {
                Ok(Vec::new())
            }
        };
        let mut pipeline = RedactionPipeline::new(&CoreConfig::default(), failing)
            .unwrap()
            .with_reporter(Arc::new(NullProgressReporter));

        let err = pipeline
            .run(&backend, Path::new("in.mp4"), Path::new("out.mp4"))
            .unwrap_err();
        assert!(matches!(err, CoreError::Detection { frame_index: 1, .. }));
        assert_eq!(pipeline.stage(), PipelineStage::Errored);
        assert_eq!(backend.written_frames().len(), 1);
        assert_eq!(
            backend.events(),
            vec!["source.open", "sink.open", "sink.close", "source.close"]
        );
    }

    #[test]
    fn test_detection_pass_through_counts_failures() {
        let backend = MemoryBackend::new(geometry(Some(3)), frames(3));
        let config = CoreConfig {
            detection_failure_policy: DetectionFailurePolicy::PassThrough,
            ..Default::default()
        };
        let flaky = |frame: &Frame| -> Result<Vec<DetectionBox>, DetectionError> {
            if frame.index == 1 {
                Err(DetectionError::Timeout(Duration::from_millis(5)))
            } else {
                Ok(vec![DetectionBox::new("person", 1.0, 0, 0, 4, 4)])
            }
        };
        let mut pipeline = RedactionPipeline::new(&config, flaky)
            .unwrap()
            .with_reporter(Arc::new(NullProgressReporter));

        let report = pipeline
            .run(&backend, Path::new("in.mp4"), Path::new("out.mp4"))
            .unwrap();
        assert_eq!(report.frames_processed, 3);
        assert_eq!(report.detection_failures, 1);
        assert_eq!(report.frames_redacted, 2);
        assert_eq!(backend.written_frames()[1], frames(3)[1]);
    }

    #[test]
    fn test_invalid_config_rejected_at_construction() {
        let config = CoreConfig {
            sigma: 0.0,
            ..Default::default()
        };
        let result = RedactionPipeline::new(&config, no_detections);
        assert!(matches!(result, Err(CoreError::Config(_))));
    }
}
