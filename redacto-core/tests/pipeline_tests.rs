// redacto-core/tests/pipeline_tests.rs
//
// Frame loop behaviour against the in-memory backend: frame count, order,
// geometry, progress reporting and resource release.

use redacto_core::mocks::{MemoryBackend, RecordingReporter, ScriptedDetector, noise_frame};
use redacto_core::pipeline::{CancellationToken, PipelineStage, RedactionPipeline};
use redacto_core::redaction::RedactionRegion;
use redacto_core::*;

use std::path::Path;
use std::sync::Arc;

// --- Test Helper Functions ---

fn geometry(total: Option<u64>) -> VideoGeometry {
    VideoGeometry {
        width: 64,
        height: 48,
        frame_rate: FrameRate::from_fps(30),
        total_frames: total,
        frame_count_estimated: false,
    }
}

fn noise_frames(count: u64) -> Vec<Frame> {
    (0..count).map(|i| noise_frame(i, 64, 48, 7)).collect()
}

fn person(x1: i64, y1: i64, x2: i64, y2: i64) -> DetectionBox {
    DetectionBox::new("person", 0.9, x1, y1, x2, y2)
}

fn run(
    backend: &MemoryBackend,
    detector: ScriptedDetector,
    config: &CoreConfig,
) -> (CoreResult<RedactionReport>, Arc<RecordingReporter>, PipelineStage) {
    let reporter = Arc::new(RecordingReporter::new());
    let mut pipeline = RedactionPipeline::new(config, detector)
        .unwrap()
        .with_reporter(reporter.clone());
    let result = pipeline.run(backend, Path::new("input.mp4"), Path::new("output.mp4"));
    (result, reporter, pipeline.stage())
}

fn region_variance(frame: &Frame, region: RedactionRegion) -> f64 {
    let mut values = Vec::new();
    for y in region.y..region.y + region.height {
        for x in region.x..region.x + region.width {
            values.extend(frame.pixel(x, y).unwrap().iter().map(|&v| f64::from(v)));
        }
    }
    let mean = values.iter().sum::<f64>() / values.len() as f64;
    values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / values.len() as f64
}

// --- Scenarios ---

#[test]
fn scenario_a_no_detections_passes_frames_through() {
    let frames = noise_frames(10);
    let backend = MemoryBackend::new(geometry(Some(10)), frames.clone());

    let (result, _, stage) = run(&backend, ScriptedDetector::new(), &CoreConfig::default());
    let report = result.unwrap();

    assert_eq!(stage, PipelineStage::Done);
    assert_eq!(report.frames_processed, 10);
    assert_eq!(report.frames_redacted, 0);
    assert_eq!(report.geometry, geometry(Some(10)));
    assert_eq!(backend.written_frames(), frames);
}

#[test]
fn scenario_b_only_detected_region_of_third_frame_changes() {
    let frames = noise_frames(5);
    let backend = MemoryBackend::new(geometry(Some(5)), frames.clone());
    let detector = ScriptedDetector::new().with_boxes(2, vec![person(10, 10, 30, 30)]);

    let (result, _, _) = run(&backend, detector, &CoreConfig::default());
    let report = result.unwrap();
    assert_eq!(report.frames_redacted, 1);
    assert_eq!(report.regions_redacted, 1);

    let written = backend.written_frames();
    assert_eq!(written.len(), 5);
    for index in [0, 1, 3, 4] {
        assert_eq!(written[index], frames[index], "frame {index} must be untouched");
    }

    let region = RedactionRegion {
        x: 10,
        y: 10,
        width: 20,
        height: 20,
    };
    let mut changed_inside = 0;
    for y in 0..48 {
        for x in 0..64 {
            let before = frames[2].pixel(x, y);
            let after = written[2].pixel(x, y);
            if region.contains(x, y) {
                if before != after {
                    changed_inside += 1;
                }
            } else {
                assert_eq!(before, after, "pixel ({x}, {y}) outside the box changed");
            }
        }
    }
    assert!(changed_inside > 380, "only {changed_inside} of 400 pixels changed");
}

#[test]
fn scenario_c_unreadable_input_creates_no_output() {
    let backend = MemoryBackend::new(geometry(Some(5)), noise_frames(5)).with_failing_source_open();
    let detector = ScriptedDetector::new();
    let calls = detector.clone();

    let (result, reporter, stage) = run(&backend, detector, &CoreConfig::default());

    assert!(result.unwrap_err().is_open_error());
    assert_eq!(stage, PipelineStage::Errored);
    assert!(backend.sink_path().is_none());
    assert!(backend.events().is_empty());
    assert!(calls.calls().is_empty());
    assert!(reporter.updates().is_empty());
}

#[test]
fn scenario_d_early_end_of_stream_is_not_an_error() {
    let backend = MemoryBackend::new(geometry(Some(100)), noise_frames(60));

    let (result, reporter, stage) = run(&backend, ScriptedDetector::new(), &CoreConfig::default());
    let report = result.unwrap();

    assert_eq!(stage, PipelineStage::Done);
    assert_eq!(report.frames_processed, 60);
    assert_eq!(backend.written_frames().len(), 60);
    let fractions = reporter.fractions();
    assert_eq!(fractions.last().copied(), Some(1.0));
    assert!((fractions[59] - 0.6).abs() < 1e-9);
}

#[test]
fn scenario_e_overlapping_boxes_blur_the_union() {
    let frames = noise_frames(1);
    let backend = MemoryBackend::new(geometry(Some(1)), frames.clone());
    let detector = ScriptedDetector::new()
        .with_boxes(0, vec![person(10, 10, 30, 30), person(20, 20, 40, 40)]);

    let (result, _, _) = run(&backend, detector, &CoreConfig::default());
    assert_eq!(result.unwrap().regions_redacted, 2);

    let written = &backend.written_frames()[0];
    let first = RedactionRegion {
        x: 10,
        y: 10,
        width: 20,
        height: 20,
    };
    let second = RedactionRegion {
        x: 20,
        y: 20,
        width: 20,
        height: 20,
    };

    for region in [first, second] {
        let before = region_variance(&frames[0], region);
        let after = region_variance(written, region);
        assert!(after < before * 0.05, "variance {before} -> {after}");
    }

    let mut union = 0;
    let mut changed = 0;
    for y in 0..48 {
        for x in 0..64 {
            let inside = first.contains(x, y) || second.contains(x, y);
            let same = frames[0].pixel(x, y) == written.pixel(x, y);
            if inside {
                union += 1;
                if !same {
                    changed += 1;
                }
            } else {
                assert!(same, "pixel ({x}, {y}) outside both boxes changed");
            }
        }
    }
    assert!(changed * 100 >= union * 95, "{changed} of {union} union pixels changed");
}

// --- Properties ---

#[test]
fn frames_keep_order_and_geometry() {
    let frames = noise_frames(8);
    let backend = MemoryBackend::new(geometry(Some(8)), frames);
    let detector = ScriptedDetector::new().with_boxes(4, vec![person(0, 0, 64, 48)]);
    let calls = detector.clone();

    let (result, _, _) = run(&backend, detector, &CoreConfig::default());
    result.unwrap();

    let written = backend.written_frames();
    let indices: Vec<u64> = written.iter().map(|f| f.index).collect();
    assert_eq!(indices, (0..8).collect::<Vec<_>>());
    assert!(written.iter().all(|f| f.width == 64 && f.height == 48));
    assert_eq!(calls.calls(), (0..8).collect::<Vec<_>>());
}

#[test]
fn progress_is_monotonic_and_ends_at_one() {
    let backend = MemoryBackend::new(geometry(Some(4)), noise_frames(4));

    let (result, reporter, _) = run(&backend, ScriptedDetector::new(), &CoreConfig::default());
    result.unwrap();

    let updates = reporter.updates();
    assert_eq!(updates.len(), 5);
    assert_eq!(updates[0].1, "Processing frame 1 of 4");
    assert_eq!(updates[3].1, "Processing frame 4 of 4");
    let fractions = reporter.fractions();
    assert!(fractions.windows(2).all(|pair| pair[0] <= pair[1]));
    assert!(fractions.iter().all(|f| (0.0..=1.0).contains(f)));
    assert_eq!(fractions.last().copied(), Some(1.0));
}

#[test]
fn unknown_total_reports_zero_until_done() {
    let backend = MemoryBackend::new(geometry(None), noise_frames(3));

    let (result, reporter, _) = run(&backend, ScriptedDetector::new(), &CoreConfig::default());
    assert_eq!(result.unwrap().frames_processed, 3);

    let updates = reporter.updates();
    assert_eq!(updates[0], (0.0, "Processing frame 1".to_string()));
    assert_eq!(updates[2].0, 0.0);
    assert_eq!(updates.last().map(|u| u.0), Some(1.0));
}

#[test]
fn declared_budget_stops_the_loop() {
    let backend = MemoryBackend::new(geometry(Some(3)), noise_frames(5));

    let (result, _, _) = run(&backend, ScriptedDetector::new(), &CoreConfig::default());
    assert_eq!(result.unwrap().frames_processed, 3);
    assert_eq!(backend.written_frames().len(), 3);
}

#[test]
fn estimated_total_below_actual_keeps_every_frame() {
    // Duration x rate rounded down by one frame, as for 10 s at 30000/1001.
    let estimated = VideoGeometry {
        frame_count_estimated: true,
        ..geometry(Some(4))
    };
    let backend = MemoryBackend::new(estimated, noise_frames(5));

    let (result, reporter, _) = run(&backend, ScriptedDetector::new(), &CoreConfig::default());
    assert_eq!(result.unwrap().frames_processed, 5);
    assert_eq!(backend.written_frames().len(), 5);

    let updates = reporter.updates();
    assert_eq!(updates[4], (1.0, "Processing frame 5 of ~4".to_string()));
    assert!(reporter.fractions().windows(2).all(|pair| pair[0] <= pair[1]));
}

#[test]
fn sink_closed_before_source_on_success() {
    let backend = MemoryBackend::new(geometry(Some(2)), noise_frames(2));

    let (result, _, _) = run(&backend, ScriptedDetector::new(), &CoreConfig::default());
    result.unwrap();
    assert_eq!(
        backend.events(),
        vec!["source.open", "sink.open", "sink.close", "source.close"]
    );
}

#[test]
fn create_failure_releases_source() {
    let backend = MemoryBackend::new(geometry(Some(2)), noise_frames(2)).with_failing_sink_open();

    let (result, _, stage) = run(&backend, ScriptedDetector::new(), &CoreConfig::default());
    assert!(matches!(result, Err(CoreError::Create { .. })));
    assert_eq!(stage, PipelineStage::Errored);
    assert_eq!(backend.events(), vec!["source.open", "source.close"]);
}

#[test]
fn decode_failure_mid_stream_still_releases_everything() {
    let backend = MemoryBackend::new(geometry(Some(5)), noise_frames(5)).with_decode_error_at(3);

    let (result, _, stage) = run(&backend, ScriptedDetector::new(), &CoreConfig::default());
    assert!(matches!(result, Err(CoreError::OperationFailed(_))));
    assert_eq!(stage, PipelineStage::Errored);
    assert_eq!(backend.written_frames().len(), 3);
    assert_eq!(
        backend.events(),
        vec!["source.open", "sink.open", "sink.close", "source.close"]
    );
}

#[test]
fn encode_failure_on_close_is_reported() {
    let backend = MemoryBackend::new(geometry(Some(2)), noise_frames(2)).with_failing_sink_close();

    let (result, reporter, stage) = run(&backend, ScriptedDetector::new(), &CoreConfig::default());
    assert!(matches!(result, Err(CoreError::Encode { .. })));
    assert_eq!(stage, PipelineStage::Errored);
    let updates = reporter.updates();
    assert_eq!(updates.len(), 2);
    assert!(updates.iter().all(|(_, message)| message.starts_with("Processing")));
    assert_eq!(backend.events().last().map(String::as_str), Some("source.close"));
}

#[test]
fn mismatched_frame_is_a_write_error() {
    let mut frames = noise_frames(3);
    frames[1] = noise_frame(1, 32, 48, 7);
    let backend = MemoryBackend::new(geometry(Some(3)), frames);

    let (result, _, _) = run(&backend, ScriptedDetector::new(), &CoreConfig::default());
    assert!(matches!(result, Err(CoreError::Write { frame_index: 1, .. })));
    assert_eq!(backend.written_frames().len(), 1);
}

#[test]
fn detection_failure_aborts_by_default() {
    let backend = MemoryBackend::new(geometry(Some(4)), noise_frames(4));
    let detector = ScriptedDetector::new().failing_on(2);

    let (result, _, _) = run(&backend, detector, &CoreConfig::default());
    assert!(matches!(result, Err(CoreError::Detection { frame_index: 2, .. })));
    assert_eq!(backend.written_frames().len(), 2);
}

#[test]
fn detection_failure_pass_through_writes_frame_unredacted() {
    let frames = noise_frames(4);
    let backend = MemoryBackend::new(geometry(Some(4)), frames.clone());
    let detector = ScriptedDetector::new()
        .failing_on(2)
        .with_boxes(3, vec![person(0, 0, 16, 16)]);
    let config = CoreConfigBuilder::new()
        .detection_failure_policy(DetectionFailurePolicy::PassThrough)
        .build();

    let (result, reporter, _) = run(&backend, detector, &config);
    let report = result.unwrap();

    assert_eq!(report.frames_processed, 4);
    assert_eq!(report.detection_failures, 1);
    assert_eq!(report.frames_redacted, 1);
    assert_eq!(backend.written_frames()[2], frames[2]);
    assert_eq!(reporter.warnings().len(), 1);
    assert!(reporter.warnings()[0].contains("frame 2"));
}

#[test]
fn non_target_and_low_confidence_boxes_are_ignored() {
    let frames = noise_frames(2);
    let backend = MemoryBackend::new(geometry(Some(2)), frames.clone());
    let detector = ScriptedDetector::new()
        .with_boxes(0, vec![DetectionBox::new("car", 0.99, 0, 0, 64, 48)])
        .with_boxes(1, vec![DetectionBox::new("person", 0.1, 0, 0, 64, 48)]);
    let config = CoreConfigBuilder::new().min_confidence(0.5).build();

    let (result, _, _) = run(&backend, detector, &config);
    assert_eq!(result.unwrap().frames_redacted, 0);
    assert_eq!(backend.written_frames(), frames);
}

#[test]
fn custom_target_class_is_redacted() {
    let frames = noise_frames(1);
    let backend = MemoryBackend::new(geometry(Some(1)), frames.clone());
    let detector = ScriptedDetector::new().with_boxes(
        0,
        vec![
            DetectionBox::new("Face", 0.8, 5, 5, 25, 25),
            person(30, 10, 50, 30),
        ],
    );
    let config = CoreConfigBuilder::new().target_classes(["face"]).build();

    let (result, _, _) = run(&backend, detector, &config);
    assert_eq!(result.unwrap().regions_redacted, 1);
    let written = &backend.written_frames()[0];
    assert_eq!(written.pixel(40, 20), frames[0].pixel(40, 20));
}

#[test]
fn out_of_frame_and_empty_boxes_leave_frame_unchanged() {
    let frames = noise_frames(1);
    let backend = MemoryBackend::new(geometry(Some(1)), frames.clone());
    let detector = ScriptedDetector::new().with_boxes(
        0,
        vec![
            person(70, 10, 90, 20),
            person(10, 10, 10, 40),
            person(30, 30, 20, 20),
        ],
    );

    let (result, _, _) = run(&backend, detector, &CoreConfig::default());
    assert_eq!(result.unwrap().regions_redacted, 0);
    assert_eq!(backend.written_frames(), frames);
}

#[test]
fn cancellation_stops_and_releases() {
    let backend = MemoryBackend::new(geometry(Some(5)), noise_frames(5));
    let token = CancellationToken::new();
    token.cancel();

    let mut pipeline = RedactionPipeline::new(&CoreConfig::default(), ScriptedDetector::new())
        .unwrap()
        .with_reporter(Arc::new(NullProgressReporter))
        .with_cancellation(token);
    let result = pipeline.run(&backend, Path::new("in.mp4"), Path::new("out.mp4"));

    assert!(matches!(result, Err(CoreError::Cancelled { frames_processed: 0 })));
    assert_eq!(pipeline.stage(), PipelineStage::Errored);
    assert!(backend.written_frames().is_empty());
    assert_eq!(
        backend.events(),
        vec!["source.open", "sink.open", "sink.close", "source.close"]
    );
}

#[test]
fn pipeline_can_run_twice_with_the_same_detector() {
    let detector = ScriptedDetector::new();
    let calls = detector.clone();
    let mut pipeline = RedactionPipeline::new(&CoreConfig::default(), detector)
        .unwrap()
        .with_reporter(Arc::new(NullProgressReporter));

    for _ in 0..2 {
        let backend = MemoryBackend::new(geometry(Some(2)), noise_frames(2));
        pipeline
            .run(&backend, Path::new("in.mp4"), Path::new("out.mp4"))
            .unwrap();
    }
    assert_eq!(calls.calls(), vec![0, 1, 0, 1]);
}
