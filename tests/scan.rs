//! End-to-end scans over synthetic footage.
//!
//! The fixture is a 577-frame clip with three motion spans; the counting
//! detector scores it deterministically, so event boundaries are exact.

use std::sync::atomic::AtomicBool;

use motion_scan::ingest::{FrameSource, SyntheticVideo, VideoInput};
use motion_scan::output::FrameSink;
use motion_scan::reporter::NullReporter;
use motion_scan::scan::{MotionScanner, ScanResult};
use motion_scan::time::FrameTimecode;
use motion_scan::{
    DetectionParams, DetectorType, EventParams, Frame, KernelSize, MotionEvent, ScanError,
};

const SPANS: [(u64, u64); 3] = [(9, 148), (358, 490), (542, 576)];
const TOTAL_FRAMES: u64 = 577;

fn fixture() -> SyntheticVideo {
    let mut video = SyntheticVideo::new(64, 48, 30.0, TOTAL_FRAMES);
    for (start, end) in SPANS {
        video = video.with_motion(start, end);
    }
    video
}

fn detection(detector: DetectorType) -> DetectionParams {
    DetectionParams {
        detector,
        threshold: 0.1,
        kernel_size: KernelSize::Auto,
        downscale_factor: 1,
    }
}

fn events(min_event_len: u64, pre: u64, post: u64) -> EventParams {
    EventParams {
        min_event_len,
        time_pre_event: pre,
        time_post_event: post,
    }
}

fn run_scan(
    inputs: Vec<Box<dyn VideoInput>>,
    trim: (Option<u64>, Option<u64>),
    frame_skip: u64,
    detection: DetectionParams,
    event_params: EventParams,
    sink: Option<&mut dyn FrameSink>,
) -> ScanResult {
    let mut source = FrameSource::new(inputs, trim, frame_skip).unwrap();
    let scanner = MotionScanner::new(detection, event_params).unwrap();
    scanner
        .scan(&mut source, &NullReporter, &AtomicBool::new(false), sink)
        .unwrap()
}

#[test]
fn finds_all_motion_spans() {
    let result = run_scan(
        vec![Box::new(fixture())],
        (None, None),
        1,
        detection(DetectorType::Counting),
        events(2, 0, 0),
        None,
    );
    assert_eq!(
        result.events,
        vec![
            MotionEvent { start: 9, end: 148 },
            MotionEvent { start: 358, end: 490 },
            MotionEvent { start: 542, end: 576 },
        ]
    );
    assert_eq!(result.frames_read, TOTAL_FRAMES);
    assert_eq!(result.decode_failures, 0);
}

#[test]
fn pre_event_padding_shifts_starts() {
    let result = run_scan(
        vec![Box::new(fixture())],
        (None, None),
        1,
        detection(DetectorType::Counting),
        events(2, 6, 0),
        None,
    );
    let starts: Vec<u64> = result.events.iter().map(|e| e.start).collect();
    assert_eq!(starts, vec![3, 352, 536]);
}

#[test]
fn post_event_padding_extends_ends_and_clamps_to_footage() {
    let result = run_scan(
        vec![Box::new(fixture())],
        (None, None),
        1,
        detection(DetectorType::Counting),
        events(2, 0, 40),
        None,
    );
    assert_eq!(
        result.events,
        vec![
            MotionEvent { start: 9, end: 188 },
            MotionEvent { start: 358, end: 530 },
            // the last span runs to the end of the footage
            MotionEvent { start: 542, end: 576 },
        ]
    );
}

#[test]
fn trim_window_selects_contained_events() {
    let result = run_scan(
        vec![Box::new(fixture())],
        (Some(200), Some(500)),
        1,
        detection(DetectorType::Counting),
        events(2, 0, 0),
        None,
    );
    assert_eq!(
        result.events,
        vec![MotionEvent { start: 358, end: 490 }]
    );
}

#[test]
fn min_event_len_drops_short_blips() {
    let video = SyntheticVideo::new(64, 48, 30.0, 400)
        .with_motion(9, 148)
        .with_motion(200, 210)
        .with_motion(300, 390);
    let result = run_scan(
        vec![Box::new(video)],
        (None, None),
        1,
        detection(DetectorType::Counting),
        events(30, 0, 0),
        None,
    );
    let starts: Vec<u64> = result.events.iter().map(|e| e.start).collect();
    assert_eq!(starts, vec![9, 300]);
}

#[test]
fn corrupt_stretch_is_bridged_by_frame_repeat() {
    let video = fixture().with_corrupt(100, 110);
    let result = run_scan(
        vec![Box::new(video)],
        (None, None),
        1,
        detection(DetectorType::Counting),
        events(2, 0, 0),
        None,
    );
    assert_eq!(result.decode_failures, 11);
    assert_eq!(result.events.len(), 3);
    // the event containing the corrupt stretch keeps its true bounds
    assert_eq!(result.events[0], MotionEvent { start: 9, end: 148 });
}

#[test]
fn frame_skip_keeps_boundaries_within_one_stride() {
    for skip in 1..=5u64 {
        let result = run_scan(
            vec![Box::new(fixture())],
            (None, None),
            skip,
            detection(DetectorType::Counting),
            events(2, 0, 0),
            None,
        );
        assert_eq!(result.events.len(), 3, "frame_skip={}", skip);
        for (event, (start, end)) in result.events.iter().zip(SPANS) {
            assert!(
                event.start.abs_diff(start) <= skip,
                "frame_skip={} start {} vs {}",
                skip,
                event.start,
                start
            );
            assert!(
                event.end.abs_diff(end) <= skip,
                "frame_skip={} end {} vs {}",
                skip,
                event.end,
                end
            );
        }
    }
}

#[test]
fn sampled_scan_never_ends_before_the_baseline() {
    let video = || SyntheticVideo::new(64, 48, 30.0, 200).with_motion(50, 98);
    let baseline = run_scan(
        vec![Box::new(video())],
        (None, None),
        1,
        detection(DetectorType::Counting),
        events(2, 0, 10),
        None,
    );
    let skipped = run_scan(
        vec![Box::new(video())],
        (None, None),
        5,
        detection(DetectorType::Counting),
        events(2, 0, 10),
        None,
    );
    assert_eq!(baseline.events.len(), 1);
    assert_eq!(baseline.events[0].end, 108);
    assert_eq!(skipped.events.len(), 1);
    assert!(skipped.events[0].start >= baseline.events[0].start);
    assert!(skipped.events[0].end >= baseline.events[0].end);
    assert!(skipped.events[0].end - baseline.events[0].end <= 5);
}

#[test]
fn repeated_scans_report_identical_events() {
    let scan = || {
        run_scan(
            vec![Box::new(fixture())],
            (None, None),
            1,
            detection(DetectorType::Counting),
            events(2, 6, 40),
            None,
        )
    };
    let first = scan();
    let second = scan();
    assert_eq!(first.events, second.events);
    assert_eq!(first.frames_read, second.frames_read);
    assert_eq!(first.frames_scored, second.frames_scored);
}

#[test]
fn adaptive_backend_agrees_on_event_onsets() {
    let result = run_scan(
        vec![Box::new(fixture())],
        (None, None),
        1,
        detection(DetectorType::Adaptive),
        events(2, 0, 40),
        None,
    );
    assert_eq!(result.events.len(), 3);
    // after a long quiet stretch the variance model relaxes slowly, so an
    // onset can lag the dark half of the block cycle (4 frames)
    for (event, (start, _)) in result.events.iter().zip(SPANS) {
        assert!(
            event.start.abs_diff(start) <= 5,
            "onset {} vs {}",
            event.start,
            start
        );
        assert!(event.end >= event.start);
    }
}

#[test]
fn concatenated_inputs_share_one_timeline() {
    // motion crosses the file boundary at frame 300
    let first = SyntheticVideo::new(64, 48, 30.0, 300).with_motion(280, 299);
    let second = SyntheticVideo::new(64, 48, 30.0, 277)
        .with_motion(0, 20)
        .with_motion(58, 190);
    let result = run_scan(
        vec![Box::new(first), Box::new(second)],
        (None, None),
        1,
        detection(DetectorType::Counting),
        events(2, 0, 0),
        None,
    );
    assert_eq!(
        result.events,
        vec![
            MotionEvent { start: 280, end: 320 },
            MotionEvent { start: 358, end: 490 },
        ]
    );
}

#[derive(Default)]
struct RecordingSink {
    started: Vec<FrameTimecode>,
    frames: Vec<u64>,
    finished: Vec<MotionEvent>,
}

impl FrameSink for RecordingSink {
    fn event_started(&mut self, start: FrameTimecode) -> Result<(), ScanError> {
        self.started.push(start);
        Ok(())
    }

    fn write_frame(&mut self, frame: &Frame) -> Result<(), ScanError> {
        self.frames.push(frame.frame_num);
        Ok(())
    }

    fn event_finished(&mut self, event: &MotionEvent) -> Result<(), ScanError> {
        self.finished.push(*event);
        Ok(())
    }
}

#[test]
fn export_receives_every_padded_frame() {
    let video = SyntheticVideo::new(64, 48, 30.0, 200).with_motion(50, 100);
    let mut sink = RecordingSink::default();
    let result = run_scan(
        vec![Box::new(video)],
        (None, None),
        1,
        detection(DetectorType::Counting),
        events(2, 6, 10),
        Some(&mut sink),
    );
    assert_eq!(result.events, vec![MotionEvent { start: 44, end: 110 }]);
    assert!(result.export_error.is_none());
    assert_eq!(sink.started.len(), 1);
    assert_eq!(sink.started[0].frame_num, 44);
    assert_eq!(sink.finished, result.events);
    let expected: Vec<u64> = (44..=110).collect();
    assert_eq!(sink.frames, expected);
}

#[test]
fn export_walks_every_frame_despite_skip() {
    let video = SyntheticVideo::new(64, 48, 30.0, 200).with_motion(50, 100);
    let mut sink = RecordingSink::default();
    let result = run_scan(
        vec![Box::new(video)],
        (None, None),
        5,
        detection(DetectorType::Counting),
        events(2, 0, 0),
        Some(&mut sink),
    );
    // the end lands within one stride past the true span, never before it
    assert_eq!(result.events, vec![MotionEvent { start: 50, end: 104 }]);
    // clip frames are contiguous even though only every 5th frame was scored
    let expected: Vec<u64> = (50..=104).collect();
    assert_eq!(sink.frames, expected);
}

#[test]
fn failing_sink_aborts_export_but_not_the_scan() {
    struct FailingSink;
    impl FrameSink for FailingSink {
        fn event_started(&mut self, _start: FrameTimecode) -> Result<(), ScanError> {
            Err(ScanError::output("disk full"))
        }
        fn write_frame(&mut self, _frame: &Frame) -> Result<(), ScanError> {
            Ok(())
        }
        fn event_finished(&mut self, _event: &MotionEvent) -> Result<(), ScanError> {
            Ok(())
        }
    }
    let mut sink = FailingSink;
    let result = run_scan(
        vec![Box::new(fixture())],
        (None, None),
        1,
        detection(DetectorType::Counting),
        events(2, 0, 0),
        Some(&mut sink),
    );
    assert_eq!(result.events.len(), 3);
    assert!(result.export_error.is_some());
}
