//! Event extraction from the per-frame score stream.
//!
//! A hysteresis state machine turns above/below-threshold samples into
//! padded, non-overlapping events. Sample classes are skip-normalized: with
//! a frame-skip stride of `k`, each sampled frame stands for `k` frames of
//! its class, so run lengths are counted in timeline frames regardless of
//! sampling density.
//!
//! Rules, with all positions as inclusive global frame numbers:
//! - An event triggers once an unbroken above-threshold run accumulates
//!   `min_event_len` frames. Its start is the first frame of that run minus
//!   `time_pre_event`, clamped to the scan window start and to one past the
//!   previous event's end.
//! - An open event closes once a below-threshold run accumulates
//!   `time_post_event` frames (immediately when the padding is zero). Its
//!   end is the last frame attributed above threshold (the last above
//!   sample plus the remainder of its stride) plus `time_post_event`, so a
//!   sampled scan never reports an earlier end than a full-density scan.
//!   Gaps shorter than the padding merge into one event.
//! - End of stream force-closes an open event. Ends are clamped to the last
//!   frame actually read, so an event never extends past the footage.

use crate::error::ScanError;
use crate::time::FrameTimecode;

/// One detected motion event, inclusive on both ends, in global frame
/// numbers.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct MotionEvent {
    pub start: u64,
    pub end: u64,
}

impl MotionEvent {
    pub fn len(&self) -> u64 {
        self.end - self.start + 1
    }

    pub fn start_timecode(&self, frame_rate: f64) -> FrameTimecode {
        FrameTimecode::new(self.start, frame_rate)
    }

    /// Timecode of the frame after the event, matching the convention that
    /// a duration covers `len()` full frame periods.
    pub fn end_timecode(&self, frame_rate: f64) -> FrameTimecode {
        FrameTimecode::new(self.end + 1, frame_rate)
    }
}

/// Event shaping parameters, all in frames of the source timeline.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct EventParams {
    /// Frames of sustained motion required before an event triggers.
    pub min_event_len: u64,
    /// Padding prepended before the triggering motion.
    pub time_pre_event: u64,
    /// Padding appended after the last motion; also the merge distance.
    pub time_post_event: u64,
}

impl EventParams {
    pub fn validate(&self) -> Result<(), ScanError> {
        if self.min_event_len == 0 {
            return Err(ScanError::config("min event length must be >= 1"));
        }
        Ok(())
    }
}

impl Default for EventParams {
    fn default() -> Self {
        Self {
            min_event_len: 2,
            time_pre_event: 0,
            time_post_event: 0,
        }
    }
}

enum State {
    Quiet { run_start: u64, run_frames: u64 },
    InEvent { start: u64, last_above: u64, below_frames: u64 },
}

pub struct EventStateMachine {
    params: EventParams,
    frame_skip: u64,
    window_start: u64,
    state: State,
    events: Vec<MotionEvent>,
}

impl EventStateMachine {
    pub fn new(params: EventParams, frame_skip: u64, window_start: u64) -> Self {
        Self {
            params,
            frame_skip: frame_skip.max(1),
            window_start,
            state: State::Quiet {
                run_start: 0,
                run_frames: 0,
            },
            events: Vec::new(),
        }
    }

    /// Events closed so far; an open run is not included until it closes
    /// (or `finish` force-closes it).
    pub fn events(&self) -> &[MotionEvent] {
        &self.events
    }

    /// Feed one sampled frame. `frame_num` values must be strictly
    /// increasing across calls.
    pub fn process(&mut self, frame_num: u64, above_threshold: bool) {
        match &mut self.state {
            State::Quiet {
                run_start,
                run_frames,
            } => {
                if !above_threshold {
                    *run_frames = 0;
                    return;
                }
                if *run_frames == 0 {
                    *run_start = frame_num;
                }
                *run_frames += self.frame_skip;
                if *run_frames >= self.params.min_event_len {
                    let mut start = run_start.saturating_sub(self.params.time_pre_event);
                    start = start.max(self.window_start);
                    if let Some(prev) = self.events.last() {
                        start = start.max(prev.end + 1);
                    }
                    self.state = State::InEvent {
                        start,
                        last_above: frame_num,
                        below_frames: 0,
                    };
                }
            }
            State::InEvent {
                last_above,
                below_frames,
                start,
            } => {
                if above_threshold {
                    *last_above = frame_num;
                    *below_frames = 0;
                    return;
                }
                *below_frames += self.frame_skip;
                if *below_frames >= self.params.time_post_event.max(1) {
                    let event = MotionEvent {
                        start: *start,
                        end: *last_above + self.frame_skip - 1 + self.params.time_post_event,
                    };
                    self.events.push(event);
                    self.state = State::Quiet {
                        run_start: 0,
                        run_frames: 0,
                    };
                }
            }
        }
    }

    /// End of stream. `timeline_end` is one past the last frame read; an
    /// open event is closed and clamped so it never reports footage that
    /// does not exist.
    pub fn finish(mut self, timeline_end: u64) -> Vec<MotionEvent> {
        if let State::InEvent {
            start, last_above, ..
        } = self.state
        {
            let end = (last_above + self.frame_skip - 1 + self.params.time_post_event)
                .min(timeline_end.saturating_sub(1));
            self.events.push(MotionEvent { start, end });
        } else if let Some(last) = self.events.last_mut() {
            last.end = last.end.min(timeline_end.saturating_sub(1));
        }
        self.events
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn run(
        params: EventParams,
        frame_skip: u64,
        window_start: u64,
        samples: &[(u64, bool)],
        timeline_end: u64,
    ) -> Vec<MotionEvent> {
        let mut machine = EventStateMachine::new(params, frame_skip, window_start);
        for &(n, above) in samples {
            machine.process(n, above);
        }
        machine.finish(timeline_end)
    }

    fn scripted(spans: &[(u64, u64)], total: u64) -> Vec<(u64, bool)> {
        (0..total)
            .map(|n| (n, spans.iter().any(|&(a, b)| n >= a && n <= b)))
            .collect()
    }

    #[test]
    fn detects_basic_spans() {
        let samples = scripted(&[(9, 148), (358, 490)], 600);
        let events = run(EventParams::default(), 1, 0, &samples, 600);
        assert_eq!(
            events,
            vec![
                MotionEvent { start: 9, end: 148 },
                MotionEvent { start: 358, end: 490 },
            ]
        );
    }

    #[test]
    fn short_blips_are_ignored() {
        let params = EventParams {
            min_event_len: 4,
            ..Default::default()
        };
        let samples = scripted(&[(10, 12), (50, 60)], 100);
        let events = run(params, 1, 0, &samples, 100);
        assert_eq!(events, vec![MotionEvent { start: 50, end: 60 }]);
    }

    #[test]
    fn pre_event_padding_extends_start() {
        let params = EventParams {
            time_pre_event: 6,
            ..Default::default()
        };
        let samples = scripted(&[(9, 148)], 200);
        let events = run(params, 1, 0, &samples, 200);
        assert_eq!(events, vec![MotionEvent { start: 3, end: 148 }]);
    }

    #[test]
    fn pre_event_padding_clamps_to_window_start() {
        let params = EventParams {
            time_pre_event: 20,
            ..Default::default()
        };
        let samples = scripted(&[(9, 50)], 100);
        let events = run(params, 1, 0, &samples, 100);
        assert_eq!(events[0].start, 0);
        let events = run(params, 1, 5, &scripted(&[(9, 50)], 100), 100);
        assert_eq!(events[0].start, 5);
    }

    #[test]
    fn post_event_padding_extends_end_and_merges_gaps() {
        let params = EventParams {
            time_post_event: 40,
            ..Default::default()
        };
        // gap of 30 frames, below the padding: one event
        let samples = scripted(&[(10, 50), (81, 120)], 300);
        let events = run(params, 1, 0, &samples, 300);
        assert_eq!(events, vec![MotionEvent { start: 10, end: 160 }]);
        // gap of 60 frames: two events
        let samples = scripted(&[(10, 50), (111, 150)], 300);
        let events = run(params, 1, 0, &samples, 300);
        assert_eq!(
            events,
            vec![
                MotionEvent { start: 10, end: 90 },
                MotionEvent { start: 111, end: 190 },
            ]
        );
    }

    #[test]
    fn end_clamps_to_footage() {
        let params = EventParams {
            time_post_event: 40,
            ..Default::default()
        };
        let samples = scripted(&[(542, 576)], 577);
        let events = run(params, 1, 0, &samples, 577);
        assert_eq!(events, vec![MotionEvent { start: 542, end: 576 }]);
    }

    #[test]
    fn events_never_overlap() {
        let params = EventParams {
            time_pre_event: 50,
            time_post_event: 5,
            ..Default::default()
        };
        let samples = scripted(&[(100, 120), (140, 160)], 300);
        let events = run(params, 1, 0, &samples, 300);
        assert_eq!(events.len(), 2);
        assert_eq!(events[0].end, 125);
        assert_eq!(events[1].start, 126);
    }

    #[test]
    fn frame_skip_attributes_whole_strides() {
        // stride 5: samples at 0,5,10,...; motion 12..=33 is seen at
        // 15,20,25,30 only
        let params = EventParams {
            min_event_len: 10,
            ..Default::default()
        };
        let samples: Vec<(u64, bool)> = (0..20)
            .map(|i| {
                let n = i * 5;
                (n, (12..=33).contains(&n))
            })
            .collect();
        let events = run(params, 5, 0, &samples, 100);
        assert_eq!(events.len(), 1);
        // boundaries land within one stride of the true span
        assert!(events[0].start.abs_diff(12) <= 5);
        assert!(events[0].end.abs_diff(33) <= 5);
    }

    #[test]
    fn skipped_end_never_under_reports_the_baseline() {
        let params = EventParams {
            time_post_event: 10,
            ..Default::default()
        };
        let baseline = run(params, 1, 0, &scripted(&[(12, 33)], 100), 100);
        let samples: Vec<(u64, bool)> = (0..20)
            .map(|i| {
                let n = i * 5;
                (n, (12..=33).contains(&n))
            })
            .collect();
        let skipped = run(params, 5, 0, &samples, 100);
        assert_eq!(baseline.len(), 1);
        assert_eq!(skipped.len(), 1);
        assert!(skipped[0].start >= baseline[0].start);
        assert!(skipped[0].end >= baseline[0].end);
        assert!(skipped[0].end - baseline[0].end <= 5);
    }

    #[test]
    fn open_event_closes_at_end_of_stream() {
        let samples = scripted(&[(90, 99)], 100);
        let events = run(EventParams::default(), 1, 0, &samples, 100);
        assert_eq!(events, vec![MotionEvent { start: 90, end: 99 }]);
    }

    #[test]
    fn zero_min_event_len_is_rejected() {
        let params = EventParams {
            min_event_len: 0,
            ..Default::default()
        };
        assert!(params.validate().is_err());
    }
}
