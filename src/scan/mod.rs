//! The scan pipeline.
//!
//! `MotionScanner` ties the pieces together: it pulls sampled frames from a
//! `FrameSource`, converts each to a working luma image, scores it with the
//! configured detector, and feeds the above/below-threshold stream into the
//! event state machine. Export is a second pass: once the event list is
//! known, the source is re-seeked into each event range and every frame of
//! `[start, end]` is walked into the sink at full density, so detection-time
//! frame skipping never leaves gaps in exported clips.
//!
//! Scoring runs in lanes. The aggregate policy uses one lane whose mask is
//! the union of all regions; the per-region policy runs one independent
//! detector and state machine per region and merges the per-region events
//! into the combined list (which is also what an export walks).

pub mod events;

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

pub use events::{EventParams, EventStateMachine, MotionEvent};

use crate::detect::DetectionParams;
use crate::error::ScanError;
use crate::ingest::FrameSource;
use crate::output::FrameSink;
use crate::region::{Region, RegionMask};
use crate::reporter::Reporter;

/// How configured regions combine.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum RegionPolicy {
    /// One score over the union of all regions.
    #[default]
    Aggregate,
    /// Independent detection per region, with per-region event lists.
    PerRegion,
}

/// Everything a completed (or cancelled) scan produced.
#[derive(Debug)]
pub struct ScanResult {
    /// Combined event list: ordered, non-overlapping.
    pub events: Vec<MotionEvent>,
    /// Per-region event lists, index-aligned with the configured regions.
    /// Empty under the aggregate policy.
    pub per_region: Vec<Vec<MotionEvent>>,
    pub frames_read: u64,
    pub frames_scored: u64,
    pub decode_failures: u64,
    pub frame_rate: f64,
    pub cancelled: bool,
    /// Set when event export failed partway; the event list is still valid.
    pub export_error: Option<String>,
}

struct Lane {
    detector: Box<dyn crate::detect::MotionDetector>,
    machine: EventStateMachine,
}

pub struct MotionScanner {
    detection: DetectionParams,
    event_params: EventParams,
    regions: Vec<Region>,
    policy: RegionPolicy,
}

impl MotionScanner {
    pub fn new(detection: DetectionParams, event_params: EventParams) -> Result<Self, ScanError> {
        detection.validate()?;
        event_params.validate()?;
        Ok(Self {
            detection,
            event_params,
            regions: Vec::new(),
            policy: RegionPolicy::Aggregate,
        })
    }

    /// Restrict detection to `regions`. An empty list means the full frame.
    pub fn with_regions(mut self, regions: Vec<Region>) -> Self {
        self.regions = regions;
        self
    }

    pub fn with_region_policy(mut self, policy: RegionPolicy) -> Self {
        self.policy = policy;
        self
    }

    fn build_lanes(
        &self,
        frame_size: (u32, u32),
        window_start: u64,
        frame_skip: u64,
    ) -> Result<Vec<Lane>, ScanError> {
        let regions = if self.regions.is_empty() {
            vec![Region::full_frame(frame_size.0, frame_size.1)]
        } else {
            self.regions.clone()
        };
        let factor = self.detection.downscale_factor;
        let working_width = (frame_size.0 / factor).max(1);
        let kernel = self.detection.kernel_size.resolve(working_width)?;
        let masks: Vec<Arc<RegionMask>> = match self.policy {
            RegionPolicy::Aggregate => {
                vec![Arc::new(RegionMask::build(&regions, frame_size, factor)?)]
            }
            RegionPolicy::PerRegion => regions
                .iter()
                .map(|r| {
                    RegionMask::build(std::slice::from_ref(r), frame_size, factor).map(Arc::new)
                })
                .collect::<Result<_, _>>()?,
        };
        masks
            .into_iter()
            .map(|mask| {
                Ok(Lane {
                    detector: self.detection.detector.build(kernel, mask)?,
                    machine: EventStateMachine::new(self.event_params, frame_skip, window_start),
                })
            })
            .collect()
    }

    /// Run the scan to completion (or cancellation). `sink` receives every
    /// frame of each detected event afterwards; pass `None` to scan only.
    pub fn scan(
        &self,
        source: &mut FrameSource,
        reporter: &dyn Reporter,
        cancel: &AtomicBool,
        sink: Option<&mut dyn FrameSink>,
    ) -> Result<ScanResult, ScanError> {
        let frame_size = source.frame_size();
        let frame_rate = source.frame_rate();
        let frame_skip = source.frame_skip();
        let (window_start, _) = source.window();
        let mut lanes = self.build_lanes(frame_size, window_start, frame_skip)?;

        let total = source.total_frames();
        let mut frames_scored = 0u64;
        let mut warned_failures = 0u64;
        let mut cancelled = false;

        loop {
            if cancel.load(Ordering::Relaxed) {
                log::info!("scan cancelled after {} frames", source.frames_read());
                cancelled = true;
                break;
            }
            let frame = match source.next_sampled()? {
                Some(frame) => frame,
                None => break,
            };
            let failures = source.decode_failures();
            if failures > warned_failures {
                reporter.warning(&format!(
                    "repeated previous frame over {} undecodable frame(s) near frame {}",
                    failures - warned_failures,
                    frame.frame_num
                ));
                warned_failures = failures;
            }

            let gray = frame.to_gray(self.detection.downscale_factor);
            for lane in &mut lanes {
                let score = lane.detector.score(&gray);
                lane.machine
                    .process(frame.frame_num, score >= self.detection.threshold);
            }
            frames_scored += 1;
            reporter.progress(source.frames_read(), total);
        }

        let frames_read = source.frames_read();
        let mut per_lane: Vec<Vec<MotionEvent>> = lanes
            .into_iter()
            .map(|lane| lane.machine.finish(frames_read))
            .collect();
        let (events, per_region) = match self.policy {
            RegionPolicy::Aggregate => (per_lane.remove(0), Vec::new()),
            RegionPolicy::PerRegion => (merge_events(&per_lane), per_lane),
        };
        log::info!(
            "scan complete: {} event(s) in {} frame(s)",
            events.len(),
            frames_read
        );

        let mut export_error = None;
        if let Some(sink) = sink {
            if let Err(err) = export_events(source, &events, sink, cancel, frame_rate) {
                reporter.warning(&format!("event export aborted: {}", err));
                export_error = Some(err.to_string());
            }
        }

        Ok(ScanResult {
            events,
            per_region,
            frames_read,
            frames_scored,
            decode_failures: source.decode_failures(),
            frame_rate,
            cancelled,
            export_error,
        })
    }
}

/// Walk each event's full frame range into the sink. Uses seek + per-frame
/// reads so the export is gap-free regardless of detection-time skipping.
fn export_events(
    source: &mut FrameSource,
    events: &[MotionEvent],
    sink: &mut dyn FrameSink,
    cancel: &AtomicBool,
    frame_rate: f64,
) -> Result<(), ScanError> {
    'events: for event in events {
        if cancel.load(Ordering::Relaxed) {
            break;
        }
        sink.event_started(event.start_timecode(frame_rate))?;
        source.seek(event.start)?;
        for _ in event.start..=event.end {
            if cancel.load(Ordering::Relaxed) {
                break 'events;
            }
            match source.next_frame()? {
                Some(frame) => sink.write_frame(&frame)?,
                None => break,
            }
        }
        sink.event_finished(event)?;
    }
    sink.finalize()
}

/// Merge per-region event lists into one ordered, non-overlapping list.
/// Overlapping or adjacent events coalesce.
pub fn merge_events(lists: &[Vec<MotionEvent>]) -> Vec<MotionEvent> {
    let mut all: Vec<MotionEvent> = lists.iter().flatten().copied().collect();
    all.sort_by_key(|e| (e.start, e.end));
    let mut merged: Vec<MotionEvent> = Vec::with_capacity(all.len());
    for event in all {
        match merged.last_mut() {
            Some(last) if event.start <= last.end + 1 => {
                last.end = last.end.max(event.end);
            }
            _ => merged.push(event),
        }
    }
    merged
}
