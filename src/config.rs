//! Configuration loading.
//!
//! Settings resolve in three layers: built-in defaults, then an optional
//! TOML config file, then `MSCAN_*` environment variables. The CLI applies
//! its flags on top of the result. Time-valued settings stay in their
//! flexible form (`TimeValue`) until a video is opened and the frame rate
//! is known.

use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use serde::Deserialize;

use crate::detect::{DetectionParams, DetectorType, KernelSize};
use crate::error::ScanError;
use crate::output::{ExportSettings, OutputMode};
use crate::region::{Point, Region};
use crate::scan::{EventParams, RegionPolicy};
use crate::time::{RawTimeValue, TimeValue};

/// Fully-resolved settings, prior to frame-rate resolution.
#[derive(Clone, Debug)]
pub struct Settings {
    pub inputs: Vec<PathBuf>,
    pub start_time: Option<TimeValue>,
    pub end_time: Option<TimeValue>,
    pub duration: Option<TimeValue>,
    pub frame_skip: u64,
    pub detection: DetectionParams,
    pub min_event_len: TimeValue,
    pub time_pre_event: TimeValue,
    pub time_post_event: TimeValue,
    pub regions: Vec<Region>,
    pub region_policy: RegionPolicy,
    pub output_mode: OutputMode,
    pub export: ExportSettings,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            inputs: Vec::new(),
            start_time: None,
            end_time: None,
            duration: None,
            frame_skip: 1,
            detection: DetectionParams::default(),
            min_event_len: TimeValue::Frames(2),
            time_pre_event: TimeValue::Seconds(1.5),
            time_post_event: TimeValue::Seconds(2.0),
            regions: Vec::new(),
            region_policy: RegionPolicy::Aggregate,
            output_mode: OutputMode::ScanOnly,
            export: ExportSettings::default(),
        }
    }
}

impl Settings {
    /// Load defaults, overlay `path` if given, then the environment.
    pub fn load(path: Option<&Path>) -> Result<Self, ScanError> {
        let mut settings = Settings::default();
        if let Some(path) = path {
            let raw = fs::read_to_string(path).map_err(|e| {
                ScanError::config(format!("cannot read config '{}': {}", path.display(), e))
            })?;
            let file: FileConfig = toml::from_str(&raw).map_err(|e| {
                ScanError::config(format!("cannot parse config '{}': {}", path.display(), e))
            })?;
            settings.apply_file(file)?;
        }
        settings.apply_env()?;
        settings.validate()?;
        Ok(settings)
    }

    fn apply_file(&mut self, file: FileConfig) -> Result<(), ScanError> {
        if let Some(input) = file.input {
            if let Some(files) = input.files {
                self.inputs = files;
            }
            if let Some(raw) = input.start_time {
                self.start_time = Some(raw.resolve()?);
            }
            if let Some(raw) = input.end_time {
                self.end_time = Some(raw.resolve()?);
            }
            if let Some(raw) = input.duration {
                self.duration = Some(raw.resolve()?);
            }
            if let Some(skip) = input.frame_skip {
                self.frame_skip = skip;
            }
        }
        if let Some(detection) = file.detection {
            if let Some(name) = detection.detector {
                self.detection.detector = DetectorType::parse(&name)?;
            }
            if let Some(threshold) = detection.threshold {
                self.detection.threshold = threshold;
            }
            if let Some(k) = detection.kernel_size {
                self.detection.kernel_size = KernelSize::Size(k);
            }
            if let Some(factor) = detection.downscale_factor {
                self.detection.downscale_factor = factor;
            }
        }
        if let Some(events) = file.events {
            if let Some(raw) = events.min_event_len {
                self.min_event_len = raw.resolve()?;
            }
            if let Some(raw) = events.time_pre_event {
                self.time_pre_event = raw.resolve()?;
            }
            if let Some(raw) = events.time_post_event {
                self.time_post_event = raw.resolve()?;
            }
        }
        if let Some(regions) = file.regions {
            if let Some(polygons) = regions.regions {
                self.regions = polygons
                    .into_iter()
                    .map(|points| {
                        Region::new(points.into_iter().map(|[x, y]| Point::new(x, y)).collect())
                    })
                    .collect::<Result<_, _>>()?;
            }
            if let Some(policy) = regions.policy {
                self.region_policy = parse_policy(&policy)?;
            }
        }
        if let Some(output) = file.output {
            if let Some(mode) = output.mode {
                self.output_mode = OutputMode::parse(&mode)?;
            }
            if let Some(dir) = output.directory {
                self.export.output_dir = dir;
            }
            if let Some(basename) = output.basename {
                self.export.basename = basename;
            }
            if let Some(codec) = output.codec {
                self.export.codec = codec;
            }
            if let Some(overlay) = output.timecode_overlay {
                self.export.timecode_overlay = overlay;
            }
            if let Some(merge) = output.merge_events {
                self.export.merge_events = merge;
            }
        }
        Ok(())
    }

    fn apply_env(&mut self) -> Result<(), ScanError> {
        if let Ok(name) = env::var("MSCAN_DETECTOR") {
            self.detection.detector = DetectorType::parse(&name)?;
        }
        if let Ok(raw) = env::var("MSCAN_THRESHOLD") {
            self.detection.threshold = raw
                .parse()
                .map_err(|_| ScanError::config(format!("bad MSCAN_THRESHOLD '{}'", raw)))?;
        }
        if let Ok(raw) = env::var("MSCAN_FRAME_SKIP") {
            self.frame_skip = raw
                .parse()
                .map_err(|_| ScanError::config(format!("bad MSCAN_FRAME_SKIP '{}'", raw)))?;
        }
        if let Ok(dir) = env::var("MSCAN_OUTPUT_DIR") {
            self.export.output_dir = PathBuf::from(dir);
        }
        Ok(())
    }

    pub fn validate(&self) -> Result<(), ScanError> {
        self.detection.validate()?;
        if self.frame_skip == 0 {
            return Err(ScanError::config("frame skip must be >= 1"));
        }
        if self.end_time.is_some() && self.duration.is_some() {
            return Err(ScanError::config(
                "end-time and duration are mutually exclusive",
            ));
        }
        Ok(())
    }

    /// Event parameters in frames, once the frame rate is known.
    pub fn event_params(&self, frame_rate: f64) -> Result<EventParams, ScanError> {
        let params = EventParams {
            min_event_len: self.min_event_len.to_frames(frame_rate).max(1),
            time_pre_event: self.time_pre_event.to_frames(frame_rate),
            time_post_event: self.time_post_event.to_frames(frame_rate),
        };
        params.validate()?;
        Ok(params)
    }

    /// Trim window in frames, once the frame rate is known. A duration is
    /// measured from the window start.
    pub fn trim(&self, frame_rate: f64) -> (Option<u64>, Option<u64>) {
        let start = self.start_time.as_ref().map(|t| t.to_frames(frame_rate));
        let end = match (&self.end_time, &self.duration) {
            (Some(end), _) => Some(end.to_frames(frame_rate)),
            (None, Some(duration)) => {
                Some(start.unwrap_or(0) + duration.to_frames(frame_rate))
            }
            (None, None) => None,
        };
        (start, end)
    }
}

fn parse_policy(name: &str) -> Result<RegionPolicy, ScanError> {
    match name.trim().to_ascii_lowercase().as_str() {
        "aggregate" => Ok(RegionPolicy::Aggregate),
        "per-region" | "per_region" => Ok(RegionPolicy::PerRegion),
        other => Err(ScanError::config(format!(
            "unknown region policy '{}' (expected aggregate or per-region)",
            other
        ))),
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields, rename_all = "kebab-case")]
struct FileConfig {
    input: Option<InputSection>,
    detection: Option<DetectionSection>,
    events: Option<EventsSection>,
    regions: Option<RegionsSection>,
    output: Option<OutputSection>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields, rename_all = "kebab-case")]
struct InputSection {
    files: Option<Vec<PathBuf>>,
    start_time: Option<RawTimeValue>,
    end_time: Option<RawTimeValue>,
    duration: Option<RawTimeValue>,
    frame_skip: Option<u64>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields, rename_all = "kebab-case")]
struct DetectionSection {
    detector: Option<String>,
    threshold: Option<f64>,
    kernel_size: Option<u32>,
    downscale_factor: Option<u32>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields, rename_all = "kebab-case")]
struct EventsSection {
    min_event_len: Option<RawTimeValue>,
    time_pre_event: Option<RawTimeValue>,
    time_post_event: Option<RawTimeValue>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields, rename_all = "kebab-case")]
struct RegionsSection {
    regions: Option<Vec<Vec<[i64; 2]>>>,
    policy: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields, rename_all = "kebab-case")]
struct OutputSection {
    mode: Option<String>,
    directory: Option<PathBuf>,
    basename: Option<String>,
    codec: Option<String>,
    timecode_overlay: Option<bool>,
    merge_events: Option<bool>,
}
