//! Frame/time conversions.
//!
//! `FrameTimecode` pairs a frame number with the video frame rate so event
//! boundaries can be reported both ways. `TimeValue` is the flexible input
//! form accepted by config and CLI: a bare frame count, a seconds value
//! ("1.5s"), or a "HH:MM:SS[.mmm]" timecode, resolved to frames once the
//! video's frame rate is known.

use std::fmt;
use std::str::FromStr;

use serde::Deserialize;

use crate::error::ScanError;

/// A position on the video timeline, tied to a frame rate.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct FrameTimecode {
    pub frame_num: u64,
    pub frame_rate: f64,
}

impl FrameTimecode {
    pub fn new(frame_num: u64, frame_rate: f64) -> Self {
        Self {
            frame_num,
            frame_rate,
        }
    }

    pub fn seconds(&self) -> f64 {
        if self.frame_rate > 0.0 {
            self.frame_num as f64 / self.frame_rate
        } else {
            0.0
        }
    }
}

impl fmt::Display for FrameTimecode {
    /// Formats as HH:MM:SS.mmm.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let total_ms = (self.seconds() * 1000.0).round() as u64;
        let ms = total_ms % 1000;
        let total_s = total_ms / 1000;
        let s = total_s % 60;
        let m = (total_s / 60) % 60;
        let h = total_s / 3600;
        write!(f, "{:02}:{:02}:{:02}.{:03}", h, m, s, ms)
    }
}

/// A user-supplied time value, prior to frame-rate resolution.
#[derive(Clone, Debug, PartialEq)]
pub enum TimeValue {
    Frames(u64),
    Seconds(f64),
}

impl TimeValue {
    /// Resolve to a frame count using the opened video's frame rate.
    pub fn to_frames(&self, frame_rate: f64) -> u64 {
        match *self {
            TimeValue::Frames(n) => n,
            TimeValue::Seconds(s) => (s * frame_rate).round() as u64,
        }
    }
}

impl FromStr for TimeValue {
    type Err = ScanError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        if s.is_empty() {
            return Err(ScanError::config("empty time value"));
        }
        if let Some(stripped) = s.strip_suffix(['s', 'S']) {
            let secs: f64 = stripped
                .trim()
                .parse()
                .map_err(|_| ScanError::config(format!("invalid seconds value '{}'", s)))?;
            if secs < 0.0 {
                return Err(ScanError::config(format!("negative time value '{}'", s)));
            }
            return Ok(TimeValue::Seconds(secs));
        }
        if s.contains(':') {
            return parse_timecode(s).map(TimeValue::Seconds);
        }
        s.parse::<u64>()
            .map(TimeValue::Frames)
            .map_err(|_| ScanError::config(format!("invalid time value '{}'", s)))
    }
}

fn parse_timecode(s: &str) -> Result<f64, ScanError> {
    let parts: Vec<&str> = s.split(':').collect();
    if parts.len() != 3 {
        return Err(ScanError::config(format!(
            "timecode '{}' must be HH:MM:SS[.mmm]",
            s
        )));
    }
    let hours: u64 = parts[0]
        .parse()
        .map_err(|_| ScanError::config(format!("invalid hours in '{}'", s)))?;
    let minutes: u64 = parts[1]
        .parse()
        .map_err(|_| ScanError::config(format!("invalid minutes in '{}'", s)))?;
    let seconds: f64 = parts[2]
        .parse()
        .map_err(|_| ScanError::config(format!("invalid seconds in '{}'", s)))?;
    if minutes >= 60 || !(0.0..60.0).contains(&seconds) {
        return Err(ScanError::config(format!("timecode '{}' out of range", s)));
    }
    Ok(hours as f64 * 3600.0 + minutes as f64 * 60.0 + seconds)
}

/// Serde form for config files: accepts an integer frame count, a float
/// seconds value, or a string ("90", "1.5s", "00:01:30").
#[derive(Debug, Deserialize)]
#[serde(untagged)]
pub(crate) enum RawTimeValue {
    Frames(u64),
    Seconds(f64),
    Text(String),
}

impl RawTimeValue {
    pub(crate) fn resolve(&self) -> Result<TimeValue, ScanError> {
        match self {
            RawTimeValue::Frames(n) => Ok(TimeValue::Frames(*n)),
            RawTimeValue::Seconds(s) => {
                if *s < 0.0 {
                    Err(ScanError::config("negative time value"))
                } else {
                    Ok(TimeValue::Seconds(*s))
                }
            }
            RawTimeValue::Text(t) => t.parse(),
        }
    }
}
