//! Motion event detection for recorded footage.
//!
//! Scans one or more video files (treated as a single continuous timeline)
//! for motion, producing an ordered list of padded, non-overlapping events
//! and optionally exporting each event as its own clip. Scoring is
//! background subtraction over a configurable region mask; event shaping is
//! a hysteresis state machine with pre/post padding and a minimum-length
//! gate.
//!
//! Typical use:
//!
//! ```no_run
//! use std::sync::atomic::AtomicBool;
//! use motion_scan::config::Settings;
//! use motion_scan::ingest::{open_input, FrameSource};
//! use motion_scan::reporter::NullReporter;
//! use motion_scan::scan::MotionScanner;
//!
//! # fn main() -> Result<(), motion_scan::error::ScanError> {
//! let settings = Settings::load(None)?;
//! let input = open_input("footage.mp4".as_ref())?;
//! let rate = input.frame_rate();
//! let mut source = FrameSource::new(vec![input], settings.trim(rate), settings.frame_skip)?;
//! let scanner = MotionScanner::new(settings.detection, settings.event_params(rate)?)?;
//! let result = scanner.scan(&mut source, &NullReporter, &AtomicBool::new(false), None)?;
//! for event in &result.events {
//!     println!("{} .. {}", event.start_timecode(rate), event.end_timecode(rate));
//! }
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod detect;
pub mod error;
pub mod frame;
pub mod ingest;
pub mod output;
pub mod region;
pub mod reporter;
pub mod scan;
pub mod time;

pub use config::Settings;
pub use detect::{DetectionParams, DetectorType, KernelSize};
pub use error::ScanError;
pub use frame::Frame;
pub use ingest::{open_input, FrameSource};
pub use output::{ExportSettings, OutputMode};
pub use region::{Point, Region};
pub use reporter::Reporter;
pub use scan::{EventParams, MotionEvent, MotionScanner, RegionPolicy, ScanResult};
pub use time::{FrameTimecode, TimeValue};
