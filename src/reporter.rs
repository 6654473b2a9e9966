//! Reporter capability.
//!
//! The scanner never performs presentation I/O itself; progress and warnings
//! flow through a reporter handed to each scan. The CLI installs an
//! indicatif-backed reporter; library users get logging or silence.

/// Receives progress callbacks and recoverable-warning notifications during
/// a scan. Implementations must be cheap: `progress` fires once per sampled
/// frame.
pub trait Reporter {
    fn progress(&self, _frames_processed: u64, _total_frames: u64) {}

    fn warning(&self, _message: &str) {}
}

/// Routes warnings to the `log` facade and stays quiet about progress.
#[derive(Debug, Default)]
pub struct LogReporter;

impl Reporter for LogReporter {
    fn progress(&self, frames_processed: u64, total_frames: u64) {
        log::trace!("processed {}/{} frames", frames_processed, total_frames);
    }

    fn warning(&self, message: &str) {
        log::warn!("{}", message);
    }
}

/// Discards everything. Useful for tests and embedding.
#[derive(Debug, Default)]
pub struct NullReporter;

impl Reporter for NullReporter {}
