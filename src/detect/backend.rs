//! The detector capability trait.

use crate::frame::GrayFrame;

/// A background-subtraction motion scorer.
///
/// `score` consumes one luma frame on the working grid and returns the
/// fraction of masked pixels classified as foreground, in [0, 1]. The first
/// call primes the background model and must return 0.0. Implementations
/// update internal state on every call; feed frames in timeline order.
pub trait MotionDetector: Send {
    fn score(&mut self, frame: &GrayFrame) -> f64;

    /// Backend name for logs and diagnostics.
    fn name(&self) -> &'static str;
}
