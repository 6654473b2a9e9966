//! Adaptive per-pixel Gaussian background model.
//!
//! Each pixel keeps a running mean and variance of its luma, updated with a
//! fixed learning rate. A pixel is foreground when its squared deviation from
//! the mean exceeds a multiple of the tracked variance, so the model adapts
//! to slow lighting drift while still flagging abrupt change. Foreground maps
//! are cleaned with a morphological open before scoring.

use std::sync::Arc;

use crate::detect::backend::MotionDetector;
use crate::detect::{masked_fraction, morphological_open};
use crate::frame::GrayFrame;
use crate::region::RegionMask;

const LEARNING_RATE: f64 = 0.05;
// variance adapts slower than the mean so a brief departure is flagged
// before the model widens around it
const VARIANCE_LEARNING_RATE: f64 = 0.005;
const VARIANCE_SCALE: f64 = 16.0;
const INITIAL_VARIANCE: f64 = 225.0;
// variance is clamped so sensor noise stays tolerated but a long busy
// stretch cannot widen the model until later motion goes unseen
const MIN_VARIANCE: f64 = 4.0;
const MAX_VARIANCE: f64 = 400.0;

pub struct AdaptiveDetector {
    kernel_size: u32,
    mask: Arc<RegionMask>,
    mean: Vec<f64>,
    variance: Vec<f64>,
    primed: bool,
    fg: Vec<bool>,
}

impl AdaptiveDetector {
    pub fn new(kernel_size: u32, mask: Arc<RegionMask>) -> Self {
        let len = mask.as_slice().len();
        Self {
            kernel_size,
            mask,
            mean: vec![0.0; len],
            variance: vec![INITIAL_VARIANCE; len],
            primed: false,
            fg: vec![false; len],
        }
    }
}

impl MotionDetector for AdaptiveDetector {
    fn score(&mut self, frame: &GrayFrame) -> f64 {
        debug_assert_eq!(frame.len(), self.mean.len());
        if !self.primed {
            for (m, &v) in self.mean.iter_mut().zip(frame.data.iter()) {
                *m = v as f64;
            }
            self.primed = true;
            return 0.0;
        }
        for (i, &v) in frame.data.iter().enumerate() {
            let value = v as f64;
            let d = value - self.mean[i];
            self.fg[i] = d * d > VARIANCE_SCALE * self.variance[i];
            self.mean[i] += LEARNING_RATE * d;
            self.variance[i] = ((1.0 - VARIANCE_LEARNING_RATE) * self.variance[i]
                + VARIANCE_LEARNING_RATE * d * d)
                .clamp(MIN_VARIANCE, MAX_VARIANCE);
        }
        morphological_open(&mut self.fg, frame.width, frame.height, self.kernel_size);
        masked_fraction(&self.fg, &self.mask)
    }

    fn name(&self) -> &'static str {
        "adaptive"
    }
}
