//! Stable-count background model.
//!
//! Each pixel holds a background value plus a candidate with a stability
//! counter. A pixel whose luma stays near the background is background; a
//! pixel that departs is foreground until the new value has held steady for
//! `MIN_STABILITY` consecutive frames, at which point the candidate is
//! adopted. No floating-point state, so results are exactly reproducible,
//! at the cost of slower adaptation than the Gaussian model.

use std::sync::Arc;

use crate::detect::backend::MotionDetector;
use crate::detect::{masked_fraction, morphological_open};
use crate::frame::GrayFrame;
use crate::region::RegionMask;

const PIXEL_THRESHOLD: u8 = 25;
const MIN_STABILITY: u32 = 30;

pub struct CountingDetector {
    kernel_size: u32,
    mask: Arc<RegionMask>,
    background: Vec<u8>,
    candidate: Vec<u8>,
    stable_for: Vec<u32>,
    primed: bool,
    fg: Vec<bool>,
}

impl CountingDetector {
    pub fn new(kernel_size: u32, mask: Arc<RegionMask>) -> Self {
        let len = mask.as_slice().len();
        Self {
            kernel_size,
            mask,
            background: vec![0; len],
            candidate: vec![0; len],
            stable_for: vec![0; len],
            primed: false,
            fg: vec![false; len],
        }
    }
}

fn near(a: u8, b: u8) -> bool {
    a.abs_diff(b) <= PIXEL_THRESHOLD
}

impl MotionDetector for CountingDetector {
    fn score(&mut self, frame: &GrayFrame) -> f64 {
        debug_assert_eq!(frame.len(), self.background.len());
        if !self.primed {
            self.background.copy_from_slice(&frame.data);
            self.primed = true;
            return 0.0;
        }
        for (i, &v) in frame.data.iter().enumerate() {
            if near(v, self.background[i]) {
                self.fg[i] = false;
                self.stable_for[i] = 0;
                continue;
            }
            self.fg[i] = true;
            if near(v, self.candidate[i]) {
                self.stable_for[i] += 1;
                if self.stable_for[i] >= MIN_STABILITY {
                    self.background[i] = self.candidate[i];
                    self.stable_for[i] = 0;
                    self.fg[i] = false;
                }
            } else {
                self.candidate[i] = v;
                self.stable_for[i] = 1;
            }
        }
        morphological_open(&mut self.fg, frame.width, frame.height, self.kernel_size);
        masked_fraction(&self.fg, &self.mask)
    }

    fn name(&self) -> &'static str {
        "counting"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::region::Region;

    fn gray(width: u32, height: u32, value: u8) -> GrayFrame {
        GrayFrame {
            width,
            height,
            data: vec![value; (width * height) as usize],
        }
    }

    fn detector(width: u32, height: u32, kernel: u32) -> CountingDetector {
        let mask = Arc::new(
            RegionMask::build(
                &[Region::full_frame(width, height)],
                (width, height),
                1,
            )
            .unwrap(),
        );
        CountingDetector::new(kernel, mask)
    }

    #[test]
    fn static_scene_scores_zero() {
        let mut d = detector(8, 8, 1);
        for _ in 0..50 {
            assert_eq!(d.score(&gray(8, 8, 100)), 0.0);
        }
    }

    #[test]
    fn departure_is_foreground_until_stable() {
        let mut d = detector(8, 8, 1);
        d.score(&gray(8, 8, 100));
        for _ in 0..(MIN_STABILITY - 1) {
            assert_eq!(d.score(&gray(8, 8, 200)), 1.0);
        }
        // the stability threshold absorbs the new value as background
        assert_eq!(d.score(&gray(8, 8, 200)), 0.0);
        assert_eq!(d.score(&gray(8, 8, 200)), 0.0);
    }

    #[test]
    fn alternating_values_never_stabilize() {
        let mut d = detector(8, 8, 1);
        d.score(&gray(8, 8, 100));
        for i in 0..200 {
            let v = if i % 2 == 0 { 200 } else { 10 };
            assert_eq!(d.score(&gray(8, 8, v)), 1.0);
        }
    }

    #[test]
    fn partial_foreground_scores_fraction() {
        let mut d = detector(8, 8, 1);
        d.score(&gray(8, 8, 100));
        let mut frame = gray(8, 8, 100);
        for y in 2..6 {
            for x in 2..6 {
                frame.data[(y * 8 + x) as usize] = 250;
            }
        }
        assert_eq!(d.score(&frame), 16.0 / 64.0);
    }

    #[test]
    fn small_deviations_stay_background() {
        let mut d = detector(8, 8, 1);
        d.score(&gray(8, 8, 100));
        assert_eq!(d.score(&gray(8, 8, 100 + PIXEL_THRESHOLD)), 0.0);
    }
}
