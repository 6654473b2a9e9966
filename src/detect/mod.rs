//! Motion detector backends.
//!
//! A backend consumes masked luma frames and produces a normalized motion
//! score: the fraction of masked pixels classified as foreground, always in
//! [0, 1]. Every backend scores on the same scale so the event threshold is
//! comparable across them; swapping backends trades accuracy for speed but
//! never changes the score contract.
//!
//! The backend set is closed and availability-gated: callers pick a
//! `DetectorType`, probe `is_available()`, and build through
//! `DetectorType::build`. Backends carry mutable adaptive state and must not
//! be shared across concurrent scans.

pub mod backend;
pub mod backends;

use std::sync::Arc;

pub use backend::MotionDetector;

use crate::error::ScanError;
use crate::region::RegionMask;

use backends::adaptive::AdaptiveDetector;
use backends::counting::CountingDetector;
use backends::gpu;

/// Closed set of detector backends.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DetectorType {
    /// Adaptive per-pixel Gaussian background model with morphological
    /// noise filtering. The default.
    Adaptive,
    /// Fast stable-count background model. Less accurate on gradual scene
    /// changes, considerably cheaper per frame.
    Counting,
    /// GPU-accelerated adaptive model. When available it may diverge from
    /// `Adaptive` by a small bounded number of frames; that is an accepted
    /// property, not a defect.
    AdaptiveGpu,
}

impl DetectorType {
    pub fn name(self) -> &'static str {
        match self {
            DetectorType::Adaptive => "adaptive",
            DetectorType::Counting => "counting",
            DetectorType::AdaptiveGpu => "adaptive-gpu",
        }
    }

    pub fn parse(name: &str) -> Result<Self, ScanError> {
        match name.trim().to_ascii_lowercase().as_str() {
            "adaptive" => Ok(DetectorType::Adaptive),
            "counting" => Ok(DetectorType::Counting),
            "adaptive-gpu" | "adaptive_gpu" => Ok(DetectorType::AdaptiveGpu),
            other => Err(ScanError::config(format!(
                "unknown detector '{}' (expected adaptive, counting, or adaptive-gpu)",
                other
            ))),
        }
    }

    /// Whether this backend can run in the current build/environment.
    pub fn is_available(self) -> bool {
        match self {
            DetectorType::Adaptive | DetectorType::Counting => true,
            DetectorType::AdaptiveGpu => gpu::is_available(),
        }
    }

    /// Construct the backend. `kernel_size` is the resolved (odd) morphology
    /// kernel; the mask must match the working grid the detector will score.
    pub fn build(
        self,
        kernel_size: u32,
        mask: Arc<RegionMask>,
    ) -> Result<Box<dyn MotionDetector>, ScanError> {
        if !self.is_available() {
            return Err(ScanError::config(format!(
                "detector backend '{}' is not available",
                self.name()
            )));
        }
        match self {
            DetectorType::Adaptive => Ok(Box::new(AdaptiveDetector::new(kernel_size, mask))),
            DetectorType::Counting => Ok(Box::new(CountingDetector::new(kernel_size, mask))),
            DetectorType::AdaptiveGpu => Err(ScanError::config(
                "detector backend 'adaptive-gpu' is not available",
            )),
        }
    }
}

impl Default for DetectorType {
    fn default() -> Self {
        DetectorType::Adaptive
    }
}

/// Morphology kernel request: resolved against the working grid once the
/// frame size is known.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum KernelSize {
    #[default]
    Auto,
    Size(u32),
}

impl KernelSize {
    pub fn resolve(self, working_width: u32) -> Result<u32, ScanError> {
        match self {
            KernelSize::Auto => resolve_kernel_size(None, working_width),
            KernelSize::Size(k) => resolve_kernel_size(Some(k), working_width),
        }
    }
}

/// Per-frame scoring parameters.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct DetectionParams {
    pub detector: DetectorType,
    /// Motion score at or above which a frame counts as motion, in [0, 1].
    pub threshold: f64,
    pub kernel_size: KernelSize,
    /// Integer working-grid reduction; 1 scores at native resolution.
    pub downscale_factor: u32,
}

impl DetectionParams {
    pub fn validate(&self) -> Result<(), ScanError> {
        if !(0.0..=1.0).contains(&self.threshold) {
            return Err(ScanError::config(format!(
                "threshold must be in [0, 1], got {}",
                self.threshold
            )));
        }
        if self.downscale_factor == 0 {
            return Err(ScanError::config("downscale factor must be >= 1"));
        }
        if let KernelSize::Size(k) = self.kernel_size {
            if k == 0 || k % 2 == 0 {
                return Err(ScanError::config(format!(
                    "kernel size must be odd and >= 1, got {}",
                    k
                )));
            }
        }
        if !self.detector.is_available() {
            return Err(ScanError::config(format!(
                "detector backend '{}' is not available",
                self.detector.name()
            )));
        }
        Ok(())
    }
}

impl Default for DetectionParams {
    fn default() -> Self {
        Self {
            detector: DetectorType::Adaptive,
            threshold: 0.15,
            kernel_size: KernelSize::Auto,
            downscale_factor: 1,
        }
    }
}

/// Resolve a kernel size request against the working-grid width: wider
/// frames get a bigger noise filter.
pub fn resolve_kernel_size(requested: Option<u32>, working_width: u32) -> Result<u32, ScanError> {
    match requested {
        Some(k) if k == 0 || k % 2 == 0 => Err(ScanError::config(format!(
            "kernel size must be odd and >= 1, got {}",
            k
        ))),
        Some(k) => Ok(k),
        None => Ok(if working_width >= 1920 {
            7
        } else if working_width >= 1280 {
            5
        } else {
            3
        }),
    }
}

/// Morphological open (erode then dilate) with a square kernel, in place.
/// Kernel size 1 is a no-op. Removes speckle smaller than the kernel while
/// preserving larger foreground blobs.
pub(crate) fn morphological_open(fg: &mut Vec<bool>, width: u32, height: u32, kernel: u32) {
    if kernel <= 1 {
        return;
    }
    let r = (kernel / 2) as i64;
    let w = width as i64;
    let h = height as i64;
    let mut eroded = vec![false; fg.len()];
    for y in 0..h {
        for x in 0..w {
            let mut keep = true;
            'erode: for dy in -r..=r {
                for dx in -r..=r {
                    let (nx, ny) = (x + dx, y + dy);
                    if nx < 0 || ny < 0 || nx >= w || ny >= h || !fg[(ny * w + nx) as usize] {
                        keep = false;
                        break 'erode;
                    }
                }
            }
            eroded[(y * w + x) as usize] = keep;
        }
    }
    for y in 0..h {
        for x in 0..w {
            let mut any = false;
            'dilate: for dy in -r..=r {
                for dx in -r..=r {
                    let (nx, ny) = (x + dx, y + dy);
                    if nx >= 0 && ny >= 0 && nx < w && ny < h && eroded[(ny * w + nx) as usize] {
                        any = true;
                        break 'dilate;
                    }
                }
            }
            fg[(y * w + x) as usize] = any;
        }
    }
}

/// Score from a filtered foreground map: foreground fraction of the masked
/// area.
pub(crate) fn masked_fraction(fg: &[bool], mask: &RegionMask) -> f64 {
    let mut count = 0usize;
    for (i, &is_fg) in fg.iter().enumerate() {
        if is_fg && mask.includes(i) {
            count += 1;
        }
    }
    count as f64 / mask.active_pixels() as f64
}
