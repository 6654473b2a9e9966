//! Frame containers.
//!
//! `Frame` is the decoded RGB24 image handed out by the frame source;
//! `GrayFrame` is the 8-bit luma working image the detectors score, produced
//! once per sampled frame at the configured downscale factor.

use crate::error::ScanError;

/// A decoded video frame: packed RGB24, row-major, with its position on the
/// global (concatenated) timeline.
#[derive(Clone, Debug)]
pub struct Frame {
    pub frame_num: u64,
    pub width: u32,
    pub height: u32,
    pub data: Vec<u8>,
}

impl Frame {
    pub fn new(frame_num: u64, width: u32, height: u32, data: Vec<u8>) -> Result<Self, ScanError> {
        let expected = width as usize * height as usize * 3;
        if data.len() != expected {
            return Err(ScanError::input(format!(
                "frame {} has {} bytes, expected {} for {}x{} RGB24",
                frame_num,
                data.len(),
                expected,
                width,
                height
            )));
        }
        Ok(Self {
            frame_num,
            width,
            height,
            data,
        })
    }

    /// Convert to a luma image on the downscaled grid. `factor` of 1 keeps
    /// the native resolution; larger factors box-average `factor`×`factor`
    /// blocks (BT.601 luma weights).
    pub fn to_gray(&self, factor: u32) -> GrayFrame {
        let factor = factor.max(1);
        let out_w = (self.width / factor).max(1);
        let out_h = (self.height / factor).max(1);
        let mut data = Vec::with_capacity(out_w as usize * out_h as usize);
        for oy in 0..out_h {
            for ox in 0..out_w {
                let mut acc: u32 = 0;
                let mut count: u32 = 0;
                for dy in 0..factor {
                    let y = oy * factor + dy;
                    if y >= self.height {
                        break;
                    }
                    for dx in 0..factor {
                        let x = ox * factor + dx;
                        if x >= self.width {
                            break;
                        }
                        let i = (y as usize * self.width as usize + x as usize) * 3;
                        let r = self.data[i] as u32;
                        let g = self.data[i + 1] as u32;
                        let b = self.data[i + 2] as u32;
                        acc += (299 * r + 587 * g + 114 * b) / 1000;
                        count += 1;
                    }
                }
                data.push((acc / count.max(1)) as u8);
            }
        }
        GrayFrame {
            width: out_w,
            height: out_h,
            data,
        }
    }
}

/// 8-bit luma image on the working (possibly downscaled) grid.
#[derive(Clone, Debug)]
pub struct GrayFrame {
    pub width: u32,
    pub height: u32,
    pub data: Vec<u8>,
}

impl GrayFrame {
    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }
}
