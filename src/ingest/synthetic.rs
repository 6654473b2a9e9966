//! Synthetic video input.
//!
//! Generates a deterministic test pattern without touching any decoder: a
//! flat background, with a centered block that cycles between bright and
//! dark during configured motion spans. The cycle length is prime, so
//! sampling at any shorter stride still sees the block change value within
//! a few samples and a stability-counting background model never absorbs it
//! mid-span; motion spans map exactly to above-threshold scores. Frames
//! inside a corrupt span fail to decode.
//!
//! Spec form (the `synth://` scheme):
//!
//! ```text
//! synth://640x480@30?frames=600&motion=9-148,360-490&corrupt=100-110
//! ```

use crate::error::{DecodeError, ScanError};
use crate::ingest::VideoInput;

const BACKGROUND_LUMA: u8 = 80;
const BLOCK_BRIGHT: u8 = 200;
const BLOCK_DARK: u8 = 10;
// prime, so no sampling stride below it lands on a constant phase
const BLOCK_CYCLE: u64 = 7;

pub struct SyntheticVideo {
    width: u32,
    height: u32,
    frame_rate: f64,
    total_frames: u64,
    motion: Vec<(u64, u64)>,
    corrupt: Vec<(u64, u64)>,
    next: u64,
}

impl SyntheticVideo {
    pub fn new(width: u32, height: u32, frame_rate: f64, total_frames: u64) -> Self {
        Self {
            width,
            height,
            frame_rate,
            total_frames,
            motion: Vec::new(),
            corrupt: Vec::new(),
            next: 0,
        }
    }

    /// Mark frames `start..=end` (stream-local) as containing motion.
    pub fn with_motion(mut self, start: u64, end: u64) -> Self {
        self.motion.push((start, end));
        self
    }

    /// Mark frames `start..=end` as undecodable.
    pub fn with_corrupt(mut self, start: u64, end: u64) -> Self {
        self.corrupt.push((start, end));
        self
    }

    pub fn from_spec(spec: &str) -> Result<Self, ScanError> {
        let (head, query) = match spec.split_once('?') {
            Some((h, q)) => (h, q),
            None => (spec, ""),
        };
        let (size, rate) = head
            .split_once('@')
            .ok_or_else(|| ScanError::config(format!("synthetic spec '{}' missing '@rate'", spec)))?;
        let (w, h) = size
            .split_once('x')
            .ok_or_else(|| ScanError::config(format!("synthetic spec '{}' missing 'WxH'", spec)))?;
        let width: u32 = w
            .parse()
            .map_err(|_| ScanError::config(format!("bad width in synthetic spec '{}'", spec)))?;
        let height: u32 = h
            .parse()
            .map_err(|_| ScanError::config(format!("bad height in synthetic spec '{}'", spec)))?;
        let frame_rate: f64 = rate
            .parse()
            .map_err(|_| ScanError::config(format!("bad frame rate in synthetic spec '{}'", spec)))?;
        if width == 0 || height == 0 || frame_rate <= 0.0 {
            return Err(ScanError::config(format!(
                "synthetic spec '{}' has zero dimensions or rate",
                spec
            )));
        }
        let mut video = SyntheticVideo::new(width, height, frame_rate, 0);
        let mut have_frames = false;
        for pair in query.split('&').filter(|p| !p.is_empty()) {
            let (key, value) = pair.split_once('=').ok_or_else(|| {
                ScanError::config(format!("malformed parameter '{}' in synthetic spec", pair))
            })?;
            match key {
                "frames" => {
                    video.total_frames = value.parse().map_err(|_| {
                        ScanError::config(format!("bad frame count '{}' in synthetic spec", value))
                    })?;
                    have_frames = true;
                }
                "motion" => {
                    for range in value.split(',') {
                        video.motion.push(parse_range(range)?);
                    }
                }
                "corrupt" => {
                    for range in value.split(',') {
                        video.corrupt.push(parse_range(range)?);
                    }
                }
                other => {
                    return Err(ScanError::config(format!(
                        "unknown synthetic spec parameter '{}'",
                        other
                    )))
                }
            }
        }
        if !have_frames {
            return Err(ScanError::config(format!(
                "synthetic spec '{}' missing frames=N",
                spec
            )));
        }
        Ok(video)
    }

    fn in_spans(spans: &[(u64, u64)], n: u64) -> bool {
        spans.iter().any(|&(a, b)| n >= a && n <= b)
    }

    fn render(&self, n: u64) -> Vec<u8> {
        let mut data =
            vec![BACKGROUND_LUMA; self.width as usize * self.height as usize * 3];
        if Self::in_spans(&self.motion, n) {
            let value = if n % BLOCK_CYCLE < 4 {
                BLOCK_BRIGHT
            } else {
                BLOCK_DARK
            };
            let (x0, x1) = (self.width / 4, self.width * 3 / 4);
            let (y0, y1) = (self.height / 4, self.height * 3 / 4);
            for y in y0..y1 {
                for x in x0..x1 {
                    let i = (y as usize * self.width as usize + x as usize) * 3;
                    data[i] = value;
                    data[i + 1] = value;
                    data[i + 2] = value;
                }
            }
        }
        data
    }
}

fn parse_range(s: &str) -> Result<(u64, u64), ScanError> {
    let (a, b) = s
        .split_once('-')
        .ok_or_else(|| ScanError::config(format!("bad range '{}' in synthetic spec", s)))?;
    let start: u64 = a
        .parse()
        .map_err(|_| ScanError::config(format!("bad range '{}' in synthetic spec", s)))?;
    let end: u64 = b
        .parse()
        .map_err(|_| ScanError::config(format!("bad range '{}' in synthetic spec", s)))?;
    if end < start {
        return Err(ScanError::config(format!(
            "range '{}' ends before it starts",
            s
        )));
    }
    Ok((start, end))
}

impl VideoInput for SyntheticVideo {
    fn frame_size(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    fn frame_rate(&self) -> f64 {
        self.frame_rate
    }

    fn total_frames(&self) -> u64 {
        self.total_frames
    }

    fn read_frame(&mut self) -> Option<Result<Vec<u8>, DecodeError>> {
        if self.next >= self.total_frames {
            return None;
        }
        let n = self.next;
        self.next += 1;
        if Self::in_spans(&self.corrupt, n) {
            return Some(Err(DecodeError::new(n, "synthetic corrupt frame")));
        }
        Some(Ok(self.render(n)))
    }

    fn seek(&mut self, frame_num: u64) -> Result<(), ScanError> {
        self.next = frame_num.min(self.total_frames);
        Ok(())
    }
}
