//! The concatenating frame source.
//!
//! Owns the global timeline over one or more inputs: frames are numbered
//! continuously across file boundaries, the trim window bounds which frames
//! are handed out, and frame-skip sampling strides within that window. A
//! frame that fails to decode is replaced in place with the last good frame
//! (or a black frame if none exists yet) so the timeline never loses a
//! frame number.

use crate::error::ScanError;
use crate::frame::Frame;
use crate::ingest::VideoInput;

const FRAME_RATE_TOLERANCE: f64 = 0.01;

pub struct FrameSource {
    inputs: Vec<Box<dyn VideoInput>>,
    // global frame number at which each input begins
    offsets: Vec<u64>,
    current: usize,
    width: u32,
    height: u32,
    frame_rate: f64,
    total_frames: u64,
    start: u64,
    end: u64,
    frame_skip: u64,
    position: u64,
    last_good: Option<Vec<u8>>,
    decode_failures: u64,
}

impl FrameSource {
    /// Build a source over `inputs` in order. `trim` bounds the scanned
    /// window as global frame numbers, start-inclusive and end-exclusive;
    /// `None` ends default to the full timeline. All inputs must share
    /// resolution and frame rate.
    pub fn new(
        inputs: Vec<Box<dyn VideoInput>>,
        trim: (Option<u64>, Option<u64>),
        frame_skip: u64,
    ) -> Result<Self, ScanError> {
        let first = inputs
            .first()
            .ok_or_else(|| ScanError::input("no inputs given"))?;
        if frame_skip == 0 {
            return Err(ScanError::config("frame skip must be >= 1"));
        }
        let (width, height) = first.frame_size();
        let frame_rate = first.frame_rate();
        let mut total_frames = 0u64;
        let mut offsets = Vec::with_capacity(inputs.len());
        for input in &inputs {
            offsets.push(total_frames);
            if input.frame_size() != (width, height) {
                return Err(ScanError::input(format!(
                    "input resolution {}x{} does not match first input {}x{}",
                    input.frame_size().0,
                    input.frame_size().1,
                    width,
                    height
                )));
            }
            if (input.frame_rate() - frame_rate).abs() > FRAME_RATE_TOLERANCE {
                return Err(ScanError::input(format!(
                    "input frame rate {} does not match first input {}",
                    input.frame_rate(),
                    frame_rate
                )));
            }
            total_frames += input.total_frames();
        }
        let start = trim.0.unwrap_or(0);
        let end = trim.1.unwrap_or(total_frames).min(total_frames);
        if start >= end {
            return Err(ScanError::config(format!(
                "trim window [{}, {}) is empty",
                start, end
            )));
        }
        Ok(Self {
            inputs,
            offsets,
            current: 0,
            width,
            height,
            frame_rate,
            total_frames,
            start,
            end,
            frame_skip,
            position: 0,
            last_good: None,
            decode_failures: 0,
        })
    }

    pub fn frame_size(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    pub fn frame_rate(&self) -> f64 {
        self.frame_rate
    }

    pub fn total_frames(&self) -> u64 {
        self.total_frames
    }

    /// Trim window as global frame numbers, end-exclusive.
    pub fn window(&self) -> (u64, u64) {
        (self.start, self.end)
    }

    pub fn frame_skip(&self) -> u64 {
        self.frame_skip
    }

    /// Raw frames consumed so far, for progress reporting.
    pub fn frames_read(&self) -> u64 {
        self.position
    }

    /// Frames recovered by repeating the previous good frame.
    pub fn decode_failures(&self) -> u64 {
        self.decode_failures
    }

    fn read_raw(&mut self) -> Option<Vec<u8>> {
        loop {
            let input = self.inputs.get_mut(self.current)?;
            match input.read_frame() {
                Some(Ok(data)) => {
                    self.last_good = Some(data.clone());
                    return Some(data);
                }
                Some(Err(err)) => {
                    self.decode_failures += 1;
                    log::debug!(
                        "repeating previous frame over undecodable frame {}: {}",
                        self.position,
                        err
                    );
                    return Some(match &self.last_good {
                        Some(good) => good.clone(),
                        None => vec![0; self.width as usize * self.height as usize * 3],
                    });
                }
                None => self.current += 1,
            }
        }
    }

    /// The next frame selected by the trim window and frame-skip stride.
    /// Frames before the window or between stride points are decoded and
    /// discarded so numbering stays continuous.
    pub fn next_sampled(&mut self) -> Result<Option<Frame>, ScanError> {
        loop {
            if self.position >= self.end {
                return Ok(None);
            }
            let data = match self.read_raw() {
                Some(data) => data,
                None => return Ok(None),
            };
            let n = self.position;
            self.position += 1;
            if n < self.start || (n - self.start) % self.frame_skip != 0 {
                continue;
            }
            return Frame::new(n, self.width, self.height, data).map(Some);
        }
    }

    /// Reposition the timeline at `frame_num`. Used by export walks, which
    /// revisit detected ranges at full frame density.
    pub fn seek(&mut self, frame_num: u64) -> Result<(), ScanError> {
        if frame_num >= self.total_frames {
            return Err(ScanError::input(format!(
                "seek to frame {} past end of footage ({} frames)",
                frame_num, self.total_frames
            )));
        }
        let index = match self.offsets.binary_search(&frame_num) {
            Ok(i) => i,
            Err(i) => i - 1,
        };
        self.inputs[index].seek(frame_num - self.offsets[index])?;
        for later in &mut self.inputs[index + 1..] {
            later.seek(0)?;
        }
        self.current = index;
        self.position = frame_num;
        self.last_good = None;
        Ok(())
    }

    /// The next frame regardless of the trim window or frame-skip stride.
    pub fn next_frame(&mut self) -> Result<Option<Frame>, ScanError> {
        let data = match self.read_raw() {
            Some(data) => data,
            None => return Ok(None),
        };
        let n = self.position;
        self.position += 1;
        Frame::new(n, self.width, self.height, data).map(Some)
    }
}
