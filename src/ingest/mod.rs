//! Video input backends and the frame source that feeds the scanner.
//!
//! A `VideoInput` decodes one file (or synthetic stream) into raw RGB24
//! buffers. `FrameSource` sits above the inputs and owns the timeline:
//! concatenation, the trim window, frame-skip sampling, and corrupt-frame
//! recovery. Inputs are resolved by path scheme: `synth://` streams are
//! always available; everything else needs the `video-ffmpeg` feature.

pub mod source;
pub mod synthetic;

#[cfg(feature = "video-ffmpeg")]
pub mod ffmpeg;

use std::path::Path;

use crate::error::{DecodeError, ScanError};

pub use source::FrameSource;
pub use synthetic::SyntheticVideo;

/// A single decodable video stream.
///
/// `read_frame` yields packed RGB24 buffers in presentation order. `None`
/// means end of stream; `Some(Err(_))` means this one frame could not be
/// decoded and the stream has advanced past it.
pub trait VideoInput: Send {
    fn frame_size(&self) -> (u32, u32);

    fn frame_rate(&self) -> f64;

    /// Total frame count, used for progress and trim validation.
    fn total_frames(&self) -> u64;

    fn read_frame(&mut self) -> Option<Result<Vec<u8>, DecodeError>>;

    /// Reposition so the next `read_frame` yields frame `frame_num` of this
    /// stream. Export walks re-seek into detected ranges.
    fn seek(&mut self, frame_num: u64) -> Result<(), ScanError>;
}

/// Open an input by path. `synth://` specs resolve to a synthetic stream;
/// real files require the `video-ffmpeg` feature.
pub fn open_input(path: &Path) -> Result<Box<dyn VideoInput>, ScanError> {
    let spec = path.to_string_lossy();
    if let Some(rest) = spec.strip_prefix("synth://") {
        return Ok(Box::new(SyntheticVideo::from_spec(rest)?));
    }
    open_file(path)
}

#[cfg(feature = "video-ffmpeg")]
fn open_file(path: &Path) -> Result<Box<dyn VideoInput>, ScanError> {
    Ok(Box::new(ffmpeg::FfmpegInput::open(path)?))
}

#[cfg(not(feature = "video-ffmpeg"))]
fn open_file(path: &Path) -> Result<Box<dyn VideoInput>, ScanError> {
    Err(ScanError::input(format!(
        "cannot open '{}': built without the video-ffmpeg feature",
        path.display()
    )))
}
