//! Clip encoding through ffmpeg.
//!
//! Frames are piped to an ffmpeg child as rawvideo RGB24 on stdin and
//! encoded with the configured codec. The optional timecode overlay burns
//! the source-relative wall time into each frame with drawtext, offset so
//! the first frame of the clip shows its position in the original footage.

use std::io::Write;
use std::path::Path;

use ffmpeg_sidecar::child::FfmpegChild;
use ffmpeg_sidecar::command::FfmpegCommand;

use crate::error::ScanError;
use crate::frame::Frame;
use crate::output::{VideoEncoder, VideoEncoderFactory};
use crate::time::FrameTimecode;

const SUPPORTED_CODECS: [&str; 3] = ["libx264", "libx265", "mpeg4"];

pub struct FfmpegEncoderFactory {
    codec: String,
    timecode_overlay: bool,
}

impl FfmpegEncoderFactory {
    /// Fails eagerly on an unsupported codec, before any scanning work.
    pub fn new(codec: &str, timecode_overlay: bool) -> Result<Self, ScanError> {
        if !SUPPORTED_CODECS.contains(&codec) {
            return Err(ScanError::config(format!(
                "unsupported codec '{}' (supported: {})",
                codec,
                SUPPORTED_CODECS.join(", ")
            )));
        }
        Ok(Self {
            codec: codec.to_string(),
            timecode_overlay,
        })
    }
}

impl VideoEncoderFactory for FfmpegEncoderFactory {
    fn create(
        &mut self,
        path: &Path,
        frame_size: (u32, u32),
        frame_rate: f64,
        start: FrameTimecode,
    ) -> Result<Box<dyn VideoEncoder>, ScanError> {
        FfmpegEncoder::open(
            path,
            frame_size,
            frame_rate,
            start,
            &self.codec,
            self.timecode_overlay,
        )
        .map(|e| Box::new(e) as Box<dyn VideoEncoder>)
    }
}

pub struct FfmpegEncoder {
    child: FfmpegChild,
    frame_size: (u32, u32),
}

impl FfmpegEncoder {
    fn open(
        path: &Path,
        frame_size: (u32, u32),
        frame_rate: f64,
        start: FrameTimecode,
        codec: &str,
        overlay: bool,
    ) -> Result<Self, ScanError> {
        let (width, height) = frame_size;
        let mut command = FfmpegCommand::new();
        command
            .format("rawvideo")
            .pix_fmt("rgb24")
            .size(width, height)
            .rate(frame_rate as f32)
            .input("-");
        if overlay {
            command.args([
                "-vf",
                &format!(
                    "drawtext=text='%{{pts\\:hms\\:{:.3}}}':x=8:y=8:\
                     fontcolor=white:box=1:boxcolor=black@0.5",
                    start.seconds()
                ),
            ]);
        }
        let child = command
            .codec_video(codec)
            .args(["-pix_fmt", "yuv420p"])
            .overwrite()
            .output(path.to_string_lossy())
            .spawn()
            .map_err(|e| {
                ScanError::output(format!(
                    "failed to spawn ffmpeg for '{}': {}",
                    path.display(),
                    e
                ))
            })?;
        Ok(Self { child, frame_size })
    }
}

impl VideoEncoder for FfmpegEncoder {
    fn write_frame(&mut self, frame: &Frame) -> Result<(), ScanError> {
        if (frame.width, frame.height) != self.frame_size {
            return Err(ScanError::output(format!(
                "frame size {}x{} does not match clip {}x{}",
                frame.width, frame.height, self.frame_size.0, self.frame_size.1
            )));
        }
        let stdin = self
            .child
            .as_inner_mut()
            .stdin
            .as_mut()
            .ok_or_else(|| ScanError::output("encoder stdin closed"))?;
        stdin
            .write_all(&frame.data)
            .map_err(|e| ScanError::output(format!("encoder write failed: {}", e)))
    }

    fn finish(&mut self) -> Result<(), ScanError> {
        drop(self.child.as_inner_mut().stdin.take());
        let status = self
            .child
            .wait()
            .map_err(|e| ScanError::output(format!("encoder wait failed: {}", e)))?;
        if !status.success() {
            return Err(ScanError::output(format!(
                "ffmpeg encoder exited with {}",
                status
            )));
        }
        Ok(())
    }
}
