//! File decoding through ffmpeg.
//!
//! Stream metadata comes from `ffprobe` (JSON output); frames are decoded by
//! a piped `ffmpeg` child emitting packed RGB24. Decoder error lines are
//! surfaced as per-frame decode errors so the frame source can recover with
//! frame-repeat instead of aborting the scan.

use std::path::{Path, PathBuf};
use std::process::Command;

use ffmpeg_sidecar::child::FfmpegChild;
use ffmpeg_sidecar::command::FfmpegCommand;
use ffmpeg_sidecar::event::{FfmpegEvent, LogLevel};
use ffmpeg_sidecar::iter::FfmpegIterator;
use serde::Deserialize;

use crate::error::{DecodeError, ScanError};
use crate::ingest::VideoInput;

#[derive(Debug, Deserialize)]
struct ProbeOutput {
    streams: Vec<ProbeStream>,
}

#[derive(Debug, Deserialize)]
struct ProbeStream {
    width: u32,
    height: u32,
    r_frame_rate: String,
    nb_frames: Option<String>,
    duration: Option<String>,
}

/// Parse ffprobe's rational rate form ("30000/1001", "25/1").
fn parse_rate(raw: &str) -> Option<f64> {
    match raw.split_once('/') {
        Some((num, den)) => {
            let num: f64 = num.parse().ok()?;
            let den: f64 = den.parse().ok()?;
            if den > 0.0 {
                Some(num / den)
            } else {
                None
            }
        }
        None => raw.parse().ok(),
    }
}

fn probe(path: &Path) -> Result<(u32, u32, f64, u64), ScanError> {
    let output = Command::new("ffprobe")
        .args([
            "-v",
            "quiet",
            "-print_format",
            "json",
            "-show_streams",
            "-select_streams",
            "v:0",
        ])
        .arg(path)
        .output()
        .map_err(|e| ScanError::input(format!("failed to run ffprobe: {}", e)))?;
    if !output.status.success() {
        return Err(ScanError::input(format!(
            "ffprobe failed on '{}'",
            path.display()
        )));
    }
    let probed: ProbeOutput = serde_json::from_slice(&output.stdout)
        .map_err(|e| ScanError::input(format!("unparseable ffprobe output: {}", e)))?;
    let stream = probed
        .streams
        .into_iter()
        .next()
        .ok_or_else(|| ScanError::input(format!("no video stream in '{}'", path.display())))?;
    let frame_rate = parse_rate(&stream.r_frame_rate).ok_or_else(|| {
        ScanError::input(format!("bad frame rate '{}' from ffprobe", stream.r_frame_rate))
    })?;
    let total_frames = stream
        .nb_frames
        .as_deref()
        .and_then(|n| n.parse::<u64>().ok())
        .or_else(|| {
            let duration: f64 = stream.duration.as_deref()?.parse().ok()?;
            Some((duration * frame_rate).round() as u64)
        })
        .unwrap_or(0);
    Ok((stream.width, stream.height, frame_rate, total_frames))
}

pub struct FfmpegInput {
    path: PathBuf,
    width: u32,
    height: u32,
    frame_rate: f64,
    total_frames: u64,
    // child must outlive the event iterator
    child: FfmpegChild,
    events: FfmpegIterator,
    frames_read: u64,
}

impl FfmpegInput {
    pub fn open(path: &Path) -> Result<Self, ScanError> {
        let (width, height, frame_rate, total_frames) = probe(path)?;
        let (child, events) = spawn_decoder(path, 0.0)?;
        Ok(Self {
            path: path.to_path_buf(),
            width,
            height,
            frame_rate,
            total_frames,
            child,
            events,
            frames_read: 0,
        })
    }
}

fn spawn_decoder(path: &Path, seek_seconds: f64) -> Result<(FfmpegChild, FfmpegIterator), ScanError> {
    let mut command = FfmpegCommand::new();
    if seek_seconds > 0.0 {
        command.seek(format!("{:.6}", seek_seconds));
    }
    let mut child = command
        .input(path.to_string_lossy())
        .rawvideo()
        .spawn()
        .map_err(|e| {
            ScanError::input(format!(
                "failed to spawn ffmpeg for '{}': {}",
                path.display(),
                e
            ))
        })?;
    let events = child.iter().map_err(|e| {
        ScanError::input(format!(
            "failed to read ffmpeg output for '{}': {}",
            path.display(),
            e
        ))
    })?;
    Ok((child, events))
}

impl VideoInput for FfmpegInput {
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
        for event in self.events.by_ref() {
            match event {
                FfmpegEvent::OutputFrame(frame) => {
                    let n = self.frames_read;
                    self.frames_read += 1;
                    let expected = self.width as usize * self.height as usize * 3;
                    if frame.data.len() != expected {
                        return Some(Err(DecodeError::new(n, "truncated frame buffer")));
                    }
                    return Some(Ok(frame.data));
                }
                FfmpegEvent::Log(LogLevel::Error | LogLevel::Fatal, message) => {
                    let n = self.frames_read;
                    self.frames_read += 1;
                    return Some(Err(DecodeError::new(n, message)));
                }
                _ => {}
            }
        }
        None
    }

    /// Restart the decoder at `frame_num` (input-side seek, keyframe-exact
    /// enough for export walks).
    fn seek(&mut self, frame_num: u64) -> Result<(), ScanError> {
        let _ = self.child.kill();
        let seconds = frame_num as f64 / self.frame_rate;
        let (child, events) = spawn_decoder(&self.path, seconds)?;
        self.child = child;
        self.events = events;
        self.frames_read = frame_num;
        Ok(())
    }
}
