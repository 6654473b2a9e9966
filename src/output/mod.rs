//! Event export.
//!
//! The scanner streams in-event frames into a `FrameSink`; the default sink
//! is `SegmentWriter`, which opens one encoder per event and names clips
//! sequentially. Encoders are produced by a `VideoEncoderFactory` so the
//! scan logic never touches ffmpeg directly and tests can capture frames in
//! memory.

#[cfg(feature = "video-ffmpeg")]
pub mod ffmpeg;

use std::path::{Path, PathBuf};

use crate::error::ScanError;
use crate::frame::Frame;
use crate::scan::MotionEvent;
use crate::time::FrameTimecode;

/// What to do with detected events.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum OutputMode {
    /// Report events only; no files are written.
    #[default]
    ScanOnly,
    /// Write one clip per event.
    Export,
}

impl OutputMode {
    pub fn parse(name: &str) -> Result<Self, ScanError> {
        match name.trim().to_ascii_lowercase().as_str() {
            "scan-only" | "scan_only" => Ok(OutputMode::ScanOnly),
            "export" => Ok(OutputMode::Export),
            other => Err(ScanError::config(format!(
                "unknown output mode '{}' (expected scan-only or export)",
                other
            ))),
        }
    }
}

/// Export location and presentation settings.
#[derive(Clone, Debug)]
pub struct ExportSettings {
    pub output_dir: PathBuf,
    /// Clip name stem; clips are numbered `<basename>-event-NNN.mp4`.
    pub basename: String,
    /// Encoder codec name.
    pub codec: String,
    /// Burn the source timecode into exported frames.
    pub timecode_overlay: bool,
    /// Write all events into one combined clip instead of one per event.
    pub merge_events: bool,
}

impl Default for ExportSettings {
    fn default() -> Self {
        Self {
            output_dir: PathBuf::from("."),
            basename: "motion".into(),
            codec: "libx264".into(),
            timecode_overlay: false,
            merge_events: false,
        }
    }
}

/// Receives the frames belonging to each event, in order, bracketed by
/// start/finish calls. Event padding frames are included; `finalize` runs
/// once after the last event.
pub trait FrameSink {
    fn event_started(&mut self, start: FrameTimecode) -> Result<(), ScanError>;

    fn write_frame(&mut self, frame: &Frame) -> Result<(), ScanError>;

    fn event_finished(&mut self, event: &MotionEvent) -> Result<(), ScanError>;

    fn finalize(&mut self) -> Result<(), ScanError> {
        Ok(())
    }
}

/// A single open clip being written.
pub trait VideoEncoder {
    fn write_frame(&mut self, frame: &Frame) -> Result<(), ScanError>;

    fn finish(&mut self) -> Result<(), ScanError>;
}

/// Opens encoders on demand, one per event clip.
pub trait VideoEncoderFactory {
    fn create(
        &mut self,
        path: &Path,
        frame_size: (u32, u32),
        frame_rate: f64,
        start: FrameTimecode,
    ) -> Result<Box<dyn VideoEncoder>, ScanError>;
}

/// Writes each event to its own clip under `settings.output_dir`.
pub struct SegmentWriter {
    settings: ExportSettings,
    factory: Box<dyn VideoEncoderFactory>,
    frame_size: (u32, u32),
    frame_rate: f64,
    current: Option<Box<dyn VideoEncoder>>,
    next_index: usize,
    written: Vec<PathBuf>,
}

impl SegmentWriter {
    pub fn new(
        settings: ExportSettings,
        factory: Box<dyn VideoEncoderFactory>,
        frame_size: (u32, u32),
        frame_rate: f64,
    ) -> Self {
        Self {
            settings,
            factory,
            frame_size,
            frame_rate,
            current: None,
            next_index: 1,
            written: Vec::new(),
        }
    }

    fn clip_path(&self, index: usize) -> PathBuf {
        let name = if self.settings.merge_events {
            format!("{}-events.mp4", self.settings.basename)
        } else {
            format!("{}-event-{:03}.mp4", self.settings.basename, index)
        };
        self.settings.output_dir.join(name)
    }

    /// Paths of the clips written so far.
    pub fn written(&self) -> &[PathBuf] {
        &self.written
    }
}

impl FrameSink for SegmentWriter {
    fn event_started(&mut self, start: FrameTimecode) -> Result<(), ScanError> {
        if self.current.is_some() {
            // merged mode keeps one encoder open across events
            return Ok(());
        }
        let path = self.clip_path(self.next_index);
        log::info!("writing event clip {}", path.display());
        let encoder = self
            .factory
            .create(&path, self.frame_size, self.frame_rate, start)?;
        self.current = Some(encoder);
        self.written.push(path);
        self.next_index += 1;
        Ok(())
    }

    fn write_frame(&mut self, frame: &Frame) -> Result<(), ScanError> {
        match &mut self.current {
            Some(encoder) => encoder.write_frame(frame),
            None => Err(ScanError::output("frame written outside an event")),
        }
    }

    fn event_finished(&mut self, _event: &MotionEvent) -> Result<(), ScanError> {
        if self.settings.merge_events {
            return Ok(());
        }
        match self.current.take() {
            Some(mut encoder) => encoder.finish(),
            None => Err(ScanError::output("event finished without a start")),
        }
    }

    fn finalize(&mut self) -> Result<(), ScanError> {
        match self.current.take() {
            Some(mut encoder) => encoder.finish(),
            None => Ok(()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_output_modes() {
        assert_eq!(OutputMode::parse("scan-only").unwrap(), OutputMode::ScanOnly);
        assert_eq!(OutputMode::parse("Export").unwrap(), OutputMode::Export);
        assert!(OutputMode::parse("copy").is_err());
    }

    struct NullEncoder;

    impl VideoEncoder for NullEncoder {
        fn write_frame(&mut self, _frame: &Frame) -> Result<(), ScanError> {
            Ok(())
        }

        fn finish(&mut self) -> Result<(), ScanError> {
            Ok(())
        }
    }

    struct NullFactory {
        created: Vec<PathBuf>,
    }

    impl VideoEncoderFactory for NullFactory {
        fn create(
            &mut self,
            path: &Path,
            _frame_size: (u32, u32),
            _frame_rate: f64,
            _start: FrameTimecode,
        ) -> Result<Box<dyn VideoEncoder>, ScanError> {
            self.created.push(path.to_path_buf());
            Ok(Box::new(NullEncoder))
        }
    }

    #[test]
    fn clips_are_numbered_sequentially() {
        let factory = Box::new(NullFactory { created: Vec::new() });
        let mut writer = SegmentWriter::new(
            ExportSettings {
                output_dir: PathBuf::from("/tmp/out"),
                basename: "cam1".into(),
                ..Default::default()
            },
            factory,
            (64, 48),
            30.0,
        );
        for i in 0..2 {
            writer
                .event_started(FrameTimecode::new(i * 100, 30.0))
                .unwrap();
            writer
                .event_finished(&MotionEvent {
                    start: i * 100,
                    end: i * 100 + 10,
                })
                .unwrap();
        }
        assert_eq!(
            writer.written(),
            &[
                PathBuf::from("/tmp/out/cam1-event-001.mp4"),
                PathBuf::from("/tmp/out/cam1-event-002.mp4"),
            ]
        );
    }

    #[test]
    fn merged_mode_writes_one_clip() {
        let factory = Box::new(NullFactory { created: Vec::new() });
        let mut writer = SegmentWriter::new(
            ExportSettings {
                merge_events: true,
                ..Default::default()
            },
            factory,
            (64, 48),
            30.0,
        );
        for i in 0..3 {
            writer
                .event_started(FrameTimecode::new(i * 100, 30.0))
                .unwrap();
            writer
                .event_finished(&MotionEvent {
                    start: i * 100,
                    end: i * 100 + 10,
                })
                .unwrap();
        }
        writer.finalize().unwrap();
        assert_eq!(writer.written(), &[PathBuf::from("./motion-events.mp4")]);
    }

    #[test]
    fn frames_outside_events_are_rejected() {
        let factory = Box::new(NullFactory { created: Vec::new() });
        let mut writer =
            SegmentWriter::new(ExportSettings::default(), factory, (4, 4), 30.0);
        let frame = Frame::new(0, 4, 4, vec![0; 48]).unwrap();
        assert!(writer.write_frame(&frame).is_err());
    }
}
