use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use clap::Parser;
use indicatif::{ProgressBar, ProgressStyle};

use motion_scan::config::Settings;
use motion_scan::ingest::{open_input, FrameSource};
use motion_scan::output::{FrameSink, OutputMode, SegmentWriter};
use motion_scan::reporter::Reporter;
use motion_scan::scan::{MotionScanner, RegionPolicy, ScanResult};
use motion_scan::time::{FrameTimecode, TimeValue};

/// Scan recorded footage for motion events.
#[derive(Debug, Parser)]
#[command(name = "mscan", version, about)]
struct Args {
    /// Input video files, scanned as one continuous timeline
    #[arg(required = true)]
    inputs: Vec<PathBuf>,

    /// TOML config file
    #[arg(short, long, env = "MSCAN_CONFIG")]
    config: Option<PathBuf>,

    /// Detector backend: adaptive, counting, or adaptive-gpu
    #[arg(short, long)]
    detector: Option<String>,

    /// Motion score threshold in [0, 1]
    #[arg(short, long)]
    threshold: Option<f64>,

    /// Odd morphology kernel size (default: picked from resolution)
    #[arg(long)]
    kernel_size: Option<u32>,

    /// Integer downscale factor for scoring
    #[arg(long)]
    downscale_factor: Option<u32>,

    /// Score every Nth frame
    #[arg(long)]
    frame_skip: Option<u64>,

    /// Scan window start (frames, seconds like "90s", or HH:MM:SS)
    #[arg(short, long)]
    start_time: Option<String>,

    /// Scan window end (exclusive)
    #[arg(short, long)]
    end_time: Option<String>,

    /// Scan window length, measured from its start
    #[arg(long, conflicts_with = "end_time")]
    duration: Option<String>,

    /// Sustained motion required to trigger an event
    #[arg(long)]
    min_event_len: Option<String>,

    /// Padding before each event
    #[arg(long)]
    time_pre_event: Option<String>,

    /// Padding after each event; also the merge distance
    #[arg(long)]
    time_post_event: Option<String>,

    /// Write one clip per event
    #[arg(long)]
    export: bool,

    /// Directory for exported clips
    #[arg(short, long)]
    output_dir: Option<PathBuf>,

    /// Encoder codec for exported clips
    #[arg(long)]
    codec: Option<String>,

    /// Burn source timecodes into exported clips
    #[arg(long)]
    timecode_overlay: bool,

    /// Write all events into one combined clip
    #[arg(long)]
    merge_events: bool,

    /// No progress bar
    #[arg(short, long)]
    quiet: bool,
}

struct ProgressReporter {
    bar: ProgressBar,
}

impl ProgressReporter {
    fn new(total_frames: u64) -> Self {
        let bar = ProgressBar::new(total_frames);
        bar.set_style(
            ProgressStyle::with_template(
                "{spinner} [{elapsed_precise}] [{bar:40}] {pos}/{len} frames ({per_sec})",
            )
            .unwrap_or_else(|_| ProgressStyle::default_bar()),
        );
        Self { bar }
    }
}

impl Reporter for ProgressReporter {
    fn progress(&self, frames_processed: u64, total_frames: u64) {
        if self.bar.length() != Some(total_frames) {
            self.bar.set_length(total_frames);
        }
        self.bar.set_position(frames_processed);
    }

    fn warning(&self, message: &str) {
        self.bar.suspend(|| log::warn!("{}", message));
    }
}

struct QuietReporter;

impl Reporter for QuietReporter {
    fn warning(&self, message: &str) {
        log::warn!("{}", message);
    }
}

fn apply_args(settings: &mut Settings, args: &Args) -> Result<()> {
    settings.inputs = args.inputs.clone();
    if let Some(name) = &args.detector {
        settings.detection.detector = motion_scan::DetectorType::parse(name)?;
    }
    if let Some(threshold) = args.threshold {
        settings.detection.threshold = threshold;
    }
    if let Some(k) = args.kernel_size {
        settings.detection.kernel_size = motion_scan::KernelSize::Size(k);
    }
    if let Some(factor) = args.downscale_factor {
        settings.detection.downscale_factor = factor;
    }
    if let Some(skip) = args.frame_skip {
        settings.frame_skip = skip;
    }
    if let Some(raw) = &args.start_time {
        settings.start_time = Some(raw.parse::<TimeValue>()?);
    }
    if let Some(raw) = &args.end_time {
        settings.end_time = Some(raw.parse::<TimeValue>()?);
    }
    if let Some(raw) = &args.duration {
        settings.duration = Some(raw.parse::<TimeValue>()?);
    }
    if let Some(raw) = &args.min_event_len {
        settings.min_event_len = raw.parse::<TimeValue>()?;
    }
    if let Some(raw) = &args.time_pre_event {
        settings.time_pre_event = raw.parse::<TimeValue>()?;
    }
    if let Some(raw) = &args.time_post_event {
        settings.time_post_event = raw.parse::<TimeValue>()?;
    }
    if args.export {
        settings.output_mode = OutputMode::Export;
    }
    if let Some(dir) = &args.output_dir {
        settings.export.output_dir = dir.clone();
    }
    if let Some(codec) = &args.codec {
        settings.export.codec = codec.clone();
    }
    if args.timecode_overlay {
        settings.export.timecode_overlay = true;
    }
    if args.merge_events {
        settings.export.merge_events = true;
    }
    settings.validate()?;
    Ok(())
}

#[cfg(feature = "video-ffmpeg")]
fn build_sink(settings: &Settings, frame_size: (u32, u32), frame_rate: f64) -> Result<SegmentWriter> {
    use motion_scan::output::ffmpeg::FfmpegEncoderFactory;
    std::fs::create_dir_all(&settings.export.output_dir).with_context(|| {
        format!(
            "cannot create output directory '{}'",
            settings.export.output_dir.display()
        )
    })?;
    let factory = FfmpegEncoderFactory::new(
        &settings.export.codec,
        settings.export.timecode_overlay,
    )?;
    Ok(SegmentWriter::new(
        settings.export.clone(),
        Box::new(factory),
        frame_size,
        frame_rate,
    ))
}

#[cfg(not(feature = "video-ffmpeg"))]
fn build_sink(_: &Settings, _: (u32, u32), _: f64) -> Result<SegmentWriter> {
    bail!("event export requires the video-ffmpeg feature");
}

fn print_events(result: &ScanResult) {
    if result.events.is_empty() {
        println!("no motion events found");
        return;
    }
    println!("{:<7} {:<14} {:<14} {:<14}", "Event", "Start", "End", "Duration");
    for (i, event) in result.events.iter().enumerate() {
        println!(
            "{:<7} {:<14} {:<14} {:<14}",
            i + 1,
            event.start_timecode(result.frame_rate),
            event.end_timecode(result.frame_rate),
            FrameTimecode::new(event.len(), result.frame_rate)
        );
    }
    for (r, events) in result.per_region.iter().enumerate() {
        println!("region {}: {} event(s)", r + 1, events.len());
        for event in events {
            println!(
                "    {} .. {}",
                event.start_timecode(result.frame_rate),
                event.end_timecode(result.frame_rate)
            );
        }
    }
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let args = Args::parse();

    let mut settings = Settings::load(args.config.as_deref())?;
    apply_args(&mut settings, &args)?;

    let inputs = settings
        .inputs
        .iter()
        .map(|path| open_input(path))
        .collect::<Result<Vec<_>, _>>()?;
    let frame_rate = inputs[0].frame_rate();
    let mut source = FrameSource::new(inputs, settings.trim(frame_rate), settings.frame_skip)?;
    log::info!(
        "scanning {} input(s), {} frames at {:.2} fps",
        settings.inputs.len(),
        source.total_frames(),
        frame_rate
    );

    let cancel = Arc::new(AtomicBool::new(false));
    {
        let cancel = cancel.clone();
        ctrlc::set_handler(move || {
            log::warn!("interrupt received, finishing up");
            cancel.store(true, Ordering::Relaxed);
        })
        .context("failed to install interrupt handler")?;
    }

    let scanner = MotionScanner::new(settings.detection, settings.event_params(frame_rate)?)?
        .with_regions(settings.regions.clone())
        .with_region_policy(settings.region_policy);

    let mut sink = match settings.output_mode {
        OutputMode::Export => Some(build_sink(&settings, source.frame_size(), frame_rate)?),
        OutputMode::ScanOnly => None,
    };

    let result = if args.quiet {
        scanner.scan(
            &mut source,
            &QuietReporter,
            &cancel,
            sink.as_mut().map(|s| s as &mut dyn FrameSink),
        )?
    } else {
        let reporter = ProgressReporter::new(source.total_frames());
        let result = scanner.scan(
            &mut source,
            &reporter,
            &cancel,
            sink.as_mut().map(|s| s as &mut dyn FrameSink),
        )?;
        reporter.bar.finish_and_clear();
        result
    };

    if result.cancelled {
        log::warn!(
            "scan interrupted after {} frames; results are partial",
            result.frames_read
        );
    }
    if result.decode_failures > 0 {
        log::warn!(
            "{} frame(s) could not be decoded and were repeated",
            result.decode_failures
        );
    }
    print_events(&result);
    if let Some(writer) = &sink {
        for path in writer.written() {
            log::info!("wrote {}", path.display());
        }
    }
    if let Some(err) = &result.export_error {
        bail!("scan finished but export failed: {}", err);
    }
    if matches!(settings.region_policy, RegionPolicy::PerRegion) && result.events.is_empty() {
        log::info!("no region reported motion");
    }
    Ok(())
}
