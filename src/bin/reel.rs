use std::{path::Path, time::Duration};

use clap::{CommandFactory, Parser, Subcommand};
use clap_complete::Shell;
use colored::Colorize;
use indicatif::{ProgressBar, ProgressStyle};
use reel::{
    CaptureOutcome, CaptureSession, DecodeSession, MediaKind, NativeLogLevel,
    OutputSampleFormat, SampleConverter, ScalingQuality, SizeStrategy,
};
use serde_json::json;

const CLI_AFTER_HELP: &str = "Examples:\n  reel inspect input.mp4 --json\n  reel decode input.mkv --progress\n  reel snapshot input.mp4 --at 00:01:30 --out still.png --max-width 320\n  reel completions zsh > _reel";

#[derive(Debug, Parser)]
#[command(
    name = "reel",
    version,
    about = "Inspect, decode and snapshot media files",
    after_help = CLI_AFTER_HELP
)]
struct Cli {
    #[command(flatten)]
    global: GlobalOptions,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Parser, Clone, Default)]
struct GlobalOptions {
    /// Show additional output.
    #[arg(long)]
    verbose: bool,

    /// Show a progress bar where supported.
    #[arg(long)]
    progress: bool,

    /// Allow overwriting existing output files.
    #[arg(long)]
    overwrite: bool,

    /// FFmpeg log level (quiet, panic, fatal, error, warning, info, verbose, debug, trace).
    #[arg(long)]
    log_level: Option<String>,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Print stream descriptors for a media file.
    #[command(
        about = "Print stream descriptors",
        visible_alias = "info",
        after_help = "Examples:\n  reel inspect input.mp4\n  reel inspect input.mp4 --json"
    )]
    Inspect {
        /// Input media path.
        input: String,

        /// Output as machine-readable JSON.
        #[arg(long)]
        json: bool,
    },

    /// Decode every video and audio frame and report totals.
    #[command(about = "Decode both streams to the end")]
    Decode {
        /// Input media path.
        input: String,

        /// Audio sample format used for conversion (u8, s16, s32, f32, f64).
        #[arg(long, default_value = "s16")]
        sample_format: String,

        /// Output as machine-readable JSON.
        #[arg(long)]
        json: bool,
    },

    /// Capture a single frame as an image.
    #[command(
        about = "Capture one frame at a timestamp",
        after_help = "Examples:\n  reel snapshot input.mp4 --at 12.5 --out frame.png\n  reel snapshot input.mp4 --at 01:00 --out thumb.jpg --max-width 160 --max-height 90"
    )]
    Snapshot {
        /// Input media path.
        input: String,

        /// Position (seconds, MM:SS or HH:MM:SS[.fff]).
        #[arg(long)]
        at: String,

        /// Output image path; the format follows the extension.
        #[arg(long)]
        out: String,

        /// Bound the output width, keeping the aspect ratio.
        #[arg(long)]
        max_width: Option<u32>,

        /// Bound the output height, keeping the aspect ratio.
        #[arg(long)]
        max_height: Option<u32>,

        /// Scaling algorithm (fast-bilinear, bilinear, bicubic, point, area).
        #[arg(long, default_value = "bilinear")]
        scaling: String,
    },

    /// Generate shell completion scripts.
    #[command(about = "Generate shell completions")]
    Completions {
        #[arg(value_enum)]
        shell: Shell,
    },
}

/// Parse a position given as plain seconds or a `[HH:]MM:SS[.fff]` clock.
fn parse_position(value: &str) -> Result<Duration, String> {
    let value = value.trim();
    let segments: Vec<&str> = value.split(':').collect();
    if value.is_empty() || segments.len() > 3 {
        return Err(format!("expected seconds or [HH:]MM:SS, got {value:?}"));
    }

    let (fraction, whole) = segments.split_last().ok_or("empty position")?;
    let seconds: f64 = fraction
        .parse()
        .map_err(|_| format!("invalid seconds {fraction:?} in {value:?}"))?;
    if !seconds.is_finite() || seconds < 0.0 || (!whole.is_empty() && seconds >= 60.0) {
        return Err(format!("seconds out of range in {value:?}"));
    }

    let mut minutes = 0_u64;
    for (depth, unit) in whole.iter().rev().enumerate() {
        let count: u64 = unit
            .parse()
            .map_err(|_| format!("invalid clock field {unit:?} in {value:?}"))?;
        if depth == 0 && whole.len() == 2 && count >= 60 {
            return Err(format!("minutes out of range in {value:?}"));
        }
        minutes = count
            .checked_mul(60_u64.pow(depth as u32))
            .and_then(|scaled| minutes.checked_add(scaled))
            .ok_or_else(|| format!("position {value:?} is too large"))?;
    }
    Duration::try_from_secs_f64(seconds)
        .ok()
        .zip(minutes.checked_mul(60))
        .and_then(|(fraction, clock)| Duration::from_secs(clock).checked_add(fraction))
        .ok_or_else(|| format!("position {value:?} is too large"))
}

fn parse_sample_format(value: &str) -> Option<OutputSampleFormat> {
    match value.to_ascii_lowercase().as_str() {
        "u8" => Some(OutputSampleFormat::U8),
        "s16" | "i16" => Some(OutputSampleFormat::I16),
        "s32" | "i32" => Some(OutputSampleFormat::I32),
        "f32" | "flt" => Some(OutputSampleFormat::F32),
        "f64" | "dbl" => Some(OutputSampleFormat::F64),
        _ => None,
    }
}

fn parse_scaling(value: &str) -> Option<ScalingQuality> {
    match value.to_ascii_lowercase().as_str() {
        "fast-bilinear" | "fast_bilinear" => Some(ScalingQuality::FastBilinear),
        "bilinear" => Some(ScalingQuality::Bilinear),
        "bicubic" => Some(ScalingQuality::Bicubic),
        "point" | "nearest" => Some(ScalingQuality::Point),
        "area" => Some(ScalingQuality::Area),
        _ => None,
    }
}

fn size_strategy(max_width: Option<u32>, max_height: Option<u32>) -> SizeStrategy {
    match (max_width, max_height) {
        (None, None) => SizeStrategy::native(),
        (width, height) => SizeStrategy::fit_within(width.unwrap_or(u32::MAX), height.unwrap_or(u32::MAX)),
    }
}

/// Refuse to clobber `path` unless `--overwrite` was given. Returns whether
/// an existing file will be replaced.
fn claim_output(path: &Path, overwrite: bool) -> Result<bool, String> {
    match (path.try_exists(), overwrite) {
        (Ok(false), _) => Ok(false),
        (Ok(true), true) => Ok(true),
        (Ok(true), false) => Err(format!(
            "{} exists; pass --overwrite to replace it",
            path.display()
        )),
        (Err(error), _) => Err(format!("cannot check {}: {error}", path.display())),
    }
}

impl GlobalOptions {
    fn native_log_level(&self) -> Result<Option<NativeLogLevel>, String> {
        self.log_level
            .as_deref()
            .map(|level| {
                level
                    .parse::<NativeLogLevel>()
                    .map_err(|_| format!("unsupported --log-level: {level}"))
            })
            .transpose()
    }

    /// Bring FFmpeg up and route its log output before any command runs.
    fn install(&self) -> Result<(), Box<dyn std::error::Error>> {
        let level = self.native_log_level()?;
        reel::ffmpeg::initialize()?;
        if let Some(level) = level {
            reel::set_native_log_level(level);
        }
        Ok(())
    }
}

#[derive(Debug, Default)]
struct DecodeTotals {
    video_frames: u64,
    audio_frames: u64,
    audio_samples: u64,
    audio_bytes: u64,
}

fn run() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    cli.global.install()?;

    match cli.command {
        Commands::Inspect { input, json } => {
            let session = DecodeSession::open(&input)?;
            let info = session.info();
            if json {
                let payload = json!({
                    "path": session.path().display().to_string(),
                    "format": info.format,
                    "duration_seconds": info.duration.as_secs_f64(),
                    "streams": info.stream_count,
                    "video": info.video.as_ref().map(|video| json!({
                        "stream_index": video.stream_index,
                        "width": video.width,
                        "height": video.height,
                        "fps": video.frames_per_second,
                        "pixel_format": format!("{:?}", video.pixel_format),
                        "codec": video.codec,
                    })),
                    "audio": info.audio.as_ref().map(|audio| json!({
                        "stream_index": audio.stream_index,
                        "sample_rate": audio.sample_rate,
                        "channels": audio.channels,
                        "sample_format": format!("{:?}", audio.sample_format),
                        "codec": audio.codec,
                    })),
                });
                println!("{}", serde_json::to_string_pretty(&payload)?);
            } else {
                println!("Format: {}", info.format);
                println!("Duration: {:?}", info.duration);
                println!("Streams: {}", info.stream_count);
                if let Some(video) = &info.video {
                    println!(
                        "Video: #{} {}x{} @ {:.2} fps {:?} [{}]",
                        video.stream_index,
                        video.width,
                        video.height,
                        video.frames_per_second,
                        video.pixel_format,
                        video.codec,
                    );
                }
                if let Some(audio) = &info.audio {
                    println!(
                        "Audio: #{} {} Hz, {} ch {:?} [{}]",
                        audio.stream_index,
                        audio.sample_rate,
                        audio.channels,
                        audio.sample_format,
                        audio.codec,
                    );
                }
            }
        }
        Commands::Decode {
            input,
            sample_format,
            json,
        } => {
            let format = parse_sample_format(&sample_format)
                .ok_or(format!("unsupported --sample-format: {sample_format}"))?;
            let session = DecodeSession::open(&input)?;
            let mut samples = SampleConverter::new(format);
            let mut totals = DecodeTotals::default();

            let progress_bar = if cli.global.progress {
                let millis = session.info().duration.as_millis() as u64;
                let pb = ProgressBar::new(millis.max(1));
                let style = ProgressStyle::with_template(
                    "{spinner:.green} {bar:40.cyan/blue} {elapsed_precise} {msg}",
                )?;
                pb.set_style(style.progress_chars("##-"));
                Some(pb)
            } else {
                None
            };

            // Alternate between the cursors so neither queue grows unbounded.
            let mut video_done = !session.has(MediaKind::Video);
            let mut audio_done = !session.has(MediaKind::Audio);
            while !video_done || !audio_done {
                if !video_done {
                    match session.read_video_frame()? {
                        Some(frame) => {
                            totals.video_frames += 1;
                            if let (Some(pb), Some(time_base)) =
                                (&progress_bar, session.time_base(MediaKind::Video))
                            {
                                if let Some(position) = frame.timestamp(time_base) {
                                    pb.set_position(position.as_millis() as u64);
                                }
                            }
                        }
                        None => video_done = true,
                    }
                }
                if !audio_done {
                    match session.read_audio_frame()? {
                        Some(frame) => {
                            let buffer = samples.convert(&frame)?;
                            totals.audio_frames += 1;
                            totals.audio_samples += buffer.samples as u64;
                            totals.audio_bytes += buffer.len() as u64;
                        }
                        None => audio_done = true,
                    }
                }
            }

            if let Some(pb) = progress_bar {
                pb.finish_with_message("done");
            }

            if cli.global.verbose {
                eprintln!(
                    "packets read: {}, video cursor: {:?}, audio cursor: {:?}",
                    session.packets_read(),
                    session.cursor_state(MediaKind::Video),
                    session.cursor_state(MediaKind::Audio)
                );
            }

            if json {
                let payload = json!({
                    "video_frames": totals.video_frames,
                    "audio_frames": totals.audio_frames,
                    "audio_samples": totals.audio_samples,
                    "audio_bytes": totals.audio_bytes,
                    "packets_read": session.packets_read(),
                });
                println!("{}", serde_json::to_string_pretty(&payload)?);
            } else {
                println!(
                    "{} {}",
                    "success:".green().bold(),
                    format!(
                        "Decoded {} video frame(s), {} audio frame(s) ({} samples, {} bytes)",
                        totals.video_frames,
                        totals.audio_frames,
                        totals.audio_samples,
                        totals.audio_bytes
                    )
                    .green()
                );
            }
        }
        Commands::Snapshot {
            input,
            at,
            out,
            max_width,
            max_height,
            scaling,
        } => {
            let position = parse_position(&at)?;
            let scaling = parse_scaling(&scaling).ok_or(format!("unsupported --scaling: {scaling}"))?;
            let out_path = Path::new(&out);
            if claim_output(out_path, cli.global.overwrite)? {
                eprintln!(
                    "{} {}",
                    "warning:".yellow().bold(),
                    format!("replacing {}", out_path.display()).yellow()
                );
            }

            let session = CaptureSession::open(&input, size_strategy(max_width, max_height))?
                .with_scaling(scaling);
            match session.capture_at(position)? {
                CaptureOutcome::Captured(frame) => {
                    frame.save(out_path)?;
                    if cli.global.verbose {
                        eprintln!(
                            "captured frame at {:?} ({}x{}, stride {})",
                            frame.pts, frame.width, frame.height, frame.stride
                        );
                    }
                    println!(
                        "{} {}",
                        "saved".green().bold(),
                        format!("{}x{} -> {}", frame.width, frame.height, out_path.display()).green()
                    );
                }
                CaptureOutcome::Skipped => {
                    return Err("capture was skipped because another capture is running".into());
                }
            }
        }
        Commands::Completions { shell } => {
            let mut command = Cli::command();
            clap_complete::generate(shell, &mut command, "reel", &mut std::io::stdout());
        }
    }

    Ok(())
}

fn main() {
    if let Err(error) = run() {
        eprintln!("error: {error}");
        std::process::exit(1);
    }
}
