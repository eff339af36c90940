//! Native library plumbing: one-time initialisation, FFmpeg's own log level,
//! and formatting of raw return codes.
//!
//! FFmpeg has its own internal logging system, separate from the Rust
//! [`log`](https://crates.io/crates/log) crate. By default it prints warnings
//! and errors to stderr. [`set_native_log_level`] tunes that output without
//! callers importing `ffmpeg-next` directly.
//!
//! # Example
//!
//! ```no_run
//! use reel::{DecodeSession, NativeLogLevel};
//!
//! reel::set_native_log_level(NativeLogLevel::Error);
//! let session = DecodeSession::open("input.mp4")?;
//! # Ok::<(), reel::ReelError>(())
//! ```

use std::{
    ffi::c_int,
    fmt::{Display, Formatter, Result as FmtResult},
    str::FromStr,
    sync::OnceLock,
};

use ffmpeg_next::util::log::Level;

use crate::error::ReelError;

static INITIALIZED: OnceLock<Result<(), String>> = OnceLock::new();

/// Initialise the FFmpeg libraries.
///
/// The first call performs the work and caches the outcome; later calls
/// return the cached result. Every session constructor calls this, so
/// applications only need it when they touch FFmpeg before opening media.
pub fn initialize() -> Result<(), ReelError> {
    INITIALIZED
        .get_or_init(|| {
            log::debug!("Initialising FFmpeg");
            ffmpeg_next::init().map_err(|error| error.to_string())
        })
        .clone()
        .map_err(|reason| ReelError::FfmpegError(format!("initialisation failed: {reason}")))
}

/// Format a raw FFmpeg return code as its human-readable message.
///
/// Used for the few calls that go straight through `ffmpeg-sys-next`.
pub(crate) fn describe_error(code: c_int) -> String {
    ffmpeg_next::Error::from(code).to_string()
}

/// FFmpeg internal log verbosity level.
///
/// Setting a level causes FFmpeg to suppress all messages below that
/// severity. Ordered from quietest to most verbose.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NativeLogLevel {
    /// Print no output at all.
    Quiet,
    /// Only conditions the process cannot recover from.
    Panic,
    /// Unrecoverable errors that invalidate a context.
    Fatal,
    /// Recoverable errors.
    Error,
    /// Warnings (FFmpeg's default).
    Warning,
    /// Informational messages.
    Info,
    /// Verbose informational messages.
    Verbose,
    /// Debugging messages.
    Debug,
    /// Extremely verbose tracing output.
    Trace,
}

impl NativeLogLevel {
    fn to_ffmpeg_level(self) -> Level {
        match self {
            NativeLogLevel::Quiet => Level::Quiet,
            NativeLogLevel::Panic => Level::Panic,
            NativeLogLevel::Fatal => Level::Fatal,
            NativeLogLevel::Error => Level::Error,
            NativeLogLevel::Warning => Level::Warning,
            NativeLogLevel::Info => Level::Info,
            NativeLogLevel::Verbose => Level::Verbose,
            NativeLogLevel::Debug => Level::Debug,
            NativeLogLevel::Trace => Level::Trace,
        }
    }

    fn from_ffmpeg_level(level: Level) -> Self {
        match level {
            Level::Quiet => NativeLogLevel::Quiet,
            Level::Panic => NativeLogLevel::Panic,
            Level::Fatal => NativeLogLevel::Fatal,
            Level::Error => NativeLogLevel::Error,
            Level::Warning => NativeLogLevel::Warning,
            Level::Info => NativeLogLevel::Info,
            Level::Verbose => NativeLogLevel::Verbose,
            Level::Debug => NativeLogLevel::Debug,
            Level::Trace => NativeLogLevel::Trace,
        }
    }

    fn name(self) -> &'static str {
        match self {
            NativeLogLevel::Quiet => "quiet",
            NativeLogLevel::Panic => "panic",
            NativeLogLevel::Fatal => "fatal",
            NativeLogLevel::Error => "error",
            NativeLogLevel::Warning => "warning",
            NativeLogLevel::Info => "info",
            NativeLogLevel::Verbose => "verbose",
            NativeLogLevel::Debug => "debug",
            NativeLogLevel::Trace => "trace",
        }
    }
}

impl Display for NativeLogLevel {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        f.write_str(self.name())
    }
}

impl FromStr for NativeLogLevel {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "quiet" => Ok(NativeLogLevel::Quiet),
            "panic" => Ok(NativeLogLevel::Panic),
            "fatal" => Ok(NativeLogLevel::Fatal),
            "error" => Ok(NativeLogLevel::Error),
            "warning" | "warn" => Ok(NativeLogLevel::Warning),
            "info" => Ok(NativeLogLevel::Info),
            "verbose" => Ok(NativeLogLevel::Verbose),
            "debug" => Ok(NativeLogLevel::Debug),
            "trace" => Ok(NativeLogLevel::Trace),
            other => Err(format!("unknown FFmpeg log level: {other}")),
        }
    }
}

/// Set the FFmpeg internal log verbosity level.
///
/// Affects what FFmpeg prints to stderr, not Rust-side `log` output.
pub fn set_native_log_level(level: NativeLogLevel) {
    ffmpeg_next::util::log::set_level(level.to_ffmpeg_level());
}

/// Get the current FFmpeg internal log verbosity level.
///
/// Returns `None` if the current level does not map to a known variant.
pub fn native_log_level() -> Option<NativeLogLevel> {
    ffmpeg_next::util::log::get_level()
        .ok()
        .map(NativeLogLevel::from_ffmpeg_level)
}
