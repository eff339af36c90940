//! Error types for the `reel` crate.
//!
//! This module defines [`ReelError`], the unified error type returned by all
//! fallible operations in the crate. Native FFmpeg return codes are always
//! translated into their message text before they end up in an error value.
//!
//! Two outcomes that look like failures are deliberately *not* errors:
//! running out of frames (`Ok(None)` from
//! [`DecodeSession::read_next_frame`](crate::DecodeSession::read_next_frame))
//! and a rejected concurrent capture
//! ([`CaptureOutcome::Skipped`](crate::CaptureOutcome::Skipped)).

use std::{io::Error as IoError, path::PathBuf, time::Duration};

use ffmpeg_next::Error as FfmpegError;
use image::ImageError;
use thiserror::Error;

use crate::frame::MediaKind;

/// The unified error type for all `reel` operations.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum ReelError {
    /// The media file could not be opened or its streams could not be read.
    #[error("Failed to open media file at {path}: {reason}")]
    FileOpen {
        /// Absolute path that was being opened.
        path: PathBuf,
        /// Underlying reason the open failed.
        reason: String,
    },

    /// The container holds neither a video nor an audio stream.
    #[error("No video or audio stream found in {path}")]
    NoMediaStreams {
        /// Absolute path of the container.
        path: PathBuf,
    },

    /// The file does not contain a video stream.
    #[error("No video stream found in file")]
    NoVideoStream,

    /// The file does not contain an audio stream.
    #[error("No audio stream found in file")]
    NoAudioStream,

    /// No decoder is registered for the stream's codec.
    #[error("No {media} decoder available for codec {codec}")]
    DecoderNotFound {
        /// Media type of the stream.
        media: MediaKind,
        /// Codec identifier as reported by FFmpeg.
        codec: String,
    },

    /// The codec context could not be allocated, parameterised or opened.
    #[error("Failed to open {media} codec: {reason}")]
    CodecOpen {
        /// Media type of the stream.
        media: MediaKind,
        /// Underlying reason.
        reason: String,
    },

    /// A video packet could not be sent to, or a frame received from, the decoder.
    #[error("Failed to decode video frame: {0}")]
    VideoDecodeError(String),

    /// An audio packet could not be sent to, or a frame received from, the decoder.
    #[error("Failed to decode audio frame: {0}")]
    AudioDecodeError(String),

    /// The scaling context could not be built or a frame could not be converted.
    #[error("Failed to convert frame: {0}")]
    ConversionError(String),

    /// The resampling context could not be built or samples could not be converted.
    #[error("Failed to convert audio samples: {0}")]
    ResampleError(String),

    /// Seeking the container failed.
    #[error("Failed to seek to {position:?}: {reason}")]
    SeekFailed {
        /// Requested position.
        position: Duration,
        /// Underlying reason.
        reason: String,
    },

    /// A capture position was negative or not a number.
    #[error("Invalid capture position: {0} seconds")]
    InvalidPosition(f64),

    /// No frame at or after the requested position exists in the stream.
    #[error("Capture position unreachable: {0:?}")]
    CaptureUnreachable(Duration),

    /// The capture size strategy produced a non-positive size.
    #[error("Capture size must be positive, got {width}x{height}")]
    InvalidCaptureSize {
        /// Resolved width.
        width: u32,
        /// Resolved height.
        height: u32,
    },

    /// A thumbnail was requested before any media was opened.
    #[error("No media is open")]
    NoMediaOpen,

    /// A background decode or capture task was dropped before finishing.
    #[error("Operation was cancelled")]
    Cancelled,

    /// An error originating from the FFmpeg libraries.
    #[error("FFmpeg error: {0}")]
    FfmpegError(String),

    /// An I/O error occurred while resolving paths or writing files.
    #[error("I/O error: {0}")]
    IoError(#[from] IoError),

    /// An error from the `image` crate while encoding a captured frame.
    #[error("Image processing error: {0}")]
    ImageError(#[from] ImageError),
}

impl ReelError {
    /// Build the decode error variant matching a media kind.
    pub(crate) fn decode(kind: MediaKind, message: impl Into<String>) -> Self {
        match kind {
            MediaKind::Video => ReelError::VideoDecodeError(message.into()),
            MediaKind::Audio => ReelError::AudioDecodeError(message.into()),
        }
    }

    /// Build the missing-stream variant matching a media kind.
    pub(crate) fn missing_stream(kind: MediaKind) -> Self {
        match kind {
            MediaKind::Video => ReelError::NoVideoStream,
            MediaKind::Audio => ReelError::NoAudioStream,
        }
    }
}

impl From<FfmpegError> for ReelError {
    fn from(error: FfmpegError) -> Self {
        ReelError::FfmpegError(error.to_string())
    }
}
