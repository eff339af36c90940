//! Stream descriptors.
//!
//! Collected once when a session opens its container and cached for the
//! session's lifetime. Presentation layers use them to size bitmaps and audio
//! surfaces before the first frame arrives.

use std::time::Duration;

use ffmpeg_next::{
    Rational, Stream,
    codec::decoder,
    format::{Pixel, Sample, context::Input},
};

/// Container-level description of an opened media file.
///
/// # Example
///
/// ```no_run
/// use reel::DecodeSession;
///
/// let session = DecodeSession::open("input.mp4")?;
/// let info = session.info();
/// println!("{} / {:?}", info.format, info.duration);
/// if let Some(video) = &info.video {
///     println!("{}x{} {}", video.width, video.height, video.codec);
/// }
/// # Ok::<(), reel::ReelError>(())
/// ```
#[derive(Debug, Clone)]
#[must_use]
pub struct MediaInfo {
    /// The selected video stream, if the container has one.
    pub video: Option<VideoStreamInfo>,
    /// The selected audio stream, if the container has one.
    pub audio: Option<AudioStreamInfo>,
    /// Container duration, or zero when unknown.
    pub duration: Duration,
    /// Container format name (e.g. `"mov,mp4,m4a,3gp,3g2,mj2"`, `"matroska,webm"`).
    pub format: String,
    /// Number of streams of any type in the container.
    pub stream_count: usize,
}

/// Descriptor of the selected video stream.
#[derive(Debug, Clone)]
#[must_use]
pub struct VideoStreamInfo {
    /// Index of the stream within the container.
    pub stream_index: usize,
    /// Coded width in pixels.
    pub width: u32,
    /// Coded height in pixels.
    pub height: u32,
    /// Native pixel format the decoder produces.
    pub pixel_format: Pixel,
    /// Average frame rate, `0.0` when the container does not say.
    pub frames_per_second: f64,
    /// Time base of the stream's timestamps.
    pub time_base: Rational,
    /// Decoder name (e.g. `"h264"`).
    pub codec: String,
}

/// Descriptor of the selected audio stream.
#[derive(Debug, Clone)]
#[must_use]
pub struct AudioStreamInfo {
    /// Index of the stream within the container.
    pub stream_index: usize,
    /// Sample rate in hertz.
    pub sample_rate: u32,
    /// Number of channels.
    pub channels: u16,
    /// Native sample format the decoder produces.
    pub sample_format: Sample,
    /// Time base of the stream's timestamps.
    pub time_base: Rational,
    /// Decoder name (e.g. `"aac"`).
    pub codec: String,
}

impl MediaInfo {
    pub(crate) fn new(
        input: &Input,
        video: Option<VideoStreamInfo>,
        audio: Option<AudioStreamInfo>,
    ) -> Self {
        let duration = u64::try_from(input.duration())
            .map(Duration::from_micros)
            .unwrap_or(Duration::ZERO);
        Self {
            video,
            audio,
            duration,
            format: input.format().name().to_string(),
            stream_count: input.streams().count(),
        }
    }
}

impl VideoStreamInfo {
    pub(crate) fn new(stream: &Stream, decoder: &decoder::Video) -> Self {
        let rate = stream.avg_frame_rate();
        let frames_per_second = if rate.denominator() > 0 {
            rate.numerator() as f64 / rate.denominator() as f64
        } else {
            0.0
        };
        Self {
            stream_index: stream.index(),
            width: decoder.width(),
            height: decoder.height(),
            pixel_format: decoder.format(),
            frames_per_second,
            time_base: stream.time_base(),
            codec: codec_name(decoder),
        }
    }
}

impl AudioStreamInfo {
    pub(crate) fn new(stream: &Stream, decoder: &decoder::Audio) -> Self {
        Self {
            stream_index: stream.index(),
            sample_rate: decoder.rate(),
            channels: decoder.channels(),
            sample_format: decoder.format(),
            time_base: stream.time_base(),
            codec: codec_name(decoder),
        }
    }
}

fn codec_name(decoder: &decoder::Opened) -> String {
    decoder
        .codec()
        .map(|codec| codec.name().to_string())
        .unwrap_or_else(|| "unknown".to_string())
}
