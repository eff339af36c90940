//! Audio sample format conversion.
//!
//! Decoders hand out samples in whatever layout the codec prefers (planar
//! float for AAC, packed 16-bit for PCM, ...). [`SampleConverter`] turns them
//! into one interleaved buffer of the format the caller asked for. Channel
//! layout and sample rate are carried through untouched.

use std::time::Duration;

use ffmpeg_next::{
    ChannelLayout,
    format::{Sample, sample::Type as SampleType},
    frame::Audio as AudioFrame,
    software::resampling::Context as ResamplingContext,
};

use crate::{error::ReelError, frame::FrameHandle};

/// Interleaved output sample representation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum OutputSampleFormat {
    /// Unsigned 8-bit.
    U8,
    /// Signed 16-bit. This is the default.
    #[default]
    I16,
    /// Signed 32-bit.
    I32,
    /// 32-bit float.
    F32,
    /// 64-bit float.
    F64,
}

impl OutputSampleFormat {
    /// Map to the packed FFmpeg sample format.
    pub fn to_ffmpeg_sample(self) -> Sample {
        match self {
            OutputSampleFormat::U8 => Sample::U8(SampleType::Packed),
            OutputSampleFormat::I16 => Sample::I16(SampleType::Packed),
            OutputSampleFormat::I32 => Sample::I32(SampleType::Packed),
            OutputSampleFormat::F32 => Sample::F32(SampleType::Packed),
            OutputSampleFormat::F64 => Sample::F64(SampleType::Packed),
        }
    }

    /// Width of one sample of one channel.
    pub fn bytes_per_sample(self) -> usize {
        match self {
            OutputSampleFormat::U8 => 1,
            OutputSampleFormat::I16 => 2,
            OutputSampleFormat::I32 | OutputSampleFormat::F32 => 4,
            OutputSampleFormat::F64 => 8,
        }
    }

    /// Whether samples carry a sign.
    pub fn is_signed(self) -> bool {
        !matches!(self, OutputSampleFormat::U8)
    }

    /// Whether samples are IEEE floats.
    pub fn is_float(self) -> bool {
        matches!(self, OutputSampleFormat::F32 | OutputSampleFormat::F64)
    }
}

/// Interleaved audio produced by [`SampleConverter::convert`].
#[derive(Debug, Clone)]
#[must_use]
pub struct AudioBuffer {
    /// Interleaved sample bytes.
    pub data: Vec<u8>,
    /// Samples per channel.
    pub samples: usize,
    /// Number of interleaved channels.
    pub channels: u16,
    /// Sample rate in hertz.
    pub sample_rate: u32,
    /// Width of one sample of one channel.
    pub bytes_per_sample: usize,
    /// Representation of each sample.
    pub format: OutputSampleFormat,
}

impl AudioBuffer {
    /// Raw interleaved bytes.
    pub fn as_bytes(&self) -> &[u8] {
        &self.data
    }

    /// Length of the buffer in bytes.
    pub fn len(&self) -> usize {
        self.data.len()
    }

    /// Whether the buffer holds no samples.
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Playback length of the buffer.
    pub fn duration(&self) -> Duration {
        if self.sample_rate == 0 {
            return Duration::ZERO;
        }
        Duration::from_secs_f64(self.samples as f64 / self.sample_rate as f64)
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
struct InputLayout {
    format: Sample,
    channel_layout: ChannelLayout,
    rate: u32,
}

impl InputLayout {
    fn of(frame: &AudioFrame) -> Self {
        let mut channel_layout = frame.channel_layout();
        if channel_layout.is_empty() {
            channel_layout = ChannelLayout::default(i32::from(frame.channels()));
        }
        Self {
            format: frame.format(),
            channel_layout,
            rate: frame.rate(),
        }
    }
}

/// Converts decoded audio frames into one interleaved output format.
///
/// # Example
///
/// ```no_run
/// use reel::{DecodeSession, OutputSampleFormat, SampleConverter};
///
/// let session = DecodeSession::open("input.mp4")?;
/// let mut converter = SampleConverter::new(OutputSampleFormat::I16);
/// while let Some(frame) = session.read_audio_frame()? {
///     let buffer = converter.convert(&frame)?;
///     println!("{} samples x {} channels", buffer.samples, buffer.channels);
/// }
/// # Ok::<(), reel::ReelError>(())
/// ```
pub struct SampleConverter {
    format: OutputSampleFormat,
    resampler: Option<(InputLayout, ResamplingContext)>,
}

impl SampleConverter {
    /// Create a converter producing `format`.
    pub fn new(format: OutputSampleFormat) -> Self {
        Self {
            format,
            resampler: None,
        }
    }

    /// The output representation.
    pub fn format(&self) -> OutputSampleFormat {
        self.format
    }

    /// Convert one decoded audio frame.
    ///
    /// # Errors
    ///
    /// [`ReelError::ResampleError`] if the handle holds no live audio frame,
    /// the resampler cannot be built, or conversion fails.
    pub fn convert(&mut self, frame: &FrameHandle) -> Result<AudioBuffer, ReelError> {
        let audio_frame = frame.audio().ok_or_else(|| {
            ReelError::ResampleError("handle does not hold a live audio frame".to_string())
        })?;
        self.convert_frame(audio_frame)
    }

    fn convert_frame(&mut self, frame: &AudioFrame) -> Result<AudioBuffer, ReelError> {
        let input = InputLayout::of(frame);
        let output_format = self.format.to_ffmpeg_sample();

        let reusable = matches!(&self.resampler, Some((layout, _)) if *layout == input);
        if !reusable {
            let resampler = ResamplingContext::get(
                input.format,
                input.channel_layout,
                input.rate,
                output_format,
                input.channel_layout,
                input.rate,
            )
            .map_err(|error| {
                ReelError::ResampleError(format!("Failed to create resampler: {error}"))
            })?;
            log::debug!(
                "Built resampler {:?} @ {} Hz -> {:?}",
                input.format,
                input.rate,
                output_format
            );
            self.resampler = Some((input, resampler));
        }
        let (_, resampler) = self
            .resampler
            .as_mut()
            .ok_or_else(|| ReelError::ResampleError("resampler unavailable".to_string()))?;

        let mut converted = AudioFrame::empty();
        resampler
            .run(frame, &mut converted)
            .map_err(|error| ReelError::ResampleError(format!("Resample error: {error}")))?;

        let channels = frame.channels();
        let bytes_per_sample = self.format.bytes_per_sample();
        let samples = converted.samples();
        let length = samples * usize::from(channels) * bytes_per_sample;
        let data = if samples == 0 {
            Vec::new()
        } else {
            let plane = converted.data(0);
            if plane.len() < length {
                return Err(ReelError::ResampleError(format!(
                    "resampler produced {} bytes, expected {length}",
                    plane.len()
                )));
            }
            plane[..length].to_vec()
        };

        Ok(AudioBuffer {
            data,
            samples,
            channels,
            sample_rate: input.rate,
            bytes_per_sample,
            format: self.format,
        })
    }
}
