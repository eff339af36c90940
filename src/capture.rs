//! Single-frame capture at an arbitrary timestamp.
//!
//! A [`CaptureSession`] owns its own container and video decoder, independent
//! of any [`DecodeSession`](crate::DecodeSession) that may be playing the same
//! file. Each capture seeks backward to the nearest point at or before the
//! requested position, decodes forward to the first frame at or after it and
//! scales that frame to BGR24 at the session's target size.
//!
//! Captures are single-flight: while one is running, another request on the
//! same session returns [`CaptureOutcome::Skipped`] immediately.

use std::{
    fmt::{Debug, Formatter, Result as FmtResult},
    path::{Path, PathBuf},
    sync::{Arc, Mutex},
    time::Duration,
};

use ffmpeg_next::format::Pixel;
use image::RgbImage;

use crate::{
    configuration::{OutputPixelFormat, RebuildPolicy, ScalingQuality},
    conversion::{aligned_stride, pts_to_seconds},
    decoder::{PacketDecoder, StreamDecoder},
    demux::{Demuxer, select_streams},
    error::ReelError,
    ffmpeg::initialize,
    frame::MediaKind,
    metadata::VideoStreamInfo,
    pixel::{FrameGeometry, PixelConverter},
    session::lock,
};

const CAPTURE_FORMAT: OutputPixelFormat = OutputPixelFormat::Bgr24;

/// Maps the native video size to the capture size.
#[derive(Clone)]
pub struct SizeStrategy {
    resolve: Arc<dyn Fn(u32, u32) -> (u32, u32) + Send + Sync>,
}

impl SizeStrategy {
    /// Capture at the stream's native size.
    pub fn native() -> Self {
        Self::custom(|width, height| (width, height))
    }

    /// Shrink to fit inside `max_width` x `max_height`, keeping the aspect
    /// ratio. Frames that already fit are not enlarged; neither side is ever
    /// rounded down to zero.
    pub fn fit_within(max_width: u32, max_height: u32) -> Self {
        Self::custom(move |width, height| fit_dimensions(width, height, max_width, max_height))
    }

    /// Use an arbitrary mapping.
    pub fn custom<F>(resolve: F) -> Self
    where
        F: Fn(u32, u32) -> (u32, u32) + Send + Sync + 'static,
    {
        Self {
            resolve: Arc::new(resolve),
        }
    }

    /// Apply the strategy to a native size.
    pub fn resolve(&self, width: u32, height: u32) -> (u32, u32) {
        (self.resolve)(width, height)
    }
}

impl Default for SizeStrategy {
    fn default() -> Self {
        Self::native()
    }
}

impl Debug for SizeStrategy {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        f.write_str("SizeStrategy")
    }
}

fn fit_dimensions(width: u32, height: u32, max_width: u32, max_height: u32) -> (u32, u32) {
    if width == 0 || height == 0 {
        return (width, height);
    }
    let scale = (max_width as f64 / width as f64)
        .min(max_height as f64 / height as f64)
        .min(1.0);
    let fitted_width = ((width as f64 * scale).round() as u32).clamp(1, width);
    let fitted_height = ((height as f64 * scale).round() as u32).clamp(1, height);
    (fitted_width, fitted_height)
}

/// Single-flight admission for captures.
#[derive(Debug, Default)]
pub struct CaptureGate {
    in_flight: Mutex<bool>,
}

impl CaptureGate {
    /// Create an idle gate.
    pub fn new() -> Self {
        Self::default()
    }

    /// Claim the gate, or `None` if a capture already holds it.
    pub fn try_acquire(&self) -> Option<CapturePermit<'_>> {
        self.try_claim().then(|| CapturePermit { gate: self })
    }

    /// Whether a capture currently holds the gate.
    pub fn is_busy(&self) -> bool {
        *lock(&self.in_flight)
    }

    fn try_claim(&self) -> bool {
        let mut in_flight = lock(&self.in_flight);
        if *in_flight {
            return false;
        }
        *in_flight = true;
        true
    }

    fn release(&self) {
        *lock(&self.in_flight) = false;
    }
}

/// Held for the duration of one capture; dropping it reopens the gate.
#[derive(Debug)]
#[must_use]
pub struct CapturePermit<'a> {
    gate: &'a CaptureGate,
}

impl Drop for CapturePermit<'_> {
    fn drop(&mut self) {
        self.gate.release();
    }
}

/// A captured still, BGR24 with 4-byte-aligned rows.
#[derive(Debug, Clone)]
#[must_use]
pub struct CapturedFrame {
    /// Row-major pixel bytes, `stride * height` long.
    pub data: Vec<u8>,
    /// Width in pixels.
    pub width: u32,
    /// Height in pixels.
    pub height: u32,
    /// Bytes per row including padding.
    pub stride: usize,
    /// Presentation time of the decoded frame.
    pub pts: Option<Duration>,
}

impl CapturedFrame {
    /// Pixel format of [`data`](CapturedFrame::data).
    pub fn format(&self) -> Pixel {
        CAPTURE_FORMAT.to_ffmpeg_pixel()
    }

    /// One row without its padding, `None` when `y` is outside the frame.
    pub fn row(&self, y: u32) -> Option<&[u8]> {
        if y >= self.height {
            return None;
        }
        let start = y as usize * self.stride;
        self.data
            .get(start..start + self.width as usize * CAPTURE_FORMAT.bytes_per_pixel())
    }

    /// Copy into an RGB image, dropping row padding.
    pub fn to_rgb_image(&self) -> Result<RgbImage, ReelError> {
        let mut rgb = Vec::with_capacity(self.width as usize * self.height as usize * 3);
        for y in 0..self.height {
            let row = self.row(y).ok_or_else(|| {
                ReelError::ConversionError(format!(
                    "captured frame is missing row {y} of {}",
                    self.height
                ))
            })?;
            for pixel in row.chunks_exact(3) {
                rgb.extend_from_slice(&[pixel[2], pixel[1], pixel[0]]);
            }
        }
        RgbImage::from_raw(self.width, self.height, rgb).ok_or_else(|| {
            ReelError::ConversionError(format!(
                "captured frame does not fill a {}x{} image",
                self.width, self.height
            ))
        })
    }

    /// Encode to an image file; the format follows the extension.
    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<(), ReelError> {
        self.to_rgb_image()?.save(path.as_ref())?;
        Ok(())
    }
}

/// Result of a capture request.
#[derive(Debug)]
#[must_use]
pub enum CaptureOutcome {
    /// The frame at or after the requested position.
    Captured(CapturedFrame),
    /// Another capture was in flight; nothing was done.
    Skipped,
}

impl CaptureOutcome {
    /// The captured frame, if any.
    pub fn into_frame(self) -> Option<CapturedFrame> {
        match self {
            CaptureOutcome::Captured(frame) => Some(frame),
            CaptureOutcome::Skipped => None,
        }
    }

    /// Whether the request was rejected by admission control.
    pub fn is_skipped(&self) -> bool {
        matches!(self, CaptureOutcome::Skipped)
    }
}

struct CaptureState {
    demuxer: Demuxer,
    decoder: StreamDecoder,
    converter: PixelConverter,
    target: Option<(u32, u32)>,
}

impl CaptureState {
    fn target_size(
        &mut self,
        info: &VideoStreamInfo,
        strategy: &SizeStrategy,
    ) -> Result<(u32, u32), ReelError> {
        if let Some(target) = self.target {
            return Ok(target);
        }
        let (width, height) = strategy.resolve(info.width, info.height);
        if width == 0 || height == 0 {
            return Err(ReelError::InvalidCaptureSize { width, height });
        }
        log::debug!(
            "Capture size {}x{} -> {width}x{height}",
            info.width,
            info.height
        );
        self.target = Some((width, height));
        Ok((width, height))
    }

    fn capture(
        &mut self,
        position: Duration,
        info: &VideoStreamInfo,
        strategy: &SizeStrategy,
    ) -> Result<CapturedFrame, ReelError> {
        let (width, height) = self.target_size(info, strategy)?;

        self.demuxer.seek(position)?;
        self.decoder.flush();

        let target_seconds = position.as_secs_f64();
        let mut flushed = false;
        loop {
            match self.demuxer.request_packet(MediaKind::Video)? {
                Some(packet) => {
                    if let Err(error) = self.decoder.send_packet(&packet) {
                        log::warn!("Skipping undecodable video packet: {error}");
                        continue;
                    }
                }
                None if flushed => return Err(ReelError::CaptureUnreachable(position)),
                None => {
                    if let Err(error) = self.decoder.send_eof() {
                        log::warn!("Failed to flush video decoder: {error}");
                    }
                    flushed = true;
                }
            }

            while let Some(frame) = self
                .decoder
                .receive()
                .map_err(|error| ReelError::VideoDecodeError(error.to_string()))?
            {
                let Some(pts) = frame.pts() else {
                    continue;
                };
                if pts_to_seconds(pts, info.time_base) < target_seconds {
                    continue;
                }
                let Some(video_frame) = frame.video() else {
                    continue;
                };

                self.converter.configure(
                    FrameGeometry::new(video_frame.format(), video_frame.width(), video_frame.height()),
                    FrameGeometry::new(CAPTURE_FORMAT.to_ffmpeg_pixel(), width, height),
                )?;
                let buffer = self.converter.convert_frame(video_frame, 4)?;
                let stride = aligned_stride(width, CAPTURE_FORMAT.bytes_per_pixel());
                debug_assert_eq!(buffer.stride, stride);

                return Ok(CapturedFrame {
                    data: buffer.data,
                    width,
                    height,
                    stride,
                    pts: frame.timestamp(info.time_base),
                });
            }
        }
    }
}

/// Throwaway video-only session for thumbnails and snapshots.
///
/// # Example
///
/// ```no_run
/// use std::time::Duration;
///
/// use reel::{CaptureOutcome, CaptureSession, SizeStrategy};
///
/// let session = CaptureSession::open("input.mp4", SizeStrategy::fit_within(320, 180))?;
/// if let CaptureOutcome::Captured(frame) = session.capture_at(Duration::from_secs(5))? {
///     frame.save("thumbnail.png")?;
/// }
/// # Ok::<(), reel::ReelError>(())
/// ```
pub struct CaptureSession {
    path: PathBuf,
    info: VideoStreamInfo,
    strategy: SizeStrategy,
    gate: CaptureGate,
    state: Mutex<CaptureState>,
}

impl CaptureSession {
    /// Open the first video stream of a file for capturing.
    ///
    /// The target size is resolved from `strategy` on the first capture.
    pub fn open<P: AsRef<Path>>(path: P, strategy: SizeStrategy) -> Result<Self, ReelError> {
        initialize()?;
        let path = std::path::absolute(path.as_ref())?;
        log::debug!("Opening capture session: {}", path.display());

        let input = ffmpeg_next::format::input(&path).map_err(|error| ReelError::FileOpen {
            path: path.clone(),
            reason: error.to_string(),
        })?;

        let (video_index, _) = select_streams(&input);
        let index = video_index.ok_or(ReelError::NoVideoStream)?;
        let stream = input.stream(index).ok_or(ReelError::NoVideoStream)?;
        let decoder = StreamDecoder::open(&stream, MediaKind::Video)?;
        let info = match &decoder {
            StreamDecoder::Video(video) => VideoStreamInfo::new(&stream, video),
            StreamDecoder::Audio(_) => return Err(ReelError::NoVideoStream),
        };

        Ok(Self {
            path,
            info,
            strategy,
            gate: CaptureGate::new(),
            state: Mutex::new(CaptureState {
                demuxer: Demuxer::new(input, Some(index), None),
                decoder,
                converter: PixelConverter::new().with_policy(RebuildPolicy::AnyChange),
                target: None,
            }),
        })
    }

    /// Choose the interpolation used when shrinking frames.
    #[must_use]
    pub fn with_scaling(self, scaling: ScalingQuality) -> Self {
        {
            let mut state = lock(&self.state);
            state.converter = PixelConverter::new()
                .with_policy(RebuildPolicy::AnyChange)
                .with_scaling(scaling);
        }
        self
    }

    /// Absolute path of the opened file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Descriptor of the captured video stream.
    pub fn info(&self) -> &VideoStreamInfo {
        &self.info
    }

    /// Whether a capture is currently running.
    pub fn is_capturing(&self) -> bool {
        self.gate.is_busy()
    }

    /// Capture the first frame at or after `position`.
    ///
    /// Returns [`CaptureOutcome::Skipped`] if another capture on this session
    /// is in flight.
    ///
    /// # Errors
    ///
    /// - [`ReelError::SeekFailed`] if the container cannot seek there.
    /// - [`ReelError::CaptureUnreachable`] if no frame exists at or after
    ///   `position`.
    /// - [`ReelError::InvalidCaptureSize`] if the size strategy yields zero.
    ///
    /// A failed capture leaves the session usable.
    pub fn capture_at(&self, position: Duration) -> Result<CaptureOutcome, ReelError> {
        let Some(_permit) = self.gate.try_acquire() else {
            log::debug!("Capture in flight, skipping request for {position:?}");
            return Ok(CaptureOutcome::Skipped);
        };
        self.capture_admitted(position).map(CaptureOutcome::Captured)
    }

    /// [`capture_at`](CaptureSession::capture_at) with a position in seconds.
    ///
    /// # Errors
    ///
    /// [`ReelError::InvalidPosition`] if `seconds` is negative or not finite.
    pub fn capture_at_seconds(&self, seconds: f64) -> Result<CaptureOutcome, ReelError> {
        if !seconds.is_finite() || seconds < 0.0 {
            return Err(ReelError::InvalidPosition(seconds));
        }
        self.capture_at(Duration::from_secs_f64(seconds))
    }

    fn capture_admitted(&self, position: Duration) -> Result<CapturedFrame, ReelError> {
        let mut state = lock(&self.state);
        state.capture(position, &self.info, &self.strategy)
    }
}

impl Debug for CaptureSession {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        f.debug_struct("CaptureSession")
            .field("path", &self.path)
            .field("info", &self.info)
            .field("strategy", &self.strategy)
            .finish_non_exhaustive()
    }
}

/// Admission claimed on a shared session, released on drop.
#[cfg(feature = "async")]
pub(crate) struct AdmittedCapture {
    session: Arc<CaptureSession>,
}

#[cfg(feature = "async")]
impl AdmittedCapture {
    pub(crate) fn claim(session: Arc<CaptureSession>) -> Option<Self> {
        session.gate.try_claim().then(|| Self { session })
    }

    pub(crate) fn run(self, position: Duration) -> Result<CapturedFrame, ReelError> {
        self.session.capture_admitted(position)
    }
}

#[cfg(feature = "async")]
impl Drop for AdmittedCapture {
    fn drop(&mut self) {
        self.session.gate.release();
    }
}
