//! Colour-space conversion and scaling of decoded video frames.
//!
//! [`PixelConverter`] memoises one swscale context. [`configure`] decides,
//! according to its [`RebuildPolicy`], whether the existing context can be
//! reused or must be rebuilt. Converted pixels are written either into a
//! freshly allocated [`PixelBuffer`] ([`convert`]) or straight into memory
//! the caller owns ([`convert_into`]), such as the back buffer of a bitmap.
//!
//! Buffer sizes are always derived from the geometry of the context that is
//! actually built, so a buffer obtained from [`allocate_buffer`] or sized
//! with [`required_buffer_size`] always fits what the converter writes.
//!
//! [`configure`]: PixelConverter::configure
//! [`convert`]: PixelConverter::convert
//! [`convert_into`]: PixelConverter::convert_into
//! [`allocate_buffer`]: PixelConverter::allocate_buffer
//! [`required_buffer_size`]: PixelConverter::required_buffer_size

use std::{ffi::c_int, ptr};

use ffmpeg_next::{
    format::Pixel,
    frame::Video as VideoFrame,
    software::scaling::Context as ScalingContext,
};

use crate::{
    configuration::{RebuildPolicy, ScalingQuality},
    error::ReelError,
    ffmpeg::describe_error,
    frame::FrameHandle,
};

/// Pixel format plus dimensions of one side of a conversion.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrameGeometry {
    /// Pixel format.
    pub format: Pixel,
    /// Width in pixels.
    pub width: u32,
    /// Height in pixels.
    pub height: u32,
}

impl FrameGeometry {
    /// Describe a frame layout.
    pub fn new(format: Pixel, width: u32, height: u32) -> Self {
        Self {
            format,
            width,
            height,
        }
    }

    fn of(frame: &VideoFrame) -> Self {
        Self::new(frame.format(), frame.width(), frame.height())
    }

    /// Bytes needed to hold one image of this geometry with the given row
    /// alignment.
    pub(crate) fn buffer_size(&self, align: c_int) -> Result<usize, ReelError> {
        let size = unsafe {
            ffmpeg_sys_next::av_image_get_buffer_size(
                self.format.into(),
                self.width as c_int,
                self.height as c_int,
                align,
            )
        };
        if size < 0 {
            return Err(ReelError::ConversionError(format!(
                "cannot size a {:?} {}x{} buffer: {}",
                self.format,
                self.width,
                self.height,
                describe_error(size)
            )));
        }
        Ok(size as usize)
    }
}

/// Decide whether a context built for `built` must be replaced to serve the
/// requested conversion.
fn needs_rebuild(
    policy: RebuildPolicy,
    built: Option<(&FrameGeometry, &FrameGeometry)>,
    source: &FrameGeometry,
    destination: &FrameGeometry,
) -> bool {
    let Some((built_source, built_destination)) = built else {
        return true;
    };
    match policy {
        RebuildPolicy::DestinationSize => {
            built_destination.width != destination.width
                || built_destination.height != destination.height
        }
        RebuildPolicy::AnyChange => built_source != source || built_destination != destination,
    }
}

/// A converted image in a buffer owned by the caller.
#[derive(Debug, Clone)]
#[must_use]
pub struct PixelBuffer {
    /// Pixel bytes, row-major.
    pub data: Vec<u8>,
    /// Width in pixels.
    pub width: u32,
    /// Height in pixels.
    pub height: u32,
    /// Bytes per row of the first plane.
    pub stride: usize,
    /// Pixel format of `data`.
    pub format: Pixel,
}

struct BuiltContext {
    scaler: ScalingContext,
    source: FrameGeometry,
    destination: FrameGeometry,
}

/// Lazily built colour-space / scaling converter.
///
/// # Example
///
/// ```no_run
/// use reel::{DecodeSession, FrameGeometry, OutputPixelFormat, PixelConverter};
///
/// let session = DecodeSession::open("input.mp4")?;
/// let video = session.info().video.clone().expect("video stream");
///
/// let mut converter = PixelConverter::new();
/// converter.configure(
///     FrameGeometry::new(video.pixel_format, video.width, video.height),
///     FrameGeometry::new(OutputPixelFormat::Bgr24.to_ffmpeg_pixel(), 640, 360),
/// )?;
///
/// let mut surface = converter.allocate_buffer()?;
/// while let Some(frame) = session.read_video_frame()? {
///     converter.convert_into(&frame, &mut surface)?;
/// }
/// # Ok::<(), reel::ReelError>(())
/// ```
pub struct PixelConverter {
    policy: RebuildPolicy,
    scaling: ScalingQuality,
    context: Option<BuiltContext>,
}

impl Default for PixelConverter {
    fn default() -> Self {
        Self::new()
    }
}

impl PixelConverter {
    /// Create an unconfigured converter with the default policy and scaling.
    pub fn new() -> Self {
        Self {
            policy: RebuildPolicy::default(),
            scaling: ScalingQuality::default(),
            context: None,
        }
    }

    /// Choose when [`configure`](PixelConverter::configure) rebuilds.
    #[must_use]
    pub fn with_policy(mut self, policy: RebuildPolicy) -> Self {
        self.policy = policy;
        self
    }

    /// Choose the interpolation used for resizing.
    #[must_use]
    pub fn with_scaling(mut self, scaling: ScalingQuality) -> Self {
        self.scaling = scaling;
        self
    }

    /// The active rebuild policy.
    pub fn policy(&self) -> RebuildPolicy {
        self.policy
    }

    /// Build the scaling context, or keep the current one if the rebuild
    /// policy allows it.
    ///
    /// Returns `true` when a new context was built.
    ///
    /// # Errors
    ///
    /// [`ReelError::ConversionError`] if either side has a zero dimension or
    /// swscale cannot convert between the two formats. The previous context,
    /// if any, is kept in that case.
    pub fn configure(
        &mut self,
        source: FrameGeometry,
        destination: FrameGeometry,
    ) -> Result<bool, ReelError> {
        let built = self
            .context
            .as_ref()
            .map(|context| (&context.source, &context.destination));
        if !needs_rebuild(self.policy, built, &source, &destination) {
            if let Some(context) = &self.context {
                if context.source != source || context.destination != destination {
                    log::debug!(
                        "Keeping scaling context {:?} -> {:?} for requested {:?} -> {:?}",
                        context.source,
                        context.destination,
                        source,
                        destination
                    );
                }
            }
            return Ok(false);
        }

        if source.width == 0 || source.height == 0 || destination.width == 0 || destination.height == 0
        {
            return Err(ReelError::ConversionError(format!(
                "cannot scale {}x{} to {}x{}",
                source.width, source.height, destination.width, destination.height
            )));
        }

        let scaler = ScalingContext::get(
            source.format,
            source.width,
            source.height,
            destination.format,
            destination.width,
            destination.height,
            self.scaling.to_flags(),
        )
        .map_err(|error| {
            ReelError::ConversionError(format!(
                "failed to build scaling context {source:?} -> {destination:?}: {error}"
            ))
        })?;

        log::debug!("Built scaling context {source:?} -> {destination:?}");
        self.context = Some(BuiltContext {
            scaler,
            source,
            destination,
        });
        Ok(true)
    }

    /// Whether a scaling context has been built.
    pub fn is_configured(&self) -> bool {
        self.context.is_some()
    }

    /// Source geometry the built context accepts.
    pub fn source(&self) -> Option<FrameGeometry> {
        self.context.as_ref().map(|context| context.source)
    }

    /// Destination geometry the built context produces.
    pub fn destination(&self) -> Option<FrameGeometry> {
        self.context.as_ref().map(|context| context.destination)
    }

    /// Exact number of bytes [`convert_into`](PixelConverter::convert_into)
    /// writes (rows tightly packed).
    pub fn required_buffer_size(&self) -> Result<usize, ReelError> {
        self.built()?.destination.buffer_size(1)
    }

    /// Allocate a zeroed buffer of [`required_buffer_size`](PixelConverter::required_buffer_size).
    pub fn allocate_buffer(&self) -> Result<Vec<u8>, ReelError> {
        Ok(vec![0; self.required_buffer_size()?])
    }

    /// Convert a frame into a newly allocated buffer.
    pub fn convert(&mut self, frame: &FrameHandle) -> Result<PixelBuffer, ReelError> {
        let video_frame = frame.video().ok_or_else(not_a_video_frame)?;
        self.convert_frame(video_frame, 1)
    }

    /// Convert a frame into caller-owned memory.
    ///
    /// # Errors
    ///
    /// [`ReelError::ConversionError`] if the converter is not configured,
    /// the frame does not match the configured source, or `buffer` is
    /// smaller than [`required_buffer_size`](PixelConverter::required_buffer_size).
    pub fn convert_into(&mut self, frame: &FrameHandle, buffer: &mut [u8]) -> Result<(), ReelError> {
        let video_frame = frame.video().ok_or_else(not_a_video_frame)?;
        self.scale_into(video_frame, buffer, 1).map(|_| ())
    }

    /// Convert a raw decoded frame with the given row alignment.
    pub(crate) fn convert_frame(
        &mut self,
        frame: &VideoFrame,
        align: c_int,
    ) -> Result<PixelBuffer, ReelError> {
        let destination = self.built()?.destination;
        let mut data = vec![0; destination.buffer_size(align)?];
        let stride = self.scale_into(frame, &mut data, align)?;
        Ok(PixelBuffer {
            data,
            width: destination.width,
            height: destination.height,
            stride,
            format: destination.format,
        })
    }

    fn built(&self) -> Result<&BuiltContext, ReelError> {
        self.context
            .as_ref()
            .ok_or_else(|| ReelError::ConversionError("converter is not configured".to_string()))
    }

    /// Run swscale writing into `buffer`; returns the stride of plane 0.
    fn scale_into(
        &mut self,
        frame: &VideoFrame,
        buffer: &mut [u8],
        align: c_int,
    ) -> Result<usize, ReelError> {
        let context = self
            .context
            .as_mut()
            .ok_or_else(|| ReelError::ConversionError("converter is not configured".to_string()))?;

        let incoming = FrameGeometry::of(frame);
        if incoming != context.source {
            return Err(ReelError::ConversionError(format!(
                "frame {incoming:?} does not match configured source {:?}",
                context.source
            )));
        }

        let required = context.destination.buffer_size(align)?;
        if buffer.len() < required {
            return Err(ReelError::ConversionError(format!(
                "destination buffer holds {} bytes, {required} required",
                buffer.len()
            )));
        }

        let destination = context.destination;
        let mut planes: [*mut u8; 4] = [ptr::null_mut(); 4];
        let mut strides: [c_int; 4] = [0; 4];

        unsafe {
            let filled = ffmpeg_sys_next::av_image_fill_arrays(
                planes.as_mut_ptr(),
                strides.as_mut_ptr(),
                buffer.as_mut_ptr(),
                destination.format.into(),
                destination.width as c_int,
                destination.height as c_int,
                align,
            );
            if filled < 0 {
                return Err(ReelError::ConversionError(format!(
                    "failed to lay out destination planes: {}",
                    describe_error(filled)
                )));
            }

            let source = frame.as_ptr();
            let scaled = ffmpeg_sys_next::sws_scale(
                context.scaler.as_mut_ptr(),
                (*source).data.as_ptr() as *const *const u8,
                (*source).linesize.as_ptr(),
                0,
                context.source.height as c_int,
                planes.as_ptr(),
                strides.as_ptr(),
            );
            if scaled <= 0 {
                return Err(ReelError::ConversionError(format!(
                    "failed to scale frame: {}",
                    describe_error(scaled)
                )));
            }
        }

        Ok(strides[0] as usize)
    }
}

fn not_a_video_frame() -> ReelError {
    ReelError::ConversionError("handle does not hold a live video frame".to_string())
}
