//! Zero-copy frame presentation into caller-owned pixel memory.
//!
//! A presentation layer typically owns a bitmap whose back buffer it hands
//! out for writing and then marks dirty so the next repaint picks it up.
//! [`PixelSurface`] captures exactly that contract and [`SurfaceWriter`]
//! converts decoded frames straight into it.

use ffmpeg_next::format::Pixel;

use crate::{
    configuration::OutputPixelFormat,
    error::ReelError,
    frame::FrameHandle,
    metadata::VideoStreamInfo,
    pixel::{FrameGeometry, PixelConverter},
};

/// A bitmap-like destination with tightly packed rows.
pub trait PixelSurface {
    /// Width in pixels.
    fn width(&self) -> u32;

    /// Height in pixels.
    fn height(&self) -> u32;

    /// Writable pixel memory.
    fn back_buffer(&mut self) -> &mut [u8];

    /// Signal that the back buffer holds a new image.
    fn mark_dirty(&mut self);
}

/// An owned in-memory [`PixelSurface`].
#[derive(Debug, Clone)]
pub struct SurfaceBuffer {
    width: u32,
    height: u32,
    format: OutputPixelFormat,
    pixels: Vec<u8>,
    generation: u64,
}

impl SurfaceBuffer {
    /// Allocate a zeroed surface.
    pub fn new(width: u32, height: u32, format: OutputPixelFormat) -> Self {
        Self {
            width,
            height,
            format,
            pixels: vec![0; width as usize * height as usize * format.bytes_per_pixel()],
            generation: 0,
        }
    }

    /// Pixel format of the surface.
    pub fn format(&self) -> OutputPixelFormat {
        self.format
    }

    /// Current pixel contents.
    pub fn pixels(&self) -> &[u8] {
        &self.pixels
    }

    /// Number of times the surface has been marked dirty.
    pub fn generation(&self) -> u64 {
        self.generation
    }
}

impl PixelSurface for SurfaceBuffer {
    fn width(&self) -> u32 {
        self.width
    }

    fn height(&self) -> u32 {
        self.height
    }

    fn back_buffer(&mut self) -> &mut [u8] {
        &mut self.pixels
    }

    fn mark_dirty(&mut self) {
        self.generation += 1;
    }
}

/// Writes decoded frames of one video stream into pixel surfaces.
///
/// # Example
///
/// ```no_run
/// use reel::{DecodeSession, OutputPixelFormat, PixelSurface, SurfaceBuffer, SurfaceWriter};
///
/// let session = DecodeSession::open("input.mp4")?;
/// let video = session.info().video.clone().expect("video stream");
///
/// let mut writer = SurfaceWriter::for_stream(&video, OutputPixelFormat::Bgra)?;
/// let mut surface = writer.create_surface();
/// while let Some(frame) = session.read_video_frame()? {
///     writer.write_frame(&frame, &mut surface)?;
/// }
/// println!("{} frames presented", surface.generation());
/// # Ok::<(), reel::ReelError>(())
/// ```
pub struct SurfaceWriter {
    source: FrameGeometry,
    format: OutputPixelFormat,
    converter: PixelConverter,
}

impl SurfaceWriter {
    /// Prepare a converter from the stream's native layout to `format` at
    /// native size.
    pub fn for_stream(
        stream: &VideoStreamInfo,
        format: OutputPixelFormat,
    ) -> Result<Self, ReelError> {
        let source = FrameGeometry::new(stream.pixel_format, stream.width, stream.height);
        let mut converter = PixelConverter::new();
        if stream.pixel_format != Pixel::None {
            converter.configure(
                source,
                FrameGeometry::new(format.to_ffmpeg_pixel(), stream.width, stream.height),
            )?;
        }
        Ok(Self {
            source,
            format,
            converter,
        })
    }

    /// Allocate a surface matching the stream.
    pub fn create_surface(&self) -> SurfaceBuffer {
        SurfaceBuffer::new(self.source.width, self.source.height, self.format)
    }

    /// Convert `frame` into the surface's back buffer and mark it dirty.
    ///
    /// # Errors
    ///
    /// [`ReelError::ConversionError`] if the surface size differs from the
    /// stream, its buffer is too small, or conversion fails.
    pub fn write_frame<S: PixelSurface>(
        &mut self,
        frame: &FrameHandle,
        surface: &mut S,
    ) -> Result<(), ReelError> {
        if surface.width() != self.source.width || surface.height() != self.source.height {
            return Err(ReelError::ConversionError(format!(
                "surface is {}x{}, stream is {}x{}",
                surface.width(),
                surface.height(),
                self.source.width,
                self.source.height
            )));
        }

        if let Some(video) = frame.video() {
            let incoming = FrameGeometry::new(video.format(), video.width(), video.height());
            if self.converter.source() != Some(incoming) {
                // Decoders may only settle on a pixel format once the first
                // frame is out.
                self.converter = PixelConverter::new();
                self.converter.configure(
                    incoming,
                    FrameGeometry::new(self.format.to_ffmpeg_pixel(), surface.width(), surface.height()),
                )?;
            }
        }

        self.converter.convert_into(frame, surface.back_buffer())?;
        surface.mark_dirty();
        Ok(())
    }
}
