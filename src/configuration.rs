//! Conversion settings shared by the pixel converter, capture sessions and
//! surface writers.
//!
//! # Example
//!
//! ```no_run
//! use reel::{OutputPixelFormat, PixelConverter, RebuildPolicy, ScalingQuality};
//!
//! let converter = PixelConverter::new()
//!     .with_policy(RebuildPolicy::AnyChange)
//!     .with_scaling(ScalingQuality::Bicubic);
//! assert_eq!(OutputPixelFormat::default().bytes_per_pixel(), 3);
//! ```

use ffmpeg_next::{format::Pixel, software::scaling::Flags as ScalingFlags};

/// Packed output pixel format for converted video frames.
///
/// Every variant is a single-plane interleaved layout, so a converted frame
/// is always one contiguous buffer of `width * height * bytes_per_pixel`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum OutputPixelFormat {
    /// 8-bit BGR (24 bpp). This is the default and the capture format.
    #[default]
    Bgr24,
    /// 8-bit RGB (24 bpp).
    Rgb24,
    /// 8-bit BGRA (32 bpp).
    Bgra,
    /// 8-bit RGBA (32 bpp).
    Rgba,
    /// 8-bit grayscale (8 bpp).
    Gray8,
}

impl OutputPixelFormat {
    /// Map to the corresponding FFmpeg pixel format.
    pub fn to_ffmpeg_pixel(self) -> Pixel {
        match self {
            OutputPixelFormat::Bgr24 => Pixel::BGR24,
            OutputPixelFormat::Rgb24 => Pixel::RGB24,
            OutputPixelFormat::Bgra => Pixel::BGRA,
            OutputPixelFormat::Rgba => Pixel::RGBA,
            OutputPixelFormat::Gray8 => Pixel::GRAY8,
        }
    }

    /// Bytes occupied by one pixel.
    pub fn bytes_per_pixel(self) -> usize {
        match self {
            OutputPixelFormat::Bgr24 | OutputPixelFormat::Rgb24 => 3,
            OutputPixelFormat::Bgra | OutputPixelFormat::Rgba => 4,
            OutputPixelFormat::Gray8 => 1,
        }
    }
}

/// Interpolation used when a frame is resized.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum ScalingQuality {
    /// Fast, lower quality bilinear.
    FastBilinear,
    /// Bilinear. This is the default.
    #[default]
    Bilinear,
    /// Bicubic.
    Bicubic,
    /// Nearest neighbour.
    Point,
    /// Area averaging, good for large downscales.
    Area,
}

impl ScalingQuality {
    pub(crate) fn to_flags(self) -> ScalingFlags {
        match self {
            ScalingQuality::FastBilinear => ScalingFlags::FAST_BILINEAR,
            ScalingQuality::Bilinear => ScalingFlags::BILINEAR,
            ScalingQuality::Bicubic => ScalingFlags::BICUBIC,
            ScalingQuality::Point => ScalingFlags::POINT,
            ScalingQuality::Area => ScalingFlags::AREA,
        }
    }
}

/// When [`PixelConverter::configure`](crate::PixelConverter::configure)
/// throws away its scaling context and builds a new one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum RebuildPolicy {
    /// Rebuild only when the destination width or height changes.
    ///
    /// Either dimension changing is enough; a context whose width still
    /// matches is not reused for a new height.
    ///
    /// A change of source geometry or destination format alone keeps the
    /// existing context. Frames that no longer match it are rejected by the
    /// converter instead of being scaled with stale parameters.
    #[default]
    DestinationSize,
    /// Rebuild whenever any source or destination parameter changes.
    AnyChange,
}
