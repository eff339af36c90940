//! # reel
//!
//! Pull-based media decoding for presentation layers: open a file, pull
//! decoded video and audio frames on demand, convert them into pixel and
//! sample buffers, and grab still frames at arbitrary timestamps. Powered by
//! FFmpeg via the [`ffmpeg-next`](https://crates.io/crates/ffmpeg-next) crate.
//!
//! ## Quick Start
//!
//! ### Decode Both Streams
//!
//! ```no_run
//! use reel::{DecodeSession, OutputSampleFormat, PixelConverter, SampleConverter};
//! use reel::{FrameGeometry, OutputPixelFormat};
//!
//! let session = DecodeSession::open("input.mp4").unwrap();
//! let video = session.info().video.clone().unwrap();
//!
//! let mut pixels = PixelConverter::new();
//! pixels
//!     .configure(
//!         FrameGeometry::new(video.pixel_format, video.width, video.height),
//!         FrameGeometry::new(OutputPixelFormat::Bgr24.to_ffmpeg_pixel(), video.width, video.height),
//!     )
//!     .unwrap();
//! while let Some(frame) = session.read_video_frame().unwrap() {
//!     let image = pixels.convert(&frame).unwrap();
//!     println!("{} bytes", image.data.len());
//! }
//!
//! let mut samples = SampleConverter::new(OutputSampleFormat::I16);
//! while let Some(frame) = session.read_audio_frame().unwrap() {
//!     let audio = samples.convert(&frame).unwrap();
//!     println!("{:?} of audio", audio.duration());
//! }
//! ```
//!
//! ### Capture a Thumbnail
//!
//! ```no_run
//! use std::time::Duration;
//!
//! use reel::{CaptureSession, SizeStrategy};
//!
//! let session = CaptureSession::open("input.mp4", SizeStrategy::fit_within(320, 180)).unwrap();
//! if let Some(frame) = session.capture_at(Duration::from_secs(3)).unwrap().into_frame() {
//!     frame.save("thumbnail.png").unwrap();
//! }
//! ```
//!
//! ## Features
//!
//! - **Independent cursors**: video and audio are pulled separately while the
//!   container is read once; packets for the idle stream are queued in order
//! - **Explicit frame ownership**: [`FrameHandle`] releases its native frame
//!   exactly once
//! - **In-place conversion**: write converted pixels straight into memory
//!   the caller owns, such as a bitmap back buffer
//! - **Sample format conversion**: interleaved U8/I16/I32/F32/F64 output
//! - **Single-flight capture**: concurrent capture requests are skipped,
//!   never queued
//!
//! ### Optional Features
//!
//! | Feature | Description |
//! |---------|-------------|
//! | `async` | `FrameStream` and `CaptureFuture` via Tokio |
//! | `full` | Enables all of the above |
//!
//! ## Requirements
//!
//! FFmpeg development libraries must be installed on your system.

pub mod capture;
pub mod configuration;
mod conversion;
mod decoder;
mod demux;
pub mod error;
pub mod ffmpeg;
pub mod frame;
pub mod metadata;
pub mod pixel;
pub mod sample;
pub mod session;
#[cfg(feature = "async")]
pub mod stream;
pub mod surface;
pub mod thumbnail;

pub use capture::{
    CaptureGate, CaptureOutcome, CapturePermit, CaptureSession, CapturedFrame, SizeStrategy,
};
pub use configuration::{OutputPixelFormat, RebuildPolicy, ScalingQuality};
pub use conversion::aligned_stride;
pub use error::ReelError;
pub use ffmpeg::{NativeLogLevel, native_log_level, set_native_log_level};
pub use frame::{FrameHandle, MediaKind};
pub use metadata::{AudioStreamInfo, MediaInfo, VideoStreamInfo};
pub use pixel::{FrameGeometry, PixelBuffer, PixelConverter};
pub use sample::{AudioBuffer, OutputSampleFormat, SampleConverter};
pub use session::{CursorState, DecodeSession};
#[cfg(feature = "async")]
pub use stream::{CaptureFuture, FrameStream, capture_async, frame_stream};
pub use surface::{PixelSurface, SurfaceBuffer, SurfaceWriter};
pub use thumbnail::ThumbnailProvider;
