//! Exclusive ownership of one decoded frame.
//!
//! A [`FrameHandle`] owns a single native `AVFrame` produced by a decode
//! session. The frame is released exactly once: either explicitly through
//! [`FrameHandle::release`], which is safe to call any number of times, or
//! when the handle is dropped. Pixel and sample data are never copied by the
//! handle itself; converters read the native planes directly.

use std::{
    fmt::{Display, Formatter, Result as FmtResult},
    time::Duration,
};

use ffmpeg_next::{
    Rational,
    frame::{Audio as AudioFrame, Video as VideoFrame},
};

use crate::conversion::pts_to_duration;

/// The two elementary stream types a session decodes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MediaKind {
    /// Picture frames.
    Video,
    /// Sample frames.
    Audio,
}

impl Display for MediaKind {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        match self {
            MediaKind::Video => write!(f, "video"),
            MediaKind::Audio => write!(f, "audio"),
        }
    }
}

enum NativeFrame {
    Video(VideoFrame),
    Audio(AudioFrame),
}

/// Owner of one decoded video or audio frame.
///
/// # Example
///
/// ```no_run
/// use reel::DecodeSession;
///
/// let session = DecodeSession::open("input.mp4")?;
/// if let Some(mut frame) = session.read_video_frame()? {
///     println!("pts = {:?}", frame.pts());
///     frame.release();
///     frame.release(); // no-op
/// }
/// # Ok::<(), reel::ReelError>(())
/// ```
pub struct FrameHandle {
    kind: MediaKind,
    frame: Option<NativeFrame>,
}

impl FrameHandle {
    /// Take ownership of a decoded video frame.
    pub fn from_video(frame: VideoFrame) -> Self {
        Self {
            kind: MediaKind::Video,
            frame: Some(NativeFrame::Video(frame)),
        }
    }

    /// Take ownership of a decoded audio frame.
    pub fn from_audio(frame: AudioFrame) -> Self {
        Self {
            kind: MediaKind::Audio,
            frame: Some(NativeFrame::Audio(frame)),
        }
    }

    /// Media type of the frame. Still reported after release.
    pub fn kind(&self) -> MediaKind {
        self.kind
    }

    /// Free the native frame now.
    ///
    /// Calling this again, or dropping the handle afterwards, does nothing.
    pub fn release(&mut self) {
        if self.frame.take().is_some() {
            log::trace!("Released {} frame", self.kind);
        }
    }

    /// Whether the native frame has already been freed.
    pub fn is_released(&self) -> bool {
        self.frame.is_none()
    }

    /// The video frame, if this handle holds one that is not yet released.
    pub fn video(&self) -> Option<&VideoFrame> {
        match &self.frame {
            Some(NativeFrame::Video(frame)) => Some(frame),
            _ => None,
        }
    }

    /// The audio frame, if this handle holds one that is not yet released.
    pub fn audio(&self) -> Option<&AudioFrame> {
        match &self.frame {
            Some(NativeFrame::Audio(frame)) => Some(frame),
            _ => None,
        }
    }

    /// Presentation timestamp in stream time base units.
    ///
    /// Falls back to the decoder's best-effort timestamp when the frame has
    /// no PTS of its own.
    pub fn pts(&self) -> Option<i64> {
        match &self.frame {
            Some(NativeFrame::Video(frame)) => frame.pts().or_else(|| frame.timestamp()),
            Some(NativeFrame::Audio(frame)) => frame.pts().or_else(|| frame.timestamp()),
            None => None,
        }
    }

    /// Presentation time converted with the owning stream's time base.
    pub fn timestamp(&self, time_base: Rational) -> Option<Duration> {
        self.pts().map(|pts| pts_to_duration(pts, time_base))
    }
}

impl Drop for FrameHandle {
    fn drop(&mut self) {
        self.release();
    }
}
