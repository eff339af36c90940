//! Tokio adapters for decode and capture sessions.
//!
//! Both adapters move the blocking FFmpeg work onto
//! `tokio::task::spawn_blocking` threads. [`FrameStream`] forwards decoded
//! frames through a bounded channel; [`CaptureFuture`] runs one capture.
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//!
//! use tokio_stream::StreamExt;
//!
//! use reel::{DecodeSession, MediaKind, ReelError, stream::frame_stream};
//!
//! # async fn example() -> Result<(), ReelError> {
//! let session = Arc::new(DecodeSession::open("input.mp4")?);
//! let mut frames = frame_stream(Arc::clone(&session), MediaKind::Video);
//! while let Some(frame) = frames.next().await {
//!     println!("pts {:?}", frame?.pts());
//! }
//! # Ok(())
//! # }
//! ```

use std::{
    future::Future,
    pin::Pin,
    sync::Arc,
    task::{Context, Poll},
    time::Duration,
};

use tokio::{
    sync::mpsc::{Receiver, Sender},
    task::JoinHandle,
};
use tokio_stream::Stream;

use crate::{
    capture::{AdmittedCapture, CaptureOutcome, CaptureSession, CapturedFrame},
    error::ReelError,
    frame::{FrameHandle, MediaKind},
    session::DecodeSession,
};

/// Bounded-channel capacity for [`FrameStream`].
///
/// Kept small; every queued item holds a decoded frame.
const DEFAULT_CHANNEL_CAPACITY: usize = 8;

/// Decoded frames of one stream, produced on a blocking thread.
///
/// Dropping the stream closes the channel; the background thread stops after
/// the frame it is currently decoding.
pub struct FrameStream {
    receiver: Receiver<Result<FrameHandle, ReelError>>,
    #[allow(dead_code)]
    handle: JoinHandle<()>,
}

impl Stream for FrameStream {
    type Item = Result<FrameHandle, ReelError>;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        self.receiver.poll_recv(cx)
    }
}

/// Stream every remaining frame of `kind` from `session`.
///
/// Must be called from within a Tokio runtime. The stream ends after the
/// last frame or after the first error.
pub fn frame_stream(session: Arc<DecodeSession>, kind: MediaKind) -> FrameStream {
    frame_stream_with_capacity(session, kind, DEFAULT_CHANNEL_CAPACITY)
}

/// [`frame_stream`] with an explicit channel capacity (at least 1).
pub fn frame_stream_with_capacity(
    session: Arc<DecodeSession>,
    kind: MediaKind,
    capacity: usize,
) -> FrameStream {
    let (sender, receiver) = tokio::sync::mpsc::channel(capacity.max(1));

    let handle = tokio::task::spawn_blocking(move || {
        if let Err(error) = pump_frames(&session, kind, &sender) {
            if !matches!(error, ReelError::Cancelled) {
                let _ = sender.blocking_send(Err(error));
            }
        }
    });

    FrameStream { receiver, handle }
}

fn pump_frames(
    session: &DecodeSession,
    kind: MediaKind,
    sender: &Sender<Result<FrameHandle, ReelError>>,
) -> Result<(), ReelError> {
    while let Some(frame) = session.read_next_frame(kind)? {
        sender
            .blocking_send(Ok(frame))
            .map_err(|_| ReelError::Cancelled)?;
    }
    log::debug!("{kind} frame stream finished");
    Ok(())
}

/// A capture running on a blocking thread.
///
/// Resolves to [`CaptureOutcome::Skipped`] straight away when admission was
/// refused.
pub struct CaptureFuture {
    handle: Option<JoinHandle<Result<CapturedFrame, ReelError>>>,
}

impl Future for CaptureFuture {
    type Output = Result<CaptureOutcome, ReelError>;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        match self.handle.as_mut() {
            None => Poll::Ready(Ok(CaptureOutcome::Skipped)),
            Some(handle) => Pin::new(handle).poll(cx).map(|result| {
                result
                    .unwrap_or(Err(ReelError::Cancelled))
                    .map(CaptureOutcome::Captured)
            }),
        }
    }
}

/// Capture at `position` without blocking the runtime.
///
/// Admission is decided before this function returns: if another capture is
/// in flight on `session`, the returned future resolves to
/// [`CaptureOutcome::Skipped`]. Must be called from within a Tokio runtime.
pub fn capture_async(session: Arc<CaptureSession>, position: Duration) -> CaptureFuture {
    let handle = AdmittedCapture::claim(session).map(|admitted| {
        tokio::task::spawn_blocking(move || admitted.run(position))
    });
    if handle.is_none() {
        log::debug!("Capture in flight, skipping async request for {position:?}");
    }
    CaptureFuture { handle }
}
