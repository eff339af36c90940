//! Thumbnail provider for seek-bar previews.
//!
//! Keeps one [`CaptureSession`] for the currently opened media, shrinking
//! every capture to fit a fixed bounding box. Requests that arrive while a
//! capture is running are skipped, so a fast-moving scrub position only ever
//! costs one decode at a time.

use std::{path::Path, sync::Arc, time::Duration};

use crate::{
    capture::{CaptureOutcome, CaptureSession, SizeStrategy},
    configuration::ScalingQuality,
    error::ReelError,
};

/// Produces bounded-size thumbnails for the media it has open.
///
/// # Example
///
/// ```no_run
/// use std::time::Duration;
///
/// use reel::ThumbnailProvider;
///
/// let mut provider = ThumbnailProvider::new(160, 90);
/// provider.open("input.mp4")?;
/// if let Some(thumbnail) = provider.capture(Duration::from_secs(12))?.into_frame() {
///     println!("{}x{}", thumbnail.width, thumbnail.height);
/// }
/// provider.close();
/// # Ok::<(), reel::ReelError>(())
/// ```
#[derive(Debug)]
pub struct ThumbnailProvider {
    max_width: u32,
    max_height: u32,
    scaling: ScalingQuality,
    session: Option<Arc<CaptureSession>>,
}

impl ThumbnailProvider {
    /// Create a provider whose thumbnails fit within `max_width` x `max_height`.
    pub fn new(max_width: u32, max_height: u32) -> Self {
        Self {
            max_width,
            max_height,
            scaling: ScalingQuality::default(),
            session: None,
        }
    }

    /// Interpolation used for sessions opened from now on.
    #[must_use]
    pub fn with_scaling(mut self, scaling: ScalingQuality) -> Self {
        self.scaling = scaling;
        self
    }

    /// Bounding box thumbnails are fitted into.
    pub fn bounds(&self) -> (u32, u32) {
        (self.max_width, self.max_height)
    }

    /// Open `path`, replacing any media that was open before.
    ///
    /// On failure the previous media stays closed.
    pub fn open<P: AsRef<Path>>(&mut self, path: P) -> Result<(), ReelError> {
        self.close();
        let session = CaptureSession::open(
            path,
            SizeStrategy::fit_within(self.max_width, self.max_height),
        )?
        .with_scaling(self.scaling);
        self.session = Some(Arc::new(session));
        Ok(())
    }

    /// Release the open media, if any.
    pub fn close(&mut self) {
        if let Some(session) = self.session.take() {
            log::debug!("Closing thumbnail session for {}", session.path().display());
        }
    }

    /// Whether media is open.
    pub fn is_open(&self) -> bool {
        self.session.is_some()
    }

    /// The capture session behind the provider, for use off-thread.
    pub fn session(&self) -> Option<Arc<CaptureSession>> {
        self.session.clone()
    }

    /// Capture a thumbnail at `position`.
    ///
    /// # Errors
    ///
    /// [`ReelError::NoMediaOpen`] before [`open`](ThumbnailProvider::open);
    /// otherwise the errors of [`CaptureSession::capture_at`].
    pub fn capture(&self, position: Duration) -> Result<CaptureOutcome, ReelError> {
        self.session
            .as_ref()
            .ok_or(ReelError::NoMediaOpen)?
            .capture_at(position)
    }
}
