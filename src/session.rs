//! Pull-based demux/decode session.
//!
//! A [`DecodeSession`] opens one container and exposes two independent decode
//! cursors, one for the first video stream and one for the first audio
//! stream. Each cursor produces frames on demand; the container itself is only
//! ever read sequentially, with packets for the stream that did not ask for
//! them parked until it does.
//!
//! Each cursor walks through the states of [`CursorState`]:
//!
//! ```text
//! Draining --(container out of input)--> Flushing --(decoder empty or failed)--> Ended
//! ```
//!
//! A cursor leaves `Draining` as soon as the container runs dry, even if the
//! flush signal itself is rejected. Once it is `Ended`, every further read
//! returns `Ok(None)` without touching the container.

use std::{
    path::{Path, PathBuf},
    sync::{Mutex, MutexGuard, PoisonError},
};

use ffmpeg_next::{Packet, Rational, format::context::Input};

use crate::{
    decoder::{PacketDecoder, StreamDecoder},
    demux::{Demuxer, select_streams},
    error::ReelError,
    ffmpeg::initialize,
    frame::{FrameHandle, MediaKind},
    metadata::{AudioStreamInfo, MediaInfo, VideoStreamInfo},
};

/// Position of a decode cursor in its lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CursorState {
    /// Feeding packets to the decoder.
    Draining,
    /// The container is out of input and the flush signal has been sent;
    /// frames still buffered in the decoder are being returned.
    Flushing,
    /// Every frame has been returned.
    Ended,
}

struct StreamCursor<D = StreamDecoder> {
    kind: MediaKind,
    decoder: D,
    state: CursorState,
}

impl<D: PacketDecoder> StreamCursor<D> {
    fn new(kind: MediaKind, decoder: D) -> Self {
        Self {
            kind,
            decoder,
            state: CursorState::Draining,
        }
    }

    fn receive(&mut self) -> Result<Option<FrameHandle>, ReelError> {
        self.decoder
            .receive()
            .map_err(|error| ReelError::decode(self.kind, format!("Failed to receive frame: {error}")))
    }

    /// Advance the cursor, pulling packets from `request` while the decoder
    /// has nothing buffered.
    fn next_frame<F>(&mut self, mut request: F) -> Result<Option<FrameHandle>, ReelError>
    where
        F: FnMut(MediaKind) -> Result<Option<Packet>, ReelError>,
    {
        loop {
            match self.state {
                CursorState::Ended => return Ok(None),
                CursorState::Flushing => {
                    let frame = self.receive();
                    if !matches!(frame, Ok(Some(_))) {
                        log::debug!("{} cursor ended", self.kind);
                        self.state = CursorState::Ended;
                    }
                    return frame;
                }
                CursorState::Draining => {
                    if let Some(frame) = self.receive()? {
                        return Ok(Some(frame));
                    }

                    match request(self.kind)? {
                        Some(packet) => self.decoder.send_packet(&packet).map_err(|error| {
                            ReelError::decode(self.kind, format!("Failed to send packet: {error}"))
                        })?,
                        None => {
                            // Input is gone for good; the cursor must not ask again.
                            log::debug!("{} cursor flushing", self.kind);
                            self.state = CursorState::Flushing;
                            self.decoder.send_eof().map_err(|error| {
                                ReelError::decode(
                                    self.kind,
                                    format!("Failed to send flush signal: {error}"),
                                )
                            })?;
                        }
                    }
                }
            }
        }
    }
}

pub(crate) fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// One opened media file with independent video and audio decode cursors.
///
/// `DecodeSession` is `Send + Sync`; the two cursors may be driven from
/// different threads. Reads of the same cursor are serialised.
///
/// # Example
///
/// ```no_run
/// use reel::{DecodeSession, MediaKind};
///
/// let session = DecodeSession::open("input.mp4")?;
/// let mut video_frames = 0;
/// while let Some(frame) = session.read_next_frame(MediaKind::Video)? {
///     video_frames += 1;
///     drop(frame);
/// }
/// // Audio packets read while decoding video were queued, not lost.
/// while let Some(_frame) = session.read_audio_frame()? {}
/// println!("{video_frames} video frames");
/// # Ok::<(), reel::ReelError>(())
/// ```
pub struct DecodeSession {
    path: PathBuf,
    info: MediaInfo,
    // Lock order: cursor, then demuxer.
    demuxer: Mutex<Demuxer>,
    video: Option<Mutex<StreamCursor>>,
    audio: Option<Mutex<StreamCursor>>,
}

impl DecodeSession {
    /// Open a media file and its first video and first audio stream.
    ///
    /// The path is made absolute before opening. A missing stream type is not
    /// an error; that cursor is simply unavailable.
    ///
    /// # Errors
    ///
    /// - [`ReelError::FileOpen`] if the container cannot be opened or its streams cannot be read.
    /// - [`ReelError::NoMediaStreams`] if it has neither video nor audio.
    /// - [`ReelError::DecoderNotFound`] / [`ReelError::CodecOpen`] if a
    ///   selected stream cannot be decoded.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self, ReelError> {
        initialize()?;
        let path = std::path::absolute(path.as_ref())?;
        log::debug!("Opening media file: {}", path.display());

        let input = ffmpeg_next::format::input(&path).map_err(|error| ReelError::FileOpen {
            path: path.clone(),
            reason: error.to_string(),
        })?;

        let (video_index, audio_index) = select_streams(&input);
        if video_index.is_none() && audio_index.is_none() {
            return Err(ReelError::NoMediaStreams { path });
        }

        let (video, video_info) = match video_index {
            Some(index) => {
                let (cursor, info) = open_video(&input, index)?;
                (Some(Mutex::new(cursor)), Some(info))
            }
            None => (None, None),
        };
        let (audio, audio_info) = match audio_index {
            Some(index) => {
                let (cursor, info) = open_audio(&input, index)?;
                (Some(Mutex::new(cursor)), Some(info))
            }
            None => (None, None),
        };

        let info = MediaInfo::new(&input, video_info, audio_info);
        log::debug!(
            "Opened {} ({}, video stream {:?}, audio stream {:?})",
            path.display(),
            info.format,
            video_index,
            audio_index
        );

        Ok(Self {
            path,
            info,
            demuxer: Mutex::new(Demuxer::new(input, video_index, audio_index)),
            video,
            audio,
        })
    }

    /// Stream descriptors collected at open.
    pub fn info(&self) -> &MediaInfo {
        &self.info
    }

    /// Absolute path of the opened file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Whether a cursor exists for `kind`.
    pub fn has(&self, kind: MediaKind) -> bool {
        self.cursor(kind).is_ok()
    }

    /// Time base of the stream behind `kind`, for [`FrameHandle::timestamp`].
    pub fn time_base(&self, kind: MediaKind) -> Option<Rational> {
        match kind {
            MediaKind::Video => self.info.video.as_ref().map(|video| video.time_base),
            MediaKind::Audio => self.info.audio.as_ref().map(|audio| audio.time_base),
        }
    }

    /// Decode the next frame of `kind`.
    ///
    /// Returns `Ok(None)` once the stream is exhausted, and on every call
    /// after that.
    ///
    /// # Errors
    ///
    /// [`ReelError::NoVideoStream`] / [`ReelError::NoAudioStream`] if the file
    /// has no such stream; [`ReelError::VideoDecodeError`] /
    /// [`ReelError::AudioDecodeError`] if reading, sending or receiving fails.
    /// A failure leaves the other cursor and the packet queues intact.
    pub fn read_next_frame(&self, kind: MediaKind) -> Result<Option<FrameHandle>, ReelError> {
        let mut cursor = lock(self.cursor(kind)?);
        cursor.next_frame(|kind| lock(&self.demuxer).request_packet(kind))
    }

    /// Decode the next video frame.
    pub fn read_video_frame(&self) -> Result<Option<FrameHandle>, ReelError> {
        self.read_next_frame(MediaKind::Video)
    }

    /// Decode the next audio frame.
    pub fn read_audio_frame(&self) -> Result<Option<FrameHandle>, ReelError> {
        self.read_next_frame(MediaKind::Audio)
    }

    /// Current state of the cursor for `kind`, `None` if there is no such stream.
    pub fn cursor_state(&self, kind: MediaKind) -> Option<CursorState> {
        self.cursor(kind).ok().map(|cursor| lock(cursor).state)
    }

    /// Packets read from the container and parked for `kind`.
    pub fn queued_packets(&self, kind: MediaKind) -> usize {
        lock(&self.demuxer).queued(kind)
    }

    /// Total packets read from the container so far.
    pub fn packets_read(&self) -> u64 {
        lock(&self.demuxer).packets_read()
    }

    /// Whether the container has reported end of input.
    pub fn is_input_exhausted(&self) -> bool {
        lock(&self.demuxer).is_exhausted()
    }

    fn cursor(&self, kind: MediaKind) -> Result<&Mutex<StreamCursor>, ReelError> {
        match kind {
            MediaKind::Video => self.video.as_ref(),
            MediaKind::Audio => self.audio.as_ref(),
        }
        .ok_or_else(|| ReelError::missing_stream(kind))
    }
}

impl std::fmt::Debug for DecodeSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DecodeSession")
            .field("path", &self.path)
            .field("info", &self.info)
            .finish_non_exhaustive()
    }
}

fn open_video(input: &Input, index: usize) -> Result<(StreamCursor, VideoStreamInfo), ReelError> {
    let stream = input.stream(index).ok_or(ReelError::NoVideoStream)?;
    let decoder = StreamDecoder::open(&stream, MediaKind::Video)?;
    let info = match &decoder {
        StreamDecoder::Video(video) => VideoStreamInfo::new(&stream, video),
        StreamDecoder::Audio(_) => return Err(ReelError::NoVideoStream),
    };
    Ok((StreamCursor::new(MediaKind::Video, decoder), info))
}

fn open_audio(input: &Input, index: usize) -> Result<(StreamCursor, AudioStreamInfo), ReelError> {
    let stream = input.stream(index).ok_or(ReelError::NoAudioStream)?;
    let decoder = StreamDecoder::open(&stream, MediaKind::Audio)?;
    let info = match &decoder {
        StreamDecoder::Audio(audio) => AudioStreamInfo::new(&stream, audio),
        StreamDecoder::Video(_) => return Err(ReelError::NoAudioStream),
    };
    Ok((StreamCursor::new(MediaKind::Audio, decoder), info))
}

#[cfg(test)]
mod tests {
    use std::collections::VecDeque;

    use ffmpeg_next::{Error as FfmpegError, format::Pixel, frame::Video as VideoFrame};

    use super::*;

    fn assert_send_sync<T: Send + Sync>() {}

    fn video_frame(pts: i64) -> FrameHandle {
        let mut frame = VideoFrame::new(Pixel::GRAY8, 2, 2);
        frame.set_pts(Some(pts));
        FrameHandle::from_video(frame)
    }

    /// Emits one frame per packet, holding back `delayed` frames until the
    /// flush signal arrives.
    struct ScriptedDecoder {
        ready: VecDeque<FrameHandle>,
        held: VecDeque<FrameHandle>,
        delayed: usize,
        packets: i64,
        flush_result: Result<(), FfmpegError>,
        flushes: u32,
    }

    impl ScriptedDecoder {
        fn new(delayed: usize, flush_result: Result<(), FfmpegError>) -> Self {
            Self {
                ready: VecDeque::new(),
                held: VecDeque::new(),
                delayed,
                packets: 0,
                flush_result,
                flushes: 0,
            }
        }
    }

    impl PacketDecoder for ScriptedDecoder {
        fn send_packet(&mut self, _packet: &Packet) -> Result<(), FfmpegError> {
            self.held.push_back(video_frame(self.packets));
            self.packets += 1;
            while self.held.len() > self.delayed {
                if let Some(frame) = self.held.pop_front() {
                    self.ready.push_back(frame);
                }
            }
            Ok(())
        }

        fn send_eof(&mut self) -> Result<(), FfmpegError> {
            self.flushes += 1;
            self.flush_result?;
            self.ready.extend(self.held.drain(..));
            Ok(())
        }

        fn receive(&mut self) -> Result<Option<FrameHandle>, FfmpegError> {
            Ok(self.ready.pop_front())
        }
    }

    #[test]
    fn session_is_send_and_sync() {
        assert_send_sync::<DecodeSession>();
    }

    #[test]
    fn missing_file_is_an_open_error() {
        let result = DecodeSession::open("definitely/not/here.mp4");
        match result {
            Err(ReelError::FileOpen { path, .. }) => assert!(path.is_absolute()),
            other => panic!("expected FileOpen, got {other:?}"),
        }
    }

    #[test]
    fn buffered_frames_are_drained_after_flush() {
        let mut cursor = StreamCursor::new(MediaKind::Video, ScriptedDecoder::new(2, Ok(())));
        let mut remaining = 3;
        let mut requests = 0;
        let mut request = |_: MediaKind| -> Result<Option<Packet>, ReelError> {
            requests += 1;
            if remaining == 0 {
                return Ok(None);
            }
            remaining -= 1;
            Ok(Some(Packet::empty()))
        };

        let mut pts = Vec::new();
        while let Some(frame) = cursor.next_frame(&mut request).expect("next frame") {
            pts.push(frame.pts().expect("pts"));
        }
        assert_eq!(pts, [0, 1, 2]);
        assert_eq!(cursor.state, CursorState::Ended);

        assert!(cursor.next_frame(&mut request).expect("after end").is_none());
        assert_eq!(requests, 4);
        assert_eq!(cursor.decoder.flushes, 1);
    }

    #[test]
    fn rejected_flush_still_ends_the_cursor() {
        let decoder = ScriptedDecoder::new(0, Err(FfmpegError::InvalidData));
        let mut cursor = StreamCursor::new(MediaKind::Audio, decoder);
        let mut requests = 0;
        let mut request = |_: MediaKind| -> Result<Option<Packet>, ReelError> {
            requests += 1;
            Ok(None)
        };

        assert!(matches!(
            cursor.next_frame(&mut request),
            Err(ReelError::AudioDecodeError(_))
        ));
        assert_eq!(cursor.state, CursorState::Flushing);

        for _ in 0..3 {
            assert!(cursor.next_frame(&mut request).expect("after flush").is_none());
        }
        assert_eq!(cursor.state, CursorState::Ended);
        assert_eq!(requests, 1);
        assert_eq!(cursor.decoder.flushes, 1);
    }

    #[test]
    fn request_errors_leave_the_cursor_draining() {
        let mut cursor = StreamCursor::new(MediaKind::Video, ScriptedDecoder::new(0, Ok(())));
        let result = cursor.next_frame(|kind| Err(ReelError::decode(kind, "read failed")));
        assert!(matches!(result, Err(ReelError::VideoDecodeError(_))));
        assert_eq!(cursor.state, CursorState::Draining);

        let frame = cursor
            .next_frame(|_| Ok(Some(Packet::empty())))
            .expect("next frame");
        assert_eq!(frame.and_then(|frame| frame.pts()), Some(0));
    }
}
