//! Decoder construction and the send/receive primitives shared by decode
//! and capture sessions.

use ffmpeg_next::{
    Error as FfmpegError, Packet, Stream,
    codec::{context::Context as CodecContext, decoder},
    frame::{Audio as AudioFrame, Video as VideoFrame},
};

use crate::{error::ReelError, frame::FrameHandle, frame::MediaKind};

/// An opened decoder for one selected stream.
pub(crate) enum StreamDecoder {
    Video(decoder::Video),
    Audio(decoder::Audio),
}

impl StreamDecoder {
    /// Resolve the decoder for `stream` by codec id, transfer the stream's
    /// parameters and open it.
    pub(crate) fn open(stream: &Stream, kind: MediaKind) -> Result<Self, ReelError> {
        let parameters = stream.parameters();
        let codec_id = parameters.id();
        let codec = decoder::find(codec_id).ok_or_else(|| ReelError::DecoderNotFound {
            media: kind,
            codec: format!("{codec_id:?}"),
        })?;

        let context = CodecContext::from_parameters(parameters).map_err(|error| {
            ReelError::CodecOpen {
                media: kind,
                reason: format!("failed to apply stream parameters: {error}"),
            }
        })?;
        let opened = context
            .decoder()
            .open_as(codec)
            .map_err(|error| ReelError::CodecOpen {
                media: kind,
                reason: error.to_string(),
            })?;

        let decoder = match kind {
            MediaKind::Video => opened.video().map(StreamDecoder::Video),
            MediaKind::Audio => opened.audio().map(StreamDecoder::Audio),
        }
        .map_err(|error| ReelError::CodecOpen {
            media: kind,
            reason: error.to_string(),
        })?;

        log::debug!(
            "Opened {kind} decoder {} for stream {}",
            codec.name(),
            stream.index()
        );
        Ok(decoder)
    }

    fn opened(&mut self) -> &mut decoder::Opened {
        match self {
            StreamDecoder::Video(decoder) => &mut **decoder,
            StreamDecoder::Audio(decoder) => &mut **decoder,
        }
    }

    /// Drop every frame and packet buffered inside the decoder.
    pub(crate) fn flush(&mut self) {
        self.opened().flush();
    }
}

/// The send/receive half of a decoder, as driven by a decode cursor.
pub(crate) trait PacketDecoder {
    fn send_packet(&mut self, packet: &Packet) -> Result<(), FfmpegError>;

    /// Signal that no more packets will arrive.
    fn send_eof(&mut self) -> Result<(), FfmpegError>;

    /// Receive one buffered frame, `Ok(None)` when the decoder needs more
    /// input or has been fully drained.
    fn receive(&mut self) -> Result<Option<FrameHandle>, FfmpegError>;
}

impl PacketDecoder for StreamDecoder {
    fn send_packet(&mut self, packet: &Packet) -> Result<(), FfmpegError> {
        self.opened().send_packet(packet)
    }

    fn send_eof(&mut self) -> Result<(), FfmpegError> {
        self.opened().send_eof()
    }

    fn receive(&mut self) -> Result<Option<FrameHandle>, FfmpegError> {
        match self {
            StreamDecoder::Video(decoder) => {
                let mut frame = VideoFrame::empty();
                Ok(received(decoder.receive_frame(&mut frame))?
                    .then(|| FrameHandle::from_video(frame)))
            }
            StreamDecoder::Audio(decoder) => {
                let mut frame = AudioFrame::empty();
                Ok(received(decoder.receive_frame(&mut frame))?
                    .then(|| FrameHandle::from_audio(frame)))
            }
        }
    }
}

/// Map a `receive_frame` result to "got a frame" / "nothing ready".
fn received(result: Result<(), FfmpegError>) -> Result<bool, FfmpegError> {
    match result {
        Ok(()) => Ok(true),
        Err(FfmpegError::Eof) => Ok(false),
        Err(FfmpegError::Other { errno }) if errno == ffmpeg_next::error::EAGAIN => Ok(false),
        Err(error) => Err(error),
    }
}
