//! Sequential container reader with per-stream packet queues.
//!
//! The container is read front to back exactly once. A packet read while
//! looking for the other stream is parked on its own stream's queue and
//! handed out, in read order, the next time that stream asks for input.

use std::{collections::VecDeque, time::Duration};

use ffmpeg_next::{Error as FfmpegError, Packet, format::context::Input, media::Type};

use crate::{
    conversion::duration_to_seek_timestamp,
    error::ReelError,
    frame::MediaKind,
};

/// Index of the first stream of each media type, in ascending stream order.
pub(crate) fn select_streams(input: &Input) -> (Option<usize>, Option<usize>) {
    let mut video = None;
    let mut audio = None;
    for stream in input.streams() {
        match stream.parameters().medium() {
            Type::Video if video.is_none() => video = Some(stream.index()),
            Type::Audio if audio.is_none() => audio = Some(stream.index()),
            _ => {}
        }
    }
    (video, audio)
}

/// FIFO queues for the two selected streams, plus the sticky end-of-input
/// flag of the source feeding them.
///
/// Generic over the queued item so routing can be exercised without a
/// container.
#[derive(Debug)]
pub(crate) struct PacketRouter<P> {
    video_index: Option<usize>,
    audio_index: Option<usize>,
    video: VecDeque<P>,
    audio: VecDeque<P>,
    discarded: u64,
    exhausted: bool,
}

impl<P> PacketRouter<P> {
    pub(crate) fn new(video_index: Option<usize>, audio_index: Option<usize>) -> Self {
        Self {
            video_index,
            audio_index,
            video: VecDeque::new(),
            audio: VecDeque::new(),
            discarded: 0,
            exhausted: false,
        }
    }

    fn stream_index(&self, kind: MediaKind) -> Option<usize> {
        match kind {
            MediaKind::Video => self.video_index,
            MediaKind::Audio => self.audio_index,
        }
    }

    fn queue_mut(&mut self, kind: MediaKind) -> &mut VecDeque<P> {
        match kind {
            MediaKind::Video => &mut self.video,
            MediaKind::Audio => &mut self.audio,
        }
    }

    /// Next packet of `kind`: the head of its queue, or the next matching
    /// packet pulled from `read`, parking packets of the other stream on the
    /// way. `read` yields `(stream_index, packet)` and `Ok(None)` at end of
    /// input; after that it is never called again.
    pub(crate) fn request<F>(&mut self, kind: MediaKind, mut read: F) -> Result<Option<P>, ReelError>
    where
        F: FnMut() -> Result<Option<(usize, P)>, ReelError>,
    {
        if let Some(packet) = self.queue_mut(kind).pop_front() {
            return Ok(Some(packet));
        }
        if self.stream_index(kind).is_none() {
            return Err(ReelError::missing_stream(kind));
        }

        while !self.exhausted {
            match read()? {
                Some((stream_index, packet)) => {
                    if let Some(packet) = self.route(kind, stream_index, packet) {
                        return Ok(Some(packet));
                    }
                }
                None => {
                    log::debug!(
                        "End of input ({} video / {} audio packets still queued)",
                        self.video.len(),
                        self.audio.len()
                    );
                    self.exhausted = true;
                }
            }
        }
        Ok(None)
    }

    /// Deliver `packet` if it belongs to `wanted`, otherwise park it on its
    /// own stream's queue (or drop it when its stream is not selected).
    fn route(&mut self, wanted: MediaKind, stream_index: usize, packet: P) -> Option<P> {
        let owner = if Some(stream_index) == self.video_index {
            MediaKind::Video
        } else if Some(stream_index) == self.audio_index {
            MediaKind::Audio
        } else {
            self.discarded += 1;
            return None;
        };

        if owner == wanted {
            Some(packet)
        } else {
            self.queue_mut(owner).push_back(packet);
            None
        }
    }

    pub(crate) fn queued(&self, kind: MediaKind) -> usize {
        match kind {
            MediaKind::Video => self.video.len(),
            MediaKind::Audio => self.audio.len(),
        }
    }

    pub(crate) fn discarded(&self) -> u64 {
        self.discarded
    }

    pub(crate) fn is_exhausted(&self) -> bool {
        self.exhausted
    }

    /// Drop every parked packet and expect fresh input.
    pub(crate) fn reset(&mut self) {
        self.video.clear();
        self.audio.clear();
        self.exhausted = false;
    }
}

/// Owner of the container read cursor.
pub(crate) struct Demuxer {
    input: Input,
    router: PacketRouter<Packet>,
    packets_read: u64,
}

impl Demuxer {
    pub(crate) fn new(input: Input, video_index: Option<usize>, audio_index: Option<usize>) -> Self {
        Self {
            input,
            router: PacketRouter::new(video_index, audio_index),
            packets_read: 0,
        }
    }

    /// Next packet of `kind`, reading the container only when its queue is
    /// empty. `Ok(None)` once the container has no more input for it.
    pub(crate) fn request_packet(&mut self, kind: MediaKind) -> Result<Option<Packet>, ReelError> {
        let input = &mut self.input;
        let packets_read = &mut self.packets_read;
        self.router.request(kind, || {
            let mut packet = Packet::empty();
            match packet.read(input) {
                Ok(()) => {
                    *packets_read += 1;
                    Ok(Some((packet.stream(), packet)))
                }
                Err(FfmpegError::Eof) => Ok(None),
                Err(error) => Err(ReelError::decode(kind, format!("Failed to read packet: {error}"))),
            }
        })
    }

    /// Reposition the read cursor at or before `position` and drop every
    /// queued packet.
    pub(crate) fn seek(&mut self, position: Duration) -> Result<(), ReelError> {
        let timestamp = duration_to_seek_timestamp(position);
        self.input
            .seek(timestamp, ..timestamp)
            .map_err(|error| ReelError::SeekFailed {
                position,
                reason: error.to_string(),
            })?;
        self.router.reset();
        Ok(())
    }

    pub(crate) fn queued(&self, kind: MediaKind) -> usize {
        self.router.queued(kind)
    }

    pub(crate) fn packets_read(&self) -> u64 {
        self.packets_read
    }

    pub(crate) fn is_exhausted(&self) -> bool {
        self.router.is_exhausted()
    }
}

impl Drop for Demuxer {
    fn drop(&mut self) {
        log::trace!(
            "Closing container ({} packets read, {} discarded)",
            self.packets_read,
            self.router.discarded()
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // Interleaved container order: stream index and a tag per packet.
    const LAYOUT: [(usize, &str); 8] = [
        (0, "v0"),
        (1, "a0"),
        (1, "a1"),
        (2, "s0"),
        (0, "v1"),
        (1, "a2"),
        (0, "v2"),
        (1, "a3"),
    ];

    /// In-memory packet source counting how often it is read.
    struct Source {
        packets: std::slice::Iter<'static, (usize, &'static str)>,
        reads: usize,
    }

    impl Source {
        fn new() -> Self {
            Self {
                packets: LAYOUT.iter(),
                reads: 0,
            }
        }

        fn read(&mut self) -> Result<Option<(usize, &'static str)>, ReelError> {
            self.reads += 1;
            Ok(self.packets.next().copied())
        }
    }

    fn drain(
        router: &mut PacketRouter<&'static str>,
        source: &mut Source,
        kind: MediaKind,
    ) -> Vec<&'static str> {
        let mut packets = Vec::new();
        while let Some(packet) = router.request(kind, || source.read()).expect("request") {
            packets.push(packet);
        }
        packets
    }

    #[test]
    fn draining_one_stream_parks_the_other_in_order() {
        let mut router = PacketRouter::new(Some(0), Some(1));
        let mut source = Source::new();

        assert_eq!(drain(&mut router, &mut source, MediaKind::Video), ["v0", "v1", "v2"]);
        assert_eq!(router.queued(MediaKind::Audio), 3);
        assert!(router.is_exhausted());

        assert_eq!(
            drain(&mut router, &mut source, MediaKind::Audio),
            ["a0", "a1", "a2", "a3"]
        );
        assert_eq!(router.queued(MediaKind::Video), 0);
        assert_eq!(router.discarded(), 1);
    }

    #[test]
    fn alternating_requests_preserve_per_stream_order() {
        let mut router = PacketRouter::new(Some(0), Some(1));
        let mut source = Source::new();
        let mut next = |router: &mut PacketRouter<&'static str>, kind: MediaKind| {
            router.request(kind, || source.read()).expect("request")
        };

        assert_eq!(next(&mut router, MediaKind::Audio), Some("a0"));
        assert_eq!(next(&mut router, MediaKind::Video), Some("v0"));
        assert_eq!(next(&mut router, MediaKind::Video), Some("v1"));
        assert_eq!(next(&mut router, MediaKind::Audio), Some("a1"));
        assert_eq!(next(&mut router, MediaKind::Audio), Some("a2"));
        assert_eq!(next(&mut router, MediaKind::Video), Some("v2"));
        assert_eq!(next(&mut router, MediaKind::Video), None);
        assert_eq!(next(&mut router, MediaKind::Audio), Some("a3"));
        assert_eq!(next(&mut router, MediaKind::Audio), None);
    }

    #[test]
    fn end_of_input_is_never_read_past() {
        let mut router = PacketRouter::new(Some(0), Some(1));
        let mut source = Source::new();
        drain(&mut router, &mut source, MediaKind::Video);
        drain(&mut router, &mut source, MediaKind::Audio);
        let reads = source.reads;
        // Eight packets plus the read that reported end of input.
        assert_eq!(reads, LAYOUT.len() + 1);

        for kind in [MediaKind::Video, MediaKind::Audio, MediaKind::Video] {
            assert_eq!(router.request(kind, || source.read()).expect("request"), None);
        }
        assert_eq!(source.reads, reads);
    }

    #[test]
    fn missing_stream_is_an_error_without_reading() {
        let mut router = PacketRouter::new(Some(0), None);
        let mut source = Source::new();
        let result = router.request(MediaKind::Audio, || source.read());
        assert!(matches!(result, Err(ReelError::NoAudioStream)));
        assert_eq!(source.reads, 0);

        assert_eq!(drain(&mut router, &mut source, MediaKind::Video), ["v0", "v1", "v2"]);
        assert_eq!(router.queued(MediaKind::Audio), 0);
        assert_eq!(router.discarded(), 5);
    }

    #[test]
    fn read_errors_do_not_end_input() {
        let mut router = PacketRouter::<&'static str>::new(Some(0), Some(1));
        let result = router.request(MediaKind::Video, || {
            Err(ReelError::decode(MediaKind::Video, "corrupt packet"))
        });
        assert!(matches!(result, Err(ReelError::VideoDecodeError(_))));
        assert!(!router.is_exhausted());

        let mut source = Source::new();
        assert_eq!(
            router.request(MediaKind::Video, || source.read()).expect("request"),
            Some("v0")
        );
    }

    #[test]
    fn reset_drops_parked_packets_and_reopens_input() {
        let mut router = PacketRouter::new(Some(0), Some(1));
        let mut source = Source::new();
        drain(&mut router, &mut source, MediaKind::Video);
        assert!(router.queued(MediaKind::Audio) > 0);

        router.reset();
        assert_eq!(router.queued(MediaKind::Audio), 0);
        assert!(!router.is_exhausted());

        let mut rewound = Source::new();
        assert_eq!(drain(&mut router, &mut rewound, MediaKind::Audio), ["a0", "a1", "a2", "a3"]);
    }
}
