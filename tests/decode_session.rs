//! DecodeSession integration tests.
//!
//! Tests require fixture files from `tests/fixtures/generate_fixtures.sh`.

use std::{path::Path, sync::Arc, thread};

use reel::{CursorState, DecodeSession, MediaKind, OutputSampleFormat, ReelError, SampleConverter};

fn sample_video_path() -> &'static str {
    "tests/fixtures/sample_video.mp4"
}

fn sample_video_only_path() -> &'static str {
    "tests/fixtures/sample_video_only.mp4"
}

fn sample_audio_only_path() -> &'static str {
    "tests/fixtures/sample_audio_only.mp4"
}

fn sample_mkv_path() -> &'static str {
    "tests/fixtures/sample_short.mkv"
}

/// Decoded audio samples per channel for every remaining audio frame.
fn drain_audio(session: &DecodeSession) -> (u64, u64) {
    let mut converter = SampleConverter::new(OutputSampleFormat::I16);
    let mut frames = 0;
    let mut samples = 0;
    while let Some(frame) = session.read_audio_frame().expect("Failed to decode audio") {
        frames += 1;
        samples += converter.convert(&frame).expect("Failed to convert").samples as u64;
    }
    (frames, samples)
}

fn drain_video(session: &DecodeSession) -> u64 {
    let mut frames = 0;
    while session.read_video_frame().expect("Failed to decode video").is_some() {
        frames += 1;
    }
    frames
}

// ── open ───────────────────────────────────────────────────────────

#[test]
fn open_reports_both_streams() {
    let path = sample_video_path();
    if !Path::new(path).exists() {
        return;
    }

    let session = DecodeSession::open(path).expect("Failed to open fixture");
    assert!(session.path().is_absolute());
    assert!(session.has(MediaKind::Video));
    assert!(session.has(MediaKind::Audio));

    let info = session.info();
    let video = info.video.as_ref().expect("video stream");
    assert_eq!((video.width, video.height), (640, 480));
    assert!((video.frames_per_second - 30.0).abs() < 0.01);

    let audio = info.audio.as_ref().expect("audio stream");
    assert_eq!(audio.sample_rate, 44_100);
    assert_eq!(audio.channels, 2);

    assert!(info.duration.as_secs_f64() > 4.5);
    assert_eq!(session.cursor_state(MediaKind::Video), Some(CursorState::Draining));
    assert_eq!(session.packets_read(), 0);
}

#[test]
fn open_matroska() {
    let path = sample_mkv_path();
    if !Path::new(path).exists() {
        return;
    }

    let session = DecodeSession::open(path).expect("Failed to open fixture");
    assert!(session.info().format.contains("matroska"));
    assert!(drain_video(&session) > 0);
    assert!(drain_audio(&session).1 > 0);
}

// ── cross-stream queueing ─────────────────────────────────────────

#[test]
fn draining_video_first_loses_no_audio() {
    let path = sample_video_path();
    if !Path::new(path).exists() {
        return;
    }

    let audio_first = DecodeSession::open(path).expect("Failed to open fixture");
    let expected = drain_audio(&audio_first);
    assert!(expected.1 > 0);

    let video_first = DecodeSession::open(path).expect("Failed to open fixture");
    assert_eq!(drain_video(&video_first), 150);
    assert!(
        video_first.queued_packets(MediaKind::Audio) > 0,
        "audio packets read while decoding video should be queued"
    );
    assert_eq!(drain_audio(&video_first), expected);
    assert_eq!(video_first.queued_packets(MediaKind::Audio), 0);
}

#[test]
fn interleaved_reads_match_sequential_reads() {
    let path = sample_video_path();
    if !Path::new(path).exists() {
        return;
    }

    let sequential = DecodeSession::open(path).expect("Failed to open fixture");
    let video_frames = drain_video(&sequential);
    let audio = drain_audio(&sequential);

    let interleaved = DecodeSession::open(path).expect("Failed to open fixture");
    let mut converter = SampleConverter::new(OutputSampleFormat::I16);
    let (mut seen_video, mut seen_audio, mut samples) = (0, 0, 0);
    let (mut video_done, mut audio_done) = (false, false);
    while !video_done || !audio_done {
        match interleaved.read_video_frame().expect("video") {
            Some(_) => seen_video += 1,
            None => video_done = true,
        }
        for _ in 0..3 {
            match interleaved.read_audio_frame().expect("audio") {
                Some(frame) => {
                    seen_audio += 1;
                    samples += converter.convert(&frame).expect("convert").samples as u64;
                }
                None => audio_done = true,
            }
        }
    }

    assert_eq!(seen_video, video_frames);
    assert_eq!((seen_audio, samples), audio);
    assert_eq!(interleaved.packets_read(), sequential.packets_read());
}

#[test]
fn cursors_can_be_driven_from_different_threads() {
    let path = sample_video_path();
    if !Path::new(path).exists() {
        return;
    }

    let reference = DecodeSession::open(path).expect("Failed to open fixture");
    let expected_video = drain_video(&reference);
    let expected_audio = drain_audio(&reference);

    let session = Arc::new(DecodeSession::open(path).expect("Failed to open fixture"));
    let video_session = Arc::clone(&session);
    let video_thread = thread::spawn(move || drain_video(&video_session));
    let audio_session = Arc::clone(&session);
    let audio_thread = thread::spawn(move || drain_audio(&audio_session));

    assert_eq!(video_thread.join().expect("video thread"), expected_video);
    assert_eq!(audio_thread.join().expect("audio thread"), expected_audio);
}

// ── frame order and end of stream ─────────────────────────────────

#[test]
fn video_frames_come_out_in_presentation_order() {
    let path = sample_video_path();
    if !Path::new(path).exists() {
        return;
    }

    let session = DecodeSession::open(path).expect("Failed to open fixture");
    let time_base = session.time_base(MediaKind::Video).expect("time base");

    let mut previous = None;
    while let Some(frame) = session.read_video_frame().expect("Failed to decode") {
        let timestamp = frame.timestamp(time_base).expect("frame has a timestamp");
        if let Some(previous) = previous {
            assert!(timestamp > previous, "{timestamp:?} after {previous:?}");
        }
        previous = Some(timestamp);
    }
}

#[test]
fn end_of_stream_is_sticky_and_stops_reading() {
    let path = sample_video_path();
    if !Path::new(path).exists() {
        return;
    }

    let session = DecodeSession::open(path).expect("Failed to open fixture");
    drain_video(&session);
    drain_audio(&session);

    assert_eq!(session.cursor_state(MediaKind::Video), Some(CursorState::Ended));
    assert_eq!(session.cursor_state(MediaKind::Audio), Some(CursorState::Ended));
    assert!(session.is_input_exhausted());

    let packets = session.packets_read();
    for _ in 0..5 {
        assert!(session.read_video_frame().expect("read after end").is_none());
        assert!(session.read_audio_frame().expect("read after end").is_none());
    }
    assert_eq!(session.packets_read(), packets);
}

#[test]
fn released_frames_can_be_released_again() {
    let path = sample_video_path();
    if !Path::new(path).exists() {
        return;
    }

    let session = DecodeSession::open(path).expect("Failed to open fixture");
    let mut frame = session.read_video_frame().expect("decode").expect("first frame");
    assert_eq!(frame.kind(), MediaKind::Video);
    assert!(frame.video().is_some());
    frame.release();
    frame.release();
    assert!(frame.is_released());
}

// ── missing streams ───────────────────────────────────────────────

#[test]
fn video_only_file_has_no_audio_cursor() {
    let path = sample_video_only_path();
    if !Path::new(path).exists() {
        return;
    }

    let session = DecodeSession::open(path).expect("Failed to open fixture");
    assert!(!session.has(MediaKind::Audio));
    assert!(session.info().audio.is_none());
    assert_eq!(session.cursor_state(MediaKind::Audio), None);
    assert!(matches!(
        session.read_audio_frame(),
        Err(ReelError::NoAudioStream)
    ));
    assert_eq!(drain_video(&session), 150);
}

#[test]
fn audio_only_file_has_no_video_cursor() {
    let path = sample_audio_only_path();
    if !Path::new(path).exists() {
        return;
    }

    let session = DecodeSession::open(path).expect("Failed to open fixture");
    assert!(!session.has(MediaKind::Video));
    assert!(matches!(
        session.read_video_frame(),
        Err(ReelError::NoVideoStream)
    ));
    let (frames, samples) = drain_audio(&session);
    assert!(frames > 0);
    // 5 s at 44.1 kHz, allowing for encoder priming and padding.
    assert!((200_000..=240_000).contains(&samples), "samples: {samples}");
}
