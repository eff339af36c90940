//! Error handling integration tests.
//!
//! These tests verify that meaningful errors are returned for various
//! failure conditions.

use std::{path::Path, time::Duration};

use reel::{CaptureSession, DecodeSession, MediaKind, ReelError, SizeStrategy};

#[test]
fn open_nonexistent_file() {
    let result = DecodeSession::open("this_file_does_not_exist.mp4");
    assert!(result.is_err());

    let error_message = result.unwrap_err().to_string();
    assert!(
        error_message.contains("Failed to open media file"),
        "Error message should mention file open failure: {error_message}",
    );
    assert!(
        error_message.contains("this_file_does_not_exist.mp4"),
        "Error message should name the file: {error_message}",
    );
}

#[test]
fn open_invalid_file() {
    // Create a temporary file with garbage content.
    let temporary_directory = tempfile::tempdir().expect("Failed to create temp dir");
    let invalid_file_path = temporary_directory.path().join("invalid.mp4");
    std::fs::write(&invalid_file_path, b"this is not a media file")
        .expect("Failed to write invalid file");

    let result = DecodeSession::open(&invalid_file_path);
    assert!(result.is_err(), "Expected error for invalid media file");

    let result = CaptureSession::open(&invalid_file_path, SizeStrategy::native());
    assert!(result.is_err(), "Expected error for invalid media file");
}

#[test]
fn missing_stream_messages() {
    let path = "tests/fixtures/sample_audio_only.mp4";
    if !Path::new(path).exists() {
        return;
    }

    let session = DecodeSession::open(path).expect("Failed to open fixture");
    let error = session
        .read_next_frame(MediaKind::Video)
        .expect_err("audio-only file has no video");
    assert!(matches!(error, ReelError::NoVideoStream));
    assert!(error.to_string().contains("No video stream"));

    let path = "tests/fixtures/sample_video_only.mp4";
    if !Path::new(path).exists() {
        return;
    }

    let session = DecodeSession::open(path).expect("Failed to open fixture");
    let error = session
        .read_audio_frame()
        .expect_err("video-only file has no audio");
    assert!(error.to_string().contains("No audio stream"));
    assert!(session.read_video_frame().expect("video still decodes").is_some());
}

#[test]
fn unreachable_capture_message() {
    let path = "tests/fixtures/sample_video.mp4";
    if !Path::new(path).exists() {
        return;
    }

    let session = CaptureSession::open(path, SizeStrategy::native()).expect("Failed to open");
    let error = session
        .capture_at(Duration::from_secs(3600))
        .expect_err("an hour is past the end of the fixture");
    assert!(matches!(
        error,
        ReelError::CaptureUnreachable(position) if position == Duration::from_secs(3600)
    ));
    assert!(error.to_string().contains("unreachable"), "unexpected message: {error}");
}

#[test]
fn invalid_positions_are_rejected_before_decoding() {
    let path = "tests/fixtures/sample_video.mp4";
    if !Path::new(path).exists() {
        return;
    }

    let session = CaptureSession::open(path, SizeStrategy::native()).expect("Failed to open");
    for seconds in [-1.0, f64::NAN, f64::INFINITY] {
        let error = session
            .capture_at_seconds(seconds)
            .expect_err("position should be rejected");
        assert!(
            error.to_string().contains("Invalid capture position"),
            "unexpected error: {error}"
        );
    }
}
