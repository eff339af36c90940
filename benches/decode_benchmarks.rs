//! Benchmarks for decoding, conversion, and capture.
//!
//! Run with: cargo bench
//! Run with all features: cargo bench --all-features
//!
//! Requires fixture files from `tests/fixtures/generate_fixtures.sh`.

use std::{path::Path, time::Duration};

use criterion::Criterion;
use reel::{
    CaptureSession, DecodeSession, FrameGeometry, NativeLogLevel, OutputPixelFormat,
    OutputSampleFormat, PixelConverter, SampleConverter, SizeStrategy, set_native_log_level,
};

#[cfg(feature = "async")]
use tokio::runtime::Runtime;

const SAMPLE_VIDEO: &str = "tests/fixtures/sample_video.mp4";

fn benchmark_decode(criterion: &mut Criterion) {
    set_native_log_level(NativeLogLevel::Error);

    if !Path::new(SAMPLE_VIDEO).exists() {
        eprintln!("Skipping benchmark: fixture not found");
        return;
    }

    criterion.bench_function("decode all video frames", |bencher| {
        bencher.iter(|| {
            let session = DecodeSession::open(SAMPLE_VIDEO).unwrap();
            while session.read_video_frame().unwrap().is_some() {}
        });
    });

    criterion.bench_function("decode all audio frames to i16", |bencher| {
        bencher.iter(|| {
            let session = DecodeSession::open(SAMPLE_VIDEO).unwrap();
            let mut converter = SampleConverter::new(OutputSampleFormat::I16);
            while let Some(frame) = session.read_audio_frame().unwrap() {
                let _buffer = converter.convert(&frame).unwrap();
            }
        });
    });
}

fn benchmark_pixel_conversion(criterion: &mut Criterion) {
    if !Path::new(SAMPLE_VIDEO).exists() {
        return;
    }

    let session = DecodeSession::open(SAMPLE_VIDEO).unwrap();
    let video = session.info().video.clone().unwrap();
    let frame = session.read_video_frame().unwrap().unwrap();
    let source = FrameGeometry::new(video.pixel_format, video.width, video.height);

    let mut group = criterion.benchmark_group("pixel conversion");
    for (label, format, width, height) in [
        ("bgr24 native", OutputPixelFormat::Bgr24, video.width, video.height),
        ("bgra native", OutputPixelFormat::Bgra, video.width, video.height),
        ("bgr24 320x240", OutputPixelFormat::Bgr24, 320, 240),
    ] {
        let mut converter = PixelConverter::new();
        converter
            .configure(source, FrameGeometry::new(format.to_ffmpeg_pixel(), width, height))
            .unwrap();
        let mut buffer = converter.allocate_buffer().unwrap();
        group.bench_function(label, |bencher| {
            bencher.iter(|| converter.convert_into(&frame, &mut buffer).unwrap());
        });
    }
    group.finish();
}

fn benchmark_capture(criterion: &mut Criterion) {
    if !Path::new(SAMPLE_VIDEO).exists() {
        return;
    }

    let session = CaptureSession::open(SAMPLE_VIDEO, SizeStrategy::fit_within(320, 180)).unwrap();
    let mut group = criterion.benchmark_group("capture");
    group.bench_function("capture at 1s", |bencher| {
        bencher.iter(|| session.capture_at(Duration::from_secs(1)).unwrap());
    });
    group.bench_function("capture at 4s", |bencher| {
        bencher.iter(|| session.capture_at(Duration::from_secs(4)).unwrap());
    });
    group.finish();
}

#[cfg(feature = "async")]
fn benchmark_async(criterion: &mut Criterion) {
    use std::sync::Arc;

    use reel::capture_async;

    if !Path::new(SAMPLE_VIDEO).exists() {
        return;
    }

    let rt = Runtime::new().unwrap();
    let session =
        Arc::new(CaptureSession::open(SAMPLE_VIDEO, SizeStrategy::fit_within(320, 180)).unwrap());
    criterion.bench_function("capture_async at 2s", |bencher| {
        bencher.iter(|| {
            rt.block_on(async {
                capture_async(Arc::clone(&session), Duration::from_secs(2))
                    .await
                    .unwrap()
            })
        });
    });
}

#[cfg(not(feature = "async"))]
fn benchmark_async(_criterion: &mut Criterion) {}

criterion::criterion_group!(
    benches,
    benchmark_decode,
    benchmark_pixel_conversion,
    benchmark_capture,
    benchmark_async,
);
criterion::criterion_main!(benches);
