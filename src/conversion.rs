//! Internal utility functions.
//!
//! Timestamp conversion and row-stride arithmetic shared by the decode and
//! capture paths.

use std::time::Duration;

use ffmpeg_next::Rational;

/// Rescale a PTS value from stream time base to seconds.
pub fn pts_to_seconds(pts: i64, time_base: Rational) -> f64 {
    pts as f64 * time_base.numerator() as f64 / time_base.denominator().max(1) as f64
}

/// Rescale a PTS value to a [`Duration`], clamping negative times to zero.
pub fn pts_to_duration(pts: i64, time_base: Rational) -> Duration {
    Duration::from_secs_f64(pts_to_seconds(pts, time_base).max(0.0))
}

/// Convert a [`Duration`] to a seek timestamp in AV_TIME_BASE (microseconds).
///
/// Container-level seeking (`stream_index = -1`) expects AV_TIME_BASE units.
pub fn duration_to_seek_timestamp(duration: Duration) -> i64 {
    i64::try_from(duration.as_micros()).unwrap_or(i64::MAX)
}

/// Row stride in bytes, padded up to the next multiple of four.
///
/// Bitmap consumers that expect DWORD-aligned rows need exactly this value.
pub fn aligned_stride(width: u32, bytes_per_pixel: usize) -> usize {
    (width as usize * bytes_per_pixel).div_ceil(4) * 4
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn aligned_stride_for_bgr24() {
        for width in [1_u32, 2, 3, 4, 5, 100, 101] {
            let expected = ((width as usize * 3 + 3) / 4) * 4;
            assert_eq!(aligned_stride(width, 3), expected, "width {width}");
        }
        assert_eq!(aligned_stride(1, 3), 4);
        assert_eq!(aligned_stride(2, 3), 8);
        assert_eq!(aligned_stride(3, 3), 12);
        assert_eq!(aligned_stride(4, 3), 12);
        assert_eq!(aligned_stride(5, 3), 16);
        assert_eq!(aligned_stride(100, 3), 300);
        assert_eq!(aligned_stride(101, 3), 304);
    }

    #[test]
    fn aligned_stride_four_byte_pixels_need_no_padding() {
        assert_eq!(aligned_stride(7, 4), 28);
    }

    #[test]
    fn pts_conversion() {
        let time_base = Rational::new(1, 1000);
        assert_eq!(pts_to_seconds(1500, time_base), 1.5);
        assert_eq!(pts_to_duration(-20, time_base), Duration::ZERO);
        assert_eq!(pts_to_duration(250, time_base), Duration::from_millis(250));
    }

    #[test]
    fn seek_timestamp_is_microseconds() {
        assert_eq!(duration_to_seek_timestamp(Duration::from_millis(1500)), 1_500_000);
        assert_eq!(duration_to_seek_timestamp(Duration::ZERO), 0);
    }
}
