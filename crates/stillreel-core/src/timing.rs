// crates/stillreel-core/src/timing.rs
//
// Frame-count and presentation-timestamp arithmetic shared by the pump,
// the request types, and the tests.

/// Output frame rate for every conversion, in frames per second.
pub const FRAME_RATE: u32 = 30;

/// Microseconds per second, the unit of all presentation timestamps.
pub const MICROS_PER_SEC: i64 = 1_000_000;

/// Number of frames a conversion of `duration_secs` seconds produces.
///
/// The extra frame past the truncated product means even a duration
/// shorter than one frame interval still yields a playable one-frame file.
///
/// ```
/// use stillreel_core::timing::frame_count;
/// assert_eq!(frame_count(2.0),  61);
/// assert_eq!(frame_count(0.01), 1);
/// assert_eq!(frame_count(1.0),  31);
/// ```
pub fn frame_count(duration_secs: f64) -> u64 {
    (duration_secs * FRAME_RATE as f64) as u64 + 1
}

/// Presentation timestamp in microseconds of the k-th written frame.
///
/// Integer division per frame, not a cumulative step — frame 60 at 30 fps
/// lands on exactly 2_000_000 µs with no accumulated rounding drift.
///
/// ```
/// use stillreel_core::timing::pts_for_frame;
/// assert_eq!(pts_for_frame(0),  0);
/// assert_eq!(pts_for_frame(1),  33_333);
/// assert_eq!(pts_for_frame(60), 2_000_000);
/// ```
pub fn pts_for_frame(index: u64) -> i64 {
    index as i64 * MICROS_PER_SEC / FRAME_RATE as i64
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pts_sequence_is_strictly_increasing() {
        let mut prev = -1i64;
        for k in 0..600 {
            let pts = pts_for_frame(k);
            assert!(pts > prev, "pts {pts} at frame {k} not above {prev}");
            prev = pts;
        }
    }

    #[test]
    fn pts_lands_on_whole_seconds_every_thirty_frames() {
        for s in 0..10 {
            assert_eq!(pts_for_frame(s * 30), s as i64 * MICROS_PER_SEC);
        }
    }

    #[test]
    fn frame_count_truncates_before_adding_one() {
        // 0.9994 s * 30 = 29.982 → 29 full intervals → 30 frames.
        assert_eq!(frame_count(0.9994), 30);
        assert_eq!(frame_count(1.0001), 31);
    }
}
