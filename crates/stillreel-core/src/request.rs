// crates/stillreel-core/src/request.rs
//
// The complete description of one conversion job, plus the pump's tuning
// knobs. Immutable once constructed; everything derived (frame count,
// per-frame pts) comes from `timing`.

use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{ConvertError, ConvertResult};
use crate::frame::RgbaFrame;
use crate::timing;

/// Where the source pixels come from.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub enum StillSource {
    /// An image file on disk, decoded and scaled by the image source
    /// collaborator.
    Path(PathBuf),
    /// An already decoded buffer. Rescaled if its dimensions differ from
    /// the request.
    Frame(RgbaFrame),
}

/// One conversion job: replicate `source` across the computed number of
/// frames at 30 fps and write an MP4 to `output`.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ConvertRequest {
    pub source:        StillSource,
    pub width:         u32,
    pub height:        u32,
    pub duration_secs: f64,
    pub output:        PathBuf,
}

impl ConvertRequest {
    /// Number of samples the conversion will write.
    pub fn frame_count(&self) -> u64 {
        timing::frame_count(self.duration_secs)
    }

    /// Reject non-positive dimensions or durations before any session is
    /// acquired.
    pub fn validate(&self) -> ConvertResult<()> {
        if self.width == 0 {
            return Err(ConvertError::Precondition("width must be positive".into()));
        }
        if self.height == 0 {
            return Err(ConvertError::Precondition("height must be positive".into()));
        }
        if !self.duration_secs.is_finite() || self.duration_secs <= 0.0 {
            return Err(ConvertError::Precondition("duration must be positive".into()));
        }
        Ok(())
    }
}

/// Pump tuning. The defaults mirror the fixed constants of the encode
/// loop; `stall_window` bounds how long the pump tolerates an encoder
/// that produces neither a format nor a sample.
#[derive(Clone, Copy, Debug)]
pub struct ConvertOptions {
    pub poll_timeout: Duration,
    pub stall_window: Duration,
}

impl Default for ConvertOptions {
    fn default() -> Self {
        Self {
            poll_timeout: Duration::from_millis(10),
            stall_window: Duration::from_secs(10),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request(width: u32, height: u32, duration: f64) -> ConvertRequest {
        ConvertRequest {
            source:        StillSource::Path(PathBuf::from("poster.png")),
            width,
            height,
            duration_secs: duration,
            output:        PathBuf::from("out.mp4"),
        }
    }

    #[test]
    fn valid_request_passes() {
        assert!(request(640, 480, 2.0).validate().is_ok());
    }

    #[test]
    fn zero_width_is_a_precondition_error() {
        let err = request(0, 480, 2.0).validate().unwrap_err();
        assert!(matches!(err, ConvertError::Precondition(_)));
        assert!(err.to_string().contains("width"));
    }

    #[test]
    fn zero_height_is_a_precondition_error() {
        assert!(matches!(
            request(640, 0, 2.0).validate().unwrap_err(),
            ConvertError::Precondition(_)
        ));
    }

    #[test]
    fn non_positive_duration_is_a_precondition_error() {
        assert!(request(640, 480, 0.0).validate().is_err());
        assert!(request(640, 480, -1.0).validate().is_err());
        assert!(request(640, 480, f64::NAN).validate().is_err());
    }

    #[test]
    fn frame_count_follows_duration() {
        assert_eq!(request(640, 480, 2.0).frame_count(), 61);
        assert_eq!(request(640, 480, 0.5).frame_count(), 16);
    }

    #[test]
    fn request_round_trips_through_json() {
        let req  = request(640, 480, 2.0);
        let json = serde_json::to_string(&req).unwrap();
        let back: ConvertRequest = serde_json::from_str(&json).unwrap();
        assert_eq!(back.width, 640);
        assert_eq!(back.frame_count(), 61);
        assert!(matches!(back.source, StillSource::Path(p) if p == PathBuf::from("poster.png")));
    }
}
