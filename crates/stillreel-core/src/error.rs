// crates/stillreel-core/src/error.rs
//
// Every failure mode of a conversion. All of them are terminal: nothing
// here is retried, and a failed conversion may leave a truncated output
// file on disk for the caller to remove.

use std::time::Duration;

use thiserror::Error;

/// Terminal failure of one conversion.
#[derive(Debug, Error)]
pub enum ConvertError {
    /// The request itself is invalid (non-positive dimensions or duration).
    #[error("invalid request: {0}")]
    Precondition(String),

    /// The encoder session violated its output contract, e.g. announced
    /// its output format a second time or signalled end-of-stream early.
    #[error("encoder protocol violation: {0}")]
    EncoderProtocol(String),

    /// The container writer was driven out of order, e.g. a sample write
    /// was attempted before the writer was started.
    #[error("muxer state violation: {0}")]
    MuxerState(String),

    /// A collaborator (decode, encode, mux) reported a failure.
    #[error("platform failure: {0}")]
    Platform(String),

    /// The caller's cancel flag was observed between polls.
    #[error("conversion cancelled")]
    Cancelled,

    /// The encoder produced neither a format nor a sample for the whole
    /// stall window.
    #[error("encoder stalled: no output within {0:?}")]
    Stalled(Duration),
}

/// Convenience Result alias used across both crates.
pub type ConvertResult<T> = Result<T, ConvertError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn precondition_display_names_the_field() {
        let err = ConvertError::Precondition("width must be positive".into());
        assert_eq!(err.to_string(), "invalid request: width must be positive");
    }

    #[test]
    fn protocol_display_carries_reason() {
        let err = ConvertError::EncoderProtocol("output format changed twice".into());
        assert!(err.to_string().contains("format changed twice"));
    }

    #[test]
    fn muxer_state_display_carries_reason() {
        let err = ConvertError::MuxerState("muxer has not started".into());
        assert!(err.to_string().contains("has not started"));
    }

    #[test]
    fn stalled_display_mentions_window() {
        let err = ConvertError::Stalled(Duration::from_secs(10));
        assert!(err.to_string().contains("10s"));
    }
}
