// crates/stillreel-media/src/lib.rs
//
// FFmpeg-backed implementation of the conversion pipeline:
//   still.rs   — decode + scale the source image
//   encoder.rs — H.264 encoder session (surface-style input, polled output)
//   muxer.rs   — MP4 writer session
//   pump.rs    — the encode pump driving encoder → muxer
//   convert.rs — public one-shot conversion entry points
//   worker.rs  — background jobs with cancellation and progress reporting

pub mod convert;
pub mod encoder;
pub mod muxer;
pub mod pump;
pub mod still;
pub mod worker;

// Re-export the main public API so hosts can depend on this crate alone.
pub use convert::{convert, convert_with, ConvertStats};
pub use worker::ConvertWorker;
pub use stillreel_core::{ConvertError, ConvertOptions, ConvertRequest, JobUpdate, RgbaFrame, StillSource};
