// crates/stillreel-core/src/lib.rs
//
// Plain data and seams only — no ffmpeg, no threads, no I/O.
//
// stillreel-media implements the collaborator traits declared in `codec`
// against FFmpeg; tests implement them against scripted mocks. Everything
// that crosses a crate or thread boundary lives here.

pub mod codec;
pub mod error;
pub mod frame;
pub mod job;
pub mod request;
pub mod timing;

pub use codec::{CodecKind, ContainerWriter, EncoderSession, PollStatus, SampleFlags, SampleUnit, TrackFormat, TrackId};
pub use error::{ConvertError, ConvertResult};
pub use frame::RgbaFrame;
pub use job::JobUpdate;
pub use request::{ConvertOptions, ConvertRequest, StillSource};
