// crates/stillreel-core/src/codec.rs
//
// The two collaborator seams the encode pump drives, plus the wire types
// that cross them. Neutral home so stillreel-media's FFmpeg sessions and
// the pump's test doubles implement the same contracts.
//
// Timestamps at these seams are always microseconds; container writers
// rescale to their own time base at the output boundary.

use std::time::Duration;

use crate::error::ConvertResult;
use crate::frame::RgbaFrame;

/// Index of a track inside a container writer. Assigned by `add_track`.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct TrackId(pub usize);

/// Codec carried by a negotiated track format.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CodecKind {
    H264,
}

/// An encoder's negotiated output format.
///
/// Unknown until the session emits [`PollStatus::FormatChanged`]; carries
/// everything a container writer needs to describe the track, including
/// the opaque codec configuration bytes (SPS/PPS for H.264).
#[derive(Clone, Debug)]
pub struct TrackFormat {
    pub codec:      CodecKind,
    pub width:      u32,
    pub height:     u32,
    pub frame_rate: u32,
    pub extradata:  Vec<u8>,
}

/// Flags attached to one compressed output chunk.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct SampleFlags {
    /// Independently decodable frame.
    pub key_frame:     bool,
    /// Pure codec configuration metadata, no visual payload.
    pub codec_config:  bool,
    /// The encoder will produce nothing further.
    pub end_of_stream: bool,
}

/// One compressed output chunk.
///
/// `pts_us` is meaningless as emitted by an encoder session — the pump
/// assigns the presentation timestamp from its own written-frame counter
/// before the sample reaches a writer.
#[derive(Clone, Debug)]
pub struct SampleUnit {
    pub data:   Vec<u8>,
    pub pts_us: i64,
    pub flags:  SampleFlags,
}

/// Outcome of one bounded poll of an encoder's output queue.
#[derive(Debug)]
pub enum PollStatus {
    /// Nothing available yet; poll again.
    Pending,
    /// The output format became known. Valid at most once per session.
    FormatChanged(TrackFormat),
    /// Output buffer set changed. Not expected from an encoder; ignorable.
    BuffersChanged,
    /// A compressed sample is ready.
    Sample(SampleUnit),
}

/// A video encoder session with a surface-style input.
///
/// Implementations own one underlying codec instance for the lifetime of
/// one conversion. The input side is a canvas: `draw` blits source pixels
/// onto it once, `present` re-submits the current canvas content as the
/// next input frame.
pub trait EncoderSession {
    /// Blit `frame` onto the input canvas. The frame must match the
    /// session's configured dimensions exactly.
    fn draw(&mut self, frame: &RgbaFrame) -> ConvertResult<()>;

    /// Submit the current canvas content as one more input frame.
    ///
    /// A session whose input queue is momentarily full may drop the
    /// submission — the canvas is unchanged, so a later `present`
    /// supplies identical content.
    fn present(&mut self) -> ConvertResult<()>;

    /// Poll the output queue, waiting at most `timeout`.
    fn poll_output(&mut self, timeout: Duration) -> ConvertResult<PollStatus>;

    /// Stop the session. Pending output is discarded. Idempotent.
    fn stop(&mut self) -> ConvertResult<()>;
}

/// A container writer producing one video file.
///
/// Exactly one `add_track` call is valid, followed by exactly one
/// `start`; writes are only legal between `start` and `stop`.
pub trait ContainerWriter {
    /// Describe the single video track. Errors on a second call.
    fn add_track(&mut self, format: &TrackFormat) -> ConvertResult<TrackId>;

    /// Write the container header. Requires a track; errors on a second call.
    fn start(&mut self) -> ConvertResult<()>;

    /// Append one timestamped sample to `track`.
    fn write_sample(&mut self, track: TrackId, sample: &SampleUnit) -> ConvertResult<()>;

    /// Finalize the container. Idempotent.
    fn stop(&mut self) -> ConvertResult<()>;
}
