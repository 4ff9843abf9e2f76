// crates/stillreel-media/src/convert.rs
//
// Public one-shot conversion entry points. Blocking — run on a dedicated
// thread (ConvertWorker does exactly that).

use std::sync::atomic::AtomicBool;
use std::path::PathBuf;

use tracing::info;

use stillreel_core::error::ConvertResult;
use stillreel_core::frame::RgbaFrame;
use stillreel_core::request::{ConvertOptions, ConvertRequest, StillSource};
use stillreel_core::timing::FRAME_RATE;

use crate::encoder::H264Session;
use crate::muxer::Mp4Writer;
use crate::pump;
use crate::still;

/// What a successful conversion produced.
#[derive(Clone, Debug)]
pub struct ConvertStats {
    pub output:         PathBuf,
    pub frames_written: u64,
    /// Presentation timestamp of the final sample, µs.
    pub last_pts_us:    i64,
}

/// Convert `request` with default options and no cancellation.
///
/// On failure the output path may hold a truncated, unplayable file —
/// callers must treat it as unusable and remove it themselves.
pub fn convert(request: &ConvertRequest) -> ConvertResult<ConvertStats> {
    convert_with(request, &ConvertOptions::default(), &AtomicBool::new(false), |_| {})
}

/// Convert `request`, honoring `cancel` between polls and reporting each
/// written frame through `on_frame`.
pub fn convert_with(
    request:  &ConvertRequest,
    options:  &ConvertOptions,
    cancel:   &AtomicBool,
    on_frame: impl FnMut(u64),
) -> ConvertResult<ConvertStats> {
    request.validate()?;

    let frame       = source_frame(request)?;
    let frame_count = request.frame_count();

    // Both sessions exist for exactly this conversion; drive() stops them
    // in order (encoder, then writer) on every exit path.
    let mut encoder = H264Session::open(request.width, request.height, FRAME_RATE)?;
    let mut writer  = Mp4Writer::create(&request.output)?;

    let outcome = pump::drive(
        &mut encoder,
        &mut writer,
        &frame,
        frame_count,
        options,
        cancel,
        on_frame,
    )?;

    info!(
        output = %request.output.display(),
        frames = outcome.frames_written,
        "conversion complete"
    );

    Ok(ConvertStats {
        output:         request.output.clone(),
        frames_written: outcome.frames_written,
        last_pts_us:    outcome.last_pts_us,
    })
}

/// Resolve the request's source into a frame of exactly the target size.
fn source_frame(request: &ConvertRequest) -> ConvertResult<RgbaFrame> {
    match &request.source {
        StillSource::Path(path)   => still::load_still(path, request.width, request.height),
        StillSource::Frame(frame) => still::fit_frame(frame, request.width, request.height),
    }
}
