// crates/stillreel-media/src/still.rs
//
// Image source collaborator: turn a still image file (or a caller-supplied
// buffer) into a packed RGBA frame of exactly the requested dimensions.
//
// Oversized sources are reduced in two steps, mirroring how a
// memory-conscious decoder subsamples: first a cheap power-of-two point
// subsample sized so that half the native dimensions still exceed the
// request, then one exact bilinear rescale when dimensions still differ.

use std::path::Path;

use tracing::debug;

use ffmpeg_the_third as ffmpeg;
use ffmpeg::format::{input, Pixel};
use ffmpeg::media::Type;
use ffmpeg::software::scaling::{context::Context as SwsContext, flag::Flags};
use ffmpeg::util::frame::video::Video as VideoFrame;

use stillreel_core::error::{ConvertError, ConvertResult};
use stillreel_core::frame::RgbaFrame;

/// Decode `path` and return an RGBA frame of exactly `width` × `height`.
pub fn load_still(path: &Path, width: u32, height: u32) -> ConvertResult<RgbaFrame> {
    let decoded = decode_first_frame(path)?;
    let (native_w, native_h) = (decoded.width(), decoded.height());

    let factor = sample_factor(native_w, native_h, width, height);
    let sub_w  = (native_w / factor).max(1);
    let sub_h  = (native_h / factor).max(1);

    debug!(native_w, native_h, factor, "decoded still");

    // Pass 1: pixel-format conversion plus the power-of-two subsample.
    // POINT is enough here — any aliasing is absorbed by the exact pass.
    let mut scaler = SwsContext::get(
        decoded.format(), native_w, native_h,
        Pixel::RGBA,      sub_w,    sub_h,
        if factor > 1 { Flags::POINT } else { Flags::BILINEAR },
    )
    .map_err(|e| ConvertError::Platform(format!("create subsample scaler: {e}")))?;

    let mut rgba = VideoFrame::empty();
    scaler
        .run(&decoded, &mut rgba)
        .map_err(|e| ConvertError::Platform(format!("subsample still: {e}")))?;

    if (sub_w, sub_h) == (width, height) {
        return Ok(pack_rgba(&rgba, width, height));
    }

    // Pass 2: exact-size rescale.
    let mut exact = SwsContext::get(
        Pixel::RGBA, sub_w, sub_h,
        Pixel::RGBA, width, height,
        Flags::BILINEAR,
    )
    .map_err(|e| ConvertError::Platform(format!("create rescaler: {e}")))?;

    let mut out = VideoFrame::empty();
    exact
        .run(&rgba, &mut out)
        .map_err(|e| ConvertError::Platform(format!("rescale still: {e}")))?;

    Ok(pack_rgba(&out, width, height))
}

/// Fit a caller-provided buffer to `width` × `height`, rescaling only when
/// the dimensions differ — the single per-request transform applied to
/// pre-decoded sources.
pub fn fit_frame(frame: &RgbaFrame, width: u32, height: u32) -> ConvertResult<RgbaFrame> {
    if !frame.is_well_formed() {
        return Err(ConvertError::Precondition(
            "source buffer length does not match its dimensions".into(),
        ));
    }
    if (frame.width, frame.height) == (width, height) {
        return Ok(frame.clone());
    }

    let mut src = VideoFrame::new(Pixel::RGBA, frame.width, frame.height);
    fill_rgba_plane(&mut src, frame);

    let mut scaler = SwsContext::get(
        Pixel::RGBA, frame.width, frame.height,
        Pixel::RGBA, width,       height,
        Flags::BILINEAR,
    )
    .map_err(|e| ConvertError::Platform(format!("create rescaler: {e}")))?;

    let mut out = VideoFrame::empty();
    scaler
        .run(&src, &mut out)
        .map_err(|e| ConvertError::Platform(format!("rescale frame: {e}")))?;

    Ok(pack_rgba(&out, width, height))
}

/// Largest power-of-two subsample factor such that half of the native
/// dimensions, divided by the factor, still exceed the request in both
/// axes. 1 when the source is not strictly larger than the request.
pub(crate) fn sample_factor(native_w: u32, native_h: u32, req_w: u32, req_h: u32) -> u32 {
    let mut factor = 1;
    if native_h > req_h || native_w > req_w {
        let half_w = native_w / 2;
        let half_h = native_h / 2;
        while half_h / factor > req_h && half_w / factor > req_w {
            factor *= 2;
        }
    }
    factor
}

// ── FFmpeg plumbing ───────────────────────────────────────────────────────────

/// Open `path` as a single-image input and decode its first video frame.
fn decode_first_frame(path: &Path) -> ConvertResult<VideoFrame> {
    ffmpeg::init().map_err(|e| ConvertError::Platform(format!("ffmpeg init: {e}")))?;

    let mut ictx = input(path)
        .map_err(|e| ConvertError::Platform(format!("open '{}': {e}", path.display())))?;

    let stream_idx = ictx
        .streams()
        .best(Type::Video)
        .ok_or_else(|| ConvertError::Platform(format!("no image stream in '{}'", path.display())))?
        .index();

    let dec_ctx = ffmpeg::codec::context::Context::from_parameters(
        ictx.stream(stream_idx).unwrap().parameters(),
    )
    .map_err(|e| ConvertError::Platform(format!("image decoder context: {e}")))?;

    let mut decoder = dec_ctx
        .decoder()
        .video()
        .map_err(|e| ConvertError::Platform(format!("open image decoder: {e}")))?;

    let mut decoded = VideoFrame::empty();
    for result in ictx.packets() {
        let (stream, packet) =
            result.map_err(|e| ConvertError::Platform(format!("read image packet: {e}")))?;
        if stream.index() != stream_idx {
            continue;
        }
        decoder
            .send_packet(&packet)
            .map_err(|e| ConvertError::Platform(format!("decode still: {e}")))?;
        if decoder.receive_frame(&mut decoded).is_ok() {
            return Ok(decoded);
        }
    }

    // Image codecs may hold the frame until EOF.
    let _ = decoder.send_eof();
    if decoder.receive_frame(&mut decoded).is_ok() {
        return Ok(decoded);
    }

    Err(ConvertError::Platform(format!(
        "no decodable frame in '{}'",
        path.display()
    )))
}

/// Extract tightly packed RGBA bytes from a scaled frame, removing strides.
fn pack_rgba(frame: &VideoFrame, width: u32, height: u32) -> RgbaFrame {
    let stride = frame.stride(0);
    let raw    = frame.data(0);
    let row    = width as usize * 4;

    let data: Vec<u8> = (0..height as usize)
        .flat_map(|r| {
            let s = r * stride;
            &raw[s..s + row]
        })
        .copied()
        .collect();

    RgbaFrame { width, height, data }
}

/// Copy a packed RGBA buffer into a frame's plane 0, honoring its stride.
pub(crate) fn fill_rgba_plane(dst: &mut VideoFrame, src: &RgbaFrame) {
    let stride = dst.stride(0);
    let row    = src.width as usize * 4;
    let plane  = dst.data_mut(0);
    for r in 0..src.height as usize {
        plane[r * stride..r * stride + row].copy_from_slice(&src.data[r * row..(r + 1) * row]);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hd_source_at_sd_request_subsamples_by_two() {
        assert_eq!(sample_factor(1920, 1080, 640, 480), 2);
    }

    #[test]
    fn exact_match_keeps_full_resolution() {
        assert_eq!(sample_factor(640, 480, 640, 480), 1);
    }

    #[test]
    fn smaller_source_is_never_subsampled() {
        assert_eq!(sample_factor(320, 240, 640, 480), 1);
    }

    #[test]
    fn huge_source_doubles_until_half_dims_fit() {
        // 4000×3000 → halves 2000×1500 → /2 still above 640×480 → /4 is not.
        assert_eq!(sample_factor(4000, 3000, 640, 480), 4);
    }

    #[test]
    fn one_axis_larger_still_keeps_both_above_request() {
        // Width fits but height is double: the loop requires BOTH half
        // dimensions to exceed the request, so no subsampling happens.
        assert_eq!(sample_factor(640, 960, 640, 480), 1);
    }
}
