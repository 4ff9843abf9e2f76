// crates/stillreel-media/tests/convert.rs
//
// End-to-end conversions against real FFmpeg: write a PNG fixture,
// convert it, then read the produced MP4 back and check the track.

use std::fs::File;
use std::io::BufWriter;
use std::path::{Path, PathBuf};

use ffmpeg_the_third as ffmpeg;
use ffmpeg::media::Type;

use stillreel_media::{convert, ConvertError, ConvertRequest, RgbaFrame, StillSource};

// ── Fixtures ──────────────────────────────────────────────────────────────────

/// Write a `width`×`height` RGBA gradient PNG under `dir`.
fn write_png(dir: &Path, name: &str, width: u32, height: u32) -> PathBuf {
    let path = dir.join(name);
    let file = File::create(&path).expect("create fixture");
    let mut encoder = png::Encoder::new(BufWriter::new(file), width, height);
    encoder.set_color(png::ColorType::Rgba);
    encoder.set_depth(png::BitDepth::Eight);
    let mut writer = encoder.write_header().expect("png header");

    let mut data = Vec::with_capacity((width * height * 4) as usize);
    for y in 0..height {
        for x in 0..width {
            data.push((x * 255 / width.max(1)) as u8);
            data.push((y * 255 / height.max(1)) as u8);
            data.push(96);
            data.push(255);
        }
    }
    writer.write_image_data(&data).expect("png data");
    path
}

fn request(source: StillSource, width: u32, height: u32, duration: f64, output: PathBuf) -> ConvertRequest {
    ConvertRequest { source, width, height, duration_secs: duration, output }
}

// ── Output inspection ─────────────────────────────────────────────────────────

struct TrackProbe {
    video_streams: usize,
    width:         u32,
    height:        u32,
    pts_us:        Vec<i64>,
}

/// Read the produced file back and collect the video track's geometry and
/// sample timestamps (µs).
fn probe(path: &Path) -> TrackProbe {
    ffmpeg::init().expect("ffmpeg init");
    let mut ictx = ffmpeg::format::input(path).expect("open produced file");

    let video_streams = ictx
        .streams()
        .filter(|s| s.parameters().medium() == Type::Video)
        .count();

    let (index, tb, width, height) = {
        let stream = ictx.streams().best(Type::Video).expect("video stream");
        let tb = stream.time_base();
        let (w, h) = unsafe {
            let p = stream.parameters().as_ptr();
            ((*p).width as u32, (*p).height as u32)
        };
        (stream.index(), tb, w, h)
    };

    let mut pts_us = Vec::new();
    for (stream, packet) in ictx.packets().flatten() {
        if stream.index() != index {
            continue;
        }
        let pts = packet.pts().expect("sample pts");
        pts_us.push(pts * 1_000_000 * tb.numerator() as i64 / tb.denominator() as i64);
    }

    TrackProbe { video_streams, width, height, pts_us }
}

// ── Scenarios ─────────────────────────────────────────────────────────────────

#[test]
fn two_seconds_yields_61_samples_ending_at_two_million_micros() {
    let dir = tempfile::tempdir().unwrap();
    let png = write_png(dir.path(), "poster.png", 640, 480);
    let out = dir.path().join("poster.mp4");

    let stats = convert(&request(StillSource::Path(png), 640, 480, 2.0, out.clone())).unwrap();
    assert_eq!(stats.frames_written, 61);
    assert_eq!(stats.last_pts_us, 2_000_000);

    let track = probe(&out);
    assert_eq!(track.video_streams, 1);
    assert_eq!(track.pts_us.len(), 61);
    assert_eq!(track.pts_us.first().copied(), Some(0));
    assert_eq!(track.pts_us.last().copied(), Some(2_000_000));
    assert!(track.pts_us.windows(2).all(|w| w[0] < w[1]), "pts must strictly increase");
}

#[test]
fn oversized_source_is_reduced_to_exactly_the_requested_size() {
    let dir = tempfile::tempdir().unwrap();
    let png = write_png(dir.path(), "big.png", 1920, 1080);
    let out = dir.path().join("big.mp4");

    convert(&request(StillSource::Path(png), 640, 480, 0.5, out.clone())).unwrap();

    let track = probe(&out);
    assert_eq!((track.width, track.height), (640, 480));
    assert_eq!(track.pts_us.len(), 16); // floor(0.5 * 30) + 1
}

#[test]
fn provided_buffer_is_rescaled_to_the_request() {
    let dir = tempfile::tempdir().unwrap();
    let out = dir.path().join("buffer.mp4");

    let frame = RgbaFrame {
        width:  320,
        height: 240,
        data:   vec![200; 320 * 240 * 4],
    };
    let stats = convert(&request(StillSource::Frame(frame), 640, 480, 1.0, out.clone())).unwrap();
    assert_eq!(stats.frames_written, 31);

    let track = probe(&out);
    assert_eq!((track.width, track.height), (640, 480));
}

#[test]
fn repeat_conversions_agree_on_count_and_timestamps() {
    let dir = tempfile::tempdir().unwrap();
    let png = write_png(dir.path(), "poster.png", 640, 480);

    let out_a = dir.path().join("a.mp4");
    let out_b = dir.path().join("b.mp4");
    let req_a = request(StillSource::Path(png.clone()), 640, 480, 1.0, out_a.clone());
    let req_b = request(StillSource::Path(png), 640, 480, 1.0, out_b.clone());

    convert(&req_a).unwrap();
    convert(&req_b).unwrap();

    let a = probe(&out_a);
    let b = probe(&out_b);
    assert_eq!(a.pts_us.len(), b.pts_us.len());
    assert_eq!(a.pts_us, b.pts_us);
}

#[test]
fn invalid_dimensions_fail_before_any_session_is_opened() {
    let dir = tempfile::tempdir().unwrap();
    let out = dir.path().join("never.mp4");

    let err = convert(&request(
        StillSource::Path(PathBuf::from("poster.png")),
        0, 480, 2.0, out.clone(),
    ))
    .unwrap_err();

    assert!(matches!(err, ConvertError::Precondition(_)));
    assert!(!out.exists(), "validation failures must not touch the output path");
}

#[test]
fn missing_source_file_is_a_platform_error() {
    let dir = tempfile::tempdir().unwrap();
    let out = dir.path().join("never.mp4");

    let err = convert(&request(
        StillSource::Path(dir.path().join("no-such-image.png")),
        640, 480, 1.0, out,
    ))
    .unwrap_err();

    assert!(matches!(err, ConvertError::Platform(_)));
}
