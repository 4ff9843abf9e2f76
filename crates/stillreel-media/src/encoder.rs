// crates/stillreel-media/src/encoder.rs
//
// H264Session: the encoder collaborator backed by FFmpeg's H.264 encoder.
//
// The session mimics a surface-input hardware codec: `draw` blits the
// RGBA still onto an internal YUV canvas, `present` submits the canvas as
// the next input frame, and `poll_output` reports the session's output
// queue one event at a time. The output format (with SPS/PPS extradata)
// is announced exactly once, immediately before the first sample —
// callers see FormatChanged, then samples, never the reverse.
//
// B-frames are disabled so packets leave the encoder in presentation
// order; the pump stamps timestamps by written-sample index, which is
// only sound when emission order equals display order.

use std::time::Duration;

use tracing::debug;

use ffmpeg_the_third as ffmpeg;
use ffmpeg::codec::{self, Id as CodecId};
use ffmpeg::encoder;
use ffmpeg::format::Pixel;
use ffmpeg::software::scaling::{context::Context as SwsContext, flag::Flags};
use ffmpeg::util::error::EAGAIN;
use ffmpeg::util::frame::video::Video as VideoFrame;
use ffmpeg::util::rational::Rational;

use stillreel_core::codec::{CodecKind, EncoderSession, PollStatus, SampleFlags, SampleUnit, TrackFormat};
use stillreel_core::error::{ConvertError, ConvertResult};
use stillreel_core::frame::RgbaFrame;

use crate::still::fill_rgba_plane;

/// Target bitrate for every conversion, bits per second.
const BITRATE: usize = 700_000;

/// Maximum spacing between key frames, seconds.
const KEYFRAME_INTERVAL_SECS: u32 = 1;

pub struct H264Session {
    encoder:          ffmpeg::encoder::video::Video,
    /// RGBA → YUV420P converter for `draw`.
    scaler:           SwsContext,
    /// The drawn canvas, submitted (unchanged) by every `present`.
    canvas:           Option<VideoFrame>,
    next_input_pts:   i64,
    format_announced: bool,
    /// Sample held back while FormatChanged is being reported.
    queued:           Option<SampleUnit>,
    stopped:          bool,
    width:            u32,
    height:           u32,
    frame_rate:       u32,
}

impl H264Session {
    /// Configure and start an encoder for `width` × `height` at
    /// `frame_rate` fps with the fixed bitrate and key-frame interval.
    pub fn open(width: u32, height: u32, frame_rate: u32) -> ConvertResult<Self> {
        ffmpeg::init().map_err(|e| ConvertError::Platform(format!("ffmpeg init: {e}")))?;

        let h264 = encoder::find(CodecId::H264).ok_or_else(|| {
            ConvertError::Platform("H.264 encoder not found — is libx264 available?".into())
        })?;

        let enc_ctx = codec::context::Context::new_with_codec(h264);
        let mut enc = enc_ctx
            .encoder()
            .video()
            .map_err(|e| ConvertError::Platform(format!("create encoder context: {e}")))?;

        let time_base = Rational::new(1, frame_rate as i32);
        enc.set_width(width);
        enc.set_height(height);
        enc.set_format(Pixel::YUV420P);
        enc.set_time_base(time_base);
        enc.set_frame_rate(Some(Rational::new(frame_rate as i32, 1)));
        enc.set_bit_rate(BITRATE);
        enc.set_gop(frame_rate * KEYFRAME_INTERVAL_SECS);

        // Configuration bytes must land in extradata, not inline in the
        // stream, so the container can carry them in the track header.
        // No safe setter for codec flags pre-open — write the field directly.
        unsafe {
            (*enc.as_mut_ptr()).flags |= ffmpeg::ffi::AV_CODEC_FLAG_GLOBAL_HEADER as i32;
        }

        let mut opts = ffmpeg::Dictionary::new();
        opts.set("preset", "veryfast");
        // Emission order must equal presentation order — see module comment.
        opts.set("bf", "0");

        let encoder = enc
            .open_as_with(h264, opts)
            .map_err(|e| ConvertError::Platform(format!("open H.264 encoder: {e}")))?;

        let scaler = SwsContext::get(
            Pixel::RGBA,    width, height,
            Pixel::YUV420P, width, height,
            Flags::BILINEAR,
        )
        .map_err(|e| ConvertError::Platform(format!("create RGBA→YUV converter: {e}")))?;

        Ok(Self {
            encoder,
            scaler,
            canvas: None,
            next_input_pts: 0,
            format_announced: false,
            queued: None,
            stopped: false,
            width,
            height,
            frame_rate,
        })
    }

    fn track_format(&self) -> TrackFormat {
        // Extradata exists only after open (GLOBAL_HEADER) — read it off
        // the raw context, there is no safe accessor.
        let extradata = unsafe {
            let ctx = self.encoder.as_ptr();
            if (*ctx).extradata.is_null() || (*ctx).extradata_size <= 0 {
                Vec::new()
            } else {
                std::slice::from_raw_parts((*ctx).extradata, (*ctx).extradata_size as usize)
                    .to_vec()
            }
        };

        TrackFormat {
            codec:      CodecKind::H264,
            width:      self.width,
            height:     self.height,
            frame_rate: self.frame_rate,
            extradata,
        }
    }

    fn sample_from(packet: &ffmpeg::Packet) -> SampleUnit {
        SampleUnit {
            data:   packet.data().unwrap_or_default().to_vec(),
            pts_us: 0,
            flags:  SampleFlags {
                key_frame:     packet.flags().contains(ffmpeg::packet::Flags::KEY),
                codec_config:  false,
                end_of_stream: false,
            },
        }
    }
}

impl EncoderSession for H264Session {
    fn draw(&mut self, frame: &RgbaFrame) -> ConvertResult<()> {
        if (frame.width, frame.height) != (self.width, self.height) {
            return Err(ConvertError::Platform(format!(
                "surface is {}x{} but frame is {}x{}",
                self.width, self.height, frame.width, frame.height
            )));
        }
        if !frame.is_well_formed() {
            return Err(ConvertError::Platform("frame buffer truncated".into()));
        }

        let mut rgba = VideoFrame::new(Pixel::RGBA, self.width, self.height);
        fill_rgba_plane(&mut rgba, frame);

        let mut yuv = VideoFrame::empty();
        self.scaler
            .run(&rgba, &mut yuv)
            .map_err(|e| ConvertError::Platform(format!("convert frame to YUV: {e}")))?;

        self.canvas = Some(yuv);
        Ok(())
    }

    fn present(&mut self) -> ConvertResult<()> {
        let canvas = self
            .canvas
            .as_mut()
            .ok_or_else(|| ConvertError::EncoderProtocol("present before draw".into()))?;

        canvas.set_pts(Some(self.next_input_pts));
        match self.encoder.send_frame(canvas) {
            Ok(()) => {
                self.next_input_pts += 1;
                Ok(())
            }
            // Input queue full: drop this submission. The canvas never
            // changes, so the next present supplies identical content.
            Err(ffmpeg::Error::Other { errno: EAGAIN }) => Ok(()),
            Err(e) => Err(ConvertError::Platform(format!("submit frame: {e}"))),
        }
    }

    fn poll_output(&mut self, _timeout: Duration) -> ConvertResult<PollStatus> {
        // An in-process codec is unblocked by input, never by waiting, so
        // the bounded wait degenerates to an immediate answer; the
        // timeout only has teeth for genuinely asynchronous sessions.
        if let Some(sample) = self.queued.take() {
            return Ok(PollStatus::Sample(sample));
        }

        let mut packet = ffmpeg::Packet::empty();
        match self.encoder.receive_packet(&mut packet) {
            Ok(()) => {
                let sample = Self::sample_from(&packet);
                if !self.format_announced {
                    self.format_announced = true;
                    self.queued = Some(sample);
                    debug!("announcing negotiated output format");
                    return Ok(PollStatus::FormatChanged(self.track_format()));
                }
                Ok(PollStatus::Sample(sample))
            }
            Err(ffmpeg::Error::Other { errno: EAGAIN }) => Ok(PollStatus::Pending),
            Err(ffmpeg::Error::Eof) => Ok(PollStatus::Sample(SampleUnit {
                data:   Vec::new(),
                pts_us: 0,
                flags:  SampleFlags { end_of_stream: true, ..Default::default() },
            })),
            Err(e) => Err(ConvertError::Platform(format!("poll encoder output: {e}"))),
        }
    }

    fn stop(&mut self) -> ConvertResult<()> {
        if self.stopped {
            return Ok(());
        }
        self.stopped = true;

        // Quiesce: signal end of input and drain whatever the encoder
        // still holds. The pump has already written everything it needs;
        // leftover packets are lookahead surplus.
        self.encoder
            .send_eof()
            .map_err(|e| ConvertError::Platform(format!("stop encoder: {e}")))?;

        let mut packet = ffmpeg::Packet::empty();
        let mut surplus = 0u32;
        while self.encoder.receive_packet(&mut packet).is_ok() {
            surplus += 1;
        }
        if surplus > 0 {
            debug!(surplus, "discarded buffered packets at encoder stop");
        }
        Ok(())
    }
}
