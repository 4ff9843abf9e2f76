// crates/stillreel-media/src/muxer.rs
//
// Mp4Writer: the container-writer collaborator backed by FFmpeg's MP4
// muxer. One video track, described from the encoder's negotiated
// TrackFormat; `start` writes the container header, `stop` the trailer.
//
// State rules are enforced here, not just by the pump: add_track exactly
// once, start exactly once and only after add_track, writes only between
// start and stop. A failed conversion leaves whatever was flushed on
// disk — the caller owns removal of truncated output.

use std::path::{Path, PathBuf};

use tracing::{info, warn};

use ffmpeg_the_third as ffmpeg;
use ffmpeg::codec::Id as CodecId;
use ffmpeg::encoder;
use ffmpeg::util::rational::Rational;

use stillreel_core::codec::{CodecKind, ContainerWriter, SampleUnit, TrackFormat, TrackId};
use stillreel_core::error::{ConvertError, ConvertResult};
use stillreel_core::timing::MICROS_PER_SEC;

/// Time base all incoming sample timestamps are expressed in.
const MICROS: Rational = Rational(1, MICROS_PER_SEC as i32);

#[derive(PartialEq)]
enum WriterState {
    Created,
    Started,
    Stopped,
}

pub struct Mp4Writer {
    octx:  ffmpeg::format::context::Output,
    path:  PathBuf,
    track: Option<TrackId>,
    state: WriterState,
}

impl Mp4Writer {
    /// Open an MP4 writer bound to `path`. Nothing is written until
    /// `start`; a file created here and never started stays truncated.
    pub fn create(path: &Path) -> ConvertResult<Self> {
        ffmpeg::init().map_err(|e| ConvertError::Platform(format!("ffmpeg init: {e}")))?;

        let octx = ffmpeg::format::output_as(&path, "mp4").map_err(|e| {
            ConvertError::Platform(format!("could not open output '{}': {e}", path.display()))
        })?;

        Ok(Self {
            octx,
            path: path.to_path_buf(),
            track: None,
            state: WriterState::Created,
        })
    }
}

impl ContainerWriter for Mp4Writer {
    fn add_track(&mut self, format: &TrackFormat) -> ConvertResult<TrackId> {
        if self.track.is_some() {
            return Err(ConvertError::MuxerState("track already added".into()));
        }
        if self.state != WriterState::Created {
            return Err(ConvertError::MuxerState("add_track after start".into()));
        }

        let codec = match format.codec {
            CodecKind::H264 => encoder::find(CodecId::H264)
                .ok_or_else(|| ConvertError::Platform("H.264 codec unavailable".into()))?,
        };

        let index = {
            let mut stream = self
                .octx
                .add_stream(codec)
                .map_err(|e| ConvertError::Platform(format!("add video stream: {e}")))?;
            stream.set_time_base(Rational::new(1, 90_000));
            stream.index()
        };

        // Describe the track straight onto the stream's codec parameters.
        // There is no opened codec context on the muxer side to copy from,
        // so the fields are written through the raw pointers, the same
        // route avcodec_parameters_from_context would take.
        unsafe {
            let par = (**(*self.octx.as_mut_ptr()).streams.add(index)).codecpar;
            (*par).codec_type = ffmpeg::ffi::AVMediaType::AVMEDIA_TYPE_VIDEO;
            (*par).codec_id   = ffmpeg::ffi::AVCodecID::AV_CODEC_ID_H264;
            (*par).width      = format.width as i32;
            (*par).height     = format.height as i32;
            (*par).format     = ffmpeg::ffi::AVPixelFormat::AV_PIX_FMT_YUV420P as i32;

            if !format.extradata.is_empty() {
                let len = format.extradata.len();
                let buf = ffmpeg::ffi::av_mallocz(
                    len + ffmpeg::ffi::AV_INPUT_BUFFER_PADDING_SIZE as usize,
                ) as *mut u8;
                if buf.is_null() {
                    return Err(ConvertError::Platform("extradata allocation failed".into()));
                }
                std::ptr::copy_nonoverlapping(format.extradata.as_ptr(), buf, len);
                (*par).extradata      = buf;
                (*par).extradata_size = len as i32;
            }
        }

        let track = TrackId(index);
        self.track = Some(track);
        info!(track = index, width = format.width, height = format.height, "video track added");
        Ok(track)
    }

    fn start(&mut self) -> ConvertResult<()> {
        match self.state {
            WriterState::Started => return Err(ConvertError::MuxerState("started twice".into())),
            WriterState::Stopped => return Err(ConvertError::MuxerState("start after stop".into())),
            WriterState::Created => {}
        }
        if self.track.is_none() {
            return Err(ConvertError::MuxerState("start before add_track".into()));
        }

        self.octx
            .write_header()
            .map_err(|e| ConvertError::Platform(format!("write container header: {e}")))?;
        self.state = WriterState::Started;
        info!(output = %self.path.display(), "container writer started");
        Ok(())
    }

    fn write_sample(&mut self, track: TrackId, sample: &SampleUnit) -> ConvertResult<()> {
        if self.state != WriterState::Started {
            return Err(ConvertError::MuxerState("muxer has not started".into()));
        }
        if self.track != Some(track) {
            return Err(ConvertError::MuxerState(format!("unknown track {}", track.0)));
        }

        // The muxer may have replaced the requested time base when the
        // header was written — always rescale against the current one.
        let stream_tb = self
            .octx
            .stream(track.0)
            .ok_or_else(|| ConvertError::MuxerState(format!("missing stream {}", track.0)))?
            .time_base();

        let mut packet = ffmpeg::Packet::copy(&sample.data);
        packet.set_stream(track.0);
        packet.set_pts(Some(sample.pts_us));
        packet.set_dts(Some(sample.pts_us));
        if sample.flags.key_frame {
            packet.set_flags(ffmpeg::packet::Flags::KEY);
        }
        packet.rescale_ts(MICROS, stream_tb);

        packet
            .write_interleaved(&mut self.octx)
            .map_err(|e| ConvertError::Platform(format!("write sample: {e}")))
    }

    fn stop(&mut self) -> ConvertResult<()> {
        match self.state {
            WriterState::Started => {
                self.state = WriterState::Stopped;
                self.octx
                    .write_trailer()
                    .map_err(|e| ConvertError::Platform(format!("write container trailer: {e}")))
            }
            // Never started: nothing to finalize, the file stays truncated.
            WriterState::Created => {
                self.state = WriterState::Stopped;
                Ok(())
            }
            WriterState::Stopped => Ok(()),
        }
    }
}

impl Drop for Mp4Writer {
    fn drop(&mut self) {
        // Backstop for exit paths that never reached the ordered
        // teardown; a started container without a trailer is unplayable.
        if self.state == WriterState::Started {
            if let Err(e) = self.octx.write_trailer() {
                warn!(output = %self.path.display(), "trailer on drop failed: {e}");
            }
        }
    }
}
