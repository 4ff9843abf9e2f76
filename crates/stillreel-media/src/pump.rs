// crates/stillreel-media/src/pump.rs
//
// The encode pump: a synchronous polling loop that re-presents the input
// surface, drains the encoder's output queue, and feeds timestamped
// samples to the container writer until exactly `frame_count` of them
// have been written.
//
// Phase handling:
//   AwaitingFormat — the encoder has not announced its output format;
//                    the writer holds no track and is not started.
//   Streaming      — the single track is attached, the writer started.
// A FormatChanged event in Streaming has no legal transition, so the
// at-most-one-format-change invariant falls out of the enum rather than
// a flag check. A Sample in AwaitingFormat means the writer would be
// written before it started — fatal, never retried.
//
// Cancellation is cooperative: the flag is read once per iteration,
// after the current bounded poll returns, never mid-wait.

use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Instant;

use tracing::{debug, info, warn};

use stillreel_core::codec::{ContainerWriter, EncoderSession, PollStatus, TrackId};
use stillreel_core::error::{ConvertError, ConvertResult};
use stillreel_core::frame::RgbaFrame;
use stillreel_core::request::ConvertOptions;
use stillreel_core::timing::pts_for_frame;

/// What a finished pump run produced.
#[derive(Clone, Copy, Debug)]
pub struct PumpOutcome {
    pub frames_written: u64,
    /// Presentation timestamp of the final written sample, µs.
    pub last_pts_us:    i64,
}

#[derive(Clone, Copy)]
enum Phase {
    AwaitingFormat,
    Streaming { track: TrackId },
}

/// Draw `frame` onto `encoder`, run the pump loop, then stop both
/// sessions — encoder first, then writer — no matter how the loop exited.
///
/// The ordering matters: the writer may still be flushing track data tied
/// to the encoder's lifetime, so the encoder must be quiesced first.
/// Teardown failures after a successful loop are reported; after a failed
/// loop they are logged and the loop's error wins.
pub fn drive<E, W>(
    encoder:     &mut E,
    writer:      &mut W,
    frame:       &RgbaFrame,
    frame_count: u64,
    opts:        &ConvertOptions,
    cancel:      &AtomicBool,
    on_frame:    impl FnMut(u64),
) -> ConvertResult<PumpOutcome>
where
    E: EncoderSession,
    W: ContainerWriter,
{
    let result = match encoder.draw(frame) {
        Ok(()) => run_loop(encoder, writer, frame_count, opts, cancel, on_frame),
        Err(e) => Err(e),
    };

    let encoder_stop = encoder.stop();
    let writer_stop  = writer.stop();

    match result {
        Ok(outcome) => {
            encoder_stop?;
            writer_stop?;
            Ok(outcome)
        }
        Err(e) => {
            if let Err(down) = encoder_stop {
                warn!("encoder stop after failed pump: {down}");
            }
            if let Err(down) = writer_stop {
                warn!("writer stop after failed pump: {down}");
            }
            Err(e)
        }
    }
}

fn run_loop<E, W>(
    encoder:      &mut E,
    writer:       &mut W,
    frame_count:  u64,
    opts:         &ConvertOptions,
    cancel:       &AtomicBool,
    mut on_frame: impl FnMut(u64),
) -> ConvertResult<PumpOutcome>
where
    E: EncoderSession,
    W: ContainerWriter,
{
    let mut phase         = Phase::AwaitingFormat;
    let mut written: u64  = 0;
    let mut last_activity = Instant::now();

    while written < frame_count {
        if cancel.load(Ordering::Relaxed) {
            return Err(ConvertError::Cancelled);
        }

        // The surface content never changes, but the encoder consumes one
        // input frame per output frame — keep feeding it.
        encoder.present()?;

        match encoder.poll_output(opts.poll_timeout)? {
            PollStatus::Pending => {
                if last_activity.elapsed() >= opts.stall_window {
                    return Err(ConvertError::Stalled(opts.stall_window));
                }
                debug!("no output from encoder available");
            }

            PollStatus::BuffersChanged => {
                // Not expected from an encoder; nothing to re-acquire here.
                debug!("encoder output buffers changed");
            }

            PollStatus::FormatChanged(format) => match phase {
                Phase::AwaitingFormat => {
                    let track = writer.add_track(&format)?;
                    writer.start()?;
                    info!(track = track.0, width = format.width, height = format.height,
                          "output format negotiated, writer started");
                    phase = Phase::Streaming { track };
                    last_activity = Instant::now();
                }
                Phase::Streaming { .. } => {
                    return Err(ConvertError::EncoderProtocol(
                        "output format changed twice".into(),
                    ));
                }
            },

            PollStatus::Sample(mut sample) => {
                last_activity = Instant::now();

                if sample.flags.codec_config {
                    // Configuration bytes already travelled with the
                    // format; writing them again would corrupt the track.
                    debug!("discarding codec config sample");
                    continue;
                }
                if sample.flags.end_of_stream {
                    return Err(ConvertError::EncoderProtocol(format!(
                        "end of stream after {written} of {frame_count} frames"
                    )));
                }

                let Phase::Streaming { track } = phase else {
                    return Err(ConvertError::MuxerState(
                        "sample produced before the muxer started".into(),
                    ));
                };

                sample.pts_us = pts_for_frame(written);
                writer.write_sample(track, &sample)?;
                written += 1;
                on_frame(written);
            }
        }
    }

    Ok(PumpOutcome {
        frames_written: written,
        last_pts_us:    pts_for_frame(written.saturating_sub(1)),
    })
}
