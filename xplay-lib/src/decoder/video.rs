//! Video decode thread body.

use std::sync::Arc;
#[cfg(feature = "debug")]
use std::time::Instant;

use log::{debug, error, info};
use parking_lot::Mutex;

use super::{DecodeOutcome, Decoder};
use crate::clock::Clocks;
use crate::frame::{Frame, FrameQueue};
use crate::settings::SyncSettings;
use crate::source::Rational;
use crate::stats::StatsCounters;
use crate::tools::time::relative_seconds;

/// Shared handles captured when the video thread is spawned.
pub struct VideoThreadContext {
    pub frames: Arc<FrameQueue>,
    pub clocks: Arc<Mutex<Clocks>>,
    pub time_base: Rational,
    pub frame_rate: Option<Rational>,
    pub settings: SyncSettings,
    pub stats: Arc<StatsCounters>,
}

/// Decode until the packet queue is aborted, queueing every frame that is
/// not already behind the master clock.
pub fn run_video_thread(mut decoder: Decoder, ctx: VideoThreadContext) {
    let frame_duration = ctx
        .frame_rate
        .and_then(|rate| rate.invert().to_f64())
        .filter(|d| d.is_finite() && *d > 0.0)
        .unwrap_or(0.0);

    #[cfg(feature = "debug")]
    let mut avg_decode_ms = 0.0_f64;
    #[cfg(feature = "debug")]
    let mut max_decode_ms = 0.0_f64;
    #[cfg(feature = "debug")]
    let mut decoded = 0_u64;

    loop {
        #[cfg(feature = "debug")]
        let decode_start = Instant::now();
        let (raw, serial) = match decoder.decode_frame() {
            DecodeOutcome::Frame(raw, serial) => (raw, serial),
            DecodeOutcome::Finished => continue,
            DecodeOutcome::Failed(err) => {
                error!("video stream stopped: {}", err);
                continue;
            }
            DecodeOutcome::Aborted => break,
        };

        #[cfg(feature = "debug")]
        {
            let ms = decode_start.elapsed().as_secs_f64() * 1000.0;
            avg_decode_ms = if decoded == 0 { ms } else { 0.9 * avg_decode_ms + 0.1 * ms };
            max_decode_ms = max_decode_ms.max(ms);
            decoded += 1;
            if decoded % 100 == 0 {
                info!(
                    "decode timing: frames={} avg={:.2}ms max={:.2}ms",
                    decoded, avg_decode_ms, max_decode_ms
                );
            }
        }

        let pts = raw.pts.and_then(|ticks| ctx.time_base.ticks_to_seconds(ticks));
        if ctx.settings.framedrop_enabled() && is_behind_master(&ctx, &decoder, pts, serial) {
            debug!("early drop of frame pts={:?}", pts);
            ctx.stats.drop_early();
            continue;
        }

        let frame = Frame::new(raw.picture, serial, pts, frame_duration).with_pos(raw.pos);
        match ctx.frames.peek_writable() {
            Some(slot) => slot.push(frame),
            None => break,
        }
    }
    info!("video decode thread exiting");
}

fn is_behind_master(
    ctx: &VideoThreadContext,
    decoder: &Decoder,
    pts: Option<f64>,
    serial: u64,
) -> bool {
    let Some(pts) = pts else {
        return false;
    };
    let master = {
        let clocks = ctx.clocks.lock();
        if clocks.video.serial() != Some(serial) {
            return false;
        }
        clocks.master(relative_seconds(), serial)
    };
    let packets_pending = decoder.queue().nb_packets() > 0;
    should_drop_early(pts, master, ctx.settings.nosync_threshold, packets_pending)
}

/// A frame is dropped before queueing when it is already late against a
/// known master clock and more packets are waiting.
pub(crate) fn should_drop_early(
    pts: f64,
    master: Option<f64>,
    nosync_threshold: f64,
    packets_pending: bool,
) -> bool {
    let Some(master) = master else {
        return false;
    };
    let diff = pts - master;
    diff.is_finite() && diff.abs() < nosync_threshold && diff < 0.0 && packets_pending
}
