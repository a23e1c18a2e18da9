//! Presentation scheduler.
//!
//! The host calls [`Scheduler::refresh`] from its render loop. Each call
//! decides whether the head of the frame queue is due, retires it if so, and
//! reports how long the host may sleep before asking again. The call never
//! blocks on the decoder.

use log::debug;
use parking_lot::Mutex;

use crate::clock::Clocks;
use crate::frame::{Frame, FrameQueue};
use crate::packet::PacketQueue;
use crate::settings::SyncSettings;
use crate::stats::StatsCounters;

/// Frame interval cap for sources that may jump timestamps.
pub const MAX_FRAME_DURATION_DISCONTINUOUS: f64 = 10.0;
/// Frame interval cap for well-behaved sources.
pub const MAX_FRAME_DURATION: f64 = 3600.0;

/// What the host should show after a refresh.
#[derive(Debug, Clone, Default)]
pub struct RefreshState {
    /// Most recently presented frame, if any.
    pub frame: Option<Frame>,
    /// `frame` was presented on this tick and needs rendering.
    pub fresh: bool,
    /// Suggested wait in seconds before the next refresh.
    pub remaining_time: f64,
}

/// Queues and clocks a refresh reads from.
pub struct RefreshContext<'a> {
    pub frames: &'a FrameQueue,
    pub packets: &'a PacketQueue,
    pub clocks: &'a Mutex<Clocks>,
    pub stats: &'a StatsCounters,
    pub paused: bool,
}

/// Longest pts gap still trusted as a frame duration.
pub fn max_frame_duration(ts_discontinuous: bool) -> f64 {
    if ts_discontinuous {
        MAX_FRAME_DURATION_DISCONTINUOUS
    } else {
        MAX_FRAME_DURATION
    }
}

/// Display time of `current`, taken from the pts gap to `next` when that gap
/// is trustworthy.
pub fn vp_duration(current: &Frame, next: &Frame, max_frame_duration: f64) -> f64 {
    if current.serial == next.serial {
        if let (Some(a), Some(b)) = (current.pts, next.pts) {
            let duration = b - a;
            if duration.is_finite() && (0.0..=max_frame_duration).contains(&duration) {
                return duration;
            }
        }
    }
    current.duration
}

/// Adjust a nominal frame `delay` toward the master clock.
///
/// `diff` is `video - master`; `None` means video leads and the delay is used
/// as is. A single call never moves the delay by more than
/// `settings.max_correction`.
pub fn compute_target_delay(
    delay: f64,
    diff: Option<f64>,
    settings: &SyncSettings,
    max_frame_duration: f64,
) -> f64 {
    let Some(diff) = diff else {
        return delay;
    };
    if !diff.is_finite() || diff.abs() >= max_frame_duration {
        return delay;
    }

    let sync_threshold = delay.clamp(
        settings.av_sync_threshold_min,
        settings.av_sync_threshold_max,
    );
    let max_correction = settings.max_correction;
    if diff <= -sync_threshold {
        (delay + diff.max(-max_correction)).max(0.0)
    } else if diff >= sync_threshold && delay > settings.av_sync_framedup_threshold {
        delay + diff.min(max_correction)
    } else if diff >= sync_threshold {
        delay + delay.min(max_correction)
    } else {
        delay
    }
}

pub struct Scheduler {
    settings: SyncSettings,
    frame_timer: f64,
    /// Serial the frame timer was last reset for.
    timer_serial: Option<u64>,
    max_frame_duration: f64,
    force_refresh: bool,
    step: bool,
    last_shown: Option<Frame>,
}

impl Scheduler {
    /// A scheduler that has shown nothing yet.
    pub fn new(settings: SyncSettings, max_frame_duration: f64) -> Self {
        Self {
            settings,
            frame_timer: 0.0,
            timer_serial: None,
            max_frame_duration,
            force_refresh: false,
            step: false,
            last_shown: None,
        }
    }

    /// Wall time at which the last shown frame was due.
    pub fn frame_timer(&self) -> f64 {
        self.frame_timer
    }

    /// Move the schedule by `delta` seconds (used when resuming from pause).
    pub fn shift_frame_timer(&mut self, delta: f64) {
        if delta.is_finite() {
            self.frame_timer += delta;
        }
    }

    /// Present exactly one more frame even while paused.
    pub fn request_step(&mut self) {
        self.step = true;
    }

    /// Run one scheduling tick at wall-clock time `now`.
    pub fn refresh(&mut self, now: f64, ctx: &RefreshContext<'_>) -> RefreshState {
        let mut remaining_time = self.settings.refresh_rate;

        loop {
            if ctx.frames.nb_remaining() == 0 {
                break;
            }
            let Some(current) = ctx.frames.peek() else {
                break;
            };
            let serial = ctx.packets.serial();
            if current.serial != serial {
                ctx.frames.next();
                continue;
            }

            let last = ctx
                .frames
                .peek_last()
                .or_else(|| self.last_shown.clone())
                .unwrap_or_else(|| current.clone());
            if self.timer_serial != Some(current.serial) {
                self.frame_timer = now;
                self.timer_serial = Some(current.serial);
            }
            if ctx.paused && !self.step {
                break;
            }

            let last_duration = vp_duration(&last, &current, self.max_frame_duration);
            let diff = ctx.clocks.lock().video_diff(now, serial);
            let delay =
                compute_target_delay(last_duration, diff, &self.settings, self.max_frame_duration);

            if now < self.frame_timer + delay {
                remaining_time = remaining_time.min(self.frame_timer + delay - now);
                break;
            }

            self.frame_timer += delay;
            if delay > 0.0 && now - self.frame_timer > self.settings.av_sync_threshold_max {
                self.frame_timer = now;
            }

            if current.pts.is_some() {
                ctx.clocks
                    .lock()
                    .update_video_pts(current.pts, current.serial, now);
            }

            if !self.step && ctx.frames.nb_remaining() > 1 && self.settings.framedrop_enabled() {
                if let Some(next) = ctx.frames.peek_next() {
                    let duration = vp_duration(&current, &next, self.max_frame_duration);
                    if now > self.frame_timer + duration {
                        debug!("late drop of frame pts={:?}", current.pts);
                        ctx.stats.drop_late();
                        ctx.frames.next();
                        continue;
                    }
                }
            }

            ctx.frames.next();
            ctx.stats.frame_presented();
            debug!("present frame pts={:?} serial={}", current.pts, current.serial);
            self.last_shown = Some(current);
            self.force_refresh = true;
            self.step = false;
            break;
        }

        RefreshState {
            frame: ctx.frames.peek_last().or_else(|| self.last_shown.clone()),
            fresh: std::mem::take(&mut self.force_refresh),
            remaining_time,
        }
    }
}
