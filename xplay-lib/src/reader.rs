//! Demux loop feeding the video packet queue.
//!
//! The reader runs ahead of the decoder until the queue holds enough data,
//! then sleeps on [`ReadControl`] until the decoder consumes a packet, a seek
//! is requested or the session closes. It never polls on a timer.

use std::sync::Arc;

use log::{debug, info, warn};
use parking_lot::{Condvar, Mutex};

use crate::clock::Clocks;
use crate::packet::PacketQueue;
use crate::settings::SyncSettings;
use crate::source::{Demuxer, Rational, StreamInfo};
use crate::tools::time::relative_seconds;

/// A seek waiting for the read thread.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SeekRequest {
    pub target: f64,
    /// Present one frame of the new position once the queue is flushed.
    pub step: bool,
}

#[derive(Debug, Default)]
struct ControlState {
    woken: bool,
    seek: Option<SeekRequest>,
    step_posted: bool,
}

/// Continue-read signal plus the pending seek request.
#[derive(Debug, Default)]
pub struct ReadControl {
    state: Mutex<ControlState>,
    cond: Condvar,
}

impl ReadControl {
    /// A control with no pending wake or seek.
    pub fn new() -> Self {
        Self::default()
    }

    /// Let a waiting reader re-check its conditions.
    pub fn wake(&self) {
        let mut state = self.state.lock();
        state.woken = true;
        self.cond.notify_all();
    }

    /// Ask the reader to seek to `target` seconds. A newer request replaces
    /// one that has not been executed yet.
    ///
    /// With `step` set, a frame step is posted right after the packet queue
    /// is flushed, so a paused session shows the new position.
    pub fn request_seek(&self, target: f64, step: bool) {
        let mut state = self.state.lock();
        state.seek = Some(SeekRequest { target, step });
        state.woken = true;
        self.cond.notify_all();
    }

    /// Take the pending seek, if any.
    pub fn take_seek(&self) -> Option<SeekRequest> {
        self.state.lock().seek.take()
    }

    /// Post a frame step for the presentation side.
    pub fn post_step(&self) {
        self.state.lock().step_posted = true;
    }

    /// Consume a step posted by [`post_step`](Self::post_step).
    pub fn take_step(&self) -> bool {
        std::mem::take(&mut self.state.lock().step_posted)
    }

    /// Block until the next [`wake`](Self::wake) and consume it.
    pub fn wait(&self) {
        let mut state = self.state.lock();
        while !state.woken {
            self.cond.wait(&mut state);
        }
        state.woken = false;
    }
}

/// Whether `queue` holds enough data that the reader may pause.
pub fn stream_has_enough_packets(
    queue: &PacketQueue,
    time_base: Rational,
    attached_picture: bool,
    min_frames: usize,
) -> bool {
    if queue.is_aborted() || attached_picture {
        return true;
    }
    if queue.nb_packets() <= min_frames {
        return false;
    }
    let duration = queue.duration();
    duration == 0
        || time_base
            .ticks_to_seconds(duration)
            .map_or(true, |seconds| seconds > 1.0)
}

pub struct ReaderContext {
    pub demuxer: Box<dyn Demuxer>,
    pub queue: Arc<PacketQueue>,
    pub control: Arc<ReadControl>,
    pub clocks: Arc<Mutex<Clocks>>,
    pub stream: StreamInfo,
    pub settings: SyncSettings,
}

impl ReaderContext {
    fn is_saturated(&self) -> bool {
        if self.settings.infinite_buffer {
            return false;
        }
        self.queue.size() > self.settings.max_queue_size
            || stream_has_enough_packets(
                &self.queue,
                self.stream.time_base,
                self.stream.attached_picture,
                self.settings.min_frames,
            )
    }

    fn execute_seek(&mut self, target: f64) -> bool {
        match self.demuxer.seek(target) {
            Ok(()) => {
                self.queue.put_flush();
                self.clocks
                    .lock()
                    .external
                    .set_at(Some(target), None, relative_seconds());
                info!("seeked to {:.3}s, serial={}", target, self.queue.serial());
                true
            }
            Err(err) => {
                warn!("seek to {:.3}s failed: {}", target, err);
                false
            }
        }
    }
}

/// Read packets until the queue is aborted.
pub fn run_read_thread(mut ctx: ReaderContext) {
    let mut eof = false;
    loop {
        if ctx.queue.is_aborted() {
            break;
        }

        if let Some(seek) = ctx.control.take_seek() {
            if ctx.execute_seek(seek.target) {
                eof = false;
                if seek.step {
                    ctx.control.post_step();
                }
            }
        }

        if ctx.is_saturated() {
            ctx.control.wait();
            continue;
        }

        match ctx.demuxer.read_packet() {
            Ok(Some(packet)) => {
                eof = false;
                if packet.stream_index == ctx.stream.index {
                    ctx.queue.put(packet);
                }
            }
            Ok(None) => {
                if !eof {
                    debug!("end of input, queueing drain marker");
                    ctx.queue.put_null(ctx.stream.index);
                    eof = true;
                }
                ctx.control.wait();
            }
            Err(err) => {
                if !eof {
                    warn!("read failed, treating as end of input: {}", err);
                    ctx.queue.put_null(ctx.stream.index);
                    eof = true;
                }
                ctx.control.wait();
            }
        }
    }
    info!("read thread exiting");
}
