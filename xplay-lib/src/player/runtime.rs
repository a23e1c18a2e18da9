//! Worker-thread bootstrap and teardown for `XPlay`.
//!
//! [`VideoState`] holds everything that lives exactly as long as one opened
//! source: queues, clocks, scheduler and the two worker threads. Dropping it
//! aborts the queues and joins the workers.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};

use log::{info, warn};
use parking_lot::Mutex;

use crate::clock::Clocks;
use crate::decoder::{run_video_thread, Decoder, DecoderStatus, VideoThreadContext};
use crate::error::{Result, XPlayError};
use crate::frame::FrameQueue;
use crate::packet::PacketQueue;
use crate::reader::{run_read_thread, ReadControl, ReaderContext};
use crate::scheduler::{self, RefreshContext, RefreshState, Scheduler};
use crate::settings::SyncSettings;
use crate::source::{Demuxer, MediaSource, SourceInfo, StreamInfo};
use crate::stats::StatsCounters;

use super::OpenOptions;

const VIDEO_THREAD: &str = "xplay-video";
const READ_THREAD: &str = "xplay-read";

/// Keeps a liveness flag set for as long as the owning worker runs.
///
/// Created before the spawn and moved into the thread, so the flag is already
/// set when `open` returns and is cleared even if the spawn fails.
pub(super) struct WorkerGuard {
    alive: Arc<AtomicBool>,
}

impl WorkerGuard {
    pub(super) fn new(alive: Arc<AtomicBool>) -> Self {
        alive.store(true, Ordering::SeqCst);
        Self { alive }
    }
}

impl Drop for WorkerGuard {
    fn drop(&mut self) {
        self.alive.store(false, Ordering::SeqCst);
    }
}

/// Per-source playback state.
pub(super) struct VideoState {
    pub(super) packets: Arc<PacketQueue>,
    pub(super) frames: Arc<FrameQueue>,
    pub(super) clocks: Arc<Mutex<Clocks>>,
    pub(super) control: Arc<ReadControl>,
    pub(super) decoder_status: Arc<DecoderStatus>,
    pub(super) scheduler: Scheduler,
    pub(super) info: SourceInfo,
    pub(super) paused: bool,
    /// Target of the most recent seek, used when the clocks are unset.
    pub(super) seek_target: Option<f64>,
    pub(super) decoder_alive: Arc<AtomicBool>,
    pub(super) reader_alive: Arc<AtomicBool>,
    workers: Vec<JoinHandle<()>>,
}

impl VideoState {
    /// Open `options.descriptor` and start the decode and read threads.
    ///
    /// Nothing is spawned unless the source, its video stream and the codec
    /// all open successfully.
    pub(super) fn start(
        source: &dyn MediaSource,
        options: &OpenOptions,
        settings: SyncSettings,
        stats: Arc<StatsCounters>,
    ) -> Result<Self> {
        let descriptor = options.descriptor.as_str();
        let mut demuxer = source.open(descriptor).map_err(|err| match err {
            err @ XPlayError::SourceOpen { .. } => err,
            other => XPlayError::SourceOpen {
                descriptor: descriptor.to_string(),
                reason: other.to_string(),
            },
        })?;

        let info = demuxer.info().clone();
        let stream = info
            .video_stream()
            .cloned()
            .ok_or(XPlayError::NoVideoStream)?;
        let codec = demuxer
            .open_codec(stream.index)
            .map_err(|err| match err {
                err @ XPlayError::CodecOpen { .. } => err,
                other => XPlayError::CodecOpen {
                    stream_index: stream.index,
                    reason: other.to_string(),
                },
            })?;

        if let Some(position) = options.start_position {
            if let Err(err) = demuxer.seek(position) {
                warn!("could not seek to start position {:.3}s: {}", position, err);
            }
        }

        stats.reset();
        let packets = Arc::new(PacketQueue::new());
        let frames = Arc::new(FrameQueue::new(
            packets.clone(),
            settings.picture_queue_size,
            settings.keep_last,
        ));
        let clocks = Arc::new(Mutex::new(Clocks::new(settings.sync_master)));
        let control = Arc::new(ReadControl::new());
        let decoder_status = Arc::new(DecoderStatus::new());
        let max_frame_duration = scheduler::max_frame_duration(info.ts_discontinuous);

        let mut state = Self {
            packets,
            frames,
            clocks,
            control,
            decoder_status,
            scheduler: Scheduler::new(settings.clone(), max_frame_duration),
            info,
            paused: false,
            seek_target: options.start_position,
            decoder_alive: Arc::new(AtomicBool::new(false)),
            reader_alive: Arc::new(AtomicBool::new(false)),
            workers: Vec::with_capacity(2),
        };

        let decoder = Decoder::new(
            codec,
            state.packets.clone(),
            state.control.clone(),
            state.decoder_status.clone(),
            stats.clone(),
        );
        let video_ctx = VideoThreadContext {
            frames: state.frames.clone(),
            clocks: state.clocks.clone(),
            time_base: stream.time_base,
            frame_rate: stream.frame_rate,
            settings: settings.clone(),
            stats,
        };
        let guard = WorkerGuard::new(state.decoder_alive.clone());
        let handle = decoder.start(VIDEO_THREAD, move |decoder| {
            let _guard = guard;
            run_video_thread(decoder, video_ctx);
        })?;
        state.workers.push(handle);

        let handle = state.spawn_reader(demuxer, stream, settings)?;
        state.workers.push(handle);

        info!(
            "opened '{}' (duration {:?}, max frame duration {}s)",
            descriptor, state.info.duration, max_frame_duration
        );
        Ok(state)
    }

    fn spawn_reader(
        &self,
        demuxer: Box<dyn Demuxer>,
        stream: StreamInfo,
        settings: SyncSettings,
    ) -> Result<JoinHandle<()>> {
        let ctx = ReaderContext {
            demuxer,
            queue: self.packets.clone(),
            control: self.control.clone(),
            clocks: self.clocks.clone(),
            stream,
            settings,
        };
        let guard = WorkerGuard::new(self.reader_alive.clone());
        thread::Builder::new()
            .name(READ_THREAD.to_string())
            .spawn(move || {
                let _guard = guard;
                run_read_thread(ctx);
            })
            .map_err(|source| XPlayError::Thread {
                name: READ_THREAD,
                source,
            })
    }

    pub(super) fn refresh(&mut self, now: f64, stats: &StatsCounters) -> RefreshState {
        if self.control.take_step() {
            self.scheduler.request_step();
        }
        let ctx = RefreshContext {
            frames: &self.frames,
            packets: &self.packets,
            clocks: &self.clocks,
            stats,
            paused: self.paused,
        };
        self.scheduler.refresh(now, &ctx)
    }

    /// Freeze or release presentation. Resuming moves the frame timer past
    /// the paused span so playback does not rush to catch up.
    pub(super) fn set_paused(&mut self, paused: bool, now: f64) {
        if self.paused == paused {
            return;
        }
        let mut clocks = self.clocks.lock();
        if self.paused {
            let paused_for = now - clocks.video.last_updated();
            self.scheduler.shift_frame_timer(paused_for);
        }
        self.paused = paused;
        clocks.set_paused(paused, now);
        info!("{}", if paused { "paused" } else { "resumed" });
    }

    /// Abort every queue, wake every waiter and join the workers.
    fn shutdown(&mut self) {
        self.packets.abort();
        self.frames.signal();
        self.control.wake();
        for handle in self.workers.drain(..) {
            let name = handle.thread().name().unwrap_or("worker").to_string();
            if handle.join().is_err() {
                warn!("{} thread panicked", name);
            }
        }
    }
}

impl Drop for VideoState {
    fn drop(&mut self) {
        self.shutdown();
    }
}
