//! Transport and lifecycle operations for `XPlay`.
//!
//! Open/close, seeking, pausing and the read-only views a host polls between
//! refreshes.

use std::sync::atomic::Ordering;

use log::info;

use crate::error::{Result, XPlayError};
use crate::source::SourceInfo;
use crate::stats::PlaybackStats;
use crate::tools::time::relative_seconds;

use super::runtime::VideoState;
use super::{OpenOptions, XPlay};

impl XPlay {
    /// Open a source, replacing any source that is currently open.
    ///
    /// # Errors
    ///
    /// Fails with [`XPlayError::SourceOpen`], [`XPlayError::NoVideoStream`] or
    /// [`XPlayError::CodecOpen`] before any worker thread is started, or with
    /// [`XPlayError::Settings`] when the configured settings are invalid.
    pub fn open(&self, options: &OpenOptions) -> Result<()> {
        let mut state = self.state.lock();
        if let Some(previous) = state.take() {
            drop(previous);
            info!("closed previous source");
        }

        let settings = self.settings.lock().clone();
        settings.validate()?;
        let video = VideoState::start(self.source.as_ref(), options, settings, self.stats.clone())?;
        *state = Some(video);
        Ok(())
    }

    /// Stop the workers and release the source. Safe to call repeatedly.
    pub fn close(&self) {
        let previous = self.state.lock().take();
        if let Some(video) = previous {
            drop(video);
            info!("session closed");
        }
    }

    /// Whether a source is currently open.
    pub fn is_open(&self) -> bool {
        self.state.lock().is_some()
    }

    /// Request a seek to `position` seconds.
    ///
    /// The target is clamped to the source duration when known. While paused,
    /// the first frame at the new position is still presented.
    pub fn seek(&self, position: f64) -> Result<()> {
        if !position.is_finite() {
            return Err(XPlayError::Demux(format!("invalid seek target {}", position)));
        }
        let mut state = self.state.lock();
        let video = state.as_mut().ok_or(XPlayError::NotOpen)?;

        let mut target = position.max(0.0);
        if let Some(duration) = video.info.duration {
            target = target.min(duration);
        }
        video.seek_target = Some(target);
        video.control.request_seek(target, video.paused);
        info!("seek requested to {:.3}s", target);
        Ok(())
    }

    /// Seek `delta` seconds from the current position.
    pub fn seek_relative(&self, delta: f64) -> Result<()> {
        let current = {
            let state = self.state.lock();
            let video = state.as_ref().ok_or(XPlayError::NotOpen)?;
            let serial = video.packets.serial();
            let master = video.clocks.lock().master(relative_seconds(), serial);
            master.or(video.seek_target).unwrap_or(0.0)
        };
        self.seek(current + delta)
    }

    /// Flip between paused and playing. Returns the new paused state.
    pub fn toggle_pause(&self) -> Result<bool> {
        let mut state = self.state.lock();
        let video = state.as_mut().ok_or(XPlayError::NotOpen)?;
        let paused = !video.paused;
        video.set_paused(paused, relative_seconds());
        Ok(paused)
    }

    /// Pause presentation. No-op when already paused.
    pub fn pause(&self) -> Result<()> {
        let mut state = self.state.lock();
        let video = state.as_mut().ok_or(XPlayError::NotOpen)?;
        video.set_paused(true, relative_seconds());
        Ok(())
    }

    /// Resume presentation. No-op when already playing.
    pub fn resume(&self) -> Result<()> {
        let mut state = self.state.lock();
        let video = state.as_mut().ok_or(XPlayError::NotOpen)?;
        video.set_paused(false, relative_seconds());
        Ok(())
    }

    /// Whether presentation is paused. `false` when nothing is open.
    pub fn is_paused(&self) -> bool {
        self.state
            .lock()
            .as_ref()
            .map(|video| video.paused)
            .unwrap_or(false)
    }

    /// Pause (if playing) and present exactly one more frame.
    pub fn step_frame(&self) -> Result<()> {
        let mut state = self.state.lock();
        let video = state.as_mut().ok_or(XPlayError::NotOpen)?;
        video.set_paused(true, relative_seconds());
        video.scheduler.request_step();
        Ok(())
    }

    /// Drive the external reference clock (seconds).
    pub fn set_external_clock(&self, pts: f64) -> Result<()> {
        let state = self.state.lock();
        let video = state.as_ref().ok_or(XPlayError::NotOpen)?;
        let pts = pts.is_finite().then_some(pts);
        video
            .clocks
            .lock()
            .external
            .set_at(pts, None, relative_seconds());
        Ok(())
    }

    /// Master clock position in seconds.
    pub fn position(&self) -> Option<f64> {
        let state = self.state.lock();
        let video = state.as_ref()?;
        let serial = video.packets.serial();
        let position = video.clocks.lock().master(relative_seconds(), serial);
        position
    }

    /// Source duration in seconds, when known.
    pub fn duration(&self) -> Option<f64> {
        self.state.lock().as_ref().and_then(|video| video.info.duration)
    }

    pub fn source_info(&self) -> Option<SourceInfo> {
        self.state.lock().as_ref().map(|video| video.info.clone())
    }

    /// True once the decoder drained the current generation and every
    /// decoded frame has been presented or dropped.
    pub fn is_finished(&self) -> bool {
        let state = self.state.lock();
        match state.as_ref() {
            Some(video) => {
                video.decoder_status.finished() == Some(video.packets.serial())
                    && video.frames.nb_remaining() == 0
            }
            None => false,
        }
    }

    /// Snapshot of the counters plus the live queue and thread state.
    pub fn stats(&self) -> PlaybackStats {
        let mut stats = PlaybackStats::from_counters(&self.stats);
        let state = self.state.lock();
        if let Some(video) = state.as_ref() {
            let serial = video.packets.serial();
            stats.queued_packets = video.packets.nb_packets();
            stats.queued_bytes = video.packets.size();
            stats.queued_frames = video.frames.nb_remaining();
            stats.serial = serial;
            stats.decoder_state = video.decoder_status.state();
            stats.position = video.clocks.lock().master(relative_seconds(), serial);
            stats.paused = video.paused;
            stats.decoder_alive = video.decoder_alive.load(Ordering::SeqCst);
            stats.reader_alive = video.reader_alive.load(Ordering::SeqCst);
        }
        stats
    }
}
