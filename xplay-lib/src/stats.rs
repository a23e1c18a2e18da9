//! Playback counters shared between worker threads and the session.

use std::sync::atomic::{AtomicU64, Ordering};

use serde::Serialize;

use crate::decoder::DecoderState;

/// Monotonic counters updated lock-free by the decode thread and scheduler.
#[derive(Debug, Default)]
pub struct StatsCounters {
    frames_decoded: AtomicU64,
    frames_presented: AtomicU64,
    drops_early: AtomicU64,
    drops_late: AtomicU64,
    decode_errors: AtomicU64,
    stale_packets: AtomicU64,
}

impl StatsCounters {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn frame_decoded(&self) {
        self.frames_decoded.fetch_add(1, Ordering::Relaxed);
    }

    pub fn frame_presented(&self) {
        self.frames_presented.fetch_add(1, Ordering::Relaxed);
    }

    pub fn drop_early(&self) {
        self.drops_early.fetch_add(1, Ordering::Relaxed);
    }

    pub fn drop_late(&self) {
        self.drops_late.fetch_add(1, Ordering::Relaxed);
    }

    pub fn decode_error(&self) {
        self.decode_errors.fetch_add(1, Ordering::Relaxed);
    }

    pub fn stale_packet(&self) {
        self.stale_packets.fetch_add(1, Ordering::Relaxed);
    }

    /// Zero every counter (called when a new source is opened).
    pub fn reset(&self) {
        for counter in [
            &self.frames_decoded,
            &self.frames_presented,
            &self.drops_early,
            &self.drops_late,
            &self.decode_errors,
            &self.stale_packets,
        ] {
            counter.store(0, Ordering::Relaxed);
        }
    }

    pub fn frames_decoded(&self) -> u64 {
        self.frames_decoded.load(Ordering::Relaxed)
    }

    pub fn frames_presented(&self) -> u64 {
        self.frames_presented.load(Ordering::Relaxed)
    }

    pub fn drops_early(&self) -> u64 {
        self.drops_early.load(Ordering::Relaxed)
    }

    pub fn drops_late(&self) -> u64 {
        self.drops_late.load(Ordering::Relaxed)
    }

    pub fn decode_errors(&self) -> u64 {
        self.decode_errors.load(Ordering::Relaxed)
    }

    pub fn stale_packets(&self) -> u64 {
        self.stale_packets.load(Ordering::Relaxed)
    }
}

/// Point-in-time view of a session for hosts and reports.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct PlaybackStats {
    pub frames_decoded: u64,
    pub frames_presented: u64,
    pub drops_early: u64,
    pub drops_late: u64,
    pub decode_errors: u64,
    pub stale_packets: u64,
    pub queued_packets: usize,
    pub queued_bytes: usize,
    pub queued_frames: usize,
    pub serial: u64,
    pub decoder_state: DecoderState,
    /// Master clock position in seconds.
    pub position: Option<f64>,
    pub paused: bool,
    pub decoder_alive: bool,
    pub reader_alive: bool,
}

impl PlaybackStats {
    /// Copy the counter values into a fresh snapshot.
    pub fn from_counters(counters: &StatsCounters) -> Self {
        Self {
            frames_decoded: counters.frames_decoded(),
            frames_presented: counters.frames_presented(),
            drops_early: counters.drops_early(),
            drops_late: counters.drops_late(),
            decode_errors: counters.decode_errors(),
            stale_packets: counters.stale_packets(),
            ..Self::default()
        }
    }

    pub fn total_drops(&self) -> u64 {
        self.drops_early + self.drops_late
    }
}
