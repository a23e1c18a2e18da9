//! Drift-based presentation clocks.
//!
//! A clock stores the offset between a media timestamp and the wall clock at
//! the moment it was set, so reading it later needs no background ticking.
//! All `now` arguments come from [`relative_seconds`](crate::tools::time::relative_seconds).

use crate::settings::{SyncMaster, AV_NOSYNC_THRESHOLD};

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Clock {
    pts: Option<f64>,
    pts_drift: f64,
    last_updated: f64,
    serial: Option<u64>,
    paused: bool,
}

impl Default for Clock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock {
    /// An unset, running clock.
    pub fn new() -> Self {
        Self {
            pts: None,
            pts_drift: 0.0,
            last_updated: 0.0,
            serial: None,
            paused: false,
        }
    }

    /// Current clock value.
    ///
    /// Returns `None` while unset, or when `queue_serial` is given and the
    /// clock was last set from a different packet generation.
    pub fn get(&self, now: f64, queue_serial: Option<u64>) -> Option<f64> {
        if queue_serial.is_some() && queue_serial != self.serial {
            return None;
        }
        let pts = self.pts?;
        if self.paused {
            Some(pts)
        } else {
            Some(self.pts_drift + now)
        }
    }

    /// Set the clock to `pts` as of wall time `now`, tagged with `serial`.
    pub fn set_at(&mut self, pts: Option<f64>, serial: Option<u64>, now: f64) {
        self.pts = pts;
        self.last_updated = now;
        self.pts_drift = pts.map_or(0.0, |pts| pts - now);
        self.serial = serial;
    }

    /// Freeze or release the clock at its current value.
    pub fn set_paused(&mut self, paused: bool, now: f64) {
        let current = self.get(now, None);
        self.set_at(current, self.serial, now);
        self.paused = paused;
    }

    /// Snap this clock to `slave` when it is unset or has drifted past
    /// [`AV_NOSYNC_THRESHOLD`].
    pub fn sync_to_slave(&mut self, slave: &Clock, now: f64) {
        let Some(target) = slave.get(now, None) else {
            return;
        };
        let snap = match self.get(now, None) {
            None => true,
            Some(own) => (own - target).abs() > AV_NOSYNC_THRESHOLD,
        };
        if snap {
            self.set_at(Some(target), slave.serial, now);
        }
    }

    /// Wall time of the last [`set_at`](Self::set_at).
    pub fn last_updated(&self) -> f64 {
        self.last_updated
    }

    /// Packet serial the clock was last set from.
    pub fn serial(&self) -> Option<u64> {
        self.serial
    }

    pub fn is_paused(&self) -> bool {
        self.paused
    }
}

/// The video clock, the external reference clock and which one leads.
#[derive(Debug, Clone)]
pub struct Clocks {
    pub video: Clock,
    pub external: Clock,
    master: SyncMaster,
}

impl Clocks {
    pub fn new(master: SyncMaster) -> Self {
        Self {
            video: Clock::new(),
            external: Clock::new(),
            master,
        }
    }

    /// Value of the master clock; the video clock is checked against the
    /// current video packet serial.
    pub fn master(&self, now: f64, video_serial: u64) -> Option<f64> {
        match self.master {
            SyncMaster::Video => self.video.get(now, Some(video_serial)),
            SyncMaster::External => self.external.get(now, None),
        }
    }

    /// `video - master`, or `None` when video leads or either clock is unset.
    pub fn video_diff(&self, now: f64, video_serial: u64) -> Option<f64> {
        if self.master == SyncMaster::Video {
            return None;
        }
        let video = self.video.get(now, Some(video_serial))?;
        let master = self.master(now, video_serial)?;
        Some(video - master)
    }

    /// Record that a frame with `pts` was just presented.
    pub fn update_video_pts(&mut self, pts: Option<f64>, serial: u64, now: f64) {
        self.video.set_at(pts, Some(serial), now);
        self.external.sync_to_slave(&self.video, now);
    }

    /// Pause or release both clocks together.
    pub fn set_paused(&mut self, paused: bool, now: f64) {
        self.video.set_paused(paused, now);
        self.external.set_paused(paused, now);
    }
}
