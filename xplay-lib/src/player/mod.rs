//! High-level playback session.

mod controls;
mod runtime;
mod settings;

use std::sync::Arc;

use parking_lot::Mutex;

use crate::scheduler::RefreshState;
use crate::settings::SyncSettings;
use crate::source::MediaSource;
use crate::stats::StatsCounters;
use crate::tools::time::relative_seconds;

use runtime::VideoState;

/// What to open and where to start.
#[derive(Debug, Clone, PartialEq)]
pub struct OpenOptions {
    pub descriptor: String,
    /// Initial position in seconds.
    pub start_position: Option<f64>,
}

impl OpenOptions {
    pub fn new(descriptor: impl Into<String>) -> Self {
        Self {
            descriptor: descriptor.into(),
            start_position: None,
        }
    }

    pub fn start_at(mut self, seconds: f64) -> Self {
        self.start_position = Some(seconds);
        self
    }
}

/// Playback session.
///
/// `XPlay` owns the reader and decode threads of the currently open source
/// and schedules presentation when the host calls [`XPlay::refresh`]. Every
/// method takes `&self`, so a session can be shared between a control thread
/// and a render thread.
pub struct XPlay {
    source: Box<dyn MediaSource>,
    settings: Mutex<SyncSettings>,
    state: Mutex<Option<VideoState>>,
    stats: Arc<StatsCounters>,
}

impl XPlay {
    pub fn new(source: Box<dyn MediaSource>, settings: SyncSettings) -> Self {
        Self {
            source,
            settings: Mutex::new(settings),
            state: Mutex::new(None),
            stats: Arc::new(StatsCounters::new()),
        }
    }

    /// Run one scheduling tick.
    ///
    /// Never blocks on decoding. When no source is open the returned state
    /// carries no frame and the default poll interval.
    pub fn refresh(&self) -> RefreshState {
        let mut state = self.state.lock();
        match state.as_mut() {
            Some(video) => video.refresh(relative_seconds(), &self.stats),
            None => RefreshState {
                frame: None,
                fresh: false,
                remaining_time: self.settings.lock().refresh_rate,
            },
        }
    }
}

impl Drop for XPlay {
    fn drop(&mut self) {
        self.close();
    }
}
