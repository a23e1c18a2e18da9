use crate::error::Result;
use crate::settings::{FrameDrop, SyncMaster, SyncSettings};

use super::XPlay;

impl XPlay {
    /// Settings the next [`open`](XPlay::open) will use.
    pub fn settings(&self) -> SyncSettings {
        self.settings.lock().clone()
    }

    /// Replace all settings. Takes effect on the next open.
    pub fn set_settings(&self, settings: SyncSettings) -> Result<()> {
        settings.validate()?;
        *self.settings.lock() = settings;
        Ok(())
    }

    /// Choose the clock video is slaved to. Takes effect on the next open.
    pub fn set_sync_master(&self, master: SyncMaster) {
        self.settings.lock().sync_master = master;
    }

    /// Configure late-frame dropping. Takes effect on the next open.
    pub fn set_framedrop(&self, framedrop: FrameDrop) {
        self.settings.lock().framedrop = framedrop;
    }

    /// Configure the number of picture slots, clamped to the supported range.
    pub fn set_picture_queue_size(&self, slots: usize) {
        let mut settings = self.settings.lock();
        let min = if settings.keep_last { 2 } else { 1 };
        settings.picture_queue_size = slots.clamp(min, crate::settings::FRAME_QUEUE_SIZE);
    }

    /// Disable reader backpressure (for live sources).
    pub fn set_infinite_buffer(&self, infinite: bool) {
        self.settings.lock().infinite_buffer = infinite;
    }
}
