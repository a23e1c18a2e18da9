//! Synchronization policy and queue sizing.
//!
//! Every threshold the scheduler and reader apply lives in [`SyncSettings`],
//! so hosts can tune catch-up behavior without touching the engine. Settings
//! serialize to JSON; missing fields fall back to the defaults below.

use serde::{Deserialize, Serialize};

use crate::error::{Result, XPlayError};

/// Minimum queued packets before the reader considers a stream fed.
pub const MIN_FRAMES: usize = 25;
/// Maximum queued compressed bytes before the reader pauses.
pub const MAX_QUEUE_SIZE: usize = 15 * 1024 * 1024;
/// No A/V correction is applied below this drift (seconds).
pub const AV_SYNC_THRESHOLD_MIN: f64 = 0.04;
/// Upper bound on the sync threshold and on a single tick's correction.
pub const AV_SYNC_THRESHOLD_MAX: f64 = 0.1;
/// Frames longer than this are not duplicated to catch up.
pub const AV_SYNC_FRAMEDUP_THRESHOLD: f64 = 0.1;
/// Drift beyond this is treated as a discontinuity, not a sync error.
pub const AV_NOSYNC_THRESHOLD: f64 = 10.0;
/// Poll interval suggested to the host when nothing is due.
pub const REFRESH_RATE: f64 = 0.01;
/// Default number of picture slots, including the retained last frame.
pub const VIDEO_PICTURE_QUEUE_SIZE: usize = 3;
/// Hard upper bound on picture slots.
pub const FRAME_QUEUE_SIZE: usize = 16;

/// Clock the video schedule is slaved to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SyncMaster {
    /// Frames pace themselves from their own timestamps.
    #[default]
    Video,
    /// Frames follow an external reference clock.
    External,
}

/// Late-frame dropping policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FrameDrop {
    /// Drop only when video is not the master clock.
    #[default]
    Auto,
    Always,
    Never,
}

impl FrameDrop {
    /// Whether late frames may be discarded under the given master clock.
    pub fn enabled_for(self, master: SyncMaster) -> bool {
        match self {
            FrameDrop::Always => true,
            FrameDrop::Never => false,
            FrameDrop::Auto => master != SyncMaster::Video,
        }
    }
}

/// Tunable playback policy.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SyncSettings {
    pub picture_queue_size: usize,
    pub keep_last: bool,
    pub min_frames: usize,
    pub max_queue_size: usize,
    /// Disable reader backpressure entirely (live sources).
    pub infinite_buffer: bool,
    pub sync_master: SyncMaster,
    pub framedrop: FrameDrop,
    pub av_sync_threshold_min: f64,
    pub av_sync_threshold_max: f64,
    pub av_sync_framedup_threshold: f64,
    /// Largest change a single tick may apply to the target delay.
    pub max_correction: f64,
    pub nosync_threshold: f64,
    pub refresh_rate: f64,
}

impl Default for SyncSettings {
    fn default() -> Self {
        Self {
            picture_queue_size: VIDEO_PICTURE_QUEUE_SIZE,
            keep_last: true,
            min_frames: MIN_FRAMES,
            max_queue_size: MAX_QUEUE_SIZE,
            infinite_buffer: false,
            sync_master: SyncMaster::Video,
            framedrop: FrameDrop::Auto,
            av_sync_threshold_min: AV_SYNC_THRESHOLD_MIN,
            av_sync_threshold_max: AV_SYNC_THRESHOLD_MAX,
            av_sync_framedup_threshold: AV_SYNC_FRAMEDUP_THRESHOLD,
            max_correction: AV_SYNC_THRESHOLD_MAX,
            nosync_threshold: AV_NOSYNC_THRESHOLD,
            refresh_rate: REFRESH_RATE,
        }
    }
}

impl SyncSettings {
    /// Parse and validate settings from a JSON document.
    ///
    /// # Errors
    /// Returns an error if the JSON is malformed or a value is out of range.
    pub fn from_json_str(json: &str) -> Result<Self> {
        let settings: Self = serde_json::from_str(json)?;
        settings.validate()?;
        Ok(settings)
    }

    /// Check that every threshold is usable by the scheduler.
    pub fn validate(&self) -> Result<()> {
        if !(1..=FRAME_QUEUE_SIZE).contains(&self.picture_queue_size) {
            return Err(XPlayError::Settings(format!(
                "picture_queue_size must be within 1..={}, got {}",
                FRAME_QUEUE_SIZE, self.picture_queue_size
            )));
        }
        if self.keep_last && self.picture_queue_size < 2 {
            return Err(XPlayError::Settings(
                "keep_last needs at least two picture slots".to_string(),
            ));
        }
        let non_negative = [
            ("av_sync_threshold_min", self.av_sync_threshold_min),
            ("av_sync_threshold_max", self.av_sync_threshold_max),
            ("av_sync_framedup_threshold", self.av_sync_framedup_threshold),
            ("max_correction", self.max_correction),
            ("nosync_threshold", self.nosync_threshold),
        ];
        for (name, value) in non_negative {
            if !value.is_finite() || value < 0.0 {
                return Err(XPlayError::Settings(format!(
                    "{} must be a finite non-negative number, got {}",
                    name, value
                )));
            }
        }
        if self.av_sync_threshold_min > self.av_sync_threshold_max {
            return Err(XPlayError::Settings(
                "av_sync_threshold_min exceeds av_sync_threshold_max".to_string(),
            ));
        }
        if !self.refresh_rate.is_finite() || self.refresh_rate <= 0.0 {
            return Err(XPlayError::Settings(format!(
                "refresh_rate must be positive, got {}",
                self.refresh_rate
            )));
        }
        Ok(())
    }

    /// Whether late frames may be dropped under the configured master clock.
    pub fn framedrop_enabled(&self) -> bool {
        self.framedrop.enabled_for(self.sync_master)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_valid() {
        let settings = SyncSettings::default();
        assert!(settings.validate().is_ok());
        assert_eq!(settings.min_frames, 25);
        assert_eq!(settings.max_queue_size, 15 * 1024 * 1024);
        assert!((settings.max_correction - 0.1).abs() < f64::EPSILON);
    }

    #[test]
    fn partial_json_keeps_defaults() {
        let settings =
            SyncSettings::from_json_str(r#"{"sync_master":"external","framedrop":"never"}"#)
                .unwrap();
        assert_eq!(settings.sync_master, SyncMaster::External);
        assert_eq!(settings.framedrop, FrameDrop::Never);
        assert_eq!(settings.picture_queue_size, VIDEO_PICTURE_QUEUE_SIZE);
    }

    #[test]
    fn oversized_queue_is_rejected() {
        let err = SyncSettings::from_json_str(r#"{"picture_queue_size":64}"#).unwrap_err();
        assert!(matches!(err, XPlayError::Settings(_)));
    }

    #[test]
    fn inverted_thresholds_are_rejected() {
        let settings = SyncSettings {
            av_sync_threshold_min: 0.5,
            av_sync_threshold_max: 0.1,
            ..SyncSettings::default()
        };
        assert!(settings.validate().is_err());
    }

    #[test]
    fn auto_framedrop_follows_master() {
        assert!(!FrameDrop::Auto.enabled_for(SyncMaster::Video));
        assert!(FrameDrop::Auto.enabled_for(SyncMaster::External));
        assert!(FrameDrop::Always.enabled_for(SyncMaster::Video));
        assert!(!FrameDrop::Never.enabled_for(SyncMaster::External));
    }
}
