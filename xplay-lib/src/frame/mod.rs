//! Decoded frames and the ring buffer that hands them to the renderer.

mod queue;

use std::sync::Arc;

pub use queue::{FrameQueue, WritableSlot};

/// Decoded picture payload. The engine never looks inside `data`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Picture {
    pub width: u32,
    pub height: u32,
    pub data: Vec<u8>,
}

/// A decoded frame ready for presentation.
#[derive(Debug, Clone)]
pub struct Frame {
    pub picture: Arc<Picture>,
    /// Packet generation the frame was decoded from.
    pub serial: u64,
    /// Presentation timestamp in seconds.
    pub pts: Option<f64>,
    /// Estimated display duration in seconds.
    pub duration: f64,
    /// Byte position of the source packet.
    pub pos: Option<u64>,
}

impl Frame {
    pub fn new(picture: Picture, serial: u64, pts: Option<f64>, duration: f64) -> Self {
        Self {
            picture: Arc::new(picture),
            serial,
            pts,
            duration,
            pos: None,
        }
    }

    pub fn with_pos(mut self, pos: Option<u64>) -> Self {
        self.pos = pos;
        self
    }
}
