//! # XPlay Playback Library
//!
//! This library provides the synchronization core of the XPlay video player:
//! packet and frame queues shared between worker threads, the decode-thread
//! protocol, and the presentation scheduler that decides when a decoded frame
//! is shown. Demuxing and decoding are supplied by the host through the
//! [`source`] traits.

pub mod clock;
pub mod decoder;
pub mod error;
pub mod frame;
pub mod packet;
pub mod player;
pub mod reader;
pub mod scheduler;
pub mod settings;
pub mod source;
pub mod stats;
pub mod tools;

pub use error::{CodecError, Result, XPlayError};
pub use player::{OpenOptions, XPlay};
pub use scheduler::RefreshState;
pub use settings::SyncSettings;
