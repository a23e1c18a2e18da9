//! Error types for session and codec operations.

use thiserror::Error;

/// Errors surfaced by the session API.
///
/// Queue-level conditions (abort, empty) are never reported through this
/// type; they are returned structurally by the queue operations.
#[derive(Error, Debug)]
pub enum XPlayError {
    /// The source descriptor could not be opened.
    #[error("failed to open source '{descriptor}': {reason}")]
    SourceOpen { descriptor: String, reason: String },

    /// The opened source does not carry a video stream.
    #[error("source has no video stream")]
    NoVideoStream,

    /// The codec for the selected stream failed to initialize.
    #[error("failed to open codec for stream {stream_index}: {reason}")]
    CodecOpen { stream_index: usize, reason: String },

    /// The demuxer failed while reading or seeking.
    #[error("demux error: {0}")]
    Demux(String),

    /// A worker thread could not be spawned.
    #[error("failed to spawn {name} thread: {source}")]
    Thread {
        name: &'static str,
        source: std::io::Error,
    },

    /// Settings failed validation.
    #[error("invalid settings: {0}")]
    Settings(String),

    /// The operation needs an open session.
    #[error("no source is open")]
    NotOpen,

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("settings json error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Errors reported by a [`Codec`](crate::source::Codec).
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CodecError {
    /// The packet could not be decoded; the next packet may succeed.
    #[error("corrupt packet: {0}")]
    Corrupt(String),

    /// The codec cannot continue decoding this stream.
    #[error("codec failure: {0}")]
    Fatal(String),
}

impl CodecError {
    /// Returns `true` if decoding may continue with the next packet.
    pub fn is_transient(&self) -> bool {
        matches!(self, CodecError::Corrupt(_))
    }
}

/// Result type for session operations.
pub type Result<T> = std::result::Result<T, XPlayError>;
