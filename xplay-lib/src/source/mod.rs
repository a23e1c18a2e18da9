//! Boundary with the demux/decode collaborator.
//!
//! The engine never parses containers or runs codecs itself. A host provides a
//! [`MediaSource`] that opens descriptors into [`Demuxer`]s, and each demuxer
//! hands out a [`Codec`] per stream.

pub mod synthetic;

use serde::Serialize;

use crate::error::{CodecError, Result};
use crate::frame::Picture;
use crate::packet::Packet;

pub use synthetic::{SyntheticSource, SyntheticSpec};

/// Exact rational number, used for time bases and frame rates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Rational {
    pub num: i64,
    pub den: i64,
}

impl Rational {
    pub const fn new(num: i64, den: i64) -> Self {
        Self { num, den }
    }

    /// Value as a float, `None` when the denominator is zero.
    pub fn to_f64(self) -> Option<f64> {
        if self.den == 0 {
            None
        } else {
            Some(self.num as f64 / self.den as f64)
        }
    }

    pub fn invert(self) -> Self {
        Self::new(self.den, self.num)
    }

    /// Convert `ticks` of this time base to seconds.
    pub fn ticks_to_seconds(self, ticks: i64) -> Option<f64> {
        self.to_f64().map(|unit| ticks as f64 * unit)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum MediaKind {
    Video,
    Audio,
    Subtitle,
    Data,
}

/// Static description of one stream.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StreamInfo {
    pub index: usize,
    pub kind: MediaKind,
    pub time_base: Rational,
    pub frame_rate: Option<Rational>,
    /// Cover art style stream that never needs more than one packet.
    pub attached_picture: bool,
}

/// Static description of an opened source.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SourceInfo {
    pub streams: Vec<StreamInfo>,
    /// Total duration in seconds, when known.
    pub duration: Option<f64>,
    /// The container may jump timestamps (e.g. MPEG-TS).
    pub ts_discontinuous: bool,
}

impl SourceInfo {
    /// First video stream, if any.
    pub fn video_stream(&self) -> Option<&StreamInfo> {
        self.streams.iter().find(|s| s.kind == MediaKind::Video)
    }
}

/// Opens source descriptors.
pub trait MediaSource: Send + Sync {
    /// Open `descriptor`. Failure is fatal to the session being opened.
    fn open(&self, descriptor: &str) -> Result<Box<dyn Demuxer>>;
}

/// An opened container producing compressed packets.
pub trait Demuxer: Send {
    fn info(&self) -> &SourceInfo;

    /// Next packet of any stream, or `None` at end of input.
    fn read_packet(&mut self) -> Result<Option<Packet>>;

    /// Reposition so the next packet is at or before `target` seconds.
    fn seek(&mut self, target: f64) -> Result<()>;

    /// Create a codec for `stream_index`.
    fn open_codec(&mut self, stream_index: usize) -> Result<Box<dyn Codec>>;
}

/// Whether a codec took the offered packet.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SendOutcome {
    Accepted,
    /// Output must be drained before this packet can be taken; offer it again.
    Full,
}

/// What a codec produced on [`Codec::receive`].
#[derive(Debug, Clone, PartialEq)]
pub enum CodecOutput {
    Frame(RawFrame),
    /// Nothing buffered; feed more packets.
    NeedsInput,
    /// Drain requested and every buffered frame has been returned.
    Drained,
}

/// Codec output before timestamps are converted to seconds.
#[derive(Debug, Clone, PartialEq)]
pub struct RawFrame {
    pub picture: Picture,
    /// Timestamp in stream time-base ticks.
    pub pts: Option<i64>,
    pub pos: Option<u64>,
}

/// Send/receive decoder for a single stream.
pub trait Codec: Send {
    /// Offer a packet; `None` requests a drain of buffered output.
    fn send(&mut self, packet: Option<&Packet>) -> std::result::Result<SendOutcome, CodecError>;

    fn receive(&mut self) -> std::result::Result<CodecOutput, CodecError>;

    /// Drop all buffered state, ready for a new generation of packets.
    fn flush(&mut self);
}
