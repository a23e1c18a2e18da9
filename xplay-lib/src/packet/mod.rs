//! Compressed packets and the per-stream packet queue.

mod queue;

pub use queue::{PacketGet, PacketQueue};

/// Whether a packet carries data or marks the end of its stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PacketKind {
    Data,
    EndOfStream,
}

/// One compressed unit as produced by a demuxer.
///
/// Timestamps and duration are in ticks of the owning stream's time base.
#[derive(Debug, Clone, PartialEq)]
pub struct Packet {
    pub stream_index: usize,
    pub data: Vec<u8>,
    pub pts: Option<i64>,
    pub dts: Option<i64>,
    pub duration: i64,
    /// Byte offset of the packet in the source, when known.
    pub pos: Option<u64>,
    kind: PacketKind,
}

impl Packet {
    /// Create a data packet for `stream_index`.
    pub fn new(stream_index: usize, data: Vec<u8>) -> Self {
        Self {
            stream_index,
            data,
            pts: None,
            dts: None,
            duration: 0,
            pos: None,
            kind: PacketKind::Data,
        }
    }

    /// Create the end-of-stream marker that asks a decoder to drain.
    pub fn end_of_stream(stream_index: usize) -> Self {
        Self {
            kind: PacketKind::EndOfStream,
            ..Self::new(stream_index, Vec::new())
        }
    }

    /// Set the presentation timestamp in stream ticks.
    pub fn with_pts(mut self, pts: i64) -> Self {
        self.pts = Some(pts);
        self
    }

    /// Set the decode timestamp in stream ticks.
    pub fn with_dts(mut self, dts: i64) -> Self {
        self.dts = Some(dts);
        self
    }

    /// Set the duration in stream ticks.
    pub fn with_duration(mut self, duration: i64) -> Self {
        self.duration = duration;
        self
    }

    /// Set the byte offset in the source.
    pub fn with_pos(mut self, pos: u64) -> Self {
        self.pos = Some(pos);
        self
    }

    /// Data packet or end-of-stream marker.
    pub fn kind(&self) -> PacketKind {
        self.kind
    }

    /// Whether this packet asks the decoder to drain.
    pub fn is_end_of_stream(&self) -> bool {
        self.kind == PacketKind::EndOfStream
    }

    /// Payload size in bytes.
    pub fn size(&self) -> usize {
        self.data.len()
    }
}
