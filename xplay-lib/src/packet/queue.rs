//! Thread-safe FIFO of packets for one stream.
//!
//! The queue tags every packet with the serial that was current when it was
//! enqueued. A flush bumps the serial and discards everything queued, so a
//! consumer can always tell pre-seek data from post-seek data by comparing
//! serials by value.

use std::collections::VecDeque;
use std::mem::size_of;

use parking_lot::{Condvar, Mutex};

use super::Packet;

/// Bookkeeping cost charged per queued packet on top of its payload.
const PACKET_OVERHEAD: usize = size_of::<Packet>();

/// Result of [`PacketQueue::get`].
#[derive(Debug)]
pub enum PacketGet {
    /// The head packet and the serial it was enqueued under.
    Packet(Packet, u64),
    /// Non-blocking get on an empty queue.
    Empty,
    /// The queue was aborted.
    Aborted,
}

struct QueuedPacket {
    packet: Packet,
    serial: u64,
}

struct QueueState {
    packets: VecDeque<QueuedPacket>,
    size: usize,
    duration: i64,
    abort_request: bool,
    serial: u64,
}

/// Bounded-by-policy packet FIFO shared by a reader and a decoder.
pub struct PacketQueue {
    state: Mutex<QueueState>,
    cond: Condvar,
}

impl Default for PacketQueue {
    fn default() -> Self {
        Self::new()
    }
}

impl PacketQueue {
    /// Create a started queue at serial 1.
    pub fn new() -> Self {
        Self {
            state: Mutex::new(QueueState {
                packets: VecDeque::new(),
                size: 0,
                duration: 0,
                abort_request: false,
                serial: 1,
            }),
            cond: Condvar::new(),
        }
    }

    /// Re-arm an aborted queue for a new stream generation.
    pub fn start(&self) {
        let mut state = self.state.lock();
        state.abort_request = false;
        state.serial += 1;
    }

    /// Append `packet` under the current serial.
    ///
    /// Returns `false` and drops the packet if the queue was aborted.
    pub fn put(&self, packet: Packet) -> bool {
        let mut state = self.state.lock();
        if state.abort_request {
            return false;
        }
        state.size += packet.size() + PACKET_OVERHEAD;
        state.duration += packet.duration;
        let serial = state.serial;
        state.packets.push_back(QueuedPacket { packet, serial });
        self.cond.notify_one();
        true
    }

    /// Enqueue an end-of-stream marker for `stream_index`.
    pub fn put_null(&self, stream_index: usize) -> bool {
        self.put(Packet::end_of_stream(stream_index))
    }

    /// Start a new generation: bump the serial and drop every queued packet.
    pub fn put_flush(&self) {
        let mut state = self.state.lock();
        state.packets.clear();
        state.size = 0;
        state.duration = 0;
        state.serial += 1;
        log::debug!("packet queue flushed, serial={}", state.serial);
        self.cond.notify_all();
    }

    /// Remove the head packet.
    ///
    /// When `block` is set and the queue is empty, waits until a packet is
    /// queued or the queue is aborted.
    pub fn get(&self, block: bool) -> PacketGet {
        let mut state = self.state.lock();
        loop {
            if state.abort_request {
                return PacketGet::Aborted;
            }
            if let Some(entry) = state.packets.pop_front() {
                state.size = state
                    .size
                    .saturating_sub(entry.packet.size() + PACKET_OVERHEAD);
                state.duration -= entry.packet.duration;
                return PacketGet::Packet(entry.packet, entry.serial);
            }
            if !block {
                return PacketGet::Empty;
            }
            self.cond.wait(&mut state);
        }
    }

    /// Abort the queue and release every waiter. Idempotent and sticky.
    pub fn abort(&self) {
        let mut state = self.state.lock();
        state.abort_request = true;
        self.cond.notify_all();
    }

    /// Whether [`abort`](Self::abort) was called.
    pub fn is_aborted(&self) -> bool {
        self.state.lock().abort_request
    }

    /// Serial that newly queued packets are tagged with.
    pub fn serial(&self) -> u64 {
        self.state.lock().serial
    }

    /// Number of queued packets.
    pub fn nb_packets(&self) -> usize {
        self.state.lock().packets.len()
    }

    /// Queued bytes including per-packet overhead.
    pub fn size(&self) -> usize {
        self.state.lock().size
    }

    /// Summed duration of queued packets in stream ticks.
    pub fn duration(&self) -> i64 {
        self.state.lock().duration
    }
}
