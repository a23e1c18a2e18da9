//! Decode-thread protocol between a packet queue and a codec.
//!
//! A [`Decoder`] pulls packets, feeds them to the host codec and hands decoded
//! frames back tagged with the packet serial they came from. Serial changes
//! (flushes) reset the codec before any frame of the new generation is
//! produced.

mod video;

use std::sync::Arc;
use std::thread::{self, JoinHandle};

use log::{debug, error, warn};
use parking_lot::Mutex;
use serde::Serialize;

use crate::error::{CodecError, Result, XPlayError};
use crate::packet::{Packet, PacketGet, PacketQueue};
use crate::reader::ReadControl;
use crate::source::{Codec, CodecOutput, RawFrame, SendOutcome};
use crate::stats::StatsCounters;

pub use video::{run_video_thread, VideoThreadContext};

/// Lifecycle of a decoder. A flush re-enters `Running`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum DecoderState {
    #[default]
    Idle,
    Running,
    Draining,
    Finished,
}

/// Result of one [`Decoder::decode_frame`] call.
#[derive(Debug)]
pub enum DecodeOutcome {
    /// A frame and the packet serial it was decoded under.
    Frame(RawFrame, u64),
    /// End of stream was fully drained for the current serial.
    Finished,
    /// The packet queue was aborted.
    Aborted,
    /// The codec failed for good; the stream is finished until the next flush.
    Failed(CodecError),
}

#[derive(Debug, Default)]
struct StatusInner {
    state: DecoderState,
    finished: Option<u64>,
}

/// Decoder state readable from outside the decode thread.
#[derive(Debug, Default)]
pub struct DecoderStatus {
    inner: Mutex<StatusInner>,
}

impl DecoderStatus {
    pub fn new() -> Self {
        Self::default()
    }

    /// Current lifecycle state.
    pub fn state(&self) -> DecoderState {
        self.inner.lock().state
    }

    /// Serial at which end of stream was fully drained, if any.
    pub fn finished(&self) -> Option<u64> {
        self.inner.lock().finished
    }

    fn set_state(&self, state: DecoderState) {
        self.inner.lock().state = state;
    }

    fn finish(&self, serial: Option<u64>) {
        let mut inner = self.inner.lock();
        inner.state = DecoderState::Finished;
        inner.finished = serial;
    }

    fn restart(&self) {
        let mut inner = self.inner.lock();
        inner.state = DecoderState::Running;
        inner.finished = None;
    }
}

pub struct Decoder {
    codec: Box<dyn Codec>,
    queue: Arc<PacketQueue>,
    control: Arc<ReadControl>,
    pending: Option<Packet>,
    pkt_serial: Option<u64>,
    failed_serial: Option<u64>,
    status: Arc<DecoderStatus>,
    stats: Arc<StatsCounters>,
}

impl Decoder {
    pub fn new(
        codec: Box<dyn Codec>,
        queue: Arc<PacketQueue>,
        control: Arc<ReadControl>,
        status: Arc<DecoderStatus>,
        stats: Arc<StatsCounters>,
    ) -> Self {
        Self {
            codec,
            queue,
            control,
            pending: None,
            pkt_serial: None,
            failed_serial: None,
            status,
            stats,
        }
    }

    /// Packet queue this decoder consumes.
    pub fn queue(&self) -> &Arc<PacketQueue> {
        &self.queue
    }

    /// Serial of the packet most recently taken from the queue.
    pub fn pkt_serial(&self) -> Option<u64> {
        self.pkt_serial
    }

    /// Produce the next frame, blocking on the packet queue as needed.
    pub fn decode_frame(&mut self) -> DecodeOutcome {
        let mut refused = false;
        loop {
            let current = self.queue.serial();
            if self.pkt_serial == Some(current) && self.failed_serial != self.pkt_serial {
                loop {
                    if self.queue.is_aborted() {
                        return DecodeOutcome::Aborted;
                    }
                    match self.codec.receive() {
                        Ok(CodecOutput::Frame(frame)) => {
                            self.stats.frame_decoded();
                            return DecodeOutcome::Frame(frame, current);
                        }
                        Ok(CodecOutput::NeedsInput) => {
                            if refused && self.pending.take().is_some() {
                                error!("codec refused input while holding no output, packet dropped");
                                self.stats.decode_error();
                            }
                            break;
                        }
                        Ok(CodecOutput::Drained) => {
                            debug!("decoder drained at serial {:?}", self.pkt_serial);
                            self.status.finish(self.pkt_serial);
                            self.codec.flush();
                            return DecodeOutcome::Finished;
                        }
                        Err(err) if err.is_transient() => {
                            warn!("skipping undecodable frame: {}", err);
                            self.stats.decode_error();
                            break;
                        }
                        Err(err) => return self.fail(err),
                    }
                }
            }

            let packet = match self.next_packet() {
                Some(packet) => packet,
                None => return DecodeOutcome::Aborted,
            };
            if self.failed_serial == self.pkt_serial {
                continue;
            }

            let payload = if packet.is_end_of_stream() {
                self.status.set_state(DecoderState::Draining);
                None
            } else {
                Some(&packet)
            };
            match self.codec.send(payload) {
                Ok(SendOutcome::Accepted) => {}
                Ok(SendOutcome::Full) => {
                    refused = true;
                    self.pending = Some(packet);
                }
                Err(err) if err.is_transient() => {
                    warn!("skipping corrupt packet at pos {:?}: {}", packet.pos, err);
                    self.stats.decode_error();
                }
                Err(err) => return self.fail(err),
            }
        }
    }

    /// Take the pending packet or the next queued one of the current serial.
    fn next_packet(&mut self) -> Option<Packet> {
        loop {
            if self.queue.nb_packets() == 0 {
                self.control.wake();
            }
            let packet = match self.pending.take() {
                Some(packet) => packet,
                None => {
                    let old_serial = self.pkt_serial;
                    let (packet, serial) = match self.queue.get(true) {
                        PacketGet::Packet(packet, serial) => (packet, serial),
                        PacketGet::Empty => continue,
                        PacketGet::Aborted => return None,
                    };
                    self.control.wake();
                    self.pkt_serial = Some(serial);
                    if old_serial != self.pkt_serial {
                        debug!("decoder serial {:?} -> {}", old_serial, serial);
                        self.codec.flush();
                        self.failed_serial = None;
                        self.status.restart();
                    }
                    packet
                }
            };
            if self.pkt_serial == Some(self.queue.serial()) {
                return Some(packet);
            }
            self.stats.stale_packet();
        }
    }

    fn fail(&mut self, err: CodecError) -> DecodeOutcome {
        error!("codec failed, finishing stream: {}", err);
        self.stats.decode_error();
        self.failed_serial = self.pkt_serial;
        self.pending = None;
        self.codec.flush();
        self.status.finish(self.pkt_serial);
        DecodeOutcome::Failed(err)
    }

    /// Move the decoder onto a named thread running `body`.
    pub fn start<F>(self, name: &'static str, body: F) -> Result<JoinHandle<()>>
    where
        F: FnOnce(Decoder) + Send + 'static,
    {
        thread::Builder::new()
            .name(name.to_string())
            .spawn(move || body(self))
            .map_err(|source| XPlayError::Thread { name, source })
    }
}
