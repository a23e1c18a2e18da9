//! Fixed-capacity ring of decoded frames.
//!
//! One decode thread produces, one render caller consumes. With `keep_last`
//! the most recently shown frame stays in its slot (`rindex_shown`) until the
//! following frame is shown, so a displayable picture exists even when the
//! decoder stalls.
//!
//! Abort is observed through the packet queue feeding the producer; callers
//! abort that queue and then call [`FrameQueue::signal`].

use std::sync::Arc;

use parking_lot::{Condvar, Mutex};

use super::Frame;
use crate::packet::PacketQueue;
use crate::settings::FRAME_QUEUE_SIZE;

struct RingState {
    slots: Vec<Option<Frame>>,
    rindex: usize,
    windex: usize,
    size: usize,
    rindex_shown: usize,
}

impl RingState {
    fn remaining(&self) -> usize {
        self.size - self.rindex_shown
    }
}

/// Frame ring buffer between a decoder and the scheduler.
pub struct FrameQueue {
    state: Mutex<RingState>,
    readable: Condvar,
    writable: Condvar,
    max_size: usize,
    keep_last: bool,
    pktq: Arc<PacketQueue>,
}

/// Exclusive handle on the slot at the write index.
///
/// The slot stays invisible to readers until [`WritableSlot::push`] commits it.
pub struct WritableSlot<'a> {
    queue: &'a FrameQueue,
    index: usize,
}

impl WritableSlot<'_> {
    /// Ring index this slot will occupy.
    pub fn index(&self) -> usize {
        self.index
    }

    /// Store `frame` and publish it to the reader.
    pub fn push(self, frame: Frame) {
        self.queue.push(self.index, frame);
    }
}

impl FrameQueue {
    /// Create a queue with `max_size` slots (clamped to `1..=16`).
    pub fn new(pktq: Arc<PacketQueue>, max_size: usize, keep_last: bool) -> Self {
        let max_size = max_size.clamp(1, FRAME_QUEUE_SIZE);
        Self {
            state: Mutex::new(RingState {
                slots: vec![None; max_size],
                rindex: 0,
                windex: 0,
                size: 0,
                rindex_shown: 0,
            }),
            readable: Condvar::new(),
            writable: Condvar::new(),
            max_size,
            keep_last,
            pktq,
        }
    }

    /// Number of slots, including the retained last frame.
    pub fn capacity(&self) -> usize {
        self.max_size
    }

    /// Wake every waiter so it can observe an abort.
    pub fn signal(&self) {
        let _state = self.state.lock();
        self.readable.notify_all();
        self.writable.notify_all();
    }

    /// Next frame to show.
    pub fn peek(&self) -> Option<Frame> {
        let state = self.state.lock();
        if state.remaining() == 0 {
            return None;
        }
        state.slots[(state.rindex + state.rindex_shown) % self.max_size].clone()
    }

    /// Frame after the next one.
    pub fn peek_next(&self) -> Option<Frame> {
        let state = self.state.lock();
        if state.remaining() < 2 {
            return None;
        }
        state.slots[(state.rindex + state.rindex_shown + 1) % self.max_size].clone()
    }

    /// Most recently shown frame, retained by `keep_last`.
    pub fn peek_last(&self) -> Option<Frame> {
        let state = self.state.lock();
        if state.rindex_shown == 0 {
            return None;
        }
        state.slots[state.rindex].clone()
    }

    /// Wait for a free slot. Returns `None` once the packet queue is aborted.
    pub fn peek_writable(&self) -> Option<WritableSlot<'_>> {
        let mut state = self.state.lock();
        while state.size >= self.max_size && !self.pktq.is_aborted() {
            self.writable.wait(&mut state);
        }
        if self.pktq.is_aborted() {
            return None;
        }
        Some(WritableSlot {
            queue: self,
            index: state.windex,
        })
    }

    /// Wait for a frame to show. Returns `None` once the packet queue is aborted.
    pub fn peek_readable(&self) -> Option<Frame> {
        let mut state = self.state.lock();
        while state.remaining() == 0 && !self.pktq.is_aborted() {
            self.readable.wait(&mut state);
        }
        if self.pktq.is_aborted() {
            return None;
        }
        state.slots[(state.rindex + state.rindex_shown) % self.max_size].clone()
    }

    fn push(&self, index: usize, frame: Frame) {
        let mut state = self.state.lock();
        debug_assert_eq!(index, state.windex, "single producer owns the write index");
        debug_assert!(state.size < self.max_size);
        state.slots[index] = Some(frame);
        state.windex = (state.windex + 1) % self.max_size;
        state.size += 1;
        self.readable.notify_one();
    }

    /// Retire the frame that was just shown.
    pub fn next(&self) {
        let mut state = self.state.lock();
        if state.size == 0 {
            return;
        }
        if self.keep_last && state.rindex_shown == 0 {
            state.rindex_shown = 1;
            return;
        }
        let rindex = state.rindex;
        state.slots[rindex] = None;
        state.rindex = (rindex + 1) % self.max_size;
        state.size -= 1;
        self.writable.notify_one();
    }

    /// Frames not yet shown.
    pub fn nb_remaining(&self) -> usize {
        self.state.lock().remaining()
    }

    /// Source position of the last shown frame, if it is still current.
    pub fn last_pos(&self) -> Option<u64> {
        let state = self.state.lock();
        if state.rindex_shown == 0 {
            return None;
        }
        let frame = state.slots[state.rindex].as_ref()?;
        if frame.serial == self.pktq.serial() {
            frame.pos
        } else {
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::frame::Picture;
    use std::sync::mpsc;
    use std::thread;
    use std::time::Duration;

    fn frame(pts: f64) -> Frame {
        Frame::new(
            Picture {
                width: 1,
                height: 1,
                data: vec![0],
            },
            1,
            Some(pts),
            0.04,
        )
    }

    fn queue(max_size: usize, keep_last: bool) -> (Arc<PacketQueue>, FrameQueue) {
        let pktq = Arc::new(PacketQueue::new());
        let frames = FrameQueue::new(pktq.clone(), max_size, keep_last);
        (pktq, frames)
    }

    #[test]
    fn capacity_is_clamped() {
        let (_, frames) = queue(64, true);
        assert_eq!(frames.capacity(), FRAME_QUEUE_SIZE);
        let (_, frames) = queue(0, false);
        assert_eq!(frames.capacity(), 1);
    }

    #[test]
    fn frames_come_out_in_push_order() {
        let (_, frames) = queue(4, false);
        for pts in [0.0, 1.0, 2.0] {
            frames.peek_writable().unwrap().push(frame(pts));
        }
        assert_eq!(frames.nb_remaining(), 3);
        assert_eq!(frames.peek().unwrap().pts, Some(0.0));
        assert_eq!(frames.peek_next().unwrap().pts, Some(1.0));
        frames.next();
        assert_eq!(frames.peek().unwrap().pts, Some(1.0));
        assert!(frames.peek_last().is_none());
    }

    #[test]
    fn keep_last_retains_shown_frame() {
        let (_, frames) = queue(3, true);
        frames.peek_writable().unwrap().push(frame(0.0));
        assert!(frames.peek_last().is_none());

        frames.next();
        assert_eq!(frames.nb_remaining(), 0);
        assert!(frames.peek().is_none());
        assert_eq!(frames.peek_last().unwrap().pts, Some(0.0));

        frames.peek_writable().unwrap().push(frame(1.0));
        frames.next();
        assert_eq!(frames.peek_last().unwrap().pts, Some(1.0));
        assert_eq!(frames.nb_remaining(), 0);
    }

    #[test]
    fn writable_slot_is_not_readable_before_push() {
        let (_, frames) = queue(2, false);
        let slot = frames.peek_writable().unwrap();
        assert_eq!(slot.index(), 0);
        assert_eq!(frames.nb_remaining(), 0);
        assert!(frames.peek().is_none());
        slot.push(frame(5.0));
        assert_eq!(frames.peek().unwrap().pts, Some(5.0));
    }

    #[test]
    fn producer_blocks_until_consumer_advances() {
        let (_, frames) = queue(2, false);
        let frames = Arc::new(frames);
        frames.peek_writable().unwrap().push(frame(0.0));
        frames.peek_writable().unwrap().push(frame(1.0));

        let (tx, rx) = mpsc::channel();
        let producer = {
            let frames = frames.clone();
            thread::spawn(move || {
                let slot = frames.peek_writable().unwrap();
                tx.send(()).unwrap();
                slot.push(frame(2.0));
            })
        };

        assert!(rx.recv_timeout(Duration::from_millis(50)).is_err());
        frames.next();
        rx.recv_timeout(Duration::from_secs(2)).unwrap();
        producer.join().unwrap();
        assert_eq!(frames.nb_remaining(), 2);
    }

    #[test]
    fn count_never_exceeds_capacity() {
        let (_, frames) = queue(3, true);
        let frames = Arc::new(frames);
        let producer = {
            let frames = frames.clone();
            thread::spawn(move || {
                for i in 0..50 {
                    frames.peek_writable().unwrap().push(frame(i as f64));
                }
            })
        };

        let mut seen = Vec::new();
        while seen.len() < 50 {
            let readable = frames.peek_readable().unwrap();
            assert!(frames.nb_remaining() <= frames.capacity());
            seen.push(readable.pts.unwrap());
            frames.next();
        }
        producer.join().unwrap();
        let expected: Vec<f64> = (0..50).map(|i| i as f64).collect();
        assert_eq!(seen, expected);
    }

    #[test]
    fn abort_releases_producer_and_consumer() {
        let (pktq, frames) = queue(1, false);
        let frames = Arc::new(frames);
        frames.peek_writable().unwrap().push(frame(0.0));

        let empty = Arc::new(FrameQueue::new(pktq.clone(), 2, false));
        let producer = {
            let frames = frames.clone();
            thread::spawn(move || frames.peek_writable().is_none())
        };
        let consumer = {
            let empty = empty.clone();
            thread::spawn(move || empty.peek_readable().is_none())
        };

        thread::sleep(Duration::from_millis(20));
        pktq.abort();
        frames.signal();
        empty.signal();
        assert!(producer.join().unwrap());
        assert!(consumer.join().unwrap());
        assert!(frames.peek_writable().is_none());
    }

    #[test]
    fn last_pos_requires_current_serial() {
        let (pktq, frames) = queue(3, true);
        frames
            .peek_writable()
            .unwrap()
            .push(frame(0.0).with_pos(Some(4096)));
        assert_eq!(frames.last_pos(), None);
        frames.next();
        assert_eq!(frames.last_pos(), Some(4096));
        pktq.put_flush();
        assert_eq!(frames.last_pos(), None);
    }
}
