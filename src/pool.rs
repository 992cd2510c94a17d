//! Fixed transaction pool and ownership queues.
//!
//! The pool is an array-backed transaction table plus three index FIFOs.
//! Every transaction buffer is allocated once at startup and cycles between
//! the queues forever; moving a transaction is an O(1) index relink. The
//! pool itself is not synchronized - the pipeline context wraps it in a
//! short mutex shared by the completion handlers and the worker.

use std::collections::VecDeque;

/// Identifies one transaction slot in the pool.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub(crate) struct SlotId(pub(crate) usize);

impl SlotId {
    pub(crate) fn index(self) -> usize {
        self.0
    }
}

/// Queue a transaction currently belongs to. Exactly one at any instant.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Ownership {
    CaptureReady,
    Pending,
    PlaybackReady,
}

/// One buffer-backed transaction record.
pub(crate) struct Slot {
    /// Fixed-capacity sample buffer. Taken out (pointer swap) during
    /// treatment and restored before the transaction is relinked.
    pub buf: Box<[u8]>,
    /// Valid data length in bytes.
    pub len: usize,
    /// Sequence tag stamped when the transaction enters Pending-Treatment.
    pub seq: u64,
    pub owner: Ownership,
}

/// Snapshot of queue populations.
///
/// The conservation invariant says `total()` equals the pool size in every
/// reachable state: transactions are never created, freed, or duplicated.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PoolCensus {
    /// Transactions available for the hardware to fill.
    pub capture_ready: usize,
    /// Filled transactions awaiting encode and dispatch.
    pub pending: usize,
    /// Transactions holding data queued for hardware output.
    pub playback_ready: usize,
}

impl PoolCensus {
    /// Sum over all three queues.
    #[must_use]
    pub fn total(&self) -> usize {
        self.capture_ready + self.pending + self.playback_ready
    }
}

pub(crate) struct TransactionPool {
    slots: Vec<Slot>,
    capture_ready: VecDeque<SlotId>,
    pending: VecDeque<SlotId>,
    playback_ready: VecDeque<SlotId>,
    /// Transaction currently on the hardware output. It stays at the head
    /// of `playback_ready` while playing; `None` on the first period and
    /// during underruns.
    pub playing: Option<SlotId>,
    next_seq: u64,
}

impl TransactionPool {
    /// Allocates `pool_size` transactions of `buffer_bytes` each and splits
    /// them between the two ready queues so both hardware directions can
    /// start immediately.
    pub fn new(pool_size: usize, buffer_bytes: usize) -> Self {
        let mut slots = Vec::with_capacity(pool_size);
        let mut capture_ready = VecDeque::with_capacity(pool_size);
        let mut playback_ready = VecDeque::with_capacity(pool_size);

        let capture_half = pool_size.div_ceil(2);
        for k in 0..pool_size {
            let owner = if k < capture_half {
                Ownership::CaptureReady
            } else {
                Ownership::PlaybackReady
            };
            slots.push(Slot {
                buf: vec![0u8; buffer_bytes].into_boxed_slice(),
                len: buffer_bytes,
                seq: 0,
                owner,
            });
            if k < capture_half {
                capture_ready.push_back(SlotId(k));
            } else {
                playback_ready.push_back(SlotId(k));
            }
        }

        Self {
            slots,
            capture_ready,
            pending: VecDeque::with_capacity(pool_size),
            playback_ready,
            playing: None,
            next_seq: 0,
        }
    }

    pub fn capacity(&self) -> usize {
        self.slots.len()
    }

    pub fn slot(&self, id: SlotId) -> &Slot {
        &self.slots[id.index()]
    }

    pub fn slot_mut(&mut self, id: SlotId) -> &mut Slot {
        &mut self.slots[id.index()]
    }

    /// Removes the head of Capture-Ready (the transaction the hardware was
    /// filling). `None` means the pool is starved.
    pub fn pop_capture_ready(&mut self) -> Option<SlotId> {
        let id = self.capture_ready.pop_front()?;
        debug_assert_eq!(self.slots[id.index()].owner, Ownership::CaptureReady);
        Some(id)
    }

    /// Appends a recycled transaction to Capture-Ready.
    pub fn push_capture_ready(&mut self, id: SlotId) {
        self.slots[id.index()].owner = Ownership::CaptureReady;
        self.capture_ready.push_back(id);
    }

    /// Stamps the next sequence tag and appends to Pending-Treatment.
    /// Returns the tag.
    pub fn push_pending(&mut self, id: SlotId) -> u64 {
        let seq = self.next_seq;
        self.next_seq += 1;
        let slot = &mut self.slots[id.index()];
        slot.seq = seq;
        slot.owner = Ownership::Pending;
        self.pending.push_back(id);
        seq
    }

    /// Head of Pending-Treatment without removing it.
    pub fn pending_head(&self) -> Option<SlotId> {
        self.pending.front().copied()
    }

    /// Removes the head of Pending-Treatment, which must be `id`.
    pub fn pop_pending(&mut self, id: SlotId) {
        let head = self.pending.pop_front();
        debug_assert_eq!(head, Some(id));
        debug_assert_eq!(self.slots[id.index()].owner, Ownership::Pending);
    }

    /// Appends a treated transaction to Playback-Ready.
    pub fn push_playback_ready(&mut self, id: SlotId) {
        self.slots[id.index()].owner = Ownership::PlaybackReady;
        self.playback_ready.push_back(id);
    }

    /// Head of Playback-Ready (the block the hardware plays next) without
    /// removing it.
    pub fn playback_head(&self) -> Option<SlotId> {
        self.playback_ready.front().copied()
    }

    /// Removes the head of Playback-Ready, which must be `id`.
    pub fn pop_playback_ready(&mut self, id: SlotId) {
        let head = self.playback_ready.pop_front();
        debug_assert_eq!(head, Some(id));
        debug_assert_eq!(self.slots[id.index()].owner, Ownership::PlaybackReady);
    }

    pub fn census(&self) -> PoolCensus {
        PoolCensus {
            capture_ready: self.capture_ready.len(),
            pending: self.pending.len(),
            playback_ready: self.playback_ready.len(),
        }
    }
}
