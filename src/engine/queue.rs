//! A bounded FIFO of signal events that can be written from a signal handler.
//!
//! Writers and the drainer coordinate through a single guard word instead of a lock, so a
//! handler never waits for the code it interrupted. A writer that finds the guard taken parks its
//! event in a one-slot "last pending" indicator; whoever holds the guard moves that event into the
//! queue before letting go of it. When several writers are parked at once only the newest
//! survives, but the queue order never changes.
use std::{
    hint,
    sync::atomic::{AtomicBool, AtomicI32, AtomicU8, AtomicUsize, Ordering::*},
};

use crate::system::signal::{Origin, SignalEvent};

const IDLE: u8 = 0;
const WRITING: u8 = 1;
const DRAINING: u8 = 2;

/// Packed representation of "no event". Signal numbers are positive, so no event packs to it.
const EMPTY: i32 = 0;

#[allow(clippy::declare_interior_mutable_const)]
const EMPTY_SLOT: AtomicI32 = AtomicI32::new(EMPTY);

// Signal and origin share one atomic so a slot can never be observed half written.
fn pack(event: SignalEvent) -> i32 {
    (event.signal() << 1) | i32::from(event.origin().is_console_event())
}

fn unpack(packed: i32) -> SignalEvent {
    let origin = if packed & 1 == 1 {
        Origin::ConsoleEvent
    } else {
        Origin::Native
    };
    SignalEvent::new(packed >> 1, origin)
}

pub struct PendingQueue<const N: usize> {
    slots: [AtomicI32; N],
    count: AtomicUsize,
    pending: AtomicBool,
    guard: AtomicU8,
    deferred: AtomicI32,
    dropped: AtomicUsize,
}

impl<const N: usize> PendingQueue<N> {
    pub const fn new() -> Self {
        Self {
            slots: [EMPTY_SLOT; N],
            count: AtomicUsize::new(0),
            pending: AtomicBool::new(false),
            guard: AtomicU8::new(IDLE),
            deferred: AtomicI32::new(EMPTY),
            dropped: AtomicUsize::new(0),
        }
    }

    /// Append `event`. Async-signal-safe: never blocks and never allocates.
    ///
    /// Returns `false` if the event did not go straight into the queue, either because the queue
    /// is full (the event is dropped) or because another context holds the queue (the event is
    /// parked and moved in by that context).
    pub fn enqueue(&self, event: SignalEvent) -> bool {
        if !self.try_acquire(WRITING) {
            self.park(event);
            return false;
        }

        self.flush_deferred();
        let accepted = self.push(event);
        self.release();

        accepted
    }

    /// Copy every queued event into `into`, oldest first, and empty the queue.
    ///
    /// Must only be called from the cooperative side. Spins while a writer on another thread is
    /// in the middle of an append; appends are a handful of stores.
    pub fn drain(&self, into: &mut Vec<SignalEvent>) -> usize {
        while !self.try_acquire(DRAINING) {
            hint::spin_loop();
        }

        self.flush_deferred();
        let count = self.count.load(Acquire);
        into.reserve(count);
        into.extend(self.slots[..count].iter().map(|slot| unpack(slot.load(Relaxed))));

        self.count.store(0, Release);
        self.pending.store(false, SeqCst);

        self.flush_deferred();
        self.release();

        count
    }

    /// Cheap check for the scheduler: has anything arrived since the last drain?
    pub fn is_pending(&self) -> bool {
        self.pending.load(SeqCst)
    }

    pub fn len(&self) -> usize {
        self.count.load(Acquire)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Number of events dropped because the queue was full, since the last call.
    pub fn take_dropped(&self) -> usize {
        self.dropped.swap(0, Relaxed)
    }

    fn try_acquire(&self, state: u8) -> bool {
        self.guard
            .compare_exchange(IDLE, state, SeqCst, Relaxed)
            .is_ok()
    }

    fn park(&self, event: SignalEvent) {
        self.deferred.store(pack(event), SeqCst);
        self.pending.store(true, SeqCst);
    }

    // Callers must hold the guard.
    fn push(&self, event: SignalEvent) -> bool {
        let count = self.count.load(Relaxed);
        if count == N {
            self.dropped.fetch_add(1, Relaxed);
            return false;
        }

        self.slots[count].store(pack(event), Relaxed);
        self.count.store(count + 1, Release);
        self.pending.store(true, SeqCst);
        true
    }

    // Callers must hold the guard.
    fn flush_deferred(&self) {
        let packed = self.deferred.swap(EMPTY, SeqCst);
        if packed != EMPTY {
            self.push(unpack(packed));
        }
    }

    fn release(&self) {
        loop {
            self.guard.store(IDLE, SeqCst);

            // Something was parked while we held the guard. If somebody else grabbed the guard
            // in the meantime they will move it in; otherwise it is our job.
            if self.deferred.load(SeqCst) == EMPTY || !self.try_acquire(WRITING) {
                return;
            }
            self.flush_deferred();
        }
    }
}

impl<const N: usize> Default for PendingQueue<N> {
    fn default() -> Self {
        Self::new()
    }
}
