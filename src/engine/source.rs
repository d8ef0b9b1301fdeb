use std::sync::{
    atomic::{AtomicBool, AtomicUsize, Ordering},
    Mutex, PoisonError,
};

use crate::system::signal::SignalEvent;

use super::queue::PendingQueue;

/// Where signal notifications are captured until the next safe point.
///
/// `deliver` is the only method that runs outside the cooperative context, either on an
/// interrupt context or on a thread created by the OS. It must not block on the cooperative
/// side, must not allocate and must never run user code.
pub trait SignalSource: Sync {
    /// Record the arrival of a signal. Returns `false` if the event was not queued directly.
    fn deliver(&self, event: SignalEvent) -> bool;

    /// Cheap check used by the scheduler before paying for a drain.
    fn is_pending(&self) -> bool;

    /// Move every captured event into `into`, oldest first. Returns how many were moved.
    fn drain(&self, into: &mut Vec<SignalEvent>) -> usize;

    /// Number of events dropped because the queue was full, since the last call.
    fn take_dropped(&self) -> usize;
}

/// Producer model where notifications interrupt the cooperative thread itself.
pub struct InterruptSource<const N: usize> {
    queue: PendingQueue<N>,
}

impl<const N: usize> InterruptSource<N> {
    pub const fn new() -> Self {
        Self {
            queue: PendingQueue::new(),
        }
    }
}

impl<const N: usize> Default for InterruptSource<N> {
    fn default() -> Self {
        Self::new()
    }
}

impl<const N: usize> SignalSource for InterruptSource<N> {
    fn deliver(&self, event: SignalEvent) -> bool {
        self.queue.enqueue(event)
    }

    fn is_pending(&self) -> bool {
        self.queue.is_pending()
    }

    #[cfg(unix)]
    fn drain(&self, into: &mut Vec<SignalEvent>) -> usize {
        use crate::{log::dev_warn, system::signal::set::SignalSet};

        // Signals arriving during the copy stay pending in the kernel and are appended once the
        // mask is lifted, instead of competing for the single parking slot. Handlers running on
        // other threads are kept out by the queue guard, so failing to mask is not fatal.
        let original_mask = match SignalSet::full().and_then(|set| set.block()) {
            Ok(mask) => Some(mask),
            Err(err) => {
                dev_warn!("cannot block signals while draining: {err}");
                None
            }
        };

        let count = self.queue.drain(into);

        if let Some(mask) = original_mask {
            if let Err(err) = mask.set_mask() {
                dev_warn!("cannot restore signal mask: {err}");
            }
        }

        count
    }

    #[cfg(not(unix))]
    fn drain(&self, into: &mut Vec<SignalEvent>) -> usize {
        self.queue.drain(into)
    }

    fn take_dropped(&self) -> usize {
        self.queue.take_dropped()
    }
}

struct Ring<const N: usize> {
    events: [SignalEvent; N],
    len: usize,
}

/// Producer model where notifications arrive on a separate OS thread, like console control
/// events on Windows. Producer and drainer share a real mutex.
pub struct ThreadSource<const N: usize> {
    ring: Mutex<Ring<N>>,
    pending: AtomicBool,
    dropped: AtomicUsize,
}

impl<const N: usize> ThreadSource<N> {
    pub const fn new() -> Self {
        Self {
            ring: Mutex::new(Ring {
                events: [SignalEvent::native(0); N],
                len: 0,
            }),
            pending: AtomicBool::new(false),
            dropped: AtomicUsize::new(0),
        }
    }
}

impl<const N: usize> Default for ThreadSource<N> {
    fn default() -> Self {
        Self::new()
    }
}

impl<const N: usize> SignalSource for ThreadSource<N> {
    fn deliver(&self, event: SignalEvent) -> bool {
        // A panic while holding the lock cannot leave the ring inconsistent: `len` is only
        // bumped after the slot is written.
        let mut ring = self.ring.lock().unwrap_or_else(PoisonError::into_inner);
        if ring.len == N {
            self.dropped.fetch_add(1, Ordering::Relaxed);
            return false;
        }

        let len = ring.len;
        ring.events[len] = event;
        ring.len = len + 1;
        self.pending.store(true, Ordering::Release);
        true
    }

    fn is_pending(&self) -> bool {
        self.pending.load(Ordering::Acquire)
    }

    fn drain(&self, into: &mut Vec<SignalEvent>) -> usize {
        let mut ring = self.ring.lock().unwrap_or_else(PoisonError::into_inner);
        let count = ring.len;
        into.extend_from_slice(&ring.events[..count]);
        ring.len = 0;
        self.pending.store(false, Ordering::Release);
        count
    }

    fn take_dropped(&self) -> usize {
        self.dropped.swap(0, Ordering::Relaxed)
    }
}

#[cfg(all(test, unix))]
mod tests {
    use std::sync::Arc;

    use pretty_assertions::assert_eq;

    use super::{InterruptSource, SignalSource, ThreadSource};
    use crate::system::signal::{consts::*, SignalEvent};

    fn exercise(source: &dyn SignalSource) {
        assert!(!source.is_pending());
        assert!(source.deliver(SignalEvent::native(SIGINT)));
        assert!(source.deliver(SignalEvent::console(SIGTERM)));
        assert!(source.deliver(SignalEvent::native(SIGHUP)));
        assert!(!source.deliver(SignalEvent::native(SIGPIPE)));
        assert!(source.is_pending());

        let mut events = Vec::new();
        assert_eq!(source.drain(&mut events), 3);
        assert_eq!(
            events,
            vec![
                SignalEvent::native(SIGINT),
                SignalEvent::console(SIGTERM),
                SignalEvent::native(SIGHUP),
            ]
        );
        assert!(!source.is_pending());
        assert_eq!(source.take_dropped(), 1);
    }

    #[test]
    fn interrupt_source_is_a_bounded_fifo() {
        exercise(&InterruptSource::<3>::new());
    }

    #[test]
    fn thread_source_is_a_bounded_fifo() {
        exercise(&ThreadSource::<3>::new());
    }

    #[test]
    fn thread_source_accepts_a_foreign_producer() {
        const SENT: i32 = 2000;
        let source = Arc::new(ThreadSource::<8>::new());

        // a full ring turns the event away, so the producer retries until it is taken
        let producer = {
            let source = Arc::clone(&source);
            std::thread::spawn(move || {
                let mut refused = 0;
                for seq in 1..=SENT {
                    while !source.deliver(SignalEvent::console(seq)) {
                        refused += 1;
                        std::thread::yield_now();
                    }
                }
                refused
            })
        };

        let mut events = Vec::new();
        while !producer.is_finished() {
            source.drain(&mut events);
        }
        let refused = producer.join().unwrap();
        source.drain(&mut events);

        let expected: Vec<_> = (1..=SENT).map(SignalEvent::console).collect();
        assert_eq!(events, expected);
        assert_eq!(source.take_dropped(), refused);
        assert!(!source.is_pending());
    }

    #[test]
    fn draining_restores_the_signal_mask() {
        use crate::system::signal::set::SignalSet;

        let source = InterruptSource::<4>::new();
        source.deliver(SignalEvent::native(SIGUSR1));

        let before = SignalSet::empty().unwrap().block().unwrap();
        let mut events = Vec::new();
        source.drain(&mut events);
        let after = SignalSet::empty().unwrap().block().unwrap();

        assert_eq!(before.contains(SIGUSR2), after.contains(SIGUSR2));
        assert_eq!(events, vec![SignalEvent::native(SIGUSR1)]);
    }
}
