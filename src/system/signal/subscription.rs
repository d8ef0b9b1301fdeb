//! Bookkeeping for the console control handler.
//!
//! One handler serves every console event. It must be registered while at least one event is
//! subscribed or ignored, and removed once the last one is given back.
use std::{
    io,
    sync::atomic::{AtomicU32, Ordering},
};

/// What the process wants done with one console event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum ConsoleState {
    Subscribed,
    Ignored,
    Default,
}

/// Change to the handler registration required by a mask update.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum HandlerChange {
    Register,
    Unregister,
    Keep,
}

/// One bit per console event.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub(crate) struct ConsoleMasks {
    pub(crate) subscribed: u32,
    pub(crate) ignored: u32,
}

impl ConsoleMasks {
    pub(crate) fn is_active(self) -> bool {
        self.subscribed | self.ignored != 0
    }

    /// Put the event of `bit` in `state`.
    pub(crate) fn with(self, bit: u32, state: ConsoleState) -> (Self, HandlerChange) {
        let next = match state {
            ConsoleState::Subscribed => Self {
                subscribed: self.subscribed | bit,
                ignored: self.ignored & !bit,
            },
            ConsoleState::Ignored => Self {
                subscribed: self.subscribed & !bit,
                ignored: self.ignored | bit,
            },
            ConsoleState::Default => Self {
                subscribed: self.subscribed & !bit,
                ignored: self.ignored & !bit,
            },
        };

        let change = match (self.is_active(), next.is_active()) {
            (false, true) => HandlerChange::Register,
            (true, false) => HandlerChange::Unregister,
            _ => HandlerChange::Keep,
        };

        (next, change)
    }
}

/// The masks read by the console handler, shared with the thread the system runs it on.
pub(crate) struct Subscriptions {
    subscribed: AtomicU32,
    ignored: AtomicU32,
}

impl Subscriptions {
    pub(crate) const fn new() -> Self {
        Self {
            subscribed: AtomicU32::new(0),
            ignored: AtomicU32::new(0),
        }
    }

    pub(crate) fn masks(&self) -> ConsoleMasks {
        ConsoleMasks {
            subscribed: self.subscribed.load(Ordering::SeqCst),
            ignored: self.ignored.load(Ordering::SeqCst),
        }
    }

    fn store(&self, masks: ConsoleMasks) {
        self.subscribed.store(masks.subscribed, Ordering::SeqCst);
        self.ignored.store(masks.ignored, Ordering::SeqCst);
    }

    /// Move the event of `bit` to `state`, calling `register(true)` or `register(false)` when
    /// the handler has to be added or removed. The masks are left untouched if that fails.
    pub(crate) fn set(
        &self,
        bit: u32,
        state: ConsoleState,
        register: impl FnOnce(bool) -> io::Result<()>,
    ) -> io::Result<()> {
        let current = self.masks();
        let (next, change) = current.with(bit, state);

        // Masks are published before the handler is added and cleared before it is removed, so
        // the handler never sees a half-updated state.
        self.store(next);

        let result = match change {
            HandlerChange::Register => register(true),
            HandlerChange::Unregister => register(false),
            HandlerChange::Keep => Ok(()),
        };
        if result.is_err() {
            self.store(current);
        }

        result
    }
}
