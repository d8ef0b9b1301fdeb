use std::{collections::BTreeMap, fmt, rc::Rc};

use crate::system::signal::{signal_fmt, SignalNumber};

/// Error a signal callback may report. It is logged, never propagated.
pub type HandlerError = Box<dyn std::error::Error>;

/// A signal callback: receives the signal number and whether the signal originated from a
/// native console event.
pub type Callback = Rc<dyn Fn(SignalNumber, bool) -> Result<(), HandlerError>>;

/// What [`SignalEngine::handle`](super::SignalEngine::handle) should do with a signal.
#[derive(Clone)]
pub enum Action {
    /// Run the callback at the next safe point after each arrival.
    Call(Callback),
    /// Have the OS discard arrivals.
    Ignore,
}

/// Requests "ignore" semantics through the same entry point as a callback.
pub const IGNORE_MARKER: Action = Action::Ignore;

/// Wrap a closure into a [`Callback`].
pub fn new_callback<F>(callback: F) -> Callback
where
    F: Fn(SignalNumber, bool) -> Result<(), HandlerError> + 'static,
{
    Rc::new(callback)
}

impl Action {
    pub fn call<F>(callback: F) -> Self
    where
        F: Fn(SignalNumber, bool) -> Result<(), HandlerError> + 'static,
    {
        Self::Call(new_callback(callback))
    }
}

impl fmt::Debug for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Action::Call(_) => f.write_str("Call(..)"),
            Action::Ignore => f.write_str("Ignore"),
        }
    }
}

/// The state of a signal as seen by the engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Disposition {
    Unset,
    Handled,
    Ignored,
}

enum Entry {
    Call(Callback),
    Ignored,
}

/// Signal number to callback mapping. Lives on the cooperative thread only.
#[derive(Default)]
pub(crate) struct HandlerRegistry {
    entries: BTreeMap<SignalNumber, Entry>,
}

impl HandlerRegistry {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn set_callback(&mut self, signal: SignalNumber, callback: Callback) {
        self.entries.insert(signal, Entry::Call(callback));
    }

    /// Mark `signal` as ignored, dropping any callback it had.
    pub(crate) fn set_ignored(&mut self, signal: SignalNumber) {
        self.entries.insert(signal, Entry::Ignored);
    }

    pub(crate) fn remove(&mut self, signal: SignalNumber) {
        self.entries.remove(&signal);
    }

    pub(crate) fn callback(&self, signal: SignalNumber) -> Option<Callback> {
        match self.entries.get(&signal)? {
            Entry::Call(callback) => Some(Rc::clone(callback)),
            Entry::Ignored => None,
        }
    }

    pub(crate) fn disposition(&self, signal: SignalNumber) -> Disposition {
        match self.entries.get(&signal) {
            None => Disposition::Unset,
            Some(Entry::Call(_)) => Disposition::Handled,
            Some(Entry::Ignored) => Disposition::Ignored,
        }
    }

    /// A copy of the signal to callback mapping. Ignored signals have no callback and are left
    /// out.
    pub(crate) fn snapshot(&self) -> BTreeMap<SignalNumber, Callback> {
        self.entries
            .iter()
            .filter_map(|(&signal, entry)| match entry {
                Entry::Call(callback) => Some((signal, Rc::clone(callback))),
                Entry::Ignored => None,
            })
            .collect()
    }
}

impl fmt::Debug for HandlerRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_map()
            .entries(self.entries.iter().map(|(&signal, entry)| {
                let state = match entry {
                    Entry::Call(_) => Disposition::Handled,
                    Entry::Ignored => Disposition::Ignored,
                };
                (signal_fmt(signal), state)
            }))
            .finish()
    }
}
