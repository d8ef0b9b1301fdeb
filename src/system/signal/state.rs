use std::collections::BTreeMap;

use crate::log::dev_debug;

use super::{handler::restore_action, set::SignalAction, signal_fmt, SignalNumber};

/// The actions signals had before the engine first changed them.
#[derive(Default)]
pub(crate) struct SignalsState {
    saved: BTreeMap<SignalNumber, SignalAction>,
}

impl SignalsState {
    /// Record `original` as the pre-engine action for `signal`, unless one was recorded already.
    pub(crate) fn updated(&mut self, signal: SignalNumber, original: SignalAction) {
        self.saved.entry(signal).or_insert(original);
    }

    #[cfg(test)]
    pub(crate) fn is_saved(&self, signal: SignalNumber) -> bool {
        self.saved.contains_key(&signal)
    }

    /// Put back every saved action. Failures are logged and do not stop the others.
    pub(crate) fn restore(&mut self) {
        for (signal, action) in std::mem::take(&mut self.saved) {
            dev_debug!("restoring updated signal: {}", signal_fmt(signal));
            restore_action(signal, &action);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::SignalsState;
    use crate::system::signal::{
        handler::set_behavior,
        set::{SignalAction, SignalHandlerBehavior},
    };

    #[test]
    fn restore_puts_back_the_first_saved_action() {
        // the default action of SIGURG is to ignore it, and nothing else in the crate touches it
        use libc::SIGURG;

        let before = SignalAction::current(SIGURG).unwrap().behavior();

        let mut state = SignalsState::default();
        let original = set_behavior(SIGURG, SignalHandlerBehavior::Ignore).unwrap();
        state.updated(SIGURG, original);
        // a later change must not overwrite the pre-engine action
        let second = set_behavior(SIGURG, SignalHandlerBehavior::Ignore).unwrap();
        state.updated(SIGURG, second);
        assert!(state.is_saved(SIGURG));

        state.restore();
        assert!(!state.is_saved(SIGURG));
        assert_eq!(SignalAction::current(SIGURG).unwrap().behavior(), before);
    }
}
