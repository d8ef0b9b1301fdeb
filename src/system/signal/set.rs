use crate::{cutils::cerr, system::make_zeroed_sigaction};

use super::{handler, SignalNumber};

use std::{io, mem::MaybeUninit};

/// The possible OS-level behaviors for a signal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum SignalHandlerBehavior {
    /// Execute the default action for the signal.
    Default,
    /// Ignore the arrival of the signal.
    Ignore,
    /// Capture the arrival into the process-wide delivery queue.
    Deliver,
    /// Ask the cooperative host to stop, then fall back to the default action.
    StopHost,
}

#[repr(transparent)]
pub(crate) struct SignalAction {
    raw: libc::sigaction,
}

impl SignalAction {
    pub(crate) fn new(behavior: SignalHandlerBehavior) -> io::Result<Self> {
        // Interrupted system calls resume instead of failing with `EINTR`.
        let mut sa_flags = libc::SA_RESTART;

        // Only the delivery callback needs a full mask: nothing may interrupt it while it
        // appends to the queue.
        let (sa_sigaction, sa_mask) = match behavior {
            SignalHandlerBehavior::Default => (libc::SIG_DFL, SignalSet::empty()?),
            SignalHandlerBehavior::Ignore => (libc::SIG_IGN, SignalSet::empty()?),
            SignalHandlerBehavior::Deliver => (
                handler::deliver_signal as extern "C" fn(SignalNumber) as libc::sighandler_t,
                SignalSet::full()?,
            ),
            SignalHandlerBehavior::StopHost => {
                // The kernel restores `SIG_DFL` before running the handler, so a second
                // arrival terminates the process.
                sa_flags |= libc::SA_RESETHAND;
                (
                    handler::request_host_stop as extern "C" fn(SignalNumber)
                        as libc::sighandler_t,
                    SignalSet::empty()?,
                )
            }
        };

        let mut raw: libc::sigaction = make_zeroed_sigaction();
        raw.sa_sigaction = sa_sigaction;
        raw.sa_mask = sa_mask.raw;
        raw.sa_flags = sa_flags;

        Ok(Self { raw })
    }

    /// Install this action for `signal` and return the action that was replaced.
    pub(crate) fn register(&self, signal: SignalNumber) -> io::Result<Self> {
        let mut original_action = MaybeUninit::<Self>::zeroed();

        cerr(unsafe { libc::sigaction(signal, &self.raw, original_action.as_mut_ptr().cast()) })?;

        Ok(unsafe { original_action.assume_init() })
    }

    #[cfg(test)]
    /// Query the action currently installed for `signal` without changing it.
    pub(crate) fn current(signal: SignalNumber) -> io::Result<Self> {
        let mut action = MaybeUninit::<Self>::zeroed();

        cerr(unsafe { libc::sigaction(signal, std::ptr::null(), action.as_mut_ptr().cast()) })?;

        Ok(unsafe { action.assume_init() })
    }

    #[cfg(test)]
    /// Classify the raw handler of this action.
    pub(crate) fn behavior(&self) -> Option<SignalHandlerBehavior> {
        let deliver = handler::deliver_signal as extern "C" fn(SignalNumber) as libc::sighandler_t;
        let stop = handler::request_host_stop as extern "C" fn(SignalNumber) as libc::sighandler_t;

        match self.raw.sa_sigaction {
            libc::SIG_DFL => Some(SignalHandlerBehavior::Default),
            libc::SIG_IGN => Some(SignalHandlerBehavior::Ignore),
            handler if handler == deliver => Some(SignalHandlerBehavior::Deliver),
            handler if handler == stop => Some(SignalHandlerBehavior::StopHost),
            _ => None,
        }
    }
}

// A signal set that can be used to mask signals.
#[repr(transparent)]
pub(crate) struct SignalSet {
    raw: libc::sigset_t,
}

impl SignalSet {
    /// Create an empty set.
    pub(crate) fn empty() -> io::Result<Self> {
        let mut set = MaybeUninit::<Self>::zeroed();

        cerr(unsafe { libc::sigemptyset(set.as_mut_ptr().cast()) })?;

        Ok(unsafe { set.assume_init() })
    }

    /// Create a set containing all the signals.
    pub(crate) fn full() -> io::Result<Self> {
        let mut set = MaybeUninit::<Self>::zeroed();

        cerr(unsafe { libc::sigfillset(set.as_mut_ptr().cast()) })?;

        Ok(unsafe { set.assume_init() })
    }

    // `pthread_sigmask` returns the error number instead of setting `errno`.
    fn pthread_sigmask(&self, how: libc::c_int) -> io::Result<Self> {
        let mut original_set = MaybeUninit::<Self>::zeroed();

        let errno =
            unsafe { libc::pthread_sigmask(how, &self.raw, original_set.as_mut_ptr().cast()) };
        if errno != 0 {
            return Err(io::Error::from_raw_os_error(errno));
        }

        Ok(unsafe { original_set.assume_init() })
    }

    /// Block all the signals in this set for the calling thread and return the previous set of
    /// blocked signals.
    pub(crate) fn block(&self) -> io::Result<Self> {
        self.pthread_sigmask(libc::SIG_BLOCK)
    }

    /// Block exactly the signals in this set for the calling thread and return the previous set
    /// of blocked signals.
    pub(crate) fn set_mask(&self) -> io::Result<Self> {
        self.pthread_sigmask(libc::SIG_SETMASK)
    }

    #[cfg(test)]
    pub(crate) fn contains(&self, signal: SignalNumber) -> bool {
        unsafe { libc::sigismember(&self.raw, signal) == 1 }
    }
}

#[cfg(test)]
mod tests {
    use super::{SignalAction, SignalHandlerBehavior, SignalSet};
    use crate::system::signal::consts::*;

    #[test]
    fn full_and_empty_sets() {
        let full = SignalSet::full().unwrap();
        let empty = SignalSet::empty().unwrap();
        assert!(full.contains(SIGINT));
        assert!(full.contains(SIGUSR1));
        assert!(!empty.contains(SIGINT));
    }

    #[test]
    fn block_and_restore_mask() {
        let original = SignalSet::full().unwrap().block().unwrap();
        let blocked = SignalSet::empty().unwrap().block().unwrap();
        assert!(blocked.contains(SIGUSR2));
        original.set_mask().unwrap();
    }

    #[test]
    fn actions_know_their_behavior() {
        for behavior in [
            SignalHandlerBehavior::Default,
            SignalHandlerBehavior::Ignore,
            SignalHandlerBehavior::Deliver,
            SignalHandlerBehavior::StopHost,
        ] {
            let action = SignalAction::new(behavior).unwrap();
            assert_eq!(action.behavior(), Some(behavior));
        }
    }

    #[test]
    fn querying_does_not_change_the_action() {
        // SIGWINCH is ignored by default and no test installs anything for it.
        let before = SignalAction::current(SIGWINCH).unwrap();
        let after = SignalAction::current(SIGWINCH).unwrap();
        assert_eq!(before.behavior(), after.behavior());
    }
}
