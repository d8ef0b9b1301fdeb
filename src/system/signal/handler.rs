use std::{io, sync::atomic::Ordering};

use crate::{
    cutils::ErrnoGuard,
    engine::{
        platform::{DELIVERY, HOST_STOP},
        source::SignalSource,
    },
    log::dev_warn,
};

use super::{
    set::{SignalAction, SignalHandlerBehavior},
    signal_fmt, SignalEvent, SignalNumber,
};

/// The function registered with `sigaction` for every handled signal.
///
/// Runs on an interrupt context: it only touches the lock-free delivery queue.
pub(crate) extern "C" fn deliver_signal(signal: SignalNumber) {
    let _errno = ErrnoGuard::save();
    // A full queue drops the event; there is nobody to report it to.
    let _ = DELIVERY.deliver(SignalEvent::native(signal));
}

/// Interactive-interrupt fallback installed by [`InterruptPolicy::StopHost`].
///
/// [`InterruptPolicy::StopHost`]: crate::engine::InterruptPolicy::StopHost
pub(crate) extern "C" fn request_host_stop(_signal: SignalNumber) {
    HOST_STOP.store(true, Ordering::Release);
}

/// Change the action for `signal` and return the action it replaced.
pub(crate) fn set_behavior(
    signal: SignalNumber,
    behavior: SignalHandlerBehavior,
) -> io::Result<SignalAction> {
    SignalAction::new(behavior)?.register(signal)
}

/// Restore an action previously returned by [`set_behavior`].
pub(crate) fn restore_action(signal: SignalNumber, action: &SignalAction) {
    if let Err(err) = action.register(signal) {
        dev_warn!(
            "cannot restore original action for {}: {err}",
            signal_fmt(signal),
        )
    }
}

/// Send `signal` to the calling thread. The handler, if any, has run when this returns.
pub(crate) fn raise(signal: SignalNumber) -> io::Result<()> {
    // `raise` reports failure with any non-zero value, not only -1.
    if unsafe { libc::raise(signal) } != 0 {
        return Err(io::Error::last_os_error());
    }
    Ok(())
}
