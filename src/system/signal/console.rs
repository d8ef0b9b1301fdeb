//! Windows signal plumbing: console control events plus the C runtime signal table.
//!
//! Console events arrive on a thread created by the system. They are translated to signals and
//! fed to the delivery source with [`Origin::ConsoleEvent`](super::Origin::ConsoleEvent).
use std::{collections::BTreeMap, io, sync::atomic::Ordering};

use libc::sighandler_t;
use windows_sys::Win32::{
    Foundation::{BOOL, FALSE, TRUE},
    System::Console::{
        SetConsoleCtrlHandler, CTRL_BREAK_EVENT, CTRL_CLOSE_EVENT, CTRL_C_EVENT,
        CTRL_LOGOFF_EVENT, CTRL_SHUTDOWN_EVENT,
    },
};

use crate::{
    engine::{
        platform::{DELIVERY, HOST_STOP},
        source::SignalSource,
    },
    log::dev_warn,
};

use super::{
    consts::*,
    signal_fmt,
    subscription::{ConsoleState, Subscriptions},
    SignalEvent, SignalNumber,
};

const SIG_DFL: sighandler_t = 0;
const SIG_IGN: sighandler_t = 1;
const SIG_ERR: sighandler_t = !0;

/// Console events whose signal has a callback, and the ones that are swallowed.
static CONSOLE: Subscriptions = Subscriptions::new();

fn event_signal(ctrl_type: u32) -> Option<SignalNumber> {
    match ctrl_type {
        CTRL_C_EVENT => Some(SIGINT),
        CTRL_BREAK_EVENT => Some(SIGBREAK),
        CTRL_CLOSE_EVENT | CTRL_LOGOFF_EVENT | CTRL_SHUTDOWN_EVENT => Some(SIGTERM),
        _ => None,
    }
}

// Logoff and shutdown share the bit of the close event: all three mean SIGTERM.
fn signal_bit(signal: SignalNumber) -> Option<u32> {
    match signal {
        SIGINT => Some(1 << CTRL_C_EVENT),
        SIGBREAK => Some(1 << CTRL_BREAK_EVENT),
        SIGTERM => Some(1 << CTRL_CLOSE_EVENT),
        _ => None,
    }
}

unsafe extern "system" fn console_handler(ctrl_type: u32) -> BOOL {
    let Some(signal) = event_signal(ctrl_type) else {
        return FALSE;
    };
    let Some(bit) = signal_bit(signal) else {
        return FALSE;
    };

    let masks = CONSOLE.masks();
    if masks.ignored & bit != 0 {
        return TRUE;
    }
    if masks.subscribed & bit == 0 {
        // let the next handler in the chain, eventually the default one, have it
        return FALSE;
    }

    let _ = DELIVERY.deliver(SignalEvent::console(signal));
    TRUE
}

/// Update the masks for the console event of `signal`, registering the console handler when the
/// first event is taken over and unregistering it when the last one is given back.
fn set_console_state(signal: SignalNumber, state: ConsoleState) -> io::Result<()> {
    let Some(bit) = signal_bit(signal) else {
        return Ok(());
    };

    CONSOLE.set(bit, state, |active| {
        if unsafe { SetConsoleCtrlHandler(Some(console_handler), BOOL::from(active)) } == FALSE {
            return Err(io::Error::last_os_error());
        }
        Ok(())
    })
}

extern "C" fn crt_deliver(signal: SignalNumber) {
    // the C runtime resets the handler to SIG_DFL before calling it
    unsafe { libc::signal(signal, crt_deliver as extern "C" fn(SignalNumber) as sighandler_t) };
    let _ = DELIVERY.deliver(SignalEvent::native(signal));
}

extern "C" fn crt_request_host_stop(_signal: SignalNumber) {
    // left at SIG_DFL by the C runtime, so a second interrupt terminates
    HOST_STOP.store(true, Ordering::Release);
}

fn set_crt_handler(signal: SignalNumber, handler: sighandler_t) -> io::Result<sighandler_t> {
    let previous = unsafe { libc::signal(signal, handler) };
    if previous == SIG_ERR {
        return Err(io::Error::new(
            io::ErrorKind::InvalidInput,
            format!("{} is not supported by the C runtime", signal_fmt(signal)),
        ));
    }
    Ok(previous)
}

/// The C runtime handlers and console subscriptions changed through this process, and the
/// handlers they replaced.
#[derive(Default)]
pub(crate) struct CrtState {
    saved: BTreeMap<SignalNumber, sighandler_t>,
}

impl CrtState {
    fn set(
        &mut self,
        signal: SignalNumber,
        handler: sighandler_t,
        console: ConsoleState,
    ) -> io::Result<()> {
        let previous = set_crt_handler(signal, handler)?;
        if let Err(err) = set_console_state(signal, console) {
            let _ = set_crt_handler(signal, previous);
            return Err(err);
        }
        self.saved.entry(signal).or_insert(previous);
        Ok(())
    }

    pub(crate) fn install(&mut self, signal: SignalNumber) -> io::Result<()> {
        let handler = crt_deliver as extern "C" fn(SignalNumber) as sighandler_t;
        self.set(signal, handler, ConsoleState::Subscribed)
    }

    pub(crate) fn ignore(&mut self, signal: SignalNumber) -> io::Result<()> {
        self.set(signal, SIG_IGN, ConsoleState::Ignored)
    }

    pub(crate) fn uninstall(&mut self, signal: SignalNumber, stop_host: bool) -> io::Result<()> {
        let handler = if stop_host {
            crt_request_host_stop as extern "C" fn(SignalNumber) as sighandler_t
        } else {
            SIG_DFL
        };
        self.set(signal, handler, ConsoleState::Default)
    }

    pub(crate) fn restore(&mut self) {
        for (signal, handler) in std::mem::take(&mut self.saved) {
            if let Err(err) = set_console_state(signal, ConsoleState::Default) {
                dev_warn!("cannot release console events of {}: {err}", signal_fmt(signal));
            }
            if let Err(err) = set_crt_handler(signal, handler) {
                dev_warn!("cannot restore handler of {}: {err}", signal_fmt(signal));
            }
        }
    }
}

/// Send `signal` to the current process through the C runtime.
pub(crate) fn raise(signal: SignalNumber) -> io::Result<()> {
    if unsafe { libc::raise(signal) } != 0 {
        return Err(io::Error::new(
            io::ErrorKind::InvalidInput,
            format!("cannot raise {}", signal_fmt(signal)),
        ));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn console_events_map_to_signals() {
        assert_eq!(event_signal(CTRL_C_EVENT), Some(SIGINT));
        assert_eq!(event_signal(CTRL_BREAK_EVENT), Some(SIGBREAK));
        assert_eq!(event_signal(CTRL_CLOSE_EVENT), Some(SIGTERM));
        assert_eq!(event_signal(CTRL_LOGOFF_EVENT), Some(SIGTERM));
        assert_eq!(event_signal(CTRL_SHUTDOWN_EVENT), Some(SIGTERM));
        assert_eq!(event_signal(42), None);
    }

    #[test]
    fn only_console_signals_have_a_bit() {
        assert!(signal_bit(SIGINT).is_some());
        assert!(signal_bit(SIGBREAK).is_some());
        assert!(signal_bit(SIGTERM).is_some());
        assert_eq!(signal_bit(SIGFPE), None);
        assert_eq!(signal_bit(SIGABRT), None);
    }

    #[test]
    fn crt_state_tracks_console_subscriptions() {
        let int = signal_bit(SIGINT).unwrap();
        let brk = signal_bit(SIGBREAK).unwrap();
        let mut state = CrtState::default();

        state.install(SIGINT).unwrap();
        assert_eq!(CONSOLE.masks().subscribed, int);
        state.install(SIGBREAK).unwrap();
        assert_eq!(CONSOLE.masks().subscribed, int | brk);

        state.uninstall(SIGINT, false).unwrap();
        assert_eq!(CONSOLE.masks().subscribed, brk);
        assert!(CONSOLE.masks().is_active());

        state.ignore(SIGBREAK).unwrap();
        assert_eq!(CONSOLE.masks().subscribed, 0);
        assert_eq!(CONSOLE.masks().ignored, brk);

        state.restore();
        assert!(!CONSOLE.masks().is_active());
        assert!(state.saved.is_empty());
    }
}
