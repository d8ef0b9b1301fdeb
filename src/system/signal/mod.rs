//! Utilities to handle signals.
use std::borrow::Cow;

use libc::c_int;

#[cfg(windows)]
pub(crate) mod console;
#[cfg(unix)]
pub(crate) mod handler;
#[cfg(unix)]
pub(crate) mod set;
#[cfg(unix)]
pub(crate) mod state;
#[cfg_attr(not(windows), allow(dead_code))]
pub(crate) mod subscription;

pub type SignalNumber = c_int;

/// Where a signal notification came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Origin {
    /// Delivered through the ordinary per-signal handler table.
    Native,
    /// Translated from a native console control event (Ctrl+C, Ctrl+Break, console close...).
    ConsoleEvent,
}

impl Origin {
    pub fn is_console_event(self) -> bool {
        matches!(self, Self::ConsoleEvent)
    }
}

/// A captured signal arrival, waiting to be dispatched at a safe point.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SignalEvent {
    signal: SignalNumber,
    origin: Origin,
}

impl SignalEvent {
    pub const fn new(signal: SignalNumber, origin: Origin) -> Self {
        Self { signal, origin }
    }

    pub const fn native(signal: SignalNumber) -> Self {
        Self::new(signal, Origin::Native)
    }

    pub const fn console(signal: SignalNumber) -> Self {
        Self::new(signal, Origin::ConsoleEvent)
    }

    /// Gets the signal number.
    pub fn signal(&self) -> SignalNumber {
        self.signal
    }

    pub fn origin(&self) -> Origin {
        self.origin
    }
}

macro_rules! define_consts {
    ($($signal:ident = $value:expr,)*) => {
        /// Symbolic names for the signals a host usually cares about.
        pub mod consts {
            use super::SignalNumber;

            $(pub const $signal: SignalNumber = $value;)*
        }

        /// Every named signal of this platform, in declaration order.
        pub const NAMED_SIGNALS: &[(&str, SignalNumber)] = &[
            $((stringify!($signal), consts::$signal),)*
        ];

        pub fn signal_name(signal: SignalNumber) -> Option<&'static str> {
            match signal {
                $(consts::$signal => Some(stringify!($signal)),)*
                _ => None,
            }
        }
    };
}

#[cfg(unix)]
define_consts! {
    SIGINT = libc::SIGINT,
    SIGQUIT = libc::SIGQUIT,
    SIGTSTP = libc::SIGTSTP,
    SIGTERM = libc::SIGTERM,
    SIGHUP = libc::SIGHUP,
    SIGALRM = libc::SIGALRM,
    SIGPIPE = libc::SIGPIPE,
    SIGUSR1 = libc::SIGUSR1,
    SIGUSR2 = libc::SIGUSR2,
    SIGCHLD = libc::SIGCHLD,
    SIGCONT = libc::SIGCONT,
    SIGWINCH = libc::SIGWINCH,
    SIGKILL = libc::SIGKILL,
    SIGSTOP = libc::SIGSTOP,
}

// The CRT only knows a handful of signals; KILL and PIPE keep their POSIX numbers so scripts
// can refer to them portably.
#[cfg(windows)]
define_consts! {
    SIGINT = libc::SIGINT,
    SIGILL = libc::SIGILL,
    SIGFPE = libc::SIGFPE,
    SIGSEGV = libc::SIGSEGV,
    SIGTERM = libc::SIGTERM,
    SIGBREAK = 21,
    SIGABRT = libc::SIGABRT,
    SIGKILL = 9,
    SIGPIPE = 13,
}

/// Signals whose action can never be changed.
#[cfg(unix)]
pub(crate) const FORBIDDEN: &[SignalNumber] = &[consts::SIGKILL, consts::SIGSTOP];
#[cfg(windows)]
pub(crate) const FORBIDDEN: &[SignalNumber] = &[consts::SIGKILL];

/// Name of a signal suitable for diagnostics.
pub fn signal_fmt(signal: SignalNumber) -> Cow<'static, str> {
    signal_name(signal)
        .map(|name| name.into())
        .unwrap_or_else(|| format!("unknown signal #{signal}").into())
}

/// Parse a signal given either by number or by name, with or without the `SIG` prefix.
pub fn parse_signal(input: &str) -> Option<SignalNumber> {
    if let Ok(number) = input.parse::<SignalNumber>() {
        return (number > 0).then_some(number);
    }

    let upper = input.to_ascii_uppercase();
    let name = if upper.starts_with("SIG") {
        upper
    } else {
        format!("SIG{upper}")
    };

    NAMED_SIGNALS
        .iter()
        .find(|(candidate, _)| *candidate == name)
        .map(|&(_, number)| number)
}
