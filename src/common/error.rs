use std::{fmt, io};

use crate::system::signal::{signal_fmt, SignalNumber};

/// The OS call an [`Error::Platform`] originated from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operation {
    Install,
    Ignore,
    Uninstall,
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Operation::Install => "set signal handler",
            Operation::Ignore => "ignore signal",
            Operation::Uninstall => "reset signal handler",
        })
    }
}

#[derive(Debug)]
pub enum Error {
    Platform {
        signal: SignalNumber,
        operation: Operation,
        source: io::Error,
    },
    Forbidden(SignalNumber),
    AlreadyInitialized,
    InvalidDuration(f64),
    Io(io::Error),
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::Platform {
                signal,
                operation,
                source,
            } => write!(
                f,
                "failed to {operation} for {}: {source}",
                signal_fmt(*signal)
            ),
            Error::Forbidden(signal) => {
                write!(f, "the {} signal action cannot be overridden", signal_fmt(*signal))
            }
            Error::AlreadyInitialized => {
                f.write_str("a signal engine is already active in this process")
            }
            Error::InvalidDuration(secs) => write!(f, "invalid sleep duration: {secs}"),
            Error::Io(e) => write!(f, "IO error: {e}"),
        }
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Error::Platform { source, .. } => Some(source),
            Error::Io(e) => Some(e),
            _ => None,
        }
    }
}

impl From<io::Error> for Error {
    fn from(err: io::Error) -> Self {
        Error::Io(err)
    }
}

impl Error {
    pub(crate) fn platform(signal: SignalNumber, operation: Operation) -> impl FnOnce(io::Error) -> Self {
        move |source| Error::Platform {
            signal,
            operation,
            source,
        }
    }

    /// Returns `true` if the error came from the OS refusing a disposition change.
    #[must_use]
    pub fn is_platform(&self) -> bool {
        matches!(self, Self::Platform { .. } | Self::Forbidden(_))
    }
}
