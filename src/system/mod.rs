use std::{
    io,
    path::{Path, PathBuf},
    time::Duration,
};

use crate::common::Error;

pub mod signal;

/// Sleep for `interval / divisor` seconds.
///
/// A signal arriving in the meantime is captured and the sleep resumes; the callback runs at the
/// next safe point after the sleep.
pub fn sleep(interval: f64, divisor: f64) -> Result<(), Error> {
    let duration = sleep_duration(interval, divisor)?;
    std::thread::sleep(duration);
    Ok(())
}

fn sleep_duration(interval: f64, divisor: f64) -> Result<Duration, Error> {
    if divisor == 0.0 || divisor.is_nan() {
        return Err(Error::InvalidDuration(interval));
    }

    let secs = interval / divisor;
    Duration::try_from_secs_f64(secs).map_err(|_| Error::InvalidDuration(secs))
}

/// The current working directory of the process.
pub fn cwd() -> io::Result<PathBuf> {
    std::env::current_dir()
}

pub fn chdir<P: AsRef<Path>>(path: P) -> io::Result<()> {
    std::env::set_current_dir(path)
}

#[cfg(unix)]
pub(crate) fn make_zeroed_sigaction() -> libc::sigaction {
    // SAFETY: since sigaction is a C struct, all-zeroes is a valid representation
    // We cannot use a "literal struct" initialization method since the exact representation
    // of libc::sigaction is not fixed between platforms.
    unsafe { std::mem::zeroed() }
}
