pub fn cerr<Int: Copy + TryInto<libc::c_long>>(res: Int) -> std::io::Result<Int> {
    match res.try_into() {
        Ok(-1) => Err(std::io::Error::last_os_error()),
        _ => Ok(res),
    }
}

#[cfg(unix)]
extern "C" {
    #[cfg_attr(
        any(target_os = "macos", target_os = "ios", target_os = "freebsd"),
        link_name = "__error"
    )]
    #[cfg_attr(
        any(target_os = "openbsd", target_os = "netbsd", target_os = "android"),
        link_name = "__errno"
    )]
    #[cfg_attr(target_os = "linux", link_name = "__errno_location")]
    fn errno_location() -> *mut libc::c_int;
}

/// Keeps the value of `errno` at creation and writes it back on drop.
///
/// Signal handlers must not clobber `errno` of the code they interrupted, so the delivery
/// callback holds one of these for its whole body. Reading and writing `errno` is
/// async-signal-safe.
#[cfg(unix)]
pub(crate) struct ErrnoGuard(libc::c_int);

#[cfg(unix)]
impl ErrnoGuard {
    pub(crate) fn save() -> Self {
        Self(unsafe { *errno_location() })
    }
}

#[cfg(unix)]
impl Drop for ErrnoGuard {
    fn drop(&mut self) {
        unsafe { *errno_location() = self.0 };
    }
}
