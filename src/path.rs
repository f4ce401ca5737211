//! Home-directory expansion and small filesystem/stdio probes.

use std::io;
use std::path::PathBuf;

use crate::error::{Error, Result};

/// Expand `~/rest` and `~user/rest` to the matching home directory.
///
/// Anything not starting with `~` is returned unchanged.
pub fn expand_user(path: &str) -> Result<PathBuf> {
    let Some(rest) = path.strip_prefix('~') else {
        return Ok(PathBuf::from(path));
    };
    let (name, tail) = match rest.find('/') {
        Some(i) => (&rest[..i], &rest[i + 1..]),
        None    => (rest, ""),
    };
    let home = if name.is_empty() {
        dirs::home_dir().ok_or_else(|| Error::UnknownUser { name: current_user_label() })?
    } else {
        home_of(name).ok_or_else(|| Error::UnknownUser { name: name.to_owned() })?
    };
    Ok(if tail.is_empty() { home } else { home.join(tail) })
}

/// True if `path` (after `~` expansion) can be stat'ed.
pub fn exists(path: &str) -> bool {
    match expand_user(path) {
        Ok(p)  => std::fs::metadata(p).is_ok(),
        Err(_) => false,
    }
}

/// True when standard input is fed by a pipe or a file rather than a
/// character device such as a terminal or `/dev/null`.
#[cfg(unix)]
pub fn is_stdin() -> bool {
    let mut st: libc::stat = unsafe { std::mem::zeroed() };
    // SAFETY: fd 0 is only inspected; `st` is a valid out-pointer.
    if unsafe { libc::fstat(libc::STDIN_FILENO, &mut st) } != 0 {
        return false;
    }
    (st.st_mode & libc::S_IFMT) != libc::S_IFCHR
}

#[cfg(not(unix))]
pub fn is_stdin() -> bool {
    use std::io::IsTerminal;
    !io::stdin().is_terminal()
}

fn current_user_label() -> String {
    std::env::var("USER").unwrap_or_else(|_| "current user".to_owned())
}

#[cfg(unix)]
fn home_of(name: &str) -> Option<PathBuf> {
    use std::ffi::{CStr, CString, OsStr};
    use std::os::unix::ffi::OsStrExt;

    let cname = CString::new(name).ok()?;
    let mut buf: Vec<libc::c_char> = vec![0; 1024];
    let mut pwd: libc::passwd = unsafe { std::mem::zeroed() };
    let mut found: *mut libc::passwd = std::ptr::null_mut();

    loop {
        // SAFETY: every pointer refers to a live local of the right size.
        let rc = unsafe {
            libc::getpwnam_r(cname.as_ptr(), &mut pwd, buf.as_mut_ptr(), buf.len(), &mut found)
        };
        if rc == libc::ERANGE && buf.len() < (1 << 20) {
            buf.resize(buf.len() * 2, 0);
            continue;
        }
        if rc != 0 {
            tracing::debug!(user = name, error = %io::Error::from_raw_os_error(rc), "getpwnam_r failed");
            return None;
        }
        break;
    }
    if found.is_null() || pwd.pw_dir.is_null() {
        return None;
    }
    // SAFETY: pw_dir points into `buf`, which outlives this borrow.
    let dir = unsafe { CStr::from_ptr(pwd.pw_dir) };
    Some(PathBuf::from(OsStr::from_bytes(dir.to_bytes())))
}

#[cfg(not(unix))]
fn home_of(_name: &str) -> Option<PathBuf> {
    None
}
