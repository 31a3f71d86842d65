//! Builds the `[user@host]cwd$ ` prompt string.
//!
//! A missing `USER` or an unreadable current directory is fatal: the
//! process exits with status 1 rather than printing a malformed prompt.

/// Build the prompt, or exit the process with status 1 on a fatal
/// condition (missing `$USER`, unreadable cwd, or `gethostname` failure).
pub fn build() -> String {
    let cwd = match std::env::current_dir() {
        Ok(path) => path,
        Err(_) => {
            eprintln!("ush: cannot resolve current directory");
            std::process::exit(1);
        }
    };

    let user = match std::env::var("USER") {
        Ok(user) => user,
        Err(_) => {
            eprintln!("ush: cannot determine user");
            std::process::exit(1);
        }
    };

    let host = match hostname() {
        Ok(host) => host,
        Err(e) => {
            eprintln!("ush: hostname: {e}");
            std::process::exit(1);
        }
    };

    format!("[{user}@{host}]{}$ ", cwd.display())
}

#[cfg(unix)]
fn hostname() -> std::io::Result<String> {
    let mut buf = vec![0u8; 256];
    let rc = unsafe { libc::gethostname(buf.as_mut_ptr() as *mut libc::c_char, buf.len()) };
    if rc != 0 {
        return Err(std::io::Error::last_os_error());
    }
    let len = buf.iter().position(|&b| b == 0).unwrap_or(buf.len());
    Ok(String::from_utf8_lossy(&buf[..len]).into_owned())
}

#[cfg(not(unix))]
fn hostname() -> std::io::Result<String> {
    Ok("localhost".to_string())
}
