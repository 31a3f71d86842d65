//! Classifies a raw `waitpid` status as exited-with-code, signalled, or
//! still running. Used only for the reaper's own bookkeeping — the shell
//! never surfaces a child's exit status to the user.

/// `None` means the status is neither `WIFEXITED` nor `WIFSIGNALED`
/// (e.g. `WIFSTOPPED`, handled separately by the caller).
pub fn exit_code_from_wait_status(raw_status: libc::c_int) -> Option<i32> {
    if unsafe { libc::WIFEXITED(raw_status) } {
        return Some(unsafe { libc::WEXITSTATUS(raw_status) });
    }

    if unsafe { libc::WIFSIGNALED(raw_status) } {
        let signal = unsafe { libc::WTERMSIG(raw_status) };
        return Some(128 + signal);
    }

    None
}
