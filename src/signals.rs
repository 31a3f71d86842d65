//! Signal installation, the job-table critical-section guard, and the
//! terminal process-group primitives the executor and built-ins share.
//!
//! The `SIGCHLD` handler is the table's only asynchronous writer; every
//! other writer must hold [`block_sigchld`] for the duration of its
//! critical section.

use std::io;
use std::sync::Mutex;
use std::sync::OnceLock;

use crate::jobs::{JobState, JobTable};

static JOB_TABLE: OnceLock<Mutex<JobTable>> = OnceLock::new();

/// The process-global job table. Lazily initialized on first access.
pub fn job_table() -> &'static Mutex<JobTable> {
    JOB_TABLE.get_or_init(|| Mutex::new(JobTable::new()))
}

/// Install `SIGCHLD`, `SIGINT`, and `SIGTSTP` handlers with `SA_RESTART`,
/// matching the source shell's startup sequence.
pub fn install_handlers() -> io::Result<()> {
    install(libc::SIGCHLD, handle_sigchld)?;
    install(libc::SIGINT, handle_sigint)?;
    install(libc::SIGTSTP, handle_sigtstp)?;
    Ok(())
}

fn install(signal: libc::c_int, handler: extern "C" fn(libc::c_int)) -> io::Result<()> {
    unsafe {
        let mut action: libc::sigaction = std::mem::zeroed();
        action.sa_sigaction = handler as usize;
        action.sa_flags = libc::SA_RESTART;
        libc::sigemptyset(&mut action.sa_mask);
        if libc::sigaction(signal, &action, std::ptr::null_mut()) != 0 {
            return Err(io::Error::last_os_error());
        }
    }
    Ok(())
}

/// Drain every exited/stopped child with a non-blocking, stop-reporting
/// wait, updating the owning job's slot. Mirrors the source's
/// `sigchld_handler`: saves and restores `errno`, since this runs in
/// signal context.
extern "C" fn handle_sigchld(_sig: libc::c_int) {
    let saved_errno = io::Error::last_os_error().raw_os_error().unwrap_or(0);

    if let Ok(mut table) = job_table().try_lock() {
        loop {
            let mut status: libc::c_int = 0;
            let pid = unsafe { libc::waitpid(-1, &mut status, libc::WNOHANG | libc::WUNTRACED) };
            if pid <= 0 {
                break;
            }

            let Some(job) = find_owning_job(&mut table, pid) else {
                continue;
            };

            if unsafe { libc::WIFSTOPPED(status) } {
                job.state = JobState::Stopped;
                job.background = true;
                let pgid = job.pgid;
                if job.id == 0 {
                    table.assign_id(pgid);
                }
            } else if crate::status::exit_code_from_wait_status(status).is_some() {
                if let Some(slot) = job.pids.iter_mut().find(|p| **p == pid) {
                    *slot = 0;
                }
                job.done_count += 1;
                if job.done_count >= job.stage_count {
                    job.state = JobState::Done;
                }
            }
        }
    }

    set_errno(saved_errno);
}

#[cfg(target_os = "linux")]
fn set_errno(value: libc::c_int) {
    unsafe { *libc::__errno_location() = value };
}

#[cfg(not(target_os = "linux"))]
fn set_errno(value: libc::c_int) {
    unsafe { *libc::__error() = value };
}

fn find_owning_job(table: &mut JobTable, pid: libc::pid_t) -> Option<&mut crate::jobs::Job> {
    table
        .iter_mut()
        .find(|job| job.pids[..job.stage_count].contains(&pid))
}

extern "C" fn handle_sigint(_sig: libc::c_int) {
    if let Ok(mut table) = job_table().try_lock() {
        if let Some(job) = table.foreground() {
            unsafe { libc::kill(-job.pgid, libc::SIGINT) };
        }
    }
}

extern "C" fn handle_sigtstp(_sig: libc::c_int) {
    if let Ok(mut table) = job_table().try_lock() {
        if let Some(job) = table.foreground() {
            unsafe { libc::kill(-job.pgid, libc::SIGTSTP) };
        }
    }
}

/// RAII guard blocking `SIGCHLD` for the lifetime of a job-table critical
/// section; restores the previous mask on drop.
pub struct SigchldBlockGuard {
    previous: libc::sigset_t,
}

impl SigchldBlockGuard {
    pub fn block() -> SigchldBlockGuard {
        unsafe {
            let mut set: libc::sigset_t = std::mem::zeroed();
            libc::sigemptyset(&mut set);
            libc::sigaddset(&mut set, libc::SIGCHLD);
            let mut previous: libc::sigset_t = std::mem::zeroed();
            libc::sigprocmask(libc::SIG_BLOCK, &set, &mut previous);
            SigchldBlockGuard { previous }
        }
    }
}

impl Drop for SigchldBlockGuard {
    fn drop(&mut self) {
        unsafe {
            libc::sigprocmask(libc::SIG_SETMASK, &self.previous, std::ptr::null_mut());
        }
    }
}

pub fn set_process_group(pid: libc::pid_t, pgid: libc::pid_t) -> io::Result<()> {
    loop {
        let rc = unsafe { libc::setpgid(pid, pgid) };
        if rc == 0 {
            return Ok(());
        }
        let err = io::Error::last_os_error();
        match err.raw_os_error() {
            Some(code) if code == libc::EINTR => continue,
            Some(code) if code == libc::EACCES || code == libc::ESRCH => return Ok(()),
            _ => return Err(err),
        }
    }
}

pub fn send_continue_to_group(pgid: libc::pid_t) -> io::Result<()> {
    if pgid <= 0 {
        return Err(io::Error::new(
            io::ErrorKind::InvalidInput,
            "invalid process group id",
        ));
    }
    loop {
        let rc = unsafe { libc::kill(-pgid, libc::SIGCONT) };
        if rc == 0 {
            return Ok(());
        }
        let err = io::Error::last_os_error();
        if err.raw_os_error() == Some(libc::EINTR) {
            continue;
        }
        return Err(err);
    }
}

pub fn send_stop_to_group(pgid: libc::pid_t) -> io::Result<()> {
    if pgid <= 0 {
        return Err(io::Error::new(
            io::ErrorKind::InvalidInput,
            "invalid process group id",
        ));
    }
    loop {
        let rc = unsafe { libc::kill(-pgid, libc::SIGSTOP) };
        if rc == 0 {
            return Ok(());
        }
        let err = io::Error::last_os_error();
        if err.raw_os_error() == Some(libc::EINTR) {
            continue;
        }
        return Err(err);
    }
}

struct SignalIgnoreGuard {
    signal: libc::c_int,
    previous: libc::sighandler_t,
}

impl SignalIgnoreGuard {
    fn ignore(signal: libc::c_int) -> io::Result<SignalIgnoreGuard> {
        let previous = unsafe { libc::signal(signal, libc::SIG_IGN) };
        if previous == libc::SIG_ERR {
            return Err(io::Error::last_os_error());
        }
        Ok(SignalIgnoreGuard { signal, previous })
    }
}

impl Drop for SignalIgnoreGuard {
    fn drop(&mut self) {
        unsafe {
            libc::signal(self.signal, self.previous);
        }
    }
}

fn set_terminal_foreground(fd: libc::c_int, pgid: libc::pid_t) -> io::Result<()> {
    if pgid <= 0 {
        return Err(io::Error::new(
            io::ErrorKind::InvalidInput,
            "invalid process group id",
        ));
    }
    let _sigttou = SignalIgnoreGuard::ignore(libc::SIGTTOU)?;
    loop {
        let rc = unsafe { libc::tcsetpgrp(fd, pgid) };
        if rc == 0 {
            return Ok(());
        }
        let err = io::Error::last_os_error();
        if err.raw_os_error() == Some(libc::EINTR) {
            continue;
        }
        return Err(err);
    }
}

/// Hands the controlling terminal to `target_pgid` for its lifetime, and
/// back to the shell's own process group on drop.
pub struct ForegroundTerminalGuard {
    tty_fd: Option<libc::c_int>,
    shell_pgid: libc::pid_t,
}

impl ForegroundTerminalGuard {
    pub fn new(target_pgid: libc::pid_t) -> io::Result<ForegroundTerminalGuard> {
        let tty_fd = if unsafe { libc::isatty(libc::STDIN_FILENO) } == 1 {
            Some(libc::STDIN_FILENO)
        } else {
            None
        };
        let shell_pgid = unsafe { libc::getpgrp() };
        let guard = ForegroundTerminalGuard { tty_fd, shell_pgid };
        if let Some(fd) = guard.tty_fd {
            set_terminal_foreground(fd, target_pgid)?;
        }
        Ok(guard)
    }
}

impl Drop for ForegroundTerminalGuard {
    fn drop(&mut self) {
        if let Some(fd) = self.tty_fd {
            let _ = set_terminal_foreground(fd, self.shell_pgid);
        }
    }
}

/// Sleep for approximately one second, interruptible by a delivered
/// signal (unlike `std::thread::sleep`). Used by the foreground waiter's
/// poll loop.
pub fn interruptible_sleep_one_second() {
    unsafe {
        libc::sleep(1);
    }
}
