//! Spawns a parsed [`crate::parser::Pipeline`]: pipe plumbing, redirection
//! setup, process-group assignment, child signal-disposition reset, and
//! foreground/background handoff.

use std::fs::OpenOptions;
use std::io;
use std::os::unix::process::CommandExt;
use std::process::{Command, Stdio};

use os_pipe::pipe;

use crate::jobs::JobState;
use crate::parser::{self, Pipeline};
use crate::signals::{self, SigchldBlockGuard};

/// Run a parsed pipeline to completion (foreground) or register it and
/// return immediately (background). Returns the exit code to feed back
/// to the REPL driver — always 0 or 1, since the shell never surfaces a
/// child's real exit status.
pub fn execute(pipeline: &Pipeline) -> i32 {
    let stage_count = pipeline.stages.len();
    if stage_count == 0 {
        return 0;
    }
    if stage_count > crate::jobs::MAX_STAGES {
        eprintln!("ush: too many stages in pipeline");
        return 1;
    }

    let mut pipes = Vec::with_capacity(stage_count.saturating_sub(1));
    for _ in 0..stage_count.saturating_sub(1) {
        match pipe() {
            Ok(pair) => pipes.push(pair),
            Err(e) => {
                eprintln!("ush: failed to create pipe: {e}");
                return 1;
            }
        }
    }

    let guard = SigchldBlockGuard::block();

    let mut pids: Vec<i32> = Vec::with_capacity(stage_count);
    let mut leader_pgid: Option<i32> = None;
    let mut aborted = false;

    for (i, stage) in pipeline.stages.iter().enumerate() {
        let target_pgid = leader_pgid.unwrap_or(0);
        let program = stage.args[0].trim();

        let mut command = Command::new(program);
        command.args(stage.args[1..].iter().map(|arg| arg.trim()));

        unsafe {
            command.pre_exec(move || {
                for sig in [libc::SIGINT, libc::SIGTSTP, libc::SIGQUIT, libc::SIGPIPE] {
                    if libc::signal(sig, libc::SIG_DFL) == libc::SIG_ERR {
                        return Err(io::Error::last_os_error());
                    }
                }
                let mut empty: libc::sigset_t = std::mem::zeroed();
                libc::sigemptyset(&mut empty);
                libc::sigprocmask(libc::SIG_SETMASK, &empty, std::ptr::null_mut());
                if libc::setpgid(0, target_pgid) != 0 {
                    return Err(io::Error::last_os_error());
                }
                Ok(())
            });
        }

        if configure_stdin(&mut command, pipeline, i, &pipes).is_err() {
            continue;
        }
        if configure_stdout(&mut command, pipeline, i, stage_count, &pipes).is_err() {
            continue;
        }
        command.stderr(Stdio::inherit());

        match command.spawn() {
            Ok(child) => {
                let pid = child.id() as i32;
                if leader_pgid.is_none() {
                    let _ = signals::set_process_group(pid, pid);
                    leader_pgid = Some(pid);
                } else {
                    let _ = signals::set_process_group(pid, leader_pgid.unwrap());
                }
                pids.push(pid);
                // The shell never waits on `child` through std — reaping
                // happens via the `SIGCHLD` handler and `waitpid(-1, ...)`.
                // Dropping `Child` here is harmless: std never calls wait()
                // on drop.
            }
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                // No process was ever forked for this stage (unlike the
                // source shell, where execvp fails inside an already-forked
                // child) — but the failure is local to this stage, so
                // siblings still run and the job still gets registered.
                eprintln!("{program}: command not found");
            }
            Err(e) => {
                eprintln!("ush: {program}: {e}");
                aborted = true;
                break;
            }
        }
    }

    drop(pipes);

    if aborted {
        if let Some(pgid) = leader_pgid {
            unsafe { libc::kill(-pgid, libc::SIGKILL) };
            drain_zombies(&pids);
        }
        drop(guard);
        return 1;
    }

    if pids.is_empty() {
        drop(guard);
        return 1;
    }

    let pgid = leader_pgid.unwrap_or(0);
    let command_text = parser::command_text(pipeline);

    let id = {
        let mut table = signals::job_table().lock().unwrap();
        table.add(
            pgid,
            &pids,
            pids.len(),
            JobState::Running,
            pipeline.background,
            command_text.clone(),
        )
    };

    let Some(id) = id else {
        eprintln!("ush: job table full");
        unsafe { libc::kill(-pgid, libc::SIGKILL) };
        drain_zombies(&pids);
        drop(guard);
        return 1;
    };

    drop(guard);

    if pipeline.background {
        println!("[{id}] {pgid}");
        return 0;
    }

    wait_foreground(pgid, &command_text)
}

/// Wires up the stage's stdin. Returns `Err` when an input-file redirect
/// fails to open — the caller must not spawn the command in that case
/// (the stage reports the failure and never runs, mirroring the source
/// shell's children, which `exit(1)` before reaching `execvp`).
fn configure_stdin(
    command: &mut Command,
    pipeline: &Pipeline,
    stage_index: usize,
    pipes: &[(os_pipe::PipeReader, os_pipe::PipeWriter)],
) -> Result<(), ()> {
    if stage_index == 0 {
        if let Some(path) = &pipeline.in_file {
            match std::fs::File::open(path) {
                Ok(file) => {
                    command.stdin(Stdio::from(file));
                }
                Err(e) => {
                    eprintln!("ush: {path}: {e}");
                    return Err(());
                }
            }
        } else {
            command.stdin(Stdio::inherit());
        }
    } else if let Ok(reader) = pipes[stage_index - 1].0.try_clone() {
        command.stdin(Stdio::from(reader));
    }
    Ok(())
}

/// Wires up the stage's stdout. Returns `Err` on an output-file redirect
/// that fails to open, with the same never-spawn contract as
/// [`configure_stdin`].
fn configure_stdout(
    command: &mut Command,
    pipeline: &Pipeline,
    stage_index: usize,
    stage_count: usize,
    pipes: &[(os_pipe::PipeReader, os_pipe::PipeWriter)],
) -> Result<(), ()> {
    if stage_index + 1 == stage_count {
        if let Some(path) = &pipeline.out_file {
            let mut options = OpenOptions::new();
            options.create(true).write(true);
            if pipeline.out_append {
                options.append(true);
            } else {
                options.truncate(true);
            }
            #[cfg(unix)]
            {
                use std::os::unix::fs::OpenOptionsExt;
                options.mode(0o644);
            }
            match options.open(path) {
                Ok(file) => {
                    command.stdout(Stdio::from(file));
                }
                Err(e) => {
                    eprintln!("ush: {path}: {e}");
                    return Err(());
                }
            }
        } else {
            command.stdout(Stdio::inherit());
        }
    } else if let Ok(writer) = pipes[stage_index].1.try_clone() {
        command.stdout(Stdio::from(writer));
    }
    Ok(())
}

/// Polls the job's table state once a second: the sleep is interrupted
/// by `SIGCHLD` delivery under normal operation, so the wakeup is
/// near-instantaneous; the timeout is only a safety bound.
pub(crate) fn wait_foreground_job(pgid: i32, command_text: &str) -> i32 {
    wait_foreground(pgid, command_text)
}

fn wait_foreground(pgid: i32, command_text: &str) -> i32 {
    loop {
        {
            let mut table = signals::job_table().lock().unwrap();
            if let Some(job) = table.find_by_pgid(pgid) {
                match job.state {
                    JobState::Done => {
                        table.remove(pgid);
                        return 0;
                    }
                    JobState::Stopped => {
                        let id = job.id;
                        println!("[{id}] Stopped\t\t{command_text}");
                        return 0;
                    }
                    JobState::Running => {}
                }
            } else {
                return 0;
            }
        }
        signals::interruptible_sleep_one_second();
    }
}

fn drain_zombies(pids: &[i32]) {
    for &pid in pids {
        let mut status: libc::c_int = 0;
        unsafe { libc::waitpid(pid, &mut status, 0) };
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lexer::tokenize;
    use crate::parser::parse;

    #[test]
    fn empty_pipeline_is_a_no_op() {
        assert_eq!(execute(&parse(tokenize(""))), 0);
    }

    #[test]
    fn command_not_found_reports_failure_without_registering_a_job() {
        let code = execute(&parse(tokenize("definitely_not_a_real_binary_zzz")));
        assert_eq!(code, 1);
    }

    #[test]
    fn unreadable_input_redirection_reports_failure_without_running_the_command() {
        let code = execute(&parse(tokenize("cat < /no/such/file/ushell_test")));
        assert_eq!(code, 1);
    }
}
