//! Built-in command dispatch: `quit exit cd help jobs fg bg stop`.
//!
//! Called only when a pipeline has exactly one stage and no redirection.
//! Builtins that touch the job table observe the same signal-blocking
//! discipline as the executor.

use crate::jobs::{self, JobState};
use crate::signals::{self, SigchldBlockGuard};

const BUILTINS: &[&str] = &["quit", "exit", "cd", "help", "jobs", "fg", "bg", "stop"];

pub fn is_builtin(name: &str) -> bool {
    BUILTINS.contains(&name)
}

/// Dispatch a builtin by name. Returns the exit code; `quit`/`exit`
/// terminate the process directly and never return.
pub fn execute(args: &[String]) -> i32 {
    match args[0].as_str() {
        "quit" | "exit" => std::process::exit(0),
        "cd" => builtin_cd(args.get(1).map(String::as_str)),
        "help" => builtin_help(),
        "jobs" => builtin_jobs(),
        "fg" => builtin_fg(args.get(1).map(String::as_str)),
        "bg" => builtin_bg(args.get(1).map(String::as_str)),
        "stop" => builtin_stop(args.get(1).map(String::as_str)),
        other => {
            eprintln!("ush: unknown builtin: {other}");
            1
        }
    }
}

fn builtin_cd(arg: Option<&str>) -> i32 {
    let target = match arg {
        Some(dir) => dir.to_string(),
        None => match std::env::var("HOME") {
            Ok(home) => home,
            Err(_) => return 0,
        },
    };

    if let Err(e) = std::env::set_current_dir(&target) {
        eprintln!("cd: {target}: {e}");
        return 1;
    }
    0
}

fn builtin_help() -> i32 {
    println!("ush — builtin commands:");
    for (name, description) in [
        ("quit", "Exit the shell"),
        ("exit", "Exit the shell"),
        ("cd", "Change the working directory"),
        ("help", "Show this help text"),
        ("jobs", "List tracked jobs"),
        ("fg", "Bring a job to the foreground"),
        ("bg", "Resume a stopped job in the background"),
        ("stop", "Suspend a job"),
    ] {
        println!("  {name:<10}- {description}");
    }
    println!("Other commands are not builtins");
    0
}

fn builtin_jobs() -> i32 {
    let _guard = SigchldBlockGuard::block();
    let mut table = signals::job_table().lock().unwrap();

    let mut to_free = Vec::new();
    for job in table.listed() {
        let state = match job.state {
            JobState::Running => "Running",
            JobState::Stopped => "Stopped",
            JobState::Done => "Done",
        };
        println!("[{}] {} {}\t{}", job.id, job.pgid, state, job.command_text);
        if job.state == JobState::Done {
            to_free.push(job.pgid);
        }
    }
    for pgid in to_free {
        table.remove(pgid);
    }
    0
}

fn builtin_fg(arg: Option<&str>) -> i32 {
    let reference = jobs::parse_job_ref(arg);
    let guard = SigchldBlockGuard::block();
    let mut table = signals::job_table().lock().unwrap();

    let Some(job) = table.resolve(reference) else {
        drop(table);
        eprintln!("fg: no such job");
        return 1;
    };

    let pgid = job.pgid;
    let command_text = job.command_text.clone();
    job.background = false;
    job.state = JobState::Running;
    drop(table);
    drop(guard);

    println!("{command_text}");
    let _ = signals::send_continue_to_group(pgid);

    crate::executor::wait_foreground_job(pgid, &command_text)
}

fn builtin_bg(arg: Option<&str>) -> i32 {
    let reference = jobs::parse_job_ref(arg);
    let _guard = SigchldBlockGuard::block();
    let mut table = signals::job_table().lock().unwrap();

    let Some(job) = table.resolve(reference) else {
        drop(table);
        eprintln!("bg: no such job");
        return 1;
    };

    job.background = true;
    job.state = JobState::Running;
    let id = job.id;
    let pgid = job.pgid;
    let command_text = job.command_text.clone();
    drop(table);

    println!("[{id}] {command_text} &");
    let _ = signals::send_continue_to_group(pgid);
    0
}

fn builtin_stop(arg: Option<&str>) -> i32 {
    let reference = jobs::parse_job_ref(arg);
    let _guard = SigchldBlockGuard::block();
    let mut table = signals::job_table().lock().unwrap();

    let Some(job) = table.resolve(reference) else {
        drop(table);
        eprintln!("stop: no such job");
        return 1;
    };

    let pgid = job.pgid;
    drop(table);

    let _ = signals::send_stop_to_group(pgid);
    0
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builtin_names_match_the_fixed_table() {
        for name in ["quit", "exit", "cd", "help", "jobs", "fg", "bg", "stop"] {
            assert!(is_builtin(name));
        }
        assert!(!is_builtin("ls"));
        assert!(!is_builtin("echo"));
    }

    #[test]
    fn fg_on_empty_table_reports_no_such_job() {
        // Exercises the resolve-miss path without touching process state.
        let code = builtin_fg(Some("%999"));
        assert_eq!(code, 1);
    }

    #[test]
    fn bg_on_empty_table_reports_no_such_job() {
        let code = builtin_bg(Some("%999"));
        assert_eq!(code, 1);
    }

    #[test]
    fn stop_on_empty_table_reports_no_such_job() {
        let code = builtin_stop(Some("%999"));
        assert_eq!(code, 1);
    }
}
