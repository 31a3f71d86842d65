mod builtins;
mod executor;
mod expander;
mod jobs;
mod lexer;
mod parser;
mod prompt;
mod signals;
mod status;

use std::io::{self, Write};

use jobs::JobState;

fn main() {
    if let Err(e) = signals::install_handlers() {
        eprintln!("ush: failed to install signal handlers: {e}");
        std::process::exit(1);
    }

    let stdin = io::stdin();
    let mut stdout = io::stdout();

    loop {
        report_completed_background_jobs();
        remove_completed_foreground_jobs();

        print!("{}", prompt::build());
        if stdout.flush().is_err() {
            break;
        }

        let mut input = String::new();
        match stdin.read_line(&mut input) {
            Ok(0) => break,
            Ok(_) => {}
            Err(error) if error.kind() == io::ErrorKind::Interrupted => continue,
            Err(error) => {
                eprintln!("ush: error reading input: {error}");
                break;
            }
        }

        let tokens = lexer::tokenize(&input);
        if tokens.is_empty() {
            continue;
        }
        let tokens = expander::expand(tokens);
        let pipeline = parser::parse(tokens);

        if let Some(error) = &pipeline.error {
            eprintln!("ush: {error}");
            continue;
        }

        if pipeline.stages.is_empty() {
            continue;
        }

        let is_builtin_call = pipeline.stages.len() == 1
            && pipeline.in_file.is_none()
            && pipeline.out_file.is_none()
            && builtins::is_builtin(&pipeline.stages[0].args[0]);

        if is_builtin_call {
            builtins::execute(&pipeline.stages[0].args);
        } else {
            executor::execute(&pipeline);
        }
    }

    std::process::exit(0);
}

fn report_completed_background_jobs() {
    let _guard = signals::SigchldBlockGuard::block();
    let mut table = signals::job_table().lock().unwrap();
    let mut done_pgids = Vec::new();
    for job in table.iter_mut() {
        if job.background && job.id > 0 && job.state == JobState::Done {
            println!("[{}] Done\t\t{}", job.id, job.command_text);
            done_pgids.push(job.pgid);
        }
    }
    for pgid in done_pgids {
        table.remove(pgid);
    }
}

fn remove_completed_foreground_jobs() {
    let _guard = signals::SigchldBlockGuard::block();
    let mut table = signals::job_table().lock().unwrap();
    let hidden_done: Vec<i32> = table
        .iter_mut()
        .filter(|job| job.id == 0 && job.state == JobState::Done)
        .map(|job| job.pgid)
        .collect();
    for pgid in hidden_done {
        table.remove(pgid);
    }
}
