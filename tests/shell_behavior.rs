use std::io::Write;
use std::process::{Child, Command, Stdio};
use std::time::{Duration, Instant};

fn spawn_shell() -> Child {
    Command::new(env!("CARGO_BIN_EXE_ushell"))
        .env("USER", "tester")
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn()
        .expect("spawn ushell")
}

fn send_line(child: &mut Child, line: &str) {
    let stdin = child.stdin.as_mut().expect("stdin");
    writeln!(stdin, "{line}").expect("write line");
}

fn run_shell(lines: &[&str]) -> std::process::Output {
    let mut child = spawn_shell();
    for line in lines {
        send_line(&mut child, line);
    }
    send_line(&mut child, "exit");
    child.wait_with_output().expect("wait output")
}

#[test]
fn foreground_command_runs_to_completion_silently() {
    let output = run_shell(&["ls -l /tmp"]);
    let stdout = String::from_utf8_lossy(&output.stdout);
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(!stderr.contains("command not found"), "stderr was: {stderr}");
    assert!(stdout.contains('['), "prompt should have printed; stdout was: {stdout}");
}

#[test]
fn pipeline_runs_across_two_stages() {
    let output = run_shell(&["printf 'b\\na\\n' | sort"]);
    let stdout = String::from_utf8_lossy(&output.stdout);
    let a_pos = stdout.find('a');
    let b_pos = stdout.find('b');
    assert!(a_pos.is_some() && b_pos.is_some(), "stdout was: {stdout}");
    assert!(a_pos < b_pos, "sort should put a before b; stdout was: {stdout}");
}

#[test]
fn background_job_prints_id_and_pgid_then_done_at_next_prompt() {
    // The second, foreground `sleep` gives the background job time to
    // finish before the REPL's next job-table sweep.
    let output = run_shell(&["sleep 1 &", "sleep 2"]);
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("[1]"), "missing background start notice; stdout was: {stdout}");
    assert!(
        stdout.contains("Done") && stdout.contains("sleep 1"),
        "missing background completion notice; stdout was: {stdout}"
    );
}

#[test]
fn jobs_lists_a_running_background_job() {
    let output = run_shell(&["sleep 2 &", "jobs"]);
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("Running"), "stdout was: {stdout}");
    assert!(stdout.contains("sleep 2"), "stdout was: {stdout}");
}

#[test]
fn stop_bg_and_fg_cycle_on_a_background_job() {
    let mut child = spawn_shell();
    send_line(&mut child, "sleep 5 &");
    std::thread::sleep(Duration::from_millis(100));
    send_line(&mut child, "stop %1");
    std::thread::sleep(Duration::from_millis(200));
    send_line(&mut child, "jobs");
    std::thread::sleep(Duration::from_millis(100));
    send_line(&mut child, "bg %1");
    std::thread::sleep(Duration::from_millis(100));
    send_line(&mut child, "stop %1");
    send_line(&mut child, "exit");
    let output = child.wait_with_output().expect("wait output");
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("Stopped"), "stdout was: {stdout}");
    assert!(stdout.contains("sleep 5 &"), "bg notice missing; stdout was: {stdout}");
}

#[test]
fn redirection_truncates_and_appends() {
    let path = std::env::temp_dir().join(format!("ushell_redir_{}.txt", std::process::id()));
    let path_str = path.display().to_string();

    run_shell(&[&format!("echo hi > {path_str}")]);
    let first = std::fs::read_to_string(&path).expect("read after truncate");
    assert_eq!(first, "hi\n");

    run_shell(&[&format!("echo bye >> {path_str}")]);
    let second = std::fs::read_to_string(&path).expect("read after append");
    assert_eq!(second, "hi\nbye\n");

    run_shell(&[&format!("echo hi > {path_str}")]);
    let third = std::fs::read_to_string(&path).expect("read after retruncate");
    assert_eq!(third, "hi\n");

    let _ = std::fs::remove_file(&path);
}

#[test]
fn glob_with_no_matches_falls_back_to_the_literal_word() {
    let dir = std::env::temp_dir().join(format!("ushell_glob_{}", std::process::id()));
    std::fs::create_dir_all(&dir).unwrap();

    let mut child = Command::new(env!("CARGO_BIN_EXE_ushell"))
        .env("USER", "tester")
        .current_dir(&dir)
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn()
        .expect("spawn ushell");
    send_line(&mut child, "echo *.definitely_not_here_zzz");
    send_line(&mut child, "exit");
    let output = child.wait_with_output().expect("wait output");
    let stdout = String::from_utf8_lossy(&output.stdout);

    assert!(
        stdout.contains("*.definitely_not_here_zzz"),
        "literal pattern should pass through unmatched; stdout was: {stdout}"
    );

    let _ = std::fs::remove_dir_all(&dir);
}

#[test]
fn misplaced_pipe_is_reported_and_not_executed() {
    let output = run_shell(&["| grep foo"]);
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("misplaced pipe"), "stderr was: {stderr}");
}

#[test]
fn cd_changes_directory_for_subsequent_external_commands() {
    let dir = std::env::temp_dir().join(format!("ushell_cd_{}", std::process::id()));
    std::fs::create_dir_all(&dir).unwrap();
    let marker = dir.join("marker.txt");
    std::fs::write(&marker, "x").unwrap();

    let output = run_shell(&[&format!("cd {}", dir.display()), "ls marker.txt"]);
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("marker.txt"), "stdout was: {stdout}");

    let _ = std::fs::remove_dir_all(&dir);
}

/// Sends SIGINT directly to the shell process, mirroring a terminal
/// `Ctrl+C`: the shell's own handler forwards it to the foreground job's
/// process group. A long-running foreground `sleep` should die well
/// before its timeout, and the shell keeps running afterward.
#[test]
fn ctrl_c_interrupts_the_foreground_job() {
    let mut child = spawn_shell();
    send_line(&mut child, "sleep 20");
    child.stdin.as_mut().unwrap().flush().unwrap();

    std::thread::sleep(Duration::from_millis(300));
    unsafe {
        libc::kill(child.id() as libc::pid_t, libc::SIGINT);
    }

    let started = Instant::now();
    send_line(&mut child, "true");
    send_line(&mut child, "exit");
    let output = child.wait_with_output().expect("wait output");

    assert!(
        started.elapsed() < Duration::from_secs(15),
        "shell should not have waited out the full sleep"
    );
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(!stderr.contains("panicked"), "stderr was: {stderr}");
}

#[test]
fn end_of_input_terminates_the_shell_cleanly() {
    let mut child = spawn_shell();
    child.stdin.take();
    let output = child.wait_with_output().expect("wait output");
    assert!(output.status.success() || output.status.code() == Some(0));
}

#[test]
fn quit_builtin_exits_with_status_zero() {
    let mut child = spawn_shell();
    send_line(&mut child, "quit");
    let output = child.wait_with_output().expect("wait output");
    assert_eq!(output.status.code(), Some(0));
}

#[test]
fn prompt_reads_username_from_environment() {
    let mut child = Command::new(env!("CARGO_BIN_EXE_ushell"))
        .env("USER", "quartz")
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn()
        .expect("spawn ushell");
    send_line(&mut child, "exit");
    let output = child.wait_with_output().expect("wait output");
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("quartz@"), "stdout was: {stdout}");
}
