//! Integration tests for the mstat binary
//!
//! Bootstrap-mode tests drive the hop directly: the test plays the
//! supervisor, installs a pipe on the marker's descriptor and decides what to
//! send. They need no privileges. Tests that create a real cgroup require
//! root and are marked with #[ignore]:
//!   sudo cargo test -- --ignored

use std::ffi::OsString;
use std::io::{self, Write};
use std::os::fd::{AsRawFd, RawFd};
use std::os::unix::ffi::OsStringExt;
use std::os::unix::process::{CommandExt, ExitStatusExt};
use std::process::{Command, Output, Stdio};

const MSTAT: &str = env!("CARGO_BIN_EXE_mstat");

fn install_fd(src: RawFd, dst: RawFd) -> io::Result<()> {
    let rc = unsafe {
        if src == dst {
            libc::fcntl(dst, libc::F_SETFD, 0)
        } else {
            libc::dup2(src, dst)
        }
    };
    if rc < 0 {
        return Err(io::Error::last_os_error());
    }
    Ok(())
}

/// Run `mstat ARGS` with a pipe on fd 3, write `message` into it (if any)
/// and close it
fn run_bootstrap(args: &[&str], message: Option<&[u8]>) -> Output {
    run_bootstrap_with_env(args, message, &[])
}

fn run_bootstrap_with_env(
    args: &[&str],
    message: Option<&[u8]>,
    env: &[(OsString, OsString)],
) -> Output {
    let (reader, mut writer) = io::pipe().unwrap();
    let read_fd = reader.as_raw_fd();

    let mut cmd = Command::new(MSTAT);
    cmd.args(args)
        .envs(env.iter().cloned())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped());
    unsafe {
        cmd.pre_exec(move || install_fd(read_fd, 3));
    }
    let child = cmd.spawn().unwrap();
    drop(reader);

    if let Some(bytes) = message {
        writer.write_all(bytes).unwrap();
    }
    drop(writer);

    child.wait_with_output().unwrap()
}

/// The hop execs the target once released, with the env overrides applied
#[test]
fn test_bootstrap_execs_after_sentinel() {
    let output = run_bootstrap(
        &[
            "--env",
            "MSTAT_TEST_VAR=bar",
            "--",
            "--INTERNAL_FD=3",
            "sh",
            "-c",
            "printf %s \"$MSTAT_TEST_VAR\"",
        ],
        Some(b"ok"),
    );

    assert!(output.status.success(), "{:?}", output);
    assert_eq!(output.stdout, b"bar");
}

/// Inherited variables that are not UTF-8 reach the target byte for byte
#[test]
fn test_bootstrap_passes_non_utf8_environment() {
    let raw = (
        OsString::from("MSTAT_TEST_RAW"),
        OsString::from_vec(vec![0xff, 0xfe]),
    );
    let output = run_bootstrap_with_env(
        &["--", "--INTERNAL_FD=3", "sh", "-c", "printf %s \"$MSTAT_TEST_RAW\""],
        Some(b"ok"),
        &[raw],
    );

    assert!(output.status.success(), "{:?}", output);
    assert_eq!(output.stdout, vec![0xff, 0xfe]);
}

/// Exec replaces the hop, so the target's exit status is the process's
#[test]
fn test_bootstrap_passes_exit_code_through() {
    let output = run_bootstrap(&["--", "--INTERNAL_FD=3", "sh", "-c", "exit 7"], Some(b"ok"));
    assert_eq!(output.status.code(), Some(7));

    let output = run_bootstrap(
        &["--", "--INTERNAL_FD=3", "sh", "-c", "kill -TERM $$"],
        Some(b"ok"),
    );
    assert_eq!(output.status.signal(), Some(libc::SIGTERM));
}

/// Closing the pipe without the sentinel must never reach exec
#[test]
fn test_bootstrap_without_sentinel_does_not_exec() {
    let dir = tempfile::tempdir().unwrap();
    let marker = dir.path().join("ran");
    let marker = marker.to_str().unwrap();

    let output = run_bootstrap(&["--", "--INTERNAL_FD=3", "touch", marker], None);

    assert_eq!(output.status.code(), Some(1));
    assert!(String::from_utf8_lossy(&output.stderr).contains("handshake"));
    assert!(!dir.path().join("ran").exists());
}

/// A wrong sentinel is a protocol error too
#[test]
fn test_bootstrap_rejects_wrong_sentinel() {
    let output = run_bootstrap(&["--", "--INTERNAL_FD=3", "true"], Some(b"no"));
    assert_eq!(output.status.code(), Some(1));
    assert!(String::from_utf8_lossy(&output.stderr).contains("unexpected sentinel"));
}

/// A marker naming a descriptor that was never installed
#[test]
fn test_bootstrap_with_missing_descriptor() {
    let output = Command::new(MSTAT)
        .args(["--", "--INTERNAL_FD=200", "true"])
        .output()
        .unwrap();
    assert_eq!(output.status.code(), Some(1));
    assert!(String::from_utf8_lossy(&output.stderr).contains("error:"));
}

/// A missing target after release is reported, not exec'd
#[test]
fn test_bootstrap_missing_program() {
    let output = run_bootstrap(
        &["--", "--INTERNAL_FD=3", "mstat_no_such_program_xyz"],
        Some(b"ok"),
    );
    assert_eq!(output.status.code(), Some(1));
    assert!(String::from_utf8_lossy(&output.stderr).contains("command not found"));
}

#[test]
fn test_check_exits_cleanly() {
    let output = Command::new(MSTAT).arg("--check").output().unwrap();
    assert!(output.status.success());
    assert!(String::from_utf8_lossy(&output.stdout).contains("Cgroup v2"));
}

#[test]
fn test_no_program_is_an_error() {
    let output = Command::new(MSTAT).output().unwrap();
    assert!(!output.status.success());
}

/// Full run in a real cgroup: TSV is written and the target's code surfaces
#[test]
#[ignore]
fn test_measure_real_command() {
    let dir = tempfile::tempdir().unwrap();
    let tsv = dir.path().join("usage.tsv");

    let output = Command::new(MSTAT)
        .args(["-f", "100", "-o", tsv.to_str().unwrap(), "--"])
        .args(["sh", "-c", "sleep 0.2; exit 3"])
        .output()
        .unwrap();

    assert_eq!(output.status.code(), Some(3), "{:?}", output);
    let content = std::fs::read_to_string(&tsv).unwrap();
    let mut lines = content.lines();
    assert_eq!(lines.next(), Some("time\trss"));
    assert!(lines.next().unwrap().starts_with("0\t"));
    assert!(content.lines().count() >= 3);
}

/// Verbose mode dumps the last raw snapshot as JSON on stdout
#[test]
#[ignore]
fn test_verbose_dumps_raw_stats() {
    let output = Command::new(MSTAT)
        .args(["-v", "--", "sh", "-c", "sleep 0.1"])
        .output()
        .unwrap();

    assert!(output.status.success(), "{:?}", output);
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("\n    \"usage\": "));
}
