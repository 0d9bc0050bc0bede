//! End-to-end locking behavior against a live lockexd.

#![allow(clippy::unwrap_used)]
#![allow(clippy::expect_used)]

mod common;

use assert_cmd::Command;
use common::DaemonGuard;
use predicates::prelude::*;
use std::time::Duration;

fn lockex(daemon: &DaemonGuard) -> Command {
    let mut cmd = Command::cargo_bin("lockex").unwrap();
    cmd.arg("-z")
        .arg(daemon.host())
        .env("LOCKEX_POLL_INTERVAL_MS", "50")
        .timeout(Duration::from_secs(30));
    cmd
}

/// Background lockex invocation holding a lock, killed on drop.
struct Holder(std::process::Child);

impl Holder {
    /// Start `lockex -z <daemon> <args...>` and give it time to acquire.
    fn start(daemon: &DaemonGuard, args: &[&str]) -> Self {
        let mut full: Vec<String> = vec!["-z".to_string(), daemon.host()];
        full.extend(args.iter().map(|s| s.to_string()));
        let child = std::process::Command::new(env!("CARGO_BIN_EXE_lockex"))
            .args(&full)
            .env("LOCKEX_POLL_INTERVAL_MS", "50")
            .stdout(std::process::Stdio::null())
            .stderr(std::process::Stdio::null())
            .spawn()
            .unwrap();
        std::thread::sleep(Duration::from_millis(1500));
        Self(child)
    }
}

impl Drop for Holder {
    fn drop(&mut self) {
        let _ = self.0.kill();
        let _ = self.0.wait();
    }
}

#[test]
fn test_command_output_passes_through() {
    let Some(daemon) = DaemonGuard::spawn() else {
        eprintln!("lockexd not built, skipping");
        return;
    };

    lockex(&daemon)
        .args(["--", "echo", "hello", "from", "lockex"])
        .assert()
        .success()
        .stdout(predicate::str::contains("hello from lockex"));
}

#[test]
fn test_child_exit_code_passes_through() {
    let Some(daemon) = DaemonGuard::spawn() else {
        eprintln!("lockexd not built, skipping");
        return;
    };

    lockex(&daemon)
        .args(["--", "exit", "7"])
        .assert()
        .failure()
        .code(7);
}

#[test]
fn test_non_blocking_contender_fails_while_lock_is_held() {
    let Some(daemon) = DaemonGuard::spawn() else {
        eprintln!("lockexd not built, skipping");
        return;
    };

    // Identical command text contends on the same lock path.
    let _holder = Holder::start(&daemon, &["--", "sleep", "10"]);

    lockex(&daemon)
        .args(["--no-blocking", "--", "sleep", "10"])
        .assert()
        .failure()
        .code(1);
}

#[test]
fn test_blocking_contender_times_out_after_locktimeout() {
    let Some(daemon) = DaemonGuard::spawn() else {
        eprintln!("lockexd not built, skipping");
        return;
    };

    let _holder = Holder::start(&daemon, &["--", "sleep", "20"]);

    let start = std::time::Instant::now();
    lockex(&daemon)
        .args(["-t", "1", "--", "sleep", "20"])
        .assert()
        .failure()
        .code(1);
    let elapsed = start.elapsed();
    assert!(elapsed >= Duration::from_secs(1), "elapsed {elapsed:?}");
    assert!(elapsed < Duration::from_secs(10), "elapsed {elapsed:?}");
}

#[test]
fn test_distinct_commands_do_not_contend() {
    let Some(daemon) = DaemonGuard::spawn() else {
        eprintln!("lockexd not built, skipping");
        return;
    };

    let _holder = Holder::start(&daemon, &["--", "sleep", "10"]);

    // Different command text maps to a different lock path.
    lockex(&daemon)
        .args(["--no-blocking", "--", "echo", "independent"])
        .assert()
        .success()
        .stdout(predicate::str::contains("independent"));
}

#[test]
fn test_semaphore_admits_a_second_holder() {
    let Some(daemon) = DaemonGuard::spawn() else {
        eprintln!("lockexd not built, skipping");
        return;
    };

    let _holder = Holder::start(&daemon, &["-c", "2", "--", "sleep", "6"]);

    // Same command text and lease count: a second lease is free.
    lockex(&daemon)
        .args(["-c", "2", "--no-blocking", "--", "sleep", "6"])
        .assert()
        .success();
}

#[test]
fn test_sigterm_tears_the_run_down() {
    let Some(daemon) = DaemonGuard::spawn() else {
        eprintln!("lockexd not built, skipping");
        return;
    };

    let mut holder = Holder::start(&daemon, &["--", "sleep", "30"]);
    let _ = std::process::Command::new("kill")
        .arg(holder.0.id().to_string())
        .status();

    // The run must exit promptly with the killed child's code, long
    // before the sleep would have finished.
    let mut status = None;
    for _ in 0..100 {
        if let Ok(Some(s)) = holder.0.try_wait() {
            status = Some(s);
            break;
        }
        std::thread::sleep(Duration::from_millis(100));
    }
    let status = status.expect("lockex did not exit after SIGTERM");
    assert_eq!(status.code(), Some(128 + 9));
}

#[test]
fn test_mismatched_lease_count_fails() {
    let Some(daemon) = DaemonGuard::spawn() else {
        eprintln!("lockexd not built, skipping");
        return;
    };

    let _holder = Holder::start(&daemon, &["-c", "2", "--", "sleep", "10"]);

    lockex(&daemon)
        .args(["-c", "3", "--", "sleep", "10"])
        .assert()
        .failure()
        .code(1);
}
