// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Process supervision
//!
//! Owns the supervised child: shell spawn with inherited output streams,
//! non-blocking polling, blocking exit confirmation, and recursive
//! process-tree termination.

use std::collections::HashMap;
use std::io::Write;
use std::process::Stdio;
use std::time::Duration;
use sysinfo::{Pid, ProcessesToUpdate, Signal, System};
use thiserror::Error;
use tokio::process::{Child, Command};

/// Grace interval between the kill signal and the terminate fallback.
pub const KILL_GRACE: Duration = Duration::from_millis(100);

/// Errors from process supervision
#[derive(Debug, Error)]
pub enum SupervisorError {
    #[error("failed to spawn command: {0}")]
    SpawnFailed(String),
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

/// A supervised child process.
pub struct ProcessSupervisor {
    child: Child,
    pid: u32,
    returncode: Option<i32>,
}

impl ProcessSupervisor {
    /// Launch `command_text` through the shell with stdout/stderr inherited,
    /// so the child's output is visible immediately.
    pub fn spawn(command_text: &str) -> Result<Self, SupervisorError> {
        let child = Command::new("sh")
            .arg("-c")
            .arg(command_text)
            .stdin(Stdio::inherit())
            .stdout(Stdio::inherit())
            .stderr(Stdio::inherit())
            .spawn()
            .map_err(|e| SupervisorError::SpawnFailed(e.to_string()))?;
        let pid = child
            .id()
            .ok_or_else(|| SupervisorError::SpawnFailed("no pid for spawned child".to_string()))?;
        tracing::debug!(pid, command = command_text, "spawned command");
        Ok(Self {
            child,
            pid,
            returncode: None,
        })
    }

    pub fn pid(&self) -> u32 {
        self.pid
    }

    /// Exit code, once observed.
    pub fn returncode(&self) -> Option<i32> {
        self.returncode
    }

    /// Non-blocking poll; records and returns the exit code once the child
    /// has terminated.
    pub fn poll(&mut self) -> Result<Option<i32>, SupervisorError> {
        if let Some(code) = self.returncode {
            return Ok(Some(code));
        }
        match self.child.try_wait()? {
            Some(status) => {
                let code = exit_code(status);
                self.returncode = Some(code);
                Ok(Some(code))
            }
            None => Ok(None),
        }
    }

    /// Block until the child exits and return its code.
    pub async fn wait(&mut self) -> i32 {
        if let Some(code) = self.returncode {
            return code;
        }
        match self.child.wait().await {
            Ok(status) => {
                let code = exit_code(status);
                self.returncode = Some(code);
                code
            }
            Err(e) => {
                tracing::warn!(pid = self.pid, error = %e, "wait on supervised process failed");
                self.returncode = Some(1);
                1
            }
        }
    }

    /// Terminate this child and all of its descendants.
    pub async fn kill_tree(&self) {
        kill_tree(self.pid).await;
    }
}

/// Map an exit status to a code: signal-terminated children report
/// 128 + signal number, like the shell does.
fn exit_code(status: std::process::ExitStatus) -> i32 {
    use std::os::unix::process::ExitStatusExt;
    status
        .code()
        .unwrap_or_else(|| 128 + status.signal().unwrap_or(0))
}

/// Whether this platform can enumerate process descendants. Without it,
/// tree termination degrades to killing only the root pid.
pub fn supports_tree_enumeration() -> bool {
    sysinfo::IS_SUPPORTED_SYSTEM
}

/// Kill `root` and every descendant, children first.
///
/// Each victim gets the kill signal, a short grace interval, then the
/// terminate signal as a fallback for anything that ignored the first.
/// Pids that vanish mid-walk have already exited; that race is logged and
/// tolerated.
pub async fn kill_tree(root: u32) {
    if !supports_tree_enumeration() {
        tracing::warn!(pid = root, "no process-tree enumeration on this platform, killing root only");
        kill_root_only(root);
        return;
    }

    let mut sys = System::new();
    sys.refresh_processes(ProcessesToUpdate::All, true);

    let mut victims = descendants_of(&sys, Pid::from_u32(root));
    victims.push(Pid::from_u32(root));

    for pid in victims {
        match sys.process(pid) {
            Some(process) => {
                tracing::info!(pid = pid.as_u32(), "killing pid");
                if process.kill_with(Signal::Kill).is_none() {
                    process.kill();
                }
                tokio::time::sleep(KILL_GRACE).await;
                let _ = process.kill_with(Signal::Term);
            }
            None => {
                tracing::warn!(pid = pid.as_u32(), "pid gone before kill, may have exited already");
            }
        }
    }
}

/// Descendants of `root` in children-first order.
fn descendants_of(sys: &System, root: Pid) -> Vec<Pid> {
    let mut children_of: HashMap<Pid, Vec<Pid>> = HashMap::new();
    for (pid, process) in sys.processes() {
        if let Some(parent) = process.parent() {
            children_of.entry(parent).or_default().push(*pid);
        }
    }

    let mut ordered = Vec::new();
    collect_post_order(root, &children_of, &mut ordered);
    ordered
}

fn collect_post_order(pid: Pid, children_of: &HashMap<Pid, Vec<Pid>>, out: &mut Vec<Pid>) {
    if let Some(children) = children_of.get(&pid) {
        for child in children {
            collect_post_order(*child, children_of, out);
            out.push(*child);
        }
    }
}

/// Fallback when descendants cannot be enumerated.
fn kill_root_only(pid: u32) {
    let _ = std::process::Command::new("kill")
        .args(["-9", &pid.to_string()])
        .stdin(Stdio::null())
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .status();
}

/// Flush the inherited output streams so child output interleaves promptly.
pub fn flush_inherited_stdio() {
    let _ = std::io::stdout().flush();
    let _ = std::io::stderr().flush();
}

#[cfg(test)]
#[path = "supervisor_tests.rs"]
mod tests;
