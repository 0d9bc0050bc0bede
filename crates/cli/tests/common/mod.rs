//! Shared helpers for black-box CLI tests.

#![allow(clippy::unwrap_used)]

use std::io::{BufRead, BufReader};
use std::net::SocketAddr;
use std::path::PathBuf;
use std::process::{Child, Command, Stdio};

/// Find the lockexd binary next to the test executable.
///
/// Integration tests run from target/<profile>/deps, so the daemon binary
/// sits two levels up. LOCKEXD_BINARY overrides the lookup.
pub fn lockexd_path() -> Option<PathBuf> {
    if let Ok(path) = std::env::var("LOCKEXD_BINARY") {
        return Some(PathBuf::from(path));
    }
    let exe = std::env::current_exe().ok()?;
    let dir = exe.parent()?.parent()?;
    let candidate = dir.join("lockexd");
    candidate.exists().then_some(candidate)
}

/// A lockexd instance on an ephemeral port, killed on drop.
pub struct DaemonGuard {
    child: Child,
    pub addr: SocketAddr,
}

impl DaemonGuard {
    /// Start a daemon and wait for its READY line. None when the binary
    /// has not been built in this test run.
    pub fn spawn() -> Option<Self> {
        let path = lockexd_path()?;
        let mut child = Command::new(path)
            .args(["--listen", "127.0.0.1:0"])
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::null())
            .spawn()
            .ok()?;

        let stdout = child.stdout.take()?;
        let mut line = String::new();
        BufReader::new(stdout).read_line(&mut line).ok()?;
        let addr = line.trim().strip_prefix("READY ")?.parse().ok()?;

        Some(Self { child, addr })
    }

    pub fn host(&self) -> String {
        self.addr.to_string()
    }
}

impl Drop for DaemonGuard {
    fn drop(&mut self) {
        let _ = self.child.kill();
        let _ = self.child.wait();
    }
}
