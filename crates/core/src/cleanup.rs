// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! One-shot cleanup protocol
//!
//! Every exit path funnels into [`CleanupCoordinator::finalize`], which
//! runs at most once per process: kill the tree, release the lock, close
//! the session, restore the terminal. Releasing before the tree is
//! confirmed dead would let another client start work that races a
//! still-running process, so the order is fixed.

use crate::coordination::{Coordination, LockHandle, LockSession};
use crate::supervisor::ProcessSupervisor;
use std::process::Stdio;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Single-fire latch shared by every exit path.
#[derive(Clone, Debug, Default)]
pub struct CleanupState {
    fired: Arc<AtomicBool>,
}

impl CleanupState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Claim the latch. True for exactly one caller, even when invoked
    /// concurrently from a signal path and the main control flow.
    pub fn fire(&self) -> bool {
        !self.fired.swap(true, Ordering::SeqCst)
    }

    pub fn has_fired(&self) -> bool {
        self.fired.load(Ordering::SeqCst)
    }
}

/// Sequences the teardown steps exactly once.
#[derive(Clone, Debug, Default)]
pub struct CleanupCoordinator {
    state: CleanupState,
}

impl CleanupCoordinator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state(&self) -> CleanupState {
        self.state.clone()
    }

    /// Run the finalization sequence. Later invocations are no-ops; each
    /// step proceeds regardless of whether earlier steps failed.
    pub async fn finalize<C: Coordination>(
        &self,
        session: &LockSession<C>,
        handle: Option<&LockHandle>,
        process: Option<&mut ProcessSupervisor>,
    ) {
        if !self.state.fire() {
            tracing::debug!("cleanup already performed");
            return;
        }

        if let Some(process) = process {
            process.kill_tree().await;
            let code = process.wait().await;
            tracing::debug!(code, "supervised process confirmed dead");
        }

        if let Some(handle) = handle {
            session.release(handle).await;
        }

        session.close().await;
        restore_terminal();
    }
}

/// Put the terminal line discipline back in order. Best-effort: an
/// interactive shell must be usable even after abnormal termination.
pub fn restore_terminal() {
    let _ = std::process::Command::new("stty")
        .arg("sane")
        .stdin(Stdio::inherit())
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .status();
}

#[cfg(test)]
#[path = "cleanup_tests.rs"]
mod tests;
