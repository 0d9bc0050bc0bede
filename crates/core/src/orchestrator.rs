// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Run orchestration
//!
//! The top-level state machine: acquire the lock, spawn the command under
//! supervision, poll until exit, finalize. Interruptions arrive as typed
//! events (signal action, session loss, poll tick) folded into one select
//! loop, and every path out of `run` goes through the cleanup coordinator.

use crate::cleanup::CleanupCoordinator;
use crate::coordination::{Coordination, LockSession, SessionError, SessionEvent};
use crate::identity::{LockIdentity, ResourceToken};
use crate::signals::{SignalAction, SignalRouter};
use crate::supervisor::{flush_inherited_stdio, ProcessSupervisor};
use std::time::Duration;
use thiserror::Error;
use tokio::sync::broadcast;

/// Configuration for one supervised run.
#[derive(Clone, Debug)]
pub struct RunConfig {
    /// Command text, executed through the shell
    pub command: String,
    /// Lock namespace prefix
    pub lockname: String,
    /// Lease count; 1 means an exclusive lock
    pub concurrency: u32,
    /// Wait for the lock if it is held
    pub blocking: bool,
    /// Deadline for lock acquisition; none waits forever
    pub lock_timeout: Option<Duration>,
    /// Pause between child exit polls
    pub poll_interval: Duration,
}

impl RunConfig {
    pub fn new(command: impl Into<String>) -> Self {
        Self {
            command: command.into(),
            lockname: "lockex".to_string(),
            concurrency: 1,
            blocking: true,
            lock_timeout: None,
            poll_interval: Duration::from_secs(3),
        }
    }

    pub fn with_lockname(mut self, lockname: impl Into<String>) -> Self {
        self.lockname = lockname.into();
        self
    }

    pub fn with_concurrency(mut self, concurrency: u32) -> Self {
        self.concurrency = concurrency;
        self
    }

    pub fn with_blocking(mut self, blocking: bool) -> Self {
        self.blocking = blocking;
        self
    }

    pub fn with_lock_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.lock_timeout = timeout;
        self
    }

    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    /// Reject unusable configurations before any coordination contact.
    pub fn validate(&self) -> Result<(), UsageError> {
        if self.command.trim().is_empty() {
            return Err(UsageError("no command given".to_string()));
        }
        if self.concurrency == 0 {
            return Err(UsageError("concurrency must be at least 1".to_string()));
        }
        Ok(())
    }

    /// The lock identity this run contends on.
    pub fn identity(&self) -> LockIdentity {
        LockIdentity::derive(&self.lockname, &self.command, self.concurrency)
    }
}

/// Rejected before any coordination contact.
#[derive(Debug, Error)]
#[error("usage error: {0}")]
pub struct UsageError(pub String);

/// Progress of a run. Connection establishment precedes construction, so
/// the machine starts at `Init` with a live session in hand.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RunState {
    Init,
    LockAcquiring,
    Running,
    Finalizing,
    Terminal(i32),
}

/// How the acquisition wait ended.
enum AcquireWait {
    Result(Result<crate::coordination::LockHandle, SessionError>),
    Lost,
    Interrupted,
}

/// Drives one command under one lock.
pub struct Orchestrator<C: Coordination> {
    session: LockSession<C>,
    config: RunConfig,
    token: ResourceToken,
    identity: LockIdentity,
    cleanup: CleanupCoordinator,
    state: RunState,
}

impl<C: Coordination> Orchestrator<C> {
    /// Build an orchestrator over an established session.
    pub fn new(session: LockSession<C>, config: RunConfig, token: ResourceToken) -> Self {
        let identity = config.identity();
        Self {
            session,
            config,
            token,
            identity,
            cleanup: CleanupCoordinator::new(),
            state: RunState::Init,
        }
    }

    pub fn state(&self) -> RunState {
        self.state
    }

    /// Run to completion and return the process exit code.
    pub async fn run(&mut self) -> i32 {
        let path = self.identity.path();
        self.state = RunState::LockAcquiring;
        tracing::info!(
            lockname = %path,
            resource = %self.token,
            concurrent = self.config.concurrency,
            blocking = self.config.blocking,
            command = %self.config.command,
            "acquiring lock"
        );

        if !self.identity.is_exclusive() {
            let holders = self.session.lease_holders(&self.identity).await;
            let listing: Vec<String> = holders.iter().map(ToString::to_string).collect();
            tracing::info!(lease_holders = %listing.join(","), "current lease holders");
        }

        let mut events = self.session.subscribe();

        // Decide first, act after: the acquire future borrows the session,
        // so finalization must wait until the select is done.
        let acquired = {
            let acquire = self.session.acquire(
                &self.identity,
                &self.token,
                self.config.blocking,
                self.config.lock_timeout,
            );
            tokio::select! {
                result = acquire => AcquireWait::Result(result),
                _ = wait_for_lost(&mut events) => AcquireWait::Lost,
                _ = tokio::signal::ctrl_c() => AcquireWait::Interrupted,
            }
        };

        let handle = match acquired {
            AcquireWait::Result(Ok(handle)) => handle,
            AcquireWait::Result(Err(e)) => {
                tracing::error!(
                    lockname = %path,
                    resource = %self.token,
                    command = %self.config.command,
                    error = %e,
                    "could not acquire lock"
                );
                return self.finish(None, None, 1).await;
            }
            AcquireWait::Lost => {
                tracing::error!(lockname = %path, "session lost while waiting for lock");
                return self.finish(None, None, 1).await;
            }
            AcquireWait::Interrupted => {
                tracing::info!("interrupted by user");
                return self.finish(None, None, 1).await;
            }
        };

        tracing::info!(lockname = %path, "lock acquired, executing command");
        let mut process = match ProcessSupervisor::spawn(&self.config.command) {
            Ok(process) => process,
            Err(e) => {
                tracing::error!(command = %self.config.command, error = %e, "failed to spawn command");
                return self.finish(Some(&handle), None, 1).await;
            }
        };
        self.state = RunState::Running;

        let mut router = match SignalRouter::install() {
            Ok(router) => router,
            Err(e) => {
                tracing::error!(error = %e, "failed to install signal handlers");
                return self.finish(Some(&handle), Some(&mut process), 1).await;
            }
        };

        let mut poll = tokio::time::interval(self.config.poll_interval);
        poll.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = poll.tick() => {
                    flush_inherited_stdio();
                    match process.poll() {
                        Ok(Some(code)) => {
                            tracing::info!(code, command = %self.config.command, "command exited");
                            return self.finish(Some(&handle), Some(&mut process), code).await;
                        }
                        Ok(None) => {}
                        Err(e) => {
                            tracing::error!(error = %e, "failed to poll command");
                            return self.finish(Some(&handle), Some(&mut process), 1).await;
                        }
                    }
                }

                action = router.recv() => match action {
                    SignalAction::Terminate => {
                        tracing::info!("received terminate signal, tearing down");
                        process.kill_tree().await;
                        let code = process.wait().await;
                        return self.finish(Some(&handle), None, code).await;
                    }
                    SignalAction::Ignore(name) => {
                        tracing::debug!(signal = name, "ignoring signal");
                    }
                },

                event = next_session_event(&mut events) => match event {
                    SessionEvent::Lost => {
                        tracing::error!(
                            lockname = %path,
                            resource = %self.token,
                            "session lost, lock ownership can no longer be guaranteed"
                        );
                        return self.finish(Some(&handle), Some(&mut process), 1).await;
                    }
                    SessionEvent::Suspended => {
                        tracing::warn!(lockname = %path, "session suspended, awaiting reconnect");
                    }
                    other => {
                        tracing::debug!(?other, "session event");
                    }
                },
            }
        }
    }

    /// Finalize and transition to the terminal state.
    async fn finish(
        &mut self,
        handle: Option<&crate::coordination::LockHandle>,
        process: Option<&mut ProcessSupervisor>,
        code: i32,
    ) -> i32 {
        self.state = RunState::Finalizing;
        self.cleanup.finalize(&self.session, handle, process).await;
        self.state = RunState::Terminal(code);
        code
    }
}

/// Resolve once the session is lost; suspensions only log.
async fn wait_for_lost(events: &mut broadcast::Receiver<SessionEvent>) {
    loop {
        match next_session_event(events).await {
            SessionEvent::Lost => return,
            SessionEvent::Suspended => {
                tracing::warn!("session suspended, awaiting reconnect");
            }
            other => {
                tracing::debug!(?other, "session event");
            }
        }
    }
}

/// Next event from the health stream, skipping lag and never resolving
/// once the stream closes.
async fn next_session_event(events: &mut broadcast::Receiver<SessionEvent>) -> SessionEvent {
    loop {
        match events.recv().await {
            Ok(event) => return event,
            Err(broadcast::error::RecvError::Lagged(skipped)) => {
                tracing::debug!(skipped, "session event stream lagged");
            }
            Err(broadcast::error::RecvError::Closed) => {
                return std::future::pending::<SessionEvent>().await;
            }
        }
    }
}

#[cfg(test)]
#[path = "orchestrator_tests.rs"]
mod tests;
