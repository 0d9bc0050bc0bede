// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Lock session: acquisition policy over the coordination capability
//!
//! Adds the blocking/timeout/retry behavior on top of single-attempt
//! `try_acquire`, and makes release/close idempotent for cleanup.

use super::{AcquireReply, Coordination, CoordinationError, LockHandle, SessionEvent};
use crate::identity::{LockIdentity, ResourceToken};
use std::time::Duration;
use thiserror::Error;
use tokio::sync::broadcast;
use tokio::time::Instant;

/// Tuning for the acquisition loop.
#[derive(Clone, Copy, Debug)]
pub struct SessionConfig {
    /// Pause between acquisition attempts while blocking
    pub retry_interval: Duration,
    /// How many times a failing lock command is attempted before the
    /// error is surfaced
    pub command_retries: u32,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            retry_interval: Duration::from_millis(250),
            command_retries: 1,
        }
    }
}

impl SessionConfig {
    pub fn with_command_retries(mut self, retries: u32) -> Self {
        self.command_retries = retries;
        self
    }

    pub fn with_retry_interval(mut self, interval: Duration) -> Self {
        self.retry_interval = interval;
        self
    }
}

/// Errors from lock acquisition
#[derive(Debug, Error)]
pub enum SessionError {
    #[error("timed out after {} waiting for {path}", humantime::format_duration(*waited))]
    LockTimeout { path: String, waited: Duration },
    #[error("lock {path} is unavailable")]
    NotAcquired {
        path: String,
        holders: Vec<ResourceToken>,
    },
    #[error(transparent)]
    Coordination(#[from] CoordinationError),
}

/// A session with the coordination service, scoped to one run.
pub struct LockSession<C: Coordination> {
    coord: C,
    config: SessionConfig,
}

impl<C: Coordination> LockSession<C> {
    pub fn new(coord: C, config: SessionConfig) -> Self {
        Self { coord, config }
    }

    pub fn coordination(&self) -> &C {
        &self.coord
    }

    pub fn subscribe(&self) -> broadcast::Receiver<SessionEvent> {
        self.coord.subscribe()
    }

    /// Acquire the lock for `identity`.
    ///
    /// Non-blocking mode returns [`SessionError::NotAcquired`] on the first
    /// miss. Blocking mode retries until granted, or until `lock_timeout`
    /// elapses when one is given. Transient coordination failures are
    /// retried up to the command-retry budget.
    pub async fn acquire(
        &self,
        identity: &LockIdentity,
        token: &ResourceToken,
        blocking: bool,
        lock_timeout: Option<Duration>,
    ) -> Result<LockHandle, SessionError> {
        let path = identity.path();
        let deadline = lock_timeout.map(|d| Instant::now() + d);
        let mut error_budget = self.config.command_retries.max(1);

        loop {
            match self.coord.try_acquire(identity, token).await {
                Ok(AcquireReply::Granted(handle)) => return Ok(handle),
                Ok(AcquireReply::Busy { holders }) => {
                    if !blocking {
                        return Err(SessionError::NotAcquired { path, holders });
                    }
                    tracing::debug!(%path, holders = holders.len(), "lock busy, waiting");
                }
                Err(e @ CoordinationError::LeaseMismatch { .. }) => return Err(e.into()),
                Err(e) if e.is_already_closed() => return Err(e.into()),
                Err(e) => {
                    error_budget -= 1;
                    if error_budget == 0 {
                        return Err(e.into());
                    }
                    tracing::warn!(%path, error = %e, "lock attempt failed, retrying");
                }
            }

            match deadline {
                Some(deadline) => {
                    let now = Instant::now();
                    if now >= deadline {
                        return Err(SessionError::LockTimeout {
                            path,
                            waited: lock_timeout.unwrap_or_default(),
                        });
                    }
                    let pause = self.config.retry_interval.min(deadline - now);
                    tokio::time::sleep(pause).await;
                }
                None => tokio::time::sleep(self.config.retry_interval).await,
            }
        }
    }

    /// Current lease holders, best-effort: failures are logged and yield
    /// an empty listing.
    pub async fn lease_holders(&self, identity: &LockIdentity) -> Vec<ResourceToken> {
        match self.coord.lease_holders(identity).await {
            Ok(holders) => holders,
            Err(e) => {
                tracing::debug!(path = %identity.path(), error = %e, "could not list lease holders");
                Vec::new()
            }
        }
    }

    /// Release a handle. Idempotent: a session that is already gone is not
    /// an error during cleanup.
    pub async fn release(&self, handle: &LockHandle) {
        match self.coord.release(handle).await {
            Ok(()) => tracing::info!(path = %handle.identity.path(), "lock released"),
            Err(e) if e.is_already_closed() => {
                tracing::debug!(path = %handle.identity.path(), "release on closed session");
            }
            Err(e) => {
                tracing::warn!(path = %handle.identity.path(), error = %e, "lock release failed");
            }
        }
    }

    /// Stop the session. Already-closed is expected during cleanup and
    /// swallowed silently; anything else is logged but never propagated.
    pub async fn close(&self) {
        match self.coord.close().await {
            Ok(()) => tracing::debug!("coordination session closed"),
            Err(e) if e.is_already_closed() => {}
            Err(e) => tracing::warn!(error = %e, "error closing coordination session"),
        }
    }
}

#[cfg(test)]
#[path = "session_tests.rs"]
mod tests;
