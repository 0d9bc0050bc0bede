// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Capability trait for the coordination service

use crate::identity::{LockIdentity, ResourceToken, SessionId};
use async_trait::async_trait;
use thiserror::Error;
use tokio::sync::broadcast;

/// Health of the coordination session, as observed by the client.
///
/// `Lost` is terminal: lock ownership can no longer be guaranteed, so the
/// supervised command must be torn down. `Closed` is only reached through
/// an explicit stop.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SessionEvent {
    Connected,
    Suspended,
    Lost,
    Closed,
}

/// Proof of a granted lock or lease, released exactly once during cleanup.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct LockHandle {
    pub identity: LockIdentity,
    pub token: ResourceToken,
    pub session: SessionId,
}

/// Reply to a single non-blocking acquisition attempt.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum AcquireReply {
    Granted(LockHandle),
    Busy { holders: Vec<ResourceToken> },
}

/// Errors from coordination operations
#[derive(Debug, Error)]
pub enum CoordinationError {
    #[error("failed to connect to coordination service at {hosts}: {reason}")]
    Connect { hosts: String, reason: String },
    #[error("coordination session already closed")]
    AlreadyClosed,
    #[error("coordination session lost")]
    SessionLost,
    #[error("semaphore at {path} has {expected} leases, requested {requested}")]
    LeaseMismatch {
        path: String,
        expected: u32,
        requested: u32,
    },
    #[error("protocol error: {0}")]
    Protocol(String),
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

impl CoordinationError {
    /// Errors that cleanup treats as "the session is already gone".
    pub fn is_already_closed(&self) -> bool {
        matches!(
            self,
            CoordinationError::AlreadyClosed | CoordinationError::SessionLost
        )
    }
}

/// The coordination-service capability.
///
/// Implementations own a live session with the service. All acquisition
/// here is a single non-blocking attempt; the blocking/timeout policy
/// lives in [`super::LockSession`].
#[async_trait]
pub trait Coordination: Send + Sync + 'static {
    /// Session id assigned at connect time.
    fn session_id(&self) -> SessionId;

    /// One acquisition attempt. Creates the lock node if absent.
    async fn try_acquire(
        &self,
        identity: &LockIdentity,
        token: &ResourceToken,
    ) -> Result<AcquireReply, CoordinationError>;

    /// Release a granted handle. Idempotent on the service side.
    async fn release(&self, handle: &LockHandle) -> Result<(), CoordinationError>;

    /// Current lease holders for a node, best-effort; may race with
    /// concurrent acquisition and release.
    async fn lease_holders(
        &self,
        identity: &LockIdentity,
    ) -> Result<Vec<ResourceToken>, CoordinationError>;

    /// Subscribe to session-health events.
    fn subscribe(&self) -> broadcast::Receiver<SessionEvent>;

    /// Stop the session explicitly.
    async fn close(&self) -> Result<(), CoordinationError>;
}
