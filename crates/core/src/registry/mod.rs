// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Lock registry state machines
//!
//! Pure state machines for the two node kinds in the coordination
//! namespace: exclusive locks and bounded-concurrency semaphores.
//! Transitions return a new state plus emitted events; the host process
//! (daemon or in-memory fake) applies the state and logs the events.

mod lock;
mod semaphore;

pub use lock::{LockNode, LockState};
pub use semaphore::SemaphoreNode;

use crate::identity::{ResourceToken, SessionId};

/// Result of a single acquisition attempt against a node.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum AcquireOutcome {
    Granted,
    Busy { holders: Vec<ResourceToken> },
    /// Semaphore created with a different lease count; all clients of one
    /// node must agree on the count.
    Mismatch { expected: u32 },
}

/// Events emitted by registry transitions.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum RegistryEvent {
    Granted {
        path: String,
        token: ResourceToken,
    },
    Denied {
        path: String,
        token: ResourceToken,
        holders: Vec<ResourceToken>,
    },
    Released {
        path: String,
        token: ResourceToken,
    },
    /// Holder dropped because its session expired or closed.
    Expired {
        path: String,
        token: ResourceToken,
    },
    LeaseMismatch {
        path: String,
        expected: u32,
        requested: u32,
    },
}

/// A node in the lock namespace.
#[derive(Clone, Debug)]
pub enum Node {
    Exclusive(LockNode),
    Shared(SemaphoreNode),
}

impl Node {
    /// Create a node for a path. `max_leases == 1` yields an exclusive lock.
    pub fn new(path: impl Into<String>, max_leases: u32) -> Self {
        let path = path.into();
        if max_leases <= 1 {
            Node::Exclusive(LockNode::new(path))
        } else {
            Node::Shared(SemaphoreNode::new(path, max_leases))
        }
    }

    pub fn path(&self) -> &str {
        match self {
            Node::Exclusive(lock) => &lock.path,
            Node::Shared(sem) => &sem.path,
        }
    }

    /// Current holders, for diagnostics.
    pub fn holders(&self) -> Vec<ResourceToken> {
        match self {
            Node::Exclusive(lock) => lock.holder().into_iter().cloned().collect(),
            Node::Shared(sem) => sem.holders(),
        }
    }

    pub fn is_unheld(&self) -> bool {
        self.holders().is_empty()
    }

    /// One acquisition attempt.
    pub fn try_acquire(
        &self,
        token: &ResourceToken,
        session: &SessionId,
        max_leases: u32,
    ) -> (Node, AcquireOutcome, Vec<RegistryEvent>) {
        match self {
            Node::Exclusive(lock) => {
                let (lock, outcome, events) = lock.try_acquire(token, session);
                (Node::Exclusive(lock), outcome, events)
            }
            Node::Shared(sem) => {
                let (sem, outcome, events) = sem.try_acquire(token, session, max_leases);
                (Node::Shared(sem), outcome, events)
            }
        }
    }

    /// Release the holder identified by `token`. No-op for non-holders.
    pub fn release(&self, token: &ResourceToken) -> (Node, Vec<RegistryEvent>) {
        match self {
            Node::Exclusive(lock) => {
                let (lock, events) = lock.release(token);
                (Node::Exclusive(lock), events)
            }
            Node::Shared(sem) => {
                let (sem, events) = sem.release(token);
                (Node::Shared(sem), events)
            }
        }
    }

    /// Drop every holding bound to `session`.
    pub fn expire_session(&self, session: &SessionId) -> (Node, Vec<RegistryEvent>) {
        match self {
            Node::Exclusive(lock) => {
                let (lock, events) = lock.expire_session(session);
                (Node::Exclusive(lock), events)
            }
            Node::Shared(sem) => {
                let (sem, events) = sem.expire_session(session);
                (Node::Shared(sem), events)
            }
        }
    }
}
