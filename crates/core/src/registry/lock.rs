// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Exclusive lock state machine
//!
//! A lock node is either free or held by exactly one resource token,
//! bound to the session that acquired it. Session expiry frees the lock.

use super::{AcquireOutcome, RegistryEvent};
use crate::identity::{ResourceToken, SessionId};

/// Lock state
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum LockState {
    Free,
    Held {
        token: ResourceToken,
        session: SessionId,
    },
}

/// An exclusive lock node
#[derive(Clone, Debug)]
pub struct LockNode {
    pub path: String,
    pub state: LockState,
}

impl LockNode {
    pub fn new(path: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            state: LockState::Free,
        }
    }

    pub fn is_free(&self) -> bool {
        matches!(self.state, LockState::Free)
    }

    /// Get the current holder, if any
    pub fn holder(&self) -> Option<&ResourceToken> {
        match &self.state {
            LockState::Free => None,
            LockState::Held { token, .. } => Some(token),
        }
    }

    /// One acquisition attempt. Re-acquisition by the current holder is
    /// granted again, so a retried request after a lost reply succeeds.
    pub fn try_acquire(
        &self,
        token: &ResourceToken,
        session: &SessionId,
    ) -> (LockNode, AcquireOutcome, Vec<RegistryEvent>) {
        match &self.state {
            LockState::Free => {
                let mut node = self.clone();
                node.state = LockState::Held {
                    token: token.clone(),
                    session: session.clone(),
                };
                let events = vec![RegistryEvent::Granted {
                    path: self.path.clone(),
                    token: token.clone(),
                }];
                (node, AcquireOutcome::Granted, events)
            }
            LockState::Held {
                token: current,
                session: bound,
            } => {
                if current == token && bound == session {
                    (self.clone(), AcquireOutcome::Granted, Vec::new())
                } else {
                    let holders = vec![current.clone()];
                    let events = vec![RegistryEvent::Denied {
                        path: self.path.clone(),
                        token: token.clone(),
                        holders: holders.clone(),
                    }];
                    (self.clone(), AcquireOutcome::Busy { holders }, events)
                }
            }
        }
    }

    /// Release by the holder; no-op for anyone else.
    pub fn release(&self, token: &ResourceToken) -> (LockNode, Vec<RegistryEvent>) {
        match &self.state {
            LockState::Held { token: current, .. } if current == token => {
                let mut node = self.clone();
                node.state = LockState::Free;
                let events = vec![RegistryEvent::Released {
                    path: self.path.clone(),
                    token: token.clone(),
                }];
                (node, events)
            }
            _ => (self.clone(), Vec::new()),
        }
    }

    /// Free the lock if its holder's session is gone.
    pub fn expire_session(&self, session: &SessionId) -> (LockNode, Vec<RegistryEvent>) {
        match &self.state {
            LockState::Held {
                token,
                session: bound,
            } if bound == session => {
                let mut node = self.clone();
                let events = vec![RegistryEvent::Expired {
                    path: self.path.clone(),
                    token: token.clone(),
                }];
                node.state = LockState::Free;
                (node, events)
            }
            _ => (self.clone(), Vec::new()),
        }
    }
}

#[cfg(test)]
#[path = "lock_tests.rs"]
mod tests;
