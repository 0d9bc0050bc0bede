// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Semaphore state machine for bounded-concurrency leases
//!
//! At most `max_leases` holders cluster-wide. The node is created with a
//! lease count by its first acquirer and every later client must request
//! the same count.

use super::{AcquireOutcome, RegistryEvent};
use crate::identity::{ResourceToken, SessionId};
use std::collections::BTreeMap;

#[derive(Clone, Debug)]
struct Lease {
    token: ResourceToken,
    session: SessionId,
}

/// A bounded-concurrency semaphore node
#[derive(Clone, Debug)]
pub struct SemaphoreNode {
    pub path: String,
    pub max_leases: u32,
    /// Holders keyed by token text for deterministic ordering
    leases: BTreeMap<String, Lease>,
}

impl SemaphoreNode {
    pub fn new(path: impl Into<String>, max_leases: u32) -> Self {
        Self {
            path: path.into(),
            max_leases,
            leases: BTreeMap::new(),
        }
    }

    pub fn used_leases(&self) -> u32 {
        self.leases.len() as u32
    }

    pub fn available_leases(&self) -> u32 {
        self.max_leases.saturating_sub(self.used_leases())
    }

    /// Current lease holders, for diagnostics.
    pub fn holders(&self) -> Vec<ResourceToken> {
        self.leases.values().map(|l| l.token.clone()).collect()
    }

    /// One acquisition attempt. `requested_leases` must match the count the
    /// node was created with.
    pub fn try_acquire(
        &self,
        token: &ResourceToken,
        session: &SessionId,
        requested_leases: u32,
    ) -> (SemaphoreNode, AcquireOutcome, Vec<RegistryEvent>) {
        if requested_leases != self.max_leases {
            let events = vec![RegistryEvent::LeaseMismatch {
                path: self.path.clone(),
                expected: self.max_leases,
                requested: requested_leases,
            }];
            return (
                self.clone(),
                AcquireOutcome::Mismatch {
                    expected: self.max_leases,
                },
                events,
            );
        }

        let key = token.to_string();
        if self.leases.contains_key(&key) {
            // Already a holder; a retried request succeeds without
            // consuming another lease.
            return (self.clone(), AcquireOutcome::Granted, Vec::new());
        }

        if self.available_leases() == 0 {
            let holders = self.holders();
            let events = vec![RegistryEvent::Denied {
                path: self.path.clone(),
                token: token.clone(),
                holders: holders.clone(),
            }];
            return (self.clone(), AcquireOutcome::Busy { holders }, events);
        }

        let mut node = self.clone();
        node.leases.insert(
            key,
            Lease {
                token: token.clone(),
                session: session.clone(),
            },
        );
        let events = vec![RegistryEvent::Granted {
            path: self.path.clone(),
            token: token.clone(),
        }];
        (node, AcquireOutcome::Granted, events)
    }

    /// Release the lease held by `token`; no-op for non-holders.
    pub fn release(&self, token: &ResourceToken) -> (SemaphoreNode, Vec<RegistryEvent>) {
        let mut node = self.clone();
        match node.leases.remove(&token.to_string()) {
            Some(lease) => {
                let events = vec![RegistryEvent::Released {
                    path: self.path.clone(),
                    token: lease.token,
                }];
                (node, events)
            }
            None => (node, Vec::new()),
        }
    }

    /// Drop every lease bound to `session`.
    pub fn expire_session(&self, session: &SessionId) -> (SemaphoreNode, Vec<RegistryEvent>) {
        let mut node = self.clone();
        let mut events = Vec::new();
        node.leases.retain(|_, lease| {
            if &lease.session == session {
                events.push(RegistryEvent::Expired {
                    path: self.path.clone(),
                    token: lease.token.clone(),
                });
                false
            } else {
                true
            }
        });
        (node, events)
    }
}

#[cfg(test)]
#[path = "semaphore_tests.rs"]
mod tests;
