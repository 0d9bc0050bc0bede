// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Daemon state: the lock namespace and the session table
//!
//! Sessions bind holdings to client liveness. A session that stops
//! heartbeating past the stale threshold is expired and everything it
//! held is released, which is what makes client crashes safe.

use crate::protocol::ExpiryConfig;
use lockex_core::registry::{AcquireOutcome, Node};
use lockex_core::{Clock, ResourceToken, SessionId};
use std::collections::{HashMap, HashSet};
use std::time::Instant;

/// One live client session.
#[derive(Clone, Debug)]
pub struct SessionEntry {
    pub token: ResourceToken,
    pub last_heartbeat: Instant,
    /// Paths this session currently holds
    pub holdings: HashSet<String>,
}

/// In-memory daemon state.
pub struct DaemonState {
    nodes: HashMap<String, Node>,
    sessions: HashMap<String, SessionEntry>,
    expiry: ExpiryConfig,
    pub start_time: Instant,
}

impl DaemonState {
    pub fn new(expiry: ExpiryConfig) -> Self {
        Self {
            nodes: HashMap::new(),
            sessions: HashMap::new(),
            expiry,
            start_time: Instant::now(),
        }
    }

    pub fn expiry(&self) -> ExpiryConfig {
        self.expiry
    }

    pub fn session_count(&self) -> usize {
        self.sessions.len()
    }

    /// Nodes with at least one holder.
    pub fn held_node_count(&self) -> usize {
        self.nodes.values().filter(|n| !n.is_unheld()).count()
    }

    /// Open a session for a client.
    pub fn open_session(&mut self, token: ResourceToken, clock: &impl Clock) -> String {
        let session = uuid::Uuid::new_v4().to_string();
        tracing::info!(%session, resource = %token, "session opened");
        self.sessions.insert(
            session.clone(),
            SessionEntry {
                token,
                last_heartbeat: clock.now(),
                holdings: HashSet::new(),
            },
        );
        session
    }

    /// Refresh a session's heartbeat. False when the session is unknown.
    pub fn heartbeat(&mut self, session: &str, clock: &impl Clock) -> bool {
        match self.sessions.get_mut(session) {
            Some(entry) => {
                entry.last_heartbeat = clock.now();
                true
            }
            None => false,
        }
    }

    /// One acquisition attempt. Creates the node if absent; any request on
    /// a live session also counts as a heartbeat.
    pub fn try_acquire(
        &mut self,
        session: &str,
        path: &str,
        token: &ResourceToken,
        max_leases: u32,
        clock: &impl Clock,
    ) -> Option<AcquireOutcome> {
        if !self.heartbeat(session, clock) {
            return None;
        }

        let node = self
            .nodes
            .entry(path.to_string())
            .or_insert_with(|| Node::new(path, max_leases));
        let (node, outcome, events) =
            node.try_acquire(token, &SessionId::new(session), max_leases);
        self.nodes.insert(path.to_string(), node);
        for event in &events {
            tracing::info!(?event, "registry event");
        }

        if outcome == AcquireOutcome::Granted {
            if let Some(entry) = self.sessions.get_mut(session) {
                entry.holdings.insert(path.to_string());
            }
        }
        Some(outcome)
    }

    /// Release a holding. Unknown sessions get `None`; releasing something
    /// not held is a quiet no-op.
    pub fn release(
        &mut self,
        session: &str,
        path: &str,
        token: &ResourceToken,
        clock: &impl Clock,
    ) -> Option<()> {
        if !self.heartbeat(session, clock) {
            return None;
        }

        if let Some(node) = self.nodes.get(path) {
            let (node, events) = node.release(token);
            self.nodes.insert(path.to_string(), node);
            for event in &events {
                tracing::info!(?event, "registry event");
            }
        }
        if let Some(entry) = self.sessions.get_mut(session) {
            entry.holdings.remove(path);
        }
        Some(())
    }

    /// Current holders of a node.
    pub fn holders(&self, path: &str) -> Vec<ResourceToken> {
        self.nodes.get(path).map(Node::holders).unwrap_or_default()
    }

    /// Close a session explicitly, dropping its holdings.
    pub fn close_session(&mut self, session: &str) -> bool {
        match self.sessions.remove(session) {
            Some(entry) => {
                tracing::info!(%session, resource = %entry.token, "session closed");
                self.drop_holdings(session, &entry.holdings);
                true
            }
            None => false,
        }
    }

    /// Expire sessions whose heartbeat is older than the stale threshold.
    /// Returns how many sessions were dropped.
    pub fn expire_stale(&mut self, clock: &impl Clock) -> usize {
        let now = clock.now();
        let stale: Vec<String> = self
            .sessions
            .iter()
            .filter(|(_, entry)| {
                now.duration_since(entry.last_heartbeat) > self.expiry.stale_threshold
            })
            .map(|(id, _)| id.clone())
            .collect();

        for session in &stale {
            if let Some(entry) = self.sessions.remove(session) {
                tracing::warn!(
                    %session,
                    resource = %entry.token,
                    holdings = entry.holdings.len(),
                    "session expired"
                );
                self.drop_holdings(session, &entry.holdings);
            }
        }
        stale.len()
    }

    fn drop_holdings(&mut self, session: &str, holdings: &HashSet<String>) {
        let session = SessionId::new(session);
        for path in holdings {
            if let Some(node) = self.nodes.get(path) {
                let (node, events) = node.expire_session(&session);
                self.nodes.insert(path.clone(), node);
                for event in &events {
                    tracing::info!(?event, "registry event");
                }
            }
        }
    }
}

#[cfg(test)]
#[path = "lifecycle_tests.rs"]
mod tests;
