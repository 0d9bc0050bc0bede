// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! In-memory coordination fake
//!
//! Backed by the same registry state machines the daemon uses. Supports
//! multiple simulated clients over one shared namespace, transient-failure
//! injection, and manual session-event emission.

use super::{AcquireReply, Coordination, CoordinationError, LockHandle, SessionEvent};
use crate::identity::{LockIdentity, ResourceToken, SessionId};
use crate::registry::{AcquireOutcome, Node};
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use tokio::sync::broadcast;

#[derive(Default)]
struct FakeState {
    nodes: HashMap<String, Node>,
    release_calls: u32,
    close_calls: u32,
    inject_failures: u32,
}

/// Fake coordination service for tests and offline diagnostics.
#[derive(Clone)]
pub struct FakeCoordination {
    shared: Arc<Mutex<FakeState>>,
    events: broadcast::Sender<SessionEvent>,
    session: SessionId,
    closed: Arc<AtomicBool>,
}

impl FakeCoordination {
    pub fn new() -> Self {
        let (events, _) = broadcast::channel(16);
        Self {
            shared: Arc::new(Mutex::new(FakeState::default())),
            events,
            session: SessionId::new("fake-session-1"),
            closed: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Another client of the same namespace, with its own session.
    pub fn client(&self, session: impl Into<String>) -> Self {
        let (events, _) = broadcast::channel(16);
        Self {
            shared: Arc::clone(&self.shared),
            events,
            session: SessionId::new(session),
            closed: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Push a session-health event to subscribers.
    pub fn emit(&self, event: SessionEvent) {
        let _ = self.events.send(event);
    }

    /// Make the next `n` try_acquire calls fail with a transient error.
    pub fn inject_acquire_failures(&self, n: u32) {
        self.lock_state().inject_failures = n;
    }

    pub fn release_calls(&self) -> u32 {
        self.lock_state().release_calls
    }

    pub fn close_calls(&self) -> u32 {
        self.lock_state().close_calls
    }

    pub fn holders_of(&self, identity: &LockIdentity) -> Vec<ResourceToken> {
        self.lock_state()
            .nodes
            .get(&identity.path())
            .map(Node::holders)
            .unwrap_or_default()
    }

    fn lock_state(&self) -> std::sync::MutexGuard<'_, FakeState> {
        self.shared.lock().unwrap_or_else(|e| e.into_inner())
    }
}

impl Default for FakeCoordination {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Coordination for FakeCoordination {
    fn session_id(&self) -> SessionId {
        self.session.clone()
    }

    async fn try_acquire(
        &self,
        identity: &LockIdentity,
        token: &ResourceToken,
    ) -> Result<AcquireReply, CoordinationError> {
        if self.closed.load(Ordering::SeqCst) {
            return Err(CoordinationError::AlreadyClosed);
        }
        let mut state = self.lock_state();
        if state.inject_failures > 0 {
            state.inject_failures -= 1;
            return Err(CoordinationError::Protocol("injected failure".to_string()));
        }

        let path = identity.path();
        let node = state
            .nodes
            .entry(path.clone())
            .or_insert_with(|| Node::new(path.clone(), identity.concurrency));
        let (node, outcome, events) = node.try_acquire(token, &self.session, identity.concurrency);
        state.nodes.insert(path.clone(), node);
        for event in events {
            tracing::debug!(?event, "fake registry event");
        }

        match outcome {
            AcquireOutcome::Granted => Ok(AcquireReply::Granted(LockHandle {
                identity: identity.clone(),
                token: token.clone(),
                session: self.session.clone(),
            })),
            AcquireOutcome::Busy { holders } => Ok(AcquireReply::Busy { holders }),
            AcquireOutcome::Mismatch { expected } => Err(CoordinationError::LeaseMismatch {
                path,
                expected,
                requested: identity.concurrency,
            }),
        }
    }

    async fn release(&self, handle: &LockHandle) -> Result<(), CoordinationError> {
        if self.closed.load(Ordering::SeqCst) {
            return Err(CoordinationError::AlreadyClosed);
        }
        let mut state = self.lock_state();
        state.release_calls += 1;
        let path = handle.identity.path();
        if let Some(node) = state.nodes.get(&path) {
            let (node, events) = node.release(&handle.token);
            state.nodes.insert(path, node);
            for event in events {
                tracing::debug!(?event, "fake registry event");
            }
        }
        Ok(())
    }

    async fn lease_holders(
        &self,
        identity: &LockIdentity,
    ) -> Result<Vec<ResourceToken>, CoordinationError> {
        if self.closed.load(Ordering::SeqCst) {
            return Err(CoordinationError::AlreadyClosed);
        }
        Ok(self.holders_of(identity))
    }

    fn subscribe(&self) -> broadcast::Receiver<SessionEvent> {
        self.events.subscribe()
    }

    async fn close(&self) -> Result<(), CoordinationError> {
        if self.closed.swap(true, Ordering::SeqCst) {
            return Err(CoordinationError::AlreadyClosed);
        }
        let mut state = self.lock_state();
        state.close_calls += 1;
        // Closing a session drops its holdings, like server-side expiry.
        let paths: Vec<String> = state.nodes.keys().cloned().collect();
        for path in paths {
            if let Some(node) = state.nodes.get(&path) {
                let (node, _) = node.expire_session(&self.session);
                state.nodes.insert(path, node);
            }
        }
        drop(state);
        let _ = self.events.send(SessionEvent::Closed);
        Ok(())
    }
}

#[cfg(test)]
#[path = "fake_tests.rs"]
mod tests;
