//! lockex-core: Core library for the lockex lock-and-execute tool
//!
//! This crate provides:
//! - Lock and semaphore state machines shared by the daemon and the in-memory fake
//! - The coordination capability trait and the blocking/timeout acquisition policy
//! - Process supervision with recursive tree termination
//! - Signal routing, one-shot cleanup, and the run orchestrator

#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]
#![cfg_attr(test, allow(clippy::panic))]

pub mod clock;
pub mod identity;

pub mod coordination;
pub mod registry;

pub mod cleanup;
pub mod orchestrator;
pub mod signals;
pub mod supervisor;

// Re-exports
pub use clock::{Clock, FakeClock, SystemClock};
pub use cleanup::{restore_terminal, CleanupCoordinator, CleanupState};
pub use coordination::{
    AcquireReply, Coordination, CoordinationError, FakeCoordination, LockHandle, LockSession,
    SessionConfig, SessionError, SessionEvent,
};
pub use identity::{LockIdentity, ResourceToken, SessionId};
pub use orchestrator::{Orchestrator, RunConfig, RunState, UsageError};
pub use registry::{AcquireOutcome, Node, RegistryEvent};
pub use signals::{SignalAction, SignalRouter};
pub use supervisor::{
    kill_tree, supports_tree_enumeration, ProcessSupervisor, SupervisorError, KILL_GRACE,
};
