// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Coordination-service capability boundary
//!
//! The coordination service is an external collaborator: this module
//! defines the trait the rest of the system programs against, the
//! session wrapper that adds blocking/timeout acquisition policy, and an
//! in-memory fake backed by the registry state machines.

mod fake;
mod session;
mod traits;

pub use fake::FakeCoordination;
pub use session::{LockSession, SessionConfig, SessionError};
pub use traits::{AcquireReply, Coordination, CoordinationError, LockHandle, SessionEvent};
