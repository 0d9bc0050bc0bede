//! lockex-daemon: single-node coordination service for lockex
//!
//! Holds the lock namespace and the session table. Clients speak the
//! length-prefixed JSON protocol over TCP; sessions stay alive through
//! heartbeats and lose their holdings when they expire.

#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]
#![cfg_attr(test, allow(clippy::panic))]

pub mod lifecycle;
pub mod protocol;
pub mod server;

pub use lifecycle::{DaemonState, SessionEntry};
pub use protocol::{ExpiryConfig, ProtocolError, Request, Response};
