// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Lock identity and holder naming
//!
//! A command maps deterministically to a lock path, and every client is
//! identified by a hostname:pid resource token plus a server-assigned session.

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use thiserror::Error;

/// Identity of the lock a command maps to.
///
/// Immutable once derived: identical command text always yields the same
/// node path, so concurrent invocations of the same command contend on
/// the same lock.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct LockIdentity {
    /// Name prefix for the lock namespace (first path segment)
    pub name_prefix: String,
    /// Stable fingerprint of the command text (second path segment)
    pub fingerprint: u64,
    /// Number of leases available; 1 means an exclusive lock
    pub concurrency: u32,
}

impl LockIdentity {
    /// Derive the identity for a command.
    pub fn derive(name_prefix: impl Into<String>, command: &str, concurrency: u32) -> Self {
        Self {
            name_prefix: name_prefix.into(),
            fingerprint: fingerprint(command),
            concurrency,
        }
    }

    pub fn is_exclusive(&self) -> bool {
        self.concurrency <= 1
    }

    /// Node path in the coordination namespace.
    pub fn path(&self) -> String {
        format!("/{}/{:016x}", self.name_prefix, self.fingerprint)
    }
}

/// Stable 64-bit fingerprint of a command string.
///
/// First 8 bytes of SHA-256, so the mapping is identical across runs,
/// processes, and hosts. Collisions between distinct commands are
/// possible in principle but negligible at this width.
pub fn fingerprint(command: &str) -> u64 {
    let digest = Sha256::digest(command.as_bytes());
    let mut bytes = [0u8; 8];
    bytes.copy_from_slice(&digest[..8]);
    u64::from_be_bytes(bytes)
}

/// Identifies a lock holder for diagnostics; rendered as `hostname:pid`.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ResourceToken {
    pub hostname: String,
    pub pid: u32,
}

impl ResourceToken {
    pub fn new(hostname: impl Into<String>, pid: u32) -> Self {
        Self {
            hostname: hostname.into(),
            pid,
        }
    }

    /// Token for the current process.
    pub fn for_current_process() -> Self {
        let hostname = hostname::get()
            .map(|h| h.to_string_lossy().into_owned())
            .unwrap_or_else(|_| "unknown-host".to_string());
        Self {
            hostname,
            pid: std::process::id(),
        }
    }
}

impl std::fmt::Display for ResourceToken {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}:{}", self.hostname, self.pid)
    }
}

#[derive(Debug, Error)]
#[error("invalid resource token: {0}")]
pub struct TokenParseError(String);

impl std::str::FromStr for ResourceToken {
    type Err = TokenParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (hostname, pid) = s
            .rsplit_once(':')
            .ok_or_else(|| TokenParseError(s.to_string()))?;
        let pid = pid
            .parse::<u32>()
            .map_err(|_| TokenParseError(s.to_string()))?;
        if hostname.is_empty() {
            return Err(TokenParseError(s.to_string()));
        }
        Ok(Self::new(hostname, pid))
    }
}

/// Server-assigned session identifier.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SessionId(pub String);

impl SessionId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }
}

impl std::fmt::Display for SessionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[cfg(test)]
#[path = "identity_tests.rs"]
mod tests;
