// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Wire protocol: length-prefixed JSON messages
//!
//! Every frame is a u32 big-endian length followed by a JSON document.
//! One request/response exchange per connection.

use lockex_core::ResourceToken;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use thiserror::Error;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

/// Protocol version exchanged in the Hello handshake
pub const PROTOCOL_VERSION: &str = env!("CARGO_PKG_VERSION");

/// Default timeout for a single read or write
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(5);

/// Upper bound on a frame; anything larger is rejected
pub const MAX_FRAME_LEN: u32 = 1024 * 1024;

/// Session-expiry policy, reported in Status for diagnostics.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExpiryConfig {
    /// How long a session survives without a heartbeat
    #[serde(with = "humantime_serde")]
    pub stale_threshold: Duration,
    /// How often the daemon sweeps for stale sessions
    #[serde(with = "humantime_serde")]
    pub sweep_interval: Duration,
}

impl Default for ExpiryConfig {
    fn default() -> Self {
        Self {
            stale_threshold: Duration::from_secs(30),
            sweep_interval: Duration::from_secs(5),
        }
    }
}

/// Client requests
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub enum Request {
    /// Open a session for a client identified by its resource token
    Hello { version: String, token: ResourceToken },
    /// Keep a session alive
    Heartbeat { session: String },
    /// One non-blocking acquisition attempt; creates the node if absent
    TryAcquire {
        session: String,
        path: String,
        token: ResourceToken,
        max_leases: u32,
    },
    /// Release a holding
    Release {
        session: String,
        path: String,
        token: ResourceToken,
    },
    /// List current holders of a node
    Holders { path: String },
    /// Close a session explicitly, dropping its holdings
    Close { session: String },
    /// Daemon diagnostics
    Status,
}

/// Daemon responses
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub enum Response {
    Session { session: String, version: String },
    Ok,
    Granted,
    Busy { holders: Vec<ResourceToken> },
    /// Semaphore exists with a different lease count
    Mismatch { expected: u32 },
    Holders { holders: Vec<ResourceToken> },
    /// The named session does not exist (never did, or expired)
    UnknownSession,
    Status {
        uptime_secs: u64,
        sessions: usize,
        nodes: usize,
        expiry: ExpiryConfig,
    },
    Error { message: String },
}

/// Errors from protocol operations
#[derive(Debug, Error)]
pub enum ProtocolError {
    #[error("connection closed")]
    ConnectionClosed,
    #[error("frame too large: {0} bytes")]
    FrameTooLarge(u32),
    #[error("timeout")]
    Timeout,
    #[error("serialization error: {0}")]
    Serde(#[from] serde_json::Error),
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

/// Encode a message as raw JSON (no length prefix).
pub fn encode<T: Serialize>(value: &T) -> Result<Vec<u8>, ProtocolError> {
    Ok(serde_json::to_vec(value)?)
}

/// Decode a message from raw JSON.
pub fn decode<T: DeserializeOwned>(data: &[u8]) -> Result<T, ProtocolError> {
    Ok(serde_json::from_slice(data)?)
}

/// Write one length-prefixed frame.
pub async fn write_message<W: AsyncWrite + Unpin>(
    writer: &mut W,
    data: &[u8],
) -> Result<(), ProtocolError> {
    let len = u32::try_from(data.len()).map_err(|_| ProtocolError::FrameTooLarge(u32::MAX))?;
    if len > MAX_FRAME_LEN {
        return Err(ProtocolError::FrameTooLarge(len));
    }
    writer.write_all(&len.to_be_bytes()).await?;
    writer.write_all(data).await?;
    writer.flush().await?;
    Ok(())
}

/// Read one length-prefixed frame.
pub async fn read_message<R: AsyncRead + Unpin>(reader: &mut R) -> Result<Vec<u8>, ProtocolError> {
    let mut len_buf = [0u8; 4];
    if let Err(e) = reader.read_exact(&mut len_buf).await {
        if e.kind() == std::io::ErrorKind::UnexpectedEof {
            return Err(ProtocolError::ConnectionClosed);
        }
        return Err(e.into());
    }
    let len = u32::from_be_bytes(len_buf);
    if len > MAX_FRAME_LEN {
        return Err(ProtocolError::FrameTooLarge(len));
    }

    let mut data = vec![0u8; len as usize];
    if let Err(e) = reader.read_exact(&mut data).await {
        if e.kind() == std::io::ErrorKind::UnexpectedEof {
            return Err(ProtocolError::ConnectionClosed);
        }
        return Err(e.into());
    }
    Ok(data)
}

/// Read a request with a timeout.
pub async fn read_request<R: AsyncRead + Unpin>(
    reader: &mut R,
    timeout: Duration,
) -> Result<Request, ProtocolError> {
    let data = tokio::time::timeout(timeout, read_message(reader))
        .await
        .map_err(|_| ProtocolError::Timeout)??;
    decode(&data)
}

/// Write a response with a timeout.
pub async fn write_response<W: AsyncWrite + Unpin>(
    writer: &mut W,
    response: &Response,
    timeout: Duration,
) -> Result<(), ProtocolError> {
    let data = encode(response)?;
    tokio::time::timeout(timeout, write_message(writer, &data))
        .await
        .map_err(|_| ProtocolError::Timeout)?
}

#[cfg(test)]
#[path = "protocol_tests.rs"]
mod tests;
