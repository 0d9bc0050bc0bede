// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Remote coordination adapter
//!
//! Implements the coordination capability over the lockexd wire protocol:
//! one framed request per connection, a server-assigned session kept
//! alive by a background heartbeat task, and session-health events fed to
//! subscribers. Repeated heartbeat misses mark the session suspended and
//! then lost.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use lockex_core::{
    AcquireReply, Coordination, CoordinationError, LockHandle, LockIdentity, ResourceToken,
    SessionEvent, SessionId,
};
use lockex_daemon::protocol::{self, Request, Response, PROTOCOL_VERSION};
use tokio::net::TcpStream;
use tokio::sync::broadcast;

/// Consecutive heartbeat misses before the session counts as lost.
const HEARTBEAT_MISS_BUDGET: u32 = 3;

// Timeout configuration (env vars in milliseconds)
fn parse_duration_ms(var: &str) -> Option<Duration> {
    std::env::var(var)
        .ok()
        .and_then(|s| s.parse::<u64>().ok())
        .filter(|ms| *ms > 0)
        .map(Duration::from_millis)
}

/// Timeout for a single request/response exchange
fn timeout_ipc() -> Duration {
    parse_duration_ms("LOCKEX_TIMEOUT_IPC_MS").unwrap_or(Duration::from_secs(5))
}

/// Interval between session heartbeats
fn heartbeat_interval() -> Duration {
    parse_duration_ms("LOCKEX_HEARTBEAT_MS").unwrap_or(Duration::from_secs(5))
}

/// Connection-establishment policy.
#[derive(Clone, Copy, Debug)]
pub struct ConnectRetry {
    /// Attempts across the whole host list
    pub max_tries: u32,
    /// Budget for one attempt, handshake included
    pub timeout: Duration,
    /// Pause between attempts
    pub backoff: Duration,
}

impl Default for ConnectRetry {
    fn default() -> Self {
        Self {
            max_tries: 1,
            timeout: Duration::from_secs(30),
            backoff: Duration::from_secs(1),
        }
    }
}

/// A live session with a lockexd instance.
#[derive(Debug)]
pub struct RemoteCoordination {
    host: String,
    session: SessionId,
    events: broadcast::Sender<SessionEvent>,
    closed: Arc<AtomicBool>,
    heartbeat: tokio::task::JoinHandle<()>,
}

impl RemoteCoordination {
    /// Establish a session, trying each host in the comma-separated list
    /// in order, up to the retry budget.
    pub async fn connect(
        hosts: &str,
        token: ResourceToken,
        retry: ConnectRetry,
    ) -> Result<Self, CoordinationError> {
        let host_list: Vec<String> = hosts
            .split(',')
            .map(str::trim)
            .filter(|h| !h.is_empty())
            .map(str::to_string)
            .collect();
        if host_list.is_empty() {
            return Err(CoordinationError::Connect {
                hosts: hosts.to_string(),
                reason: "no hosts given".to_string(),
            });
        }

        let mut last_error = String::new();
        for attempt in 1..=retry.max_tries.max(1) {
            for host in &host_list {
                match tokio::time::timeout(retry.timeout, hello(host, &token)).await {
                    Ok(Ok(session)) => {
                        tracing::debug!(%host, %session, "session established");
                        return Ok(Self::start(host.clone(), session));
                    }
                    Ok(Err(e)) => {
                        tracing::warn!(%host, attempt, error = %e, "connect attempt failed");
                        last_error = e.to_string();
                    }
                    Err(_) => {
                        tracing::warn!(%host, attempt, "connect attempt timed out");
                        last_error = "connection timed out".to_string();
                    }
                }
            }
            if attempt < retry.max_tries {
                tokio::time::sleep(retry.backoff).await;
            }
        }

        Err(CoordinationError::Connect {
            hosts: hosts.to_string(),
            reason: last_error,
        })
    }

    fn start(host: String, session: SessionId) -> Self {
        let (events, _) = broadcast::channel(16);
        let closed = Arc::new(AtomicBool::new(false));
        let heartbeat = tokio::spawn(heartbeat_loop(
            host.clone(),
            session.clone(),
            events.clone(),
            Arc::clone(&closed),
        ));
        Self {
            host,
            session,
            events,
            closed,
            heartbeat,
        }
    }

    fn ensure_open(&self) -> Result<(), CoordinationError> {
        if self.closed.load(Ordering::SeqCst) {
            Err(CoordinationError::AlreadyClosed)
        } else {
            Ok(())
        }
    }

    async fn request(&self, request: &Request) -> Result<Response, CoordinationError> {
        exchange(&self.host, request).await
    }
}

impl Drop for RemoteCoordination {
    fn drop(&mut self) {
        self.heartbeat.abort();
    }
}

#[async_trait]
impl Coordination for RemoteCoordination {
    fn session_id(&self) -> SessionId {
        self.session.clone()
    }

    async fn try_acquire(
        &self,
        identity: &LockIdentity,
        token: &ResourceToken,
    ) -> Result<AcquireReply, CoordinationError> {
        self.ensure_open()?;
        let response = self
            .request(&Request::TryAcquire {
                session: self.session.0.clone(),
                path: identity.path(),
                token: token.clone(),
                max_leases: identity.concurrency,
            })
            .await?;

        match response {
            Response::Granted => Ok(AcquireReply::Granted(LockHandle {
                identity: identity.clone(),
                token: token.clone(),
                session: self.session.clone(),
            })),
            Response::Busy { holders } => Ok(AcquireReply::Busy { holders }),
            Response::Mismatch { expected } => Err(CoordinationError::LeaseMismatch {
                path: identity.path(),
                expected,
                requested: identity.concurrency,
            }),
            Response::UnknownSession => {
                let _ = self.events.send(SessionEvent::Lost);
                Err(CoordinationError::SessionLost)
            }
            other => Err(unexpected(other)),
        }
    }

    async fn release(&self, handle: &LockHandle) -> Result<(), CoordinationError> {
        self.ensure_open()?;
        let response = self
            .request(&Request::Release {
                session: handle.session.0.clone(),
                path: handle.identity.path(),
                token: handle.token.clone(),
            })
            .await?;

        match response {
            Response::Ok => Ok(()),
            // An expired session already dropped its holdings server-side.
            Response::UnknownSession => Err(CoordinationError::AlreadyClosed),
            other => Err(unexpected(other)),
        }
    }

    async fn lease_holders(
        &self,
        identity: &LockIdentity,
    ) -> Result<Vec<ResourceToken>, CoordinationError> {
        self.ensure_open()?;
        match self
            .request(&Request::Holders {
                path: identity.path(),
            })
            .await?
        {
            Response::Holders { holders } => Ok(holders),
            other => Err(unexpected(other)),
        }
    }

    fn subscribe(&self) -> broadcast::Receiver<SessionEvent> {
        self.events.subscribe()
    }

    async fn close(&self) -> Result<(), CoordinationError> {
        if self.closed.swap(true, Ordering::SeqCst) {
            return Err(CoordinationError::AlreadyClosed);
        }
        self.heartbeat.abort();

        let result = exchange(
            &self.host,
            &Request::Close {
                session: self.session.0.clone(),
            },
        )
        .await;
        let _ = self.events.send(SessionEvent::Closed);

        match result {
            Ok(Response::Ok) => Ok(()),
            Ok(Response::UnknownSession) => Err(CoordinationError::AlreadyClosed),
            Ok(other) => Err(unexpected(other)),
            Err(e) => Err(e),
        }
    }
}

/// Open a session: one TCP connection, one Hello exchange.
async fn hello(host: &str, token: &ResourceToken) -> Result<SessionId, CoordinationError> {
    let response = exchange(
        host,
        &Request::Hello {
            version: PROTOCOL_VERSION.to_string(),
            token: token.clone(),
        },
    )
    .await?;

    match response {
        Response::Session { session, version } => {
            if version != PROTOCOL_VERSION {
                tracing::warn!(server = %version, client = PROTOCOL_VERSION, "protocol version skew");
            }
            Ok(SessionId::new(session))
        }
        other => Err(unexpected(other)),
    }
}

/// One framed request/response exchange on a fresh connection.
async fn exchange(host: &str, request: &Request) -> Result<Response, CoordinationError> {
    let stream = TcpStream::connect(host).await?;
    let (mut reader, mut writer) = stream.into_split();

    let data = protocol::encode(request).map_err(protocol_error)?;
    tokio::time::timeout(timeout_ipc(), protocol::write_message(&mut writer, &data))
        .await
        .map_err(|_| CoordinationError::Protocol("request write timed out".to_string()))?
        .map_err(protocol_error)?;

    let data = tokio::time::timeout(timeout_ipc(), protocol::read_message(&mut reader))
        .await
        .map_err(|_| CoordinationError::Protocol("response read timed out".to_string()))?
        .map_err(protocol_error)?;

    protocol::decode(&data).map_err(protocol_error)
}

/// Keep the session alive; degrade to Suspended on misses and to Lost
/// when the miss budget runs out or the server no longer knows us.
async fn heartbeat_loop(
    host: String,
    session: SessionId,
    events: broadcast::Sender<SessionEvent>,
    closed: Arc<AtomicBool>,
) {
    let mut ticker = tokio::time::interval(heartbeat_interval());
    ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
    ticker.tick().await;

    let mut misses = 0u32;
    loop {
        ticker.tick().await;
        if closed.load(Ordering::SeqCst) {
            return;
        }

        match exchange(
            &host,
            &Request::Heartbeat {
                session: session.0.clone(),
            },
        )
        .await
        {
            Ok(Response::Ok) => {
                if misses > 0 {
                    tracing::info!(%session, "session reconnected");
                    misses = 0;
                    let _ = events.send(SessionEvent::Connected);
                }
            }
            Ok(Response::UnknownSession) => {
                tracing::error!(%session, "session expired on the server");
                let _ = events.send(SessionEvent::Lost);
                return;
            }
            Ok(other) => {
                tracing::warn!(%session, ?other, "unexpected heartbeat response");
            }
            Err(e) => {
                misses += 1;
                tracing::warn!(%session, misses, error = %e, "heartbeat failed");
                let _ = events.send(SessionEvent::Suspended);
                if misses >= HEARTBEAT_MISS_BUDGET {
                    tracing::error!(%session, "heartbeat miss budget exhausted, session lost");
                    let _ = events.send(SessionEvent::Lost);
                    return;
                }
            }
        }
    }
}

fn protocol_error(e: protocol::ProtocolError) -> CoordinationError {
    CoordinationError::Protocol(e.to_string())
}

fn unexpected(response: Response) -> CoordinationError {
    CoordinationError::Protocol(format!("unexpected response: {response:?}"))
}

#[cfg(test)]
#[path = "client_tests.rs"]
mod tests;
