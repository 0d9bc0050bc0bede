// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Socket server and connection handling.

use thiserror::Error;
use tokio::net::TcpStream;
use tracing::{debug, error};

use crate::lifecycle::DaemonState;
use crate::protocol::{self, Request, Response, DEFAULT_TIMEOUT, PROTOCOL_VERSION};
use lockex_core::registry::AcquireOutcome;
use lockex_core::SystemClock;

/// Errors from connection handling
#[derive(Debug, Error)]
pub enum ServerError {
    #[error("request read timeout")]
    Timeout,
    #[error("protocol error: {0}")]
    Protocol(#[from] protocol::ProtocolError),
}

/// Handle a single client connection: one request, one response.
pub async fn handle_connection(
    state: &mut DaemonState,
    stream: TcpStream,
) -> Result<(), ServerError> {
    let (mut reader, mut writer) = stream.into_split();

    let request = match protocol::read_request(&mut reader, DEFAULT_TIMEOUT).await {
        Ok(request) => request,
        Err(protocol::ProtocolError::Timeout) => {
            error!("request read timeout");
            return Err(ServerError::Timeout);
        }
        Err(protocol::ProtocolError::ConnectionClosed) => {
            debug!("client disconnected before sending a request");
            return Ok(());
        }
        Err(e) => {
            error!("failed to read request: {}", e);
            return Err(ServerError::Protocol(e));
        }
    };

    debug!("received request: {:?}", request);
    let response = handle_request(state, request);
    debug!("sending response: {:?}", response);

    protocol::write_response(&mut writer, &response, DEFAULT_TIMEOUT)
        .await
        .map_err(ServerError::Protocol)?;

    Ok(())
}

/// Handle a single request and return a response.
pub fn handle_request(state: &mut DaemonState, request: Request) -> Response {
    let clock = SystemClock;
    match request {
        Request::Hello { version, token } => {
            debug!(client_version = %version, "hello");
            let session = state.open_session(token, &clock);
            Response::Session {
                session,
                version: PROTOCOL_VERSION.to_string(),
            }
        }

        Request::Heartbeat { session } => {
            if state.heartbeat(&session, &clock) {
                Response::Ok
            } else {
                Response::UnknownSession
            }
        }

        Request::TryAcquire {
            session,
            path,
            token,
            max_leases,
        } => match state.try_acquire(&session, &path, &token, max_leases, &clock) {
            Some(AcquireOutcome::Granted) => Response::Granted,
            Some(AcquireOutcome::Busy { holders }) => Response::Busy { holders },
            Some(AcquireOutcome::Mismatch { expected }) => Response::Mismatch { expected },
            None => Response::UnknownSession,
        },

        Request::Release {
            session,
            path,
            token,
        } => match state.release(&session, &path, &token, &clock) {
            Some(()) => Response::Ok,
            None => Response::UnknownSession,
        },

        Request::Holders { path } => Response::Holders {
            holders: state.holders(&path),
        },

        Request::Close { session } => {
            if state.close_session(&session) {
                Response::Ok
            } else {
                Response::UnknownSession
            }
        }

        Request::Status => Response::Status {
            uptime_secs: state.start_time.elapsed().as_secs(),
            sessions: state.session_count(),
            nodes: state.held_node_count(),
            expiry: state.expiry(),
        },
    }
}

#[cfg(test)]
#[path = "server_tests.rs"]
mod tests;
