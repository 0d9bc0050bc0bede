// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! lockexd: single-node coordination daemon for lockex
//!
//! Owns the lock namespace, expires stale sessions, and answers one
//! framed request per connection.

use std::time::Duration;

use anyhow::Result;
use clap::Parser;
use tokio::net::TcpListener;
use tokio::signal::unix::{signal, SignalKind};
use tracing::{error, info};

use lockex_daemon::protocol::ExpiryConfig;
use lockex_daemon::{server, DaemonState};
use lockex_core::SystemClock;

#[derive(Parser)]
#[command(name = "lockexd", version, about = "Coordination daemon for lockex")]
struct Args {
    /// Address to listen on
    #[arg(long, default_value = "127.0.0.1:2181")]
    listen: String,

    /// Seconds a session survives without a heartbeat
    #[arg(long, default_value_t = 30)]
    session_ttl: u64,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    setup_logging();

    let expiry = ExpiryConfig {
        stale_threshold: Duration::from_secs(args.session_ttl),
        ..ExpiryConfig::default()
    };

    let listener = TcpListener::bind(&args.listen).await?;
    let local_addr = listener.local_addr()?;
    info!(addr = %local_addr, session_ttl = args.session_ttl, "lockexd listening");

    // Ready marker for parent processes waiting on startup; carries the
    // bound address so `--listen 127.0.0.1:0` is usable.
    println!("READY {local_addr}");

    let mut state = DaemonState::new(expiry);
    let clock = SystemClock;

    let mut sweep = tokio::time::interval(expiry.sweep_interval);
    sweep.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
    let mut sigterm = signal(SignalKind::terminate())?;
    let mut sigint = signal(SignalKind::interrupt())?;

    loop {
        tokio::select! {
            result = listener.accept() => {
                match result {
                    Ok((stream, peer)) => {
                        if let Err(e) = server::handle_connection(&mut state, stream).await {
                            error!(%peer, "error handling connection: {}", e);
                        }
                    }
                    Err(e) => {
                        error!("error accepting connection: {}", e);
                    }
                }
            }

            _ = sweep.tick() => {
                let expired = state.expire_stale(&clock);
                if expired > 0 {
                    info!(expired, "expired stale sessions");
                }
            }

            _ = sigterm.recv() => {
                info!("received SIGTERM, shutting down");
                break;
            }

            _ = sigint.recv() => {
                info!("received SIGINT, shutting down");
                break;
            }
        }
    }

    Ok(())
}

fn setup_logging() {
    use tracing_subscriber::EnvFilter;
    let filter = EnvFilter::try_from_env("LOCKEX_LOG").unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}
