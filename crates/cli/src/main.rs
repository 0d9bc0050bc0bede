// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! lockex: acquire a distributed lock, then execute a command while
//! holding it. The lock is released and the command's process tree torn
//! down on every exit path.

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

mod client;

use std::time::Duration;

use clap::Parser;
use tracing::{error, info};

use crate::client::{ConnectRetry, RemoteCoordination};
use lockex_core::{LockSession, Orchestrator, ResourceToken, RunConfig, SessionConfig};

#[derive(Parser)]
#[command(
    name = "lockex",
    version,
    about = "Get a lock from the coordination service and execute a command"
)]
struct Cli {
    /// Block and wait if the lock is held by another process
    #[arg(long, overrides_with = "no_blocking")]
    blocking: bool,

    /// Fail immediately if the lock is held by another process
    #[arg(long)]
    no_blocking: bool,

    /// Number of concurrent locks (leases) available; all clients must
    /// use the same value
    #[arg(short = 'c', long, default_value_t = 1)]
    concurrent: u32,

    /// Name of the lock
    #[arg(short = 'l', long, default_value = "lockex")]
    lockname: String,

    /// How many times to try a lock command before failing
    #[arg(short = 'r', long, default_value_t = 1)]
    lockretry: u32,

    /// Seconds to wait for lock acquisition; the default is to wait forever
    #[arg(short = 't', long)]
    locktimeout: Option<f64>,

    /// How many times to try connecting to the coordination service
    #[arg(short = 'R', long, default_value_t = 1)]
    retry: u32,

    /// Seconds to wait for the connection to establish
    #[arg(short = 'T', long, default_value_t = 30.0)]
    timeout: f64,

    /// Comma-separated coordination hosts, in the form hostname:port
    #[arg(short = 'z', long, env = "ZKHOSTS", default_value = "localhost:2181")]
    zkhosts: String,

    /// Command to execute while holding the lock
    #[arg(trailing_var_arg = true, allow_hyphen_values = true)]
    command: Vec<String>,
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    setup_logging();
    let code = run(cli).await;
    std::process::exit(code);
}

async fn run(cli: Cli) -> i32 {
    let command = cli.command.join(" ").trim().to_string();
    let blocking = cli.blocking || !cli.no_blocking;

    let mut config = RunConfig::new(command)
        .with_lockname(&cli.lockname)
        .with_concurrency(cli.concurrent)
        .with_blocking(blocking)
        .with_lock_timeout(cli.locktimeout.map(Duration::from_secs_f64));
    if let Some(poll_interval) = parse_duration_ms("LOCKEX_POLL_INTERVAL_MS") {
        config = config.with_poll_interval(poll_interval);
    }

    // Usage problems fail before any coordination-service contact.
    if let Err(e) = config.validate() {
        error!("{e}");
        return 1;
    }

    let token = ResourceToken::for_current_process();
    info!(
        zkhosts = %cli.zkhosts,
        lockname = %config.identity().path(),
        resource = %token,
        concurrent = cli.concurrent,
        blocking,
        command = %config.command,
        "locking"
    );

    let retry = ConnectRetry {
        max_tries: cli.retry.max(1),
        timeout: Duration::from_secs_f64(cli.timeout),
        ..ConnectRetry::default()
    };
    let coord = match RemoteCoordination::connect(&cli.zkhosts, token.clone(), retry).await {
        Ok(coord) => coord,
        Err(e) => {
            error!(zkhosts = %cli.zkhosts, error = %e, "could not reach the coordination service");
            return 1;
        }
    };

    let session = LockSession::new(
        coord,
        SessionConfig::default().with_command_retries(cli.lockretry),
    );
    info!(command = %config.command, "want to execute command");

    let mut orchestrator = Orchestrator::new(session, config, token);
    orchestrator.run().await
}

fn parse_duration_ms(var: &str) -> Option<Duration> {
    std::env::var(var)
        .ok()
        .and_then(|s| s.parse::<u64>().ok())
        .filter(|ms| *ms > 0)
        .map(Duration::from_millis)
}

fn setup_logging() {
    use tracing_subscriber::EnvFilter;
    let filter = EnvFilter::try_from_env("LOCKEX_LOG").unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}
