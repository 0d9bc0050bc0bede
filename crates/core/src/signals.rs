// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Signal routing for the supervised run
//!
//! Installs handlers once a child exists and maps deliveries to typed
//! actions for the orchestrator. The terminate signal tears the run down;
//! the interactive signals are deliberately ignored here so they cannot
//! bypass the coordinated cleanup path. The child still receives
//! terminal-generated signals directly through the shared process group.

use tokio::signal::unix::{signal, Signal, SignalKind};

/// What the orchestrator should do with a delivered signal.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SignalAction {
    /// Tear down the process tree and exit with the child's code.
    Terminate,
    /// Reaped without effect on the run.
    Ignore(&'static str),
}

/// Routes OS signals to supervisor actions.
pub struct SignalRouter {
    term: Signal,
    hangup: Signal,
    interrupt: Signal,
    usr1: Signal,
    usr2: Signal,
    quit: Signal,
    child: Signal,
}

impl SignalRouter {
    /// Install the handler set. Must run inside the runtime.
    pub fn install() -> std::io::Result<Self> {
        Ok(Self {
            term: signal(SignalKind::terminate())?,
            hangup: signal(SignalKind::hangup())?,
            interrupt: signal(SignalKind::interrupt())?,
            usr1: signal(SignalKind::user_defined1())?,
            usr2: signal(SignalKind::user_defined2())?,
            quit: signal(SignalKind::quit())?,
            child: signal(SignalKind::child())?,
        })
    }

    /// Wait for the next signal delivery.
    pub async fn recv(&mut self) -> SignalAction {
        tokio::select! {
            _ = self.term.recv() => SignalAction::Terminate,
            _ = self.hangup.recv() => SignalAction::Ignore("SIGHUP"),
            _ = self.interrupt.recv() => SignalAction::Ignore("SIGINT"),
            _ = self.usr1.recv() => SignalAction::Ignore("SIGUSR1"),
            _ = self.usr2.recv() => SignalAction::Ignore("SIGUSR2"),
            _ = self.quit.recv() => SignalAction::Ignore("SIGQUIT"),
            _ = self.child.recv() => SignalAction::Ignore("SIGCHLD"),
        }
    }
}

// Signal delivery is process-wide, so the router's behavioral tests live
// in tests/signal_routing.rs where they get a process to themselves.
