//! Signal router behavior, isolated in its own process because raising a
//! signal reaches every handler installed in the test binary.

#![allow(clippy::unwrap_used)]

use lockex_core::{SignalAction, SignalRouter};
use nix::sys::signal::{raise, Signal};

#[tokio::test]
async fn routes_ignored_signals_then_terminate() {
    let mut router = SignalRouter::install().unwrap();

    raise(Signal::SIGUSR1).unwrap();
    assert_eq!(router.recv().await, SignalAction::Ignore("SIGUSR1"));

    raise(Signal::SIGHUP).unwrap();
    assert_eq!(router.recv().await, SignalAction::Ignore("SIGHUP"));

    raise(Signal::SIGQUIT).unwrap();
    assert_eq!(router.recv().await, SignalAction::Ignore("SIGQUIT"));

    raise(Signal::SIGTERM).unwrap();
    assert_eq!(router.recv().await, SignalAction::Terminate);
}
