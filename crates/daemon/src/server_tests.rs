use super::*;
use crate::protocol::ExpiryConfig;
use lockex_core::ResourceToken;

fn token(pid: u32) -> ResourceToken {
    ResourceToken::new("testhost", pid)
}

fn state() -> DaemonState {
    DaemonState::new(ExpiryConfig::default())
}

fn open_session(state: &mut DaemonState, pid: u32) -> String {
    match handle_request(
        state,
        Request::Hello {
            version: "test".to_string(),
            token: token(pid),
        },
    ) {
        Response::Session { session, .. } => session,
        other => panic!("expected Session, got {:?}", other),
    }
}

#[test]
fn hello_opens_a_session() {
    let mut state = state();
    let session = open_session(&mut state, 1);
    assert!(!session.is_empty());
    assert_eq!(state.session_count(), 1);
}

#[test]
fn acquire_then_busy_then_release_then_granted() {
    let mut state = state();
    let first = open_session(&mut state, 1);
    let second = open_session(&mut state, 2);

    let granted = handle_request(
        &mut state,
        Request::TryAcquire {
            session: first.clone(),
            path: "/lockex/a".to_string(),
            token: token(1),
            max_leases: 1,
        },
    );
    assert_eq!(granted, Response::Granted);

    let busy = handle_request(
        &mut state,
        Request::TryAcquire {
            session: second.clone(),
            path: "/lockex/a".to_string(),
            token: token(2),
            max_leases: 1,
        },
    );
    assert_eq!(
        busy,
        Response::Busy {
            holders: vec![token(1)]
        }
    );

    let released = handle_request(
        &mut state,
        Request::Release {
            session: first,
            path: "/lockex/a".to_string(),
            token: token(1),
        },
    );
    assert_eq!(released, Response::Ok);

    let granted = handle_request(
        &mut state,
        Request::TryAcquire {
            session: second,
            path: "/lockex/a".to_string(),
            token: token(2),
            max_leases: 1,
        },
    );
    assert_eq!(granted, Response::Granted);
}

#[test]
fn heartbeat_for_unknown_session_reports_it() {
    let mut state = state();
    let response = handle_request(
        &mut state,
        Request::Heartbeat {
            session: "gone".to_string(),
        },
    );
    assert_eq!(response, Response::UnknownSession);
}

#[test]
fn semaphore_mismatch_reports_established_count() {
    let mut state = state();
    let first = open_session(&mut state, 1);
    let second = open_session(&mut state, 2);

    handle_request(
        &mut state,
        Request::TryAcquire {
            session: first,
            path: "/lockex/shared".to_string(),
            token: token(1),
            max_leases: 3,
        },
    );
    let mismatch = handle_request(
        &mut state,
        Request::TryAcquire {
            session: second,
            path: "/lockex/shared".to_string(),
            token: token(2),
            max_leases: 5,
        },
    );
    assert_eq!(mismatch, Response::Mismatch { expected: 3 });
}

#[test]
fn holders_lists_current_tokens() {
    let mut state = state();
    let session = open_session(&mut state, 1);
    handle_request(
        &mut state,
        Request::TryAcquire {
            session,
            path: "/lockex/shared".to_string(),
            token: token(1),
            max_leases: 2,
        },
    );

    let holders = handle_request(
        &mut state,
        Request::Holders {
            path: "/lockex/shared".to_string(),
        },
    );
    assert_eq!(
        holders,
        Response::Holders {
            holders: vec![token(1)]
        }
    );
}

#[test]
fn close_drops_the_sessions_holdings() {
    let mut state = state();
    let first = open_session(&mut state, 1);
    let second = open_session(&mut state, 2);

    handle_request(
        &mut state,
        Request::TryAcquire {
            session: first.clone(),
            path: "/lockex/a".to_string(),
            token: token(1),
            max_leases: 1,
        },
    );
    assert_eq!(
        handle_request(&mut state, Request::Close { session: first }),
        Response::Ok
    );

    let granted = handle_request(
        &mut state,
        Request::TryAcquire {
            session: second,
            path: "/lockex/a".to_string(),
            token: token(2),
            max_leases: 1,
        },
    );
    assert_eq!(granted, Response::Granted);
}

#[test]
fn status_reports_sessions_and_held_nodes() {
    let mut state = state();
    let session = open_session(&mut state, 1);
    handle_request(
        &mut state,
        Request::TryAcquire {
            session,
            path: "/lockex/a".to_string(),
            token: token(1),
            max_leases: 1,
        },
    );

    match handle_request(&mut state, Request::Status) {
        Response::Status {
            sessions, nodes, ..
        } => {
            assert_eq!(sessions, 1);
            assert_eq!(nodes, 1);
        }
        other => panic!("expected Status, got {:?}", other),
    }
}
