use super::*;
use crate::coordination::{Coordination, FakeCoordination, SessionConfig};
use crate::identity::{LockIdentity, ResourceToken};
use crate::supervisor::ProcessSupervisor;

fn session(fake: &FakeCoordination) -> LockSession<FakeCoordination> {
    LockSession::new(fake.clone(), SessionConfig::default())
}

async fn acquired_handle(fake: &FakeCoordination) -> LockHandle {
    let identity = LockIdentity::derive("lockex", "echo cleanup", 1);
    let token = ResourceToken::new("testhost", 1);
    session(fake)
        .acquire(&identity, &token, true, None)
        .await
        .unwrap()
}

#[test]
fn latch_fires_exactly_once() {
    let state = CleanupState::new();
    assert!(state.fire());
    assert!(!state.fire());
    assert!(state.has_fired());
}

#[tokio::test]
async fn latch_admits_one_winner_under_concurrency() {
    let state = CleanupState::new();
    let mut tasks = Vec::new();
    for _ in 0..16 {
        let state = state.clone();
        tasks.push(tokio::spawn(async move { state.fire() }));
    }

    let mut winners = 0;
    for task in tasks {
        if task.await.unwrap() {
            winners += 1;
        }
    }
    assert_eq!(winners, 1);
}

#[tokio::test]
async fn finalize_runs_the_sequence_once() {
    let fake = FakeCoordination::new();
    let handle = acquired_handle(&fake).await;
    let session = session(&fake);
    let coordinator = CleanupCoordinator::new();

    coordinator.finalize(&session, Some(&handle), None).await;
    coordinator.finalize(&session, Some(&handle), None).await;
    coordinator.finalize(&session, Some(&handle), None).await;

    assert_eq!(fake.release_calls(), 1);
    assert_eq!(fake.close_calls(), 1);
}

#[tokio::test]
async fn finalize_kills_the_process_before_releasing() {
    let fake = FakeCoordination::new();
    let handle = acquired_handle(&fake).await;
    let session = session(&fake);
    let coordinator = CleanupCoordinator::new();

    let mut process = ProcessSupervisor::spawn("sleep 30").unwrap();
    coordinator
        .finalize(&session, Some(&handle), Some(&mut process))
        .await;

    // The child's exit was confirmed inside finalize.
    assert!(process.returncode().is_some());
    assert_eq!(fake.release_calls(), 1);
    assert_eq!(fake.close_calls(), 1);
}

#[tokio::test]
async fn finalize_without_a_process_still_releases_and_closes() {
    let fake = FakeCoordination::new();
    let handle = acquired_handle(&fake).await;
    let session = session(&fake);
    let coordinator = CleanupCoordinator::new();

    coordinator.finalize(&session, Some(&handle), None).await;

    assert_eq!(fake.release_calls(), 1);
    assert_eq!(fake.close_calls(), 1);
}

#[tokio::test]
async fn finalize_tolerates_an_already_closed_session() {
    let fake = FakeCoordination::new();
    let handle = acquired_handle(&fake).await;
    let session = session(&fake);
    fake.close().await.unwrap();

    let coordinator = CleanupCoordinator::new();
    coordinator.finalize(&session, Some(&handle), None).await;

    // Release saw a dead session; that is not an error for cleanup.
    assert_eq!(fake.close_calls(), 1);
}
