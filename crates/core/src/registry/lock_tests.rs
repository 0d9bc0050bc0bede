use super::*;

fn token(pid: u32) -> ResourceToken {
    ResourceToken::new("testhost", pid)
}

fn session(id: &str) -> SessionId {
    SessionId::new(id)
}

#[test]
fn new_lock_is_free() {
    let lock = LockNode::new("/lockex/abc");
    assert!(lock.is_free());
    assert!(lock.holder().is_none());
}

#[test]
fn acquire_free_lock_succeeds() {
    let lock = LockNode::new("/lockex/abc");
    let (lock, outcome, events) = lock.try_acquire(&token(100), &session("s1"));

    assert_eq!(outcome, AcquireOutcome::Granted);
    assert_eq!(lock.holder(), Some(&token(100)));
    assert!(matches!(
        &events[0],
        RegistryEvent::Granted { path, token: t }
        if path == "/lockex/abc" && t.pid == 100
    ));
}

#[test]
fn acquire_held_lock_is_busy() {
    let lock = LockNode::new("/lockex/abc");
    let (lock, _, _) = lock.try_acquire(&token(100), &session("s1"));

    let (lock, outcome, events) = lock.try_acquire(&token(200), &session("s2"));

    assert_eq!(
        outcome,
        AcquireOutcome::Busy {
            holders: vec![token(100)]
        }
    );
    assert_eq!(lock.holder(), Some(&token(100)));
    assert!(matches!(&events[0], RegistryEvent::Denied { .. }));
}

#[test]
fn reacquire_by_holder_is_granted_again() {
    let lock = LockNode::new("/lockex/abc");
    let (lock, _, _) = lock.try_acquire(&token(100), &session("s1"));

    let (lock, outcome, events) = lock.try_acquire(&token(100), &session("s1"));

    assert_eq!(outcome, AcquireOutcome::Granted);
    assert!(events.is_empty());
    assert_eq!(lock.holder(), Some(&token(100)));
}

#[test]
fn release_by_holder_frees_the_lock() {
    let lock = LockNode::new("/lockex/abc");
    let (lock, _, _) = lock.try_acquire(&token(100), &session("s1"));

    let (lock, events) = lock.release(&token(100));

    assert!(lock.is_free());
    assert!(matches!(&events[0], RegistryEvent::Released { .. }));
}

#[test]
fn release_by_non_holder_is_noop() {
    let lock = LockNode::new("/lockex/abc");
    let (lock, _, _) = lock.try_acquire(&token(100), &session("s1"));

    let (lock, events) = lock.release(&token(200));

    assert_eq!(lock.holder(), Some(&token(100)));
    assert!(events.is_empty());
}

#[test]
fn release_of_free_lock_is_noop() {
    let lock = LockNode::new("/lockex/abc");
    let (lock, events) = lock.release(&token(100));
    assert!(lock.is_free());
    assert!(events.is_empty());
}

#[test]
fn session_expiry_frees_the_lock() {
    let lock = LockNode::new("/lockex/abc");
    let (lock, _, _) = lock.try_acquire(&token(100), &session("s1"));

    let (lock, events) = lock.expire_session(&session("s1"));

    assert!(lock.is_free());
    assert!(matches!(
        &events[0],
        RegistryEvent::Expired { token: t, .. } if t.pid == 100
    ));
}

#[test]
fn expiry_of_other_session_is_noop() {
    let lock = LockNode::new("/lockex/abc");
    let (lock, _, _) = lock.try_acquire(&token(100), &session("s1"));

    let (lock, events) = lock.expire_session(&session("s2"));

    assert_eq!(lock.holder(), Some(&token(100)));
    assert!(events.is_empty());
}

#[test]
fn freed_lock_can_be_acquired_by_next_client() {
    let lock = LockNode::new("/lockex/abc");
    let (lock, _, _) = lock.try_acquire(&token(100), &session("s1"));
    let (lock, _) = lock.release(&token(100));

    let (lock, outcome, _) = lock.try_acquire(&token(200), &session("s2"));

    assert_eq!(outcome, AcquireOutcome::Granted);
    assert_eq!(lock.holder(), Some(&token(200)));
}
