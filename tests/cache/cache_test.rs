//! Behavioural coverage for the credential cache: round-trip, TTL
//! expiry, clear idempotence and observer notifications.

use std::cell::RefCell;
use std::rc::Rc;
use std::thread;
use std::time::Duration;

use octavi_manager::cache::CredentialCache;

/// Attach an observer that records every notification.
fn observed(cache: &mut CredentialCache) -> Rc<RefCell<Vec<bool>>> {
    let events = Rc::new(RefCell::new(Vec::new()));
    let sink = Rc::clone(&events);
    cache.set_status_observer(Box::new(move |active| sink.borrow_mut().push(active)));
    events
}

#[test]
fn round_trip_within_ttl() {
    let mut cache = CredentialCache::new();
    cache.cache("correct horse battery staple");
    let got = cache.get().expect("credential should still be cached");
    assert_eq!(got.as_str(), "correct horse battery staple");
}

#[test]
fn caching_notifies_active() {
    let mut cache = CredentialCache::new();
    let events = observed(&mut cache);
    cache.cache("pw");
    assert_eq!(*events.borrow(), vec![true]);
    assert!(cache.is_active());
}

#[test]
fn expiry_returns_absent_and_notifies_inactive_once() {
    let mut cache = CredentialCache::with_ttl(Duration::from_millis(30));
    let events = observed(&mut cache);
    cache.cache("pw");
    thread::sleep(Duration::from_millis(60));

    assert!(cache.get().is_none());
    // A second lookup on the now-empty cache must not notify again.
    assert!(cache.get().is_none());
    assert_eq!(*events.borrow(), vec![true, false]);
    assert!(!cache.is_active());
}

#[test]
fn clear_on_empty_cache_notifies_inactive() {
    let mut cache = CredentialCache::new();
    let events = observed(&mut cache);
    cache.clear();
    assert_eq!(*events.borrow(), vec![false]);
    assert!(!cache.is_active());
}

#[test]
fn clear_discards_credential_before_expiry() {
    let mut cache = CredentialCache::new();
    let events = observed(&mut cache);
    cache.cache("pw");
    cache.clear();
    assert!(cache.get().is_none());
    assert_eq!(*events.borrow(), vec![true, false]);
}

#[test]
fn fresh_password_replaces_expired_one() {
    let mut cache = CredentialCache::with_ttl(Duration::from_millis(30));
    cache.cache("old");
    thread::sleep(Duration::from_millis(60));
    assert!(cache.get().is_none());

    cache.cache("new");
    let got = cache.get().expect("fresh credential should be cached");
    assert_eq!(got.as_str(), "new");
}
