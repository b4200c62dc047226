// Named semaphore wrapper tests.
// Run with: cargo test --test semaphore -- --nocapture

#![cfg(unix)]

use mmq_ipc::Core::NamedSemaphore;
use serial_test::serial;
use std::time::Duration;

fn sem_name(tag: &str) -> String {
    format!("/mmq_sem_{}_{}", tag, std::process::id())
}

#[test]
#[serial]
fn post_and_try_wait_count_tokens() {
    let name = sem_name("count");
    let _ = NamedSemaphore::unlink(&name);

    let sem = NamedSemaphore::create_exclusive(&name, 0).unwrap();
    assert!(!sem.try_wait().unwrap(), "fresh counting semaphore is empty");

    sem.post().unwrap();
    sem.post().unwrap();
    assert!(sem.try_wait().unwrap());
    assert!(sem.try_wait().unwrap());
    assert!(!sem.try_wait().unwrap());

    NamedSemaphore::unlink(&name).unwrap();
}

#[test]
#[serial]
fn create_exclusive_falls_back_to_open_on_eexist() {
    let name = sem_name("exist");
    let _ = NamedSemaphore::unlink(&name);

    let first = NamedSemaphore::create_exclusive(&name, 1).unwrap();
    // second create sees EEXIST and opens the same object: the single
    // initial token is shared, not doubled
    let second = NamedSemaphore::create_exclusive(&name, 1).unwrap();
    assert!(first.try_wait().unwrap());
    assert!(!second.try_wait().unwrap());

    NamedSemaphore::unlink(&name).unwrap();
}

#[test]
#[serial]
fn wait_timeout_elapses_when_empty() {
    let name = sem_name("timeo");
    let _ = NamedSemaphore::unlink(&name);

    let sem = NamedSemaphore::create_exclusive(&name, 0).unwrap();
    let start = std::time::Instant::now();
    assert!(!sem.wait_timeout(Duration::from_millis(50)).unwrap());
    assert!(start.elapsed() >= Duration::from_millis(40));

    sem.post().unwrap();
    assert!(sem.wait_timeout(Duration::from_millis(50)).unwrap());

    NamedSemaphore::unlink(&name).unwrap();
}

#[test]
#[serial]
fn open_after_unlink_fails() {
    let name = sem_name("gone");
    let _ = NamedSemaphore::unlink(&name);

    let _sem = NamedSemaphore::create_exclusive(&name, 0).unwrap();
    NamedSemaphore::unlink(&name).unwrap();
    assert!(NamedSemaphore::open(&name).is_err());
}
