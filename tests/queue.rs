// Queue protocol tests: publish/drain round trips, registration, and
// sanity rejection. Every test uses its own temp directory and its own
// named-semaphore pair so runs cannot interfere with each other.

#![cfg(unix)]

use mmq_ipc::error::QueueError;
use mmq_ipc::Core::NamedSemaphore;
use mmq_ipc::SPMC::QueueBuilder;
use serial_test::serial;
use std::time::Duration;
use tempfile::tempdir;

fn builder(dir: &std::path::Path, tag: &str) -> QueueBuilder {
    let pid = std::process::id();
    QueueBuilder::new().in_dir(dir).with_sem_names(
        format!("/mmq_{tag}_{pid}_n"),
        format!("/mmq_{tag}_{pid}_r"),
    )
}

fn unlink_sems(tag: &str) {
    let pid = std::process::id();
    let _ = NamedSemaphore::unlink(&format!("/mmq_{tag}_{pid}_n"));
    let _ = NamedSemaphore::unlink(&format!("/mmq_{tag}_{pid}_r"));
}

#[test]
#[serial]
fn publish_then_drain_round_trip() {
    let dir = tempdir().unwrap();
    let mut producer = builder(dir.path(), "smoke")
        .with_index_initial_bytes(64 * 1024)
        .with_data_initial_bytes(1024 * 1024)
        .with_max_consumers(4)
        .build_producer()
        .unwrap();

    assert_eq!(producer.publish(b"hello\0").unwrap(), 0);
    assert_eq!(producer.publish(b"world\0").unwrap(), 1);
    assert_eq!(producer.next_seq(), 2);
    // write_pos stays 8-byte aligned and covers both padded spans
    assert_eq!(producer.write_pos(), 16);

    let mut consumer = builder(dir.path(), "smoke").build_consumer().unwrap();
    consumer.register("c1", 0).unwrap();

    let first = consumer.drain().expect("first message");
    assert_eq!(first.seq, 0);
    assert_eq!(first.payload, b"hello\0");
    let second = consumer.drain().expect("second message");
    assert_eq!(second.seq, 1);
    assert_eq!(second.payload, b"world\0");
    assert!(consumer.drain().is_none());
    assert_eq!(consumer.last_seq(), Some(2));

    unlink_sems("smoke");
}

#[test]
#[serial]
fn late_joiner_starts_mid_stream() {
    let dir = tempdir().unwrap();
    let mut producer = builder(dir.path(), "late").build_producer().unwrap();
    producer.publish(b"hello\0").unwrap();
    producer.publish(b"world\0").unwrap();

    let mut c2 = builder(dir.path(), "late").build_consumer().unwrap();
    c2.register("c2", 1).unwrap();

    let msg = c2.drain().expect("should see the second message");
    assert_eq!(msg.seq, 1);
    assert_eq!(msg.payload, b"world\0");
    assert!(c2.drain().is_none());

    unlink_sems("late");
}

#[test]
#[serial]
fn zero_length_message_advances_sequence() {
    let dir = tempdir().unwrap();
    let mut producer = builder(dir.path(), "zlen").build_producer().unwrap();

    let before_pos = producer.write_pos();
    assert_eq!(producer.publish(b"").unwrap(), 0);
    assert_eq!(producer.next_seq(), 1);
    assert_eq!(producer.write_pos(), before_pos);

    let mut consumer = builder(dir.path(), "zlen").build_consumer().unwrap();
    consumer.register("c", 0).unwrap();
    let msg = consumer.drain().expect("empty message is still a message");
    assert_eq!(msg.len(), 0);
    assert!(consumer.drain().is_none());

    unlink_sems("zlen");
}

#[test]
#[serial]
fn reregister_same_name_resumes_cursor() {
    let dir = tempdir().unwrap();
    let mut producer = builder(dir.path(), "rereg").build_producer().unwrap();
    producer.publish(b"first").unwrap();
    producer.publish(b"second").unwrap();

    let mut c1 = builder(dir.path(), "rereg").build_consumer().unwrap();
    let slot = c1.register("c1", 0).unwrap();
    assert_eq!(c1.drain().unwrap().payload, b"first");
    c1.close();
    drop(c1);

    // a new process-equivalent attaches under the same name: the slot and
    // its cursor survive the detach
    let mut c1b = builder(dir.path(), "rereg").build_consumer().unwrap();
    assert_eq!(c1b.register("c1", 0).unwrap(), slot);
    assert_eq!(c1b.drain().unwrap().payload, b"second");
    assert!(c1b.drain().is_none());

    // registering twice on the same handle is idempotent too
    assert_eq!(c1b.register("c1", 0).unwrap(), slot);
    assert!(c1b.drain().is_none(), "cursor must not reset");

    unlink_sems("rereg");
}

#[test]
#[serial]
fn producer_restart_zeroes_registrations() {
    let dir = tempdir().unwrap();
    let mut producer = builder(dir.path(), "restart").build_producer().unwrap();
    producer.publish(b"first").unwrap();
    producer.publish(b"second").unwrap();

    let mut c1 = builder(dir.path(), "restart").build_consumer().unwrap();
    c1.register("c1", 0).unwrap();
    assert_eq!(c1.drain().unwrap().payload, b"first");
    c1.close();
    drop(c1);

    // restart: index/data are reused as-is, control is re-initialized
    producer.close();
    drop(producer);
    let producer = builder(dir.path(), "restart").build_producer().unwrap();
    assert_eq!(producer.next_seq(), 2, "messages survive a restart");

    let mut c1b = builder(dir.path(), "restart").build_consumer().unwrap();
    c1b.register("c1", 0).unwrap();
    let msg = c1b.drain().expect("slot was zeroed, cursor starts over");
    assert_eq!(msg.payload, b"first");

    unlink_sems("restart");
}

#[test]
#[serial]
fn consumer_slots_full() {
    let dir = tempdir().unwrap();
    let _producer = builder(dir.path(), "full")
        .with_max_consumers(2)
        .build_producer()
        .unwrap();

    let mut a = builder(dir.path(), "full").build_consumer().unwrap();
    let mut b = builder(dir.path(), "full").build_consumer().unwrap();
    let mut c = builder(dir.path(), "full").build_consumer().unwrap();

    assert_eq!(a.register("a", 0).unwrap(), 0);
    assert_eq!(b.register("b", 0).unwrap(), 1);
    assert!(matches!(
        c.register("c", 0),
        Err(QueueError::ConsumerSlotsFull)
    ));
    // same-name registration still succeeds when the table is full
    assert_eq!(c.register("b", 0).unwrap(), 1);

    unlink_sems("full");
}

#[test]
#[serial]
fn corrupted_control_magic_rejected() {
    let dir = tempdir().unwrap();
    {
        let mut producer = builder(dir.path(), "corrupt").build_producer().unwrap();
        producer.publish(b"payload").unwrap();
        producer.close();
    }

    // flip one byte of the control magic
    let control_path = dir.path().join("control.mm");
    let mut bytes = std::fs::read(&control_path).unwrap();
    bytes[0] ^= 0xFF;
    std::fs::write(&control_path, &bytes).unwrap();

    match builder(dir.path(), "corrupt").build_consumer() {
        Err(QueueError::ControlSanity) => {}
        other => panic!("expected ControlSanity, got {:?}", other.map(|_| ())),
    }

    // index and data are untouched and still pass their own checks
    let index_bytes = std::fs::read(dir.path().join("index.mm")).unwrap();
    assert_eq!(&index_bytes[0..8], &0x1CEB00FDEADBEEFu64.to_le_bytes());

    unlink_sems("corrupt");
}

#[test]
#[serial]
fn wait_timeout_consumes_one_post_per_publish() {
    // stale semaphores from an aborted run would skew the token count
    unlink_sems("notify");
    let dir = tempdir().unwrap();
    let mut producer = builder(dir.path(), "notify").build_producer().unwrap();

    let mut consumer = builder(dir.path(), "notify").build_consumer().unwrap();
    consumer.register("w", 0).unwrap();

    producer.publish(b"a").unwrap();
    producer.publish(b"b").unwrap();
    producer.publish(b"c").unwrap();

    // three posts buffered: three timed waits succeed, the fourth times out
    for _ in 0..3 {
        consumer.wait_timeout(Duration::from_millis(200)).unwrap();
    }
    assert!(matches!(
        consumer.wait_timeout(Duration::from_millis(50)),
        Err(QueueError::TimedOut)
    ));

    unlink_sems("notify");
}

#[test]
#[serial]
fn drain_before_register_returns_nothing() {
    let dir = tempdir().unwrap();
    let mut producer = builder(dir.path(), "noreg").build_producer().unwrap();
    producer.publish(b"x").unwrap();

    let mut consumer = builder(dir.path(), "noreg").build_consumer().unwrap();
    assert!(consumer.drain().is_none());
    assert_eq!(consumer.slot_index(), None);

    unlink_sems("noreg");
}

#[test]
#[serial]
fn close_is_idempotent_on_both_roles() {
    let dir = tempdir().unwrap();
    let mut producer = builder(dir.path(), "close").build_producer().unwrap();
    producer.publish(b"x").unwrap();
    let mut consumer = builder(dir.path(), "close").build_consumer().unwrap();
    consumer.register("c", 0).unwrap();

    producer.close();
    producer.close();
    assert!(producer.publish(b"y").is_err());

    consumer.close();
    consumer.close();
    assert!(consumer.drain().is_none());

    unlink_sems("close");
}
