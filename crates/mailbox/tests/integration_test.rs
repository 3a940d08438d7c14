use mailbox::{AccessMode, Mailbox, MailboxConfig, Message, TYPE_NONE};
use std::collections::HashSet;
use std::path::Path;
use std::process::Command;
use std::sync::Arc;
use std::thread;
use tempfile::tempdir;

const MODES: [AccessMode; 2] = [AccessMode::Native, AccessMode::FileLock];

fn config(access: AccessMode) -> MailboxConfig {
    MailboxConfig::default().with_access(access)
}

/// Payload whose every byte is derived from `id`, so a torn read shows up as
/// mixed bytes or a wrong length.
fn payload_for(id: i32) -> Vec<u8> {
    let len = 1 + (id as usize * 37) % 512;
    vec![(id % 251) as u8; len]
}

fn assert_untorn(msg: &Message) {
    assert_eq!(
        msg.data,
        payload_for(msg.id),
        "Message {} carries bytes from another put",
        msg.id
    );
}

/// Test emptiness transitions across two independent handles
///
/// Tests:
/// - Fresh segment is empty for both handles
/// - A put through one handle is visible through the other
/// - The matching get empties the slot for both
#[test]
fn test_emptiness_transitions_between_handles() {
    for mode in MODES {
        let dir = tempdir().unwrap();
        let path = dir.path().join("transitions.mmap");

        let writer = Mailbox::build(&path, config(mode)).unwrap();
        let reader = Mailbox::build(&path, config(mode)).unwrap();

        assert!(writer.is_empty().unwrap());
        assert!(reader.is_empty().unwrap());

        assert!(writer.put(1, 2, b"across handles", false).unwrap());
        assert!(!reader.is_empty().unwrap(), "Reader should see the put");

        let msg = reader.get(false).unwrap().unwrap();
        assert_eq!(msg, Message::new(1, 2, &b"across handles"[..]));
        assert!(writer.is_empty().unwrap(), "Writer should see the drain");
        assert!(reader.is_empty().unwrap());
    }
}

/// Test ordered hand-off between a producer and a consumer on separate
/// handles. Every id must arrive exactly once, in production order.
#[test]
fn test_producer_consumer_preserves_order() {
    const TOTAL: i32 = 2_000;

    for mode in MODES {
        let dir = tempdir().unwrap();
        let path = dir.path().join("ordered.mmap");
        // Both sides see an initialized segment before racing
        drop(Mailbox::build(&path, config(mode)).unwrap());

        let producer_path = path.clone();
        let producer = thread::spawn(move || {
            let mailbox = Mailbox::build(&producer_path, config(mode)).unwrap();
            for id in 0..TOTAL {
                assert!(mailbox.put(7, id, &payload_for(id), true).unwrap());
            }
            mailbox.close().unwrap();
        });

        let consumer_path = path.clone();
        let consumer = thread::spawn(move || {
            let mailbox = Mailbox::build(&consumer_path, config(mode)).unwrap();
            let mut ids = Vec::with_capacity(TOTAL as usize);
            while ids.len() < TOTAL as usize {
                let msg = mailbox.get(true).unwrap().unwrap();
                assert_eq!(msg.msg_type, 7);
                assert_untorn(&msg);
                ids.push(msg.id);
            }
            mailbox.close().unwrap();
            ids
        });

        producer.join().expect("Producer thread panicked");
        let ids = consumer.join().expect("Consumer thread panicked");

        assert_eq!(ids, (0..TOTAL).collect::<Vec<_>>());
    }
}

/// Test mutual exclusion with several producers and consumers sharing one
/// segment through their own handles.
#[test]
fn test_many_producers_and_consumers_never_tear() {
    const PRODUCERS: i32 = 4;
    const PER_PRODUCER: i32 = 250;
    const CONSUMERS: usize = 3;
    const TOTAL: usize = (PRODUCERS * PER_PRODUCER) as usize;

    for mode in MODES {
        let dir = tempdir().unwrap();
        let path = dir.path().join("contended.mmap");
        drop(Mailbox::build(&path, config(mode)).unwrap());

        let producers: Vec<_> = (0..PRODUCERS)
            .map(|p| {
                let path = path.clone();
                thread::spawn(move || {
                    let mailbox = Mailbox::build(&path, config(mode)).unwrap();
                    for n in 0..PER_PRODUCER {
                        let id = p * PER_PRODUCER + n;
                        mailbox.put(p, id, &payload_for(id), true).unwrap();
                    }
                })
            })
            .collect();

        let received = Arc::new(std::sync::Mutex::new(Vec::with_capacity(TOTAL)));
        let consumers: Vec<_> = (0..CONSUMERS)
            .map(|_| {
                let path = path.clone();
                let received = Arc::clone(&received);
                thread::spawn(move || {
                    let mailbox = Mailbox::build(&path, config(mode)).unwrap();
                    loop {
                        if received.lock().unwrap().len() >= TOTAL {
                            break;
                        }
                        match mailbox.get(false).unwrap() {
                            Some(msg) => {
                                assert_untorn(&msg);
                                assert_eq!(msg.msg_type, msg.id / PER_PRODUCER);
                                received.lock().unwrap().push(msg.id);
                            }
                            None => thread::yield_now(),
                        }
                    }
                })
            })
            .collect();

        for handle in producers {
            handle.join().expect("Producer thread panicked");
        }
        for handle in consumers {
            handle.join().expect("Consumer thread panicked");
        }

        let received = received.lock().unwrap();
        let unique: HashSet<_> = received.iter().copied().collect();
        assert_eq!(received.len(), TOTAL, "Every message is delivered once");
        assert_eq!(unique.len(), TOTAL, "No message is delivered twice");
    }
}

/// Test one handle shared by threads through an Arc.
#[test]
fn test_shared_handle_across_threads() {
    const PER_THREAD: i32 = 200;

    for mode in MODES {
        let dir = tempdir().unwrap();
        let mailbox = Arc::new(Mailbox::build(dir.path().join("shared.mmap"), config(mode)).unwrap());

        let writers: Vec<_> = (0..2)
            .map(|t| {
                let mailbox = Arc::clone(&mailbox);
                thread::spawn(move || {
                    for n in 0..PER_THREAD {
                        let id = t * PER_THREAD + n;
                        while !mailbox.put(TYPE_NONE, id, &payload_for(id), false).unwrap() {
                            thread::yield_now();
                        }
                    }
                })
            })
            .collect();

        let mut ids = HashSet::new();
        while ids.len() < (2 * PER_THREAD) as usize {
            if let Some(msg) = mailbox.get(false).unwrap() {
                assert_untorn(&msg);
                assert!(ids.insert(msg.id), "Duplicate id {}", msg.id);
            } else {
                thread::yield_now();
            }
        }

        for handle in writers {
            handle.join().expect("Writer thread panicked");
        }
        assert!(mailbox.is_empty().unwrap());
    }
}

/// Test that clean is terminal for the file but not for the path.
#[test]
fn test_clean_then_fresh_open() {
    for mode in MODES {
        let dir = tempdir().unwrap();
        let path = dir.path().join("clean.mmap");

        let first = Mailbox::build(&path, config(mode)).unwrap();
        first.send(b"gone soon").unwrap();
        first.clean().unwrap();
        assert!(!path.exists());

        let second = Mailbox::build(&path, config(mode)).unwrap();
        assert!(second.is_empty().unwrap());
        assert_eq!(second.get(false).unwrap(), None);
        second.clean().unwrap();
    }
}

const CHILD_PATH_ENV: &str = "MAILBOX_TEST_CHILD_PATH";
const CHILD_ACCESS_ENV: &str = "MAILBOX_TEST_CHILD_ACCESS";
const CHILD_TOTAL: i32 = 500;

/// Producer half of `test_cross_process_handoff`, run in a child process.
#[test]
#[ignore]
fn child_producer() {
    let Ok(path) = std::env::var(CHILD_PATH_ENV) else {
        return;
    };
    let access: AccessMode = std::env::var(CHILD_ACCESS_ENV).unwrap().parse().unwrap();

    let mailbox = Mailbox::build(&path, config(access)).unwrap();
    for id in 0..CHILD_TOTAL {
        mailbox.put(1, id, &payload_for(id), true).unwrap();
    }
    mailbox.close().unwrap();
}

fn spawn_child_producer(path: &Path, access: AccessMode) -> std::process::Child {
    Command::new(std::env::current_exe().unwrap())
        .args(["child_producer", "--exact", "--ignored", "--nocapture"])
        .env(CHILD_PATH_ENV, path)
        .env(CHILD_ACCESS_ENV, access.as_str())
        .spawn()
        .expect("Failed to spawn child process")
}

/// Test hand-off between two real processes.
#[test]
fn test_cross_process_handoff() {
    for mode in MODES {
        let dir = tempdir().unwrap();
        let path = dir.path().join("cross_process.mmap");
        let mailbox = Mailbox::build(&path, config(mode)).unwrap();

        let mut child = spawn_child_producer(&path, mode);

        let mut expected = 0;
        while expected < CHILD_TOTAL {
            match mailbox.get(false).unwrap() {
                Some(msg) => {
                    assert_eq!(msg.id, expected, "Ids arrive in production order");
                    assert_untorn(&msg);
                    expected += 1;
                }
                None => {
                    // A child that died early would otherwise hang the test
                    if let Some(status) = child.try_wait().unwrap() {
                        assert!(
                            !mailbox.is_empty().unwrap(),
                            "Child exited ({status}) after {expected} messages"
                        );
                    }
                    thread::yield_now();
                }
            }
        }

        let status = child.wait().unwrap();
        assert!(status.success(), "Child producer failed: {status}");
        assert!(mailbox.is_empty().unwrap());
        mailbox.clean().unwrap();
    }
}
