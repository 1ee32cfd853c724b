#![allow(missing_docs)]
use padchat_core::coordinator::SyncCoordinator;
use padchat_core::envelope::Envelope;
use padchat_core::error::{Error, Result};
use padchat_core::relay::{DirRelay, TransportRelay};
use padchat_core::transform;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use tempfile::tempdir;

/// Relay double whose publish path can be switched off, standing in for a
/// temporarily unreachable backend.
struct FlakyRelay {
    inner: DirRelay,
    fail_publish: Arc<AtomicBool>,
}

impl TransportRelay for FlakyRelay {
    fn publish(&self, recipient: &str, envelope: &Envelope) -> Result<()> {
        if self.fail_publish.load(Ordering::SeqCst) {
            return Err(Error::PublishFailure("relay offline".to_string()));
        }
        self.inner.publish(recipient, envelope)
    }

    fn fetch(&self, recipient: &str) -> Result<Vec<Envelope>> {
        self.inner.fetch(recipient)
    }

    fn delete(&self, recipient: &str, envelope_id: &str) -> Result<()> {
        self.inner.delete(recipient, envelope_id)
    }
}

fn peer_pair(
    root: &Path,
) -> (
    SyncCoordinator<DirRelay>,
    SyncCoordinator<DirRelay>,
    PathBuf,
) {
    let relay_root = root.join("relay");
    let alice = SyncCoordinator::new(root.join("alice"), "alice", DirRelay::new(&relay_root));
    let bob = SyncCoordinator::new(root.join("bob"), "bob", DirRelay::new(&relay_root));
    (alice, bob, relay_root)
}

fn shared_pad(alice: &SyncCoordinator<DirRelay>, bob: &SyncCoordinator<DirRelay>, root: &Path, count: usize) {
    let share_path = root.join("pad-share.json");
    alice.export_share("bob", count, &share_path).unwrap();
    assert_eq!(bob.import_share(&share_path).unwrap(), "alice");
}

fn inbox_files(relay_root: &Path, recipient: &str) -> Vec<PathBuf> {
    let inbox = relay_root.join(recipient);
    if !inbox.exists() {
        return Vec::new();
    }
    let mut files: Vec<PathBuf> = fs::read_dir(inbox)
        .unwrap()
        .map(|e| e.unwrap().path())
        .collect();
    files.sort();
    files
}

#[test]
fn test_share_then_chat_end_to_end() {
    let temp_dir = tempdir().unwrap();
    let (alice, bob, relay_root) = peer_pair(temp_dir.path());
    shared_pad(&alice, &bob, temp_dir.path(), 256);

    assert_eq!(alice.available("bob").unwrap(), 256);
    assert_eq!(bob.available("alice").unwrap(), 256);

    alice.send("bob", "hello bob").unwrap();
    let fresh = bob.sync().unwrap();
    assert_eq!(fresh.len(), 1);
    assert_eq!(fresh[0].text, "hello bob");
    assert_eq!(fresh[0].sender, "alice");

    // Both ledgers retired the same prefix length.
    assert_eq!(alice.available("bob").unwrap(), 256 - 9);
    assert_eq!(bob.available("alice").unwrap(), 256 - 9);

    // The envelope was deleted from the relay as the acknowledgment.
    assert!(inbox_files(&relay_root, "bob").is_empty());

    // Sender keeps its own copy in the log.
    let alice_log = alice.messages("bob").unwrap();
    assert_eq!(alice_log.len(), 1);
    assert_eq!(alice_log[0].sender, "alice");
}

#[test]
fn test_conversation_runs_both_directions() {
    let temp_dir = tempdir().unwrap();
    let (alice, bob, _) = peer_pair(temp_dir.path());
    shared_pad(&alice, &bob, temp_dir.path(), 64);

    alice.send("bob", "ping").unwrap();
    bob.sync().unwrap();
    bob.send("alice", "pong").unwrap();
    let fresh = alice.sync().unwrap();
    assert_eq!(fresh.len(), 1);
    assert_eq!(fresh[0].text, "pong");

    // ping (4) + pong (4) consumed on both sides, in the same order.
    assert_eq!(alice.available("bob").unwrap(), 64 - 8);
    assert_eq!(bob.available("alice").unwrap(), 64 - 8);

    let bob_log = bob.messages("alice").unwrap();
    assert_eq!(bob_log.len(), 2);
    assert_eq!(bob_log[0].text, "ping");
    assert_eq!(bob_log[1].text, "pong");
}

#[test]
fn test_redelivered_envelope_is_processed_once() {
    let temp_dir = tempdir().unwrap();
    let (alice, bob, relay_root) = peer_pair(temp_dir.path());
    shared_pad(&alice, &bob, temp_dir.path(), 64);

    alice.send("bob", "dup test").unwrap();
    let files = inbox_files(&relay_root, "bob");
    assert_eq!(files.len(), 1);
    let envelope_file = files[0].clone();
    let contents = fs::read_to_string(&envelope_file).unwrap();

    assert_eq!(bob.sync().unwrap().len(), 1);
    let available_after = bob.available("alice").unwrap();

    // The relay redelivers the already-processed envelope.
    fs::write(&envelope_file, contents).unwrap();
    let fresh = bob.sync().unwrap();
    assert!(fresh.is_empty());

    // Exactly one pad retirement and one logged message.
    assert_eq!(bob.available("alice").unwrap(), available_after);
    assert_eq!(bob.messages("alice").unwrap().len(), 1);
    // The stray copy was acknowledged away again.
    assert!(inbox_files(&relay_root, "bob").is_empty());
}

#[test]
fn test_send_without_pad_is_rejected_without_publishing() {
    let temp_dir = tempdir().unwrap();
    let (alice, _, relay_root) = peer_pair(temp_dir.path());

    let err = alice.send("bob", "no pad yet").unwrap_err();
    assert!(matches!(err, Error::InsufficientPad { .. }));
    assert_eq!(alice.available("bob").unwrap(), 0);
    assert_eq!(alice.pending("bob").unwrap(), 0);
    assert!(inbox_files(&relay_root, "bob").is_empty());
}

#[test]
fn test_publish_failure_keeps_envelope_for_retry() {
    let temp_dir = tempdir().unwrap();
    let relay_root = temp_dir.path().join("relay");
    let offline = Arc::new(AtomicBool::new(true));
    let alice = SyncCoordinator::new(
        temp_dir.path().join("alice"),
        "alice",
        FlakyRelay {
            inner: DirRelay::new(&relay_root),
            fail_publish: Arc::clone(&offline),
        },
    );
    let bob = SyncCoordinator::new(
        temp_dir.path().join("bob"),
        "bob",
        DirRelay::new(&relay_root),
    );

    let share_path = temp_dir.path().join("pad-share.json");
    alice.export_share("bob", 64, &share_path).unwrap();
    bob.import_share(&share_path).unwrap();

    let err = alice.send("bob", "queued").unwrap_err();
    assert!(matches!(err, Error::PublishFailure(_)));
    // Pad was retired at encode time and the envelope is waiting.
    assert_eq!(alice.available("bob").unwrap(), 64 - 6);
    assert_eq!(alice.pending("bob").unwrap(), 1);

    // Relay comes back; retry publishes without re-consuming pad.
    offline.store(false, Ordering::SeqCst);
    alice.flush_outbox("bob").unwrap();
    assert_eq!(alice.pending("bob").unwrap(), 0);
    assert_eq!(alice.available("bob").unwrap(), 64 - 6);

    let fresh = bob.sync().unwrap();
    assert_eq!(fresh.len(), 1);
    assert_eq!(fresh[0].text, "queued");

    // A second flush is a no-op; nothing is delivered twice.
    alice.flush_outbox("bob").unwrap();
    assert!(bob.sync().unwrap().is_empty());
}

#[test]
fn test_malformed_envelope_is_skipped_and_kept() {
    let temp_dir = tempdir().unwrap();
    let (alice, bob, relay_root) = peer_pair(temp_dir.path());
    shared_pad(&alice, &bob, temp_dir.path(), 64);

    let inbox = relay_root.join("bob");
    fs::create_dir_all(&inbox).unwrap();
    fs::write(inbox.join("junk.json"), "{ not an envelope").unwrap();

    alice.send("bob", "real one").unwrap();
    let fresh = bob.sync().unwrap();
    assert_eq!(fresh.len(), 1);
    assert_eq!(fresh[0].text, "real one");

    // The malformed file is never acknowledged, so it stays inspectable.
    assert!(inbox.join("junk.json").exists());
}

#[test]
fn test_envelope_beyond_pad_renders_garbled_tail() {
    let temp_dir = tempdir().unwrap();
    let (_, bob, relay_root) = peer_pair(temp_dir.path());

    // An envelope arrives from a peer whose pad share has not landed yet.
    let envelope = Envelope::new("mallory", vec![0x2603, 0x2604]);
    DirRelay::new(&relay_root).publish("bob", &envelope).unwrap();

    let fresh = bob.sync().unwrap();
    assert_eq!(fresh.len(), 1);
    // With zero pad available the whole ciphertext passes through unkeyed.
    assert_eq!(fresh[0].text, transform::from_units(&[0x2603, 0x2604]));
    assert_eq!(bob.available("mallory").unwrap(), 0);
}
