// File:    coordinator.rs
// Author:  apezoo
// Date:    2025-09-14
//
// Description: Per-conversation orchestration of encrypt/publish and fetch/decrypt/acknowledge against the relay.
//
// License:
// This project is licensed under the terms of the GNU AGPLv3 license.
// See the LICENSE.md file in the project root for full license information.

//! The sync coordinator ties the codec, the ledgers, and the transport
//! relay together. It is an injected service object, not a process-wide
//! singleton: construct one per vault and pass it where it is needed.
//!
//! All mutations of one conversation are serialized behind that
//! conversation's mutex, so a length check and the consume that follows it
//! can never interleave with another trigger. Distinct conversations
//! proceed in parallel.
//!
//! Receive path, per envelope: dedup against the decrypted log, decrypt,
//! persist the ledger durably, then delete the envelope from the relay as
//! the acknowledgment. A crash before the delete causes redelivery, which
//! dedup turns into a no-op with exactly one pad retirement.

use crate::codec;
use crate::envelope::{DecryptedMessage, Envelope};
use crate::error::{Error, Result};
use crate::ledger::{self, PadLedger};
use crate::pad_generator::{self, PadShare};
use crate::relay::TransportRelay;
use log::{debug, error, info};
use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, PoisonError};

struct Conversation {
    ledger: PadLedger,
    seen: HashSet<String>,
}

/// Orchestrates message flow for every conversation in one vault.
pub struct SyncCoordinator<R> {
    vault: PathBuf,
    local_id: String,
    relay: R,
    conversations: Mutex<HashMap<String, Arc<Mutex<Conversation>>>>,
}

impl<R: TransportRelay> SyncCoordinator<R> {
    /// Creates a coordinator for the local peer over an injected relay.
    pub fn new(vault: impl Into<PathBuf>, local_id: &str, relay: R) -> Self {
        Self {
            vault: vault.into(),
            local_id: local_id.to_string(),
            relay,
            conversations: Mutex::new(HashMap::new()),
        }
    }

    /// The local peer's identifier.
    #[must_use]
    pub fn local_id(&self) -> &str {
        &self.local_id
    }

    fn conversation(&self, peer: &str) -> Result<Arc<Mutex<Conversation>>> {
        let mut map = self
            .conversations
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        if let Some(conv) = map.get(peer) {
            return Ok(Arc::clone(conv));
        }
        let pad_ledger = ledger::load_ledger(&self.vault, peer)?;
        let seen = pad_ledger.messages().iter().map(|m| m.id.clone()).collect();
        let conv = Arc::new(Mutex::new(Conversation {
            ledger: pad_ledger,
            seen,
        }));
        map.insert(peer.to_string(), Arc::clone(&conv));
        Ok(conv)
    }

    /// Encrypts `text` for `peer` and publishes it.
    ///
    /// Pad is retired and the ledger persisted before the publish attempt;
    /// a failed publish leaves the envelope in the outbox for retry
    /// without re-consuming keystream.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InsufficientPad`] (nothing consumed, nothing
    /// queued), [`Error::PublishFailure`] (consumed and queued, publish
    /// pending), or [`Error::Storage`].
    pub fn send(&self, peer: &str, text: &str) -> Result<()> {
        let conv = self.conversation(peer)?;
        let mut conv = conv.lock().unwrap_or_else(PoisonError::into_inner);
        let envelope = codec::seal_envelope(text, &self.local_id, &mut conv.ledger)?;
        conv.seen.insert(envelope.id.clone());
        conv.ledger.push_outbox(envelope);
        ledger::save_ledger(&self.vault, peer, &conv.ledger)?;
        self.drain_outbox(peer, &mut conv)
    }

    /// Retries publication of any envelopes still queued for `peer`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::PublishFailure`] if the relay write fails again;
    /// the remaining envelopes stay queued.
    pub fn flush_outbox(&self, peer: &str) -> Result<()> {
        let conv = self.conversation(peer)?;
        let mut conv = conv.lock().unwrap_or_else(PoisonError::into_inner);
        self.drain_outbox(peer, &mut conv)
    }

    fn drain_outbox(&self, peer: &str, conv: &mut Conversation) -> Result<()> {
        while let Some(envelope) = conv.ledger.outbox_front().cloned() {
            self.relay.publish(peer, &envelope)?;
            conv.ledger.pop_outbox();
            ledger::save_ledger(&self.vault, peer, &conv.ledger)?;
        }
        Ok(())
    }

    /// Fetches every envelope addressed to the local peer, decrypts the
    /// fresh ones, and acknowledges each by deleting it from the relay.
    /// Returns the newly decrypted messages, oldest first.
    ///
    /// Redelivered duplicates are dropped silently. A processing failure
    /// stops further envelopes from that sender for this pass only; other
    /// conversations continue.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Storage`] if the relay itself cannot be fetched.
    pub fn sync(&self) -> Result<Vec<DecryptedMessage>> {
        let envelopes = self.relay.fetch(&self.local_id)?;
        let mut fresh = Vec::new();
        let mut failed: HashSet<String> = HashSet::new();
        for envelope in envelopes {
            if failed.contains(&envelope.sender) {
                continue;
            }
            match self.process_envelope(&envelope) {
                Ok(message) => fresh.push(message),
                Err(Error::DuplicateEnvelope(id)) => {
                    debug!("dropping redelivered envelope {id}");
                }
                Err(e) => {
                    error!(
                        "failed to process envelope {} from '{}': {e}",
                        envelope.id, envelope.sender
                    );
                    failed.insert(envelope.sender.clone());
                }
            }
        }
        if !fresh.is_empty() {
            info!("decrypted {} new message(s)", fresh.len());
        }
        Ok(fresh)
    }

    /// Runs one envelope through the receive pipeline: dedup, decrypt,
    /// persist, acknowledge.
    ///
    /// # Errors
    ///
    /// Returns [`Error::DuplicateEnvelope`] for an already-processed id
    /// (after re-acknowledging the stray copy), or [`Error::Storage`] if
    /// persistence or the acknowledgment fails.
    pub fn process_envelope(&self, envelope: &Envelope) -> Result<DecryptedMessage> {
        let conv = self.conversation(&envelope.sender)?;
        let mut conv = conv.lock().unwrap_or_else(PoisonError::into_inner);
        if conv.seen.contains(&envelope.id) {
            // Redelivery after a crash between persist and ack.
            self.relay.delete(&self.local_id, &envelope.id)?;
            return Err(Error::DuplicateEnvelope(envelope.id.clone()));
        }
        let message = codec::open_envelope(envelope, &mut conv.ledger)?;
        conv.seen.insert(envelope.id.clone());
        // Must be durable before the ack; redelivery dedups after a crash here.
        ledger::save_ledger(&self.vault, &envelope.sender, &conv.ledger)?;
        self.relay.delete(&self.local_id, &envelope.id)?;
        Ok(message)
    }

    /// Generates `count` keystream units for the conversation with `peer`,
    /// appends them to the local ledger, and writes the transfer file for
    /// the other peer at `path`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::SecureRandomUnavailable`] or [`Error::Storage`].
    pub fn export_share(&self, peer: &str, count: usize, path: &Path) -> Result<()> {
        let units = pad_generator::generate_units(count)?;
        let conv = self.conversation(peer)?;
        let mut conv = conv.lock().unwrap_or_else(PoisonError::into_inner);
        conv.ledger.top_up(units.clone());
        ledger::save_ledger(&self.vault, peer, &conv.ledger)?;
        let share = PadShare::new(self.local_id.clone(), units);
        pad_generator::write_share(path, &share)?;
        info!("shared {count} pad unit(s) with '{peer}'");
        Ok(())
    }

    /// Imports a pad share file received out of band, merging its
    /// keystream into the sharer's conversation (created if new). Returns
    /// the sharer's peer id.
    ///
    /// # Errors
    ///
    /// Returns [`Error::MalformedShare`] on parse or digest failure, or
    /// [`Error::Storage`] if the ledger cannot be persisted.
    pub fn import_share(&self, path: &Path) -> Result<String> {
        let share = pad_generator::read_share(path)?;
        let conv = self.conversation(&share.id)?;
        let mut conv = conv.lock().unwrap_or_else(PoisonError::into_inner);
        let count = share.keystream.len();
        conv.ledger.top_up(share.keystream);
        ledger::save_ledger(&self.vault, &share.id, &conv.ledger)?;
        info!("imported {count} pad unit(s) from '{}'", share.id);
        Ok(share.id)
    }

    /// The decrypted log for `peer`, oldest first.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Storage`] if the ledger cannot be loaded.
    pub fn messages(&self, peer: &str) -> Result<Vec<DecryptedMessage>> {
        let conv = self.conversation(peer)?;
        let conv = conv.lock().unwrap_or_else(PoisonError::into_inner);
        Ok(conv.ledger.messages().to_vec())
    }

    /// Keystream units still spendable with `peer`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Storage`] if the ledger cannot be loaded.
    pub fn available(&self, peer: &str) -> Result<usize> {
        let conv = self.conversation(peer)?;
        let conv = conv.lock().unwrap_or_else(PoisonError::into_inner);
        Ok(conv.ledger.available())
    }

    /// Envelopes encrypted for `peer` but not yet published.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Storage`] if the ledger cannot be loaded.
    pub fn pending(&self, peer: &str) -> Result<usize> {
        let conv = self.conversation(peer)?;
        let conv = conv.lock().unwrap_or_else(PoisonError::into_inner);
        Ok(conv.ledger.outbox_len())
    }

    /// Peers with a stored conversation in this vault.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Storage`] if the vault cannot be read.
    pub fn peers(&self) -> Result<Vec<String>> {
        ledger::list_peers(&self.vault)
    }
}
