// File:    ledger.rs
// Author:  apezoo
// Date:    2025-09-14
//
// Description: Per-conversation pad ledger: remaining keystream, decrypted log, and vault persistence.
//
// License:
// This project is licensed under the terms of the GNU AGPLv3 license.
// See the LICENSE.md file in the project root for full license information.

//! The pad ledger owns everything a conversation needs locally: the
//! remaining keystream, the decrypted message log, a little metadata, and
//! the outbox of encrypted-but-unpublished envelopes.
//!
//! Consumed keystream is removed from the front of `remaining` outright.
//! There are no encode/decode pointers to drift out of sync with the
//! length; what is left in the ledger is exactly what is still spendable.

use crate::envelope::{DecryptedMessage, Envelope};
use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

/// State of one conversation, keyed in the vault by the remote peer's id.
/// The remote peer holds an independent ledger that stays aligned with
/// this one in consumption order as envelopes are processed.
#[derive(Serialize, Deserialize, Debug, Clone, Default)]
pub struct PadLedger {
    /// Display name for the conversation.
    pub display_name: String,
    /// Optional avatar reference.
    pub avatar: Option<String>,
    /// Length of the keystream after the most recent top-up.
    pub pad_length_hint: usize,
    remaining: Vec<u16>,
    messages: Vec<DecryptedMessage>,
    outbox: Vec<Envelope>,
}

impl PadLedger {
    /// Creates an empty ledger with a display name.
    #[must_use]
    pub fn new(display_name: &str) -> Self {
        Self {
            display_name: display_name.to_string(),
            ..Self::default()
        }
    }

    /// Units of keystream still spendable.
    #[must_use]
    pub fn available(&self) -> usize {
        self.remaining.len()
    }

    /// Appends newly shared keystream material.
    pub fn top_up(&mut self, units: Vec<u16>) {
        self.remaining.extend(units);
        self.pad_length_hint = self.remaining.len();
    }

    /// Removes and returns the first `n` keystream units.
    ///
    /// All-or-nothing: if fewer than `n` units remain, nothing is consumed.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InsufficientPad`] if `n` exceeds [`available`](Self::available).
    pub fn consume_prefix(&mut self, n: usize) -> Result<Vec<u16>> {
        if n > self.remaining.len() {
            return Err(Error::InsufficientPad {
                needed: n,
                available: self.remaining.len(),
            });
        }
        Ok(self.remaining.drain(..n).collect())
    }

    /// Appends a message to the decrypted log.
    pub fn append_decrypted(&mut self, message: DecryptedMessage) {
        self.messages.push(message);
    }

    /// The decrypted log, oldest first.
    #[must_use]
    pub fn messages(&self) -> &[DecryptedMessage] {
        &self.messages
    }

    /// Whether an envelope id has already been logged.
    #[must_use]
    pub fn has_message(&self, envelope_id: &str) -> bool {
        self.messages.iter().any(|m| m.id == envelope_id)
    }

    /// Queues an encrypted envelope for publication.
    pub fn push_outbox(&mut self, envelope: Envelope) {
        self.outbox.push(envelope);
    }

    /// Oldest unpublished envelope, if any.
    #[must_use]
    pub fn outbox_front(&self) -> Option<&Envelope> {
        self.outbox.first()
    }

    /// Drops the oldest unpublished envelope after a successful publish.
    pub fn pop_outbox(&mut self) {
        if !self.outbox.is_empty() {
            self.outbox.remove(0);
        }
    }

    /// Number of envelopes awaiting publication.
    #[must_use]
    pub fn outbox_len(&self) -> usize {
        self.outbox.len()
    }
}

/// Path of the ledger blob for `peer` under `vault`.
#[must_use]
pub fn ledger_path(vault: &Path, peer: &str) -> PathBuf {
    vault.join("ledgers").join(format!("{peer}.json"))
}

/// Loads the ledger for `peer`, or a fresh default if none is stored yet.
///
/// # Errors
///
/// Returns [`Error::Storage`] if an existing blob cannot be read or parsed.
pub fn load_ledger(vault: &Path, peer: &str) -> Result<PadLedger> {
    let path = ledger_path(vault, peer);
    if path.exists() {
        let contents = fs::read_to_string(path)?;
        Ok(serde_json::from_str(&contents)?)
    } else {
        Ok(PadLedger::new(peer))
    }
}

/// Persists the ledger for `peer`. Called on every mutation so the blob on
/// disk always reflects the last completed operation.
///
/// # Errors
///
/// Returns [`Error::Storage`] if the blob cannot be serialized or written.
pub fn save_ledger(vault: &Path, peer: &str, ledger: &PadLedger) -> Result<()> {
    let path = ledger_path(vault, peer);
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    let contents = serde_json::to_string_pretty(ledger)?;
    fs::write(path, contents)?;
    Ok(())
}

/// Lists the peers that have a stored ledger under `vault`.
///
/// # Errors
///
/// Returns [`Error::Storage`] if the ledgers directory cannot be read.
pub fn list_peers(vault: &Path) -> Result<Vec<String>> {
    let dir = vault.join("ledgers");
    if !dir.exists() {
        return Ok(Vec::new());
    }
    let mut peers = Vec::new();
    for entry in fs::read_dir(dir)? {
        let name = entry?.file_name().to_string_lossy().into_owned();
        if let Some(peer) = name.strip_suffix(".json") {
            peers.push(peer.to_string());
        }
    }
    peers.sort();
    Ok(peers)
}
