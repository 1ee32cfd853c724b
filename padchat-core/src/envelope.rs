// File:    envelope.rs
// Author:  apezoo
// Date:    2025-09-14
//
// Description: Wire envelope and decrypted message records exchanged through the transport relay.
//
// License:
// This project is licensed under the terms of the GNU AGPLv3 license.
// See the LICENSE.md file in the project root for full license information.

//! Message records: the transient ciphertext envelope on the wire and the
//! decrypted message retained in the ledger's log.

use crate::error::{Error, Result};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// One ciphertext message in flight on the relay. Created by the sender's
/// codec, consumed exactly once by the receiver, then deleted from the
/// relay as the acknowledgment.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct Envelope {
    /// Unique envelope id; doubles as the deduplication key.
    pub id: String,
    /// Unix timestamp in milliseconds at encode time.
    pub timestamp: i64,
    /// Peer identifier of the sender.
    pub sender: String,
    /// Ciphertext units, one per plaintext unit.
    pub ciphertext: Vec<u16>,
}

impl Envelope {
    /// Builds a new envelope around already-encrypted units.
    #[must_use]
    pub fn new(sender: &str, ciphertext: Vec<u16>) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            timestamp: Utc::now().timestamp_millis(),
            sender: sender.to_string(),
            ciphertext,
        }
    }

    /// Parses an envelope from its JSON wire form.
    ///
    /// # Errors
    ///
    /// Returns [`Error::MalformedEnvelope`] if the document does not parse
    /// as an envelope.
    pub fn from_json(contents: &str) -> Result<Self> {
        serde_json::from_str(contents).map_err(|e| Error::MalformedEnvelope(e.to_string()))
    }
}

/// A decrypted message in a conversation's append-only log. Persisted
/// locally only; never sent back through the relay. Its `id` is the id of
/// the envelope it was decrypted from, which lets the log double as the
/// already-processed set.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct DecryptedMessage {
    /// Id of the originating envelope.
    pub id: String,
    /// Unix timestamp in milliseconds, carried over from the envelope.
    pub timestamp: i64,
    /// The decrypted plaintext.
    pub text: String,
    /// Peer identifier of the sender.
    pub sender: String,
}
