// File:    relay.rs
// Author:  apezoo
// Date:    2025-09-14
//
// Description: Transport relay interface and the directory-backed implementation used by the CLI and tests.
//
// License:
// This project is licensed under the terms of the GNU AGPLv3 license.
// See the LICENSE.md file in the project root for full license information.

//! The transport relay carries ciphertext envelopes between peers. It is
//! at-least-once and eventually consistent: an envelope stays visible
//! until the receiver deletes it, and the same envelope may be fetched
//! again after a crash. Deduplication is the coordinator's job, never the
//! relay's.

use crate::envelope::Envelope;
use crate::error::{Error, Result};
use log::warn;
use std::fs;
use std::path::PathBuf;

/// External message relay, addressed by recipient peer id.
pub trait TransportRelay {
    /// Publishes an envelope addressed to `recipient`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::PublishFailure`] if the write does not complete;
    /// the caller keeps the envelope queued and retries later.
    fn publish(&self, recipient: &str, envelope: &Envelope) -> Result<()>;

    /// Fetches all envelopes currently addressed to `recipient`, ordered
    /// by timestamp. Envelopes that fail to parse are skipped, not
    /// returned and not deleted.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Storage`] if the relay itself cannot be reached.
    fn fetch(&self, recipient: &str) -> Result<Vec<Envelope>>;

    /// Deletes a processed envelope. This deletion is the only
    /// acknowledgment mechanism. Deleting an already-absent envelope is
    /// not an error.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Storage`] if the deletion fails for any reason
    /// other than the envelope already being gone.
    fn delete(&self, recipient: &str, envelope_id: &str) -> Result<()>;
}

/// Filesystem relay: one JSON file per envelope under
/// `<root>/<recipient>/`. Stands in for the hosted document store the
/// production deployment would use.
#[derive(Debug, Clone)]
pub struct DirRelay {
    root: PathBuf,
}

impl DirRelay {
    /// Creates a relay rooted at `root`. The directory is created lazily
    /// on first publish.
    #[must_use]
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    fn inbox(&self, recipient: &str) -> PathBuf {
        self.root.join(recipient)
    }
}

impl TransportRelay for DirRelay {
    fn publish(&self, recipient: &str, envelope: &Envelope) -> Result<()> {
        let inbox = self.inbox(recipient);
        fs::create_dir_all(&inbox).map_err(|e| Error::PublishFailure(e.to_string()))?;
        let contents = serde_json::to_string_pretty(envelope)
            .map_err(|e| Error::PublishFailure(e.to_string()))?;
        fs::write(inbox.join(format!("{}.json", envelope.id)), contents)
            .map_err(|e| Error::PublishFailure(e.to_string()))?;
        Ok(())
    }

    fn fetch(&self, recipient: &str) -> Result<Vec<Envelope>> {
        let inbox = self.inbox(recipient);
        if !inbox.exists() {
            return Ok(Vec::new());
        }
        let mut envelopes = Vec::new();
        for entry in fs::read_dir(inbox)? {
            let path = entry?.path();
            if path.extension().is_none_or(|ext| ext != "json") {
                continue;
            }
            let contents = fs::read_to_string(&path)?;
            match Envelope::from_json(&contents) {
                Ok(envelope) => envelopes.push(envelope),
                Err(e) => {
                    // Left in place for operator inspection; never acknowledged.
                    warn!("skipping envelope at {}: {e}", path.display());
                }
            }
        }
        envelopes.sort_by(|a, b| a.timestamp.cmp(&b.timestamp).then(a.id.cmp(&b.id)));
        Ok(envelopes)
    }

    fn delete(&self, recipient: &str, envelope_id: &str) -> Result<()> {
        let path = self.inbox(recipient).join(format!("{envelope_id}.json"));
        match fs::remove_file(path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(Error::Storage(e.to_string())),
        }
    }
}
