// File:    error.rs
// Author:  apezoo
// Date:    2025-09-14
//
// Description: Error taxonomy for pad management, the stream codec, and relay synchronization.
//
// License:
// This project is licensed under the terms of the GNU AGPLv3 license.
// See the LICENSE.md file in the project root for full license information.

//! Error types shared across the crate.

use thiserror::Error;

/// Errors produced by pad, codec, and sync operations.
#[derive(Error, Debug)]
pub enum Error {
    /// An encode request needs more keystream than the ledger holds.
    /// Recoverable; the ledger is left untouched.
    #[error("not enough pad available: need {needed}, have {available}")]
    InsufficientPad {
        /// Units the operation asked for.
        needed: usize,
        /// Units the ledger currently holds.
        available: usize,
    },

    /// The operating system's secure random source failed. No keystream
    /// can be produced safely; there is no fallback source.
    #[error("secure random source unavailable: {0}")]
    SecureRandomUnavailable(String),

    /// An envelope fetched from the relay failed to parse.
    #[error("malformed envelope: {0}")]
    MalformedEnvelope(String),

    /// An envelope with this id has already been processed.
    #[error("envelope {0} already processed")]
    DuplicateEnvelope(String),

    /// Writing an envelope to the relay failed. The envelope stays in the
    /// conversation's outbox; the pad consumed for it is not re-spent on retry.
    #[error("failed to publish envelope: {0}")]
    PublishFailure(String),

    /// A pad share file failed to parse or its digest did not match.
    #[error("malformed pad share: {0}")]
    MalformedShare(String),

    /// Local persistence failed (vault I/O or serialization).
    #[error("storage error: {0}")]
    Storage(String),
}

/// Result type alias using this crate's [`Error`].
pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    /// Whether the error leaves the caller unable to continue safely.
    /// Only a failed secure random source is unconditionally fatal.
    #[must_use]
    pub const fn is_fatal(&self) -> bool {
        matches!(self, Self::SecureRandomUnavailable(_))
    }
}

impl From<std::io::Error> for Error {
    fn from(e: std::io::Error) -> Self {
        Self::Storage(e.to_string())
    }
}

impl From<serde_json::Error> for Error {
    fn from(e: serde_json::Error) -> Self {
        Self::Storage(e.to_string())
    }
}
