// File:    pad_generator.rs
// Author:  apezoo
// Date:    2025-09-14
//
// Description: Generates keystream material from the OS secure random source and handles pad share transfer files.
//
// License:
// This project is licensed under the terms of the GNU AGPLv3 license.
// See the LICENSE.md file in the project root for full license information.

//! Keystream generation and the pad share transfer format.
//!
//! All keystream material comes from the operating system's secure random
//! source through the fallible `TryRngCore` API. If that source fails, the
//! error is surfaced to the caller; there is no fallback to a weaker
//! generator.

use crate::error::{Error, Result};
use crate::transform::ALPHABET_SIZE;
use rand::{rngs::OsRng, TryRngCore};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fs;
use std::path::Path;

/// Generates `n` keystream units spanning the full 16-bit range.
///
/// # Errors
///
/// Returns [`Error::SecureRandomUnavailable`] if the OS random source fails.
pub fn generate_units(n: usize) -> Result<Vec<u16>> {
    let mut rng = OsRng;
    let mut buffer = vec![0u8; n * 2];
    rng.try_fill_bytes(&mut buffer)
        .map_err(|e| Error::SecureRandomUnavailable(e.to_string()))?;
    Ok(buffer
        .chunks_exact(2)
        .map(|pair| u16::from_le_bytes([pair[0], pair[1]]))
        .collect())
}

/// Generates `n` keystream units uniform over `0..=26` for the alphabet
/// variant.
///
/// Bytes from the secure source are rejection-sampled below 243 (the
/// largest multiple of 27 that fits in a byte) so the reduction keeps every
/// symbol equally likely.
///
/// # Errors
///
/// Returns [`Error::SecureRandomUnavailable`] if the OS random source fails.
pub fn generate_alphabet_units(n: usize) -> Result<Vec<u16>> {
    const LIMIT: u8 = u8::MAX - u8::MAX % 27;
    let mut rng = OsRng;
    let mut units = Vec::with_capacity(n);
    let mut buffer = [0u8; 128];
    while units.len() < n {
        rng.try_fill_bytes(&mut buffer)
            .map_err(|e| Error::SecureRandomUnavailable(e.to_string()))?;
        for &byte in &buffer {
            if byte < LIMIT {
                units.push(u16::from(byte) % ALPHABET_SIZE);
                if units.len() == n {
                    break;
                }
            }
        }
    }
    Ok(units)
}

/// A pad share: newly generated keystream exported as a file and handed to
/// the other peer out of band. One-shot and user-mediated; the digest lets
/// the importer reject a corrupted transfer.
#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct PadShare {
    /// Peer identifier of the sharer.
    pub id: String,
    /// The shared keystream units.
    pub keystream: Vec<u16>,
    /// SHA-256 hex digest over the keystream bytes.
    pub digest: String,
}

impl PadShare {
    /// Builds a share for `id` with its digest filled in.
    #[must_use]
    pub fn new(id: String, keystream: Vec<u16>) -> Self {
        let digest = digest_units(&keystream);
        Self {
            id,
            keystream,
            digest,
        }
    }
}

/// SHA-256 hex digest over keystream units in little-endian byte order.
#[must_use]
pub fn digest_units(units: &[u16]) -> String {
    let mut hasher = Sha256::new();
    for unit in units {
        hasher.update(unit.to_le_bytes());
    }
    format!("{:x}", hasher.finalize())
}

/// Writes a pad share file at `path`.
///
/// # Errors
///
/// Returns [`Error::Storage`] if the file cannot be serialized or written.
pub fn write_share(path: &Path, share: &PadShare) -> Result<()> {
    let contents = serde_json::to_string_pretty(share)?;
    fs::write(path, contents)?;
    Ok(())
}

/// Reads and verifies a pad share file.
///
/// # Errors
///
/// Returns [`Error::MalformedShare`] if the file cannot be read or parsed,
/// or if the embedded digest does not match the keystream.
pub fn read_share(path: &Path) -> Result<PadShare> {
    let contents = fs::read_to_string(path).map_err(|e| Error::MalformedShare(e.to_string()))?;
    let share: PadShare =
        serde_json::from_str(&contents).map_err(|e| Error::MalformedShare(e.to_string()))?;
    let expected = digest_units(&share.keystream);
    if share.digest != expected {
        return Err(Error::MalformedShare(format!(
            "digest mismatch for share from '{}'",
            share.id
        )));
    }
    Ok(share)
}
