// File:    codec.rs
// Author:  apezoo
// Date:    2025-09-14
//
// Description: Pad-consuming stream cipher: XOR over UTF-16 units as the primary, additive mod 27 for the alphabet variant.
//
// License:
// This project is licensed under the terms of the GNU AGPLv3 license.
// See the LICENSE.md file in the project root for full license information.

//! The codec consumes keystream from a [`PadLedger`] to encrypt and
//! decrypt messages. Consumed units are retired at encode time, before any
//! publish attempt: a failed send burns a little keystream, but no unit is
//! ever spent twice, even under retry.
//!
//! Decryption never reuses or zero-fills key material. When incoming
//! ciphertext is longer than the remaining keystream, only the overlapping
//! prefix is decrypted; the tail is passed through untransformed and
//! renders garbled until pad accounting is restored by a top-up.

use crate::envelope::{DecryptedMessage, Envelope};
use crate::error::Result;
use crate::ledger::PadLedger;
use crate::transform;
use log::warn;

/// XORs two equal-length unit slices.
///
/// # Panics
///
/// Panics if the slices are not of equal length.
#[must_use]
pub fn xor_units(a: &[u16], b: &[u16]) -> Vec<u16> {
    assert_eq!(
        a.len(),
        b.len(),
        "Input slices must have the same length for XOR operation."
    );
    a.iter().zip(b.iter()).map(|(x, y)| x ^ y).collect()
}

/// Encrypts plaintext units, consuming one keystream unit per plaintext
/// unit. XOR is self-inverse, so [`decrypt_units`] applies the same
/// operation.
///
/// # Errors
///
/// Returns [`Error::InsufficientPad`](crate::error::Error::InsufficientPad)
/// if the ledger holds fewer units than the plaintext needs; the ledger is
/// left unchanged in that case.
pub fn encrypt_units(plain: &[u16], ledger: &mut PadLedger) -> Result<Vec<u16>> {
    let key = ledger.consume_prefix(plain.len())?;
    Ok(xor_units(plain, &key))
}

/// Decrypts ciphertext units with whatever keystream is available.
///
/// Decrypts `min(len, available)` units and passes any remainder through
/// unchanged rather than reusing or zero-filling key material.
///
/// # Errors
///
/// Propagates ledger errors; with the consumed length capped at
/// [`available`](PadLedger::available), the short-pad case itself is not
/// an error here.
pub fn decrypt_units(cipher: &[u16], ledger: &mut PadLedger) -> Result<Vec<u16>> {
    let covered = cipher.len().min(ledger.available());
    if covered < cipher.len() {
        warn!(
            "ciphertext exceeds remaining pad ({} > {}); tail will not decrypt",
            cipher.len(),
            covered
        );
    }
    let key = ledger.consume_prefix(covered)?;
    let mut plain = xor_units(&cipher[..covered], &key);
    plain.extend_from_slice(&cipher[covered..]);
    Ok(plain)
}

/// Encrypts a text message for `sender`, appends the sender's own copy to
/// the ledger log, and wraps the ciphertext in a wire envelope.
///
/// # Errors
///
/// Returns [`Error::InsufficientPad`](crate::error::Error::InsufficientPad)
/// without mutating the ledger if the message needs more keystream than
/// remains.
pub fn seal_envelope(text: &str, sender: &str, ledger: &mut PadLedger) -> Result<Envelope> {
    let units = transform::to_units(text);
    let ciphertext = encrypt_units(&units, ledger)?;
    let envelope = Envelope::new(sender, ciphertext);
    ledger.append_decrypted(DecryptedMessage {
        id: envelope.id.clone(),
        timestamp: envelope.timestamp,
        text: text.to_string(),
        sender: sender.to_string(),
    });
    Ok(envelope)
}

/// Decrypts an envelope, appends the result to the ledger log, and returns
/// the decrypted message.
///
/// # Errors
///
/// Propagates ledger errors from [`decrypt_units`].
pub fn open_envelope(envelope: &Envelope, ledger: &mut PadLedger) -> Result<DecryptedMessage> {
    let plain_units = decrypt_units(&envelope.ciphertext, ledger)?;
    let message = DecryptedMessage {
        id: envelope.id.clone(),
        timestamp: envelope.timestamp,
        text: transform::from_units(&plain_units),
        sender: envelope.sender.clone(),
    };
    ledger.append_decrypted(message.clone());
    Ok(message)
}

/// Encrypts text in the alphabet variant: each unit is shifted by one
/// keystream unit mod 27. Characters outside the 27-symbol alphabet are
/// irreversibly mapped to space before encryption.
///
/// # Errors
///
/// Returns [`Error::InsufficientPad`](crate::error::Error::InsufficientPad)
/// without mutating the ledger if the message needs more keystream than
/// remains.
pub fn encrypt_alphabet(plain: &str, ledger: &mut PadLedger) -> Result<String> {
    let units = transform::to_alphabet_units(plain);
    let key = ledger.consume_prefix(units.len())?;
    let cipher: Vec<u16> = units
        .iter()
        .zip(&key)
        .map(|(p, k)| (p + k) % transform::ALPHABET_SIZE)
        .collect();
    Ok(transform::from_alphabet_units(&cipher))
}

/// Decrypts alphabet-variant ciphertext: subtraction mod 27 over the
/// overlapping keystream prefix, with any unkeyed tail passed through
/// as-is.
///
/// # Errors
///
/// Propagates ledger errors from consuming the keystream prefix.
pub fn decrypt_alphabet(cipher: &str, ledger: &mut PadLedger) -> Result<String> {
    let units = transform::to_alphabet_units(cipher);
    let covered = units.len().min(ledger.available());
    if covered < units.len() {
        warn!(
            "ciphertext exceeds remaining pad ({} > {}); tail will not decrypt",
            units.len(),
            covered
        );
    }
    let key = ledger.consume_prefix(covered)?;
    let mut plain: String = units[..covered]
        .iter()
        .zip(&key)
        .map(|(c, k)| transform::alphabet_char((c + transform::ALPHABET_SIZE - k) % transform::ALPHABET_SIZE))
        .collect();
    plain.extend(cipher.chars().skip(covered));
    Ok(plain)
}
