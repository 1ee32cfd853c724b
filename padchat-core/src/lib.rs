// File:    lib.rs
// Author:  apezoo
// Date:    2025-09-14
//
// Description: The main library crate for padchat-core: pad ledgers, the pad-consuming stream codec, and relay sync.
//
// License:
// This project is licensed under the terms of the GNU AGPLv3 license.
// See the LICENSE.md file in the project root for full license information.

//! # Padchat Core Library
//!
//! One-time-pad chat between two peers. Each conversation owns a finite,
//! shared, non-reusable keystream; the codec consumes it to encrypt and
//! decrypt messages, and the sync coordinator keeps both peers' view of
//! the remaining pad consistent across an at-least-once message relay.

/// Pad-consuming stream cipher in both the UTF-16 XOR and 27-symbol
/// alphabet variants.
pub mod codec;
/// Per-conversation orchestration of sends, receives, and pad top-ups.
pub mod coordinator;
/// Wire envelope and decrypted message records.
pub mod envelope;
/// Error taxonomy shared across the crate.
pub mod error;
/// Per-conversation pad ledger and its vault persistence.
pub mod ledger;
/// Keystream generation and pad share transfer files.
pub mod pad_generator;
/// Transport relay interface and the directory-backed implementation.
pub mod relay;
/// Plaintext/unit transforms for both cipher variants.
pub mod transform;
