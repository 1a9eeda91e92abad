// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Credential encryption for quill.
//!
//! - [`cipher`]: AES-256-GCM over opaque strings, nonce prepended, base64 text
//!   form. Stateless.
//! - [`KeyVault`]: resolves the single process key from an explicit secret,
//!   the encryption-disabled sentinel, or a key file generated on first run.
//!
//! Key normalization happens at the boundary ([`EncryptionKey::from_bytes`]);
//! the cipher itself only ever sees a 32-byte key.

pub mod cipher;
pub mod error;
pub mod key;
pub mod vault;

pub use cipher::{decrypt, encrypt, NONCE_SIZE};
pub use error::{VaultError, VaultResult};
pub use key::{normalize_key, EncryptionKey, KEY_SIZE};
pub use vault::{resolve_key, KeyVault, VaultOptions, KEY_FILE_NAME, MIN_KEY_LEN};
