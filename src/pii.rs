//! PII field decryption (AES-256-GCM).
//!
//! The identity provider returns user attributes encrypted one field at a
//! time. Each field is standard base64 over
//!
//! ```text
//! IV (12 bytes) ‖ ciphertext (N bytes) ‖ tag (16 bytes)
//! ```
//!
//! and is authenticated with a shared AAD string. A field that fails to
//! decode or authenticate fails the whole record.

use std::fmt;

use aes_gcm::aead::{Aead, AeadCore, KeyInit, OsRng, Payload};
use aes_gcm::{Aes256Gcm, Nonce};
use base64::Engine as _;
use base64::engine::general_purpose::STANDARD;
use serde_json::{Map, Value};

use crate::{Error, Result};

/// AES-GCM nonce length in bytes.
pub const IV_LEN: usize = 12;

/// AES-GCM tag length in bytes.
pub const TAG_LEN: usize = 16;

/// Fields of a user-info object that carry encrypted values.
pub const PII_FIELDS: [&str; 7] = [
    "ci",
    "name",
    "phone",
    "gender",
    "nationality",
    "birthday",
    "email",
];

/// AES-256 key for PII fields.
#[derive(Clone)]
pub struct DecryptionKey {
    cipher: Aes256Gcm,
}

impl DecryptionKey {
    /// Build a key from 32 raw bytes.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] if `bytes` is not exactly 32 bytes long.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        let cipher = Aes256Gcm::new_from_slice(bytes).map_err(|_| {
            Error::Config(format!(
                "decryption key must be 32 bytes, got {}",
                bytes.len()
            ))
        })?;
        Ok(Self { cipher })
    }

    /// Build a key from its base64 form.
    pub fn from_base64(encoded: &str) -> Result<Self> {
        let bytes = STANDARD
            .decode(encoded.trim())
            .map_err(|e| Error::Config(format!("decryption key is not valid base64: {e}")))?;
        Self::from_bytes(&bytes)
    }
}

impl fmt::Debug for DecryptionKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("DecryptionKey(..)")
    }
}

/// Decrypt one encrypted field.
///
/// # Errors
///
/// Returns [`Error::Decryption`] if the input is not base64, is shorter than
/// IV plus tag, fails authentication, or is not UTF-8 plaintext.
pub fn decrypt_field(encoded: &str, key: &DecryptionKey, aad: &str) -> Result<String> {
    let data = STANDARD
        .decode(encoded)
        .map_err(|e| Error::Decryption(format!("field is not valid base64: {e}")))?;

    if data.len() < IV_LEN + TAG_LEN {
        return Err(Error::Decryption(format!(
            "field too short: {} bytes, need at least {}",
            data.len(),
            IV_LEN + TAG_LEN
        )));
    }

    let (iv, ciphertext_and_tag) = data.split_at(IV_LEN);
    let iv: [u8; IV_LEN] = iv
        .try_into()
        .map_err(|_| Error::Decryption("malformed IV".to_string()))?;

    let plaintext = key
        .cipher
        .decrypt(
            &Nonce::from(iv),
            Payload {
                msg: ciphertext_and_tag,
                aad: aad.as_bytes(),
            },
        )
        .map_err(|_| Error::Decryption("authentication tag mismatch".to_string()))?;

    String::from_utf8(plaintext)
        .map_err(|e| Error::Decryption(format!("plaintext is not UTF-8: {e}")))
}

/// Encrypt a value into the same wire framing with a fresh random IV.
pub fn encrypt_field(plaintext: &str, key: &DecryptionKey, aad: &str) -> Result<String> {
    let nonce = Aes256Gcm::generate_nonce(&mut OsRng);
    let ciphertext_and_tag = key
        .cipher
        .encrypt(
            &nonce,
            Payload {
                msg: plaintext.as_bytes(),
                aad: aad.as_bytes(),
            },
        )
        .map_err(|_| Error::Decryption("encryption failed".to_string()))?;

    let mut framed = Vec::with_capacity(IV_LEN + ciphertext_and_tag.len());
    framed.extend_from_slice(&nonce);
    framed.extend_from_slice(&ciphertext_and_tag);
    Ok(STANDARD.encode(framed))
}

/// Decrypt the PII fields of a user-info object.
///
/// Each of [`PII_FIELDS`] becomes its plaintext when the input holds a
/// string there and `null` otherwise. Every other field is copied as is.
/// Non-object input is treated as an empty object.
///
/// # Errors
///
/// Fails on the first field that does not decrypt; no partial record is
/// returned.
pub fn decrypt_record(record: &Value, key: &DecryptionKey, aad: &str) -> Result<Value> {
    let mut out: Map<String, Value> = record.as_object().cloned().unwrap_or_default();

    for field in PII_FIELDS {
        let decrypted = match record.get(field) {
            Some(Value::String(encrypted)) => Value::String(
                decrypt_field(encrypted, key, aad)
                    .map_err(|e| Error::Decryption(format!("field '{field}': {e}")))?,
            ),
            _ => Value::Null,
        };
        out.insert(field.to_string(), decrypted);
    }

    Ok(Value::Object(out))
}
