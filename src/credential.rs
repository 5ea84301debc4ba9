//! Credential resolution for mTLS certificate and key material.
//!
//! Deployments hand the gateway its client certificate and private key in
//! one of three shapes, and the same setting may hold any of them:
//!
//! 1. literal PEM text (contains `-----BEGIN`)
//! 2. a single-line base64 blob longer than 50 characters
//! 3. a filesystem path, absolute or relative to the working directory
//!
//! [`classify`] decides which shape an input has; the first match in the
//! order above wins. [`resolve`] then produces the raw bytes.

use std::fmt;
use std::fs;
use std::path::PathBuf;

use base64::Engine as _;
use base64::alphabet;
use base64::engine::{DecodePaddingMode, GeneralPurpose, GeneralPurposeConfig};

use crate::{Error, Result};

/// Marker that identifies inline PEM text.
const PEM_MARKER: &str = "-----BEGIN";

/// Inputs at or below this length are never treated as base64.
const MIN_BASE64_LEN: usize = 50;

/// Standard alphabet, padding optional, for credential blobs.
const CREDENTIAL_B64: GeneralPurpose = GeneralPurpose::new(
    &alphabet::STANDARD,
    GeneralPurposeConfig::new().with_decode_padding_mode(DecodePaddingMode::Indifferent),
);

/// How a credential input was interpreted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CredentialSource {
    /// Inline PEM text, used verbatim
    Pem,
    /// Base64 blob, decoded
    Base64,
    /// Path to a file on disk
    FilePath,
}

impl fmt::Display for CredentialSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Pem => write!(f, "pem"),
            Self::Base64 => write!(f, "base64"),
            Self::FilePath => write!(f, "file"),
        }
    }
}

/// Resolved certificate or key material.
///
/// The bytes are fixed at construction and only exposed by reference.
#[derive(Clone, PartialEq, Eq)]
pub struct Credential {
    material: Vec<u8>,
    source: CredentialSource,
}

impl Credential {
    /// Raw material bytes (PEM text or DER, depending on the input)
    pub fn material(&self) -> &[u8] {
        &self.material
    }

    /// How the input was interpreted
    pub fn source(&self) -> CredentialSource {
        self.source
    }

    /// Whether the material is PEM-armoured text
    pub fn is_pem(&self) -> bool {
        self.material
            .windows(PEM_MARKER.len())
            .any(|w| w == PEM_MARKER.as_bytes())
    }
}

// Material is secret for private keys; never print it.
impl fmt::Debug for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credential")
            .field("source", &self.source)
            .field("len", &self.material.len())
            .finish_non_exhaustive()
    }
}

/// Classify a credential input without touching the filesystem.
pub fn classify(input: &str) -> CredentialSource {
    if input.contains(PEM_MARKER) {
        CredentialSource::Pem
    } else if looks_like_base64(input) {
        CredentialSource::Base64
    } else {
        CredentialSource::FilePath
    }
}

/// Resolve a credential input into raw material.
///
/// # Errors
///
/// Returns [`Error::CredentialUnavailable`] if the input is empty, the
/// base64 blob does not decode, or the file cannot be read.
pub fn resolve(input: &str) -> Result<Credential> {
    if input.trim().is_empty() {
        return Err(Error::CredentialUnavailable(
            "credential input is empty".to_string(),
        ));
    }

    let source = classify(input);
    let material = match source {
        CredentialSource::Pem => input.as_bytes().to_vec(),
        CredentialSource::Base64 => CREDENTIAL_B64
            .decode(strip_line_breaks(input))
            .map_err(|e| Error::CredentialUnavailable(format!("invalid base64 credential: {e}")))?,
        CredentialSource::FilePath => read_credential_file(input)?,
    };

    Ok(Credential { material, source })
}

fn looks_like_base64(input: &str) -> bool {
    let stripped = strip_line_breaks(input);
    input.len() > MIN_BASE64_LEN
        && !stripped.is_empty()
        && stripped
            .bytes()
            .all(|b| b.is_ascii_alphanumeric() || matches!(b, b'+' | b'/' | b'='))
}

fn strip_line_breaks(input: &str) -> String {
    input.chars().filter(|c| !matches!(c, '\r' | '\n')).collect()
}

fn read_credential_file(input: &str) -> Result<Vec<u8>> {
    let path = PathBuf::from(input);
    let path = if path.is_absolute() {
        path
    } else {
        std::env::current_dir()
            .map_err(|e| Error::CredentialUnavailable(format!("cannot determine working directory: {e}")))?
            .join(path)
    };

    fs::read(&path).map_err(|e| {
        Error::CredentialUnavailable(format!("cannot read '{}': {e}", path.display()))
    })
}
