//! Certificate management: parsing resolved credentials into rustls types
//! and assembling the client identity handed to the HTTPS client.
//!
//! Provides:
//! - [`load_certs`] / [`load_private_key`]: PEM or DER material → rustls types
//! - [`identity_pem`]: a normalised PEM bundle (chain + key)
//! - [`build_identity`] / [`load_ca_certs`]: reqwest-facing wrappers
//!
//! # Material format
//!
//! Resolved credentials are either PEM text or raw DER (typically a base64
//! blob of a `.der` file). PEM is detected by its armour, everything else is
//! treated as a single DER item.

use base64::Engine as _;
use base64::engine::general_purpose::STANDARD;
use rustls::pki_types::pem::PemObject;
use rustls::pki_types::{CertificateDer, PrivateKeyDer};
use tracing::debug;

use crate::credential::Credential;
use crate::{Error, Result};

/// Line width for re-encoded PEM bodies.
const PEM_LINE_WIDTH: usize = 64;

// ─────────────────────────────────────────────────────────────────────────────
// Public: credential parsing
// ─────────────────────────────────────────────────────────────────────────────

/// Parse the certificate chain held by a credential.
///
/// # Errors
///
/// Returns [`Error::CredentialUnavailable`] if the PEM is malformed or holds
/// no certificate, or the DER blob is empty.
pub fn load_certs(credential: &Credential) -> Result<Vec<CertificateDer<'static>>> {
    let certs = if credential.is_pem() {
        CertificateDer::pem_slice_iter(credential.material())
            .collect::<std::result::Result<Vec<_>, _>>()
            .map_err(|e| Error::CredentialUnavailable(format!("failed to parse certificate PEM: {e}")))?
    } else if credential.material().is_empty() {
        Vec::new()
    } else {
        vec![CertificateDer::from(credential.material().to_vec())]
    };

    if certs.is_empty() {
        return Err(Error::CredentialUnavailable(format!(
            "no certificate found in {} credential",
            credential.source()
        )));
    }

    Ok(certs)
}

/// Parse the private key held by a credential.
///
/// Supports PKCS#1 (`RSA PRIVATE KEY`), PKCS#8 (`PRIVATE KEY`), and SEC1
/// (`EC PRIVATE KEY`), in PEM or DER form.
///
/// # Errors
///
/// Returns [`Error::CredentialUnavailable`] if no key can be found.
pub fn load_private_key(credential: &Credential) -> Result<PrivateKeyDer<'static>> {
    if credential.is_pem() {
        PrivateKeyDer::from_pem_slice(credential.material()).map_err(|e| {
            Error::CredentialUnavailable(format!(
                "no private key found in {} credential: {e}",
                credential.source()
            ))
        })
    } else {
        PrivateKeyDer::try_from(credential.material())
            .map(|key| key.clone_key())
            .map_err(|e| {
                Error::CredentialUnavailable(format!(
                    "unrecognised DER private key in {} credential: {e}",
                    credential.source()
                ))
            })
    }
}

/// Build a PEM bundle holding the certificate chain followed by the key.
///
/// # Errors
///
/// Fails if either credential does not parse.
pub fn identity_pem(cert: &Credential, key: &Credential) -> Result<Vec<u8>> {
    let certs = load_certs(cert)?;
    let key = load_private_key(key)?;

    let key_label = match &key {
        PrivateKeyDer::Pkcs1(_) => "RSA PRIVATE KEY",
        PrivateKeyDer::Sec1(_) => "EC PRIVATE KEY",
        PrivateKeyDer::Pkcs8(_) => "PRIVATE KEY",
        _ => {
            return Err(Error::CredentialUnavailable(
                "unsupported private key encoding".to_string(),
            ));
        }
    };

    let mut bundle = String::new();
    for c in &certs {
        bundle.push_str(&pem_encode("CERTIFICATE", c.as_ref()));
    }
    bundle.push_str(&pem_encode(key_label, key.secret_der()));

    debug!(
        chain_len = certs.len(),
        key_kind = key_label,
        "Client identity assembled"
    );

    Ok(bundle.into_bytes())
}

// ─────────────────────────────────────────────────────────────────────────────
// Public: reqwest wrappers
// ─────────────────────────────────────────────────────────────────────────────

/// Build the client identity presented during the TLS handshake.
///
/// # Errors
///
/// Fails if the material does not parse or reqwest rejects the bundle.
pub fn build_identity(cert: &Credential, key: &Credential) -> Result<reqwest::Identity> {
    let pem = identity_pem(cert, key)?;
    reqwest::Identity::from_pem(&pem)
        .map_err(|e| Error::CredentialUnavailable(format!("invalid client identity: {e}")))
}

/// Parse extra trust anchors added on top of the built-in roots.
///
/// # Errors
///
/// Fails if the bundle holds no certificate.
pub fn load_ca_certs(ca: &Credential) -> Result<Vec<reqwest::Certificate>> {
    load_certs(ca)?
        .iter()
        .map(|der| {
            reqwest::Certificate::from_der(der.as_ref())
                .map_err(|e| Error::Config(format!("invalid CA certificate: {e}")))
        })
        .collect()
}

// ─────────────────────────────────────────────────────────────────────────────
// Private helpers
// ─────────────────────────────────────────────────────────────────────────────

fn pem_encode(label: &str, der: &[u8]) -> String {
    let body = STANDARD.encode(der);
    let mut out = format!("-----BEGIN {label}-----\n");
    for line in body.as_bytes().chunks(PEM_LINE_WIDTH) {
        // base64 output is ASCII
        out.push_str(&String::from_utf8_lossy(line));
        out.push('\n');
    }
    out.push_str(&format!("-----END {label}-----\n"));
    out
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::credential::{CredentialSource, resolve};
    use rcgen::{CertificateParams, KeyPair};

    // ─── helpers ─────────────────────────────────────────────────────────────

    fn self_signed() -> (String, String, Vec<u8>, Vec<u8>) {
        let key = KeyPair::generate().unwrap();
        let cert = CertificateParams::new(vec!["client.local".to_string()])
            .unwrap()
            .self_signed(&key)
            .unwrap();
        (
            cert.pem(),
            key.serialize_pem(),
            cert.der().to_vec(),
            key.serialize_der(),
        )
    }

    // ─── load_certs ──────────────────────────────────────────────────────────

    #[test]
    fn load_certs_from_pem_credential() {
        let (cert_pem, ..) = self_signed();
        let cred = resolve(&cert_pem).unwrap();
        assert_eq!(load_certs(&cred).unwrap().len(), 1);
    }

    #[test]
    fn load_certs_from_base64_der_credential() {
        let (_, _, cert_der, _) = self_signed();
        let cred = resolve(&STANDARD.encode(&cert_der)).unwrap();
        assert_eq!(cred.source(), CredentialSource::Base64);

        let certs = load_certs(&cred).unwrap();
        assert_eq!(certs[0].as_ref(), cert_der.as_slice());
    }

    #[test]
    fn load_certs_rejects_pem_without_certificate() {
        let (_, key_pem, ..) = self_signed();
        let cred = resolve(&key_pem).unwrap();
        assert!(matches!(
            load_certs(&cred).unwrap_err(),
            Error::CredentialUnavailable(_)
        ));
    }

    // ─── load_private_key ────────────────────────────────────────────────────

    #[test]
    fn load_private_key_from_pem_credential() {
        let (_, key_pem, ..) = self_signed();
        let key = load_private_key(&resolve(&key_pem).unwrap()).unwrap();
        assert!(matches!(key, PrivateKeyDer::Pkcs8(_)));
    }

    #[test]
    fn load_private_key_from_der_credential() {
        let (_, _, _, key_der) = self_signed();
        let cred = resolve(&STANDARD.encode(&key_der)).unwrap();
        let key = load_private_key(&cred).unwrap();
        assert_eq!(key.secret_der(), key_der.as_slice());
    }

    #[test]
    fn load_private_key_rejects_certificate_pem() {
        let (cert_pem, ..) = self_signed();
        assert!(load_private_key(&resolve(&cert_pem).unwrap()).is_err());
    }

    // ─── identity ────────────────────────────────────────────────────────────

    #[test]
    fn identity_pem_holds_chain_then_key() {
        let (cert_pem, key_pem, ..) = self_signed();
        let bundle = identity_pem(&resolve(&cert_pem).unwrap(), &resolve(&key_pem).unwrap())
            .unwrap();
        let text = String::from_utf8(bundle).unwrap();

        let cert_at = text.find("BEGIN CERTIFICATE").unwrap();
        let key_at = text.find("BEGIN PRIVATE KEY").unwrap();
        assert!(cert_at < key_at);
    }

    #[test]
    fn identity_pem_round_trips_der_material() {
        let (_, _, cert_der, key_der) = self_signed();
        let bundle = identity_pem(
            &resolve(&STANDARD.encode(&cert_der)).unwrap(),
            &resolve(&STANDARD.encode(&key_der)).unwrap(),
        )
        .unwrap();

        let reparsed: Vec<_> = CertificateDer::pem_slice_iter(&bundle)
            .collect::<std::result::Result<_, _>>()
            .unwrap();
        assert_eq!(reparsed[0].as_ref(), cert_der.as_slice());
    }

    #[test]
    fn build_identity_accepts_generated_pair() {
        let (cert_pem, key_pem, ..) = self_signed();
        assert!(build_identity(&resolve(&cert_pem).unwrap(), &resolve(&key_pem).unwrap()).is_ok());
    }

    #[test]
    fn pem_encode_wraps_lines() {
        let pem = pem_encode("CERTIFICATE", &[0u8; 100]);
        assert!(pem.lines().all(|l| l.len() <= PEM_LINE_WIDTH || l.starts_with("-----")));
        assert!(pem.ends_with("-----END CERTIFICATE-----\n"));
    }
}
