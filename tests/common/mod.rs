//! Shared fixtures for integration tests

#![allow(dead_code)]

use identity_gateway::config::GatewayConfig;
use identity_gateway::credential::resolve;
use identity_gateway::mtls::MutualTlsClient;
use identity_gateway::pii::DecryptionKey;
use rcgen::{CertificateParams, DistinguishedName, DnType, KeyPair};
use wiremock::MockServer;

/// AAD used by every fixture
pub const AAD: &str = "TOSS";

/// Base path the mock upstream serves the OAuth2 API under
pub const API_PATH: &str = "/api-partner/v1/apps-in-toss/user/oauth2";

/// PEM certificate and key for a throwaway client identity
pub fn client_identity() -> (String, String) {
    let key = KeyPair::generate().expect("key generation failed");
    let mut params = CertificateParams::new(vec!["partner-client.local".to_string()])
        .expect("cert params");
    let mut dn = DistinguishedName::new();
    dn.push(DnType::CommonName, "partner-client");
    params.distinguished_name = dn;
    let cert = params.self_signed(&key).expect("self-signed cert");
    (cert.pem(), key.serialize_pem())
}

/// A client presenting a fresh identity
pub fn mtls_client() -> MutualTlsClient {
    let (cert, key) = client_identity();
    MutualTlsClient::new(&resolve(&cert).unwrap(), &resolve(&key).unwrap()).unwrap()
}

/// Fixed PII key
pub fn pii_key() -> DecryptionKey {
    DecryptionKey::from_bytes(&[0x5a; 32]).unwrap()
}

/// Base64 form of [`pii_key`]
pub fn pii_key_base64() -> String {
    use base64::Engine as _;
    base64::engine::general_purpose::STANDARD.encode([0x5a; 32])
}

/// API base on the mock upstream
pub fn api_base(server: &MockServer) -> String {
    format!("{}{API_PATH}", server.uri())
}

/// Config pointing at the mock upstream with inline PEM credentials
pub fn config_for(server: &MockServer) -> GatewayConfig {
    let (cert, key) = client_identity();
    GatewayConfig {
        client_cert: Some(cert),
        client_key: Some(key),
        decryption_key: Some(pii_key_base64()),
        aad: AAD.to_string(),
        api_base: api_base(server),
        ..Default::default()
    }
}
