//! Mutual TLS (mTLS) client side of the identity gateway.
//!
//! # Architecture
//!
//! ```text
//! cert/key settings
//!   → credential::resolve       (PEM text | base64 | file path → bytes)
//!   → cert_manager              (bytes → certificate chain + private key)
//!   → MutualTlsClient           (reqwest client presenting that identity)
//!   → GatewayResponse           (status, headers, unparsed body)
//! ```
//!
//! The upstream server certificate is always verified. Extra CA
//! certificates may be trusted in addition to the built-in roots.

pub mod cert_manager;
pub mod client;

pub use cert_manager::{build_identity, identity_pem, load_certs, load_private_key};
pub use client::{DEFAULT_CONTENT_TYPE, GatewayResponse, MutualTlsClient};
