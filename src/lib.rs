//! Identity Gateway Library
//!
//! Server-side integration with an OAuth2-style identity provider that
//! requires mutual TLS and returns user attributes encrypted field by field.
//!
//! # Features
//!
//! - **Credential resolution**: certificates and keys given as PEM text,
//!   base64, or file paths
//! - **mTLS client**: one lazily built HTTPS client presenting the client
//!   identity, always verifying the server
//! - **Adapter**: token issue/refresh, user info, and session revocation
//! - **PII decryption**: AES-256-GCM over `IV ‖ ciphertext ‖ tag` fields

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod cli;
pub mod config;
pub mod credential;
pub mod error;
pub mod gateway;
pub mod mtls;
pub mod pii;

pub use error::{Error, Result};

use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

/// Setup tracing/logging
pub fn setup_tracing(level: &str, format: Option<&str>) -> Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    let subscriber = tracing_subscriber::registry().with(filter);

    match format {
        Some("json") => subscriber
            .with(fmt::layer().json())
            .try_init()
            .map_err(|e| Error::Config(format!("Failed to install tracing subscriber: {e}")))?,
        _ => subscriber
            .with(fmt::layer())
            .try_init()
            .map_err(|e| Error::Config(format!("Failed to install tracing subscriber: {e}")))?,
    }

    Ok(())
}
