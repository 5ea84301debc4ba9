//! Error types for the identity gateway

use std::io;

use axum::http::StatusCode;
use thiserror::Error;

/// Result type alias for the identity gateway
pub type Result<T> = std::result::Result<T, Error>;

/// Identity gateway errors
#[derive(Error, Debug)]
pub enum Error {
    /// Certificate or key material is missing, unreadable, or undecodable.
    ///
    /// Fatal for the whole gateway: no upstream call can be made without it.
    #[error("Credential unavailable: {0}")]
    CredentialUnavailable(String),

    /// DNS, connection, or TLS handshake failure talking to the upstream.
    #[error("Transport error: {0}")]
    Transport(#[from] reqwest::Error),

    /// The identity provider answered, but not with a usable result.
    #[error("Upstream error {status}: {body}")]
    Upstream {
        /// HTTP status returned by the identity provider
        status: u16,
        /// Raw response body
        body: String,
    },

    /// Malformed encrypted field or authentication tag mismatch
    #[error("Decryption error: {0}")]
    Decryption(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    /// JSON error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl Error {
    /// Build an upstream error from a status and body
    pub fn upstream(status: u16, body: impl Into<String>) -> Self {
        Self::Upstream {
            status,
            body: body.into(),
        }
    }

    /// HTTP status the serving layer should answer with for this error.
    #[must_use]
    pub fn http_status(&self) -> StatusCode {
        match self {
            Self::Upstream { status, .. } => {
                StatusCode::from_u16(*status).unwrap_or(StatusCode::BAD_GATEWAY)
            }
            Self::Transport(_) => StatusCode::BAD_GATEWAY,
            Self::Json(_) => StatusCode::BAD_GATEWAY,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn upstream_error_keeps_status_and_body() {
        let err = Error::upstream(401, r#"{"error":"invalid_token"}"#);
        assert_eq!(err.http_status(), StatusCode::UNAUTHORIZED);
        assert!(err.to_string().contains("invalid_token"));
    }

    #[test]
    fn out_of_range_upstream_status_maps_to_bad_gateway() {
        let err = Error::upstream(42, "");
        assert_eq!(err.http_status(), StatusCode::BAD_GATEWAY);
    }

    #[test]
    fn credential_and_decryption_errors_are_internal() {
        assert_eq!(
            Error::CredentialUnavailable("missing".into()).http_status(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
        assert_eq!(
            Error::Decryption("tag mismatch".into()).http_status(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }
}
