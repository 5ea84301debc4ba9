//! HTTPS client bound to a client certificate.
//!
//! Every request presents the configured identity and verifies the server
//! certificate against the built-in roots plus any extra trust anchors.
//! There is no way to switch server verification off.

use std::fmt;

use reqwest::header::{CONTENT_TYPE, HeaderMap, HeaderValue};
use reqwest::{Client, Method};
use serde_json::Value;
use tracing::debug;
use url::Url;

use super::cert_manager::{build_identity, load_ca_certs};
use crate::credential::Credential;
use crate::{Error, Result};

/// Content type sent unless the caller overrides it.
pub const DEFAULT_CONTENT_TYPE: &str = "application/json; charset=utf-8";

/// Raw upstream response. The body is handed back unparsed.
#[derive(Debug, Clone)]
pub struct GatewayResponse {
    /// HTTP status code
    pub status: u16,
    /// Response headers
    pub headers: HeaderMap,
    /// Full response body
    pub body: String,
}

impl GatewayResponse {
    /// Whether the status is 2xx
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    /// Turn a non-2xx response into [`Error::Upstream`].
    pub fn error_for_status(self) -> Result<Self> {
        if self.is_success() {
            Ok(self)
        } else {
            Err(Error::upstream(self.status, self.body))
        }
    }

    /// Parse the body as JSON.
    pub fn json(&self) -> Result<Value> {
        Ok(serde_json::from_str(&self.body)?)
    }
}

/// Mutual-TLS HTTPS client.
#[derive(Clone)]
pub struct MutualTlsClient {
    http: Client,
}

impl fmt::Debug for MutualTlsClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MutualTlsClient").finish_non_exhaustive()
    }
}

impl MutualTlsClient {
    /// Build a client presenting `cert`/`key` on every handshake.
    ///
    /// # Errors
    ///
    /// Returns [`Error::CredentialUnavailable`] if the material does not
    /// form a usable identity, or [`Error::Transport`] if the TLS backend
    /// cannot be initialised.
    pub fn new(cert: &Credential, key: &Credential) -> Result<Self> {
        Self::with_extra_roots(cert, key, None)
    }

    /// Like [`MutualTlsClient::new`], additionally trusting the CA
    /// certificates in `ca`.
    pub fn with_extra_roots(
        cert: &Credential,
        key: &Credential,
        ca: Option<&Credential>,
    ) -> Result<Self> {
        let identity = build_identity(cert, key)?;

        let mut builder = Client::builder()
            .identity(identity)
            .user_agent(concat!("identity-gateway/", env!("CARGO_PKG_VERSION")));

        if let Some(ca) = ca {
            for root in load_ca_certs(ca)? {
                builder = builder.add_root_certificate(root);
            }
        }

        let http = builder.build()?;

        debug!(
            cert_source = %cert.source(),
            key_source = %key.source(),
            extra_roots = ca.is_some(),
            "mTLS client built"
        );

        Ok(Self { http })
    }

    /// Issue a GET request.
    pub async fn get(&self, url: &str, headers: &HeaderMap) -> Result<GatewayResponse> {
        self.send(Method::GET, url, None, headers).await
    }

    /// Issue a POST request with a JSON body.
    pub async fn post(
        &self,
        url: &str,
        body: &Value,
        headers: &HeaderMap,
    ) -> Result<GatewayResponse> {
        self.send(Method::POST, url, Some(body), headers).await
    }

    async fn send(
        &self,
        method: Method,
        url: &str,
        body: Option<&Value>,
        headers: &HeaderMap,
    ) -> Result<GatewayResponse> {
        let url = Url::parse(url).map_err(|e| Error::Config(format!("invalid URL '{url}': {e}")))?;

        let mut request = self
            .http
            .request(method.clone(), url.clone())
            .headers(request_headers(headers));
        if let Some(body) = body {
            request = request.body(serde_json::to_vec(body)?);
        }

        let response = request.send().await?;
        let status = response.status().as_u16();
        let headers = response.headers().clone();
        let body = response.text().await?;

        debug!(
            %method,
            host = url.host_str().unwrap_or_default(),
            path = url.path(),
            status,
            body_len = body.len(),
            "Upstream responded"
        );

        Ok(GatewayResponse {
            status,
            headers,
            body,
        })
    }
}

/// Default headers with every name the caller sets replaced by all of the
/// caller's values for it.
fn request_headers(caller: &HeaderMap) -> HeaderMap {
    let mut merged = HeaderMap::new();
    merged.insert(CONTENT_TYPE, HeaderValue::from_static(DEFAULT_CONTENT_TYPE));
    for name in caller.keys() {
        merged.remove(name);
    }
    for (name, value) in caller {
        merged.append(name, value.clone());
    }
    merged
}
