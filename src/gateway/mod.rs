//! Identity provider adapter.
//!
//! Maps the five OAuth2 operations of the identity provider onto requests
//! issued through one shared [`MutualTlsClient`]:
//!
//! | Operation                 | Verb | Path                             |
//! |---------------------------|------|----------------------------------|
//! | `issue_token`             | POST | `/generate-token`                |
//! | `refresh_token`           | POST | `/refresh-token`                 |
//! | `fetch_user_info`         | GET  | `/login-me`                      |
//! | `revoke_by_access_token`  | POST | `/access/remove-by-access-token` |
//! | `revoke_by_user_key`      | POST | `/access/remove-by-user-key`     |
//!
//! The client is built on first use behind a one-time async cell, so
//! concurrent first calls share a single construction.

pub mod router;
pub mod server;

use reqwest::Method;
use reqwest::header::{AUTHORIZATION, HeaderMap, HeaderValue};
use serde_json::{Value, json};
use tokio::sync::OnceCell;
use tracing::{debug, info};

use crate::config::GatewayConfig;
use crate::mtls::{GatewayResponse, MutualTlsClient};
use crate::pii::{self, DecryptionKey};
use crate::{Error, Result};

/// Path of the token issue endpoint
pub const GENERATE_TOKEN_PATH: &str = "/generate-token";
/// Path of the token refresh endpoint
pub const REFRESH_TOKEN_PATH: &str = "/refresh-token";
/// Path of the user info endpoint
pub const LOGIN_ME_PATH: &str = "/login-me";
/// Path of the revoke-by-access-token endpoint
pub const REMOVE_BY_ACCESS_TOKEN_PATH: &str = "/access/remove-by-access-token";
/// Path of the revoke-by-user-key endpoint
pub const REMOVE_BY_USER_KEY_PATH: &str = "/access/remove-by-user-key";

const BEARER_PREFIX: &str = "Bearer ";

/// Characters of a token that may appear in logs.
const TOKEN_LOG_PREFIX: usize = 10;

/// One request against the identity provider, relative to the API base.
#[derive(Debug, Clone)]
pub struct GatewayRequest {
    /// GET or POST
    pub method: Method,
    /// Path appended to the API base
    pub path: String,
    /// JSON body (POST only)
    pub body: Option<Value>,
    /// Extra headers, overriding the defaults
    pub headers: HeaderMap,
}

impl GatewayRequest {
    /// A GET request with no body.
    pub fn get(path: impl Into<String>) -> Self {
        Self {
            method: Method::GET,
            path: path.into(),
            body: None,
            headers: HeaderMap::new(),
        }
    }

    /// A POST request with a JSON body.
    pub fn post(path: impl Into<String>, body: Value) -> Self {
        Self {
            method: Method::POST,
            path: path.into(),
            body: Some(body),
            headers: HeaderMap::new(),
        }
    }

    /// Set the `Authorization` header.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] if the value is not a legal header value.
    pub fn authorization(mut self, value: &str) -> Result<Self> {
        let value = HeaderValue::from_str(value)
            .map_err(|e| Error::Config(format!("invalid Authorization header: {e}")))?;
        self.headers.insert(AUTHORIZATION, value);
        Ok(self)
    }
}

/// Decrypted user info together with the upstream status.
#[derive(Debug, Clone, PartialEq)]
pub struct UserInfo {
    /// Upstream HTTP status
    pub status: u16,
    /// Upstream JSON with `success` replaced by its decrypted form
    pub data: Value,
}

/// Key and AAD used to decrypt user info.
#[derive(Debug, Clone)]
struct PiiDecryptor {
    key: DecryptionKey,
    aad: String,
}

/// Adapter over the identity provider's OAuth2 API.
#[derive(Debug)]
pub struct IdentityGateway {
    api_base: String,
    config: GatewayConfig,
    client: OnceCell<MutualTlsClient>,
    decryptor: Option<PiiDecryptor>,
}

impl IdentityGateway {
    /// Create a gateway whose client is built from `config` on first use.
    ///
    /// # Errors
    ///
    /// Fails if `api_base` is invalid or a configured decryption key is
    /// malformed. Missing credentials only surface on the first call.
    pub fn from_config(config: GatewayConfig) -> Result<Self> {
        config.validate()?;

        let decryptor = if config.has_decryption_key() {
            Some(PiiDecryptor {
                key: config.pii_key()?,
                aad: config.aad.clone(),
            })
        } else {
            None
        };

        Ok(Self {
            api_base: normalize_base(&config.api_base),
            config,
            client: OnceCell::new(),
            decryptor,
        })
    }

    /// Create a gateway around an already built client.
    pub fn with_client(api_base: &str, client: MutualTlsClient) -> Self {
        Self {
            api_base: normalize_base(api_base),
            config: GatewayConfig::default(),
            client: OnceCell::from(client),
            decryptor: None,
        }
    }

    /// Set the key and AAD used by [`IdentityGateway::fetch_user_info_decrypted`].
    #[must_use]
    pub fn with_decryption(mut self, key: DecryptionKey, aad: impl Into<String>) -> Self {
        self.decryptor = Some(PiiDecryptor {
            key,
            aad: aad.into(),
        });
        self
    }

    /// API base every path is appended to.
    pub fn api_base(&self) -> &str {
        &self.api_base
    }

    /// The shared client, built on first call.
    ///
    /// A failed build leaves the gateway uninitialised; the next call tries
    /// again.
    ///
    /// # Errors
    ///
    /// Returns [`Error::CredentialUnavailable`] if the credentials are
    /// missing or unusable.
    pub async fn client(&self) -> Result<&MutualTlsClient> {
        self.client
            .get_or_try_init(|| async {
                let (cert, key) = self.config.credentials()?;
                let ca = self.config.ca_credential()?;
                let client = MutualTlsClient::with_extra_roots(&cert, &key, ca.as_ref())?;
                info!(api_base = %self.api_base, "Identity provider client initialised");
                Ok::<_, Error>(client)
            })
            .await
    }

    /// Send a request relative to the API base.
    pub async fn send(&self, request: GatewayRequest) -> Result<GatewayResponse> {
        let client = self.client().await?;
        let url = format!("{}{}", self.api_base, request.path);

        debug!(method = %request.method, path = %request.path, "Calling identity provider");

        match request.method {
            Method::GET => client.get(&url, &request.headers).await,
            Method::POST => {
                let body = request.body.unwrap_or_else(|| json!({}));
                client.post(&url, &body, &request.headers).await
            }
            other => Err(Error::Config(format!("unsupported method: {other}"))),
        }
    }

    /// Exchange an authorization code for tokens.
    pub async fn issue_token(
        &self,
        authorization_code: &str,
        referrer: &str,
    ) -> Result<GatewayResponse> {
        self.send(GatewayRequest::post(
            GENERATE_TOKEN_PATH,
            json!({
                "authorizationCode": authorization_code,
                "referrer": referrer,
            }),
        ))
        .await
    }

    /// Exchange a refresh token for a new token pair.
    pub async fn refresh_token(&self, refresh_token: &str) -> Result<GatewayResponse> {
        self.send(GatewayRequest::post(
            REFRESH_TOKEN_PATH,
            json!({ "refreshToken": refresh_token }),
        ))
        .await
    }

    /// Fetch the (encrypted) user info for an access token.
    pub async fn fetch_user_info(&self, access_token: &str) -> Result<GatewayResponse> {
        debug!(
            token_prefix = %token_prefix(access_token),
            "Requesting user info"
        );
        let request =
            GatewayRequest::get(LOGIN_ME_PATH).authorization(&bearer_authorization(access_token))?;
        self.send(request).await
    }

    /// Revoke the session an access token belongs to.
    ///
    /// The token is sent as the `Authorization` value verbatim.
    pub async fn revoke_by_access_token(&self, access_token: &str) -> Result<GatewayResponse> {
        let request =
            GatewayRequest::post(REMOVE_BY_ACCESS_TOKEN_PATH, json!({})).authorization(access_token)?;
        self.send(request).await
    }

    /// Revoke every session of a user.
    pub async fn revoke_by_user_key(&self, user_key: &str) -> Result<GatewayResponse> {
        self.send(GatewayRequest::post(
            REMOVE_BY_USER_KEY_PATH,
            json!({ "userKey": user_key }),
        ))
        .await
    }

    /// Fetch user info and decrypt its `success` record.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Upstream`] with the upstream status and body when the
    /// response carries no `success` record, [`Error::Json`] if the body is
    /// not JSON, and [`Error::Decryption`] if any PII field fails.
    pub async fn fetch_user_info_decrypted(&self, access_token: &str) -> Result<UserInfo> {
        let decryptor = self.decryptor.as_ref().ok_or_else(|| {
            Error::Config("no decryption key configured for user info".to_string())
        })?;

        let response = self.fetch_user_info(access_token).await?;
        let mut data = response.json()?;

        let record = match data.get("success") {
            Some(record) if is_truthy(record) => record,
            _ => return Err(Error::upstream(response.status, response.body)),
        };

        let decrypted = pii::decrypt_record(record, &decryptor.key, &decryptor.aad)?;
        data["success"] = decrypted;

        Ok(UserInfo {
            status: response.status,
            data,
        })
    }
}

/// `Authorization` value for user info: the token with a `Bearer ` prefix,
/// added only when missing.
pub fn bearer_authorization(access_token: &str) -> String {
    if access_token.starts_with(BEARER_PREFIX) {
        access_token.to_string()
    } else {
        format!("{BEARER_PREFIX}{access_token}")
    }
}

fn token_prefix(token: &str) -> String {
    token.chars().take(TOKEN_LOG_PREFIX).collect()
}

fn normalize_base(api_base: &str) -> String {
    api_base.trim_end_matches('/').to_string()
}

fn is_truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().is_some_and(|f| f != 0.0),
        Value::String(s) => !s.is_empty(),
        Value::Array(_) | Value::Object(_) => true,
    }
}
