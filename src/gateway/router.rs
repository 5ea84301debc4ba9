//! HTTP router and handlers

use std::sync::Arc;

use axum::{
    Json, Router,
    extract::{DefaultBodyLimit, State},
    http::{HeaderMap, Method, StatusCode, header},
    response::{IntoResponse, Response},
    routing::{get, post},
};
use serde::Deserialize;
use serde_json::{Value, json};
use tower_http::{
    catch_panic::CatchPanicLayer,
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};
use tracing::error;

use super::IdentityGateway;
use crate::Error;
use crate::mtls::GatewayResponse;

/// Request bodies may carry large JSON payloads from the front end.
const BODY_LIMIT: usize = 10 * 1024 * 1024;

/// Shared application state
pub struct AppState {
    /// Identity provider adapter
    pub gateway: Arc<IdentityGateway>,
}

/// Body of `POST /api/auth/get-access-token`
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AccessTokenRequest {
    /// Authorization code from the identity provider login
    #[serde(default)]
    pub authorization_code: String,
    /// Referrer reported by the login flow
    #[serde(default)]
    pub referrer: String,
}

/// Body of `POST /api/auth/refresh-token`
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RefreshTokenRequest {
    /// Refresh token to exchange
    #[serde(default)]
    pub refresh_token: String,
}

/// Body of `POST /api/auth/logout-by-user-key`
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserKeyRequest {
    /// User key whose sessions are revoked
    #[serde(default)]
    pub user_key: String,
}

/// Create the router
pub fn create_router(state: Arc<AppState>) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers([header::CONTENT_TYPE, header::AUTHORIZATION]);

    let auth = Router::new()
        .route("/get-access-token", post(get_access_token))
        .route("/refresh-token", post(refresh_token))
        .route("/get-user-info", get(get_user_info))
        .route("/logout-by-access-token", post(logout_by_access_token))
        .route("/logout-by-user-key", post(logout_by_user_key));

    Router::new()
        .route("/health", get(health_handler))
        .nest("/api/auth", auth)
        .fallback(not_found_handler)
        .layer(DefaultBodyLimit::max(BODY_LIMIT))
        .layer(CatchPanicLayer::new())
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

impl IntoResponse for Error {
    fn into_response(self) -> Response {
        let status = self.http_status();
        if status.is_server_error() {
            error!(error = %self, "Request failed");
        }
        (
            status,
            Json(json!({
                "success": false,
                "error": self.to_string(),
            })),
        )
            .into_response()
    }
}

/// GET /health
async fn health_handler() -> impl IntoResponse {
    Json(json!({
        "status": "ok",
        "timestamp": chrono::Utc::now().to_rfc3339(),
    }))
}

/// POST /api/auth/get-access-token
async fn get_access_token(
    State(state): State<Arc<AppState>>,
    Json(req): Json<AccessTokenRequest>,
) -> Response {
    match state
        .gateway
        .issue_token(&req.authorization_code, &req.referrer)
        .await
    {
        Ok(resp) => upstream_json(&resp),
        Err(e) => e.into_response(),
    }
}

/// POST /api/auth/refresh-token
async fn refresh_token(
    State(state): State<Arc<AppState>>,
    Json(req): Json<RefreshTokenRequest>,
) -> Response {
    match state.gateway.refresh_token(&req.refresh_token).await {
        Ok(resp) => upstream_json(&resp),
        Err(e) => e.into_response(),
    }
}

/// GET /api/auth/get-user-info
async fn get_user_info(State(state): State<Arc<AppState>>, headers: HeaderMap) -> Response {
    let Some(authorization) = authorization(&headers) else {
        return missing_authorization();
    };

    match state.gateway.fetch_user_info_decrypted(authorization).await {
        Ok(info) => (
            StatusCode::OK,
            Json(json!({
                "statusCode": info.status,
                "data": info.data,
            })),
        )
            .into_response(),
        // No `success` record: echo what the provider said with its status
        Err(Error::Upstream { status, body }) => upstream_echo(status, body),
        Err(e) => e.into_response(),
    }
}

/// POST /api/auth/logout-by-access-token
async fn logout_by_access_token(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
) -> Response {
    let Some(authorization) = authorization(&headers) else {
        return missing_authorization();
    };

    match state.gateway.revoke_by_access_token(authorization).await {
        Ok(resp) => upstream_json(&resp),
        Err(e) => e.into_response(),
    }
}

/// POST /api/auth/logout-by-user-key
async fn logout_by_user_key(
    State(state): State<Arc<AppState>>,
    Json(req): Json<UserKeyRequest>,
) -> Response {
    match state.gateway.revoke_by_user_key(&req.user_key).await {
        Ok(resp) => upstream_json(&resp),
        Err(e) => e.into_response(),
    }
}

async fn not_found_handler() -> impl IntoResponse {
    (
        StatusCode::NOT_FOUND,
        Json(json!({
            "success": false,
            "error": "Not Found",
        })),
    )
}

/// `{statusCode, data}` with the upstream body parsed as JSON.
fn upstream_json(resp: &GatewayResponse) -> Response {
    match resp.json() {
        Ok(data) => (
            StatusCode::OK,
            Json(json!({
                "statusCode": resp.status,
                "data": data,
            })),
        )
            .into_response(),
        Err(e) => e.into_response(),
    }
}

/// Upstream failure passed through: its status, and its body as JSON when it
/// parses. The envelope always carries the upstream status verbatim.
fn upstream_echo(status: u16, body: String) -> Response {
    let data = serde_json::from_str::<Value>(&body).unwrap_or(Value::String(body));
    (
        StatusCode::from_u16(status).unwrap_or(StatusCode::BAD_REQUEST),
        Json(json!({
            "statusCode": status,
            "data": data,
        })),
    )
        .into_response()
}

fn authorization(headers: &HeaderMap) -> Option<&str> {
    headers
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .filter(|v| !v.is_empty())
}

fn missing_authorization() -> Response {
    (
        StatusCode::UNAUTHORIZED,
        Json(json!({
            "success": false,
            "error": "Authorization header is required",
        })),
    )
        .into_response()
}
