//! Guards the gateway's own `/system/*` and `/ui/*` surfaces: either basic
//! auth checked in-process against credentials read from a secret mount, or
//! an external auth-proxy consulted over HTTP on every request. The two
//! are mutually exclusive in practice, but nothing here enforces that.

use axum::extract::{Request, State};
use axum::http::HeaderMap;
use axum::http::header::AUTHORIZATION;
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use base64::Engine;
use base64::engine::general_purpose::STANDARD as BASE64;
use bytes::Bytes;
use url::Url;

use crate::error::api::ApiError;
use crate::provider::client::BasicAuthCredentials;
use crate::state::AppState;

/// Forwards the inbound `Authorization` header to an external auth proxy
/// and trusts its status code: any 2xx lets the request through, anything
/// else is rejected as unauthorized regardless of the proxy's own status.
#[derive(Debug, Clone)]
pub struct AuthProxyClient {
    http: reqwest::Client,
    url: Url,
    pass_body: bool,
}

impl AuthProxyClient {
    #[must_use]
    pub fn new(http: reqwest::Client, url: Url, pass_body: bool) -> Self {
        Self {
            http,
            url,
            pass_body,
        }
    }

    async fn authorize(
        &self,
        headers: &HeaderMap,
        body: Option<Bytes>,
    ) -> Result<(), ApiError> {
        let mut builder = self.http.get(self.url.clone());
        if let Some(auth) = headers.get(AUTHORIZATION) {
            builder = builder.header(AUTHORIZATION, auth);
        }
        if let Some(body) = body {
            builder = builder.body(body);
        }

        let response = builder
            .send()
            .await
            .map_err(|_| ApiError::UpstreamUnavailable)?;

        if response.status().is_success() {
            Ok(())
        } else {
            Err(ApiError::Unauthorized)
        }
    }
}

/// Checks the `Authorization: Basic <credentials>` header against
/// credentials read once at startup from the secret mount.
pub fn check_basic_auth(
    request: &Request,
    credentials: &BasicAuthCredentials,
) -> Result<(), ApiError> {
    let header = request
        .headers()
        .get(AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .ok_or(ApiError::Unauthorized)?;

    let encoded = header
        .strip_prefix("Basic ")
        .ok_or(ApiError::Unauthorized)?;
    let decoded = BASE64
        .decode(encoded)
        .map_err(|_| ApiError::Unauthorized)?;
    let decoded = String::from_utf8(decoded).map_err(|_| ApiError::Unauthorized)?;

    let (user, password) = decoded.split_once(':').ok_or(ApiError::Unauthorized)?;
    if user == credentials.user && password == credentials.password {
        Ok(())
    } else {
        Err(ApiError::Unauthorized)
    }
}

/// Middleware guarding the gateway's own routes. A no-op when neither
/// basic auth nor an auth proxy is configured.
pub async fn require_auth(
    State(state): State<AppState>,
    request: Request,
    next: Next,
) -> Response {
    if let Some(credentials) = state.credentials() {
        if let Err(error) = check_basic_auth(&request, credentials) {
            return error.into_response();
        }
        return next.run(request).await;
    }

    let Some(proxy) = state.auth_proxy() else {
        return next.run(request).await;
    };

    if proxy.pass_body {
        let (parts, body) = request.into_parts();
        let bytes = match axum::body::to_bytes(body, usize::MAX).await {
            Ok(bytes) => bytes,
            Err(_) => return ApiError::BadRequest("failed to read request body".to_string()).into_response(),
        };
        if let Err(error) = proxy.authorize(&parts.headers, Some(bytes.clone())).await {
            return error.into_response();
        }
        let request = Request::from_parts(parts, axum::body::Body::from(bytes));
        next.run(request).await
    } else {
        if let Err(error) = proxy.authorize(request.headers(), None).await {
            return error.into_response();
        }
        next.run(request).await
    }
}
