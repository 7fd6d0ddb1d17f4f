//! Forwards a request to a resolved upstream, streaming the response body
//! back without buffering it, and stamps the timing headers the original
//! caller and any downstream proxy rely on.

use std::time::{Duration, Instant, SystemTime, UNIX_EPOCH};

use axum::body::Body;
use axum::extract::Request;
use axum::response::{IntoResponse, Response};
use http::{HeaderName, HeaderValue, StatusCode};
use http_body_util::BodyExt;
use url::Url;

use crate::error::api::ApiError;
use crate::notifier::{InvocationEvent, NotifierFabric};
use crate::proxy::resolver::UrlResolver;
use crate::types::function::FunctionIdentity;

const CALL_ID_HEADER: &str = telemetry::request_id::CALL_ID_HEADER;
const START_TIME_HEADER: &str = "x-start-time";
const DURATION_HEADER: &str = "x-duration-seconds";

const HOP_BY_HOP: &[&str] = &[
    "connection",
    "keep-alive",
    "proxy-authenticate",
    "proxy-authorization",
    "te",
    "trailers",
    "transfer-encoding",
    "upgrade",
];

/// Proxies requests to a resolved function, or straight through to the
/// provider for `/system/...` pass-through routes. One instance is shared
/// by the whole process via [`crate::state::AppState`].
#[derive(Clone)]
pub struct ForwardingProxy {
    http: reqwest::Client,
    resolver: UrlResolver,
    upstream_timeout: Duration,
    notifiers: NotifierFabric,
    provider_base_url: Url,
    logs_base_url: Url,
}

impl ForwardingProxy {
    #[must_use]
    pub fn new(
        http: reqwest::Client,
        resolver: UrlResolver,
        upstream_timeout: Duration,
        notifiers: NotifierFabric,
        provider_base_url: Url,
        logs_base_url: Url,
    ) -> Self {
        Self {
            http,
            resolver,
            upstream_timeout,
            notifiers,
            provider_base_url,
            logs_base_url,
        }
    }

    #[must_use]
    pub fn provider_base_url(&self) -> &Url {
        &self.provider_base_url
    }

    #[must_use]
    pub fn logs_base_url(&self) -> &Url {
        &self.logs_base_url
    }

    /// Forwards an invocation to `identity`, notifying every registered
    /// notifier on completion regardless of outcome, and always stamping
    /// `X-Call-Id`, `X-Start-Time`, and `X-Duration-Seconds` on the
    /// response, whether it came from upstream or is a synthesized error.
    pub async fn forward_function(
        &self,
        identity: &FunctionIdentity,
        call_id: &str,
        request: Request,
    ) -> Response {
        let start = Instant::now();
        let start_unix_ns = unix_ns_now();
        let base = self.resolver.resolve(identity);
        let original_path = request.uri().path().to_string();
        let query = request.uri().query().map(str::to_string);
        // `base` already addresses this function (its path segment in
        // provider mode, its own host in direct mode), so the `/function/...`
        // prefix on the incoming request is never re-appended; only the
        // sub-path past it is joined onto `base`.
        let target_path = trim_function_prefix(&original_path, identity);
        let namespace_query = self.resolver.namespace_query(identity);

        let result = self
            .dispatch(
                &base,
                &target_path,
                query.as_deref(),
                namespace_query,
                call_id,
                request,
            )
            .await;

        let elapsed = start.elapsed();
        let status = result
            .as_ref()
            .map(Response::status)
            .unwrap_or(StatusCode::BAD_GATEWAY);
        self.notifiers.notify(InvocationEvent {
            function: identity.clone(),
            call_id: call_id.to_string(),
            status,
            duration: elapsed,
        });

        let mut response = result.unwrap_or_else(IntoResponse::into_response);
        attach_timing_headers(&mut response, call_id, start_unix_ns, elapsed);
        response
    }

    /// Forwards a request verbatim to `base`, with no function resolution
    /// and no notifier fan-out. Used for `/system/...` pass-through routes.
    pub async fn forward_passthrough(
        &self,
        base: &Url,
        call_id: &str,
        request: Request,
    ) -> Result<Response, ApiError> {
        let path = request.uri().path().to_string();
        let query = request.uri().query().map(str::to_string);
        self.dispatch(base, &path, query.as_deref(), None, call_id, request).await
    }

    async fn dispatch(
        &self,
        base: &Url,
        path: &str,
        query: Option<&str>,
        namespace_query: Option<(&'static str, String)>,
        call_id: &str,
        request: Request,
    ) -> Result<Response, ApiError> {
        let (parts, body) = request.into_parts();
        let body_bytes = body
            .collect()
            .await
            .map_err(|error| ApiError::BadRequest(error.to_string()))?
            .to_bytes();

        let mut url = base
            .join(path.trim_start_matches('/'))
            .map_err(|_| ApiError::Internal("invalid upstream path".to_string()))?;
        url.set_query(query);
        if let Some((key, value)) = namespace_query {
            url.query_pairs_mut().append_pair(key, &value);
        }

        let mut builder = self.http.request(parts.method.clone(), url);
        for (name, value) in &parts.headers {
            if !is_hop_by_hop(name) {
                builder = builder.header(name, value);
            }
        }
        builder = builder
            .header(CALL_ID_HEADER, call_id)
            .body(body_bytes);

        let response = tokio::time::timeout(self.upstream_timeout, builder.send())
            .await
            .map_err(|_| ApiError::UpstreamTimeout)?
            .map_err(|_| ApiError::UpstreamUnavailable)?;

        let status = response.status();
        let headers = response.headers().clone();
        let body_stream = response.bytes_stream();

        let mut response_builder = Response::builder().status(status);
        for (name, value) in &headers {
            if !is_hop_by_hop(name) {
                response_builder = response_builder.header(name, value);
            }
        }
        response_builder
            .body(Body::from_stream(body_stream))
            .map_err(|error| ApiError::Internal(error.to_string()))
    }
}

fn is_hop_by_hop(name: &http::HeaderName) -> bool {
    HOP_BY_HOP.contains(&name.as_str())
}

fn trim_function_prefix(path: &str, identity: &FunctionIdentity) -> String {
    let dotted = format!("/function/{}.{}", identity.name, identity.namespace);
    let bare = format!("/function/{}", identity.name);
    for prefix in [dotted.as_str(), bare.as_str()] {
        if let Some(rest) = path.strip_prefix(prefix) {
            return if rest.is_empty() { "/".to_string() } else { rest.to_string() };
        }
    }
    path.to_string()
}

fn unix_ns_now() -> u128 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_nanos()
}

fn attach_timing_headers(response: &mut Response, call_id: &str, start_unix_ns: u128, elapsed: Duration) {
    let headers = response.headers_mut();
    if let Ok(value) = HeaderValue::from_str(&start_unix_ns.to_string()) {
        headers.insert(HeaderName::from_static(START_TIME_HEADER), value);
    }
    if let Ok(value) = HeaderValue::from_str(&format!("{:.6}", elapsed.as_secs_f64())) {
        headers.insert(HeaderName::from_static(DURATION_HEADER), value);
    }
    if let Ok(value) = HeaderValue::from_str(call_id) {
        headers.insert(HeaderName::from_static(CALL_ID_HEADER), value);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use axum::body::Body;
    use http::Request as HttpRequest;

    async fn spawn_mock() -> (Url, mock_provider::MockProvider) {
        let provider = mock_provider::MockProvider::new();
        let app = provider.clone().router();
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        (Url::parse(&format!("http://{addr}/")).unwrap(), provider)
    }

    fn proxy(provider_url: Url) -> ForwardingProxy {
        let config = Config {
            functions_provider_url: Some(provider_url.clone()),
            ..Config::default()
        };
        let resolver = UrlResolver::new(&config);
        ForwardingProxy::new(
            reqwest::Client::new(),
            resolver,
            Duration::from_secs(5),
            NotifierFabric::default(),
            provider_url.clone(),
            provider_url,
        )
    }

    #[tokio::test]
    async fn forwards_body_and_stamps_headers() {
        let (url, mock) = spawn_mock().await;
        mock.seed("openfaas-fn", "echo", 1, 5, 1, 1, None);
        let proxy = proxy(url);
        let identity = FunctionIdentity::new("openfaas-fn", "echo", "openfaas-fn").unwrap();

        let request = HttpRequest::builder()
            .method("POST")
            .uri("/function/echo")
            .header("connection", "keep-alive")
            .body(Body::from("hello"))
            .unwrap();

        let response = proxy.forward_function(&identity, "call-123", request).await;
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(
            response.headers().get(CALL_ID_HEADER).unwrap(),
            "call-123"
        );
        assert!(response.headers().contains_key(START_TIME_HEADER));
        assert!(response.headers().contains_key(DURATION_HEADER));

        let body = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        assert_eq!(&body[..], b"hello");
    }

    #[tokio::test]
    async fn unknown_function_yields_upstream_error_with_headers_still_attached() {
        let (url, _mock) = spawn_mock().await;
        let proxy = proxy(url);
        let identity = FunctionIdentity::new("openfaas-fn", "missing", "openfaas-fn").unwrap();

        let request = HttpRequest::builder()
            .uri("/function/missing")
            .body(Body::empty())
            .unwrap();

        let response = proxy.forward_function(&identity, "call-456", request).await;
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
        assert!(response.headers().contains_key(START_TIME_HEADER));
    }
}
