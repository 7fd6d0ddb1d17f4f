//! The public HTTP surface: invocation pipeline, async queue, `/system/...`
//! pass-through routes, the alert webhook, and the bundled dashboard UI.
//! Assembled once in [`crate::main`] from a constructed [`AppState`] and
//! bound to the public port; the metrics registry lives on its own router
//! in [`crate::metrics::router`] on a separate, private port.

use std::collections::HashMap;

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Redirect, Response};
use axum::routing::{any, get, post};
use axum::{Json, Router};
use telemetry::make_span::SpanFactory;
use telemetry::request_id::{CALL_ID_HEADER, MakeCallId};
use tower::ServiceBuilder;
use tower_http::ServiceBuilderExt;
use tower_http::catch_panic::CatchPanicLayer;
use tower_http::compression::CompressionLayer;
use tower_http::cors::CorsLayer;
use tower_http::normalize_path::NormalizePathLayer;
use tower_http::sensitive_headers::SetSensitiveHeadersLayer;
use tower_http::timeout::TimeoutLayer;
use tower_http::trace::TraceLayer;
use tracing::Level;

use crate::alert::AlertManagerPayload;
use crate::auth::require_auth;
use crate::callid::call_id_from_request;
use crate::error::api::ApiError;
use crate::state::AppState;
use crate::types::function::FunctionIdentity;
use crate::ui;
use crate::utils::catch_panic::PanicResponder;

/// Builds the complete public router: every route in the external
/// interface table plus the cross-cutting middleware stack (call-id
/// assignment and propagation, tracing, panic recovery, compression,
/// request timeouts, sensitive-header scrubbing).
#[must_use]
pub fn build(state: AppState) -> Router {
    let timeout = state.config().write_timeout;
    let propagate = true;

    let system_guarded = Router::new()
        .route("/info", get(system_info))
        .route("/alert", post(system_alert))
        .route("/function/{name}", get(system_forward))
        .route(
            "/functions",
            get(system_forward)
                .post(system_forward)
                .put(system_forward)
                .delete(system_forward),
        )
        .route("/scale-function/{name}", post(system_forward))
        .route(
            "/secrets",
            get(system_forward)
                .post(system_forward)
                .put(system_forward)
                .delete(system_forward),
        )
        .route("/logs", get(system_logs))
        .route("/namespaces", get(system_forward))
        .route_layer(axum::middleware::from_fn_with_state(
            state.clone(),
            require_auth,
        ));

    let ui_assets_dir = std::env::var("GATEWAY_UI_ASSETS")
        .unwrap_or_else(|_| "./ui/dist".to_string());

    let router = Router::new()
        .route("/function/{name}", any(invoke))
        .route("/function/{name}/{*rest}", any(invoke))
        .route("/async-function/{name}", post(crate::queue::handle_async_invoke))
        .route(
            "/async-function/{name}/{*rest}",
            post(crate::queue::handle_async_invoke),
        )
        .nest("/system", system_guarded)
        .route("/healthz", get(healthz))
        .route("/", get(root_redirect))
        .nest_service(
            "/ui",
            ui::router(ui_assets_dir.into())
                .route_layer(axum::middleware::from_fn_with_state(state.clone(), require_auth)),
        )
        .with_state(state);

    router.layer(
        ServiceBuilder::new()
            .layer(CatchPanicLayer::custom(PanicResponder))
            .layer(SetSensitiveHeadersLayer::new(std::iter::once(
                axum::http::header::AUTHORIZATION,
            )))
            .set_request_id(
                axum::http::HeaderName::from_static(CALL_ID_HEADER),
                MakeCallId,
            )
            .layer(
                TraceLayer::new_for_http()
                    .make_span_with(SpanFactory::new(Level::INFO, propagate)),
            )
            .propagate_request_id(axum::http::HeaderName::from_static(CALL_ID_HEADER))
            .layer(NormalizePathLayer::trim_trailing_slash())
            .layer(CompressionLayer::new().gzip(true))
            .layer(TimeoutLayer::new(timeout))
            .layer(CorsLayer::permissive()),
    )
}

/// `/function/{name}[/...]`: runs the full invocation pipeline.
async fn invoke(
    State(state): State<AppState>,
    Path(params): Path<HashMap<String, String>>,
    request: axum::extract::Request,
) -> Response {
    let Some(raw_name) = params.get("name") else {
        return ApiError::BadRequest("missing function name".to_string()).into_response();
    };
    let identity = match FunctionIdentity::from_path_segment(raw_name, state.default_namespace()) {
        Ok(identity) => identity,
        Err(error) => return ApiError::from(error).into_response(),
    };
    let call_id = call_id_from_request(&request);
    state
        .pipeline()
        .run(&identity, &call_id, request, state.proxy())
        .await
}

/// Pass-through `/system/...` routes that forward verbatim to the
/// configured provider, stamping the same call-id the rest of the
/// pipeline uses.
async fn system_forward(
    State(state): State<AppState>,
    request: axum::extract::Request,
) -> Result<Response, ApiError> {
    let call_id = call_id_from_request(&request);
    let base = state.proxy().provider_base_url().clone();
    state.proxy().forward_passthrough(&base, &call_id, request).await
}

async fn system_info(
    state: State<AppState>,
    request: axum::extract::Request,
) -> Result<Response, ApiError> {
    system_forward(state, request).await
}

/// `/system/logs`: proxies to the configured log-streaming backend rather
/// than the function provider itself.
async fn system_logs(
    State(state): State<AppState>,
    request: axum::extract::Request,
) -> Result<Response, ApiError> {
    let call_id = call_id_from_request(&request);
    let base = state.proxy().logs_base_url().clone();
    state.proxy().forward_passthrough(&base, &call_id, request).await
}

async fn system_alert(
    State(state): State<AppState>,
    Json(payload): Json<AlertManagerPayload>,
) -> impl IntoResponse {
    let report = state.alert_handler().handle(&payload).await;
    Json(report)
}

async fn healthz() -> impl IntoResponse {
    StatusCode::OK
}

async fn root_redirect() -> impl IntoResponse {
    Redirect::permanent("/ui/")
}
