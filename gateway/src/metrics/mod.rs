//! Process-wide Prometheus registry. A [`Metrics`] handle is cheap to
//! clone and is what [`crate::notifier::MetricsNotifier`] records against;
//! the `/metrics` route on the metrics port renders it via [`Metrics::gather`].

use std::sync::Arc;
use std::time::Duration;

use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::routing::get;
use axum::Router;
use prometheus::{Encoder, HistogramOpts, HistogramVec, IntCounterVec, Opts, Registry, TextEncoder};

use crate::types::function::FunctionIdentity;

#[derive(Clone)]
pub struct Metrics {
    registry: Arc<Registry>,
    invocations_total: IntCounterVec,
    invocation_duration_seconds: HistogramVec,
}

impl Metrics {
    pub fn new() -> Result<Self, prometheus::Error> {
        let registry = Registry::new();

        let invocations_total = IntCounterVec::new(
            Opts::new(
                "gateway_function_invocation_total",
                "Count of completed function invocations by status code",
            ),
            &["function_name", "namespace", "code"],
        )?;
        registry.register(Box::new(invocations_total.clone()))?;

        let invocation_duration_seconds = HistogramVec::new(
            HistogramOpts::new(
                "gateway_function_invocation_duration_seconds",
                "Time from pipeline entry to the forwarded response completing",
            ),
            &["function_name", "namespace"],
        )?;
        registry.register(Box::new(invocation_duration_seconds.clone()))?;

        Ok(Self {
            registry: Arc::new(registry),
            invocations_total,
            invocation_duration_seconds,
        })
    }

    pub fn record_invocation(
        &self,
        identity: &FunctionIdentity,
        status: StatusCode,
        duration: Duration,
    ) {
        self.invocations_total
            .with_label_values(&[&identity.name, &identity.namespace, status.as_str()])
            .inc();
        self.invocation_duration_seconds
            .with_label_values(&[&identity.name, &identity.namespace])
            .observe(duration.as_secs_f64());
    }

    /// Renders the registry in Prometheus's text exposition format.
    #[must_use]
    pub fn gather(&self) -> Vec<u8> {
        let mut buffer = Vec::new();
        let encoder = TextEncoder::new();
        let families = self.registry.gather();
        encoder
            .encode(&families, &mut buffer)
            .expect("encoding a well-formed metric family never fails");
        buffer
    }
}

/// The private metrics server: Prometheus exposition plus a liveness
/// check, bound separately from the public invocation surface.
#[must_use]
pub fn router(metrics: Metrics) -> Router {
    Router::new()
        .route("/metrics", get(serve_metrics))
        .route("/healthz", get(healthz))
        .with_state(metrics)
}

async fn serve_metrics(axum::extract::State(metrics): axum::extract::State<Metrics>) -> impl IntoResponse {
    (
        StatusCode::OK,
        [("content-type", "text/plain; version=0.0.4")],
        metrics.gather(),
    )
}

async fn healthz() -> impl IntoResponse {
    StatusCode::OK
}

#[cfg(test)]
mod tests {
    use super::*;

    fn identity() -> FunctionIdentity {
        FunctionIdentity::new("openfaas-fn", "echo", "openfaas-fn").unwrap()
    }

    #[test]
    fn records_and_renders_invocation() {
        let metrics = Metrics::new().unwrap();
        metrics.record_invocation(&identity(), StatusCode::OK, Duration::from_millis(12));
        let rendered = String::from_utf8(metrics.gather()).unwrap();
        assert!(rendered.contains("gateway_function_invocation_total"));
        assert!(rendered.contains("gateway_function_invocation_duration_seconds"));
    }

    #[test]
    fn distinct_functions_are_labeled_independently() {
        let metrics = Metrics::new().unwrap();
        let other = FunctionIdentity::new("openfaas-fn", "figlet", "openfaas-fn").unwrap();
        metrics.record_invocation(&identity(), StatusCode::OK, Duration::from_millis(1));
        metrics.record_invocation(&other, StatusCode::BAD_GATEWAY, Duration::from_millis(1));
        let rendered = String::from_utf8(metrics.gather()).unwrap();
        assert!(rendered.contains("echo"));
        assert!(rendered.contains("figlet"));
    }
}
