//! Tracing/logging bootstrap shared by the gateway binary and its tools.
//!
//! Kept as its own crate so that the mock provider and any future
//! auxiliary binaries can initialize the same structured logging stack
//! without depending on the gateway crate itself.

pub mod make_span;
pub mod request_id;

use opentelemetry::trace::TracerProvider as _;
use opentelemetry_sdk::trace::SdkTracerProvider;
use serde::{Deserialize, Serialize};
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Debug, thiserror::Error, displaydoc::Display)]
pub enum Error {
    /// failed to install otlp exporter: {0}
    Otlp(#[from] opentelemetry_otlp::ExporterBuildError),
    /// failed to set global tracing subscriber: {0}
    SetGlobal(#[from] tracing_subscriber::util::TryInitError),
}

/// Where finished spans/logs are shipped.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case", tag = "type")]
pub enum Exporter {
    /// Human-readable lines on stdout. The default, appropriate for local
    /// development and for the common case of a sidecar scraping stdout.
    #[default]
    Stdout,
    /// Ship spans to an OTLP collector over gRPC.
    Otlp { endpoint: String },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct Config {
    /// `tracing_subscriber::EnvFilter` directive string, e.g.
    /// `"info,gateway=debug"`.
    pub level: String,
    pub exporter: Exporter,
    /// Propagate the current span's trace/call id onto the span the
    /// `TraceLayer` creates for each HTTP request.
    pub propagate: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            exporter: Exporter::default(),
            propagate: true,
        }
    }
}

/// Installs a global `tracing` subscriber and, for the OTLP exporter,
/// a trace pipeline. Returns the tracer provider so the caller can flush
/// it on shutdown; stdout-only configurations return `None`.
pub fn init_telemetry(
    config: &Config,
) -> Result<Option<SdkTracerProvider>, Error> {
    let env_filter = EnvFilter::try_new(&config.level)
        .unwrap_or_else(|_| EnvFilter::new("info"));

    match &config.exporter {
        Exporter::Stdout => {
            tracing_subscriber::registry()
                .with(env_filter)
                .with(tracing_subscriber::fmt::layer().with_target(true))
                .try_init()?;
            Ok(None)
        }
        Exporter::Otlp { endpoint } => {
            let exporter = opentelemetry_otlp::SpanExporter::builder()
                .with_tonic()
                .with_endpoint(endpoint.clone())
                .build()?;
            let provider = SdkTracerProvider::builder()
                .with_batch_exporter(exporter)
                .build();
            let tracer = provider.tracer("gateway");

            tracing_subscriber::registry()
                .with(env_filter)
                .with(tracing_subscriber::fmt::layer().with_target(true))
                .with(tracing_opentelemetry::layer().with_tracer(tracer))
                .try_init()?;
            Ok(Some(provider))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_is_stdout() {
        let config = Config::default();
        assert_eq!(config.exporter, Exporter::Stdout);
        assert!(config.propagate);
    }

    #[test]
    fn exporter_round_trips_through_json() {
        let config = Config {
            exporter: Exporter::Otlp {
                endpoint: "http://localhost:4317".to_string(),
            },
            ..Config::default()
        };
        let serialized = serde_json::to_string(&config).unwrap();
        let deserialized: Config = serde_json::from_str(&serialized).unwrap();
        assert_eq!(config, deserialized);
    }
}
