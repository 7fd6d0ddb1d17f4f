//! The gateway's single shared dependency context: every handler reaches
//! the provider client, the caches, the scaler/prober/pipeline, and the
//! metrics registry through a clone of [`AppState`] rather than through
//! ambient globals. Constructed once in [`AppState::new`] at startup and
//! never mutated afterwards — only its interior caches and single-flight
//! registry see concurrent writes.

use std::sync::Arc;

use crate::alert::{AlertHandler, AlertHandlerConfig};
use crate::auth::AuthProxyClient;
use crate::cache::{ProbeCache, ReplicaCache};
use crate::config::Config;
use crate::error::init::InitError;
use crate::metrics::Metrics;
use crate::notifier::{LoggingNotifier, MetricsNotifier, NotifierFabric};
use crate::pipeline::Pipeline;
use crate::prober::Prober;
use crate::provider::ProviderClient;
use crate::provider::client::BasicAuthCredentials;
use crate::proxy::{ForwardingProxy, UrlResolver};
use crate::queue::AsyncQueue;
use crate::scaler::{Scaler, ScalerConfig};

#[derive(Clone)]
pub struct AppState(Arc<Inner>);

struct Inner {
    config: Config,
    provider: ProviderClient,
    pipeline: Pipeline,
    proxy: ForwardingProxy,
    alert_handler: AlertHandler,
    queue: Option<Arc<dyn AsyncQueue>>,
    metrics: Metrics,
    credentials: Option<BasicAuthCredentials>,
    auth_proxy: Option<AuthProxyClient>,
}

impl AppState {
    pub async fn new(config: Config) -> Result<Self, InitError> {
        let provider = ProviderClient::new(&config)?;
        let metrics = Metrics::new()?;

        let replica_cache = ReplicaCache::new(config.replica_cache_expiry);
        let probe_cache = ProbeCache::new(config.probe_cache_expiry);

        let shared_http = reqwest::Client::builder()
            .pool_max_idle_per_host(config.max_idle_conns_per_host)
            .timeout(config.upstream_timeout)
            .tcp_nodelay(true)
            .build()?;

        let resolver = UrlResolver::new(&config);

        let scaler = Scaler::new(
            provider.clone(),
            replica_cache.clone(),
            ScalerConfig {
                function_poll_interval: config.function_poll_interval,
                max_poll_count: config.max_poll_count,
                set_scale_retries: config.set_scale_retries,
            },
        );
        let prober = Prober::new(shared_http.clone(), probe_cache.clone(), resolver.clone());
        let pipeline = Pipeline::assemble(config.scale_from_zero, config.probe_functions, scaler, prober);

        let notifiers = NotifierFabric::new(vec![
            Arc::new(LoggingNotifier),
            Arc::new(MetricsNotifier::new(metrics.clone())),
        ]);
        let proxy = ForwardingProxy::new(
            shared_http.clone(),
            resolver,
            config.upstream_timeout,
            notifiers,
            config.provider_url(),
            config.logs_provider_url(),
        );

        let alert_handler = AlertHandler::new(
            provider.clone(),
            replica_cache.clone(),
            AlertHandlerConfig {
                default_namespace: config.functions_default_namespace.clone(),
                ..AlertHandlerConfig::default()
            },
        );

        let credentials = if config.basic_auth {
            Some(BasicAuthCredentials::read_from(&config.secret_mount_path)?)
        } else {
            None
        };

        let auth_proxy = config
            .auth_proxy_url
            .clone()
            .map(|url| AuthProxyClient::new(shared_http.clone(), url, config.auth_proxy_pass_body));

        let queue = build_queue(&config).await?;

        Ok(Self(Arc::new(Inner {
            config,
            provider,
            pipeline,
            proxy,
            alert_handler,
            queue,
            metrics,
            credentials,
            auth_proxy,
        })))
    }

    #[must_use]
    pub fn config(&self) -> &Config {
        &self.0.config
    }

    #[must_use]
    pub fn default_namespace(&self) -> &str {
        &self.0.config.functions_default_namespace
    }

    #[must_use]
    pub fn provider(&self) -> &ProviderClient {
        &self.0.provider
    }

    #[must_use]
    pub fn pipeline(&self) -> &Pipeline {
        &self.0.pipeline
    }

    #[must_use]
    pub fn proxy(&self) -> &ForwardingProxy {
        &self.0.proxy
    }

    #[must_use]
    pub fn alert_handler(&self) -> &AlertHandler {
        &self.0.alert_handler
    }

    #[must_use]
    pub fn queue(&self) -> Option<Arc<dyn AsyncQueue>> {
        self.0.queue.clone()
    }

    #[must_use]
    pub fn metrics(&self) -> &Metrics {
        &self.0.metrics
    }

    #[must_use]
    pub fn credentials(&self) -> Option<&BasicAuthCredentials> {
        self.0.credentials.as_ref()
    }

    #[must_use]
    pub fn auth_proxy(&self) -> Option<&AuthProxyClient> {
        self.0.auth_proxy.as_ref()
    }

    /// Returns a copy of this state with the async queue replaced. Used to
    /// plug in a different queue backend than the one `new` assembled from
    /// config — integration tests use it to swap in a recording double
    /// instead of a live NATS connection.
    #[must_use]
    pub fn with_queue(&self, queue: Arc<dyn AsyncQueue>) -> Self {
        Self(Arc::new(Inner {
            config: self.0.config.clone(),
            provider: self.0.provider.clone(),
            pipeline: self.0.pipeline.clone(),
            proxy: self.0.proxy.clone(),
            alert_handler: self.0.alert_handler.clone(),
            queue: Some(queue),
            metrics: self.0.metrics.clone(),
            credentials: self.0.credentials.clone(),
            auth_proxy: self.0.auth_proxy.clone(),
        }))
    }
}

#[cfg(feature = "nats")]
async fn build_queue(config: &Config) -> Result<Option<Arc<dyn AsyncQueue>>, InitError> {
    if config.faas_nats_address.is_empty() {
        return Ok(None);
    }
    let client = crate::queue::nats::NatsQueue::connect(
        &config.faas_nats_address,
        config.faas_nats_port,
        config.faas_nats_channel.clone(),
    )
    .await
    .map_err(|error| InitError::Nats(config.faas_nats_address.clone(), error))?;
    Ok(Some(Arc::new(client) as Arc<dyn AsyncQueue>))
}

#[cfg(not(feature = "nats"))]
#[allow(clippy::unused_async)]
async fn build_queue(_config: &Config) -> Result<Option<Arc<dyn AsyncQueue>>, InitError> {
    Ok(None)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn assembles_with_no_queue_configured() {
        let config = Config {
            functions_provider_url: Some(url::Url::parse("http://127.0.0.1:1").unwrap()),
            ..Config::default()
        };
        let state = AppState::new(config).await.unwrap();
        assert!(state.queue().is_none());
        assert!(state.credentials().is_none());
        assert!(state.auth_proxy().is_none());
    }
}
