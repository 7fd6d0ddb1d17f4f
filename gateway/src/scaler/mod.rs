mod singleflight;

use std::sync::Arc;
use std::time::Duration;

use backon::{ConstantBuilder, Retryable};

use crate::cache::ReplicaCache;
use crate::error::provider::ProviderError;
use crate::provider::ProviderClient;
use crate::types::function::{FunctionIdentity, ScaleTarget};

use singleflight::SingleFlight;

/// Outcome of a [`Scaler::scale`] call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScaleOutcome {
    Ok,
    Timeout,
}

#[derive(Debug, Clone)]
pub struct ScalerConfig {
    pub function_poll_interval: Duration,
    pub max_poll_count: u32,
    pub set_scale_retries: u32,
}

/// Guarantees that, by the time the proxy forwards, the target function has
/// at least one available replica, bounding latency and avoiding thundering
/// herds against the provider.
#[derive(Clone)]
pub struct Scaler {
    provider: ProviderClient,
    cache: ReplicaCache,
    config: ScalerConfig,
    in_flight: Arc<SingleFlight<FunctionIdentity, Result<(), ProviderError>>>,
}

impl Scaler {
    #[must_use]
    pub fn new(provider: ProviderClient, cache: ReplicaCache, config: ScalerConfig) -> Self {
        Self {
            provider,
            cache,
            config,
            in_flight: Arc::new(SingleFlight::new()),
        }
    }

    pub async fn scale(
        &self,
        identity: &FunctionIdentity,
    ) -> Result<ScaleOutcome, ProviderError> {
        // Step 1: cache-fast path.
        let (cached, fresh) = self.cache.get(identity).await;
        if fresh {
            if cached.has_available_replica() {
                return Ok(ScaleOutcome::Ok);
            }
            if cached.replicas >= 1 {
                return self.wait_for_ready(identity).await;
            }
        }

        // Step 2: authoritative read.
        let status = self.provider.get_replicas(identity).await?;
        self.cache.set(identity.clone(), status.clone()).await;

        // Step 3: scale decision.
        if status.has_available_replica() {
            return Ok(ScaleOutcome::Ok);
        }
        if status.replicas == 0 {
            self.scale_from_zero(identity, &status).await?;
            return self.wait_for_ready(identity).await;
        }
        // replicas >= 1 but none available yet: fall through to waiting.
        self.wait_for_ready(identity).await
    }

    /// Performs the single-flighted cold-start scale call: among callers
    /// racing for the same identity, only one issues `SetReplicas`.
    async fn scale_from_zero(
        &self,
        identity: &FunctionIdentity,
        status: &crate::types::function::FunctionStatus,
    ) -> Result<(), ProviderError> {
        let desired = status.min_replicas.max(1);
        let target = ScaleTarget::new(identity.clone(), status, desired);
        let provider = self.provider.clone();
        let backoff = ConstantBuilder::default()
            .with_delay(self.config.function_poll_interval)
            .with_max_times(self.config.set_scale_retries as usize);

        self.in_flight
            .run(identity.clone(), async move {
                (|| provider.set_replicas(&target))
                    .retry(backoff)
                    .when(|error| matches!(error, ProviderError::Unavailable))
                    .await
            })
            .await
    }

    async fn wait_for_ready(
        &self,
        identity: &FunctionIdentity,
    ) -> Result<ScaleOutcome, ProviderError> {
        for _ in 0..self.config.max_poll_count {
            let status = self.provider.get_replicas(identity).await?;
            self.cache.set(identity.clone(), status.clone()).await;
            if status.has_available_replica() {
                return Ok(ScaleOutcome::Ok);
            }
            tokio::time::sleep(self.config.function_poll_interval).await;
        }
        Ok(ScaleOutcome::Timeout)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn identity() -> FunctionIdentity {
        FunctionIdentity::new("openfaas-fn", "echo", "openfaas-fn").unwrap()
    }

    async fn spawn_mock() -> (url::Url, mock_provider::MockProvider) {
        let provider = mock_provider::MockProvider::new();
        let app = provider.clone().router();
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        (url::Url::parse(&format!("http://{addr}/")).unwrap(), provider)
    }

    #[tokio::test]
    async fn scales_from_zero_and_waits_for_ready() {
        let (url, mock) = spawn_mock().await;
        mock.seed("openfaas-fn", "echo", 0, 5, 0, 0, Some(2));

        let config = Config {
            functions_provider_url: Some(url),
            ..Config::default()
        };
        let provider = ProviderClient::new(&config).unwrap();
        let cache = ReplicaCache::new(Duration::from_millis(1));
        let scaler_config = ScalerConfig {
            function_poll_interval: Duration::from_millis(5),
            max_poll_count: 50,
            set_scale_retries: 5,
        };
        let scaler = Scaler::new(provider, cache, scaler_config);

        let outcome = scaler.scale(&identity()).await.unwrap();
        assert_eq!(outcome, ScaleOutcome::Ok);
        assert_eq!(mock.scale_calls("openfaas-fn", "echo"), 1);
    }

    #[tokio::test]
    async fn concurrent_cold_start_issues_single_set_replicas_call() {
        let (url, mock) = spawn_mock().await;
        mock.seed("openfaas-fn", "echo", 0, 5, 0, 0, Some(3));

        let config = Config {
            functions_provider_url: Some(url),
            ..Config::default()
        };
        let provider = ProviderClient::new(&config).unwrap();
        let cache = ReplicaCache::new(Duration::from_millis(1));
        let scaler_config = ScalerConfig {
            function_poll_interval: Duration::from_millis(5),
            max_poll_count: 50,
            set_scale_retries: 5,
        };
        let scaler = Scaler::new(provider, cache, scaler_config);

        let calls = AtomicUsize::new(0);
        let _ = &calls;
        let mut handles = Vec::new();
        for _ in 0..8 {
            let scaler = scaler.clone();
            handles.push(tokio::spawn(async move { scaler.scale(&identity()).await }));
        }
        for handle in handles {
            assert_eq!(handle.await.unwrap().unwrap(), ScaleOutcome::Ok);
        }
        assert_eq!(mock.scale_calls("openfaas-fn", "echo"), 1);
    }
}
