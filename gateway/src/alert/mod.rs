//! Handles AlertManager-style payloads on `POST /system/alert`, turning a
//! firing `APIHighInvocationRate` alert into a replica increase and a
//! resolved one into a decrease.

use serde::{Deserialize, Serialize};

use crate::cache::ReplicaCache;
use crate::error::provider::ProviderError;
use crate::provider::ProviderClient;
use crate::types::function::{FunctionIdentity, ScaleTarget};

const SCALE_ALERT_NAME: &str = "APIHighInvocationRate";

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct AlertManagerPayload {
    #[serde(default)]
    pub status: String,
    pub alerts: Vec<Alert>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Alert {
    #[serde(default)]
    pub status: String,
    pub labels: AlertLabels,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct AlertLabels {
    pub alertname: String,
    #[serde(default)]
    pub function_name: Option<String>,
}

#[derive(Debug, Clone)]
pub struct AlertHandlerConfig {
    pub default_namespace: String,
    /// Percentage of `max_replicas` added or removed per alert, as an
    /// integer out of 100. Defaults to 20 per the original system.
    pub scaling_factor: u32,
}

impl Default for AlertHandlerConfig {
    fn default() -> Self {
        Self {
            default_namespace: "openfaas-fn".to_string(),
            scaling_factor: 20,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum AlertOutcome {
    Scaled { function: String, replicas: u32 },
    Skipped { reason: String },
    Failed { function: String, error: String },
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct AlertHandlerReport {
    pub results: Vec<AlertOutcome>,
}

impl AlertHandlerReport {
    #[must_use]
    pub fn all_succeeded(&self) -> bool {
        !self
            .results
            .iter()
            .any(|outcome| matches!(outcome, AlertOutcome::Failed { .. }))
    }
}

/// Applies AlertManager-driven scaling decisions against the provider.
///
/// Idempotence relies on the same freshness window the scaler uses: a
/// repeated firing alert observed while the replica cache entry is still
/// fresh recomputes its target from that same cached snapshot rather than
/// re-reading the provider, so the target does not compound across
/// duplicate deliveries within one cache window.
#[derive(Clone)]
pub struct AlertHandler {
    provider: ProviderClient,
    cache: ReplicaCache,
    config: AlertHandlerConfig,
}

impl AlertHandler {
    #[must_use]
    pub fn new(provider: ProviderClient, cache: ReplicaCache, config: AlertHandlerConfig) -> Self {
        Self {
            provider,
            cache,
            config,
        }
    }

    pub async fn handle(&self, payload: &AlertManagerPayload) -> AlertHandlerReport {
        let mut results = Vec::with_capacity(payload.alerts.len());
        for alert in &payload.alerts {
            results.push(self.handle_one(alert).await);
        }
        AlertHandlerReport { results }
    }

    async fn handle_one(&self, alert: &Alert) -> AlertOutcome {
        if alert.labels.alertname != SCALE_ALERT_NAME {
            return AlertOutcome::Skipped {
                reason: format!("unhandled alertname {}", alert.labels.alertname),
            };
        }
        let Some(label) = alert.labels.function_name.as_deref() else {
            return AlertOutcome::Skipped {
                reason: "missing function_name label".to_string(),
            };
        };
        let identity = match parse_function_name(label, &self.config.default_namespace) {
            Ok(identity) => identity,
            Err(_) => {
                return AlertOutcome::Skipped {
                    reason: format!("invalid function_name label: {label}"),
                }
            }
        };

        match self.scale_for_alert(&identity, alert.status == "firing").await {
            Ok(replicas) => AlertOutcome::Scaled {
                function: identity.to_string(),
                replicas,
            },
            Err(error) => AlertOutcome::Failed {
                function: identity.to_string(),
                error: error.to_string(),
            },
        }
    }

    async fn scale_for_alert(
        &self,
        identity: &FunctionIdentity,
        firing: bool,
    ) -> Result<u32, ProviderError> {
        let (cached, fresh) = self.cache.get(identity).await;
        let status = if fresh {
            cached
        } else {
            let status = self.provider.get_replicas(identity).await?;
            self.cache.set(identity.clone(), status.clone()).await;
            status
        };

        let step = step_size(status.max_replicas, self.config.scaling_factor);
        let desired = if firing {
            status.replicas.saturating_add(step).min(status.max_replicas)
        } else {
            status.replicas.saturating_sub(step).max(status.min_replicas)
        };

        let target = ScaleTarget::new(identity.clone(), &status, desired);
        self.provider.set_replicas(&target).await?;
        Ok(target.replicas)
    }
}

fn step_size(max_replicas: u32, scaling_factor: u32) -> u32 {
    let step = (u64::from(max_replicas) * u64::from(scaling_factor)).div_ceil(100);
    step.max(1) as u32
}

fn parse_function_name(
    label: &str,
    default_namespace: &str,
) -> Result<FunctionIdentity, crate::types::function::InvalidFunctionName> {
    match label.split_once('/') {
        Some((namespace, name)) => FunctionIdentity::new(namespace, name, default_namespace),
        None => FunctionIdentity::new("", label, default_namespace),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use std::time::Duration;

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

    fn firing_alert(function_name: &str) -> AlertManagerPayload {
        AlertManagerPayload {
            status: "firing".to_string(),
            alerts: vec![Alert {
                status: "firing".to_string(),
                labels: AlertLabels {
                    alertname: SCALE_ALERT_NAME.to_string(),
                    function_name: Some(function_name.to_string()),
                },
            }],
        }
    }

    #[tokio::test]
    async fn firing_alert_scales_up_by_step() {
        let (url, mock) = spawn_mock().await;
        mock.seed("openfaas-fn", "figlet", 1, 10, 2, 2, None);

        let config = Config {
            functions_provider_url: Some(url),
            ..Config::default()
        };
        let provider = ProviderClient::new(&config).unwrap();
        let cache = ReplicaCache::new(Duration::from_millis(250));
        let handler = AlertHandler::new(provider, cache, AlertHandlerConfig::default());

        let report = handler.handle(&firing_alert("figlet")).await;
        assert!(report.all_succeeded());
        assert_eq!(
            report.results[0],
            AlertOutcome::Scaled {
                function: "openfaas-fn/figlet".to_string(),
                replicas: 4,
            }
        );
        assert_eq!(mock.status("openfaas-fn", "figlet").replicas, 4);
    }

    #[tokio::test]
    async fn repeated_firing_alert_within_cache_window_does_not_compound() {
        let (url, mock) = spawn_mock().await;
        mock.seed("openfaas-fn", "figlet", 1, 10, 2, 2, None);

        let config = Config {
            functions_provider_url: Some(url),
            ..Config::default()
        };
        let provider = ProviderClient::new(&config).unwrap();
        let cache = ReplicaCache::new(Duration::from_secs(5));
        let handler = AlertHandler::new(provider, cache, AlertHandlerConfig::default());

        handler.handle(&firing_alert("figlet")).await;
        handler.handle(&firing_alert("figlet")).await;

        assert_eq!(mock.status("openfaas-fn", "figlet").replicas, 4);
    }

    #[tokio::test]
    async fn missing_function_name_label_is_skipped_not_failed() {
        let (url, _mock) = spawn_mock().await;
        let config = Config {
            functions_provider_url: Some(url),
            ..Config::default()
        };
        let provider = ProviderClient::new(&config).unwrap();
        let cache = ReplicaCache::new(Duration::from_millis(250));
        let handler = AlertHandler::new(provider, cache, AlertHandlerConfig::default());

        let payload = AlertManagerPayload {
            status: "firing".to_string(),
            alerts: vec![Alert {
                status: "firing".to_string(),
                labels: AlertLabels {
                    alertname: SCALE_ALERT_NAME.to_string(),
                    function_name: None,
                },
            }],
        };

        let report = handler.handle(&payload).await;
        assert!(report.all_succeeded());
        assert!(matches!(report.results[0], AlertOutcome::Skipped { .. }));
    }

    #[tokio::test]
    async fn unrelated_alertname_is_skipped() {
        let (url, _mock) = spawn_mock().await;
        let config = Config {
            functions_provider_url: Some(url),
            ..Config::default()
        };
        let provider = ProviderClient::new(&config).unwrap();
        let cache = ReplicaCache::new(Duration::from_millis(250));
        let handler = AlertHandler::new(provider, cache, AlertHandlerConfig::default());

        let payload = AlertManagerPayload {
            status: "firing".to_string(),
            alerts: vec![Alert {
                status: "firing".to_string(),
                labels: AlertLabels {
                    alertname: "SomethingElse".to_string(),
                    function_name: Some("figlet".to_string()),
                },
            }],
        };

        let report = handler.handle(&payload).await;
        assert!(matches!(report.results[0], AlertOutcome::Skipped { .. }));
    }
}
