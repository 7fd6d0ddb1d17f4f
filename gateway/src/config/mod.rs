use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use url::Url;

use crate::error::init::InitError;

const DEFAULT_CONFIG_PATH: &str = "/etc/openfaas/gateway.yaml";

/// The gateway's entire runtime configuration, assembled once at startup
/// from an optional config file overridden by environment variables, and
/// never mutated afterwards.
///
/// Field names match the environment variable names verbatim (case
/// insensitive), following the flat, unprefixed style the provider's own
/// environment uses rather than a nested `GATEWAY__SECTION__KEY` scheme.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default, rename_all = "snake_case")]
pub struct Config {
    /// Required; startup fails in [`Config::validate`] if it was never
    /// supplied by the config file or environment.
    pub functions_provider_url: Option<Url>,
    pub logs_provider_url: Option<Url>,

    #[serde(with = "humantime_serde")]
    pub read_timeout: Duration,
    #[serde(with = "humantime_serde")]
    pub write_timeout: Duration,
    #[serde(with = "humantime_serde")]
    pub upstream_timeout: Duration,

    pub functions_default_namespace: String,
    pub direct_functions: bool,
    pub direct_functions_suffix: String,

    pub basic_auth: bool,
    pub secret_mount_path: PathBuf,

    pub auth_proxy_url: Option<Url>,
    pub auth_proxy_pass_body: bool,

    pub scale_from_zero: bool,
    pub probe_functions: bool,

    pub max_idle_conns: usize,
    pub max_idle_conns_per_host: usize,

    pub faas_nats_address: String,
    pub faas_nats_port: u16,
    pub faas_nats_cluster_name: String,
    pub faas_nats_channel: String,

    pub faas_prometheus_host: String,
    pub faas_prometheus_port: u16,

    #[serde(with = "humantime_serde")]
    pub replica_cache_expiry: Duration,
    #[serde(with = "humantime_serde")]
    pub probe_cache_expiry: Duration,

    #[serde(with = "humantime_serde")]
    pub function_poll_interval: Duration,
    pub max_poll_count: u32,
    pub set_scale_retries: u32,

    pub log_level: String,

    pub server_port: u16,
    pub metrics_port: u16,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            functions_provider_url: None,
            logs_provider_url: None,
            read_timeout: Duration::from_secs(10),
            write_timeout: Duration::from_secs(10),
            upstream_timeout: Duration::from_secs(30),
            functions_default_namespace: "openfaas-fn".to_string(),
            direct_functions: false,
            direct_functions_suffix: String::new(),
            basic_auth: false,
            secret_mount_path: PathBuf::from("/var/secrets"),
            auth_proxy_url: None,
            auth_proxy_pass_body: false,
            scale_from_zero: true,
            probe_functions: true,
            max_idle_conns: 1024,
            max_idle_conns_per_host: 1024,
            faas_nats_address: String::new(),
            faas_nats_port: 4222,
            faas_nats_cluster_name: String::new(),
            faas_nats_channel: "faas-request".to_string(),
            faas_prometheus_host: String::new(),
            faas_prometheus_port: 9090,
            replica_cache_expiry: Duration::from_millis(250),
            probe_cache_expiry: Duration::from_secs(5),
            function_poll_interval: Duration::from_millis(100),
            max_poll_count: 1000,
            set_scale_retries: 20,
            log_level: "info".to_string(),
            server_port: 8080,
            metrics_port: 8082,
        }
    }
}

impl Config {
    /// Reads configuration from an optional file, the default config path
    /// if present, and the process environment, in ascending priority.
    pub fn try_read(config_file_path: Option<PathBuf>) -> Result<Self, InitError> {
        let mut builder = config::Config::builder();

        if let Some(path) = config_file_path {
            builder = builder.add_source(config::File::from(path));
        } else if std::fs::exists(DEFAULT_CONFIG_PATH).unwrap_or(false) {
            builder =
                builder.add_source(config::File::from(PathBuf::from(DEFAULT_CONFIG_PATH)));
        }

        builder = builder.add_source(
            config::Environment::default()
                .try_parsing(true)
                .separator("__"),
        );

        let raw: serde_json::Value = builder.build()?.try_deserialize()?;
        let config: Config = serde_path_to_error::deserialize(raw)?;
        Ok(config)
    }

    /// Validates cross-field invariants that plain deserialization cannot
    /// express. Called once, right after [`Config::try_read`].
    pub fn validate(&self) -> Result<(), InitError> {
        match &self.functions_provider_url {
            None => {
                return Err(InitError::Validation(
                    "functions_provider_url is required".to_string(),
                ));
            }
            Some(url) if url.host().is_none() => {
                return Err(InitError::Validation(
                    "functions_provider_url must be an absolute URL with a host"
                        .to_string(),
                ));
            }
            Some(_) => {}
        }
        if self.direct_functions && self.direct_functions_suffix.is_empty() {
            return Err(InitError::Validation(
                "direct_functions_suffix must be set when direct_functions is enabled"
                    .to_string(),
            ));
        }
        if self.max_poll_count == 0 {
            return Err(InitError::Validation(
                "max_poll_count must be greater than zero".to_string(),
            ));
        }
        Ok(())
    }

    #[must_use]
    pub fn logs_provider_url(&self) -> Url {
        self.logs_provider_url
            .clone()
            .unwrap_or_else(|| self.provider_url())
    }

    /// The configured provider URL. Every path that builds an [`AppState`]
    /// calls [`Config::validate`] first, which fails startup when this is
    /// absent, so by the time anything reaches for it the value is
    /// guaranteed to be present.
    ///
    /// [`AppState`]: crate::state::AppState
    #[must_use]
    pub fn provider_url(&self) -> Url {
        self.functions_provider_url
            .clone()
            .expect("functions_provider_url validated as present before use")
    }
}
