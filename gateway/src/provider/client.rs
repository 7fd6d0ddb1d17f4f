use std::path::Path;

use reqwest::StatusCode;
use serde::Serialize;
use url::Url;

use crate::config::Config;
use crate::error::init::InitError;
use crate::error::provider::ProviderError;
use crate::types::function::{FunctionIdentity, FunctionStatus, ScaleTarget};

/// Credentials injected on every request to the provider when basic auth is
/// configured, read once from the secret mount at startup.
#[derive(Debug, Clone)]
pub struct BasicAuthCredentials {
    pub user: String,
    pub password: String,
}

impl BasicAuthCredentials {
    pub fn read_from(mount_path: &Path) -> Result<Self, InitError> {
        let user = read_secret(mount_path, "basic-auth-user")?;
        let password = read_secret(mount_path, "basic-auth-password")?;
        Ok(Self { user, password })
    }
}

fn read_secret(mount_path: &Path, file: &str) -> Result<String, InitError> {
    let path = mount_path.join(file);
    std::fs::read_to_string(&path)
        .map(|s| s.trim().to_string())
        .map_err(|source| InitError::Secret(path, source))
}

#[derive(Serialize)]
struct SetReplicasRequest {
    #[serde(rename = "serviceName")]
    service_name: String,
    replicas: u32,
}

/// Thin wrapper over the provider's `/system/function` and
/// `/system/scale-function` endpoints. Injects basic-auth credentials when
/// configured and never retries; retry policy belongs to the caller.
#[derive(Debug, Clone)]
pub struct ProviderClient {
    http: reqwest::Client,
    base_url: Url,
    credentials: Option<BasicAuthCredentials>,
}

impl ProviderClient {
    pub fn new(config: &Config) -> Result<Self, InitError> {
        let http = reqwest::Client::builder()
            .pool_max_idle_per_host(config.max_idle_conns_per_host)
            .timeout(config.upstream_timeout)
            .tcp_nodelay(true)
            .build()?;

        let credentials = if config.basic_auth {
            Some(BasicAuthCredentials::read_from(&config.secret_mount_path)?)
        } else {
            None
        };

        Ok(Self {
            http,
            base_url: config.provider_url(),
            credentials,
        })
    }

    fn authenticate(&self, builder: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        match &self.credentials {
            Some(creds) => builder.basic_auth(&creds.user, Some(&creds.password)),
            None => builder,
        }
    }

    pub async fn get_replicas(
        &self,
        identity: &FunctionIdentity,
    ) -> Result<FunctionStatus, ProviderError> {
        let url = self
            .base_url
            .join(&format!("system/function/{}", identity.name))
            .map_err(|_| ProviderError::Unavailable)?;

        let request = self
            .http
            .get(url)
            .query(&[("namespace", identity.namespace.as_str())]);
        let response = self
            .authenticate(request)
            .send()
            .await
            .map_err(|_| ProviderError::Unavailable)?;

        match response.status() {
            StatusCode::NOT_FOUND => Err(ProviderError::NotFound),
            status if status.is_success() => response
                .json::<FunctionStatus>()
                .await
                .map_err(|_| ProviderError::Unavailable),
            _ => Err(ProviderError::Unavailable),
        }
    }

    pub async fn set_replicas(&self, target: &ScaleTarget) -> Result<(), ProviderError> {
        let url = self
            .base_url
            .join(&format!("system/scale-function/{}", target.identity.name))
            .map_err(|_| ProviderError::Unavailable)?;

        let body = SetReplicasRequest {
            service_name: target.identity.name.clone(),
            replicas: target.replicas,
        };
        let request = self
            .http
            .post(url)
            .query(&[("namespace", target.identity.namespace.as_str())])
            .json(&body);
        let response = self
            .authenticate(request)
            .send()
            .await
            .map_err(|_| ProviderError::Unavailable)?;

        match response.status() {
            StatusCode::NOT_FOUND => Err(ProviderError::NotFound),
            status if status.is_success() => Ok(()),
            _ => Err(ProviderError::Unavailable),
        }
    }
}
