use reqwest::StatusCode;

use crate::cache::probe::ProbeOutcome;
use crate::cache::ProbeCache;
use crate::proxy::resolver::UrlResolver;
use crate::types::function::FunctionIdentity;

/// Guards against the gap between a replica being reported "running" by the
/// provider and it actually accepting traffic. Runs after the scaler, so by
/// the time it executes the function has at least one declared-running
/// replica.
#[derive(Clone)]
pub struct Prober {
    http: reqwest::Client,
    cache: ProbeCache,
    resolver: UrlResolver,
}

impl Prober {
    #[must_use]
    pub fn new(http: reqwest::Client, cache: ProbeCache, resolver: UrlResolver) -> Self {
        Self {
            http,
            cache,
            resolver,
        }
    }

    pub async fn probe(&self, identity: &FunctionIdentity) -> ProbeOutcome {
        if let Some(cached) = self.cache.get(identity).await {
            return cached;
        }

        let base = self.resolver.resolve(identity);
        let outcome = self.issue_probe(&base).await;
        self.cache.set(identity.clone(), outcome).await;
        outcome
    }

    async fn issue_probe(&self, base: &reqwest::Url) -> ProbeOutcome {
        let ready_url = match base.join("_/ready") {
            Ok(url) => url,
            Err(_) => return ProbeOutcome::NotReady,
        };

        match self.http.get(ready_url).send().await {
            Ok(response) if is_ready_status(response.status()) => ProbeOutcome::Ready,
            Ok(_) | Err(_) => match self.http.head(base.clone()).send().await {
                Ok(response) if is_ready_status(response.status()) => ProbeOutcome::Ready,
                _ => ProbeOutcome::NotReady,
            },
        }
    }
}

fn is_ready_status(status: StatusCode) -> bool {
    (200..400).contains(&status.as_u16())
}
