use std::time::Duration;

use moka::future::Cache;

use crate::types::function::FunctionIdentity;

/// Whether a probe observed a function accepting traffic.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProbeOutcome {
    Ready,
    NotReady,
}

/// Caches probe outcomes, both `Ready` and `NotReady`, for `probeCacheExpiry`
/// so a burst of invocations for the same warm function doesn't re-probe it
/// on every request.
#[derive(Debug, Clone)]
pub struct ProbeCache {
    inner: Cache<FunctionIdentity, ProbeOutcome>,
}

impl ProbeCache {
    #[must_use]
    pub fn new(expiry: Duration) -> Self {
        let inner = Cache::builder().time_to_live(expiry).build();
        Self { inner }
    }

    pub async fn get(&self, identity: &FunctionIdentity) -> Option<ProbeOutcome> {
        self.inner.get(identity).await
    }

    pub async fn set(&self, identity: FunctionIdentity, outcome: ProbeOutcome) {
        self.inner.insert(identity, outcome).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn identity() -> FunctionIdentity {
        FunctionIdentity::new("openfaas-fn", "echo", "openfaas-fn").unwrap()
    }

    #[tokio::test]
    async fn missing_entry_returns_none() {
        let cache = ProbeCache::new(Duration::from_secs(5));
        assert_eq!(cache.get(&identity()).await, None);
    }

    #[tokio::test]
    async fn caches_both_outcomes() {
        let cache = ProbeCache::new(Duration::from_secs(5));
        cache.set(identity(), ProbeOutcome::NotReady).await;
        assert_eq!(cache.get(&identity()).await, Some(ProbeOutcome::NotReady));
        cache.set(identity(), ProbeOutcome::Ready).await;
        assert_eq!(cache.get(&identity()).await, Some(ProbeOutcome::Ready));
    }
}
