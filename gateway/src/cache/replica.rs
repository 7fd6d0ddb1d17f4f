use std::time::Duration;

use moka::future::Cache;

use crate::types::function::{FunctionIdentity, FunctionStatus};

/// Caches the most recently observed [`FunctionStatus`] per function.
///
/// Entries expire `cacheExpiry` after insertion (moka's time-to-live),
/// which is exactly the freshness window the scaler checks on its
/// cache-fast path. No single-flight happens here: a cache miss does not
/// always warrant a fetch, and deciding that is the scaler's job.
#[derive(Debug, Clone)]
pub struct ReplicaCache {
    inner: Cache<FunctionIdentity, FunctionStatus>,
}

impl ReplicaCache {
    #[must_use]
    pub fn new(expiry: Duration) -> Self {
        let inner = Cache::builder().time_to_live(expiry).build();
        Self { inner }
    }

    /// Returns the cached status along with whether it is still fresh. A
    /// missing entry is reported as `(FunctionStatus::default(), false)`
    /// rather than `None`, matching the always-a-status contract the
    /// scaler relies on.
    pub async fn get(&self, identity: &FunctionIdentity) -> (FunctionStatus, bool) {
        match self.inner.get(identity).await {
            Some(status) => (status, true),
            None => (FunctionStatus::default(), false),
        }
    }

    pub async fn set(&self, identity: FunctionIdentity, status: FunctionStatus) {
        self.inner.insert(identity, status).await;
    }
}
