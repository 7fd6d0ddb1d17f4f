use std::future::Future;
use std::hash::Hash;
use std::sync::Mutex;

use rustc_hash::FxHashMap as HashMap;
use tokio::sync::broadcast;

/// Deduplicates concurrent calls keyed by `K`: the first caller for a key
/// runs the future to completion and broadcasts its result; callers that
/// arrive while one is already in flight wait on the same outcome instead
/// of running their own.
///
/// Grounded on the request-coalescing pattern (`golang.org/x/sync/singleflight`
/// under another name): a map from key to a one-shot broadcast sender,
/// guarded by a plain mutex held only across the check-and-insert, never
/// across the awaited work itself.
pub struct SingleFlight<K, V> {
    in_flight: Mutex<HashMap<K, broadcast::Sender<V>>>,
}

impl<K, V> SingleFlight<K, V>
where
    K: Eq + Hash + Clone,
    V: Clone,
{
    pub fn new() -> Self {
        Self {
            in_flight: Mutex::new(HashMap::default()),
        }
    }

    pub async fn run<F>(&self, key: K, fut: F) -> V
    where
        F: Future<Output = V>,
    {
        let joined = {
            let mut guard = self.in_flight.lock().expect("singleflight mutex poisoned");
            match guard.get(&key) {
                Some(sender) => Some(sender.subscribe()),
                None => {
                    let (tx, _rx) = broadcast::channel(1);
                    guard.insert(key.clone(), tx);
                    None
                }
            }
        };

        if let Some(mut rx) = joined {
            return rx
                .recv()
                .await
                .expect("leader always broadcasts a result before removing the entry");
        }

        let result = fut.await;

        let mut guard = self.in_flight.lock().expect("singleflight mutex poisoned");
        if let Some(sender) = guard.remove(&key) {
            // Err means no followers subscribed; nothing to notify.
            let _ = sender.send(result.clone());
        }
        result
    }
}

impl<K, V> Default for SingleFlight<K, V>
where
    K: Eq + Hash + Clone,
    V: Clone,
{
    fn default() -> Self {
        Self::new()
    }
}
