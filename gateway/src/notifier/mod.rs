//! Side-channel consumers of the forwarding proxy's request lifecycle.
//! Every registered notifier sees every completed forward, success or
//! failure alike; none of them can affect the response.

use std::sync::Arc;
use std::time::Duration;

use axum::http::StatusCode;

use crate::metrics::Metrics;
use crate::types::function::FunctionIdentity;

#[derive(Debug, Clone)]
pub struct InvocationEvent {
    pub function: FunctionIdentity,
    pub call_id: String,
    pub status: StatusCode,
    pub duration: Duration,
}

pub trait Notifier: Send + Sync {
    fn notify(&self, event: &InvocationEvent);
}

#[derive(Debug, Clone, Copy, Default)]
pub struct LoggingNotifier;

impl Notifier for LoggingNotifier {
    fn notify(&self, event: &InvocationEvent) {
        tracing::info!(
            function = %event.function,
            call_id = %event.call_id,
            status = event.status.as_u16(),
            duration_ms = event.duration.as_secs_f64() * 1000.0,
            "invocation forwarded"
        );
    }
}

#[derive(Clone)]
pub struct MetricsNotifier {
    metrics: Metrics,
}

impl MetricsNotifier {
    #[must_use]
    pub fn new(metrics: Metrics) -> Self {
        Self { metrics }
    }
}

impl Notifier for MetricsNotifier {
    fn notify(&self, event: &InvocationEvent) {
        self.metrics
            .record_invocation(&event.function, event.status, event.duration);
    }
}

/// Fans an [`InvocationEvent`] out to every registered notifier. Assembled
/// once at startup from [`crate::state::AppState::new`]; the list never
/// changes afterwards.
#[derive(Clone, Default)]
pub struct NotifierFabric {
    notifiers: Vec<Arc<dyn Notifier>>,
}

impl NotifierFabric {
    #[must_use]
    pub fn new(notifiers: Vec<Arc<dyn Notifier>>) -> Self {
        Self { notifiers }
    }

    pub fn notify(&self, event: InvocationEvent) {
        for notifier in &self.notifiers {
            notifier.notify(&event);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    #[derive(Default)]
    struct RecordingNotifier(Mutex<Vec<StatusCode>>);

    impl Notifier for RecordingNotifier {
        fn notify(&self, event: &InvocationEvent) {
            self.0.lock().unwrap().push(event.status);
        }
    }

    fn identity() -> FunctionIdentity {
        FunctionIdentity::new("openfaas-fn", "echo", "openfaas-fn").unwrap()
    }

    #[test]
    fn fans_out_to_every_registered_notifier() {
        let a = Arc::new(RecordingNotifier::default());
        let b = Arc::new(RecordingNotifier::default());
        let fabric = NotifierFabric::new(vec![a.clone(), b.clone()]);

        fabric.notify(InvocationEvent {
            function: identity(),
            call_id: "abc".to_string(),
            status: StatusCode::OK,
            duration: Duration::from_millis(1),
        });

        assert_eq!(a.0.lock().unwrap().len(), 1);
        assert_eq!(b.0.lock().unwrap().len(), 1);
    }

    #[test]
    fn empty_fabric_notifies_no_one_without_panicking() {
        let fabric = NotifierFabric::default();
        fabric.notify(InvocationEvent {
            function: identity(),
            call_id: "abc".to_string(),
            status: StatusCode::BAD_GATEWAY,
            duration: Duration::from_millis(1),
        });
    }
}
