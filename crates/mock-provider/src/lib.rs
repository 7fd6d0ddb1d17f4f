//! A minimal stand-in for the FaaS provider's `/system/...` API, used by
//! the gateway's integration tests instead of a real orchestrator.
//!
//! Functions are seeded up front with [`MockProvider::seed`]. Each one
//! tracks how many `SetReplicas` calls it has received and how many
//! subsequent `GetReplicas` polls must occur before `availableReplicas`
//! catches up to `replicas` — this lets tests exercise the gateway's
//! cold-start poll loop, including the timeout path, deterministically.

use std::collections::HashMap;
use std::sync::Arc;

use axum::{
    Json, Router,
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct FunctionStatus {
    pub name: String,
    #[serde(default)]
    pub namespace: String,
    pub replicas: u32,
    pub available_replicas: u32,
    pub min_replicas: u32,
    pub max_replicas: u32,
    #[serde(default)]
    pub annotations: HashMap<String, String>,
}

#[derive(Debug, Clone)]
struct Record {
    status: FunctionStatus,
    /// Number of `GetReplicas` polls remaining before `available_replicas`
    /// catches up to `replicas`. `None` means it never catches up
    /// (used to exercise the scaler's timeout path).
    polls_until_ready: Option<u32>,
    scale_calls: u32,
}

#[derive(Clone, Default)]
pub struct MockProvider {
    functions: Arc<Mutex<HashMap<(String, String), Record>>>,
}

#[derive(Debug, Deserialize)]
struct NamespaceQuery {
    #[serde(default)]
    namespace: String,
}

#[derive(Debug, Deserialize)]
struct ScaleRequest {
    replicas: u32,
}

impl MockProvider {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed a function. `polls_until_ready` controls how many
    /// `GetReplicas` calls after a scale-up are needed before the
    /// function reports itself available; `None` means it never becomes
    /// available.
    pub fn seed(
        &self,
        namespace: &str,
        name: &str,
        min_replicas: u32,
        max_replicas: u32,
        replicas: u32,
        available_replicas: u32,
        polls_until_ready: Option<u32>,
    ) {
        let key = (namespace.to_string(), name.to_string());
        self.functions.lock().insert(
            key,
            Record {
                status: FunctionStatus {
                    name: name.to_string(),
                    namespace: namespace.to_string(),
                    replicas,
                    available_replicas,
                    min_replicas,
                    max_replicas,
                    annotations: HashMap::new(),
                },
                polls_until_ready,
                scale_calls: 0,
            },
        );
    }

    #[must_use]
    pub fn scale_calls(&self, namespace: &str, name: &str) -> u32 {
        self.functions
            .lock()
            .get(&(namespace.to_string(), name.to_string()))
            .map_or(0, |r| r.scale_calls)
    }

    /// Current status of a seeded function, as it would be returned by
    /// `GET /system/function/{name}` without advancing its poll counter.
    #[must_use]
    pub fn status(&self, namespace: &str, name: &str) -> FunctionStatus {
        self.functions
            .lock()
            .get(&(namespace.to_string(), name.to_string()))
            .map(|r| r.status.clone())
            .unwrap_or_default()
    }

    #[must_use]
    pub fn router(self) -> Router {
        Router::new()
            .route("/system/function/{name}", get(get_function))
            .route("/system/scale-function/{name}", post(scale_function))
            .route("/function/{name}", get(invoke).post(invoke))
            .route("/function/{name}/", get(invoke).post(invoke))
            .route("/_/ready", get(|| async { StatusCode::OK }))
            .with_state(self)
    }
}

async fn get_function(
    State(provider): State<MockProvider>,
    Path(name): Path<String>,
    Query(q): Query<NamespaceQuery>,
) -> impl IntoResponse {
    let key = (q.namespace, name);
    let mut functions = provider.functions.lock();
    let Some(record) = functions.get_mut(&key) else {
        return StatusCode::NOT_FOUND.into_response();
    };

    if record.status.available_replicas < record.status.replicas {
        match record.polls_until_ready {
            Some(0) => record.status.available_replicas = record.status.replicas,
            Some(ref mut remaining) => *remaining -= 1,
            None => {}
        }
    }

    Json(record.status.clone()).into_response()
}

async fn scale_function(
    State(provider): State<MockProvider>,
    Path(name): Path<String>,
    Query(q): Query<NamespaceQuery>,
    Json(body): Json<ScaleRequest>,
) -> impl IntoResponse {
    let key = (q.namespace, name);
    let mut functions = provider.functions.lock();
    let Some(record) = functions.get_mut(&key) else {
        return StatusCode::NOT_FOUND;
    };
    record.scale_calls += 1;
    record.status.replicas = body.replicas;
    if body.replicas == 0 {
        record.status.available_replicas = 0;
    }
    StatusCode::ACCEPTED
}

async fn invoke(
    State(provider): State<MockProvider>,
    Path(name): Path<String>,
    Query(q): Query<NamespaceQuery>,
    body: axum::body::Bytes,
) -> impl IntoResponse {
    let key = (q.namespace, name.clone());
    let functions = provider.functions.lock();
    if !functions.contains_key(&key) {
        return (StatusCode::NOT_FOUND, Vec::new()).into_response();
    }
    (StatusCode::OK, body.to_vec()).into_response()
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::Request;
    use tower::ServiceExt;

    #[tokio::test]
    async fn unknown_function_returns_404() {
        let provider = MockProvider::new();
        let app = provider.router();
        let response = app
            .oneshot(
                Request::builder()
                    .uri("/system/function/nope")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn scale_then_poll_converges_after_n_polls() {
        let provider = MockProvider::new();
        provider.seed("openfaas-fn", "echo", 0, 5, 0, 0, Some(2));
        let app = provider.clone().router();

        let scale = app
            .clone()
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri("/system/scale-function/echo?namespace=openfaas-fn")
                    .header("content-type", "application/json")
                    .body(Body::from(r#"{"replicas":1}"#))
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(scale.status(), StatusCode::ACCEPTED);
        assert_eq!(provider.scale_calls("openfaas-fn", "echo"), 1);

        for _ in 0..2 {
            let poll = app
                .clone()
                .oneshot(
                    Request::builder()
                        .uri("/system/function/echo?namespace=openfaas-fn")
                        .body(Body::empty())
                        .unwrap(),
                )
                .await
                .unwrap();
            assert_eq!(poll.status(), StatusCode::OK);
        }

        let poll = app
            .oneshot(
                Request::builder()
                    .uri("/system/function/echo?namespace=openfaas-fn")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        let bytes = axum::body::to_bytes(poll.into_body(), usize::MAX)
            .await
            .unwrap();
        let status: FunctionStatus = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(status.available_replicas, 1);
    }
}
