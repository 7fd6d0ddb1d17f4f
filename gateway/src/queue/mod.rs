//! Async invocation path: `POST /async-function/<name>` validates the
//! function exists, builds a [`QueueMessage`] preserving call metadata, and
//! hands it to whatever [`AsyncQueue`] is configured.

#[cfg(feature = "nats")]
pub mod nats;

use std::collections::HashMap;

use async_trait::async_trait;
use axum::extract::{Path, Request, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use http_body_util::BodyExt;
use serde::{Deserialize, Serialize};

use crate::error::api::ApiError;
use crate::error::provider::ProviderError;
use crate::provider::ProviderClient;
use crate::state::AppState;
use crate::types::function::FunctionIdentity;

pub const CALLBACK_URL_HEADER: &str = "x-callback-url";

/// What gets handed to the message bus for out-of-band delivery. Carries
/// everything a worker needs to replay the call and post the result back to
/// `callback_url`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueueMessage {
    pub call_id: String,
    pub function_name: String,
    pub namespace: String,
    pub path: String,
    pub method: String,
    #[serde(default)]
    pub query_string: String,
    pub body: Vec<u8>,
    pub headers: HashMap<String, String>,
    pub callback_url: Option<String>,
}

#[async_trait]
pub trait AsyncQueue: Send + Sync {
    async fn enqueue(&self, message: QueueMessage) -> Result<(), ApiError>;
}

/// Confirms a function exists before it is enqueued, so an unknown function
/// name fails fast with 404 rather than silently vanishing into the queue.
pub async fn ensure_function_exists(
    provider: &ProviderClient,
    identity: &FunctionIdentity,
) -> Result<(), ApiError> {
    match provider.get_replicas(identity).await {
        Ok(_) => Ok(()),
        Err(ProviderError::NotFound) => Err(ApiError::NotFound(identity.to_string())),
        Err(ProviderError::Unavailable) => Err(ApiError::UpstreamUnavailable),
    }
}

pub async fn handle_async_invoke(
    State(state): State<AppState>,
    Path(params): Path<HashMap<String, String>>,
    request: Request,
) -> Result<Response, ApiError> {
    let raw_name = params
        .get("name")
        .ok_or_else(|| ApiError::BadRequest("missing function name".to_string()))?;
    let identity = FunctionIdentity::from_path_segment(raw_name, state.default_namespace())?;
    ensure_function_exists(state.provider(), &identity).await?;

    let queue = state.queue().ok_or(ApiError::QueueUnavailable)?;
    let call_id = crate::callid::call_id_from_request(&request);

    let (parts, body) = request.into_parts();
    let body_bytes = body
        .collect()
        .await
        .map_err(|error| ApiError::BadRequest(error.to_string()))?
        .to_bytes();

    let callback_url = parts
        .headers
        .get(CALLBACK_URL_HEADER)
        .and_then(|value| value.to_str().ok())
        .map(str::to_string);

    let headers = parts
        .headers
        .iter()
        .filter_map(|(name, value)| {
            value
                .to_str()
                .ok()
                .map(|value| (name.to_string(), value.to_string()))
        })
        .collect();

    let message = QueueMessage {
        call_id,
        function_name: identity.name.clone(),
        namespace: identity.namespace.clone(),
        path: parts.uri.path().to_string(),
        method: parts.method.to_string(),
        query_string: parts.uri.query().unwrap_or_default().to_string(),
        body: body_bytes.to_vec(),
        headers,
        callback_url,
    };

    queue.enqueue(message).await?;
    Ok(StatusCode::ACCEPTED.into_response())
}

/// An [`AsyncQueue`] that records every message it receives instead of
/// publishing anywhere. Used by integration tests that exercise the async
/// invocation path without a live NATS server.
#[derive(Default)]
pub struct RecordingQueue(pub std::sync::Mutex<Vec<QueueMessage>>);

#[async_trait]
impl AsyncQueue for RecordingQueue {
    async fn enqueue(&self, message: QueueMessage) -> Result<(), ApiError> {
        self.0.lock().unwrap().push(message);
        Ok(())
    }
}

/// An [`AsyncQueue`] that always reports an enqueue failure.
#[derive(Default)]
pub struct FailingQueue;

#[async_trait]
impl AsyncQueue for FailingQueue {
    async fn enqueue(&self, _message: QueueMessage) -> Result<(), ApiError> {
        Err(ApiError::EnqueueFailed("queue unreachable".to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn recording_queue_captures_message() {
        let queue = RecordingQueue::default();
        queue
            .enqueue(QueueMessage {
                call_id: "abc".to_string(),
                function_name: "echo".to_string(),
                namespace: "openfaas-fn".to_string(),
                path: "/async-function/echo".to_string(),
                method: "POST".to_string(),
                query_string: String::new(),
                body: b"hi".to_vec(),
                headers: HashMap::new(),
                callback_url: Some("http://cb/".to_string()),
            })
            .await
            .unwrap();
        assert_eq!(queue.0.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn failing_queue_reports_enqueue_failed() {
        let queue = FailingQueue;
        let result = queue
            .enqueue(QueueMessage {
                call_id: String::new(),
                function_name: "echo".to_string(),
                namespace: "openfaas-fn".to_string(),
                path: String::new(),
                method: "POST".to_string(),
                query_string: String::new(),
                body: Vec::new(),
                headers: HashMap::new(),
                callback_url: None,
            })
            .await;
        assert!(matches!(result, Err(ApiError::EnqueueFailed(_))));
    }
}
