//! Integration test for the async invocation path: enqueue preserves call
//! metadata and callback headers, and responds 202 without waiting on the
//! queue backend.

use std::sync::Arc;

use axum::body::Body;
use axum::http::{Request, StatusCode};
use gateway::config::Config;
use gateway::queue::RecordingQueue;
use gateway::state::AppState;
use tower::ServiceExt;

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

#[tokio::test]
async fn async_enqueue_preserves_call_id_body_and_callback() {
    let (url, mock) = spawn_mock().await;
    mock.seed("openfaas-fn", "work", 1, 5, 1, 1, None);

    let config = Config {
        functions_provider_url: Some(url),
        ..Config::default()
    };
    let base_state = AppState::new(config).await.unwrap();
    let queue = Arc::new(RecordingQueue::default());
    let state = base_state.with_queue(queue.clone());
    let app = gateway::router::build(state);

    let response = app
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/async-function/work")
                .header("x-call-id", "fixed-call-id")
                .header("x-callback-url", "http://cb/")
                .body(Body::from(r#"{"x":1}"#))
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::ACCEPTED);

    let messages = queue.0.lock().unwrap();
    assert_eq!(messages.len(), 1);
    let message = &messages[0];
    assert_eq!(message.call_id, "fixed-call-id");
    assert_eq!(message.function_name, "work");
    assert_eq!(message.body, br#"{"x":1}"#);
    assert_eq!(message.callback_url.as_deref(), Some("http://cb/"));
}

#[tokio::test]
async fn async_route_reports_503_when_no_queue_configured() {
    let (url, mock) = spawn_mock().await;
    mock.seed("openfaas-fn", "work", 1, 5, 1, 1, None);

    let config = Config {
        functions_provider_url: Some(url),
        faas_nats_address: String::new(),
        ..Config::default()
    };
    let state = AppState::new(config).await.unwrap();
    let app = gateway::router::build(state);

    let response = app
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/async-function/work")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
}

#[tokio::test]
async fn async_enqueue_against_unknown_function_yields_404() {
    let (url, _mock) = spawn_mock().await;

    let config = Config {
        functions_provider_url: Some(url),
        ..Config::default()
    };
    let base_state = AppState::new(config).await.unwrap();
    let queue = Arc::new(RecordingQueue::default());
    let state = base_state.with_queue(queue.clone());
    let app = gateway::router::build(state);

    let response = app
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/async-function/nope")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    assert!(queue.0.lock().unwrap().is_empty());
}
