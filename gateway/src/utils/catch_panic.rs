//! Converts a handler panic into a plain 500 response instead of tearing
//! down the whole connection, via [`tower_http::catch_panic::CatchPanicLayer`].

use std::any::Any;

use axum::body::Body;
use axum::response::IntoResponse;
use http::Response;
use tower_http::catch_panic::ResponseForPanic;

use crate::error::api::ApiError;

#[derive(Debug, Clone, Copy, Default)]
pub struct PanicResponder;

impl ResponseForPanic for PanicResponder {
    type ResponseBody = Body;

    fn response_for_panic(
        &mut self,
        panic: Box<dyn Any + Send + 'static>,
    ) -> Response<Self::ResponseBody> {
        let details = if let Some(message) = panic.downcast_ref::<String>() {
            message.clone()
        } else if let Some(message) = panic.downcast_ref::<&str>() {
            (*message).to_string()
        } else {
            "handler panicked".to_string()
        };
        ApiError::Internal(details).into_response()
    }
}
