//! Call-id extraction shared by the invocation pipeline and the async
//! queue adapter. The id itself is assigned by the `x-call-id`
//! request-id middleware registered in [`crate::router`]; this just reads
//! it back out of the request the middleware already stamped.

use axum::extract::Request;
use telemetry::request_id::CALL_ID_HEADER;

#[must_use]
pub fn call_id_from_request(request: &Request) -> String {
    request
        .headers()
        .get(CALL_ID_HEADER)
        .and_then(|value| value.to_str().ok())
        .unwrap_or_default()
        .to_string()
}
