//! Call-id generation, shared between the tracing span factory and the
//! gateway's own call-id pipeline stage.

use http::{HeaderValue, Request};
use tower_http::request_id::{MakeRequestId, RequestId};
use uuid::Uuid;

pub const CALL_ID_HEADER: &str = "x-call-id";

#[derive(Debug, Clone, Copy, Default)]
pub struct MakeCallId;

impl MakeRequestId for MakeCallId {
    fn make_request_id<B>(&mut self, _request: &Request<B>) -> Option<RequestId> {
        let id = Uuid::new_v4().to_string();
        HeaderValue::from_str(&id).ok().map(RequestId::new)
    }
}

#[must_use]
pub fn new_call_id() -> String {
    Uuid::new_v4().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn generates_non_empty_unique_ids() {
        let a = new_call_id();
        let b = new_call_id();
        assert!(!a.is_empty());
        assert_ne!(a, b);
    }
}
