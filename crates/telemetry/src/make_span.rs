//! `tower_http::trace::MakeSpan` implementation that gives every HTTP
//! request its own span, tagged with the call id once one has been
//! assigned.

use http::Request;
use tower_http::trace::MakeSpan;
use tracing::Level;

#[derive(Debug, Clone, Copy)]
pub struct SpanFactory {
    level: Level,
    propagate: bool,
}

impl SpanFactory {
    #[must_use]
    pub fn new(level: Level, propagate: bool) -> Self {
        Self { level, propagate }
    }
}

impl<B> MakeSpan<B> for SpanFactory {
    fn make_span(&mut self, request: &Request<B>) -> tracing::Span {
        let call_id = request
            .headers()
            .get(crate::request_id::CALL_ID_HEADER)
            .and_then(|v| v.to_str().ok())
            .unwrap_or_default();

        macro_rules! make {
            ($level:expr) => {
                tracing::span!(
                    $level,
                    "request",
                    method = %request.method(),
                    uri = %request.uri(),
                    call_id = call_id,
                    propagate = self.propagate,
                )
            };
        }

        match self.level {
            Level::TRACE => make!(Level::TRACE),
            Level::DEBUG => make!(Level::DEBUG),
            Level::INFO => make!(Level::INFO),
            Level::WARN => make!(Level::WARN),
            Level::ERROR => make!(Level::ERROR),
        }
    }
}
