pub mod function;

pub use function::{FunctionIdentity, FunctionStatus, ScaleTarget};

/// Process-unique opaque identifier threaded through an invocation.
///
/// Trusted verbatim from the client's `X-Call-Id` header when present;
/// otherwise generated fresh by the gateway.
pub type CallId = String;
