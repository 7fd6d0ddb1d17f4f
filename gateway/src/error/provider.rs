//! Errors surfaced by the service query adapter and consumed by the
//! scaler, prober, and alert handler.

#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error, displaydoc::Display)]
pub enum ProviderError {
    /// function not found
    NotFound,
    /// provider unavailable
    Unavailable,
}
