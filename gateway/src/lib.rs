//! OpenFaaS-style function gateway: scale-from-zero admission control,
//! readiness probing, call-id propagation, and async invocation in front
//! of an opaque FaaS provider.

pub mod alert;
pub mod auth;
pub mod cache;
pub mod callid;
pub mod config;
pub mod error;
pub mod metrics;
pub mod notifier;
pub mod pipeline;
pub mod prober;
pub mod provider;
pub mod proxy;
pub mod queue;
pub mod router;
pub mod scaler;
pub mod state;
pub mod types;
pub mod ui;
pub mod utils;

pub use error::RuntimeError;
pub use state::AppState;
