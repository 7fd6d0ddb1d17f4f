//! Assembles the per-invocation pipeline: scale-from-zero, then readiness
//! probing, then forwarding. Stages are resolved once at startup from the
//! config flags that enable or disable them and run in a fixed order
//! thereafter.

use std::sync::Arc;

use async_trait::async_trait;
use axum::extract::Request;
use axum::response::Response;

use crate::error::api::ApiError;
use crate::prober::Prober;
use crate::proxy::ForwardingProxy;
use crate::scaler::{ScaleOutcome, Scaler};
use crate::types::function::FunctionIdentity;

/// One step of the invocation pipeline. A stage either short-circuits with
/// an error response, or lets the request continue to the next stage.
#[async_trait]
pub trait Stage: Send + Sync {
    fn name(&self) -> &'static str;

    async fn run(&self, identity: &FunctionIdentity, request: Request) -> Result<Request, ApiError>;
}

pub struct ScaleStage {
    scaler: Scaler,
}

impl ScaleStage {
    #[must_use]
    pub fn new(scaler: Scaler) -> Self {
        Self { scaler }
    }
}

#[async_trait]
impl Stage for ScaleStage {
    fn name(&self) -> &'static str {
        "scale"
    }

    async fn run(&self, identity: &FunctionIdentity, request: Request) -> Result<Request, ApiError> {
        match self.scaler.scale(identity).await? {
            ScaleOutcome::Ok => Ok(request),
            ScaleOutcome::Timeout => Err(ApiError::ScaleTimeout(identity.to_string())),
        }
    }
}

pub struct ProbeStage {
    prober: Prober,
}

impl ProbeStage {
    #[must_use]
    pub fn new(prober: Prober) -> Self {
        Self { prober }
    }
}

#[async_trait]
impl Stage for ProbeStage {
    fn name(&self) -> &'static str {
        "probe"
    }

    async fn run(&self, identity: &FunctionIdentity, request: Request) -> Result<Request, ApiError> {
        match self.prober.probe(identity).await {
            crate::cache::probe::ProbeOutcome::Ready => Ok(request),
            crate::cache::probe::ProbeOutcome::NotReady => Err(ApiError::UpstreamUnavailable),
        }
    }
}

/// Ordered chain of stages run before a request reaches the forwarding
/// proxy. Built once from config in [`crate::state::AppState::new`].
#[derive(Clone)]
pub struct Pipeline {
    stages: Arc<Vec<Arc<dyn Stage>>>,
}

impl Pipeline {
    #[must_use]
    pub fn assemble(scale_from_zero: bool, probe_functions: bool, scaler: Scaler, prober: Prober) -> Self {
        let mut stages: Vec<Arc<dyn Stage>> = Vec::new();
        if scale_from_zero {
            stages.push(Arc::new(ScaleStage::new(scaler)));
        }
        if probe_functions {
            stages.push(Arc::new(ProbeStage::new(prober)));
        }
        Self {
            stages: Arc::new(stages),
        }
    }

    #[must_use]
    pub fn stage_names(&self) -> Vec<&'static str> {
        self.stages.iter().map(|stage| stage.name()).collect()
    }

    /// Runs every stage in order, then hands the request to `proxy`. A
    /// stage error short-circuits the chain and is returned directly; the
    /// forwarding stage always runs last and is not itself a [`Stage`]
    /// since it never fails the same way (it synthesizes its own error
    /// response instead of short-circuiting).
    pub async fn run(
        &self,
        identity: &FunctionIdentity,
        call_id: &str,
        mut request: Request,
        proxy: &ForwardingProxy,
    ) -> Response {
        for stage in self.stages.iter() {
            match stage.run(identity, request).await {
                Ok(next) => request = next,
                Err(error) => return axum::response::IntoResponse::into_response(error),
            }
        }
        proxy.forward_function(identity, call_id, request).await
    }
}
