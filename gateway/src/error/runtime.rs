//! Top-level error returned from `main`; covers everything that can fail
//! once startup validation has already passed.

use crate::error::init::InitError;

#[derive(Debug, thiserror::Error, displaydoc::Display)]
pub enum RuntimeError {
    /// gateway failed to initialize: {0}
    Init(#[from] InitError),
    /// server failed to bind or serve: {0}
    Serve(#[from] std::io::Error),
}
