//! Errors that can occur while assembling the application at startup.
//! None of these are recoverable: a failure here aborts the process
//! before it binds a socket.

use crate::types::function::InvalidFunctionName;

#[derive(Debug, thiserror::Error, displaydoc::Display)]
pub enum InitError {
    /// failed to read configuration: {0}
    Config(#[from] config::ConfigError),
    /// configuration deserialization error: {0}
    ConfigDeserialize(#[from] serde_path_to_error::Error<serde_json::Error>),
    /// invalid configuration: {0}
    Validation(String),
    /// failed to build http client: {0}
    HttpClient(#[from] reqwest::Error),
    /// invalid function name in configuration: {0}
    FunctionName(#[from] InvalidFunctionName),
    /// failed to connect to nats at {0}: {1}
    #[cfg(feature = "nats")]
    Nats(String, #[source] async_nats::ConnectError),
    /// failed to bind metrics registry: {0}
    Metrics(#[from] prometheus::Error),
    /// failed to read secret mount path {0}: {1}
    Secret(std::path::PathBuf, #[source] std::io::Error),
    /// failed to initialize telemetry: {0}
    Telemetry(#[from] telemetry::Error),
}
