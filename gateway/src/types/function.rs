use std::collections::HashMap;
use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Serialize};

static NAME_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[-A-Za-z0-9_.]+$").expect("valid regex"));

/// A function's address within the provider: `(namespace, name)`.
///
/// `namespace` is never empty once constructed via [`FunctionIdentity::new`]
/// — an empty namespace on the wire is substituted with the gateway's
/// configured default namespace.
#[derive(Debug, Clone, PartialEq, Eq, Hash, derive_more::Display)]
#[display("{namespace}/{name}")]
pub struct FunctionIdentity {
    pub namespace: String,
    pub name: String,
}

impl FunctionIdentity {
    /// Builds an identity, substituting `default_namespace` when `namespace`
    /// is empty and rejecting names outside `[-A-Za-z0-9_.]+`.
    pub fn new(
        namespace: &str,
        name: &str,
        default_namespace: &str,
    ) -> Result<Self, InvalidFunctionName> {
        if name.is_empty() || !NAME_REGEX.is_match(name) {
            return Err(InvalidFunctionName(name.to_string()));
        }
        let namespace = if namespace.is_empty() {
            default_namespace.to_string()
        } else {
            namespace.to_string()
        };
        Ok(Self {
            namespace,
            name: name.to_string(),
        })
    }

    /// Splits a `name` or `namespace.function-name` path segment into
    /// identity parts, as used in `/function/{name}` style paths where the
    /// namespace may be suffixed onto the function name with a dot.
    pub fn from_path_segment(
        segment: &str,
        default_namespace: &str,
    ) -> Result<Self, InvalidFunctionName> {
        match segment.split_once('.') {
            Some((name, namespace)) => {
                Self::new(namespace, name, default_namespace)
            }
            None => Self::new("", segment, default_namespace),
        }
    }
}

#[derive(Debug, Clone, thiserror::Error, displaydoc::Display)]
/// invalid function name: {0}
pub struct InvalidFunctionName(pub String);

/// The authoritative replica snapshot returned by the provider.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FunctionStatus {
    pub name: String,
    #[serde(default)]
    pub namespace: String,
    #[serde(default)]
    pub replicas: u32,
    #[serde(default)]
    pub available_replicas: u32,
    #[serde(default)]
    pub min_replicas: u32,
    #[serde(default = "default_max_replicas")]
    pub max_replicas: u32,
    #[serde(default)]
    pub annotations: HashMap<String, String>,
}

fn default_max_replicas() -> u32 {
    1
}

impl FunctionStatus {
    #[must_use]
    pub fn has_available_replica(&self) -> bool {
        self.available_replicas >= 1
    }

    #[must_use]
    pub fn is_scale_from_zero_eligible(&self) -> bool {
        self.min_replicas == 0
    }

    /// Clamps a desired replica count to this function's declared
    /// `[min, max]` bounds.
    #[must_use]
    pub fn clamp_replicas(&self, desired: u32) -> u32 {
        desired.clamp(self.min_replicas, self.max_replicas.max(self.min_replicas))
    }
}

/// A request to change a function's replica count, always bounded to
/// `[min, max]` before dispatch.
#[derive(Debug, Clone, Serialize)]
pub struct ScaleTarget {
    #[serde(skip)]
    pub identity: FunctionIdentity,
    pub replicas: u32,
}

impl ScaleTarget {
    #[must_use]
    pub fn new(identity: FunctionIdentity, status: &FunctionStatus, desired: u32) -> Self {
        Self {
            identity,
            replicas: status.clamp_replicas(desired),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_namespace_falls_back_to_default() {
        let id = FunctionIdentity::new("", "echo", "openfaas-fn").unwrap();
        assert_eq!(id.namespace, "openfaas-fn");
        assert_eq!(id.name, "echo");
    }

    #[test]
    fn rejects_invalid_characters() {
        assert!(FunctionIdentity::new("ns", "bad name!", "default").is_err());
        assert!(FunctionIdentity::new("ns", "", "default").is_err());
    }

    #[test]
    fn accepts_dots_dashes_underscores() {
        assert!(FunctionIdentity::new("ns", "a-b_c.d", "default").is_ok());
    }

    #[test]
    fn dotted_path_segment_splits_into_namespace() {
        let id =
            FunctionIdentity::from_path_segment("echo.openfaas-fn", "default")
                .unwrap();
        assert_eq!(id.name, "echo");
        assert_eq!(id.namespace, "openfaas-fn");
    }

    #[test]
    fn clamp_keeps_replicas_within_bounds() {
        let status = FunctionStatus {
            min_replicas: 1,
            max_replicas: 5,
            ..Default::default()
        };
        assert_eq!(status.clamp_replicas(0), 1);
        assert_eq!(status.clamp_replicas(10), 5);
        assert_eq!(status.clamp_replicas(3), 3);
    }
}
