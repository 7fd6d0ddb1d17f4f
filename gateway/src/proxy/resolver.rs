use url::Url;

use crate::config::Config;
use crate::types::function::FunctionIdentity;

/// Resolves a function identity to the upstream base URL a request should
/// be forwarded to. Used by both the forwarding proxy and the prober so
/// the two agree on where a function actually lives.
#[derive(Debug, Clone)]
pub enum UrlResolver {
    /// Every request goes through the provider; only the bare function
    /// name stays in the path, its namespace travels as a query parameter
    /// (see [`UrlResolver::namespace_query`]) the same way
    /// `ProviderClient::get_replicas`/`set_replicas` address it.
    Provider { provider_url: Url },
    /// The upstream host is derived directly from the function's name and
    /// namespace; the `/function/<name>` prefix is trimmed before forwarding.
    Direct { suffix: String },
}

impl UrlResolver {
    #[must_use]
    pub fn new(config: &Config) -> Self {
        if config.direct_functions {
            Self::Direct {
                suffix: config.direct_functions_suffix.clone(),
            }
        } else {
            Self::Provider {
                provider_url: config.provider_url(),
            }
        }
    }

    /// Resolves the base upstream URL for `identity`, ending in a trailing
    /// slash so relative joins (`_/ready`, sub-paths) behave as children
    /// rather than siblings.
    #[must_use]
    pub fn resolve(&self, identity: &FunctionIdentity) -> Url {
        match self {
            Self::Provider { provider_url } => provider_url
                .join(&format!("function/{}/", identity.name))
                .unwrap_or_else(|_| provider_url.clone()),
            Self::Direct { suffix } => {
                let host = format!("{}.{}.{suffix}", identity.name, identity.namespace);
                Url::parse(&format!("http://{host}/")).unwrap_or_else(|_| {
                    Url::parse("http://invalid-direct-function-host/")
                        .expect("static fallback url always parses")
                })
            }
        }
    }

    /// Whether the `/function/<name>` path prefix should be trimmed from
    /// the forwarded request path before it reaches the upstream.
    #[must_use]
    pub fn trims_function_prefix(&self) -> bool {
        matches!(self, Self::Direct { .. })
    }

    /// The `namespace` query parameter to attach to the forwarded request,
    /// if the upstream expects one. Provider mode keeps the path bare and
    /// conveys the namespace this way; direct mode already bakes the
    /// namespace into the upstream host and needs no query parameter.
    #[must_use]
    pub fn namespace_query(&self, identity: &FunctionIdentity) -> Option<(&'static str, String)> {
        match self {
            Self::Provider { .. } => Some(("namespace", identity.namespace.clone())),
            Self::Direct { .. } => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn identity() -> FunctionIdentity {
        FunctionIdentity::new("openfaas-fn", "echo", "openfaas-fn").unwrap()
    }

    #[test]
    fn provider_mode_keeps_bare_name_in_path() {
        let config = Config {
            functions_provider_url: Some(Url::parse("http://provider:8081/").unwrap()),
            ..Config::default()
        };
        let resolver = UrlResolver::new(&config);
        let resolved = resolver.resolve(&identity());
        assert_eq!(resolved.as_str(), "http://provider:8081/function/echo/");
        assert_eq!(
            resolver.namespace_query(&identity()),
            Some(("namespace", "openfaas-fn".to_string()))
        );
        assert!(!resolver.trims_function_prefix());
    }

    #[test]
    fn direct_mode_uses_dotted_host() {
        let config = Config {
            direct_functions: true,
            direct_functions_suffix: "openfaas.local".to_string(),
            ..Config::default()
        };
        let resolver = UrlResolver::new(&config);
        let resolved = resolver.resolve(&identity());
        assert_eq!(resolved.as_str(), "http://echo.openfaas-fn.openfaas.local/");
        assert_eq!(resolver.namespace_query(&identity()), None);
        assert!(resolver.trims_function_prefix());
    }
}
