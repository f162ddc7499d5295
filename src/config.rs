use std::collections::BTreeMap;

use serde::Deserialize;

/// Connection settings for one downstream service, as loaded from an
/// external configuration store.
#[derive(Clone, Debug, Default, Deserialize)]
pub struct ServiceConfig {
    /// Base URI for the service; empty means "not configured".
    #[serde(default)]
    pub base_uri: String,
    /// Per-attempt timeout in milliseconds; zero means "use the default".
    #[serde(default)]
    pub timeout: u64,
    /// Default headers attached to every request.
    #[serde(default)]
    pub headers: BTreeMap<String, String>,
    /// Optional display name for diagnostics.
    #[serde(default)]
    pub name: Option<String>,
}

/// A store of per-service connection settings, addressed by a group and a
/// service key. Missing entries are not errors: the client falls back to
/// its built-in defaults and logs the gap.
pub trait ConfigSource {
    fn service(&self, group: &str, service: &str) -> Option<ServiceConfig>;
}

impl<F> ConfigSource for F
where
    F: Fn(&str, &str) -> Option<ServiceConfig>,
{
    fn service(&self, group: &str, service: &str) -> Option<ServiceConfig> {
        self(group, service)
    }
}

#[cfg(test)]
mod tests {
    use super::{ConfigSource, ServiceConfig};

    #[test]
    fn sparse_config_json_fills_in_defaults() {
        let config: ServiceConfig =
            serde_json::from_str(r#"{"base_uri":"http://api.example.com"}"#)
                .expect("config should decode");
        assert_eq!(config.base_uri, "http://api.example.com");
        assert_eq!(config.timeout, 0);
        assert!(config.headers.is_empty());
        assert!(config.name.is_none());
    }

    #[test]
    fn closures_act_as_config_sources() {
        let source = |group: &str, service: &str| {
            (group == "payments" && service == "ledger").then(|| ServiceConfig {
                base_uri: "http://ledger.internal".to_owned(),
                ..ServiceConfig::default()
            })
        };

        assert!(source.service("payments", "ledger").is_some());
        assert!(source.service("payments", "other").is_none());
    }
}
