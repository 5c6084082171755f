//! Shared, dependency-light types used across the gateway workspace.

use serde::{Deserialize, Serialize};

#[derive(Debug, thiserror::Error)]
pub enum GlobalConfigError {
    #[error("missing required global config field: {0}")]
    MissingField(&'static str),
}

/// Process-wide settings for the front-end HTTP listener and outbound
/// defaults. Persistence (file watching, an admin API) lives outside this
/// workspace; this type is only the in-memory result of loading one.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GlobalConfig {
    pub host: String,
    pub port: u16,
    /// Default outbound proxy applied when a provider does not set its own.
    pub proxy: Option<String>,
    /// Whether recorded request/response bodies redact `Authorization`/`x-api-key`.
    pub event_redact_sensitive: bool,
}

/// Partial overlay used to merge CLI flags, env vars, and defaults.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct GlobalConfigPatch {
    pub host: Option<String>,
    pub port: Option<u16>,
    pub proxy: Option<String>,
    pub event_redact_sensitive: Option<bool>,
}

impl GlobalConfigPatch {
    pub fn overlay(&mut self, other: GlobalConfigPatch) {
        if other.host.is_some() {
            self.host = other.host;
        }
        if other.port.is_some() {
            self.port = other.port;
        }
        if other.proxy.is_some() {
            self.proxy = other.proxy;
        }
        if other.event_redact_sensitive.is_some() {
            self.event_redact_sensitive = other.event_redact_sensitive;
        }
    }

    pub fn into_config(self) -> Result<GlobalConfig, GlobalConfigError> {
        Ok(GlobalConfig {
            host: self.host.unwrap_or_else(|| "127.0.0.1".to_string()),
            port: self.port.unwrap_or(8787),
            proxy: self.proxy,
            event_redact_sensitive: self.event_redact_sensitive.unwrap_or(true),
        })
    }
}

impl From<GlobalConfig> for GlobalConfigPatch {
    fn from(value: GlobalConfig) -> Self {
        Self {
            host: Some(value.host),
            port: Some(value.port),
            proxy: value.proxy,
            event_redact_sensitive: Some(value.event_redact_sensitive),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn patch_overlay_prefers_later_values() {
        let mut base = GlobalConfigPatch {
            host: Some("0.0.0.0".to_string()),
            port: Some(1),
            proxy: None,
            event_redact_sensitive: Some(false),
        };
        base.overlay(GlobalConfigPatch {
            host: None,
            port: Some(2),
            proxy: Some("socks5://127.0.0.1:1080".to_string()),
            event_redact_sensitive: None,
        });
        assert_eq!(base.host.as_deref(), Some("0.0.0.0"));
        assert_eq!(base.port, Some(2));
        assert_eq!(base.proxy.as_deref(), Some("socks5://127.0.0.1:1080"));
        assert_eq!(base.event_redact_sensitive, Some(false));
    }

    #[test]
    fn into_config_applies_defaults() {
        let config = GlobalConfigPatch::default().into_config().unwrap();
        assert_eq!(config.host, "127.0.0.1");
        assert_eq!(config.port, 8787);
        assert!(config.event_redact_sensitive);
    }
}
