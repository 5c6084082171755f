//! Thin deserialization boundary for provider configuration (§6). File
//! watching and persistence are an external collaborator's job (§1); this
//! crate only turns a JSON document into `Provider` values.

use crate::errors::GatewayError;
use crate::provider::{Provider, ProviderWire};

#[derive(Debug, Clone, Default)]
pub struct GatewayConfig {
    pub providers: Vec<Provider>,
}

impl GatewayConfig {
    pub fn from_json_str(raw: &str) -> Result<Self, GatewayError> {
        let wires: Vec<ProviderWire> =
            serde_json::from_str(raw).map_err(|err| GatewayError::ParseMarshal(err.to_string()))?;
        let providers = wires
            .into_iter()
            .map(Provider::from_wire)
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self { providers })
    }

    pub fn enabled_providers(&self) -> impl Iterator<Item = &Provider> {
        self.providers.iter().filter(|provider| provider.enabled)
    }

    /// Fills in `proxy_url` on providers that don't set their own, from a
    /// process-wide default (gproxy-common's `GlobalConfig::proxy`).
    pub fn apply_default_proxy(&mut self, proxy: &str) {
        for provider in &mut self.providers {
            if provider.proxy_url.is_none() {
                provider.proxy_url = Some(proxy.to_string());
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn loads_providers_from_json_array() {
        let raw = serde_json::json!([
            {
                "uuid": "00000000-0000-0000-0000-000000000001",
                "name": "openai-default",
                "api_base": "https://api.openai.com/v1",
                "api_style": "openai",
                "auth_type": "api_key",
                "token": "sk-test",
                "proxy_url": null,
                "tls_fingerprint": "",
                "enabled": true,
            },
            {
                "uuid": "00000000-0000-0000-0000-000000000002",
                "name": "disabled-anthropic",
                "api_base": "https://api.anthropic.com",
                "api_style": "anthropic",
                "auth_type": "api_key",
                "token": "sk-ant-test",
                "proxy_url": null,
                "tls_fingerprint": "",
                "enabled": false,
            },
        ])
        .to_string();

        let config = GatewayConfig::from_json_str(&raw).unwrap();
        assert_eq!(config.providers.len(), 2);
        assert_eq!(config.enabled_providers().count(), 1);
    }

    #[test]
    fn rejects_malformed_json() {
        assert!(GatewayConfig::from_json_str("not json").is_err());
    }

    #[test]
    fn default_proxy_only_fills_providers_missing_their_own() {
        let raw = serde_json::json!([
            {
                "uuid": "00000000-0000-0000-0000-000000000001",
                "name": "no-proxy",
                "api_base": "https://api.openai.com/v1",
                "api_style": "openai",
                "auth_type": "api_key",
                "token": "sk-test",
                "proxy_url": null,
                "tls_fingerprint": "",
                "enabled": true,
            },
            {
                "uuid": "00000000-0000-0000-0000-000000000002",
                "name": "own-proxy",
                "api_base": "https://api.anthropic.com",
                "api_style": "anthropic",
                "auth_type": "api_key",
                "token": "sk-ant-test",
                "proxy_url": "socks5://127.0.0.1:1080",
                "tls_fingerprint": "",
                "enabled": true,
            },
        ])
        .to_string();

        let mut config = GatewayConfig::from_json_str(&raw).unwrap();
        config.apply_default_proxy("http://10.0.0.1:8080");

        assert_eq!(config.providers[0].proxy_url.as_deref(), Some("http://10.0.0.1:8080"));
        assert_eq!(config.providers[1].proxy_url.as_deref(), Some("socks5://127.0.0.1:1080"));
    }
}
