//! The `Provider` configuration record (spec §3) and its wire JSON shape
//! (spec §6). Providers are immutable for the lifetime of a cached client —
//! any change is a new `Provider` value and invalidates the pool entries
//! keyed on it.

use serde::{Deserialize, Deserializer, Serialize};
use time::OffsetDateTime;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Dialect {
    Openai,
    Anthropic,
    Google,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OAuthProviderKind {
    ClaudeCode,
    Codex,
    Antigravity,
    QwenCode,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TlsFingerprint {
    Antigravity,
    ClaudeCode,
    Codex,
    GeminiCli,
    QwenCode,
    Chrome,
    Firefox,
    Safari,
    Ios,
    Android,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OAuthDetail {
    pub provider_type: OAuthProviderKind,
    pub access_token: String,
    pub refresh_token: String,
    #[serde(with = "time::serde::rfc3339")]
    pub expires_at: OffsetDateTime,
    #[serde(default)]
    pub extra_fields: serde_json::Map<String, serde_json::Value>,
}

impl OAuthDetail {
    pub fn is_expired(&self, now: OffsetDateTime) -> bool {
        now >= self.expires_at
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Auth {
    ApiKey(String),
    OAuth(OAuthDetail),
}

impl Auth {
    pub fn oauth_kind(&self) -> Option<OAuthProviderKind> {
        match self {
            Auth::OAuth(detail) => Some(detail.provider_type),
            Auth::ApiKey(_) => None,
        }
    }
}

/// A configured upstream. Construct via [`Provider::from_wire`]; the public
/// fields are read by the transport, hook, and client-pool layers.
#[derive(Debug, Clone, PartialEq)]
pub struct Provider {
    pub id: Uuid,
    pub name: String,
    pub api_base: String,
    pub dialect: Dialect,
    pub auth: Auth,
    pub proxy_url: Option<String>,
    pub tls_fingerprint: Option<TlsFingerprint>,
    pub extra_headers: Vec<(String, String)>,
    pub enabled: bool,
}

impl Provider {
    /// Base URL with a single trailing slash stripped, as used by
    /// [`crate::keys::TransportKey`].
    pub fn normalized_api_base(&self) -> &str {
        self.api_base.trim_end_matches('/')
    }

    pub fn from_wire(wire: ProviderWire) -> Result<Self, crate::errors::GatewayError> {
        let auth = match wire.auth_type {
            AuthTypeWire::ApiKey => {
                let token = wire
                    .token
                    .ok_or(crate::errors::GatewayError::ParseMarshal(
                        "api_key provider missing token".to_string(),
                    ))?;
                Auth::ApiKey(token)
            }
            AuthTypeWire::Oauth => {
                let detail = wire
                    .oauth_detail
                    .ok_or(crate::errors::GatewayError::ParseMarshal(
                        "oauth provider missing oauth_detail".to_string(),
                    ))?;
                Auth::OAuth(detail)
            }
        };
        Ok(Provider {
            id: wire.uuid,
            name: wire.name,
            api_base: wire.api_base,
            dialect: wire.api_style,
            auth,
            proxy_url: wire.proxy_url,
            tls_fingerprint: wire.tls_fingerprint,
            extra_headers: Vec::new(),
            enabled: wire.enabled,
        })
    }
}

/// Deserialization target matching spec §6's provider-configuration JSON
/// verbatim; `tls_fingerprint` is the one field whose empty string ("no
/// fingerprint, use the default stack") does not line up with a plain enum.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ProviderWire {
    pub uuid: Uuid,
    pub name: String,
    pub api_base: String,
    pub api_style: Dialect,
    pub auth_type: AuthTypeWire,
    #[serde(default)]
    pub token: Option<String>,
    #[serde(default)]
    pub oauth_detail: Option<OAuthDetail>,
    #[serde(default)]
    pub proxy_url: Option<String>,
    #[serde(default, deserialize_with = "deserialize_tls_fingerprint")]
    pub tls_fingerprint: Option<TlsFingerprint>,
    pub enabled: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuthTypeWire {
    ApiKey,
    Oauth,
}

fn deserialize_tls_fingerprint<'de, D>(deserializer: D) -> Result<Option<TlsFingerprint>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw: Option<String> = Option::deserialize(deserializer)?;
    match raw {
        None => Ok(None),
        Some(raw) if raw.is_empty() => Ok(None),
        Some(raw) => {
            let quoted = serde_json::Value::String(raw);
            serde_json::from_value(quoted).map_err(serde::de::Error::custom)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn api_key_json() -> serde_json::Value {
        serde_json::json!({
            "uuid": "00000000-0000-0000-0000-000000000001",
            "name": "openai-default",
            "api_base": "https://api.openai.com/v1/",
            "api_style": "openai",
            "auth_type": "api_key",
            "token": "sk-test",
            "proxy_url": null,
            "tls_fingerprint": "",
            "enabled": true,
        })
    }

    #[test]
    fn empty_string_tls_fingerprint_becomes_none() {
        let wire: ProviderWire = serde_json::from_value(api_key_json()).unwrap();
        assert!(wire.tls_fingerprint.is_none());
        let provider = Provider::from_wire(wire).unwrap();
        assert_eq!(provider.normalized_api_base(), "https://api.openai.com/v1");
    }

    #[test]
    fn named_tls_fingerprint_parses() {
        let mut json = api_key_json();
        json["tls_fingerprint"] = serde_json::Value::String("claude_code".to_string());
        let wire: ProviderWire = serde_json::from_value(json).unwrap();
        assert_eq!(wire.tls_fingerprint, Some(TlsFingerprint::ClaudeCode));
    }

    #[test]
    fn oauth_provider_without_oauth_detail_is_rejected() {
        let mut json = api_key_json();
        json["auth_type"] = serde_json::Value::String("oauth".to_string());
        json.as_object_mut().unwrap().remove("token");
        let wire: ProviderWire = serde_json::from_value(json).unwrap();
        assert!(Provider::from_wire(wire).is_err());
    }
}
