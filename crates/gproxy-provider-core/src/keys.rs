//! Cache keys for the transport pool (§4.2) and the client pool (§4.6).
//! Both are plain value types so equality alone decides sharing — no
//! interior mutability, no provider back-reference.

use sha2::{Digest, Sha256};
use uuid::Uuid;

use crate::provider::{OAuthProviderKind, Provider, TlsFingerprint};

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct TransportKey {
    base_url: String,
    proxy_url: Option<String>,
    oauth_kind: Option<OAuthProviderKind>,
    tls_fingerprint: Option<TlsFingerprint>,
}

impl TransportKey {
    pub fn new(
        base_url: &str,
        proxy_url: Option<String>,
        oauth_kind: Option<OAuthProviderKind>,
        tls_fingerprint: Option<TlsFingerprint>,
    ) -> Self {
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            proxy_url,
            oauth_kind,
            tls_fingerprint,
        }
    }

    pub fn for_provider(provider: &Provider) -> Self {
        Self::new(
            provider.normalized_api_base(),
            provider.proxy_url.clone(),
            provider.auth.oauth_kind(),
            provider.tls_fingerprint,
        )
    }

    pub fn proxy_url(&self) -> Option<&str> {
        self.proxy_url.as_deref()
    }

    pub fn tls_fingerprint(&self) -> Option<TlsFingerprint> {
        self.tls_fingerprint
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ClientKey {
    provider_id: Uuid,
    model: String,
    proxy_hash: String,
}

impl ClientKey {
    pub fn new(provider_id: Uuid, model: impl Into<String>, proxy_url: Option<&str>) -> Self {
        Self {
            provider_id,
            model: model.into(),
            proxy_hash: proxy_hash(proxy_url.unwrap_or("")),
        }
    }

    pub fn for_provider(provider: &Provider, model: impl Into<String>) -> Self {
        Self::new(provider.id, model, provider.proxy_url.as_deref())
    }
}

/// 16 hex characters: the first 8 bytes of the proxy URL's SHA-256 digest.
fn proxy_hash(proxy_url: &str) -> String {
    let digest = Sha256::digest(proxy_url.as_bytes());
    digest[..8].iter().map(|byte| format!("{byte:02x}")).collect()
}
