//! The hook-chain contract (§4.3). A hook mutates an outgoing request in
//! place; the concrete Claude-Code/Codex/Antigravity/Minimax hooks live in
//! the implementation crate, which is the only thing that knows how to
//! build a [`HookRegistry`] — this crate only fixes the lookup interface
//! (§6 "Hook lookup interface") so the dispatcher can stay hook-agnostic.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use http::Method;

use crate::errors::GatewayError;
use crate::headers::Headers;
use crate::provider::OAuthProviderKind;

#[derive(Debug, Clone)]
pub struct UpstreamHttpRequest {
    pub method: Method,
    pub url: String,
    pub headers: Headers,
    pub body: bytes::Bytes,
}

#[async_trait]
pub trait Hook: Send + Sync {
    /// Mutate `request` in place. An `Err` short-circuits the remaining
    /// chain (§4.3: "short-circuiting on the first error").
    async fn apply(&self, request: &mut UpstreamHttpRequest) -> Result<(), GatewayError>;
}

pub type SharedHook = Arc<dyn Hook>;

/// Looks hooks up by OAuth kind or by API-base substring match (§6). OAuth
/// takes precedence: a caller checks [`HookRegistry::oauth_hook`] first and
/// only falls back to [`HookRegistry::hook_by_api_base`] when it returns
/// `None`.
#[derive(Default)]
pub struct HookRegistry {
    by_oauth_kind: HashMap<OAuthProviderKind, SharedHook>,
    by_api_base_substring: Vec<(String, SharedHook)>,
}

impl HookRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register_oauth_hook(&mut self, kind: OAuthProviderKind, hook: SharedHook) {
        self.by_oauth_kind.insert(kind, hook);
    }

    pub fn register_api_base_hook(&mut self, substring: impl Into<String>, hook: SharedHook) {
        self.by_api_base_substring.push((substring.into(), hook));
    }

    pub fn oauth_hook(&self, kind: OAuthProviderKind) -> Option<SharedHook> {
        self.by_oauth_kind.get(&kind).cloned()
    }

    pub fn hook_by_api_base(&self, api_base: &str) -> Option<SharedHook> {
        self.by_api_base_substring
            .iter()
            .find(|(substring, _)| api_base.contains(substring.as_str()))
            .map(|(_, hook)| hook.clone())
    }

    /// Resolves the hook that applies to a provider's auth (OAuth kind takes
    /// precedence over API-base matching, per §6).
    pub fn resolve(&self, oauth_kind: Option<OAuthProviderKind>, api_base: &str) -> Option<SharedHook> {
        if let Some(kind) = oauth_kind
            && let Some(hook) = self.oauth_hook(kind)
        {
            return Some(hook);
        }
        self.hook_by_api_base(api_base)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct RenameHook;

    #[async_trait]
    impl Hook for RenameHook {
        async fn apply(&self, request: &mut UpstreamHttpRequest) -> Result<(), GatewayError> {
            crate::headers::header_set(&mut request.headers, "X-Renamed", "yes");
            Ok(())
        }
    }

    #[test]
    fn oauth_kind_takes_precedence_over_api_base() {
        let mut registry = HookRegistry::new();
        registry.register_oauth_hook(OAuthProviderKind::ClaudeCode, Arc::new(RenameHook));
        registry.register_api_base_hook("api.anthropic.com", Arc::new(RenameHook));

        let resolved = registry.resolve(Some(OAuthProviderKind::ClaudeCode), "api.anthropic.com");
        assert!(resolved.is_some());
        assert!(registry.oauth_hook(OAuthProviderKind::Codex).is_none());
    }

    #[test]
    fn falls_back_to_api_base_substring_match() {
        let mut registry = HookRegistry::new();
        registry.register_api_base_hook("minimax.", Arc::new(RenameHook));
        assert!(registry.resolve(None, "https://api.minimax.chat/v1").is_some());
        assert!(registry.resolve(None, "https://api.openai.com/v1").is_none());
    }

    #[tokio::test]
    async fn apply_mutates_request_headers() {
        let hook = RenameHook;
        let mut request = UpstreamHttpRequest {
            method: Method::POST,
            url: "https://example.com".to_string(),
            headers: Vec::new(),
            body: bytes::Bytes::new(),
        };
        hook.apply(&mut request).await.unwrap();
        assert_eq!(crate::headers::header_get(&request.headers, "x-renamed"), Some("yes"));
    }
}
