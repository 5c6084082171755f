pub mod antigravity;
pub mod claudecode;
pub mod codex;
pub mod minimax;

use std::sync::Arc;

use gproxy_provider_core::hooks::HookRegistry;
use gproxy_provider_core::provider::OAuthProviderKind;

pub use antigravity::{AntigravityConfig, AntigravityOAuthHook};
pub use claudecode::ClaudeCodeOAuthHook;
pub use codex::CodexOAuthHook;
pub use minimax::MinimaxApiKeyHook;

/// Wires up the hook catalog from §4.3 with its default configuration. The
/// Antigravity hook's `project` setting has no universal default — callers
/// that need body re-wrapping construct their own
/// [`AntigravityOAuthHook`] and register it in place of this one.
pub fn default_registry() -> HookRegistry {
    let mut registry = HookRegistry::new();
    registry.register_oauth_hook(OAuthProviderKind::ClaudeCode, Arc::new(ClaudeCodeOAuthHook));
    registry.register_oauth_hook(OAuthProviderKind::Codex, Arc::new(CodexOAuthHook));
    registry.register_oauth_hook(
        OAuthProviderKind::Antigravity,
        Arc::new(AntigravityOAuthHook::new(AntigravityConfig::default())),
    );
    registry.register_api_base_hook("minimax.", Arc::new(MinimaxApiKeyHook));
    registry
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_registry_resolves_claude_code_by_oauth_kind() {
        let registry = default_registry();
        assert!(registry.oauth_hook(OAuthProviderKind::ClaudeCode).is_some());
        assert!(registry.hook_by_api_base("https://api.minimax.chat").is_some());
    }
}
