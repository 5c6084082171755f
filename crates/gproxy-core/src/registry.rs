//! In-memory provider registry (§3 `Provider`, SPEC_FULL §6). Grounded on
//! the teacher's `AppState.providers: ArcSwap<HashMap<..>>` pattern in
//! `state/mod.rs`, trimmed to just what the core consumes: a snapshot of
//! enabled providers the dispatcher can look up by id. Config
//! *persistence* (file watching, an admin API) lives outside this crate;
//! callers replace the whole snapshot on reload via [`ProviderRegistry::replace`].

use std::collections::HashMap;
use std::sync::Arc;

use arc_swap::ArcSwap;
use uuid::Uuid;

use gproxy_provider_core::config::GatewayConfig;
use gproxy_provider_core::Provider;

#[derive(Default)]
pub struct ProviderRegistry {
    providers: ArcSwap<HashMap<Uuid, Provider>>,
}

impl ProviderRegistry {
    pub fn new() -> Self {
        Self {
            providers: ArcSwap::from_pointee(HashMap::new()),
        }
    }

    pub fn from_config(config: &GatewayConfig) -> Self {
        let registry = Self::new();
        registry.replace(config);
        registry
    }

    /// Swaps in a brand new snapshot. A provider whose fields changed gets a
    /// new `TransportKey`/`ClientKey` naturally, so the old pool entries are
    /// simply never looked up again; no separate invalidation step is needed
    /// (§3: "a change invalidates the pool entry").
    pub fn replace(&self, config: &GatewayConfig) {
        let map = config
            .enabled_providers()
            .map(|provider| (provider.id, provider.clone()))
            .collect();
        self.providers.store(Arc::new(map));
    }

    pub fn get(&self, id: Uuid) -> Option<Provider> {
        self.providers.load().get(&id).cloned()
    }

    pub fn len(&self) -> usize {
        self.providers.load().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const CONFIG_JSON: &str = r#"[
        {"uuid":"00000000-0000-0000-0000-000000000001","name":"p1","api_base":"https://api.openai.com/v1","api_style":"openai","auth_type":"api_key","token":"sk-1","enabled":true},
        {"uuid":"00000000-0000-0000-0000-000000000002","name":"p2","api_base":"https://api.anthropic.com","api_style":"anthropic","auth_type":"api_key","token":"sk-2","enabled":false}
    ]"#;

    #[test]
    fn replace_only_keeps_enabled_providers() {
        let config = GatewayConfig::from_json_str(CONFIG_JSON).unwrap();
        let registry = ProviderRegistry::from_config(&config);
        assert_eq!(registry.len(), 1);
        assert!(registry
            .get("00000000-0000-0000-0000-000000000001".parse().unwrap())
            .is_some());
        assert!(registry
            .get("00000000-0000-0000-0000-000000000002".parse().unwrap())
            .is_none());
    }

    #[test]
    fn unknown_id_returns_none() {
        let registry = ProviderRegistry::new();
        assert!(registry.get(Uuid::nil()).is_none());
    }
}
