//! Transport pool (§4.2): one shared `wreq::Client` per
//! [`TransportKey`](gproxy_provider_core::TransportKey). Grounded on the
//! teacher's `CLIENT_CACHE: OnceLock<Mutex<HashMap<..>>>` pattern, upgraded
//! from a plain `Mutex` to an `RwLock` so concurrent lookups for
//! already-built transports don't serialize on each other — construction
//! still takes the write lock with a second check, per §8 invariant 8
//! ("pool double-check").

use std::collections::HashMap;
use std::sync::{Arc, RwLock};
use std::time::{Duration, Instant};

use gproxy_provider_core::{GatewayError, TransportKey};

use crate::tls;

#[derive(Clone)]
pub struct PooledTransport {
    pub client: wreq::Client,
    pub created_at: Instant,
}

#[derive(Default)]
pub struct TransportPool {
    transports: RwLock<HashMap<TransportKey, PooledTransport>>,
}

impl TransportPool {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the pooled transport for `key`, building one if absent. Never
    /// evicts (§3: "transports are cheap to keep and expensive to rebuild
    /// under load").
    pub fn get(&self, key: &TransportKey) -> Result<PooledTransport, GatewayError> {
        if let Some(transport) = self.read_existing(key) {
            return Ok(transport);
        }

        let mut transports = self
            .transports
            .write()
            .expect("transport pool lock poisoned");
        if let Some(transport) = transports.get(key) {
            return Ok(transport.clone());
        }

        let transport = build_transport(key)?;
        transports.insert(key.clone(), transport.clone());
        Ok(transport)
    }

    fn read_existing(&self, key: &TransportKey) -> Option<PooledTransport> {
        let transports = self.transports.read().expect("transport pool lock poisoned");
        transports.get(key).cloned()
    }

    pub fn len(&self) -> usize {
        self.transports.read().expect("transport pool lock poisoned").len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

fn build_transport(key: &TransportKey) -> Result<PooledTransport, GatewayError> {
    let mut builder = wreq::Client::builder()
        .connect_timeout(Duration::from_secs(10))
        .user_agent(tls::user_agent_for_fingerprint(key.tls_fingerprint()));

    if let Some(proxy_url) = key.proxy_url() {
        if let Some(proxy) = apply_proxy(proxy_url)? {
            builder = builder.proxy(proxy);
        }
    }

    let client = builder
        .build()
        .map_err(|err| GatewayError::UpstreamTransport(err.to_string()))?;

    Ok(PooledTransport {
        client,
        created_at: Instant::now(),
    })
}

/// `http`/`https` and `socks5` proxy URLs both go through `wreq::Proxy::all`,
/// which dispatches on scheme internally; anything else falls back to no
/// proxy rather than failing the whole transport build (§4.2: "unsupported
/// scheme -> fall back to the default transport (log)"). `Ok(None)` means
/// "proceed without a proxy"; `Err` is reserved for a recognized scheme that
/// `wreq` itself rejects (e.g. a malformed URL).
fn apply_proxy(proxy_url: &str) -> Result<Option<wreq::Proxy>, GatewayError> {
    let scheme = proxy_url.split("://").next().unwrap_or_default();
    match scheme {
        "http" | "https" | "socks5" | "socks5h" => wreq::Proxy::all(proxy_url)
            .map(Some)
            .map_err(|err| GatewayError::UpstreamTransport(err.to_string())),
        other => {
            tracing::warn!(scheme = other, proxy_url, "unsupported proxy scheme, falling back to default transport");
            Ok(None)
        }
    }
}

pub type SharedTransportPool = Arc<TransportPool>;

#[cfg(test)]
mod tests {
    use super::*;

    fn key(proxy: Option<&str>) -> TransportKey {
        TransportKey::new("https://api.openai.com/v1", proxy.map(str::to_string), None, None)
    }

    #[test]
    fn repeated_get_for_same_key_reuses_transport() {
        let pool = TransportPool::new();
        let first = pool.get(&key(None)).unwrap();
        let second = pool.get(&key(None)).unwrap();
        assert_eq!(pool.len(), 1);
        assert_eq!(first.created_at, second.created_at);
    }

    #[test]
    fn distinct_keys_get_distinct_transports() {
        let pool = TransportPool::new();
        pool.get(&key(None)).unwrap();
        pool.get(&key(Some("http://proxy:8080"))).unwrap();
        assert_eq!(pool.len(), 2);
    }

    #[test]
    fn unsupported_proxy_scheme_falls_back_to_no_proxy() {
        let pool = TransportPool::new();
        let transport = pool.get(&key(Some("ftp://proxy:21")));
        assert!(transport.is_ok());
    }
}
