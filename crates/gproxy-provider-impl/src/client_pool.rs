//! Client pool (§4.6): three parallel maps, one per dialect, each holding
//! [`ClientKey`]-addressed entries behind a single `RwLock`. A background
//! sweeper evicts entries idle past the TTL; `Get` always needs the write
//! lock because a hit still has to bump `last_used_at` (§3 `PooledClient`).

use std::collections::HashMap;
use std::sync::{Arc, RwLock};
use std::time::{Duration, Instant};

use gproxy_provider_core::sink::RecordSink;
use gproxy_provider_core::{ClientKey, Dialect, GatewayError};

use crate::transport::PooledTransport;

const IDLE_TTL: Duration = Duration::from_secs(60 * 60);
const SWEEP_INTERVAL: Duration = Duration::from_secs(60 * 60);

#[derive(Clone)]
pub struct PooledClient {
    pub transport: PooledTransport,
    last_used_at: Instant,
}

struct DialectMap {
    entries: RwLock<HashMap<ClientKey, PooledClient>>,
}

impl Default for DialectMap {
    fn default() -> Self {
        Self { entries: RwLock::new(HashMap::new()) }
    }
}

impl DialectMap {
    fn get_or_insert_with(
        &self,
        key: &ClientKey,
        build: impl FnOnce() -> Result<PooledTransport, GatewayError>,
    ) -> Result<PooledClient, GatewayError> {
        let mut entries = self.entries.write().expect("client pool lock poisoned");
        if let Some(entry) = entries.get_mut(key) {
            entry.last_used_at = Instant::now();
            return Ok(entry.clone());
        }
        let transport = build()?;
        let entry = PooledClient { transport, last_used_at: Instant::now() };
        entries.insert(key.clone(), entry.clone());
        Ok(entry)
    }

    fn sweep(&self, now: Instant) -> usize {
        let mut entries = self.entries.write().expect("client pool lock poisoned");
        let before = entries.len();
        entries.retain(|_, entry| now.duration_since(entry.last_used_at) < IDLE_TTL);
        before - entries.len()
    }

    fn clear(&self) {
        self.entries.write().expect("client pool lock poisoned").clear();
    }

    fn len(&self) -> usize {
        self.entries.read().expect("client pool lock poisoned").len()
    }
}

pub struct ClientPool {
    openai: DialectMap,
    anthropic: DialectMap,
    google: DialectMap,
    sink: RwLock<Option<Arc<dyn RecordSink>>>,
}

impl Default for ClientPool {
    fn default() -> Self {
        Self {
            openai: DialectMap::default(),
            anthropic: DialectMap::default(),
            google: DialectMap::default(),
            sink: RwLock::new(None),
        }
    }
}

impl ClientPool {
    pub fn new() -> Self {
        Self::default()
    }

    fn map_for(&self, dialect: Dialect) -> &DialectMap {
        match dialect {
            Dialect::Openai => &self.openai,
            Dialect::Anthropic => &self.anthropic,
            Dialect::Google => &self.google,
        }
    }

    pub fn get(
        &self,
        dialect: Dialect,
        key: &ClientKey,
        build: impl FnOnce() -> Result<PooledTransport, GatewayError>,
    ) -> Result<PooledClient, GatewayError> {
        self.map_for(dialect).get_or_insert_with(key, build)
    }

    /// Applied retroactively (§4.6: "Setting a non-nil recording sink on
    /// the pool applies it retroactively to all pooled clients and to any
    /// created afterwards") — since clients don't carry their own sink
    /// reference here, retroactive application just means callers read this
    /// field at dispatch time rather than the client construction time.
    pub fn set_sink(&self, sink: Arc<dyn RecordSink>) {
        *self.sink.write().expect("client pool sink lock poisoned") = Some(sink);
    }

    pub fn sink(&self) -> Option<Arc<dyn RecordSink>> {
        self.sink.read().expect("client pool sink lock poisoned").clone()
    }

    pub fn clear(&self) {
        self.openai.clear();
        self.anthropic.clear();
        self.google.clear();
    }

    pub fn len(&self, dialect: Dialect) -> usize {
        self.map_for(dialect).len()
    }

    /// Evicts entries idle past the TTL across all three maps; returns the
    /// total number evicted. Intended to run on a [`SWEEP_INTERVAL`] tick.
    pub fn sweep(&self, now: Instant) -> usize {
        self.openai.sweep(now) + self.anthropic.sweep(now) + self.google.sweep(now)
    }
}

pub fn sweep_interval() -> Duration {
    SWEEP_INTERVAL
}

/// Spawns the periodic sweeper described in §4.6. Returns the task handle
/// so callers can abort it on shutdown.
pub fn spawn_sweeper(pool: Arc<ClientPool>) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(SWEEP_INTERVAL);
        loop {
            ticker.tick().await;
            let evicted = pool.sweep(Instant::now());
            if evicted > 0 {
                tracing::debug!(evicted, "client pool sweep evicted idle entries");
            }
        }
    })
}
