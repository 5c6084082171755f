//! The observation-sink interface (§6 "Sink interface"). The sink itself —
//! its storage backend — is out of scope (§1); this crate only defines the
//! boundary the recording round-tripper (§4.4) calls across.

use async_trait::async_trait;

use crate::recorded::RecordedExchange;

#[async_trait]
pub trait RecordSink: Send + Sync {
    async fn record_with_scenario(&self, exchange: RecordedExchange);

    /// Cheap short-circuit so the round-tripper can skip the capture-and-tee
    /// work entirely when nothing is listening.
    fn is_enabled(&self) -> bool;
}

/// Default sink when no recorder is configured. `is_enabled` is `false`, so
/// the round-tripper never does the capture work for it.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopRecordSink;

#[async_trait]
impl RecordSink for NoopRecordSink {
    async fn record_with_scenario(&self, _exchange: RecordedExchange) {}

    fn is_enabled(&self) -> bool {
        false
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn noop_sink_is_disabled() {
        assert!(!NoopRecordSink.is_enabled());
    }
}
