//! Recording round-tripper (§4.4): tees a request/response pair to the
//! observation sink while staying transparent to the transport above it.
//! The source's `onClose` callback fired from both an EOF read path and an
//! explicit `Close()`, guarded inconsistently (a `sync.Once` in one place,
//! a plain boolean in the other, §9 open question). We unify both paths
//! under one [`tokio::sync::OnceCell`] so the sink sees exactly one
//! recorded response per request (§8 invariant 7) no matter which path
//! reaches end-of-stream first.

use std::sync::Arc;
use std::time::Instant;

use bytes::Bytes;
use gproxy_provider_core::recorded::{RecordScenario, RecordedExchange, RecordedRequest, RecordedResponse};
use gproxy_provider_core::sink::RecordSink;
use tokio::sync::{Mutex, OnceCell};

const SSE_CONTENT_TYPE: &str = "text/event-stream";

pub fn is_streaming_response(content_type: Option<&str>) -> bool {
    content_type.map(|value| value.contains(SSE_CONTENT_TYPE)).unwrap_or(false)
}

const SENSITIVE_HEADERS: [&str; 2] = ["authorization", "x-api-key"];
const REDACTED_PLACEHOLDER: &str = "[redacted]";

/// Captures the request side of §4.4 step 1: method, first-value headers,
/// and the JSON body if the request carried one and is non-empty.
/// `redact_sensitive` blanks `Authorization`/`x-api-key` header values before
/// they reach the sink — the recorder is for human inspection, not wire
/// replay, so there's no reason the credential has to leave this process.
pub fn capture_request(
    method: &str,
    url: &str,
    headers: &[(String, String)],
    body: &[u8],
    redact_sensitive: bool,
) -> RecordedRequest {
    let headers = headers
        .iter()
        .map(|(name, value)| {
            if redact_sensitive && SENSITIVE_HEADERS.contains(&name.to_ascii_lowercase().as_str()) {
                (name.clone(), REDACTED_PLACEHOLDER.to_string())
            } else {
                (name.clone(), value.clone())
            }
        })
        .collect();
    RecordedRequest {
        method: method.to_string(),
        url: url.to_string(),
        headers,
        json_body: (!body.is_empty()).then(|| serde_json::from_slice(body).ok()).flatten(),
    }
}

struct PendingExchange {
    sink: Arc<dyn RecordSink>,
    provider_name: String,
    model: String,
    scenario: RecordScenario,
    request: RecordedRequest,
    started_at: Instant,
}

/// Fires the sink exactly once regardless of how many call sites race to
/// finish it. Construct one per request; clone the `Arc` into both the EOF
/// path and the explicit-close path.
pub struct SingleFireRecorder {
    pending: Mutex<Option<PendingExchange>>,
    fired: OnceCell<()>,
}

impl SingleFireRecorder {
    /// Returns `None` when the sink is disabled, so the round-tripper can
    /// skip the whole capture-and-tee path (§6 "cheap short-circuit").
    pub fn new(
        sink: Arc<dyn RecordSink>,
        provider_name: impl Into<String>,
        model: impl Into<String>,
        scenario: impl Into<String>,
        request: RecordedRequest,
    ) -> Option<Arc<Self>> {
        if !sink.is_enabled() {
            return None;
        }
        Some(Arc::new(Self {
            pending: Mutex::new(Some(PendingExchange {
                sink,
                provider_name: provider_name.into(),
                model: model.into(),
                scenario: RecordScenario::new(scenario),
                request,
                started_at: Instant::now(),
            })),
            fired: OnceCell::new(),
        }))
    }

    /// Delivers `response` to the sink. Only the first call of however many
    /// race here actually reaches the sink; later calls are no-ops.
    pub async fn fire(self: &Arc<Self>, response: Option<RecordedResponse>, error: Option<String>) {
        let this = self.clone();
        self.fired
            .get_or_init(move || async move {
                let pending = this.pending.lock().await.take();
                if let Some(pending) = pending {
                    pending
                        .sink
                        .record_with_scenario(RecordedExchange {
                            provider_name: pending.provider_name,
                            model: pending.model,
                            scenario: pending.scenario,
                            request: pending.request,
                            response,
                            duration: pending.started_at.elapsed(),
                            error,
                        })
                        .await;
                }
            })
            .await;
    }

    pub fn has_fired(&self) -> bool {
        self.fired.initialized()
    }
}

/// Buffers streaming body bytes as they pass through, without blocking the
/// downstream consumer (§4.4: "merely copies bytes as they pass"). Call
/// [`RecordingBuffer::push`] for every chunk read, then
/// [`RecordingBuffer::raw_sse_chunks`] once end-of-stream is reached.
#[derive(Default)]
pub struct RecordingBuffer {
    bytes: Vec<u8>,
}

impl RecordingBuffer {
    pub fn push(&mut self, chunk: &Bytes) {
        self.bytes.extend_from_slice(chunk);
    }

    /// Splits the buffered text on blank-line SSE event boundaries and
    /// returns each event's `data:` payload, in receive order.
    pub fn raw_sse_chunks(&self) -> Vec<String> {
        let text = String::from_utf8_lossy(&self.bytes);
        text.split("\n\n")
            .flat_map(|event| event.lines())
            .filter_map(|line| line.strip_prefix("data:"))
            .map(|payload| payload.trim_start().to_string())
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use gproxy_provider_core::sink::NoopRecordSink;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct CountingSink {
        calls: AtomicUsize,
    }

    #[async_trait::async_trait]
    impl RecordSink for CountingSink {
        async fn record_with_scenario(&self, _exchange: RecordedExchange) {
            self.calls.fetch_add(1, Ordering::SeqCst);
        }

        fn is_enabled(&self) -> bool {
            true
        }
    }

    fn request() -> RecordedRequest {
        capture_request("POST", "https://api.anthropic.com/v1/messages", &[], b"", true)
    }

    #[test]
    fn redacts_sensitive_headers_by_default() {
        let headers = vec![
            ("Authorization".to_string(), "Bearer sk-secret".to_string()),
            ("X-Api-Key".to_string(), "sk-secret".to_string()),
            ("content-type".to_string(), "application/json".to_string()),
        ];
        let request = capture_request("POST", "https://api.anthropic.com/v1/messages", &headers, b"", true);
        assert_eq!(request.headers[0].1, "[redacted]");
        assert_eq!(request.headers[1].1, "[redacted]");
        assert_eq!(request.headers[2].1, "application/json");
    }

    #[test]
    fn redaction_can_be_disabled() {
        let headers = vec![("Authorization".to_string(), "Bearer sk-secret".to_string())];
        let request = capture_request("POST", "https://api.anthropic.com/v1/messages", &headers, b"", false);
        assert_eq!(request.headers[0].1, "Bearer sk-secret");
    }

    #[test]
    fn sse_content_type_is_detected_loosely() {
        assert!(is_streaming_response(Some("text/event-stream; charset=utf-8")));
        assert!(!is_streaming_response(Some("application/json")));
        assert!(!is_streaming_response(None));
    }

    #[test]
    fn recording_buffer_extracts_data_payloads_in_order() {
        let mut buffer = RecordingBuffer::default();
        buffer.push(&Bytes::from_static(b"event: message_start\ndata: {\"a\":1}\n\n"));
        buffer.push(&Bytes::from_static(b"data: {\"a\":2}\n\n"));
        assert_eq!(buffer.raw_sse_chunks(), vec!["{\"a\":1}", "{\"a\":2}"]);
    }

    #[tokio::test]
    async fn disabled_sink_skips_construction_entirely() {
        let sink = Arc::new(NoopRecordSink);
        let recorder = SingleFireRecorder::new(sink, "p", "m", "scenario", request());
        assert!(recorder.is_none());
    }

    #[tokio::test]
    async fn concurrent_eof_and_close_paths_fire_exactly_once() {
        let sink = Arc::new(CountingSink { calls: AtomicUsize::new(0) });
        let recorder = SingleFireRecorder::new(sink.clone(), "p", "m", "scenario", request()).unwrap();

        let a = recorder.clone();
        let b = recorder.clone();
        tokio::join!(a.fire(None, None), b.fire(None, None));

        assert_eq!(sink.calls.load(Ordering::SeqCst), 1);
        assert!(recorder.has_fired());
    }
}
