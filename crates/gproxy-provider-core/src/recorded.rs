//! The structured record the observation sink receives (§3
//! `RecordedRequest`/`RecordedResponse`, §4.4). Headers are first-value-only
//! because the sink is for human inspection, not wire replay.

use std::time::Duration;

#[derive(Debug, Clone, Default, PartialEq)]
pub struct RecordedRequest {
    pub method: String,
    pub url: String,
    pub headers: Vec<(String, String)>,
    pub json_body: Option<serde_json::Value>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct RecordedResponse {
    pub status: u16,
    pub headers: Vec<(String, String)>,
    pub json_body: Option<serde_json::Value>,
    /// Raw `data: ...` payloads in receive order, present only when the
    /// response was a streaming body.
    pub raw_sse_chunks: Vec<String>,
    /// The fully assembled body — for streaming responses this is the
    /// `Message` produced by the §4.5.4 assembler, re-serialized.
    pub assembled_body: Option<serde_json::Value>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct RecordScenario(pub String);

impl RecordScenario {
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }
}

/// One recorded request/response pair, as delivered to a [`crate::sink::RecordSink`].
#[derive(Debug, Clone)]
pub struct RecordedExchange {
    pub provider_name: String,
    pub model: String,
    pub scenario: RecordScenario,
    pub request: RecordedRequest,
    pub response: Option<RecordedResponse>,
    pub duration: Duration,
    pub error: Option<String>,
}
