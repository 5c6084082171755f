//! Server-sent-events framing: an incremental parser for reading SSE off an
//! upstream body, and a writer for the canonical `event: <type>\ndata:
//! <json>\n\n` shape sent back to clients.

use bytes::Bytes;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SseEvent {
    pub event: Option<String>,
    pub data: String,
}

/// Incremental line-oriented SSE parser. Feed it arbitrarily-chunked bytes
/// as they arrive off the wire; it never assumes a chunk boundary lines up
/// with an event boundary.
#[derive(Debug, Default)]
pub struct SseParser {
    buffer: String,
    /// Bytes carried over from a previous [`push_bytes`] call that ended
    /// mid-codepoint. A chunk boundary from the wire has no reason to land
    /// on a UTF-8 character boundary, so these wait here for the rest of
    /// the character to arrive instead of being decoded (and discarded) in
    /// isolation.
    ///
    /// [`push_bytes`]: SseParser::push_bytes
    incomplete: Vec<u8>,
    event: Option<String>,
    data_lines: Vec<String>,
}

impl SseParser {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push_bytes(&mut self, chunk: &Bytes) -> Vec<SseEvent> {
        if self.incomplete.is_empty() {
            return match std::str::from_utf8(chunk) {
                Ok(text) => self.push_str(text),
                Err(err) => {
                    let valid_up_to = err.valid_up_to();
                    let events = self.push_str_bytes(&chunk[..valid_up_to]);
                    self.incomplete.extend_from_slice(&chunk[valid_up_to..]);
                    events
                }
            };
        }

        self.incomplete.extend_from_slice(chunk);
        let pending = std::mem::take(&mut self.incomplete);
        match std::str::from_utf8(&pending) {
            Ok(text) => self.push_str(text),
            Err(err) => {
                let valid_up_to = err.valid_up_to();
                let events = self.push_str_bytes(&pending[..valid_up_to]);
                self.incomplete.extend_from_slice(&pending[valid_up_to..]);
                events
            }
        }
    }

    fn push_str_bytes(&mut self, bytes: &[u8]) -> Vec<SseEvent> {
        // `valid_up_to` guarantees this prefix is well-formed UTF-8.
        self.push_str(std::str::from_utf8(bytes).expect("validated utf-8 prefix"))
    }

    pub fn push_str(&mut self, chunk: &str) -> Vec<SseEvent> {
        self.buffer.push_str(chunk);
        let mut events = Vec::new();

        while let Some(pos) = self.buffer.find('\n') {
            let mut line = self.buffer[..pos].to_string();
            self.buffer.drain(..=pos);

            if line.ends_with('\r') {
                line.pop();
            }

            if line.is_empty() {
                self.finish_event(&mut events);
                continue;
            }
            if line.starts_with(':') {
                continue;
            }
            if let Some(value) = line.strip_prefix("event:") {
                let value = value.trim_start();
                self.event = if value.is_empty() {
                    None
                } else {
                    Some(value.to_string())
                };
                continue;
            }
            if line == "event" {
                self.event = None;
                continue;
            }
            if let Some(value) = line.strip_prefix("data:") {
                let value = value.trim_start();
                self.data_lines.push(value.to_string());
                continue;
            }
            if line == "data" {
                self.data_lines.push(String::new());
            }
        }

        events
    }

    /// Flush any trailing unterminated event. Upstreams that close the
    /// connection without a final blank line still need their last event
    /// delivered.
    pub fn finish(&mut self) -> Vec<SseEvent> {
        let mut events = Vec::new();
        if !self.buffer.is_empty() {
            let mut line = std::mem::take(&mut self.buffer);
            if line.ends_with('\r') {
                line.pop();
            }
            if let Some(value) = line.strip_prefix("event:") {
                let value = value.trim_start();
                self.event = if value.is_empty() {
                    None
                } else {
                    Some(value.to_string())
                };
            } else if let Some(value) = line.strip_prefix("data:") {
                let value = value.trim_start();
                self.data_lines.push(value.to_string());
            }
        }
        self.finish_event(&mut events);
        events
    }

    fn finish_event(&mut self, events: &mut Vec<SseEvent>) {
        if self.event.is_none() && self.data_lines.is_empty() {
            return;
        }
        let data = self.data_lines.join("\n");
        events.push(SseEvent {
            event: self.event.take(),
            data,
        });
        self.data_lines.clear();
    }
}

/// Render one SSE frame. `event_type` is `None` for the bare `data: ...`
/// lines some dialects (notably the duplicate terminal Anthropic
/// `message_stop`) require.
pub fn encode(event_type: Option<&str>, data: &str) -> String {
    let mut out = String::with_capacity(data.len() + 32);
    if let Some(event_type) = event_type {
        out.push_str("event: ");
        out.push_str(event_type);
        out.push('\n');
    }
    out.push_str("data: ");
    out.push_str(data);
    out.push_str("\n\n");
    out
}
