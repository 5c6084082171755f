//! Antigravity OAuth hook (§4.3 row 3). Google's GenAI wire format is
//! rewritten into the internal Antigravity envelope both going out (this
//! module) and coming back (the response unwrapper below, used by the
//! dispatcher after the transport returns).

use async_trait::async_trait;
use bytes::Bytes;
use gproxy_provider_core::errors::GatewayError;
use gproxy_provider_core::headers::header_get;
use gproxy_provider_core::hooks::{Hook, UpstreamHttpRequest};
use serde_json::{Map, Value};

#[derive(Debug, Clone, Default)]
pub struct AntigravityConfig {
    pub project: Option<String>,
}

pub struct AntigravityOAuthHook {
    pub config: AntigravityConfig,
    pub request_id: fn() -> String,
}

impl AntigravityOAuthHook {
    pub fn new(config: AntigravityConfig) -> Self {
        Self {
            config,
            request_id: default_request_id,
        }
    }
}

fn default_request_id() -> String {
    format!("agent-{}", uuid::Uuid::new_v4())
}

#[async_trait]
impl Hook for AntigravityOAuthHook {
    async fn apply(&self, request: &mut UpstreamHttpRequest) -> Result<(), GatewayError> {
        request.url = rewrite_operation_suffix(&request.url);

        let api_key = header_get(&request.headers, "X-Goog-Api-Key").map(str::to_string);

        if let Some(project) = self.config.project.as_deref() {
            let body: Value = serde_json::from_slice(&request.body)
                .map_err(|err| GatewayError::ParseMarshal(err.to_string()))?;
            let Value::Object(mut body) = body else {
                return Err(GatewayError::ParseMarshal(
                    "antigravity request body must be a JSON object".to_string(),
                ));
            };
            let model = body
                .remove("model")
                .ok_or_else(|| GatewayError::ParseMarshal("antigravity request missing model".to_string()))?;

            let mut wrapped = Map::new();
            wrapped.insert("project".to_string(), Value::String(project.to_string()));
            wrapped.insert("requestId".to_string(), Value::String((self.request_id)()));
            wrapped.insert("request".to_string(), Value::Object(body));
            wrapped.insert("model".to_string(), model);
            wrapped.insert("userAgent".to_string(), Value::String("antigravity".to_string()));
            wrapped.insert("requestType".to_string(), Value::String("agent".to_string()));

            request.body = Bytes::from(
                serde_json::to_vec(&Value::Object(wrapped))
                    .map_err(|err| GatewayError::ParseMarshal(err.to_string()))?,
            );
        }

        request.headers.clear();
        request.headers.push(("Content-Type".to_string(), "application/json".to_string()));
        request.headers.push(("User-Agent".to_string(), "antigravity".to_string()));
        if let Some(api_key) = api_key {
            request.headers.push(("Authorization".to_string(), format!("Bearer {api_key}")));
        }

        Ok(())
    }
}

fn rewrite_operation_suffix(url: &str) -> String {
    for (suffix, op) in [(":streamGenerateContent", "streamGenerateContent"), (":generateContent", "generateContent")] {
        if let Some(prefix) = url.strip_suffix(suffix) {
            let (base, _) = strip_last_segment(prefix);
            return format!("{base}/v1internal:{op}");
        }
    }
    url.to_string()
}

fn strip_last_segment(url: &str) -> (&str, &str) {
    match url.rfind('/') {
        Some(index) => (&url[..index], &url[index + 1..]),
        None => (url, ""),
    }
}

/// Unwraps a single non-streaming Antigravity response body, replacing the
/// envelope with its inner `response` field (§4.3 response direction).
pub fn unwrap_response_body(body: &[u8]) -> Result<Bytes, GatewayError> {
    let value: Value = serde_json::from_slice(body).map_err(|err| GatewayError::ParseMarshal(err.to_string()))?;
    let inner = value.get("response").cloned().unwrap_or(value);
    serde_json::to_vec(&inner)
        .map(Bytes::from)
        .map_err(|err| GatewayError::ParseMarshal(err.to_string()))
}

/// Unwraps one SSE line of a streaming Antigravity response. Lines that are
/// not `data: ...` pass through verbatim; malformed `data:` payloads also
/// pass through verbatim rather than dropping the line, so a partial read
/// boundary never desyncs the stream (§4.3: "must ... tolerate partial
/// reads").
pub fn unwrap_response_line(line: &str) -> String {
    let Some(payload) = line.strip_prefix("data:") else {
        return line.to_string();
    };
    let payload = payload.trim_start();
    let Ok(value) = serde_json::from_str::<Value>(payload) else {
        return line.to_string();
    };
    let inner = value.get("response").cloned().unwrap_or(value);
    match serde_json::to_string(&inner) {
        Ok(rewritten) => format!("data: {rewritten}"),
        Err(_) => line.to_string(),
    }
}
