//! Maps [`GatewayError`] onto the wire shapes clients actually see (§7).
//! Non-streaming errors become an HTTP status + JSON body; mid-stream
//! errors become an `error` SSE event instead, handled by
//! [`crate::dispatch`] directly since they need the SSE writer, not a
//! `Response`.

use gproxy_provider_core::GatewayError;
use serde_json::{json, Value};

/// The non-streaming HTTP error shape: `{"error": {"message", "type", "code"}}`.
pub fn error_body(error: &GatewayError) -> Value {
    let (kind, code) = error_kind_and_code(error);
    json!({
        "error": {
            "message": error.to_string(),
            "type": kind,
            "code": code,
        }
    })
}

fn error_kind_and_code(error: &GatewayError) -> (&'static str, &'static str) {
    match error {
        GatewayError::Cancelled => ("api_error", "request_cancelled"),
        GatewayError::UpstreamTransport(_) => ("api_error", "upstream_transport_error"),
        GatewayError::UpstreamStream(_) => ("api_error", "stream_failed"),
        GatewayError::ParseMarshal(_) => ("api_error", "parse_error"),
        GatewayError::Panic(_) => ("api_error", "internal_error"),
        GatewayError::Unsupported(_) => ("invalid_request_error", "models_endpoint_not_supported"),
    }
}

/// The mid-stream `error` SSE event body (§7: "emit an `error` SSE event
/// `{type:"error", error:{message, type:"stream_error", code:"stream_failed"}}`").
pub fn stream_error_event(error: &GatewayError) -> Value {
    json!({
        "type": "error",
        "error": {
            "message": error.to_string(),
            "type": "stream_error",
            "code": "stream_failed",
        }
    })
}

/// The generic internal-error SSE event emitted after a recovered panic at
/// the stream-loop boundary (§7).
pub fn panic_stream_event() -> Value {
    json!({
        "type": "error",
        "error": {
            "message": "internal error",
            "type": "stream_error",
            "code": "internal_error",
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cancelled_does_not_get_logged_as_upstream_error() {
        let (kind, code) = error_kind_and_code(&GatewayError::Cancelled);
        assert_eq!(kind, "api_error");
        assert_eq!(code, "request_cancelled");
    }

    #[test]
    fn unsupported_maps_to_models_endpoint_not_supported() {
        let error = GatewayError::models_endpoint_not_supported();
        let body = error_body(&error);
        assert_eq!(body["error"]["code"], "models_endpoint_not_supported");
    }

    #[test]
    fn status_code_matches_status_of_the_underlying_error() {
        let error = GatewayError::ParseMarshal("bad json".to_string());
        assert_eq!(error.status_code(), 500);
    }
}
