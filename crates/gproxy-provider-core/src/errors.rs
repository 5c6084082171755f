//! `GatewayError` maps failure causes onto the error kinds a caller needs to
//! tell apart: whether the downstream can be told "try again", whether the
//! upstream is the one at fault, and whether an HTTP status can be derived
//! at all.

#[derive(Debug, thiserror::Error)]
pub enum GatewayError {
    /// The downstream closed the connection or cancelled its request context.
    #[error("request cancelled")]
    Cancelled,

    /// Connecting to, or exchanging a non-streaming response with, the
    /// upstream failed below the HTTP layer (DNS, TLS, connect, timeout).
    #[error("upstream transport error: {0}")]
    UpstreamTransport(String),

    /// The upstream accepted the request and began a stream, but the stream
    /// itself failed or was cut short (SSE framing error, reset mid-body).
    #[error("upstream stream error: {0}")]
    UpstreamStream(String),

    /// A request or response body failed to parse or marshal against the
    /// expected wire dialect.
    #[error("parse/marshal error: {0}")]
    ParseMarshal(String),

    /// A hook, translator, or handler panicked and was caught at a task
    /// boundary; the panic payload is preserved as a string for logging.
    #[error("internal error (recovered panic): {0}")]
    Panic(String),

    /// The requested operation is not supported for this provider or
    /// dialect (e.g. a models-listing endpoint the upstream does not expose).
    #[error("unsupported: {0}")]
    Unsupported(&'static str),
}

impl GatewayError {
    pub fn models_endpoint_not_supported() -> Self {
        GatewayError::Unsupported("models endpoint not supported by this provider")
    }

    /// Best-effort status code for the downstream response. Streaming errors
    /// that occur after headers are already flushed have no status to send;
    /// callers of this must only use it before the stream has started.
    pub fn status_code(&self) -> u16 {
        match self {
            GatewayError::Cancelled => 499,
            GatewayError::UpstreamTransport(_) => 502,
            GatewayError::UpstreamStream(_) => 502,
            GatewayError::ParseMarshal(_) => 500,
            GatewayError::Panic(_) => 500,
            GatewayError::Unsupported(_) => 404,
        }
    }
}

pub type GatewayResult<T> = Result<T, GatewayError>;
