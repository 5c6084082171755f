use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorDetail {
    #[serde(rename = "type")]
    pub r#type: String,
    pub message: String,
}

impl ErrorDetail {
    pub fn new(r#type: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            r#type: r#type.into(),
            message: message.into(),
        }
    }

    pub fn stream_failed(message: impl Into<String>) -> Self {
        Self::new("stream_error", message)
    }
}
