use serde::{Deserialize, Serialize};

use super::types::{Model, MessageRole, MessageType, StopReason, TextBlockType, ThinkingBlockType, ToolUseBlockType, JsonObject, JsonValue};
use super::error::ErrorDetail;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct StreamUsage {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub input_tokens: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub output_tokens: Option<u32>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StreamMessage {
    pub id: String,
    /// Message-start events always carry an empty content array; blocks are
    /// opened one at a time via `content_block_start`.
    pub content: Vec<JsonValue>,
    pub model: Model,
    pub role: MessageRole,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stop_reason: Option<StopReason>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stop_sequence: Option<String>,
    #[serde(rename = "type")]
    pub r#type: MessageType,
    pub usage: StreamUsage,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StreamTextBlock {
    pub text: String,
    #[serde(rename = "type")]
    pub r#type: TextBlockType,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StreamThinkingBlock {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub signature: Option<String>,
    pub thinking: String,
    #[serde(rename = "type")]
    pub r#type: ThinkingBlockType,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StreamToolUseBlock {
    pub id: String,
    pub input: JsonObject,
    pub name: String,
    #[serde(rename = "type")]
    pub r#type: ToolUseBlockType,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum StreamContentBlock {
    Text(StreamTextBlock),
    Thinking(StreamThinkingBlock),
    ToolUse(StreamToolUseBlock),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum StreamContentBlockDelta {
    TextDelta { text: String },
    /// Partial JSON fragment; the receiver accumulates and parses it after
    /// the block's `content_block_stop`.
    InputJsonDelta { partial_json: String },
    ThinkingDelta { thinking: String },
    SignatureDelta { signature: String },
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StreamMessageDelta {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stop_reason: Option<StopReason>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stop_sequence: Option<String>,
    /// Upstream-extra fields accumulated over the stream (§3 `delta-extras`),
    /// surfaced once on the terminal `message_delta`.
    #[serde(flatten)]
    pub extra: serde_json::Map<String, JsonValue>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum StreamEventKnown {
    MessageStart {
        message: StreamMessage,
    },
    ContentBlockStart {
        index: u32,
        content_block: StreamContentBlock,
    },
    ContentBlockDelta {
        index: u32,
        delta: StreamContentBlockDelta,
    },
    ContentBlockStop {
        index: u32,
    },
    MessageDelta {
        delta: StreamMessageDelta,
        /// Usage is cumulative for the stream so far (§3 token counters).
        usage: StreamUsage,
    },
    MessageStop,
    Ping,
    Error {
        error: ErrorDetail,
    },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum StreamEvent {
    Known(StreamEventKnown),
    Unknown(JsonValue),
}

impl StreamEvent {
    /// SSE `event:` line value for this event, as required by the Messages
    /// streaming wire format.
    pub fn event_name(&self) -> &'static str {
        match self {
            StreamEvent::Known(StreamEventKnown::MessageStart { .. }) => "message_start",
            StreamEvent::Known(StreamEventKnown::ContentBlockStart { .. }) => "content_block_start",
            StreamEvent::Known(StreamEventKnown::ContentBlockDelta { .. }) => "content_block_delta",
            StreamEvent::Known(StreamEventKnown::ContentBlockStop { .. }) => "content_block_stop",
            StreamEvent::Known(StreamEventKnown::MessageDelta { .. }) => "message_delta",
            StreamEvent::Known(StreamEventKnown::MessageStop) => "message_stop",
            StreamEvent::Known(StreamEventKnown::Ping) => "ping",
            StreamEvent::Known(StreamEventKnown::Error { .. }) => "error",
            StreamEvent::Unknown(_) => "unknown",
        }
    }
}
