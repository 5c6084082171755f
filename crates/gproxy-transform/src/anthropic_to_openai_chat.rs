//! Anthropic Messages stream → OpenAI Chat-Completions stream (the reverse
//! of §4.5.2). A client speaking Chat-Completions against a gateway whose
//! upstream happens to be an Anthropic-dialect provider needs this
//! direction; it collapses Anthropic's bracketed content blocks back into
//! Chat-Completions' flat delta list.

use std::collections::BTreeMap;

use gproxy_protocol::anthropic::stream::{
    StreamContentBlock, StreamContentBlockDelta, StreamEvent, StreamEventKnown,
};
use gproxy_protocol::anthropic::types::StopReason;
use gproxy_protocol::openai::chat::{
    ChunkObjectType, CompletionUsage, CreateChatCompletionStreamResponse, FinishReason, Role,
    StreamChoice, StreamDelta, ToolCallChunk, ToolCallChunkType, ToolCallFunctionChunk,
};

#[derive(Debug, Clone)]
struct ToolCallInfo {
    id: String,
    name: String,
}

#[derive(Debug, Clone)]
pub struct AnthropicToOpenAiChatTranslator {
    id: String,
    model: String,
    created: i64,
    tool_calls: BTreeMap<u32, ToolCallInfo>,
    finish_emitted: bool,
}

impl AnthropicToOpenAiChatTranslator {
    pub fn new(created: i64) -> Self {
        Self {
            id: "unknown".to_string(),
            model: "unknown".to_string(),
            created,
            tool_calls: BTreeMap::new(),
            finish_emitted: false,
        }
    }

    pub fn transform_event(&mut self, event: StreamEvent) -> Option<CreateChatCompletionStreamResponse> {
        let StreamEvent::Known(event) = event else {
            return None;
        };

        match event {
            StreamEventKnown::MessageStart { message } => {
                self.id = message.id;
                self.model = message.model.as_str().to_string();
                Some(self.chunk(
                    StreamDelta {
                        role: Some(Role::Assistant),
                        ..Default::default()
                    },
                    None,
                    None,
                ))
            }
            StreamEventKnown::ContentBlockStart { index, content_block } => {
                self.map_block_start(index, content_block)
            }
            StreamEventKnown::ContentBlockDelta { index, delta } => self.map_block_delta(index, delta),
            StreamEventKnown::ContentBlockStop { .. } => None,
            StreamEventKnown::MessageDelta { delta, usage } => {
                let finish_reason = delta.stop_reason.map(map_stop_reason);
                if finish_reason.is_some() {
                    self.finish_emitted = true;
                }
                let usage = map_usage(usage.input_tokens, usage.output_tokens);
                if finish_reason.is_none() && usage.is_none() {
                    None
                } else {
                    Some(self.chunk(StreamDelta::default(), finish_reason, usage))
                }
            }
            StreamEventKnown::MessageStop => {
                if self.finish_emitted {
                    return None;
                }
                self.finish_emitted = true;
                Some(self.chunk(StreamDelta::default(), Some(FinishReason::Stop), None))
            }
            StreamEventKnown::Ping | StreamEventKnown::Error { .. } => None,
        }
    }

    fn map_block_start(&mut self, index: u32, block: StreamContentBlock) -> Option<CreateChatCompletionStreamResponse> {
        match block {
            StreamContentBlock::Text(text) => (!text.text.is_empty()).then(|| self.text_chunk(text.text)),
            StreamContentBlock::Thinking(thinking) => {
                (!thinking.thinking.is_empty()).then(|| self.reasoning_chunk(thinking.thinking))
            }
            StreamContentBlock::ToolUse(tool) => {
                self.tool_calls.insert(
                    index,
                    ToolCallInfo {
                        id: tool.id,
                        name: tool.name,
                    },
                );
                Some(self.tool_call_start(index))
            }
        }
    }

    fn map_block_delta(&mut self, index: u32, delta: StreamContentBlockDelta) -> Option<CreateChatCompletionStreamResponse> {
        match delta {
            StreamContentBlockDelta::TextDelta { text } => (!text.is_empty()).then(|| self.text_chunk(text)),
            StreamContentBlockDelta::ThinkingDelta { thinking } => {
                (!thinking.is_empty()).then(|| self.reasoning_chunk(thinking))
            }
            StreamContentBlockDelta::InputJsonDelta { partial_json } => {
                (!partial_json.is_empty()).then(|| self.tool_call_delta(index, partial_json))
            }
            StreamContentBlockDelta::SignatureDelta { .. } => None,
        }
    }

    fn tool_call_start(&self, index: u32) -> CreateChatCompletionStreamResponse {
        let info = self.tool_calls.get(&index);
        let tool_call = ToolCallChunk {
            index: index as i64,
            id: info.map(|tool| tool.id.clone()),
            r#type: Some(ToolCallChunkType::Function),
            function: Some(ToolCallFunctionChunk {
                name: info.map(|tool| tool.name.clone()),
                arguments: None,
            }),
        };
        self.chunk(
            StreamDelta {
                tool_calls: Some(vec![tool_call]),
                ..Default::default()
            },
            None,
            None,
        )
    }

    fn tool_call_delta(&self, index: u32, partial_json: String) -> CreateChatCompletionStreamResponse {
        let tool_call = ToolCallChunk {
            index: index as i64,
            id: None,
            r#type: Some(ToolCallChunkType::Function),
            function: Some(ToolCallFunctionChunk {
                name: None,
                arguments: Some(partial_json),
            }),
        };
        self.chunk(
            StreamDelta {
                tool_calls: Some(vec![tool_call]),
                ..Default::default()
            },
            None,
            None,
        )
    }

    fn text_chunk(&self, text: String) -> CreateChatCompletionStreamResponse {
        self.chunk(
            StreamDelta {
                content: Some(text),
                ..Default::default()
            },
            None,
            None,
        )
    }

    fn reasoning_chunk(&self, text: String) -> CreateChatCompletionStreamResponse {
        self.chunk(
            StreamDelta {
                reasoning_content: Some(text),
                ..Default::default()
            },
            None,
            None,
        )
    }

    fn chunk(
        &self,
        delta: StreamDelta,
        finish_reason: Option<FinishReason>,
        usage: Option<CompletionUsage>,
    ) -> CreateChatCompletionStreamResponse {
        CreateChatCompletionStreamResponse {
            id: self.id.clone(),
            object: ChunkObjectType::ChatCompletionChunk,
            created: self.created,
            model: self.model.clone(),
            choices: vec![StreamChoice {
                index: 0,
                delta,
                finish_reason,
            }],
            usage,
        }
    }
}

fn map_stop_reason(reason: StopReason) -> FinishReason {
    crate::finish_reason::anthropic_stop_to_chat_finish(reason)
}

fn map_usage(input_tokens: Option<u32>, output_tokens: Option<u32>) -> Option<CompletionUsage> {
    if input_tokens.is_none() && output_tokens.is_none() {
        return None;
    }
    let input_tokens = input_tokens.unwrap_or(0) as i64;
    let output_tokens = output_tokens.unwrap_or(0) as i64;
    Some(CompletionUsage {
        prompt_tokens: input_tokens,
        completion_tokens: output_tokens,
        total_tokens: input_tokens + output_tokens,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use gproxy_protocol::anthropic::stream::{
        StreamMessage, StreamMessageDelta, StreamToolUseBlock, StreamUsage,
    };
    use gproxy_protocol::anthropic::types::{JsonObject, MessageRole, MessageType, Model, ToolUseBlockType};

    fn message_start() -> StreamEvent {
        StreamEvent::Known(StreamEventKnown::MessageStart {
            message: StreamMessage {
                id: "msg_1".to_string(),
                content: Vec::new(),
                model: Model::custom("claude-test"),
                role: MessageRole::Assistant,
                stop_reason: None,
                stop_sequence: None,
                r#type: MessageType::Message,
                usage: StreamUsage::default(),
            },
        })
    }

    #[test]
    fn message_start_emits_role_delta_with_captured_id_and_model() {
        let mut translator = AnthropicToOpenAiChatTranslator::new(1000);
        let chunk = translator.transform_event(message_start()).expect("role chunk");
        assert_eq!(chunk.id, "msg_1");
        assert_eq!(chunk.model, "claude-test");
        assert_eq!(chunk.choices[0].delta.role, Some(Role::Assistant));
    }

    #[test]
    fn tool_use_block_becomes_indexed_tool_call_chunks() {
        let mut translator = AnthropicToOpenAiChatTranslator::new(1000);
        translator.transform_event(message_start());
        let start = translator
            .transform_event(StreamEvent::Known(StreamEventKnown::ContentBlockStart {
                index: 0,
                content_block: StreamContentBlock::ToolUse(StreamToolUseBlock {
                    id: "tool_abc".to_string(),
                    input: JsonObject::new(),
                    name: "lookup".to_string(),
                    r#type: ToolUseBlockType::ToolUse,
                }),
            }))
            .expect("tool call start chunk");
        let tool_call = &start.choices[0].delta.tool_calls.as_ref().unwrap()[0];
        assert_eq!(tool_call.id.as_deref(), Some("tool_abc"));
        assert_eq!(tool_call.index, 0);
    }

    #[test]
    fn message_stop_without_prior_finish_defaults_to_stop() {
        let mut translator = AnthropicToOpenAiChatTranslator::new(1000);
        translator.transform_event(message_start());
        let stop = translator
            .transform_event(StreamEvent::Known(StreamEventKnown::MessageStop))
            .expect("stop chunk");
        assert_eq!(stop.choices[0].finish_reason, Some(FinishReason::Stop));
    }

    #[test]
    fn message_stop_after_message_delta_finish_is_not_duplicated() {
        let mut translator = AnthropicToOpenAiChatTranslator::new(1000);
        translator.transform_event(message_start());
        translator.transform_event(StreamEvent::Known(StreamEventKnown::MessageDelta {
            delta: StreamMessageDelta {
                stop_reason: Some(StopReason::EndTurn),
                stop_sequence: None,
                extra: Default::default(),
            },
            usage: StreamUsage::default(),
        }));
        let stop = translator.transform_event(StreamEvent::Known(StreamEventKnown::MessageStop));
        assert!(stop.is_none());
    }
}
