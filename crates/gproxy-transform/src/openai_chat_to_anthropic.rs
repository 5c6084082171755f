//! OpenAI Chat-Completions stream → Anthropic Messages stream (spec
//! §4.5.2). This is the harder of the two forward directions: the upstream
//! format is a flat list of deltas each carrying its own finish reason,
//! while the downstream format is structured content blocks bracketed by
//! `content_block_start`/`content_block_stop`.

use serde_json::{Map, Value};

use gproxy_protocol::anthropic::stream::{
    StreamContentBlock, StreamContentBlockDelta, StreamEvent, StreamEventKnown, StreamMessage,
    StreamMessageDelta, StreamTextBlock, StreamThinkingBlock, StreamToolUseBlock, StreamUsage,
};
use gproxy_protocol::anthropic::types::{
    JsonObject, Model, MessageRole, MessageType, TextBlockType, ThinkingBlockType, ToolUseBlockType,
};
use gproxy_protocol::openai::chat::{CreateChatCompletionStreamResponse, StreamDelta};

use crate::block_tracker::{truncate_tool_id, BlockTracker, Singleton, ToolKey};
use crate::finish_reason::chat_finish_to_anthropic;

/// Fields §4.5.2 calls out by name; anything else in the raw delta object
/// is an "upstream extra" to be folded into `delta-extras`.
const SPECIAL_DELTA_FIELDS: &[&str] = &["role", "content", "reasoning_content", "refusal", "tool_calls"];

#[derive(Debug, Default)]
pub struct OpenAiChatToAnthropicTranslator {
    tracker: BlockTracker,
    id: String,
    model: Model,
    message_started: bool,
    finished: bool,
    delta_extras: Map<String, Value>,
}

impl OpenAiChatToAnthropicTranslator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Translate one upstream chunk into zero or more Anthropic stream
    /// events, in emission order.
    pub fn transform_chunk(&mut self, chunk: CreateChatCompletionStreamResponse) -> Vec<StreamEvent> {
        if self.finished {
            return Vec::new();
        }

        let mut events = Vec::new();

        if !self.message_started {
            self.id = chunk.id.clone();
            self.model = Model::custom(chunk.model.clone());
            self.message_started = true;
            events.push(known(StreamEventKnown::MessageStart {
                message: StreamMessage {
                    id: self.id.clone(),
                    content: Vec::new(),
                    model: self.model.clone(),
                    role: MessageRole::Assistant,
                    stop_reason: None,
                    stop_sequence: None,
                    r#type: MessageType::Message,
                    usage: StreamUsage::default(),
                },
            }));
        }

        let Some(choice) = chunk.choices.first() else {
            // Empty choices with usage present: update counters, emit nothing (§4.5.2).
            if let Some(usage) = &chunk.usage {
                self.tracker.input_tokens = usage.prompt_tokens.max(0) as u64;
                self.tracker.output_tokens = usage.completion_tokens.max(0) as u64;
            }
            return events;
        };

        self.collect_extras(&choice.delta);

        if let Some(reasoning) = choice.delta.reasoning_content.as_deref() {
            events.extend(self.emit_thinking(reasoning));
        }

        if let Some(refusal) = choice.delta.refusal.as_deref() {
            events.extend(self.emit_text(refusal));
        } else if let Some(content) = choice.delta.content.as_deref() {
            if !content.is_empty() {
                events.extend(self.emit_text(content));
            } else if choice.finish_reason.is_none() && self.tracker.singleton_index(Singleton::Text).is_some() {
                // Keepalive: an open text block with nothing new to say yet.
                events.extend(self.emit_text(""));
            }
        }

        if let Some(tool_calls) = &choice.delta.tool_calls {
            for call in tool_calls {
                events.extend(self.emit_tool_call(call));
            }
        }

        if let Some(usage) = &chunk.usage {
            self.tracker.input_tokens = usage.prompt_tokens.max(0) as u64;
            self.tracker.output_tokens = usage.completion_tokens.max(0) as u64;
        }

        if let Some(reason) = choice.finish_reason {
            for index in self.tracker.close_open() {
                events.push(known(StreamEventKnown::ContentBlockStop { index }));
            }

            let stop_reason = chat_finish_to_anthropic(reason);
            events.push(known(StreamEventKnown::MessageDelta {
                delta: StreamMessageDelta {
                    stop_reason: Some(stop_reason),
                    stop_sequence: None,
                    extra: std::mem::take(&mut self.delta_extras),
                },
                usage: StreamUsage {
                    input_tokens: Some(self.tracker.input_tokens as u32),
                    output_tokens: Some(self.tracker.output_tokens as u32),
                },
            }));
            events.push(known(StreamEventKnown::MessageStop));
            // A second, bare `message_stop` line is required for client
            // compatibility (§4.5.2); it carries no `event:` line.
            events.push(StreamEvent::Unknown(Value::Object(Map::from_iter([(
                "type".to_string(),
                Value::String("message_stop".to_string()),
            )]))));
            self.finished = true;
        }

        events
    }

    fn collect_extras(&mut self, delta: &StreamDelta) {
        for (key, value) in &delta.extra {
            if !SPECIAL_DELTA_FIELDS.contains(&key.as_str()) {
                self.delta_extras.insert(key.clone(), value.clone());
            }
        }
    }

    fn emit_text(&mut self, text: &str) -> Vec<StreamEvent> {
        let mut events = Vec::new();
        let (index, opened) = self.tracker.open_singleton(Singleton::Text);
        if opened {
            events.push(known(StreamEventKnown::ContentBlockStart {
                index,
                content_block: StreamContentBlock::Text(StreamTextBlock {
                    text: String::new(),
                    r#type: TextBlockType::Text,
                }),
            }));
        }
        events.push(known(StreamEventKnown::ContentBlockDelta {
            index,
            delta: StreamContentBlockDelta::TextDelta {
                text: text.to_string(),
            },
        }));
        events
    }

    fn emit_thinking(&mut self, text: &str) -> Vec<StreamEvent> {
        let mut events = Vec::new();
        let (index, opened) = self.tracker.open_singleton(Singleton::Thinking);
        if opened {
            events.push(known(StreamEventKnown::ContentBlockStart {
                index,
                content_block: StreamContentBlock::Thinking(StreamThinkingBlock {
                    signature: None,
                    thinking: String::new(),
                    r#type: ThinkingBlockType::Thinking,
                }),
            }));
        }
        if !text.is_empty() {
            events.push(known(StreamEventKnown::ContentBlockDelta {
                index,
                delta: StreamContentBlockDelta::ThinkingDelta {
                    thinking: text.to_string(),
                },
            }));
        }
        events
    }

    fn emit_tool_call(
        &mut self,
        call: &gproxy_protocol::openai::chat::ToolCallChunk,
    ) -> Vec<StreamEvent> {
        let mut events = Vec::new();
        let key = ToolKey::Index(call.index);
        let name = call
            .function
            .as_ref()
            .and_then(|function| function.name.clone())
            .unwrap_or_else(|| "tool".to_string());
        let raw_id = call
            .id
            .clone()
            .unwrap_or_else(|| format!("toolcall-{}", call.index));
        let id = truncate_tool_id(&raw_id);

        let (index, opened) = self.tracker.tool_block(key.clone(), id.clone(), name.clone());
        if opened {
            events.push(known(StreamEventKnown::ContentBlockStart {
                index,
                content_block: StreamContentBlock::ToolUse(StreamToolUseBlock {
                    id,
                    input: JsonObject::new(),
                    name,
                    r#type: ToolUseBlockType::ToolUse,
                }),
            }));
        }

        if let Some(arguments) = call.function.as_ref().and_then(|function| function.arguments.as_deref())
            && !arguments.is_empty()
        {
            self.tracker.append_tool_args(&key, arguments);
            events.push(known(StreamEventKnown::ContentBlockDelta {
                index,
                delta: StreamContentBlockDelta::InputJsonDelta {
                    partial_json: arguments.to_string(),
                },
            }));
        }

        events
    }
}

fn known(event: StreamEventKnown) -> StreamEvent {
    StreamEvent::Known(event)
}

#[cfg(test)]
mod tests {
    use super::*;
    use gproxy_protocol::openai::chat::{
        ChunkObjectType, CompletionUsage, FinishReason, StreamChoice, ToolCallChunkType,
        ToolCallFunctionChunk,
    };

    fn chunk(delta: StreamDelta, finish_reason: Option<FinishReason>) -> CreateChatCompletionStreamResponse {
        CreateChatCompletionStreamResponse {
            id: "chatcmpl-1".to_string(),
            object: ChunkObjectType::ChatCompletionChunk,
            created: 0,
            model: "gpt-test".to_string(),
            choices: vec![StreamChoice {
                index: 0,
                delta,
                finish_reason,
            }],
            usage: None,
        }
    }

    fn text_delta(text: &str) -> StreamDelta {
        StreamDelta {
            content: Some(text.to_string()),
            ..Default::default()
        }
    }

    /// S1: plain text, two content chunks then a finish chunk with usage.
    #[test]
    fn s1_plain_text_emission_matches_grammar() {
        let mut translator = OpenAiChatToAnthropicTranslator::new();
        let mut names = Vec::new();

        for event in translator.transform_chunk(chunk(text_delta("Hello "), None)) {
            names.push(event.event_name().to_string());
        }
        for event in translator.transform_chunk(chunk(text_delta("world"), None)) {
            names.push(event.event_name().to_string());
        }
        let mut finish = chunk(StreamDelta::default(), Some(FinishReason::Stop));
        finish.usage = Some(CompletionUsage {
            prompt_tokens: 10,
            completion_tokens: 2,
            total_tokens: 12,
        });
        for event in translator.transform_chunk(finish) {
            names.push(event.event_name().to_string());
        }

        assert_eq!(
            names,
            vec![
                "message_start",
                "content_block_start",
                "content_block_delta",
                "content_block_delta",
                "content_block_stop",
                "message_delta",
                "message_stop",
                "unknown",
            ]
        );
    }

    /// S2: a 50-char tool id is truncated to 37 chars + "...", and the
    /// `tool_calls` finish reason maps to `tool_use`.
    #[test]
    fn s2_tool_call_id_is_truncated_and_stop_reason_is_tool_use() {
        let mut translator = OpenAiChatToAnthropicTranslator::new();
        let long_id = "abcdefghij".repeat(5);
        let delta = StreamDelta {
            tool_calls: Some(vec![gproxy_protocol::openai::chat::ToolCallChunk {
                index: 0,
                id: Some(long_id),
                r#type: Some(ToolCallChunkType::Function),
                function: Some(ToolCallFunctionChunk {
                    name: Some("lookup".to_string()),
                    arguments: Some("{\"q\":\"x\"}".to_string()),
                }),
            }]),
            ..Default::default()
        };
        let start_events = translator.transform_chunk(chunk(delta, None));
        let id = start_events
            .iter()
            .find_map(|event| match event {
                StreamEvent::Known(StreamEventKnown::ContentBlockStart {
                    content_block: StreamContentBlock::ToolUse(tool),
                    ..
                }) => Some(tool.id.clone()),
                _ => None,
            })
            .expect("tool_use start event");
        assert_eq!(id.len(), 40);
        assert!(id.ends_with("..."));

        let finish_events =
            translator.transform_chunk(chunk(StreamDelta::default(), Some(FinishReason::ToolCalls)));
        let stop_reason = finish_events.iter().find_map(|event| match event {
            StreamEvent::Known(StreamEventKnown::MessageDelta { delta, .. }) => delta.stop_reason,
            _ => None,
        });
        assert_eq!(
            stop_reason,
            Some(gproxy_protocol::anthropic::types::StopReason::ToolUse)
        );
    }

    /// S3: reasoning then text opens a thinking block (index 0) then a text
    /// block (index 1), both stopped in index order.
    #[test]
    fn s3_reasoning_then_text_opens_blocks_in_order() {
        let mut translator = OpenAiChatToAnthropicTranslator::new();
        let mut block_starts = Vec::new();

        let delta = StreamDelta {
            reasoning_content: Some("thinking…".to_string()),
            ..Default::default()
        };
        for event in translator.transform_chunk(chunk(delta, None)) {
            if let StreamEvent::Known(StreamEventKnown::ContentBlockStart { index, .. }) = event {
                block_starts.push(index);
            }
        }
        for event in translator.transform_chunk(chunk(text_delta("answer"), None)) {
            if let StreamEvent::Known(StreamEventKnown::ContentBlockStart { index, .. }) = event {
                block_starts.push(index);
            }
        }
        assert_eq!(block_starts, vec![0, 1]);

        let mut stops = Vec::new();
        for event in translator.transform_chunk(chunk(StreamDelta::default(), Some(FinishReason::Stop))) {
            if let StreamEvent::Known(StreamEventKnown::ContentBlockStop { index }) = event {
                stops.push(index);
            }
        }
        assert_eq!(stops, vec![0, 1]);
    }

    #[test]
    fn reasoning_content_never_folds_into_text_block() {
        let mut translator = OpenAiChatToAnthropicTranslator::new();
        let delta = StreamDelta {
            reasoning_content: Some("secret plan".to_string()),
            ..Default::default()
        };
        let events = translator.transform_chunk(chunk(delta, None));
        for event in events {
            if let StreamEvent::Known(StreamEventKnown::ContentBlockDelta { delta, .. }) = event {
                assert!(matches!(delta, StreamContentBlockDelta::ThinkingDelta { .. }));
            }
        }
        assert_eq!(translator.tracker.singleton_index(Singleton::Text), None);
    }

    #[test]
    fn finished_stream_ignores_further_chunks() {
        let mut translator = OpenAiChatToAnthropicTranslator::new();
        translator.transform_chunk(chunk(text_delta("hi"), Some(FinishReason::Stop)));
        let extra = translator.transform_chunk(chunk(text_delta("more"), None));
        assert!(extra.is_empty());
    }
}
