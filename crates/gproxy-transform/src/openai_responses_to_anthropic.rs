//! OpenAI Responses-API stream → Anthropic Messages stream (spec §4.5.3).

use gproxy_protocol::anthropic::error::ErrorDetail;
use gproxy_protocol::anthropic::stream::{
    StreamContentBlock, StreamContentBlockDelta, StreamEvent, StreamEventKnown, StreamMessage,
    StreamMessageDelta, StreamTextBlock, StreamThinkingBlock, StreamToolUseBlock, StreamUsage,
};
use gproxy_protocol::anthropic::types::{
    JsonObject, Model, MessageRole, MessageType, StopReason, TextBlockType, ThinkingBlockType,
    ToolUseBlockType,
};
use gproxy_protocol::openai::responses::{OutputItem, OutputItemType, ResponseStreamEvent};

use crate::block_tracker::{truncate_tool_id, BlockTracker, Singleton, ToolKey};

/// A stream error or a cancel-on-upstream-failure signal (§4.5.3, §7).
#[derive(Debug, Clone)]
pub struct TranslatorError {
    pub event: StreamEvent,
}

#[derive(Debug, Default)]
pub struct OpenAiResponsesToAnthropicTranslator {
    tracker: BlockTracker,
    id: String,
    model: Model,
    message_started: bool,
    finished: bool,
}

impl OpenAiResponsesToAnthropicTranslator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn transform_event(
        &mut self,
        event: ResponseStreamEvent,
    ) -> Result<Vec<StreamEvent>, TranslatorError> {
        if self.finished {
            return Ok(Vec::new());
        }

        let mut events = self.ensure_started(&event);

        match event {
            ResponseStreamEvent::Created
            | ResponseStreamEvent::InProgress
            | ResponseStreamEvent::Queued => {}

            ResponseStreamEvent::ContentPartAdded { part } => {
                if part.r#type == "output_text" {
                    let (index, opened) = self.tracker.open_singleton(Singleton::Text);
                    if opened {
                        events.push(text_start(index));
                    }
                    if let Some(text) = part.text.filter(|text| !text.is_empty()) {
                        events.push(text_delta(index, text));
                    }
                }
            }
            ResponseStreamEvent::OutputTextDelta { delta } => {
                events.extend(self.emit_singleton_text(Singleton::Text, delta));
            }
            ResponseStreamEvent::OutputTextDone { .. }
            | ResponseStreamEvent::ContentPartDone { .. } => {
                events.extend(self.stop_singleton(Singleton::Text));
            }

            ResponseStreamEvent::ReasoningTextDelta { delta } => {
                events.extend(self.emit_singleton_thinking(Singleton::Thinking, delta));
            }
            ResponseStreamEvent::ReasoningTextDone { .. } => {
                events.extend(self.stop_singleton(Singleton::Thinking));
            }

            ResponseStreamEvent::ReasoningSummaryTextDelta { delta } => {
                events.extend(self.emit_singleton_thinking(Singleton::ReasoningSummary, delta));
            }
            ResponseStreamEvent::ReasoningSummaryTextDone { .. } => {
                events.extend(self.stop_singleton(Singleton::ReasoningSummary));
            }

            ResponseStreamEvent::RefusalDelta { delta } => {
                events.extend(self.emit_singleton_text(Singleton::Refusal, delta));
            }
            ResponseStreamEvent::RefusalDone { .. } => {
                events.extend(self.stop_singleton(Singleton::Refusal));
            }

            ResponseStreamEvent::OutputItemAdded { item } => {
                if is_tool_item(item.r#type) {
                    events.extend(self.open_tool_item(&item));
                }
            }
            ResponseStreamEvent::OutputItemDone { .. } => {}

            ResponseStreamEvent::FunctionCallArgumentsDelta { item_id, delta }
            | ResponseStreamEvent::CustomToolCallInputDelta { item_id, delta }
            | ResponseStreamEvent::McpCallArgumentsDelta { item_id, delta } => {
                events.extend(self.append_tool_delta(&item_id, &delta));
            }
            ResponseStreamEvent::FunctionCallArgumentsDone { item_id, .. }
            | ResponseStreamEvent::CustomToolCallInputDone { item_id, .. }
            | ResponseStreamEvent::McpCallArgumentsDone { item_id, .. } => {
                events.extend(self.stop_tool_item(&item_id));
            }

            ResponseStreamEvent::Completed { response } => {
                if let Some(usage) = response.usage {
                    self.tracker.input_tokens = usage.input_tokens as u64;
                    self.tracker.output_tokens = usage.output_tokens as u64;
                }

                // Sweep tool-use items present in the final response body
                // that never arrived as streaming events (§4.5.3 S6).
                for item in &response.output {
                    if is_tool_item(item.r#type) && self.tracker.tool_by_key(&ToolKey::Item(item.id.clone())).is_none() {
                        events.extend(self.open_tool_item(item));
                        if let Some(arguments) = item.arguments.as_deref().filter(|arguments| !arguments.is_empty()) {
                            events.extend(self.append_tool_delta(&item.id, arguments));
                        }
                        events.extend(self.stop_tool_item(&item.id));
                    }
                }

                for index in self.tracker.close_open() {
                    events.push(known(StreamEventKnown::ContentBlockStop { index }));
                }

                let stop_reason = if response
                    .output
                    .last()
                    .map(|item| is_tool_item(item.r#type))
                    .unwrap_or(false)
                {
                    StopReason::ToolUse
                } else {
                    StopReason::EndTurn
                };

                events.push(known(StreamEventKnown::MessageDelta {
                    delta: StreamMessageDelta {
                        stop_reason: Some(stop_reason),
                        stop_sequence: None,
                        extra: Default::default(),
                    },
                    usage: StreamUsage {
                        input_tokens: Some(self.tracker.input_tokens as u32),
                        output_tokens: Some(self.tracker.output_tokens as u32),
                    },
                }));
                events.push(known(StreamEventKnown::MessageStop));
                self.finished = true;
            }

            ResponseStreamEvent::Error { error } => {
                self.finished = true;
                let detail = ErrorDetail::stream_failed(error.message);
                return Err(TranslatorError {
                    event: known(StreamEventKnown::Error { error: detail }),
                });
            }
            ResponseStreamEvent::Failed { .. } | ResponseStreamEvent::Incomplete { .. } => {
                self.finished = true;
                return Err(TranslatorError {
                    event: known(StreamEventKnown::Error {
                        error: ErrorDetail::stream_failed("upstream response did not complete"),
                    }),
                });
            }
            ResponseStreamEvent::Other => {}
        }

        Ok(events)
    }

    fn ensure_started(&mut self, event: &ResponseStreamEvent) -> Vec<StreamEvent> {
        if self.message_started || matches!(event, ResponseStreamEvent::Created | ResponseStreamEvent::InProgress | ResponseStreamEvent::Queued) {
            return Vec::new();
        }
        self.message_started = true;
        self.id = "unknown".to_string();
        self.model = Model::custom("unknown");
        vec![known(StreamEventKnown::MessageStart {
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
        })]
    }

    fn emit_singleton_text(&mut self, kind: Singleton, text: String) -> Vec<StreamEvent> {
        let mut events = Vec::new();
        let (index, opened) = self.tracker.open_singleton(kind);
        if opened {
            events.push(text_start(index));
        }
        if !text.is_empty() {
            events.push(text_delta(index, text));
        }
        events
    }

    fn emit_singleton_thinking(&mut self, kind: Singleton, text: String) -> Vec<StreamEvent> {
        let mut events = Vec::new();
        let (index, opened) = self.tracker.open_singleton(kind);
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
                delta: StreamContentBlockDelta::ThinkingDelta { thinking: text },
            }));
        }
        events
    }

    fn stop_singleton(&mut self, kind: Singleton) -> Vec<StreamEvent> {
        match self.tracker.singleton_index(kind) {
            Some(index) if self.tracker.stop(index) => {
                vec![known(StreamEventKnown::ContentBlockStop { index })]
            }
            _ => Vec::new(),
        }
    }

    fn open_tool_item(&mut self, item: &OutputItem) -> Vec<StreamEvent> {
        let key = ToolKey::Item(item.id.clone());
        let name = item.name.clone().unwrap_or_else(|| "tool".to_string());
        let id = truncate_tool_id(&item.id);
        let (index, opened) = self.tracker.tool_block(key, id.clone(), name.clone());
        if !opened {
            return Vec::new();
        }
        vec![known(StreamEventKnown::ContentBlockStart {
            index,
            content_block: StreamContentBlock::ToolUse(StreamToolUseBlock {
                id,
                input: JsonObject::new(),
                name,
                r#type: ToolUseBlockType::ToolUse,
            }),
        })]
    }

    fn append_tool_delta(&mut self, item_id: &str, fragment: &str) -> Vec<StreamEvent> {
        let key = ToolKey::Item(item_id.to_string());
        let Some(tool) = self.tracker.tool_by_key(&key) else {
            return Vec::new();
        };
        let index = tool.block_index;
        if fragment.is_empty() {
            return Vec::new();
        }
        self.tracker.append_tool_args(&key, fragment);
        vec![known(StreamEventKnown::ContentBlockDelta {
            index,
            delta: StreamContentBlockDelta::InputJsonDelta {
                partial_json: fragment.to_string(),
            },
        })]
    }

    fn stop_tool_item(&mut self, item_id: &str) -> Vec<StreamEvent> {
        let key = ToolKey::Item(item_id.to_string());
        let Some(tool) = self.tracker.tool_by_key(&key) else {
            return Vec::new();
        };
        let index = tool.block_index;
        if self.tracker.stop(index) {
            vec![known(StreamEventKnown::ContentBlockStop { index })]
        } else {
            Vec::new()
        }
    }
}

fn is_tool_item(kind: OutputItemType) -> bool {
    matches!(
        kind,
        OutputItemType::FunctionCall | OutputItemType::CustomToolCall | OutputItemType::McpCall
    )
}

fn text_start(index: u32) -> StreamEvent {
    known(StreamEventKnown::ContentBlockStart {
        index,
        content_block: StreamContentBlock::Text(StreamTextBlock {
            text: String::new(),
            r#type: TextBlockType::Text,
        }),
    })
}

fn text_delta(index: u32, text: String) -> StreamEvent {
    known(StreamEventKnown::ContentBlockDelta {
        index,
        delta: StreamContentBlockDelta::TextDelta { text },
    })
}

fn known(event: StreamEventKnown) -> StreamEvent {
    StreamEvent::Known(event)
}
