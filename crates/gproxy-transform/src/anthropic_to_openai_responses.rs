//! Anthropic Messages stream → OpenAI Responses-API stream (the reverse of
//! §4.5.3). Simpler than the inbound direction: Anthropic's content blocks
//! map onto the Responses API's output-item/content-part vocabulary close
//! to one-for-one, so there is no sweep-on-completion step to mirror.

use std::collections::BTreeMap;

use gproxy_protocol::anthropic::stream::{
    StreamContentBlock, StreamContentBlockDelta, StreamEvent, StreamEventKnown,
};
use gproxy_protocol::anthropic::types::StopReason;
use gproxy_protocol::openai::responses::{
    ApiError, ContentPart, OutputItem, OutputItemType, ResponseObject, ResponseStreamEvent,
    ResponseUsage,
};

#[derive(Debug, Clone)]
struct ToolInfo {
    item_id: String,
    name: String,
    arguments: String,
}

#[derive(Debug, Clone, Default)]
pub struct AnthropicToOpenAiResponsesTranslator {
    id: String,
    model: String,
    message_item_open: bool,
    text_buffer: String,
    tool_blocks: BTreeMap<u32, ToolInfo>,
    output_items: Vec<OutputItem>,
    stop_reason: Option<StopReason>,
    usage: Option<ResponseUsage>,
}

impl AnthropicToOpenAiResponsesTranslator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn transform_event(&mut self, event: StreamEvent) -> Vec<ResponseStreamEvent> {
        let StreamEvent::Known(event) = event else {
            return Vec::new();
        };

        match event {
            StreamEventKnown::MessageStart { message } => {
                self.id = message.id;
                self.model = message.model.as_str().to_string();
                vec![ResponseStreamEvent::Created]
            }
            StreamEventKnown::ContentBlockStart { index, content_block } => {
                self.handle_block_start(index, content_block)
            }
            StreamEventKnown::ContentBlockDelta { index, delta } => self.handle_block_delta(index, delta),
            StreamEventKnown::ContentBlockStop { index } => self.handle_block_stop(index),
            StreamEventKnown::MessageDelta { delta, usage } => {
                if delta.stop_reason.is_some() {
                    self.stop_reason = delta.stop_reason;
                }
                if usage.input_tokens.is_some() || usage.output_tokens.is_some() {
                    self.usage = Some(ResponseUsage {
                        input_tokens: usage.input_tokens.unwrap_or(0),
                        output_tokens: usage.output_tokens.unwrap_or(0),
                    });
                }
                Vec::new()
            }
            StreamEventKnown::MessageStop => self.finish(),
            StreamEventKnown::Ping => vec![ResponseStreamEvent::InProgress],
            StreamEventKnown::Error { error } => vec![ResponseStreamEvent::Error {
                error: ApiError {
                    message: error.message,
                    code: Some(error.r#type),
                },
            }],
        }
    }

    fn handle_block_start(&mut self, index: u32, block: StreamContentBlock) -> Vec<ResponseStreamEvent> {
        match block {
            StreamContentBlock::Text(text) => self.emit_text(text.text),
            StreamContentBlock::Thinking(thinking) => self.emit_reasoning(thinking.thinking),
            StreamContentBlock::ToolUse(tool) => self.start_tool(index, tool.id, tool.name),
        }
    }

    fn handle_block_delta(&mut self, index: u32, delta: StreamContentBlockDelta) -> Vec<ResponseStreamEvent> {
        match delta {
            StreamContentBlockDelta::TextDelta { text } => self.emit_text(text),
            StreamContentBlockDelta::ThinkingDelta { thinking } => self.emit_reasoning(thinking),
            StreamContentBlockDelta::InputJsonDelta { partial_json } => {
                self.append_tool_arguments(index, partial_json)
            }
            StreamContentBlockDelta::SignatureDelta { .. } => Vec::new(),
        }
    }

    fn handle_block_stop(&mut self, index: u32) -> Vec<ResponseStreamEvent> {
        let Some(info) = self.tool_blocks.remove(&index) else {
            return Vec::new();
        };
        let item = OutputItem {
            id: info.item_id.clone(),
            r#type: OutputItemType::FunctionCall,
            name: Some(info.name),
            arguments: Some(info.arguments.clone()),
            call_id: Some(info.item_id.clone()),
        };
        let events = vec![
            ResponseStreamEvent::FunctionCallArgumentsDone {
                item_id: info.item_id,
                arguments: info.arguments,
            },
            ResponseStreamEvent::OutputItemDone { item: item.clone() },
        ];
        self.output_items.push(item);
        events
    }

    fn emit_text(&mut self, text: String) -> Vec<ResponseStreamEvent> {
        if text.is_empty() {
            return Vec::new();
        }
        let mut events = Vec::new();
        if !self.message_item_open {
            self.message_item_open = true;
            events.push(ResponseStreamEvent::OutputItemAdded {
                item: OutputItem {
                    id: "message".to_string(),
                    r#type: OutputItemType::Message,
                    name: None,
                    arguments: None,
                    call_id: None,
                },
            });
            events.push(ResponseStreamEvent::ContentPartAdded {
                part: ContentPart {
                    r#type: "output_text".to_string(),
                    text: None,
                },
            });
        }
        self.text_buffer.push_str(&text);
        events.push(ResponseStreamEvent::OutputTextDelta { delta: text });
        events
    }

    fn emit_reasoning(&mut self, text: String) -> Vec<ResponseStreamEvent> {
        if text.is_empty() {
            Vec::new()
        } else {
            vec![ResponseStreamEvent::ReasoningTextDelta { delta: text }]
        }
    }

    fn start_tool(&mut self, index: u32, id: String, name: String) -> Vec<ResponseStreamEvent> {
        self.tool_blocks.insert(
            index,
            ToolInfo {
                item_id: id.clone(),
                name: name.clone(),
                arguments: String::new(),
            },
        );
        vec![ResponseStreamEvent::OutputItemAdded {
            item: OutputItem {
                id,
                r#type: OutputItemType::FunctionCall,
                name: Some(name),
                arguments: Some(String::new()),
                call_id: None,
            },
        }]
    }

    fn append_tool_arguments(&mut self, index: u32, delta: String) -> Vec<ResponseStreamEvent> {
        let Some(info) = self.tool_blocks.get_mut(&index) else {
            return Vec::new();
        };
        info.arguments.push_str(&delta);
        vec![ResponseStreamEvent::FunctionCallArgumentsDelta {
            item_id: info.item_id.clone(),
            delta,
        }]
    }

    fn finish(&mut self) -> Vec<ResponseStreamEvent> {
        let mut events = Vec::new();
        if self.message_item_open {
            events.push(ResponseStreamEvent::OutputTextDone {
                text: self.text_buffer.clone(),
            });
            let message = OutputItem {
                id: "message".to_string(),
                r#type: OutputItemType::Message,
                name: None,
                arguments: None,
                call_id: None,
            };
            events.push(ResponseStreamEvent::OutputItemDone { item: message.clone() });
            self.output_items.insert(0, message);
        }

        events.push(ResponseStreamEvent::Completed {
            response: ResponseObject {
                id: self.id.clone(),
                model: self.model.clone(),
                output: self.output_items.clone(),
                usage: self.usage,
            },
        });
        events
    }
}
