//! Passive Anthropic-stream → `Message` assembler (spec §4.5.4). Consumes
//! the same `StreamEvent`s the translators emit and accumulates them into
//! a single non-streaming `Message`, the shape the recording layer writes
//! to disk and the shape a client asking for `stream: false` expects.

use std::collections::BTreeMap;

use gproxy_protocol::anthropic::stream::{
    StreamContentBlock, StreamContentBlockDelta, StreamEvent, StreamEventKnown,
};
use gproxy_protocol::anthropic::types::{ContentBlock, Message, TextBlock, ThinkingBlock, ToolUseBlock, Usage};

#[derive(Debug, Clone)]
pub struct Assembler {
    message: Option<Message>,
    stream_blocks: BTreeMap<u32, StreamContentBlock>,
    pending_json: BTreeMap<u32, String>,
}

impl Assembler {
    pub fn new() -> Self {
        Self {
            message: None,
            stream_blocks: BTreeMap::new(),
            pending_json: BTreeMap::new(),
        }
    }

    /// Feed one event; returns the finished `Message` once `message_stop`
    /// arrives. Bare duplicate `message_stop` lines (`StreamEvent::Unknown`)
    /// are ignored: the first `message_stop` already finalized the message.
    pub fn push(&mut self, event: StreamEvent) -> Option<Message> {
        let StreamEvent::Known(known) = event else {
            return None;
        };
        match known {
            StreamEventKnown::MessageStart { message } => {
                self.message = Some(Message {
                    id: message.id,
                    content: Vec::new(),
                    model: message.model,
                    role: message.role,
                    stop_reason: message.stop_reason,
                    stop_sequence: message.stop_sequence,
                    r#type: message.r#type,
                    usage: Usage {
                        input_tokens: message.usage.input_tokens,
                        output_tokens: message.usage.output_tokens,
                    },
                });
                None
            }
            StreamEventKnown::ContentBlockStart { index, content_block } => {
                self.stream_blocks.insert(index, content_block);
                None
            }
            StreamEventKnown::ContentBlockDelta { index, delta } => {
                self.apply_delta(index, delta);
                None
            }
            StreamEventKnown::ContentBlockStop { index } => {
                self.finish_block(index);
                None
            }
            StreamEventKnown::MessageDelta { delta, usage } => {
                if let Some(message) = self.message.as_mut() {
                    if delta.stop_reason.is_some() {
                        message.stop_reason = delta.stop_reason;
                    }
                    if delta.stop_sequence.is_some() {
                        message.stop_sequence = delta.stop_sequence;
                    }
                    message.usage = Usage {
                        input_tokens: usage.input_tokens,
                        output_tokens: usage.output_tokens,
                    };
                }
                None
            }
            StreamEventKnown::MessageStop => self.finalize(),
            StreamEventKnown::Ping => None,
            StreamEventKnown::Error { .. } => None,
        }
    }

    /// Finalize without a `message_stop` ever arriving (upstream connection
    /// dropped mid-stream). Any blocks still open are closed in place so the
    /// assembled message is never missing whatever content did arrive.
    pub fn finalize_on_eof(&mut self) -> Option<Message> {
        let open_indices: Vec<u32> = self.stream_blocks.keys().copied().collect();
        for index in open_indices {
            self.finish_block(index);
        }
        self.finalize()
    }

    fn finalize(&mut self) -> Option<Message> {
        let mut message = self.message.take()?;
        let content_blocks = std::mem::take(&mut self.stream_blocks);
        message.content = content_blocks
            .into_iter()
            .map(|(_, block)| map_block(block, &message.id))
            .collect();
        Some(message)
    }

    fn apply_delta(&mut self, index: u32, delta: StreamContentBlockDelta) {
        match delta {
            StreamContentBlockDelta::TextDelta { text } => {
                if let Some(StreamContentBlock::Text(block)) = self.stream_blocks.get_mut(&index) {
                    block.text.push_str(&text);
                }
            }
            StreamContentBlockDelta::ThinkingDelta { thinking } => {
                if let Some(StreamContentBlock::Thinking(block)) = self.stream_blocks.get_mut(&index) {
                    block.thinking.push_str(&thinking);
                }
            }
            StreamContentBlockDelta::SignatureDelta { signature } => {
                if let Some(StreamContentBlock::Thinking(block)) = self.stream_blocks.get_mut(&index) {
                    match &mut block.signature {
                        Some(existing) => existing.push_str(&signature),
                        None => block.signature = Some(signature),
                    }
                }
            }
            StreamContentBlockDelta::InputJsonDelta { partial_json } => {
                self.pending_json
                    .entry(index)
                    .and_modify(|value| value.push_str(&partial_json))
                    .or_insert(partial_json);
            }
        }
    }

    fn finish_block(&mut self, index: u32) {
        let Some(mut block) = self.stream_blocks.remove(&index) else {
            // Already finished, or content_block_stop arrived before the
            // matching content_block_start: nothing to do either way.
            return;
        };

        if let StreamContentBlock::ToolUse(tool) = &mut block
            && let Some(json) = self.pending_json.remove(&index)
        {
            if let Ok(parsed) = serde_json::from_str::<serde_json::Value>(&json)
                && let Some(object) = parsed.as_object()
            {
                tool.input = object.iter().map(|(k, v)| (k.clone(), v.clone())).collect();
            }
        }

        self.stream_blocks.insert(index, block);
    }
}

impl Default for Assembler {
    fn default() -> Self {
        Self::new()
    }
}

/// Upstreams frequently omit a thinking signature outright; fabricate
/// `sig_<message id>` rather than leave the field empty, so a round-tripped
/// message always carries a signature a client can echo back.
fn map_block(block: StreamContentBlock, message_id: &str) -> ContentBlock {
    match block {
        StreamContentBlock::Text(text) => ContentBlock::Text(TextBlock {
            text: text.text,
            r#type: text.r#type,
        }),
        StreamContentBlock::Thinking(thinking) => ContentBlock::Thinking(ThinkingBlock {
            signature: Some(thinking.signature.unwrap_or_else(|| format!("sig_{message_id}"))),
            thinking: thinking.thinking,
            r#type: thinking.r#type,
        }),
        StreamContentBlock::ToolUse(tool) => ContentBlock::ToolUse(ToolUseBlock {
            id: tool.id,
            input: tool.input,
            name: tool.name,
            r#type: tool.r#type,
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use gproxy_protocol::anthropic::stream::{
        StreamMessage, StreamTextBlock, StreamThinkingBlock, StreamUsage,
    };
    use gproxy_protocol::anthropic::types::{
        JsonObject, MessageRole, MessageType, Model, StopReason, TextBlockType, ThinkingBlockType,
    };

    fn started(id: &str) -> StreamEvent {
        StreamEvent::Known(StreamEventKnown::MessageStart {
            message: StreamMessage {
                id: id.to_string(),
                content: Vec::new(),
                model: Model::custom("test-model"),
                role: MessageRole::Assistant,
                stop_reason: None,
                stop_sequence: None,
                r#type: MessageType::Message,
                usage: StreamUsage::default(),
            },
        })
    }

    #[test]
    fn assembles_text_block_across_deltas_in_index_order() {
        let mut assembler = Assembler::new();
        assembler.push(started("msg_1"));
        assembler.push(StreamEvent::Known(StreamEventKnown::ContentBlockStart {
            index: 0,
            content_block: StreamContentBlock::Text(StreamTextBlock {
                text: String::new(),
                r#type: TextBlockType::Text,
            }),
        }));
        assembler.push(StreamEvent::Known(StreamEventKnown::ContentBlockDelta {
            index: 0,
            delta: StreamContentBlockDelta::TextDelta {
                text: "hello ".to_string(),
            },
        }));
        assembler.push(StreamEvent::Known(StreamEventKnown::ContentBlockDelta {
            index: 0,
            delta: StreamContentBlockDelta::TextDelta {
                text: "world".to_string(),
            },
        }));
        assembler.push(StreamEvent::Known(StreamEventKnown::ContentBlockStop { index: 0 }));
        let message = assembler
            .push(StreamEvent::Known(StreamEventKnown::MessageStop))
            .expect("message finalized");

        assert_eq!(message.content.len(), 1);
        match &message.content[0] {
            ContentBlock::Text(text) => assert_eq!(text.text, "hello world"),
            other => panic!("expected text block, got {other:?}"),
        }
    }

    #[test]
    fn fabricates_signature_when_upstream_omits_one() {
        let mut assembler = Assembler::new();
        assembler.push(started("msg_2"));
        assembler.push(StreamEvent::Known(StreamEventKnown::ContentBlockStart {
            index: 0,
            content_block: StreamContentBlock::Thinking(StreamThinkingBlock {
                signature: None,
                thinking: String::new(),
                r#type: ThinkingBlockType::Thinking,
            }),
        }));
        assembler.push(StreamEvent::Known(StreamEventKnown::ContentBlockDelta {
            index: 0,
            delta: StreamContentBlockDelta::ThinkingDelta {
                thinking: "reasoning".to_string(),
            },
        }));
        assembler.push(StreamEvent::Known(StreamEventKnown::ContentBlockStop { index: 0 }));
        let message = assembler
            .push(StreamEvent::Known(StreamEventKnown::MessageStop))
            .expect("message finalized");

        match &message.content[0] {
            ContentBlock::Thinking(thinking) => assert_eq!(thinking.signature.as_deref(), Some("sig_msg_2")),
            other => panic!("expected thinking block, got {other:?}"),
        }
    }

    #[test]
    fn tool_use_input_parses_accumulated_json_fragments() {
        let mut assembler = Assembler::new();
        assembler.push(started("msg_3"));
        assembler.push(StreamEvent::Known(StreamEventKnown::ContentBlockStart {
            index: 0,
            content_block: StreamContentBlock::ToolUse(
                gproxy_protocol::anthropic::stream::StreamToolUseBlock {
                    id: "tool_1".to_string(),
                    input: JsonObject::new(),
                    name: "lookup".to_string(),
                    r#type: gproxy_protocol::anthropic::types::ToolUseBlockType::ToolUse,
                },
            ),
        }));
        assembler.push(StreamEvent::Known(StreamEventKnown::ContentBlockDelta {
            index: 0,
            delta: StreamContentBlockDelta::InputJsonDelta {
                partial_json: "{\"q\":".to_string(),
            },
        }));
        assembler.push(StreamEvent::Known(StreamEventKnown::ContentBlockDelta {
            index: 0,
            delta: StreamContentBlockDelta::InputJsonDelta {
                partial_json: "1}".to_string(),
            },
        }));
        assembler.push(StreamEvent::Known(StreamEventKnown::ContentBlockStop { index: 0 }));
        let message = assembler
            .push(StreamEvent::Known(StreamEventKnown::MessageStop))
            .expect("message finalized");

        match &message.content[0] {
            ContentBlock::ToolUse(tool) => {
                assert_eq!(tool.input.get("q").and_then(|v| v.as_i64()), Some(1));
            }
            other => panic!("expected tool_use block, got {other:?}"),
        }
    }

    #[test]
    fn eof_without_message_stop_closes_open_blocks() {
        let mut assembler = Assembler::new();
        assembler.push(started("msg_4"));
        assembler.push(StreamEvent::Known(StreamEventKnown::ContentBlockStart {
            index: 0,
            content_block: StreamContentBlock::Text(StreamTextBlock {
                text: String::new(),
                r#type: TextBlockType::Text,
            }),
        }));
        assembler.push(StreamEvent::Known(StreamEventKnown::ContentBlockDelta {
            index: 0,
            delta: StreamContentBlockDelta::TextDelta {
                text: "cut off".to_string(),
            },
        }));
        let message = assembler.finalize_on_eof().expect("message finalized on eof");
        assert_eq!(message.content.len(), 1);
    }

    #[test]
    fn stop_reason_from_message_delta_overrides_message_start() {
        let mut assembler = Assembler::new();
        assembler.push(started("msg_5"));
        assembler.push(StreamEvent::Known(StreamEventKnown::MessageDelta {
            delta: gproxy_protocol::anthropic::stream::StreamMessageDelta {
                stop_reason: Some(StopReason::EndTurn),
                stop_sequence: None,
                extra: Default::default(),
            },
            usage: StreamUsage {
                input_tokens: Some(3),
                output_tokens: Some(4),
            },
        }));
        let message = assembler
            .push(StreamEvent::Known(StreamEventKnown::MessageStop))
            .expect("message finalized");
        assert_eq!(message.stop_reason, Some(StopReason::EndTurn));
        assert_eq!(message.usage.input_tokens, Some(3));
    }
}
