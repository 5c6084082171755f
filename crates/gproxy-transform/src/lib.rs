//! The streaming protocol translator (spec §4.5): converts between OpenAI
//! Chat-Completions, OpenAI Responses, and Anthropic Messages event
//! streams, assembling a coherent Anthropic message from fragmented
//! deltas while preserving tool-use, thinking, and refusal blocks.

pub mod anthropic_to_openai_chat;
pub mod anthropic_to_openai_responses;
pub mod assembler;
pub mod block_tracker;
pub mod finish_reason;
pub mod openai_chat_to_anthropic;
pub mod openai_responses_to_anthropic;

pub use block_tracker::BlockTracker;
