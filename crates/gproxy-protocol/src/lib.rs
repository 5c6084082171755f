//! Wire types and framing for the three client/upstream dialects this
//! gateway speaks: OpenAI Chat Completions, OpenAI Responses, and
//! Anthropic Messages.

pub mod anthropic;
pub mod openai;
pub mod sse;
