use gproxy_protocol::anthropic::types::StopReason;
use gproxy_protocol::openai::chat::FinishReason as ChatFinishReason;

/// Chat-Completions `finish_reason` → Anthropic `stop_reason` (spec §4.5.2).
pub fn chat_finish_to_anthropic(reason: ChatFinishReason) -> StopReason {
    match reason {
        ChatFinishReason::Stop => StopReason::EndTurn,
        ChatFinishReason::Length => StopReason::MaxTokens,
        ChatFinishReason::ToolCalls | ChatFinishReason::FunctionCall => StopReason::ToolUse,
        ChatFinishReason::ContentFilter => StopReason::Refusal,
    }
}

/// The inverse mapping used by the Anthropic → Chat-Completions direction.
pub fn anthropic_stop_to_chat_finish(reason: StopReason) -> ChatFinishReason {
    match reason {
        StopReason::EndTurn | StopReason::StopSequence | StopReason::PauseTurn => {
            ChatFinishReason::Stop
        }
        StopReason::MaxTokens => ChatFinishReason::Length,
        StopReason::ToolUse => ChatFinishReason::ToolCalls,
        StopReason::Refusal => ChatFinishReason::ContentFilter,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn chat_to_anthropic_mapping_matches_spec_table() {
        assert_eq!(chat_finish_to_anthropic(ChatFinishReason::Stop), StopReason::EndTurn);
        assert_eq!(chat_finish_to_anthropic(ChatFinishReason::Length), StopReason::MaxTokens);
        assert_eq!(chat_finish_to_anthropic(ChatFinishReason::ToolCalls), StopReason::ToolUse);
        assert_eq!(
            chat_finish_to_anthropic(ChatFinishReason::ContentFilter),
            StopReason::Refusal
        );
    }

    #[test]
    fn round_trip_stop_tool_use() {
        assert_eq!(
            anthropic_stop_to_chat_finish(StopReason::ToolUse),
            ChatFinishReason::ToolCalls
        );
    }
}
