//! Shared block-index bookkeeping for the upstream → Anthropic direction
//! (spec §3 `StreamState`, §8 invariants 1/2/3/5). Both the Chat-Completions
//! and Responses-API translators open/close the same four "singleton"
//! block kinds (text, thinking, refusal, reasoning-summary) plus an
//! arbitrary number of tool-use blocks, so the index arithmetic and the
//! stop-idempotence guarantee live here once.

use std::collections::HashMap;

/// How an upstream identifies "this fragment belongs to the same tool
/// call as that earlier fragment". Chat-Completions numbers tool calls by
/// a small integer; the Responses API keys them by opaque item id.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum ToolKey {
    Index(i64),
    Item(String),
}

#[derive(Debug, Clone)]
pub struct PendingTool {
    pub block_index: u32,
    pub id: String,
    pub name: String,
    pub arguments: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Singleton {
    Text,
    Thinking,
    Refusal,
    ReasoningSummary,
}

#[derive(Debug, Default)]
pub struct BlockTracker {
    next_block_index: u32,
    text_block_index: Option<u32>,
    thinking_block_index: Option<u32>,
    refusal_block_index: Option<u32>,
    reasoning_summary_block_index: Option<u32>,
    tool_blocks: HashMap<ToolKey, PendingTool>,
    stopped_blocks: std::collections::HashSet<u32>,
    pub input_tokens: u64,
    pub output_tokens: u64,
}

impl BlockTracker {
    pub fn new() -> Self {
        Self::default()
    }

    fn alloc_index(&mut self) -> u32 {
        let index = self.next_block_index;
        self.next_block_index += 1;
        index
    }

    fn slot(&mut self, kind: Singleton) -> &mut Option<u32> {
        match kind {
            Singleton::Text => &mut self.text_block_index,
            Singleton::Thinking => &mut self.thinking_block_index,
            Singleton::Refusal => &mut self.refusal_block_index,
            Singleton::ReasoningSummary => &mut self.reasoning_summary_block_index,
        }
    }

    /// Returns `(index, just_opened)`. The caller emits a `content_block_start`
    /// only when `just_opened` is true.
    pub fn open_singleton(&mut self, kind: Singleton) -> (u32, bool) {
        if let Some(index) = *self.slot(kind) {
            return (index, false);
        }
        let index = self.alloc_index();
        *self.slot(kind) = Some(index);
        (index, true)
    }

    pub fn singleton_index(&self, kind: Singleton) -> Option<u32> {
        match kind {
            Singleton::Text => self.text_block_index,
            Singleton::Thinking => self.thinking_block_index,
            Singleton::Refusal => self.refusal_block_index,
            Singleton::ReasoningSummary => self.reasoning_summary_block_index,
        }
    }

    /// Returns `(block_index, just_opened)` for the tool call keyed by
    /// `key`, inserting a fresh pending-tool-call entry (§3 invariant: one
    /// `pending_tool_calls` entry per open tool-use block) the first time.
    pub fn tool_block(
        &mut self,
        key: ToolKey,
        id: impl Into<String>,
        name: impl Into<String>,
    ) -> (u32, bool) {
        if let Some(existing) = self.tool_blocks.get(&key) {
            return (existing.block_index, false);
        }
        let block_index = self.alloc_index();
        self.tool_blocks.insert(
            key,
            PendingTool {
                block_index,
                id: id.into(),
                name: name.into(),
                arguments: String::new(),
            },
        );
        (block_index, true)
    }

    pub fn tool_by_key(&self, key: &ToolKey) -> Option<&PendingTool> {
        self.tool_blocks.get(key)
    }

    pub fn append_tool_args(&mut self, key: &ToolKey, fragment: &str) {
        if let Some(tool) = self.tool_blocks.get_mut(key) {
            tool.arguments.push_str(fragment);
        }
    }

    /// Marks `index` stopped. Returns `true` the first time (the caller
    /// should emit `content_block_stop`); returns `false` on any
    /// subsequent call for the same index, satisfying the idempotent-stop
    /// property (spec §8 invariant 5).
    pub fn stop(&mut self, index: u32) -> bool {
        self.stopped_blocks.insert(index)
    }

    /// Every currently-open block (singletons plus tool-use blocks) that
    /// has not yet been stopped, in ascending index order. Marks them all
    /// stopped as a side effect so a second sweep is a no-op.
    pub fn close_open(&mut self) -> Vec<u32> {
        let mut open: Vec<u32> = [
            self.text_block_index,
            self.thinking_block_index,
            self.refusal_block_index,
            self.reasoning_summary_block_index,
        ]
        .into_iter()
        .flatten()
        .chain(self.tool_blocks.values().map(|tool| tool.block_index))
        .filter(|index| !self.stopped_blocks.contains(index))
        .collect();
        open.sort_unstable();
        for index in &open {
            self.stopped_blocks.insert(*index);
        }
        open
    }
}

/// Anthropic tool-use ids are capped at 40 characters; longer upstream ids
/// are truncated with a trailing `...` marker (spec §4.5.2, §8 invariant 3).
pub fn truncate_tool_id(id: &str) -> String {
    const MAX: usize = 40;
    if id.chars().count() <= MAX {
        return id.to_string();
    }
    let prefix: String = id.chars().take(MAX - 3).collect();
    format!("{prefix}...")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn singleton_opens_once() {
        let mut tracker = BlockTracker::new();
        let (a, opened_a) = tracker.open_singleton(Singleton::Text);
        let (b, opened_b) = tracker.open_singleton(Singleton::Text);
        assert_eq!(a, b);
        assert!(opened_a);
        assert!(!opened_b);
    }

    #[test]
    fn distinct_singletons_get_distinct_monotone_indices() {
        let mut tracker = BlockTracker::new();
        let (thinking, _) = tracker.open_singleton(Singleton::Thinking);
        let (text, _) = tracker.open_singleton(Singleton::Text);
        assert_eq!(thinking, 0);
        assert_eq!(text, 1);
    }

    #[test]
    fn stop_is_idempotent() {
        let mut tracker = BlockTracker::new();
        let (index, _) = tracker.open_singleton(Singleton::Text);
        assert!(tracker.stop(index));
        assert!(!tracker.stop(index));
    }

    #[test]
    fn close_open_only_returns_unstopped_once() {
        let mut tracker = BlockTracker::new();
        tracker.open_singleton(Singleton::Text);
        tracker.open_singleton(Singleton::Thinking);
        let first = tracker.close_open();
        assert_eq!(first, vec![0, 1]);
        let second = tracker.close_open();
        assert!(second.is_empty());
    }

    #[test]
    fn truncates_long_tool_ids_with_ellipsis() {
        let id = "a".repeat(50);
        let truncated = truncate_tool_id(&id);
        assert_eq!(truncated.len(), 40);
        assert!(truncated.ends_with("..."));
    }

    #[test]
    fn short_tool_ids_pass_through() {
        assert_eq!(truncate_tool_id("short"), "short");
    }
}
