//! Result cache over the turn log.
//!
//! A new tool call first looks for the most recent successful result
//! with the same canonical hash inside the freshness window. Cached
//! failures are never reused, and parallel call sets are never merged
//! into one lookup.

use std::time::Duration;

use chrono::Utc;

use crate::schemas::{AgentState, ToolExecutionResult};
use crate::tools::Tool;

pub struct Deduplicator {
    default_ttl: Duration,
}

impl Deduplicator {
    pub fn new(default_ttl: Duration) -> Self {
        Self { default_ttl }
    }

    /// The freshness window for one tool: its own override, else the
    /// engine default.
    pub fn effective_ttl(&self, tool: &dyn Tool) -> Duration {
        tool.cache_ttl().unwrap_or(self.default_ttl)
    }

    /// Find a reusable result for `dedupe_id`, newest first.
    ///
    /// Returns `None` when the tool opts out of deduplication, when no
    /// successful result exists, or when the newest match is stale.
    pub fn try_lookup(
        &self,
        state: &AgentState,
        tool: &dyn Tool,
        dedupe_id: &str,
    ) -> Option<ToolExecutionResult> {
        if !tool.allow_dedupe() {
            return None;
        }
        let ttl = match chrono::Duration::from_std(self.effective_ttl(tool)) {
            Ok(ttl) => ttl,
            Err(_) => chrono::Duration::MAX,
        };
        let now = Utc::now();

        for turn in state.turns.iter().rev() {
            let results = turn
                .tool_result
                .iter()
                .chain(turn.tool_results.iter().flatten());
            for result in results {
                if result.turn_id == dedupe_id
                    && result.success
                    && now - result.created_at <= ttl
                {
                    return Some(result.clone());
                }
            }
        }
        None
    }
}
