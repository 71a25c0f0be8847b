use std::time::Duration;

use crate::reasoning::{ExplorationStrategy, ReasoningType};

/// Options for the [`Orchestrator`](crate::engine::Orchestrator).
#[derive(Debug, Clone)]
pub struct EngineOptions {
    /// Max turns per run; at least 1.
    pub max_turns: usize,
    pub llm_timeout: Duration,
    pub tool_timeout: Duration,
    /// Take the native function-calling path when the adapter supports it.
    pub use_function_calling: bool,
    /// Ask the model for the public status fields and emit `StatusUpdate`s.
    pub emit_public_status: bool,
    /// Turns rendered in full detail; older ones become summaries.
    pub max_recent_turns: usize,
    pub enable_history_summarization: bool,
    /// Truncation threshold for tool outputs in the prompt, in bytes.
    pub max_tool_output_size: usize,
    /// Default freshness window for cached tool results.
    pub dedupe_staleness_threshold: Duration,
    /// Ring size of the loop detector.
    pub max_tool_call_history: usize,
    pub consecutive_failure_threshold: usize,
    pub reasoning_type: ReasoningType,
    pub max_reasoning_steps: usize,
    pub enable_reasoning_validation: bool,
    pub min_reasoning_confidence: f64,
    pub max_tree_depth: usize,
    pub max_tree_nodes: usize,
    pub tree_exploration_strategy: ExplorationStrategy,
    /// Compact tool catalog with shared schemas referenced by id.
    pub use_centralized_schemas: bool,
    /// Loop-detector eviction of inactive agents.
    pub agent_history_ttl: Duration,
    pub max_agent_history: usize,
}

impl Default for EngineOptions {
    fn default() -> Self {
        Self {
            max_turns: 10,
            llm_timeout: Duration::from_secs(60),
            tool_timeout: Duration::from_secs(30),
            use_function_calling: false,
            emit_public_status: false,
            max_recent_turns: 5,
            enable_history_summarization: true,
            max_tool_output_size: 4096,
            dedupe_staleness_threshold: Duration::from_secs(300),
            max_tool_call_history: 20,
            consecutive_failure_threshold: 3,
            reasoning_type: ReasoningType::None,
            max_reasoning_steps: 4,
            enable_reasoning_validation: false,
            min_reasoning_confidence: 0.6,
            max_tree_depth: 3,
            max_tree_nodes: 20,
            tree_exploration_strategy: ExplorationStrategy::BestFirst,
            use_centralized_schemas: false,
            agent_history_ttl: Duration::from_secs(3600),
            max_agent_history: 1000,
        }
    }
}

impl EngineOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_max_turns(mut self, max_turns: usize) -> Self {
        self.max_turns = max_turns.max(1);
        self
    }

    pub fn with_llm_timeout(mut self, timeout: Duration) -> Self {
        self.llm_timeout = timeout;
        self
    }

    pub fn with_tool_timeout(mut self, timeout: Duration) -> Self {
        self.tool_timeout = timeout;
        self
    }

    pub fn with_function_calling(mut self, enabled: bool) -> Self {
        self.use_function_calling = enabled;
        self
    }

    pub fn with_public_status(mut self, enabled: bool) -> Self {
        self.emit_public_status = enabled;
        self
    }

    pub fn with_max_recent_turns(mut self, turns: usize) -> Self {
        self.max_recent_turns = turns;
        self
    }

    pub fn with_history_summarization(mut self, enabled: bool) -> Self {
        self.enable_history_summarization = enabled;
        self
    }

    pub fn with_max_tool_output_size(mut self, bytes: usize) -> Self {
        self.max_tool_output_size = bytes;
        self
    }

    pub fn with_dedupe_staleness_threshold(mut self, ttl: Duration) -> Self {
        self.dedupe_staleness_threshold = ttl;
        self
    }

    pub fn with_max_tool_call_history(mut self, entries: usize) -> Self {
        self.max_tool_call_history = entries;
        self
    }

    pub fn with_consecutive_failure_threshold(mut self, threshold: usize) -> Self {
        self.consecutive_failure_threshold = threshold;
        self
    }

    pub fn with_reasoning_type(mut self, reasoning_type: ReasoningType) -> Self {
        self.reasoning_type = reasoning_type;
        self
    }

    pub fn with_max_reasoning_steps(mut self, steps: usize) -> Self {
        self.max_reasoning_steps = steps;
        self
    }

    pub fn with_reasoning_validation(mut self, enabled: bool) -> Self {
        self.enable_reasoning_validation = enabled;
        self
    }

    pub fn with_min_reasoning_confidence(mut self, confidence: f64) -> Self {
        self.min_reasoning_confidence = confidence.clamp(0.0, 1.0);
        self
    }

    pub fn with_max_tree_depth(mut self, depth: usize) -> Self {
        self.max_tree_depth = depth;
        self
    }

    pub fn with_max_tree_nodes(mut self, nodes: usize) -> Self {
        self.max_tree_nodes = nodes;
        self
    }

    pub fn with_tree_exploration_strategy(mut self, strategy: ExplorationStrategy) -> Self {
        self.tree_exploration_strategy = strategy;
        self
    }

    pub fn with_centralized_schemas(mut self, enabled: bool) -> Self {
        self.use_centralized_schemas = enabled;
        self
    }

    pub fn with_agent_history_ttl(mut self, ttl: Duration) -> Self {
        self.agent_history_ttl = ttl;
        self
    }

    pub fn with_max_agent_history(mut self, agents: usize) -> Self {
        self.max_agent_history = agents;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn max_turns_is_at_least_one() {
        let options = EngineOptions::new().with_max_turns(0);
        assert_eq!(options.max_turns, 1);
    }

    #[test]
    fn builders_compose() {
        let options = EngineOptions::new()
            .with_max_turns(3)
            .with_function_calling(true)
            .with_reasoning_type(ReasoningType::TreeOfThoughts)
            .with_tree_exploration_strategy(ExplorationStrategy::BeamSearch);
        assert_eq!(options.max_turns, 3);
        assert!(options.use_function_calling);
        assert_eq!(options.reasoning_type, ReasoningType::TreeOfThoughts);
    }
}
