use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use uuid::Uuid;

use crate::reasoning::{ReasoningChain, ReasoningTree};

use super::{ChatMessage, ModelMessage, ToolCallRequest, ToolExecutionResult};

/// The single source of truth for one agent across restarts.
///
/// Only the orchestrator mutates a state; every other component reads
/// it or receives copies. Turns are dense from 0 and never rewritten
/// once appended.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentState {
    pub agent_id: String,
    /// Immutable after first set.
    pub goal: String,
    #[serde(default)]
    pub turns: Vec<AgentTurn>,
    pub updated_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub current_reasoning_chain: Option<ReasoningChain>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub current_reasoning_tree: Option<ReasoningTree>,
    /// Seed prompts appended after the system message, partitioned by role.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub additional_messages: Vec<ChatMessage>,
    #[serde(default, skip_serializing_if = "Map::is_empty")]
    pub metadata: Map<String, Value>,
}

impl AgentState {
    pub fn new(agent_id: impl Into<String>, goal: impl Into<String>) -> Self {
        Self {
            agent_id: agent_id.into(),
            goal: goal.into(),
            turns: Vec::new(),
            updated_at: Utc::now(),
            current_reasoning_chain: None,
            current_reasoning_tree: None,
            additional_messages: Vec::new(),
            metadata: Map::new(),
        }
    }

    /// Index the next appended turn will get.
    pub fn next_index(&self) -> usize {
        self.turns.len()
    }

    /// Append a turn, fixing its index to keep the log dense.
    pub fn append_turn(&mut self, mut turn: AgentTurn) {
        turn.index = self.turns.len();
        self.turns.push(turn);
        self.updated_at = Utc::now();
    }
}

/// One iteration of the loop: at most one LLM decision and at most one
/// tool invocation set.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentTurn {
    pub index: usize,
    pub turn_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub llm_message: Option<ModelMessage>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool_call: Option<ToolCallRequest>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool_calls: Option<Vec<ToolCallRequest>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool_result: Option<ToolExecutionResult>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool_results: Option<Vec<ToolExecutionResult>>,
    /// True for engine-synthesized controller turns (retry hints,
    /// loop-breakers); they share the monotonic index space with
    /// natural turns.
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub synthetic: bool,
}

impl AgentTurn {
    pub fn new(index: usize) -> Self {
        Self {
            index,
            turn_id: Uuid::new_v4().to_string(),
            llm_message: None,
            tool_call: None,
            tool_calls: None,
            tool_result: None,
            tool_results: None,
            synthetic: false,
        }
    }

    pub fn with_message(mut self, message: ModelMessage) -> Self {
        self.llm_message = Some(message);
        self
    }

    /// Record a single tool call. Clears any parallel set so at most
    /// one of the two is ever present.
    pub fn with_tool_call(mut self, call: ToolCallRequest) -> Self {
        self.tool_call = Some(call);
        self.tool_calls = None;
        self
    }

    pub fn with_tool_result(mut self, result: ToolExecutionResult) -> Self {
        self.tool_result = Some(result);
        self
    }

    pub fn synthetic(mut self) -> Self {
        self.synthetic = true;
        self
    }
}
