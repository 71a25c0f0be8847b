use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::schemas::{AgentState, TokenUsage};

/// Why a run terminated without a final answer.
///
/// Recoverable conditions (tool failures, LLM timeouts, parse errors)
/// never end a run by themselves; they surface as failure turns the
/// model can react to. These are the terminal ones.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    Cancelled,
    MaxTurnsExceeded,
    StateSaveFailed,
}

/// What the caller gets back from one run.
#[derive(Debug)]
pub struct RunOutcome {
    pub succeeded: bool,
    pub final_output: Option<String>,
    pub error: Option<String>,
    pub error_kind: Option<ErrorKind>,
    /// LLM decisions accepted during this run.
    pub total_turns: usize,
    pub duration: Duration,
    pub usage: Option<TokenUsage>,
    /// Final state snapshot; `None` only when the run was cancelled
    /// before it touched anything.
    pub state: Option<AgentState>,
}
