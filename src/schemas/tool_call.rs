use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::hash::dedupe_key;

/// A request to invoke one tool.
///
/// `turn_id` is the canonical dedupe hash of `(tool, params)`, not a
/// fresh identifier; repeated calls with equal parameters share it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolCallRequest {
    pub tool: String,
    pub params: Value,
    pub turn_id: String,
}

impl ToolCallRequest {
    pub fn new<S: Into<String>>(tool: S, params: Value) -> Self {
        let tool = tool.into();
        let turn_id = dedupe_key(&tool, &params);
        Self {
            tool,
            params,
            turn_id,
        }
    }
}

/// Machine-readable classifier carried in the `output` of a failed
/// tool result.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum FailureKind {
    ValidationError {
        #[serde(default, skip_serializing_if = "Vec::is_empty")]
        missing: Vec<String>,
        #[serde(default, skip_serializing_if = "Vec::is_empty")]
        errors: Vec<String>,
    },
    Timeout,
    ToolError,
}

/// Outcome of one tool invocation (or one cache reuse of it).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolExecutionResult {
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub output: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub tool: String,
    pub params: Value,
    /// Dedupe hash of `(tool, params)`.
    pub turn_id: String,
    pub execution_time: Duration,
    pub created_at: DateTime<Utc>,
}

impl ToolExecutionResult {
    pub fn success(
        tool: impl Into<String>,
        params: Value,
        turn_id: impl Into<String>,
        output: Value,
        execution_time: Duration,
    ) -> Self {
        Self {
            success: true,
            output: Some(output),
            error: None,
            tool: tool.into(),
            params,
            turn_id: turn_id.into(),
            execution_time,
            created_at: Utc::now(),
        }
    }

    pub fn failure(
        tool: impl Into<String>,
        params: Value,
        turn_id: impl Into<String>,
        kind: FailureKind,
        error: impl Into<String>,
        execution_time: Duration,
    ) -> Self {
        let output = serde_json::to_value(&kind).ok();
        Self {
            success: false,
            output,
            error: Some(error.into()),
            tool: tool.into(),
            params,
            turn_id: turn_id.into(),
            execution_time,
            created_at: Utc::now(),
        }
    }

    /// Failure with no classifier payload (unknown tool).
    pub fn rejected(
        tool: impl Into<String>,
        params: Value,
        turn_id: impl Into<String>,
        error: impl Into<String>,
    ) -> Self {
        Self {
            success: false,
            output: None,
            error: Some(error.into()),
            tool: tool.into(),
            params,
            turn_id: turn_id.into(),
            execution_time: Duration::ZERO,
            created_at: Utc::now(),
        }
    }

    /// Re-parse the failure classifier out of `output`, if any.
    pub fn failure_kind(&self) -> Option<FailureKind> {
        if self.success {
            return None;
        }
        self.output
            .clone()
            .and_then(|v| serde_json::from_value(v).ok())
    }
}
