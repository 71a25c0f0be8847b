use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Maximum length of the public `status_title` field.
pub const STATUS_TITLE_MAX: usize = 60;
/// Maximum length of the public `status_details` field.
pub const STATUS_DETAILS_MAX: usize = 160;

/// The decision decoded from a single LLM response.
///
/// `thoughts` is the model's private reasoning and is never required to
/// surface anywhere; the `status_*` fields are the opt-in public status
/// the model may attach for UIs.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelMessage {
    #[serde(default)]
    pub thoughts: String,
    pub action: AgentAction,
    #[serde(default)]
    pub action_input: ActionInput,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status_title: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status_details: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub next_step_hint: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub progress_pct: Option<u8>,
}

/// What the model chose to do this turn.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AgentAction {
    Plan,
    ToolCall,
    Finish,
    Retry,
}

/// Payload of a [`ModelMessage`], shaped by its action.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ActionInput {
    Tool {
        tool: String,
        #[serde(default = "empty_object")]
        params: Value,
    },
    Final {
        #[serde(rename = "final")]
        text: String,
    },
    Summary {
        summary: String,
    },
    #[default]
    Empty,
    /// Anything else the model sent; kept verbatim so the turn log
    /// stays faithful.
    Other(Value),
}

fn empty_object() -> Value {
    Value::Object(serde_json::Map::new())
}

impl ModelMessage {
    pub fn new(action: AgentAction, action_input: ActionInput) -> Self {
        Self {
            thoughts: String::new(),
            action,
            action_input,
            status_title: None,
            status_details: None,
            next_step_hint: None,
            progress_pct: None,
        }
    }

    pub fn tool_call<S: Into<String>>(tool: S, params: Value) -> Self {
        Self::new(
            AgentAction::ToolCall,
            ActionInput::Tool {
                tool: tool.into(),
                params,
            },
        )
    }

    pub fn finish<S: Into<String>>(text: S) -> Self {
        Self::new(AgentAction::Finish, ActionInput::Final { text: text.into() })
    }

    pub fn retry<S: Into<String>>(summary: S) -> Self {
        Self::new(
            AgentAction::Retry,
            ActionInput::Summary {
                summary: summary.into(),
            },
        )
    }

    pub fn with_thoughts<S: Into<String>>(mut self, thoughts: S) -> Self {
        self.thoughts = thoughts.into();
        self
    }

    /// Whether any public status field is present.
    pub fn has_status(&self) -> bool {
        self.status_title.is_some()
            || self.status_details.is_some()
            || self.next_step_hint.is_some()
            || self.progress_pct.is_some()
    }

    /// Clamp public status fields to their wire limits.
    pub fn sanitize_status(&mut self) {
        if let Some(title) = &mut self.status_title {
            truncate_chars(title, STATUS_TITLE_MAX);
        }
        if let Some(details) = &mut self.status_details {
            truncate_chars(details, STATUS_DETAILS_MAX);
        }
        if let Some(pct) = &mut self.progress_pct {
            *pct = (*pct).min(100);
        }
    }
}

fn truncate_chars(s: &mut String, max: usize) {
    if let Some((idx, _)) = s.char_indices().nth(max) {
        s.truncate(idx);
    }
}
