//! Assembly of the full LLM input for one turn.

use std::sync::Arc;

use crate::schemas::{AgentState, ChatMessage, MessageRole};
use crate::tools::Tool;

use super::catalog::{centralized_catalog, verbose_catalog};
use super::history::{render_history, HistoryOptions};
use super::templates::{NO_TOOLS_NOTE, STATUS_CONTRACT, SYSTEM_PROMPT};

pub struct MessageBuilder {
    pub emit_public_status: bool,
    pub use_centralized_schemas: bool,
    pub max_recent_turns: usize,
    pub enable_history_summarization: bool,
    pub max_tool_output_size: usize,
}

impl MessageBuilder {
    /// Build the prompt: system contract (+ optional status contract
    /// and tool catalog), seed messages partitioned system →
    /// assistant → user, then the goal and turn history as the final
    /// user message.
    pub fn build(&self, state: &AgentState, tools: &[Arc<dyn Tool>]) -> Vec<ChatMessage> {
        let mut system = SYSTEM_PROMPT.to_string();
        if self.emit_public_status {
            system.push_str(STATUS_CONTRACT);
        }
        if tools.is_empty() {
            system.push_str(NO_TOOLS_NOTE);
        } else if self.use_centralized_schemas {
            system.push_str(&centralized_catalog(tools));
        } else {
            system.push_str(&verbose_catalog(tools));
        }
        if let Some(context) = reasoning_context(state) {
            system.push_str("\n<REASONING_CONTEXT>\n");
            system.push_str(&context);
            system.push_str("\n</REASONING_CONTEXT>\n");
        }

        let mut messages = vec![ChatMessage::new_system(system)];
        for role in [MessageRole::System, MessageRole::Assistant, MessageRole::User] {
            messages.extend(
                state
                    .additional_messages
                    .iter()
                    .filter(|m| m.role == role)
                    .cloned(),
            );
        }

        let history = render_history(
            state,
            &HistoryOptions {
                max_recent_turns: self.max_recent_turns,
                enable_summarization: self.enable_history_summarization,
                max_tool_output_size: self.max_tool_output_size,
            },
        );
        messages.push(ChatMessage::new_user(format!(
            "GOAL: {}\n\n{}",
            state.goal, history
        )));

        messages
    }
}

/// Conclusion of a prior reasoning consult, surfaced back to the model.
fn reasoning_context(state: &AgentState) -> Option<String> {
    if let Some(chain) = &state.current_reasoning_chain {
        if let Some(conclusion) = &chain.conclusion {
            return Some(conclusion.clone());
        }
    }
    if let Some(tree) = &state.current_reasoning_tree {
        let thoughts: Vec<&str> = tree
            .best_path
            .iter()
            .filter_map(|id| tree.nodes.get(id))
            .map(|n| n.thought.as_str())
            .collect();
        if !thoughts.is_empty() {
            return Some(thoughts.join(" -> "));
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use std::error::Error;

    use async_trait::async_trait;
    use serde_json::Value;
    use tokio_util::sync::CancellationToken;

    use super::*;

    struct EchoTool;

    #[async_trait]
    impl Tool for EchoTool {
        fn name(&self) -> String {
            "echo".into()
        }
        fn description(&self) -> String {
            "Echoes its input".into()
        }
        async fn invoke(
            &self,
            params: Value,
            _cancel: CancellationToken,
        ) -> Result<Value, Box<dyn Error + Send + Sync>> {
            Ok(params)
        }
    }

    fn builder() -> MessageBuilder {
        MessageBuilder {
            emit_public_status: false,
            use_centralized_schemas: false,
            max_recent_turns: 5,
            enable_history_summarization: true,
            max_tool_output_size: 4096,
        }
    }

    #[test]
    fn system_then_history_for_a_fresh_state() {
        let state = AgentState::new("a1", "say hello");
        let messages = builder().build(&state, &[]);

        assert_eq!(messages.len(), 2);
        assert_eq!(messages[0].role, MessageRole::System);
        assert!(messages[0].content.contains("No tools are available"));
        assert_eq!(messages[1].role, MessageRole::User);
        assert!(messages[1].content.starts_with("GOAL: say hello"));
    }

    #[test]
    fn tool_catalog_is_included() {
        let state = AgentState::new("a1", "goal");
        let tools: Vec<Arc<dyn Tool>> = vec![Arc::new(EchoTool)];
        let messages = builder().build(&state, &tools);
        assert!(messages[0].content.contains("> echo: Echoes its input"));
    }

    #[test]
    fn status_contract_is_opt_in() {
        let state = AgentState::new("a1", "goal");
        let without = builder().build(&state, &[]);
        assert!(!without[0].content.contains("PUBLIC_STATUS"));

        let mut with_status = builder();
        with_status.emit_public_status = true;
        let with = with_status.build(&state, &[]);
        assert!(with[0].content.contains("PUBLIC_STATUS"));
    }

    #[test]
    fn seed_messages_are_partitioned_by_role() {
        let mut state = AgentState::new("a1", "goal");
        state.additional_messages = vec![
            ChatMessage::new_user("u1"),
            ChatMessage::new_system("s1"),
            ChatMessage::new_assistant("a1"),
            ChatMessage::new_user("u2"),
        ];
        let messages = builder().build(&state, &[]);

        let roles: Vec<MessageRole> = messages.iter().map(|m| m.role).collect();
        assert_eq!(
            roles,
            vec![
                MessageRole::System,
                MessageRole::System,
                MessageRole::Assistant,
                MessageRole::User,
                MessageRole::User,
                MessageRole::User,
            ]
        );
        assert_eq!(messages[3].content, "u1");
        assert_eq!(messages[4].content, "u2");
    }

    #[test]
    fn centralized_mode_uses_schema_references() {
        let state = AgentState::new("a1", "goal");
        let mut centralized = builder();
        centralized.use_centralized_schemas = true;
        let tools: Vec<Arc<dyn Tool>> = vec![Arc::new(EchoTool)];
        let messages = centralized.build(&state, &tools);
        assert!(messages[0].content.contains("<SCHEMAS>"));
        assert!(messages[0].content.contains("[params: S1]"));
    }

    #[test]
    fn uses_goal_from_state_not_arguments() {
        let state = AgentState::new("a1", "count ducks");
        let messages = builder().build(&state, &[]);
        assert!(messages.last().unwrap().content.contains("count ducks"));
    }
}
