//! Turn history rendering with a bounded recency window.

use serde_json::{json, Value};

use crate::schemas::{ActionInput, AgentState, AgentTurn};

const PREVIEW_CHARS: usize = 256;

#[derive(Debug, Clone, Copy)]
pub struct HistoryOptions {
    pub max_recent_turns: usize,
    pub enable_summarization: bool,
    pub max_tool_output_size: usize,
}

/// Render the turn log: full JSON for the most recent window, one-line
/// summaries for everything older (when summarization is on).
pub fn render_history(state: &AgentState, options: &HistoryOptions) -> String {
    if state.turns.is_empty() {
        return "HISTORY: (no prior turns)".into();
    }

    let split = if options.enable_summarization {
        state.turns.len().saturating_sub(options.max_recent_turns)
    } else {
        0
    };

    let mut out = String::from("HISTORY:");
    for turn in &state.turns[..split] {
        out.push('\n');
        out.push_str(&summarize_turn(turn));
    }
    for turn in &state.turns[split..] {
        out.push('\n');
        out.push_str(&render_turn_full(turn, options.max_tool_output_size));
    }
    out
}

fn render_turn_full(turn: &AgentTurn, max_output_size: usize) -> String {
    let mut value = serde_json::to_value(turn).unwrap_or(Value::Null);

    if let Some(output) = value
        .get_mut("tool_result")
        .and_then(|r| r.get_mut("output"))
    {
        *output = truncate_output(output, max_output_size);
    }
    if let Some(results) = value
        .get_mut("tool_results")
        .and_then(|r| r.as_array_mut())
    {
        for result in results {
            if let Some(output) = result.get_mut("output") {
                *output = truncate_output(output, max_output_size);
            }
        }
    }

    format!("turn {}: {}", turn.index, value)
}

/// Replace an oversized output with a marker carrying a bounded preview.
pub fn truncate_output(output: &Value, max_size: usize) -> Value {
    let serialized = output.to_string();
    if serialized.len() <= max_size {
        return output.clone();
    }

    let cut = max_size.min(PREVIEW_CHARS);
    let preview: String = serialized.chars().take(cut).collect();
    json!({
        "truncated": true,
        "original_size": serialized.len(),
        "preview": preview,
    })
}

fn summarize_turn(turn: &AgentTurn) -> String {
    if let Some(call) = &turn.tool_call {
        let outcome = match &turn.tool_result {
            Some(result) if result.success => "ok".to_string(),
            Some(result) => format!(
                "failed ({})",
                result.error.as_deref().unwrap_or("unknown error")
            ),
            None => "no result".to_string(),
        };
        return format!("turn {}: {} -> {}", turn.index, call.tool, outcome);
    }

    if let Some(message) = &turn.llm_message {
        let gist = match &message.action_input {
            ActionInput::Final { text } => text.clone(),
            ActionInput::Summary { summary } => summary.clone(),
            _ => message.thoughts.clone(),
        };
        let gist: String = gist.chars().take(80).collect();
        return format!("turn {}: {:?}: {}", turn.index, message.action, gist);
    }

    format!("turn {}: (failure)", turn.index)
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use serde_json::json;

    use crate::schemas::{ModelMessage, ToolCallRequest, ToolExecutionResult};

    use super::*;

    fn tool_turn(index: usize, output: Value) -> AgentTurn {
        let params = json!({"q": index});
        AgentTurn::new(index)
            .with_message(ModelMessage::tool_call("search", params.clone()))
            .with_tool_call(ToolCallRequest::new("search", params.clone()))
            .with_tool_result(ToolExecutionResult::success(
                "search",
                params.clone(),
                "id",
                output,
                Duration::from_millis(5),
            ))
    }

    #[test]
    fn recent_turns_are_full_json_older_are_summaries() {
        let mut state = AgentState::new("a1", "goal");
        for i in 0..4 {
            state.append_turn(tool_turn(i, json!("result")));
        }
        let options = HistoryOptions {
            max_recent_turns: 2,
            enable_summarization: true,
            max_tool_output_size: 4096,
        };

        let history = render_history(&state, &options);
        assert!(history.contains("turn 0: search -> ok"));
        assert!(history.contains("turn 1: search -> ok"));
        assert!(history.contains(r#"turn 2: {"#));
        assert!(history.contains(r#"turn 3: {"#));
    }

    #[test]
    fn summarization_disabled_renders_everything_fully() {
        let mut state = AgentState::new("a1", "goal");
        for i in 0..4 {
            state.append_turn(tool_turn(i, json!("result")));
        }
        let options = HistoryOptions {
            max_recent_turns: 1,
            enable_summarization: false,
            max_tool_output_size: 4096,
        };

        let history = render_history(&state, &options);
        assert!(history.contains(r#"turn 0: {"#));
    }

    #[test]
    fn oversized_outputs_are_replaced_with_a_marker() {
        let big = json!("x".repeat(10_000));
        let truncated = truncate_output(&big, 100);
        assert_eq!(truncated["truncated"], json!(true));
        assert_eq!(truncated["original_size"], json!(10_002));
        assert_eq!(truncated["preview"].as_str().unwrap().len(), 100);
    }

    #[test]
    fn small_outputs_pass_untouched() {
        let small = json!({"ok": true});
        assert_eq!(truncate_output(&small, 4096), small);
    }

    #[test]
    fn oversized_output_in_turn_is_truncated_in_render() {
        let mut state = AgentState::new("a1", "goal");
        state.append_turn(tool_turn(0, json!("y".repeat(10_000))));
        let options = HistoryOptions {
            max_recent_turns: 5,
            enable_summarization: true,
            max_tool_output_size: 128,
        };

        let history = render_history(&state, &options);
        assert!(history.contains("\"truncated\":true"));
        assert!(!history.contains(&"y".repeat(200)));
    }

    #[test]
    fn empty_history_has_a_placeholder() {
        let state = AgentState::new("a1", "goal");
        let options = HistoryOptions {
            max_recent_turns: 5,
            enable_summarization: true,
            max_tool_output_size: 4096,
        };
        assert_eq!(render_history(&state, &options), "HISTORY: (no prior turns)");
    }
}
