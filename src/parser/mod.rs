//! Tolerant front-end for model output.
//!
//! Models wrap their JSON in code fences, lead with prose, or leave a
//! trailing comma; none of that should count as a failed turn. The
//! front-end strips the wrapping and applies small repairs before the
//! structural parse. An output that still does not parse is a
//! recoverable [`ParseError`], never a panic or an upstream exception.

use regex::Regex;
use serde_json::Value;
use thiserror::Error;

use crate::schemas::{ActionInput, AgentAction, ModelMessage};

#[derive(Error, Debug)]
pub enum ParseError {
    #[error("no JSON object found in model output")]
    NoJson,

    #[error("model output is not valid JSON: {0}")]
    InvalidJson(#[from] serde_json::Error),

    #[error("model output is not a {0} object")]
    WrongShape(&'static str),
}

/// Strip a wrapping markdown code fence, if any.
pub fn extract_from_codeblock(text: &str) -> &str {
    let start_re = Regex::new(r"^\s*```[\w+-]*").expect("valid regex");
    let end_re = Regex::new(r"```\s*$").expect("valid regex");

    let start = start_re
        .find_iter(text)
        .find_map(|m| (m.start() == 0).then_some(m.end()))
        .unwrap_or(0);
    let end = end_re
        .find_iter(text)
        .find_map(|m| (m.end() == text.len()).then_some(m.start()))
        .unwrap_or(text.len());

    if start >= end {
        return text.trim();
    }
    text[start..end].trim()
}

/// Drop leading/trailing prose around the outermost JSON object.
fn extract_object_span(text: &str) -> Option<&str> {
    let start = text.find('{')?;
    let end = text.rfind('}')?;
    (end > start).then(|| &text[start..=end])
}

fn remove_trailing_commas(text: &str) -> String {
    let re = Regex::new(r",\s*([}\]])").expect("valid regex");
    re.replace_all(text, "$1").into_owned()
}

/// Parse one JSON object out of raw model text.
pub fn parse_json_object(text: &str) -> Result<Value, ParseError> {
    let stripped = extract_from_codeblock(text.trim());

    if let Ok(value) = serde_json::from_str::<Value>(stripped) {
        return expect_object(value);
    }

    let span = extract_object_span(stripped).ok_or(ParseError::NoJson)?;
    if let Ok(value) = serde_json::from_str::<Value>(span) {
        return expect_object(value);
    }

    let repaired = remove_trailing_commas(span);
    let value = serde_json::from_str::<Value>(&repaired)?;
    expect_object(value)
}

fn expect_object(value: Value) -> Result<Value, ParseError> {
    if value.is_object() {
        Ok(value)
    } else {
        Err(ParseError::WrongShape("JSON"))
    }
}

/// Decode one model decision, sanitizing its public status fields.
pub fn parse_model_message(text: &str) -> Result<ModelMessage, ParseError> {
    let value = parse_json_object(text)?;
    let mut message: ModelMessage = serde_json::from_value(value)?;

    // A tool_call decision without a usable tool payload is as
    // unusable as malformed JSON.
    if message.action == AgentAction::ToolCall
        && !matches!(message.action_input, ActionInput::Tool { .. })
    {
        return Err(ParseError::WrongShape("tool_call"));
    }

    message.sanitize_status();
    Ok(message)
}

#[cfg(test)]
mod tests {
    use indoc::indoc;
    use serde_json::json;

    use super::*;

    #[test]
    fn parses_bare_json() {
        let msg = parse_model_message(
            r#"{"thoughts":"done","action":"finish","action_input":{"final":"hello"}}"#,
        )
        .unwrap();
        assert_eq!(msg.action, AgentAction::Finish);
    }

    #[test]
    fn parses_fenced_json() {
        let text = indoc! {r#"
            ```json
            {
                "thoughts": "need the sum",
                "action": "tool_call",
                "action_input": {"tool": "add", "params": {"a": 2, "b": 3}}
            }
            ```
        "#};
        let msg = parse_model_message(text).unwrap();
        assert_eq!(msg.action, AgentAction::ToolCall);
    }

    #[test]
    fn parses_json_with_surrounding_prose() {
        let text = r#"Sure! Here is my decision:
            {"thoughts":"ok","action":"plan","action_input":{"summary":"first look around"}}
            Let me know."#;
        let msg = parse_model_message(text).unwrap();
        assert_eq!(msg.action, AgentAction::Plan);
    }

    #[test]
    fn repairs_trailing_commas() {
        let text = r#"{"thoughts":"x","action":"finish","action_input":{"final":"y",},}"#;
        let msg = parse_model_message(text).unwrap();
        assert_eq!(msg.action, AgentAction::Finish);
    }

    #[test]
    fn garbage_is_a_parse_error() {
        assert!(matches!(
            parse_model_message("not json at all"),
            Err(ParseError::NoJson)
        ));
    }

    #[test]
    fn non_object_json_is_rejected() {
        assert!(parse_model_message(r#"["finish"]"#).is_err());
    }

    #[test]
    fn tool_call_without_tool_payload_is_rejected() {
        let text = r#"{"thoughts":"x","action":"tool_call","action_input":{"summary":"??"}}"#;
        assert!(matches!(
            parse_model_message(text),
            Err(ParseError::WrongShape(_))
        ));
    }

    #[test]
    fn status_fields_are_sanitized_on_parse() {
        let text = serde_json::to_string(&json!({
            "thoughts": "x",
            "action": "finish",
            "action_input": {"final": "y"},
            "status_title": "t".repeat(100),
            "progress_pct": 100
        }))
        .unwrap();
        let msg = parse_model_message(&text).unwrap();
        assert_eq!(msg.status_title.as_ref().unwrap().len(), 60);
    }

    #[test]
    fn parse_json_object_accepts_fenced_payload() {
        let value = parse_json_object("```\n{\"score\": 0.9}\n```").unwrap();
        assert_eq!(value["score"].as_f64(), Some(0.9));
    }
}
