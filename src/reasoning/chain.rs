//! Chain-of-Thought: a fixed sequential pipeline of reasoning stages.

use chrono::{DateTime, Utc};
use indoc::formatdoc;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio_util::sync::CancellationToken;

use crate::llm::{LlmCommunicator, LlmError, LlmRequest};
use crate::parser::parse_json_object;
use crate::schemas::ChatMessage;

use super::ReasoningOutcome;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StepType {
    Analysis,
    Planning,
    Decision,
    Observation,
    Evaluation,
    Synthesis,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReasoningStep {
    pub step_number: usize,
    pub step_type: StepType,
    pub reasoning: String,
    /// Self-reported, clamped to `[0, 1]`.
    pub confidence: f64,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub insights: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReasoningChain {
    pub goal: String,
    pub steps: Vec<ReasoningStep>,
    pub final_confidence: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub conclusion: Option<String>,
    pub created_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<DateTime<Utc>>,
}

impl ReasoningChain {
    fn new(goal: impl Into<String>) -> Self {
        Self {
            goal: goal.into(),
            steps: Vec::new(),
            final_confidence: 0.0,
            conclusion: None,
            created_at: Utc::now(),
            completed_at: None,
        }
    }
}

/// The stage pipeline: analysis, planning, strategy, evaluation. Each
/// stage sends one prompt and appends one step; the evaluation stage
/// also yields the conclusion.
const STAGES: &[(StepType, &str)] = &[
    (
        StepType::Analysis,
        "Break the goal into its essential parts. What is actually being asked, \
         and what information or capabilities does it require?",
    ),
    (
        StepType::Planning,
        "Lay out the concrete steps that would accomplish the goal, in order, \
         noting which require tools.",
    ),
    (
        StepType::Decision,
        "Choose the most promising strategy among the options you laid out and \
         justify the choice.",
    ),
    (
        StepType::Evaluation,
        "Evaluate the chosen strategy against the goal. State your conclusion \
         about how to proceed.",
    ),
];

pub struct ChainOfThoughtEngine {
    communicator: LlmCommunicator,
    max_steps: usize,
    validate: bool,
    min_confidence: f64,
}

impl ChainOfThoughtEngine {
    pub fn new(
        communicator: LlmCommunicator,
        max_steps: usize,
        validate: bool,
        min_confidence: f64,
    ) -> Self {
        Self {
            communicator,
            max_steps: max_steps.max(1),
            validate,
            min_confidence,
        }
    }

    /// Run the pipeline. LLM transport failures propagate; a chain
    /// that merely fails validation is reported through the outcome.
    pub async fn reason(
        &self,
        agent_id: &str,
        goal: &str,
        cancel: &CancellationToken,
    ) -> Result<(ReasoningOutcome, ReasoningChain), LlmError> {
        let mut chain = ReasoningChain::new(goal);

        for (step_type, instruction) in STAGES.iter().take(self.max_steps) {
            let prompt = self.stage_prompt(goal, &chain, *step_type, instruction);
            let response = self
                .communicator
                .call(agent_id, 0, LlmRequest::new(prompt), cancel)
                .await?;
            let value = parse_json_object(&response.text)?;

            let reasoning = value
                .get("reasoning")
                .and_then(Value::as_str)
                .unwrap_or_default()
                .to_string();
            let confidence = value
                .get("confidence")
                .and_then(Value::as_f64)
                .unwrap_or(0.0)
                .clamp(0.0, 1.0);
            let insights = value
                .get("insights")
                .and_then(Value::as_array)
                .map(|items| {
                    items
                        .iter()
                        .filter_map(Value::as_str)
                        .map(String::from)
                        .collect()
                })
                .unwrap_or_default();

            if *step_type == StepType::Evaluation {
                chain.conclusion = value
                    .get("conclusion")
                    .and_then(Value::as_str)
                    .map(String::from)
                    .or_else(|| Some(reasoning.clone()));
            }

            chain.steps.push(ReasoningStep {
                step_number: chain.steps.len() + 1,
                step_type: *step_type,
                reasoning,
                confidence,
                insights,
            });
        }

        chain.final_confidence = if chain.steps.is_empty() {
            0.0
        } else {
            chain.steps.iter().map(|s| s.confidence).sum::<f64>() / chain.steps.len() as f64
        };
        chain.completed_at = Some(Utc::now());

        let mut success = true;
        if self.validate {
            let valid = self.validate_chain(agent_id, &chain, cancel).await?;
            if !valid && chain.final_confidence < self.min_confidence {
                success = false;
            }
        }

        let conclusion = chain.conclusion.clone().unwrap_or_default();
        Ok((
            ReasoningOutcome {
                success,
                conclusion,
                confidence: chain.final_confidence,
            },
            chain,
        ))
    }

    fn stage_prompt(
        &self,
        goal: &str,
        chain: &ReasoningChain,
        step_type: StepType,
        instruction: &str,
    ) -> Vec<ChatMessage> {
        let prior = chain
            .steps
            .iter()
            .map(|s| format!("{:?}: {}", s.step_type, s.reasoning))
            .collect::<Vec<_>>()
            .join("\n");
        let prior = if prior.is_empty() {
            "(none yet)".to_string()
        } else {
            prior
        };

        let conclusion_field = if step_type == StepType::Evaluation {
            "\n    \"conclusion\": (string), how the agent should proceed,"
        } else {
            ""
        };

        let content = formatdoc! {r#"
            GOAL: {goal}

            Reasoning so far:
            {prior}

            {instruction}

            Respond with a single JSON object:
            {{
                "reasoning": (string),{conclusion_field}
                "confidence": (number between 0 and 1),
                "insights": (array of strings, may be empty)
            }}"#
        };
        vec![ChatMessage::new_user(content)]
    }

    async fn validate_chain(
        &self,
        agent_id: &str,
        chain: &ReasoningChain,
        cancel: &CancellationToken,
    ) -> Result<bool, LlmError> {
        let steps = chain
            .steps
            .iter()
            .map(|s| format!("{:?}: {}", s.step_type, s.reasoning))
            .collect::<Vec<_>>()
            .join("\n");
        let content = formatdoc! {r#"
            GOAL: {}

            Reasoning chain:
            {}

            Is this chain coherent and does it actually address the goal?
            Respond with a single JSON object: {{"valid": (boolean), "issues": (array of strings)}}"#,
            chain.goal, steps
        };

        let response = self
            .communicator
            .call(agent_id, 0, LlmRequest::new(vec![ChatMessage::new_user(content)]), cancel)
            .await?;
        let value = parse_json_object(&response.text)?;
        Ok(value.get("valid").and_then(Value::as_bool).unwrap_or(false))
    }
}
