//! The turn loop.
//!
//! One step: build the prompt, obtain a decision (native function call
//! or ReAct JSON), dispatch it, record the turn, persist. Recoverable
//! failures become failure turns plus controller retry hints; only
//! caller cancellation, save failure, and turn-budget exhaustion end a
//! run without a final answer.

use std::sync::Arc;
use std::time::Instant;

use serde_json::Value;
use tokio_util::sync::CancellationToken;

use crate::dedupe::Deduplicator;
use crate::events::{AgentEvent, EventBus, EventHandler};
use crate::llm::{LlmAdapter, LlmCommunicator, LlmError, LlmRequest};
use crate::loop_detect::LoopDetector;
use crate::parser::parse_model_message;
use crate::prompt::MessageBuilder;
use crate::reasoning::{
    ChainOfThoughtEngine, ReasoningType, TreeOfThoughtsEngine,
};
use crate::schemas::{
    ActionInput, AgentAction, AgentState, AgentTurn, FailureKind, ModelMessage, TokenUsage,
    ToolCallRequest, ToolExecutionResult,
};
use crate::store::{StateStore, StoreError};
use crate::tools::{ExecuteError, Tool, ToolExecutor};

use super::normalize::normalize_function_call;
use super::{EngineOptions, ErrorKind, RunOutcome};

const RETRY_HINT: &str =
    "The last tool call failed. Check the reported errors and retry with corrected parameters.";
const INVALID_OUTPUT_STATUS: &str = "Invalid model output";

enum StepOutcome {
    Continue { executed_tool: bool },
    Finished { final_output: String },
    Cancelled,
}

/// Everything one run needs besides the orchestrator itself.
struct RunContext {
    communicator: LlmCommunicator,
    executor: ToolExecutor,
    dedupe: Deduplicator,
    builder: MessageBuilder,
    events: EventBus,
}

pub struct Orchestrator {
    options: EngineOptions,
    adapter: Arc<dyn LlmAdapter>,
    store: Arc<dyn StateStore>,
    tools: Vec<Arc<dyn Tool>>,
    handlers: Vec<Arc<dyn EventHandler>>,
    loop_detector: LoopDetector,
}

impl Orchestrator {
    pub fn new(adapter: Arc<dyn LlmAdapter>, store: Arc<dyn StateStore>) -> Self {
        let options = EngineOptions::default();
        let loop_detector = Self::build_detector(&options);
        Self {
            options,
            adapter,
            store,
            tools: Vec::new(),
            handlers: Vec::new(),
            loop_detector,
        }
    }

    pub fn with_options(mut self, options: EngineOptions) -> Self {
        self.loop_detector = Self::build_detector(&options);
        self.options = options;
        self
    }

    pub fn with_tools(mut self, tools: Vec<Arc<dyn Tool>>) -> Self {
        self.tools = tools;
        self
    }

    pub fn with_tool(mut self, tool: Arc<dyn Tool>) -> Self {
        self.tools.push(tool);
        self
    }

    pub fn with_event_handler(mut self, handler: Arc<dyn EventHandler>) -> Self {
        self.handlers.push(handler);
        self
    }

    fn build_detector(options: &EngineOptions) -> LoopDetector {
        LoopDetector::new(
            options.max_tool_call_history,
            options.consecutive_failure_threshold,
            options.agent_history_ttl,
            options.max_agent_history,
        )
    }

    /// Run the loop for `(agent_id, goal)` until the model finishes,
    /// the turn budget runs out, or a fatal condition ends the run.
    pub async fn run(&self, agent_id: &str, goal: &str, cancel: CancellationToken) -> RunOutcome {
        let started = Instant::now();

        // A pre-cancelled caller gets out before any state mutation or
        // event emission.
        if cancel.is_cancelled() {
            return RunOutcome {
                succeeded: false,
                final_output: None,
                error: Some("cancelled before start".into()),
                error_kind: Some(ErrorKind::Cancelled),
                total_turns: 0,
                duration: started.elapsed(),
                usage: None,
                state: None,
            };
        }

        let events = EventBus::new(self.handlers.clone());
        let context = RunContext {
            communicator: LlmCommunicator::new(
                self.adapter.clone(),
                self.options.llm_timeout,
                events.clone(),
            ),
            executor: ToolExecutor::new(&self.tools, self.options.tool_timeout, events.clone()),
            dedupe: Deduplicator::new(self.options.dedupe_staleness_threshold),
            builder: MessageBuilder {
                emit_public_status: self.options.emit_public_status,
                use_centralized_schemas: self.options.use_centralized_schemas,
                max_recent_turns: self.options.max_recent_turns,
                enable_history_summarization: self.options.enable_history_summarization,
                max_tool_output_size: self.options.max_tool_output_size,
            },
            events,
        };

        let mut state = match self.store.load(agent_id).await {
            Ok(Some(state)) => {
                if state.goal != goal {
                    log::warn!(
                        "agent {agent_id} already has goal {:?}; the goal is immutable, keeping it",
                        state.goal
                    );
                }
                state
            }
            Ok(None) => AgentState::new(agent_id, goal),
            Err(e) => {
                log::warn!("failed to load state for agent {agent_id}: {e}; starting fresh");
                AgentState::new(agent_id, goal)
            }
        };

        context.events.emit(AgentEvent::RunStarted {
            agent_id: agent_id.into(),
            goal: state.goal.clone(),
        });

        if self.options.reasoning_type != ReasoningType::None {
            match self
                .consult_reasoning(&context, &mut state, agent_id, &cancel)
                .await
            {
                Ok(()) => {}
                Err(LlmError::Cancelled) => {
                    return self.complete(
                        &context,
                        agent_id,
                        state,
                        0,
                        started,
                        None,
                        None,
                        Some((ErrorKind::Cancelled, "run cancelled".into())),
                    );
                }
                Err(e) => {
                    log::warn!("reasoning consult for agent {agent_id} failed: {e}; continuing");
                }
            }
        }

        let mut usage: Option<TokenUsage> = None;
        let mut steps = 0usize;
        let mut final_output: Option<String> = None;
        let mut terminal: Option<(ErrorKind, String)> = None;

        while steps < self.options.max_turns {
            if cancel.is_cancelled() {
                terminal = Some((ErrorKind::Cancelled, "run cancelled".into()));
                break;
            }

            let turn_index = state.next_index();
            context.events.emit(AgentEvent::StepStarted {
                agent_id: agent_id.into(),
                turn_index,
            });
            steps += 1;

            let step = self
                .step(&context, &mut state, &mut usage, agent_id, &cancel)
                .await;

            if let Err(e) = self.store.save(agent_id, &state).await {
                terminal = Some((ErrorKind::StateSaveFailed, e.to_string()));
                context.events.emit(AgentEvent::StepCompleted {
                    agent_id: agent_id.into(),
                    turn_index,
                    executed_tool: false,
                });
                break;
            }

            match step {
                StepOutcome::Continue { executed_tool } => {
                    context.events.emit(AgentEvent::StepCompleted {
                        agent_id: agent_id.into(),
                        turn_index,
                        executed_tool,
                    });
                }
                StepOutcome::Finished { final_output: text } => {
                    context.events.emit(AgentEvent::StepCompleted {
                        agent_id: agent_id.into(),
                        turn_index,
                        executed_tool: false,
                    });
                    final_output = Some(text);
                    break;
                }
                StepOutcome::Cancelled => {
                    terminal = Some((ErrorKind::Cancelled, "run cancelled".into()));
                    break;
                }
            }
        }

        if final_output.is_none() && terminal.is_none() {
            terminal = Some((
                ErrorKind::MaxTurnsExceeded,
                format!(
                    "no terminal state after {} turns",
                    self.options.max_turns
                ),
            ));
        }

        self.complete(
            &context,
            agent_id,
            state,
            steps,
            started,
            usage,
            final_output,
            terminal,
        )
    }

    /// Drop an agent's persisted state.
    pub async fn delete_agent(&self, agent_id: &str) -> Result<(), StoreError> {
        self.loop_detector.forget(agent_id);
        self.store.delete(agent_id).await
    }

    #[allow(clippy::too_many_arguments)]
    fn complete(
        &self,
        context: &RunContext,
        agent_id: &str,
        state: AgentState,
        total_turns: usize,
        started: Instant,
        usage: Option<TokenUsage>,
        final_output: Option<String>,
        terminal: Option<(ErrorKind, String)>,
    ) -> RunOutcome {
        let succeeded = final_output.is_some();
        let (error_kind, error) = match terminal {
            Some((kind, message)) => (Some(kind), Some(message)),
            None => (None, None),
        };

        context.events.emit(AgentEvent::RunCompleted {
            agent_id: agent_id.into(),
            succeeded,
            total_turns,
            error: error.clone(),
        });

        RunOutcome {
            succeeded,
            final_output,
            error,
            error_kind,
            total_turns,
            duration: started.elapsed(),
            usage,
            state: Some(state),
        }
    }

    async fn consult_reasoning(
        &self,
        context: &RunContext,
        state: &mut AgentState,
        agent_id: &str,
        cancel: &CancellationToken,
    ) -> Result<(), LlmError> {
        let goal = state.goal.clone();

        if matches!(
            self.options.reasoning_type,
            ReasoningType::ChainOfThought | ReasoningType::Hybrid
        ) {
            let engine = ChainOfThoughtEngine::new(
                context.communicator.clone(),
                self.options.max_reasoning_steps,
                self.options.enable_reasoning_validation,
                self.options.min_reasoning_confidence,
            );
            let (outcome, chain) = engine.reason(agent_id, &goal, cancel).await?;
            if !outcome.success {
                log::warn!("reasoning chain for agent {agent_id} failed validation");
            }
            state.current_reasoning_chain = Some(chain);
        }

        if matches!(
            self.options.reasoning_type,
            ReasoningType::TreeOfThoughts | ReasoningType::Hybrid
        ) {
            let engine = TreeOfThoughtsEngine::new(
                context.communicator.clone(),
                self.options.max_tree_depth,
                self.options.max_tree_nodes,
                self.options.tree_exploration_strategy,
            );
            let (_, tree) = engine.reason(agent_id, &goal, cancel).await?;
            state.current_reasoning_tree = Some(tree);
        }

        Ok(())
    }

    async fn step(
        &self,
        context: &RunContext,
        state: &mut AgentState,
        usage: &mut Option<TokenUsage>,
        agent_id: &str,
        cancel: &CancellationToken,
    ) -> StepOutcome {
        let turn_index = state.next_index();
        let messages = context.builder.build(state, &self.tools);
        let mut request = LlmRequest::new(messages);

        let function_path = self.options.use_function_calling
            && context.communicator.supports_functions()
            && !context.executor.is_empty();
        if function_path {
            request = request.with_functions(context.executor.function_specs());
        }

        let response = match context
            .communicator
            .call(agent_id, turn_index, request, cancel)
            .await
        {
            Ok(response) => response,
            Err(LlmError::Cancelled) => return StepOutcome::Cancelled,
            Err(e) => {
                self.record_llm_failure(state, &e);
                return StepOutcome::Continue {
                    executed_tool: false,
                };
            }
        };
        *usage = TokenUsage::merge_options([&*usage, &response.usage]);

        let message = if let Some(call) = &response.function_call {
            match normalize_function_call(call, &response.text) {
                Ok(message) => message,
                Err(e) => {
                    // Bad native arguments are a validation failure on
                    // the named tool, not a dead end.
                    let turn_index = state.next_index();
                    let tool = call
                        .name
                        .strip_prefix("functions.")
                        .unwrap_or(&call.name)
                        .to_string();
                    let turn = AgentTurn::new(turn_index).with_tool_result(
                        ToolExecutionResult::failure(
                            tool,
                            Value::Null,
                            uuid::Uuid::new_v4().to_string(),
                            FailureKind::ValidationError {
                                missing: Vec::new(),
                                errors: vec![e.to_string()],
                            },
                            e.to_string(),
                            std::time::Duration::ZERO,
                        ),
                    );
                    state.append_turn(turn);
                    return StepOutcome::Continue {
                        executed_tool: false,
                    };
                }
            }
        } else {
            match parse_model_message(&response.text) {
                Ok(message) => message,
                Err(e) => {
                    context.events.emit(AgentEvent::StatusUpdate {
                        agent_id: agent_id.into(),
                        title: INVALID_OUTPUT_STATUS.into(),
                        details: Some(e.to_string()),
                        next_step_hint: None,
                        progress_pct: None,
                    });
                    self.record_llm_failure(state, &LlmError::Parse(e));
                    return StepOutcome::Continue {
                        executed_tool: false,
                    };
                }
            }
        };

        if self.options.emit_public_status && message.has_status() {
            context.events.emit(AgentEvent::StatusUpdate {
                agent_id: agent_id.into(),
                title: message.status_title.clone().unwrap_or_default(),
                details: message.status_details.clone(),
                next_step_hint: message.next_step_hint.clone(),
                progress_pct: message.progress_pct,
            });
        }

        match message.action {
            AgentAction::Plan | AgentAction::Retry => {
                let turn_index = state.next_index();
                state.append_turn(AgentTurn::new(turn_index).with_message(message));
                StepOutcome::Continue {
                    executed_tool: false,
                }
            }
            AgentAction::Finish => {
                let final_output = match &message.action_input {
                    ActionInput::Final { text } => text.clone(),
                    _ => {
                        log::warn!("finish without a final payload; using thoughts");
                        message.thoughts.clone()
                    }
                };
                let turn_index = state.next_index();
                state.append_turn(AgentTurn::new(turn_index).with_message(message));
                StepOutcome::Finished { final_output }
            }
            AgentAction::ToolCall => {
                self.process_tool_call(context, state, agent_id, message, cancel)
                    .await
            }
        }
    }

    async fn process_tool_call(
        &self,
        context: &RunContext,
        state: &mut AgentState,
        agent_id: &str,
        message: ModelMessage,
        cancel: &CancellationToken,
    ) -> StepOutcome {
        let ActionInput::Tool { tool, params } = &message.action_input else {
            // Guarded by the parser and the normalizer.
            log::warn!("tool_call decision without tool payload");
            return StepOutcome::Continue {
                executed_tool: false,
            };
        };
        let tool_name = tool.clone();
        let params = params.clone();

        let request = ToolCallRequest::new(&tool_name, params.clone());
        let dedupe_id = request.turn_id.clone();
        let turn_index = state.next_index();

        if let Some(tool) = context.executor.get(&tool_name) {
            if let Some(cached) = context.dedupe.try_lookup(state, tool.as_ref(), &dedupe_id) {
                log::debug!("agent {agent_id} reusing cached result for {tool_name}");
                let turn = AgentTurn::new(turn_index)
                    .with_message(message)
                    .with_tool_call(request)
                    .with_tool_result(cached);
                state.append_turn(turn);
                return StepOutcome::Continue {
                    executed_tool: true,
                };
            }
        }

        let result = match context
            .executor
            .execute(agent_id, turn_index, &tool_name, params, cancel)
            .await
        {
            Ok(result) => result,
            // Cancelled mid-invocation: not a tool failure, not
            // recorded in the loop detector.
            Err(ExecuteError::Cancelled) => return StepOutcome::Cancelled,
        };

        self.loop_detector
            .record(agent_id, &tool_name, &dedupe_id, result.success);

        let success = result.success;
        let turn = AgentTurn::new(turn_index)
            .with_message(message)
            .with_tool_call(request)
            .with_tool_result(result);
        state.append_turn(turn);

        if !success {
            self.append_controller_turn(state, RETRY_HINT.to_string());
            if self
                .loop_detector
                .detect_repeated_failures(agent_id, &tool_name, &dedupe_id)
            {
                self.append_controller_turn(
                    state,
                    format!(
                        "Stop repeating the failing call to '{tool_name}'. Adjust the \
                         parameters per the reported errors or try a different tool."
                    ),
                );
            }
        }

        StepOutcome::Continue {
            executed_tool: true,
        }
    }

    /// A failure turn: no decision, a failed pseudo tool-result that
    /// the model sees in the next prompt.
    fn record_llm_failure(&self, state: &mut AgentState, error: &LlmError) {
        let turn_index = state.next_index();
        let mut turn = AgentTurn::new(turn_index);
        let result = ToolExecutionResult::rejected(
            "llm",
            Value::Null,
            turn.turn_id.clone(),
            error.to_string(),
        );
        turn = turn.with_tool_result(result);
        state.append_turn(turn);
    }

    fn append_controller_turn(&self, state: &mut AgentState, summary: String) {
        let turn_index = state.next_index();
        let message = ModelMessage::retry(summary.clone()).with_thoughts(summary);
        state.append_turn(AgentTurn::new(turn_index).with_message(message).synthetic());
    }
}
