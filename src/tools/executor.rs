//! Schema-validating tool dispatch.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use serde_json::Value;
use thiserror::Error;
use tokio_util::sync::CancellationToken;

use crate::events::{AgentEvent, EventBus};
use crate::hash::dedupe_key;
use crate::schemas::{FailureKind, FunctionSpec, ToolExecutionResult};

use super::Tool;

#[derive(Error, Debug)]
pub enum ExecuteError {
    /// Caller cancellation, re-raised so the run aborts. Never
    /// recorded as a tool failure.
    #[error("tool call cancelled")]
    Cancelled,
}

/// Validates, invokes, classifies, and times tool calls.
pub struct ToolExecutor {
    tools: HashMap<String, Arc<dyn Tool>>,
    timeout: Duration,
    events: EventBus,
}

impl ToolExecutor {
    pub fn new(tools: &[Arc<dyn Tool>], timeout: Duration, events: EventBus) -> Self {
        let tools = tools
            .iter()
            .map(|t| (t.name(), t.clone()))
            .collect::<HashMap<_, _>>();
        Self {
            tools,
            timeout,
            events,
        }
    }

    pub fn get(&self, name: &str) -> Option<&Arc<dyn Tool>> {
        self.tools.get(name)
    }

    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }

    pub fn function_specs(&self) -> Vec<FunctionSpec> {
        let mut specs = self
            .tools
            .values()
            .map(|t| t.function_spec())
            .collect::<Vec<_>>();
        specs.sort_by(|a, b| a.name.cmp(&b.name));
        specs
    }

    /// Execute one call. Every outcome other than caller cancellation
    /// is a [`ToolExecutionResult`]; `ToolCallStarted` and
    /// `ToolCallCompleted` are emitted around all of them.
    pub async fn execute(
        &self,
        agent_id: &str,
        turn_index: usize,
        tool_name: &str,
        params: Value,
        cancel: &CancellationToken,
    ) -> Result<ToolExecutionResult, ExecuteError> {
        self.events.emit(AgentEvent::ToolCallStarted {
            agent_id: agent_id.into(),
            turn_index,
            tool: tool_name.into(),
        });

        let result = self.execute_inner(tool_name, params, cancel).await;

        let (success, error, execution_time) = match &result {
            Ok(result) => (result.success, result.error.clone(), result.execution_time),
            Err(ExecuteError::Cancelled) => {
                (false, Some("cancelled".to_string()), Duration::ZERO)
            }
        };
        self.events.emit(AgentEvent::ToolCallCompleted {
            agent_id: agent_id.into(),
            turn_index,
            tool: tool_name.into(),
            success,
            error,
            execution_time,
        });

        result
    }

    async fn execute_inner(
        &self,
        tool_name: &str,
        params: Value,
        cancel: &CancellationToken,
    ) -> Result<ToolExecutionResult, ExecuteError> {
        let turn_id = dedupe_key(tool_name, &params);

        let Some(tool) = self.tools.get(tool_name) else {
            log::warn!("model requested unknown tool {tool_name}");
            return Ok(ToolExecutionResult::rejected(
                tool_name,
                params,
                turn_id,
                format!("tool not registered: {tool_name}"),
            ));
        };

        if let Err(failure) = tool.parameters().validate(&params) {
            return Ok(ToolExecutionResult::failure(
                tool_name,
                params,
                turn_id,
                FailureKind::ValidationError {
                    missing: failure.missing,
                    errors: failure.field_errors,
                },
                format!("invalid parameters for {tool_name}"),
                Duration::ZERO,
            ));
        }

        let started = Instant::now();
        let invocation = tool.invoke(params.clone(), cancel.clone());

        let result = tokio::select! {
            _ = cancel.cancelled() => return Err(ExecuteError::Cancelled),
            outcome = tokio::time::timeout(self.timeout, invocation) => match outcome {
                Err(_) => ToolExecutionResult::failure(
                    tool_name,
                    params,
                    turn_id,
                    FailureKind::Timeout,
                    format!("tool {tool_name} exceeded its {}ms deadline", self.timeout.as_millis()),
                    started.elapsed(),
                ),
                Ok(Ok(output)) => ToolExecutionResult::success(
                    tool_name,
                    params,
                    turn_id,
                    output,
                    started.elapsed(),
                ),
                Ok(Err(e)) => ToolExecutionResult::failure(
                    tool_name,
                    params,
                    turn_id,
                    FailureKind::ToolError,
                    e.to_string(),
                    started.elapsed(),
                ),
            },
        };

        Ok(result)
    }
}

#[cfg(test)]
mod tests {
    use std::error::Error;
    use std::sync::Mutex;

    use async_trait::async_trait;
    use serde_json::json;

    use crate::events::EventHandler;
    use crate::tools::ParamField;
    use crate::tools::ToolParameters;

    use super::*;

    struct AddTool;

    #[async_trait]
    impl Tool for AddTool {
        fn name(&self) -> String {
            "add".into()
        }
        fn description(&self) -> String {
            "Adds two integers".into()
        }
        fn parameters(&self) -> ToolParameters {
            ToolParameters::new(vec![ParamField::integer("a"), ParamField::integer("b")])
        }
        async fn invoke(
            &self,
            params: Value,
            _cancel: CancellationToken,
        ) -> Result<Value, Box<dyn Error + Send + Sync>> {
            let a = params["a"].as_i64().unwrap_or_default();
            let b = params["b"].as_i64().unwrap_or_default();
            Ok(json!(a + b))
        }
    }

    struct SlowTool;

    #[async_trait]
    impl Tool for SlowTool {
        fn name(&self) -> String {
            "slow".into()
        }
        fn description(&self) -> String {
            "Sleeps".into()
        }
        async fn invoke(
            &self,
            _params: Value,
            _cancel: CancellationToken,
        ) -> Result<Value, Box<dyn Error + Send + Sync>> {
            tokio::time::sleep(Duration::from_secs(60)).await;
            Ok(json!(null))
        }
    }

    struct BrokenTool;

    #[async_trait]
    impl Tool for BrokenTool {
        fn name(&self) -> String {
            "broken".into()
        }
        fn description(&self) -> String {
            "Always fails".into()
        }
        async fn invoke(
            &self,
            _params: Value,
            _cancel: CancellationToken,
        ) -> Result<Value, Box<dyn Error + Send + Sync>> {
            Err("disk on fire".into())
        }
    }

    #[derive(Default)]
    struct Collector {
        events: Mutex<Vec<AgentEvent>>,
    }

    impl EventHandler for Collector {
        fn handle(&self, event: &AgentEvent) {
            self.events.lock().unwrap().push(event.clone());
        }
    }

    fn executor_with(tools: &[Arc<dyn Tool>], timeout: Duration) -> (ToolExecutor, Arc<Collector>) {
        let collector = Arc::new(Collector::default());
        let bus = EventBus::new(vec![collector.clone()]);
        (ToolExecutor::new(tools, timeout, bus), collector)
    }

    #[tokio::test]
    async fn successful_call_returns_output_and_events() {
        let (executor, collector) =
            executor_with(&[Arc::new(AddTool) as Arc<dyn Tool>], Duration::from_secs(5));
        let cancel = CancellationToken::new();

        let result = executor
            .execute("a1", 0, "add", json!({"a": 2, "b": 3}), &cancel)
            .await
            .unwrap();
        assert!(result.success);
        assert_eq!(result.output, Some(json!(5)));
        assert_eq!(result.turn_id, dedupe_key("add", &json!({"a": 2, "b": 3})));

        let events = collector.events.lock().unwrap();
        assert!(matches!(events[0], AgentEvent::ToolCallStarted { .. }));
        assert!(
            matches!(&events[1], AgentEvent::ToolCallCompleted { success: true, .. })
        );
    }

    #[tokio::test]
    async fn missing_params_classify_as_validation_error() {
        let (executor, _) =
            executor_with(&[Arc::new(AddTool) as Arc<dyn Tool>], Duration::from_secs(5));
        let result = executor
            .execute("a1", 0, "add", json!({"a": 2}), &CancellationToken::new())
            .await
            .unwrap();
        assert!(!result.success);
        match result.failure_kind() {
            Some(FailureKind::ValidationError { missing, .. }) => {
                assert_eq!(missing, vec!["b"]);
            }
            other => panic!("unexpected classifier: {other:?}"),
        }
    }

    #[tokio::test]
    async fn deadline_exceeded_classifies_as_timeout() {
        let (executor, collector) = executor_with(
            &[Arc::new(SlowTool) as Arc<dyn Tool>],
            Duration::from_millis(20),
        );
        let result = executor
            .execute("a1", 0, "slow", json!({}), &CancellationToken::new())
            .await
            .unwrap();
        assert!(!result.success);
        assert_eq!(result.failure_kind(), Some(FailureKind::Timeout));

        let events = collector.events.lock().unwrap();
        assert!(
            matches!(&events[1], AgentEvent::ToolCallCompleted { success: false, .. })
        );
    }

    #[tokio::test]
    async fn tool_exceptions_classify_as_tool_error() {
        let (executor, _) = executor_with(
            &[Arc::new(BrokenTool) as Arc<dyn Tool>],
            Duration::from_secs(5),
        );
        let result = executor
            .execute("a1", 0, "broken", json!({}), &CancellationToken::new())
            .await
            .unwrap();
        assert!(!result.success);
        assert_eq!(result.failure_kind(), Some(FailureKind::ToolError));
        assert_eq!(result.error.as_deref(), Some("disk on fire"));
    }

    #[tokio::test]
    async fn unknown_tool_is_a_failure_without_classifier() {
        let (executor, _) = executor_with(&[], Duration::from_secs(5));
        let result = executor
            .execute("a1", 0, "ghost", json!({}), &CancellationToken::new())
            .await
            .unwrap();
        assert!(!result.success);
        assert!(result.output.is_none());
        assert!(result.error.as_deref().unwrap_or_default().contains("ghost"));
    }

    #[tokio::test]
    async fn cancellation_reraises_instead_of_failing() {
        let (executor, collector) = executor_with(
            &[Arc::new(SlowTool) as Arc<dyn Tool>],
            Duration::from_secs(60),
        );
        let cancel = CancellationToken::new();
        let pending = executor.execute("a1", 0, "slow", json!({}), &cancel);
        cancel.cancel();

        assert!(matches!(pending.await, Err(ExecuteError::Cancelled)));
        let events = collector.events.lock().unwrap();
        assert_eq!(events.len(), 2);
        assert!(
            matches!(&events[1], AgentEvent::ToolCallCompleted { success: false, .. })
        );
    }
}
