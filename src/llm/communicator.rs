//! The engine's wrapper around an [`LlmAdapter`].
//!
//! Adds the per-call deadline, cooperative cancellation, chunk
//! aggregation, user-visible chunk cleanup, and the ReAct JSON decode.
//! Exactly one `LlmCallStarted` / `LlmCallCompleted` pair is emitted
//! per call, success or not.

use std::sync::Arc;
use std::time::Duration;

use futures::StreamExt;
use tokio_util::sync::CancellationToken;

use crate::events::{AgentEvent, EventBus};
use crate::parser::parse_model_message;
use crate::schemas::{FunctionCall, ModelMessage, ResponseKind, TokenUsage};

use super::{LlmAdapter, LlmError, LlmRequest, StreamFilter};

/// All streamed chunks of one call, folded into a single response.
#[derive(Debug, Clone)]
pub struct LlmResponse {
    pub text: String,
    pub function_call: Option<FunctionCall>,
    pub usage: Option<TokenUsage>,
    pub kind: ResponseKind,
}

impl LlmResponse {
    pub fn has_function_call(&self) -> bool {
        self.function_call.is_some()
    }
}

#[derive(Clone)]
pub struct LlmCommunicator {
    adapter: Arc<dyn LlmAdapter>,
    timeout: Duration,
    events: EventBus,
}

impl LlmCommunicator {
    pub fn new(adapter: Arc<dyn LlmAdapter>, timeout: Duration, events: EventBus) -> Self {
        Self {
            adapter,
            timeout,
            events,
        }
    }

    pub fn supports_functions(&self) -> bool {
        self.adapter.supports_functions()
    }

    /// One deadline-bounded, cancellable call.
    pub async fn call(
        &self,
        agent_id: &str,
        turn_index: usize,
        request: LlmRequest,
        cancel: &CancellationToken,
    ) -> Result<LlmResponse, LlmError> {
        self.events.emit(AgentEvent::LlmCallStarted {
            agent_id: agent_id.into(),
            turn_index,
        });

        let result = tokio::select! {
            _ = cancel.cancelled() => Err(LlmError::Cancelled),
            outcome = tokio::time::timeout(
                self.timeout,
                self.aggregate(agent_id, turn_index, request, cancel),
            ) => match outcome {
                Err(_) => Err(LlmError::Timeout),
                Ok(result) => result,
            },
        };

        let (success, error, usage) = match &result {
            Ok(response) => (true, None, response.usage.clone()),
            Err(e) => (false, Some(e.to_string()), None),
        };
        self.events.emit(AgentEvent::LlmCallCompleted {
            agent_id: agent_id.into(),
            turn_index,
            success,
            error,
            usage,
        });

        result
    }

    /// Call and decode the ReAct JSON decision. A decode failure is an
    /// [`LlmError::Parse`], which the orchestrator records as a
    /// failure turn and recovers from on the next iteration.
    pub async fn call_and_parse(
        &self,
        agent_id: &str,
        turn_index: usize,
        request: LlmRequest,
        cancel: &CancellationToken,
    ) -> Result<(ModelMessage, Option<TokenUsage>), LlmError> {
        let response = self.call(agent_id, turn_index, request, cancel).await?;
        let message = parse_model_message(&response.text)?;
        Ok((message, response.usage))
    }

    async fn aggregate(
        &self,
        agent_id: &str,
        turn_index: usize,
        request: LlmRequest,
        cancel: &CancellationToken,
    ) -> Result<LlmResponse, LlmError> {
        let mut stream = self.adapter.stream(request, cancel.clone()).await?;
        let mut filter = StreamFilter::new();
        let mut text = String::new();
        let mut function_call = None;
        let mut usage = None;
        let mut kind = ResponseKind::Streaming;
        let mut saw_final = false;

        while let Some(chunk) = stream.next().await {
            let chunk = chunk?;

            if !chunk.content.is_empty() {
                let cleaned = filter.feed(&chunk.content);
                if !cleaned.is_empty() {
                    self.events.emit(AgentEvent::LlmChunkReceived {
                        agent_id: agent_id.into(),
                        turn_index,
                        content: cleaned,
                    });
                }
                text.push_str(&chunk.content);
            }

            if chunk.is_final {
                function_call = chunk.function_call;
                usage = chunk.usage;
                kind = chunk.response_kind;
                saw_final = true;
            }
        }

        if !saw_final {
            log::warn!("adapter stream for agent {agent_id} ended without a final chunk");
        }
        if text.is_empty() && function_call.is_none() {
            return Err(LlmError::EmptyResponse);
        }

        Ok(LlmResponse {
            text,
            function_call,
            usage,
            kind,
        })
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use async_trait::async_trait;
    use serde_json::json;

    use crate::events::EventHandler;
    use crate::schemas::{AgentAction, ChatMessage, StreamingChunk};

    use super::*;

    /// Adapter that plays back a scripted chunk sequence per call.
    struct Scripted {
        calls: Mutex<Vec<Vec<StreamingChunk>>>,
        delay: Option<Duration>,
    }

    impl Scripted {
        fn new(calls: Vec<Vec<StreamingChunk>>) -> Self {
            Self {
                calls: Mutex::new(calls),
                delay: None,
            }
        }

        fn slow(mut self, delay: Duration) -> Self {
            self.delay = Some(delay);
            self
        }
    }

    #[async_trait]
    impl LlmAdapter for Scripted {
        async fn stream(
            &self,
            _request: LlmRequest,
            _cancel: CancellationToken,
        ) -> Result<super::super::ChunkStream, LlmError> {
            if let Some(delay) = self.delay {
                tokio::time::sleep(delay).await;
            }
            let mut calls = self.calls.lock().unwrap();
            if calls.is_empty() {
                return Err(LlmError::Provider("script exhausted".into()));
            }
            let chunks = calls.remove(0);
            Ok(Box::pin(async_stream::stream! {
                for chunk in chunks {
                    yield Ok::<_, LlmError>(chunk);
                }
            }))
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

    fn communicator(
        adapter: Scripted,
        timeout: Duration,
    ) -> (LlmCommunicator, Arc<Collector>) {
        let collector = Arc::new(Collector::default());
        let bus = EventBus::new(vec![collector.clone()]);
        (
            LlmCommunicator::new(Arc::new(adapter), timeout, bus),
            collector,
        )
    }

    fn request() -> LlmRequest {
        LlmRequest::new(vec![ChatMessage::new_user("go")])
    }

    #[tokio::test]
    async fn aggregates_streamed_text_and_usage() {
        let adapter = Scripted::new(vec![vec![
            StreamingChunk::text("Hel"),
            StreamingChunk::text("lo"),
            StreamingChunk::final_text("", Some(TokenUsage::new(10, 2))),
        ]]);
        let (communicator, collector) = communicator(adapter, Duration::from_secs(5));

        let response = communicator
            .call("a1", 0, request(), &CancellationToken::new())
            .await
            .unwrap();
        assert_eq!(response.text, "Hello");
        assert_eq!(response.usage, Some(TokenUsage::new(10, 2)));
        assert_eq!(response.kind, ResponseKind::Text);

        let events = collector.events.lock().unwrap();
        assert!(matches!(events.first(), Some(AgentEvent::LlmCallStarted { .. })));
        assert!(matches!(
            events.last(),
            Some(AgentEvent::LlmCallCompleted { success: true, .. })
        ));
    }

    #[tokio::test]
    async fn json_scaffolding_is_cleaned_from_chunk_events() {
        let adapter = Scripted::new(vec![vec![
            StreamingChunk::text("Let me add them. "),
            StreamingChunk::text(r#"{"action": "finish", "#),
            StreamingChunk::text(r#""action_input": {"final": "5"}}"#),
            StreamingChunk::final_text("", None),
        ]]);
        let (communicator, collector) = communicator(adapter, Duration::from_secs(5));

        communicator
            .call("a1", 0, request(), &CancellationToken::new())
            .await
            .unwrap();

        let events = collector.events.lock().unwrap();
        let chunk_text: String = events
            .iter()
            .filter_map(|e| match e {
                AgentEvent::LlmChunkReceived { content, .. } => Some(content.clone()),
                _ => None,
            })
            .collect();
        assert_eq!(chunk_text, "Let me add them. ");
    }

    #[tokio::test]
    async fn call_and_parse_decodes_the_decision() {
        let adapter = Scripted::new(vec![vec![StreamingChunk::final_text(
            r#"{"thoughts":"done","action":"finish","action_input":{"final":"hello"}}"#,
            None,
        )]]);
        let (communicator, _) = communicator(adapter, Duration::from_secs(5));

        let (message, _) = communicator
            .call_and_parse("a1", 0, request(), &CancellationToken::new())
            .await
            .unwrap();
        assert_eq!(message.action, AgentAction::Finish);
    }

    #[tokio::test]
    async fn invalid_json_is_a_parse_error() {
        let adapter = Scripted::new(vec![vec![StreamingChunk::final_text(
            "not json at all",
            None,
        )]]);
        let (communicator, _) = communicator(adapter, Duration::from_secs(5));

        let err = communicator
            .call_and_parse("a1", 0, request(), &CancellationToken::new())
            .await
            .unwrap_err();
        assert!(matches!(err, LlmError::Parse(_)));
        assert!(err.is_recoverable());
    }

    #[tokio::test]
    async fn deadline_exceeded_is_a_timeout_with_paired_events() {
        let adapter = Scripted::new(vec![vec![StreamingChunk::final_text("x", None)]])
            .slow(Duration::from_secs(60));
        let (communicator, collector) = communicator(adapter, Duration::from_millis(20));

        let err = communicator
            .call("a1", 0, request(), &CancellationToken::new())
            .await
            .unwrap_err();
        assert!(matches!(err, LlmError::Timeout));

        let events = collector.events.lock().unwrap();
        assert_eq!(events.len(), 2);
        assert!(matches!(
            &events[1],
            AgentEvent::LlmCallCompleted { success: false, .. }
        ));
    }

    #[tokio::test]
    async fn cancellation_aborts_the_call() {
        let adapter = Scripted::new(vec![vec![StreamingChunk::final_text("x", None)]])
            .slow(Duration::from_secs(60));
        let (communicator, _) = communicator(adapter, Duration::from_secs(60));

        let cancel = CancellationToken::new();
        let pending = communicator.call("a1", 0, request(), &cancel);
        cancel.cancel();

        let err = pending.await.unwrap_err();
        assert!(matches!(err, LlmError::Cancelled));
        assert!(!err.is_recoverable());
    }

    #[tokio::test]
    async fn function_call_chunk_is_surfaced() {
        let adapter = Scripted::new(vec![vec![StreamingChunk::function_call(
            FunctionCall {
                name: "functions.add".into(),
                arguments: json!({"a": 2, "b": 3}).to_string(),
            },
            Some(TokenUsage::new(5, 1)),
        )]]);
        let (communicator, _) = communicator(adapter, Duration::from_secs(5));

        let response = communicator
            .call("a1", 0, request(), &CancellationToken::new())
            .await
            .unwrap();
        assert!(response.has_function_call());
        assert_eq!(response.kind, ResponseKind::FunctionCall);
    }

    #[tokio::test]
    async fn empty_stream_is_an_error() {
        let adapter = Scripted::new(vec![vec![]]);
        let (communicator, _) = communicator(adapter, Duration::from_secs(5));

        let err = communicator
            .call("a1", 0, request(), &CancellationToken::new())
            .await
            .unwrap_err();
        assert!(matches!(err, LlmError::EmptyResponse));
    }
}
