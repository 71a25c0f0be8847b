//! Typed lifecycle notifications.
//!
//! The engine emits; consumers decide what to do. Dispatch is inline on
//! the emitter's task and every handler call is isolated: a panicking
//! subscriber is logged and swallowed, never surfaced to the engine.

use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::Arc;
use std::time::Duration;

use crate::schemas::TokenUsage;

/// Everything the engine announces about a run.
///
/// Within one run the order is: `RunStarted`, then per step
/// `StepStarted` → (`LlmCallStarted` → `LlmChunkReceived*` →
/// `LlmCallCompleted`) → (`ToolCallStarted` → `ToolCallCompleted`)? →
/// `StepCompleted`, and finally `RunCompleted`. `StatusUpdate` may be
/// interleaved anywhere a model decision or parse failure produces one.
#[derive(Debug, Clone)]
pub enum AgentEvent {
    RunStarted {
        agent_id: String,
        goal: String,
    },
    StepStarted {
        agent_id: String,
        turn_index: usize,
    },
    LlmCallStarted {
        agent_id: String,
        turn_index: usize,
    },
    /// Cleaned, user-visible reasoning text re-emitted from the stream.
    LlmChunkReceived {
        agent_id: String,
        turn_index: usize,
        content: String,
    },
    LlmCallCompleted {
        agent_id: String,
        turn_index: usize,
        success: bool,
        error: Option<String>,
        usage: Option<TokenUsage>,
    },
    ToolCallStarted {
        agent_id: String,
        turn_index: usize,
        tool: String,
    },
    ToolCallCompleted {
        agent_id: String,
        turn_index: usize,
        tool: String,
        success: bool,
        error: Option<String>,
        execution_time: Duration,
    },
    StepCompleted {
        agent_id: String,
        turn_index: usize,
        executed_tool: bool,
    },
    RunCompleted {
        agent_id: String,
        succeeded: bool,
        total_turns: usize,
        error: Option<String>,
    },
    StatusUpdate {
        agent_id: String,
        title: String,
        details: Option<String>,
        next_step_hint: Option<String>,
        progress_pct: Option<u8>,
    },
}

/// Receiver of [`AgentEvent`]s.
///
/// Handlers are shared as `Arc<dyn EventHandler>` across the engine's
/// components and MUST treat event payloads as read-only.
pub trait EventHandler: Send + Sync {
    fn handle(&self, event: &AgentEvent);
}

impl<F> EventHandler for F
where
    F: Fn(&AgentEvent) + Send + Sync,
{
    fn handle(&self, event: &AgentEvent) {
        self(event)
    }
}

/// Fan-out of events to all subscribers, isolating each dispatch.
#[derive(Clone, Default)]
pub struct EventBus {
    handlers: Vec<Arc<dyn EventHandler>>,
}

impl EventBus {
    pub fn new(handlers: Vec<Arc<dyn EventHandler>>) -> Self {
        Self { handlers }
    }

    pub fn subscribe(&mut self, handler: Arc<dyn EventHandler>) {
        self.handlers.push(handler);
    }

    /// Deliver to every subscriber. A panicking subscriber never
    /// propagates to the emitter.
    pub fn emit(&self, event: AgentEvent) {
        for handler in &self.handlers {
            let result = catch_unwind(AssertUnwindSafe(|| handler.handle(&event)));
            if result.is_err() {
                log::warn!("event subscriber panicked while handling {event:?}");
            }
        }
    }
}
