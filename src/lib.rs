//! A stateful agent execution engine.
//!
//! The engine owns the Reason/Act turn loop: it asks an injected LLM
//! adapter for the next decision, dispatches tool calls through a
//! validating executor, reuses fresh cached results, suppresses
//! pathological retry loops, emits typed lifecycle events, and
//! persists a turn-indexed append log after every step. Model weights,
//! tool implementations, and UIs stay outside, behind the traits in
//! [`llm`], [`tools`], [`store`], and [`events`].
//!
//! # Example
//!
//! ```rust,ignore
//! use std::sync::Arc;
//!
//! use agentloop::engine::{EngineOptions, Orchestrator};
//! use agentloop::store::FileStateStore;
//! use tokio_util::sync::CancellationToken;
//!
//! let orchestrator = Orchestrator::new(my_adapter, Arc::new(FileStateStore::new(dir)))
//!     .with_options(EngineOptions::new().with_max_turns(20))
//!     .with_tool(my_tool);
//! let outcome = orchestrator
//!     .run("agent-1", "Summarize the report.", CancellationToken::new())
//!     .await;
//! ```

pub mod dedupe;
pub mod engine;
pub mod events;
pub mod hash;
pub mod llm;
pub mod loop_detect;
pub mod parser;
pub mod prompt;
pub mod reasoning;
pub mod schemas;
pub mod store;
pub mod tools;
