//! Pluggable reasoning strategies.
//!
//! The orchestrator may consult a reasoning engine before entering the
//! turn loop; the engine owns its chain or tree while reasoning and
//! hands the artifact back on completion.

mod chain;
mod tree;

use serde::{Deserialize, Serialize};

pub use chain::{ChainOfThoughtEngine, ReasoningChain, ReasoningStep, StepType};
pub use tree::{NodeState, ReasoningTree, ThoughtNode, ThoughtType, TreeOfThoughtsEngine};

/// Which engine the orchestrator consults.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReasoningType {
    #[default]
    None,
    ChainOfThought,
    TreeOfThoughts,
    /// Chain first, then tree; both artifacts are kept.
    Hybrid,
}

/// Frontier discipline for tree exploration.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExplorationStrategy {
    #[default]
    BestFirst,
    BreadthFirst,
    DepthFirst,
    BeamSearch,
    MonteCarlo,
}

/// What a reasoning consult produced, independent of the engine.
#[derive(Debug, Clone)]
pub struct ReasoningOutcome {
    pub success: bool,
    pub conclusion: String,
    pub confidence: f64,
}
