mod normalize;
mod options;
mod orchestrator;
mod outcome;

pub use normalize::{normalize_function_call, NormalizeError};
pub use options::EngineOptions;
pub use orchestrator::Orchestrator;
pub use outcome::{ErrorKind, RunOutcome};
