mod chunk;
mod message;
mod model_message;
mod state;
mod token_usage;
mod tool_call;

pub use chunk::{FunctionCall, FunctionSpec, ResponseKind, StreamingChunk};
pub use message::{ChatMessage, MessageRole};
pub use model_message::{ActionInput, AgentAction, ModelMessage};
pub use state::{AgentState, AgentTurn};
pub use token_usage::TokenUsage;
pub use tool_call::{FailureKind, ToolCallRequest, ToolExecutionResult};
