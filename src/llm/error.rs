use thiserror::Error;

use crate::parser::ParseError;

#[derive(Error, Debug)]
pub enum LlmError {
    #[error("llm call timed out")]
    Timeout,

    #[error("llm call cancelled")]
    Cancelled,

    #[error("provider error: {0}")]
    Provider(String),

    #[error("llm returned an empty response")]
    EmptyResponse,

    #[error("invalid model output: {0}")]
    Parse(#[from] ParseError),
}

impl LlmError {
    /// Whether the loop can continue after appending a failure turn.
    pub fn is_recoverable(&self) -> bool {
        !matches!(self, LlmError::Cancelled)
    }
}
