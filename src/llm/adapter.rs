use std::pin::Pin;

use async_trait::async_trait;
use futures::Stream;
use tokio_util::sync::CancellationToken;

use crate::schemas::{ChatMessage, FunctionSpec, StreamingChunk};

use super::LlmError;

pub type ChunkStream = Pin<Box<dyn Stream<Item = Result<StreamingChunk, LlmError>> + Send>>;

/// One request to a provider.
#[derive(Debug, Clone, Default)]
pub struct LlmRequest {
    pub messages: Vec<ChatMessage>,
    /// Function declarations; empty unless the engine takes the
    /// native function-calling path.
    pub functions: Vec<FunctionSpec>,
    pub temperature: Option<f32>,
    pub max_tokens: Option<u32>,
}

impl LlmRequest {
    pub fn new(messages: Vec<ChatMessage>) -> Self {
        Self {
            messages,
            ..Default::default()
        }
    }

    pub fn with_functions(mut self, functions: Vec<FunctionSpec>) -> Self {
        self.functions = functions;
        self
    }

    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = Some(temperature);
        self
    }

    pub fn with_max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = Some(max_tokens);
        self
    }
}

/// The one seam between the engine and a model provider.
///
/// Providers MUST yield exactly one `is_final = true` chunk per call,
/// surface usage on it when available, and honor the cancellation
/// token. Providers without native function calling simply never set
/// `function_call`; the engine then parses the text as ReAct JSON.
#[async_trait]
pub trait LlmAdapter: Send + Sync {
    async fn stream(
        &self,
        request: LlmRequest,
        cancel: CancellationToken,
    ) -> Result<ChunkStream, LlmError>;

    /// Whether `functions` in a request will be honored natively.
    fn supports_functions(&self) -> bool {
        false
    }
}
