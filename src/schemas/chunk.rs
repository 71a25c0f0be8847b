use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::TokenUsage;

/// How the provider actually answered, reported on the final chunk.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResponseKind {
    Text,
    FunctionCall,
    Streaming,
}

/// A native function-calling request decoded from the model.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FunctionCall {
    pub name: String,
    /// Raw JSON text of the arguments, exactly as the provider sent it.
    pub arguments: String,
}

/// Declaration of a callable function for providers with native
/// function-calling support.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FunctionSpec {
    pub name: String,
    pub description: String,
    pub parameters: Value,
}

/// One element of an adapter's response stream.
///
/// Text responses yield many non-final chunks followed by a final one;
/// a native function call yields exactly one final chunk with
/// `function_call` set; non-streaming text yields a single final chunk.
#[derive(Debug, Clone)]
pub struct StreamingChunk {
    pub content: String,
    pub is_final: bool,
    pub finish_reason: Option<String>,
    pub function_call: Option<FunctionCall>,
    pub usage: Option<TokenUsage>,
    pub response_kind: ResponseKind,
}

impl StreamingChunk {
    /// An intermediate streaming text fragment.
    pub fn text<S: Into<String>>(content: S) -> Self {
        Self {
            content: content.into(),
            is_final: false,
            finish_reason: None,
            function_call: None,
            usage: None,
            response_kind: ResponseKind::Streaming,
        }
    }

    /// The terminal chunk of a text response.
    pub fn final_text<S: Into<String>>(content: S, usage: Option<TokenUsage>) -> Self {
        Self {
            content: content.into(),
            is_final: true,
            finish_reason: Some("stop".into()),
            function_call: None,
            usage,
            response_kind: ResponseKind::Text,
        }
    }

    /// The single terminal chunk of a native function call.
    pub fn function_call(call: FunctionCall, usage: Option<TokenUsage>) -> Self {
        Self {
            content: String::new(),
            is_final: true,
            finish_reason: Some("function_call".into()),
            function_call: Some(call),
            usage,
            response_kind: ResponseKind::FunctionCall,
        }
    }
}
