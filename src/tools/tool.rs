use std::error::Error;
use std::time::Duration;

use async_trait::async_trait;
use indoc::formatdoc;
use serde_json::Value;
use tokio_util::sync::CancellationToken;

use crate::schemas::FunctionSpec;

use super::ToolParameters;

/// A capability the engine can dispatch to.
///
/// Implementations are injected by the embedder; the engine only ever
/// sees this trait.
#[async_trait]
pub trait Tool: Send + Sync {
    /// Returns the name of the tool.
    fn name(&self) -> String;

    /// Provides a description of what the tool does and when to use it.
    fn description(&self) -> String;

    /// Declared parameter schema, used for catalog text, function
    /// specs, and pre-invocation validation.
    fn parameters(&self) -> ToolParameters {
        ToolParameters::default()
    }

    /// Whether a prior successful result may be reused instead of
    /// invoking again.
    fn allow_dedupe(&self) -> bool {
        true
    }

    /// Per-tool freshness window for cached results; `None` uses the
    /// engine default.
    fn cache_ttl(&self) -> Option<Duration> {
        None
    }

    /// Run the tool. The token is the caller's cancellation, relayed
    /// by the executor; long-running tools should honor it.
    async fn invoke(
        &self,
        params: Value,
        cancel: CancellationToken,
    ) -> Result<Value, Box<dyn Error + Send + Sync>>;

    /// Declaration for providers with native function calling.
    fn function_spec(&self) -> FunctionSpec {
        FunctionSpec {
            name: self.name().replace(' ', "_"),
            description: self.description(),
            parameters: self.parameters().to_json_schema(),
        }
    }

    /// Catalog entry shown to the model in verbose mode.
    fn plain_description(&self) -> String {
        formatdoc! {"
            > {}: {}
            Parameters:
            {}",
            self.name(),
            self.description(),
            self.parameters().plain_description()
        }
    }
}
