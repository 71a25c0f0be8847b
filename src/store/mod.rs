//! State persistence contract.
//!
//! A store keeps one [`AgentState`] per agent id. `load` of an unknown
//! id is `Ok(None)`, never an error; corrupt content also loads as
//! `None` after a warning. `save` must be atomic with respect to
//! concurrent readers of the same id.

mod file;
mod memory;

use async_trait::async_trait;
use thiserror::Error;

use crate::schemas::AgentState;

pub use file::FileStateStore;
pub use memory::InMemoryStateStore;

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("serialization error: {0}")]
    Serde(#[from] serde_json::Error),
}

#[async_trait]
pub trait StateStore: Send + Sync {
    async fn load(&self, agent_id: &str) -> Result<Option<AgentState>, StoreError>;

    async fn save(&self, agent_id: &str, state: &AgentState) -> Result<(), StoreError>;

    async fn delete(&self, agent_id: &str) -> Result<(), StoreError>;
}
