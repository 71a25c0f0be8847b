use std::collections::HashMap;

use async_trait::async_trait;
use parking_lot::Mutex;

use crate::schemas::AgentState;

use super::{StateStore, StoreError};

/// Process-local store for tests and embedders that do not need
/// persistence across restarts.
#[derive(Default)]
pub struct InMemoryStateStore {
    states: Mutex<HashMap<String, AgentState>>,
}

impl InMemoryStateStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl StateStore for InMemoryStateStore {
    async fn load(&self, agent_id: &str) -> Result<Option<AgentState>, StoreError> {
        Ok(self.states.lock().get(agent_id).cloned())
    }

    async fn save(&self, agent_id: &str, state: &AgentState) -> Result<(), StoreError> {
        self.states
            .lock()
            .insert(agent_id.to_string(), state.clone());
        Ok(())
    }

    async fn delete(&self, agent_id: &str) -> Result<(), StoreError> {
        self.states.lock().remove(agent_id);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn save_load_delete() {
        let store = InMemoryStateStore::new();
        assert!(store.load("a").await.unwrap().is_none());

        store.save("a", &AgentState::new("a", "goal")).await.unwrap();
        assert_eq!(store.load("a").await.unwrap().unwrap().goal, "goal");

        store.delete("a").await.unwrap();
        assert!(store.load("a").await.unwrap().is_none());
    }
}
