//! Filesystem-backed store: one JSONL file per agent.
//!
//! Line 1 is a header record (everything but the turns); each
//! following line is one turn in index order, so a step only ever
//! appends logically. Saves go through a temp file in the same
//! directory followed by a rename, which keeps concurrent readers on a
//! consistent snapshot.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::schemas::{AgentState, AgentTurn, ChatMessage};
use crate::reasoning::{ReasoningChain, ReasoningTree};

use super::{StateStore, StoreError};

pub struct FileStateStore {
    root: PathBuf,
}

#[derive(Serialize, Deserialize)]
struct Header {
    agent_id: String,
    goal: String,
    updated_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    current_reasoning_chain: Option<ReasoningChain>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    current_reasoning_tree: Option<ReasoningTree>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    additional_messages: Vec<ChatMessage>,
    #[serde(default, skip_serializing_if = "Map::is_empty")]
    metadata: Map<String, Value>,
}

impl FileStateStore {
    /// Store rooted at the given directory, created lazily on first save.
    pub fn new(root: &Path) -> Self {
        Self {
            root: root.to_path_buf(),
        }
    }

    fn path_for(&self, agent_id: &str) -> PathBuf {
        self.root.join(format!("{}.jsonl", encode_id(agent_id)))
    }

    fn encode(state: &AgentState) -> Result<String, StoreError> {
        let header = Header {
            agent_id: state.agent_id.clone(),
            goal: state.goal.clone(),
            updated_at: state.updated_at,
            current_reasoning_chain: state.current_reasoning_chain.clone(),
            current_reasoning_tree: state.current_reasoning_tree.clone(),
            additional_messages: state.additional_messages.clone(),
            metadata: state.metadata.clone(),
        };
        let mut out = serde_json::to_string(&header)?;
        for turn in &state.turns {
            out.push('\n');
            out.push_str(&serde_json::to_string(turn)?);
        }
        out.push('\n');
        Ok(out)
    }

    fn decode(agent_id: &str, contents: &str) -> Option<AgentState> {
        let mut lines = contents.lines().filter(|l| !l.trim().is_empty());
        let header: Header = match serde_json::from_str(lines.next()?) {
            Ok(header) => header,
            Err(e) => {
                log::warn!("corrupt state header for agent {agent_id}: {e}");
                return None;
            }
        };

        let mut turns: Vec<AgentTurn> = Vec::new();
        for (n, line) in lines.enumerate() {
            match serde_json::from_str(line) {
                Ok(turn) => turns.push(turn),
                Err(e) => {
                    log::warn!("corrupt turn record {n} for agent {agent_id}: {e}");
                    return None;
                }
            }
        }

        Some(AgentState {
            agent_id: header.agent_id,
            goal: header.goal,
            turns,
            updated_at: header.updated_at,
            current_reasoning_chain: header.current_reasoning_chain,
            current_reasoning_tree: header.current_reasoning_tree,
            additional_messages: header.additional_messages,
            metadata: header.metadata,
        })
    }
}

/// Encode an agent id into a safe filename.
fn encode_id(agent_id: &str) -> String {
    let mut encoded = String::new();
    for ch in agent_id.chars() {
        match ch {
            'a'..='z' | 'A'..='Z' | '0'..='9' | '-' | '_' | '.' => encoded.push(ch),
            _ => {
                for byte in ch.to_string().as_bytes() {
                    encoded.push_str(&format!("%{byte:02X}"));
                }
            }
        }
    }
    encoded
}

#[async_trait]
impl StateStore for FileStateStore {
    async fn load(&self, agent_id: &str) -> Result<Option<AgentState>, StoreError> {
        let path = self.path_for(agent_id);
        match tokio::fs::read_to_string(&path).await {
            Ok(contents) => Ok(Self::decode(agent_id, &contents)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    async fn save(&self, agent_id: &str, state: &AgentState) -> Result<(), StoreError> {
        tokio::fs::create_dir_all(&self.root).await?;
        let path = self.path_for(agent_id);
        let tmp = path.with_extension("jsonl.tmp");
        let contents = Self::encode(state)?;
        tokio::fs::write(&tmp, contents).await?;
        tokio::fs::rename(&tmp, &path).await?;
        Ok(())
    }

    async fn delete(&self, agent_id: &str) -> Result<(), StoreError> {
        let path = self.path_for(agent_id);
        match tokio::fs::remove_file(&path).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}
