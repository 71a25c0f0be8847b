use std::fmt;

use serde::{Deserialize, Serialize};

/// Role of a chat message sent to the model.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MessageRole {
    System,
    Assistant,
    User,
}

impl fmt::Display for MessageRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MessageRole::System => write!(f, "system"),
            MessageRole::Assistant => write!(f, "assistant"),
            MessageRole::User => write!(f, "user"),
        }
    }
}

/// One prompt message. The message builder assembles these; adapters
/// translate them into whatever their provider expects.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: MessageRole,
    pub content: String,
}

impl ChatMessage {
    pub fn new<T: fmt::Display>(role: MessageRole, content: T) -> Self {
        Self {
            role,
            content: content.to_string(),
        }
    }

    pub fn new_system<T: fmt::Display>(content: T) -> Self {
        Self::new(MessageRole::System, content)
    }

    pub fn new_assistant<T: fmt::Display>(content: T) -> Self {
        Self::new(MessageRole::Assistant, content)
    }

    pub fn new_user<T: fmt::Display>(content: T) -> Self {
        Self::new(MessageRole::User, content)
    }
}

impl fmt::Display for ChatMessage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.role, self.content)
    }
}
