use serde::{Deserialize, Serialize};

/// Storage-local message role, intentionally decoupled from the chat-layer role enum.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageRole {
    User,
    // Older snapshots tagged replies as "llm".
    #[serde(alias = "llm")]
    Assistant,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MessageRecord {
    pub role: MessageRole,
    pub text: String,
}

impl MessageRecord {
    pub fn new(role: MessageRole, text: impl Into<String>) -> Self {
        Self {
            role,
            text: text.into(),
        }
    }
}

/// One persisted chat thread, in the order it appears in the snapshot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionRecord {
    pub id: u64,
    pub title: String,
    #[serde(default)]
    pub messages: Vec<MessageRecord>,
}

impl SessionRecord {
    pub fn new(id: u64, title: impl Into<String>, messages: Vec<MessageRecord>) -> Self {
        Self {
            id,
            title: title.into(),
            messages,
        }
    }
}
