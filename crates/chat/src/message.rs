use std::fmt;

use unolingo_storage::{MessageRecord, MessageRole, SessionRecord};

/// Longest session title, in characters.
pub const TITLE_MAX_CHARS: usize = 80;

/// Stable identifier for one session. Issued in increasing order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SessionId(pub u64);

impl SessionId {
    /// Creates a typed session identifier.
    pub const fn new(raw: u64) -> Self {
        Self(raw)
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(formatter, "{}", self.0)
    }
}

/// Chat speaker role.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Role {
    User,
    Assistant,
}

/// One immutable chat turn.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Message {
    pub role: Role,
    pub text: String,
}

impl Message {
    pub fn new(role: Role, text: impl Into<String>) -> Self {
        Self {
            role,
            text: text.into(),
        }
    }

    pub fn user(text: impl Into<String>) -> Self {
        Self::new(Role::User, text)
    }

    pub fn assistant(text: impl Into<String>) -> Self {
        Self::new(Role::Assistant, text)
    }
}

/// One conversation thread.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Session {
    pub id: SessionId,
    pub title: String,
    pub messages: Vec<Message>,
}

impl Session {
    /// Starts a thread whose title is derived from its first message.
    pub fn started_with(id: SessionId, first_message: Message) -> Self {
        Self {
            id,
            title: truncate_title(&first_message.text),
            messages: vec![first_message],
        }
    }
}

/// Clips `text` to [`TITLE_MAX_CHARS`] characters without splitting a character.
pub fn truncate_title(text: &str) -> String {
    match text.char_indices().nth(TITLE_MAX_CHARS) {
        Some((byte_index, _)) => text[..byte_index].to_string(),
        None => text.to_string(),
    }
}

impl From<&Message> for MessageRecord {
    fn from(message: &Message) -> Self {
        let role = match message.role {
            Role::User => MessageRole::User,
            Role::Assistant => MessageRole::Assistant,
        };
        MessageRecord::new(role, message.text.clone())
    }
}

impl From<MessageRecord> for Message {
    fn from(record: MessageRecord) -> Self {
        let role = match record.role {
            MessageRole::User => Role::User,
            MessageRole::Assistant => Role::Assistant,
        };
        Message::new(role, record.text)
    }
}

impl From<&Session> for SessionRecord {
    fn from(session: &Session) -> Self {
        SessionRecord::new(
            session.id.0,
            session.title.clone(),
            session.messages.iter().map(MessageRecord::from).collect(),
        )
    }
}

impl From<SessionRecord> for Session {
    fn from(record: SessionRecord) -> Self {
        Self {
            id: SessionId::new(record.id),
            title: record.title,
            messages: record.messages.into_iter().map(Message::from).collect(),
        }
    }
}
