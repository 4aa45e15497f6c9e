#![deny(unsafe_code)]

/// Chat session state: the ordered thread collection, the single-flight send
/// lifecycle, persistence of the whole collection, and an async driver that
/// ties them to a responder.
pub mod client;
/// Single-flight send lifecycle.
pub mod coordinator;
pub mod manager;
/// Domain entities shared across modules.
pub mod message;
pub mod samples;
/// Settings persistence.
pub mod settings;
pub mod store;

pub use client::{ChatClient, SendOutcome};
pub use coordinator::{
    DEFAULT_MIN_SEND_INTERVAL, SendCoordinator, SendRejection, SendState, SendTicket,
    SendTransition, SendTransitionRejection, SendTransitionResult, TicketId,
};
pub use manager::{
    ChatViewState, Completion, FAILURE_NOTICE, ManagerOptions, SessionManager, failure_diagnostic,
};
pub use message::{Message, Role, Session, SessionId, TITLE_MAX_CHARS, truncate_title};
pub use settings::{Settings, SettingsError, SettingsStore};
pub use store::{MAX_SESSIONS, SessionStore, SessionSummary};
