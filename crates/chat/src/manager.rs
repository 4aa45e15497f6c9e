use std::fmt::Display;
use std::sync::Arc;
use std::time::{Duration, Instant};

use unolingo_storage::{KeyValueStore, SnapshotLoad, load_snapshot, save_snapshot};

use crate::coordinator::{
    DEFAULT_MIN_SEND_INTERVAL, SendCoordinator, SendRejection, SendTicket,
    SendTransitionRejection,
};
use crate::message::{Message, SessionId};
use crate::samples::sample_sessions;
use crate::store::{SessionStore, SessionSummary, current_unix_timestamp_millis};

/// Lead-in of the assistant message that replaces a failed reply.
pub const FAILURE_NOTICE: &str = "Sorry, something went wrong while contacting the assistant";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ManagerOptions {
    pub min_send_interval: Duration,
    /// Seed sample sessions when no snapshot was ever written.
    pub seed_samples: bool,
}

impl Default for ManagerOptions {
    fn default() -> Self {
        Self {
            min_send_interval: DEFAULT_MIN_SEND_INTERVAL,
            seed_samples: true,
        }
    }
}

/// Read-only state handed to the presentation layer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChatViewState {
    pub active_session_id: Option<SessionId>,
    pub messages: Vec<Message>,
    pub sessions: Vec<SessionSummary>,
    pub is_sending: bool,
    pub draft: String,
}

/// How a delivered completion landed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Completion {
    Resolved {
        session_id: SessionId,
    },
    Failed {
        session_id: SessionId,
        diagnostic: String,
    },
}

impl Completion {
    pub fn session_id(&self) -> SessionId {
        match self {
            Self::Resolved { session_id } | Self::Failed { session_id, .. } => *session_id,
        }
    }
}

pub fn failure_diagnostic(error: &impl Display) -> String {
    format!("{FAILURE_NOTICE}: {error}")
}

/// Owns the session collection, the selection, the send lifecycle and the draft,
/// and writes a snapshot after every collection change.
pub struct SessionManager {
    store: SessionStore,
    coordinator: SendCoordinator,
    draft: String,
    slot: Arc<dyn KeyValueStore>,
}

impl SessionManager {
    /// Starts from an empty collection without reading `slot`.
    pub fn new(slot: Arc<dyn KeyValueStore>, options: ManagerOptions) -> Self {
        Self {
            store: SessionStore::new(),
            coordinator: SendCoordinator::new(options.min_send_interval),
            draft: String::new(),
            slot,
        }
    }

    /// Restores the collection from `slot` and selects the most recent session.
    ///
    /// A missing snapshot seeds sample sessions when enabled; an unreadable one
    /// starts empty.
    pub fn load(slot: Arc<dyn KeyValueStore>, options: ManagerOptions) -> Self {
        let mut seeded = false;
        let store = match load_snapshot(slot.as_ref()) {
            SnapshotLoad::Loaded(records) => {
                tracing::info!(sessions = records.len(), "restored sessions from snapshot");
                SessionStore::from_records(records)
            }
            SnapshotLoad::Missing if options.seed_samples => {
                tracing::info!("no snapshot found; seeding sample sessions");
                seeded = true;
                SessionStore::from_records(sample_sessions(current_unix_timestamp_millis()))
            }
            SnapshotLoad::Missing => SessionStore::new(),
            SnapshotLoad::Unreadable { details } => {
                tracing::warn!(details = %details, "starting with an empty session list");
                SessionStore::new()
            }
        };

        let mut manager = Self {
            store,
            coordinator: SendCoordinator::new(options.min_send_interval),
            draft: String::new(),
            slot,
        };
        if seeded {
            manager.persist();
        }

        let most_recent = manager.store.sessions().first().map(|session| session.id);
        manager.store.select_session(most_recent);
        manager
    }

    pub fn store(&self) -> &SessionStore {
        &self.store
    }

    pub fn coordinator(&self) -> &SendCoordinator {
        &self.coordinator
    }

    pub fn is_sending(&self) -> bool {
        self.coordinator.is_sending()
    }

    pub fn active_messages(&self) -> &[Message] {
        self.store.active_messages()
    }

    pub fn draft(&self) -> &str {
        &self.draft
    }

    pub fn set_draft(&mut self, text: impl Into<String>) {
        self.draft = text.into();
    }

    pub fn view(&self) -> ChatViewState {
        ChatViewState {
            active_session_id: self.store.active_session().map(|session| session.id),
            messages: self.store.active_messages().to_vec(),
            sessions: self.store.summaries(),
            is_sending: self.coordinator.is_sending(),
            draft: self.draft.clone(),
        }
    }

    pub fn select_session(&mut self, session_id: Option<SessionId>) -> bool {
        self.store.select_session(session_id)
    }

    /// Switches to the fresh, unattached chat view.
    pub fn new_chat(&mut self) {
        self.store.select_session(None);
    }

    /// Accepts `text` as the user's next turn and returns the ticket the remote
    /// call must complete.
    pub fn submit(&mut self, text: &str) -> Result<SendTicket, SendRejection> {
        self.submit_at(text, Instant::now())
    }

    pub fn submit_at(&mut self, text: &str, now: Instant) -> Result<SendTicket, SendRejection> {
        self.coordinator.check_ready(now).inspect_err(|rejection| {
            tracing::debug!(rejection = ?rejection, "submit ignored");
        })?;

        let prompt = text.trim();
        if prompt.is_empty() {
            tracing::debug!("submit ignored: empty input");
            return Err(SendRejection::EmptyInput);
        }

        let session_id = match self.store.active_session().map(|session| session.id) {
            Some(active_id) => self.store.append_message(active_id, Message::user(prompt)),
            None => {
                let created = self.store.create_session(Message::user(prompt));
                self.store.select_session(Some(created));
                created
            }
        };

        let ticket = self.coordinator.start(session_id, prompt, now)?;
        self.draft.clear();
        self.persist();

        tracing::info!(
            ticket = %ticket.id,
            session_id = %ticket.session_id,
            "accepted send"
        );
        Ok(ticket)
    }

    /// Delivers the remote call's outcome for `ticket`.
    ///
    /// Exactly one assistant message is appended: the reply, or a diagnostic built
    /// from the error. Completions for any ticket other than the one in flight are
    /// rejected and append nothing.
    pub fn complete<E: Display>(
        &mut self,
        ticket: &SendTicket,
        reply: Result<String, E>,
    ) -> Result<Completion, SendTransitionRejection> {
        let (outcome, assistant_text) = match reply {
            Ok(reply) => (Ok(()), reply),
            Err(error) => {
                let diagnostic = failure_diagnostic(&error);
                (Err(diagnostic.clone()), diagnostic)
            }
        };
        let failed = outcome.is_err();

        self.coordinator
            .finish(ticket.id, outcome)
            .inspect_err(|rejection| {
                tracing::warn!(
                    ticket = %ticket.id,
                    rejection = ?rejection,
                    "dropping completion that does not match the send in flight"
                );
            })?;

        let session_id = self
            .store
            .append_message(ticket.session_id, Message::assistant(assistant_text.clone()));
        self.persist();

        if failed {
            tracing::info!(ticket = %ticket.id, session_id = %session_id, "send failed");
            Ok(Completion::Failed {
                session_id,
                diagnostic: assistant_text,
            })
        } else {
            tracing::info!(ticket = %ticket.id, session_id = %session_id, "send resolved");
            Ok(Completion::Resolved { session_id })
        }
    }

    /// Writes the snapshot. Failures are logged and swallowed; the next change retries.
    pub fn persist(&self) -> bool {
        match save_snapshot(self.slot.as_ref(), &self.store.to_records()) {
            Ok(()) => true,
            Err(error) => {
                tracing::warn!(
                    sessions = self.store.len(),
                    error = %error,
                    "failed to persist sessions; keeping in-memory state"
                );
                false
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use unolingo_storage::{
        MemoryStore, SNAPSHOT_KEY, SessionRecord, StorageError, StorageResult, decode_snapshot,
    };

    use super::*;
    use crate::coordinator::SendState;
    use crate::store::MAX_SESSIONS;

    fn options() -> ManagerOptions {
        ManagerOptions {
            min_send_interval: Duration::ZERO,
            seed_samples: false,
        }
    }

    fn empty_manager() -> (SessionManager, Arc<MemoryStore>) {
        let slot = Arc::new(MemoryStore::new());
        (SessionManager::load(slot.clone(), options()), slot)
    }

    fn persisted(slot: &MemoryStore) -> Vec<SessionRecord> {
        let raw = slot
            .get(SNAPSHOT_KEY)
            .expect("slot readable")
            .expect("snapshot written");
        decode_snapshot(&raw).expect("snapshot decodes")
    }

    /// Slot whose writes fail until `healthy` is set.
    #[derive(Default)]
    struct FlakySlot {
        inner: MemoryStore,
        failed_writes: AtomicUsize,
        healthy: std::sync::atomic::AtomicBool,
    }

    impl KeyValueStore for FlakySlot {
        fn get(&self, key: &str) -> StorageResult<Option<String>> {
            self.inner.get(key)
        }

        fn set(&self, key: &str, value: &str) -> StorageResult<()> {
            if !self.healthy.load(Ordering::SeqCst) {
                self.failed_writes.fetch_add(1, Ordering::SeqCst);
                return Err(StorageError::SlotUnavailable {
                    stage: "test-slot",
                    key: key.to_string(),
                    details: "quota exceeded".to_string(),
                });
            }
            self.inner.set(key, value)
        }
    }

    #[test]
    fn first_send_creates_selects_and_persists_a_session() {
        let (mut manager, slot) = empty_manager();
        manager.set_draft("  Hello  ");

        let ticket = manager.submit("  Hello  ").expect("accepted");

        assert_eq!(ticket.prompt, "Hello");
        assert_eq!(manager.store().active_session_id(), Some(ticket.session_id));
        assert_eq!(manager.active_messages(), &[Message::user("Hello")]);
        assert_eq!(manager.draft(), "");
        assert!(manager.is_sending());
        let records = persisted(&slot);
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].title, "Hello");
    }

    #[test]
    fn whitespace_input_changes_nothing() {
        let (mut manager, slot) = empty_manager();
        manager.set_draft("   ");

        assert_eq!(manager.submit(" \n\t "), Err(SendRejection::EmptyInput));

        assert!(manager.store().is_empty());
        assert!(!manager.is_sending());
        assert_eq!(manager.draft(), "   ");
        assert_eq!(slot.get(SNAPSHOT_KEY).expect("readable"), None);
    }

    #[test]
    fn back_to_back_submits_accept_only_the_first() {
        let (mut manager, _) = empty_manager();

        let first = manager.submit("Hello").expect("first accepted");
        let second = manager.submit("Hello");

        assert_eq!(
            second,
            Err(SendRejection::AlreadySending { active: first.id })
        );
        assert_eq!(manager.store().len(), 1);
        assert_eq!(manager.active_messages().len(), 1);
    }

    #[test]
    fn reply_is_appended_after_the_user_turn() {
        let (mut manager, slot) = empty_manager();
        let ticket = manager.submit("Hello").expect("accepted");

        let completion = manager
            .complete(&ticket, Ok::<_, String>("Hi there".to_string()))
            .expect("completion accepted");

        assert_eq!(
            completion,
            Completion::Resolved {
                session_id: ticket.session_id
            }
        );
        assert_eq!(
            manager.active_messages(),
            &[Message::user("Hello"), Message::assistant("Hi there")]
        );
        assert_eq!(manager.coordinator().state(), &SendState::Idle);
        assert_eq!(persisted(&slot)[0].messages.len(), 2);
    }

    #[test]
    fn failure_appends_one_diagnostic_and_frees_the_coordinator() {
        let (mut manager, _) = empty_manager();
        let ticket = manager.submit("Hello").expect("accepted");

        let completion = manager
            .complete(&ticket, Err::<String, _>("connection refused"))
            .expect("completion accepted");

        let Completion::Failed { diagnostic, .. } = completion else {
            panic!("expected a failed completion");
        };
        assert!(diagnostic.starts_with(FAILURE_NOTICE));
        assert!(diagnostic.contains("connection refused"));
        assert_eq!(manager.active_messages().len(), 2);
        assert_eq!(
            manager.active_messages()[1],
            Message::assistant(diagnostic.clone())
        );
        assert!(manager.submit("Again").is_ok());
    }

    #[test]
    fn stale_completion_appends_nothing() {
        let (mut manager, _) = empty_manager();
        let ticket = manager.submit("Hello").expect("accepted");
        manager
            .complete(&ticket, Ok::<_, String>("Hi".to_string()))
            .expect("first completion");

        let replay = manager.complete(&ticket, Ok::<_, String>("Hi again".to_string()));

        assert_eq!(replay, Err(SendTransitionRejection::NoActiveSend));
        assert_eq!(manager.active_messages().len(), 2);
    }

    #[test]
    fn cooldown_rejects_rapid_sends_until_the_interval_passes() {
        let slot = Arc::new(MemoryStore::new());
        let mut manager = SessionManager::load(
            slot,
            ManagerOptions {
                min_send_interval: Duration::from_millis(200),
                seed_samples: false,
            },
        );
        let start = Instant::now();
        let ticket = manager.submit_at("one", start).expect("accepted");
        manager
            .complete(&ticket, Ok::<_, String>("reply".to_string()))
            .expect("completion");

        let early = manager.submit_at("two", start + Duration::from_millis(100));
        assert!(matches!(early, Err(SendRejection::Cooldown { .. })));
        assert_eq!(manager.active_messages().len(), 2);

        assert!(
            manager
                .submit_at("two", start + Duration::from_millis(250))
                .is_ok()
        );
    }

    #[test]
    fn new_chat_with_full_collection_evicts_the_oldest() {
        let (mut manager, _) = empty_manager();
        let mut created = Vec::new();
        for index in 0..MAX_SESSIONS {
            manager.new_chat();
            let ticket = manager.submit(&format!("topic {index}")).expect("accepted");
            manager
                .complete(&ticket, Ok::<_, String>("ok".to_string()))
                .expect("completion");
            created.push(ticket.session_id);
        }

        manager.new_chat();
        assert!(manager.active_messages().is_empty());
        let ticket = manager.submit("eleventh").expect("accepted");

        assert_eq!(manager.store().len(), MAX_SESSIONS);
        assert!(!manager.store().contains(created[0]));
        assert_eq!(manager.store().sessions()[0].id, ticket.session_id);
    }

    #[test]
    fn load_restores_and_selects_the_most_recent_session() {
        let (mut manager, slot) = empty_manager();
        let ticket = manager.submit("Cześć, jak się masz?").expect("accepted");
        manager
            .complete(&ticket, Ok::<_, String>("I'm fine 😊".to_string()))
            .expect("completion");

        let restored = SessionManager::load(slot, options());

        assert_eq!(restored.store().to_records(), manager.store().to_records());
        assert_eq!(
            restored.store().active_session_id(),
            Some(ticket.session_id)
        );
    }

    #[test]
    fn first_run_seeds_samples_but_corrupt_data_starts_empty() {
        let fresh = Arc::new(MemoryStore::new());
        let seeded = SessionManager::load(fresh.clone(), ManagerOptions::default());
        assert_eq!(seeded.store().len(), MAX_SESSIONS);
        assert_eq!(persisted(&fresh).len(), MAX_SESSIONS);
        assert!(seeded.store().active_session_id().is_some());

        let corrupt = Arc::new(MemoryStore::with_slot(SNAPSHOT_KEY, "[{\"id\":"));
        let recovered = SessionManager::load(corrupt, ManagerOptions::default());
        assert!(recovered.store().is_empty());
        assert_eq!(recovered.store().active_session_id(), None);
    }

    #[test]
    fn web_client_snapshot_with_llm_replies_is_restored_not_reseeded() {
        let raw = r#"[{"id":1700000000000,"title":"Hi","messages":[{"role":"user","text":"Hi"},{"role":"llm","text":"Hello! How can I help?"}]}]"#;
        let slot = Arc::new(MemoryStore::with_slot("recentChats", raw));

        let manager = SessionManager::load(slot, ManagerOptions::default());

        let titles: Vec<_> = manager
            .store()
            .summaries()
            .into_iter()
            .map(|summary| summary.title)
            .collect();
        assert_eq!(titles, vec!["Hi".to_string()]);
        assert_eq!(
            manager.active_messages(),
            [
                Message::user("Hi"),
                Message::assistant("Hello! How can I help?")
            ]
            .as_slice()
        );
    }

    #[test]
    fn persistence_failures_keep_memory_state_and_retry_later() {
        let slot = Arc::new(FlakySlot::default());
        let mut manager = SessionManager::load(slot.clone(), options());

        let ticket = manager.submit("Hello").expect("accepted despite storage");
        assert_eq!(manager.active_messages().len(), 1);
        assert_eq!(slot.failed_writes.load(Ordering::SeqCst), 1);

        slot.healthy.store(true, Ordering::SeqCst);
        manager
            .complete(&ticket, Ok::<_, String>("Hi".to_string()))
            .expect("completion");

        let raw = slot
            .get(SNAPSHOT_KEY)
            .expect("readable")
            .expect("written on retry");
        let records = decode_snapshot(&raw).expect("decodes");
        assert_eq!(records[0].messages.len(), 2);
    }

    #[test]
    fn view_reflects_selection_and_busy_flag() {
        let (mut manager, _) = empty_manager();
        let ticket = manager.submit("Hello").expect("accepted");

        let view = manager.view();
        assert!(view.is_sending);
        assert_eq!(view.active_session_id, Some(ticket.session_id));
        assert_eq!(view.sessions.len(), 1);
        assert_eq!(view.sessions[0].title, "Hello");

        manager.new_chat();
        let view = manager.view();
        assert_eq!(view.active_session_id, None);
        assert!(view.messages.is_empty());
    }
}
