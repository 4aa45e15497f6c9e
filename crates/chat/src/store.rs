use std::collections::HashSet;
use std::time::{SystemTime, UNIX_EPOCH};

use unolingo_storage::SessionRecord;

use crate::message::{Message, Session, SessionId};

/// Most sessions kept; older ones are evicted.
pub const MAX_SESSIONS: usize = 10;

/// Sidebar entry for one session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionSummary {
    pub id: SessionId,
    pub title: String,
}

/// Ordered session collection, most recently active first, plus the selection.
///
/// Invariants: ids are unique, at most [`MAX_SESSIONS`] entries, and every append
/// moves the touched session to the front without reordering the others.
#[derive(Debug, Clone, Default)]
pub struct SessionStore {
    sessions: Vec<Session>,
    active_session_id: Option<SessionId>,
    last_issued_id: u64,
}

impl SessionStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }

    pub fn sessions(&self) -> &[Session] {
        &self.sessions
    }

    pub fn get(&self, session_id: SessionId) -> Option<&Session> {
        self.sessions
            .iter()
            .find(|session| session.id == session_id)
    }

    pub fn contains(&self, session_id: SessionId) -> bool {
        self.get(session_id).is_some()
    }

    pub fn summaries(&self) -> Vec<SessionSummary> {
        self.sessions
            .iter()
            .map(|session| SessionSummary {
                id: session.id,
                title: session.title.clone(),
            })
            .collect()
    }

    pub fn active_session_id(&self) -> Option<SessionId> {
        self.active_session_id
    }

    pub fn active_session(&self) -> Option<&Session> {
        self.active_session_id
            .and_then(|session_id| self.get(session_id))
    }

    /// Messages of the selected session; empty in the fresh new-chat state.
    pub fn active_messages(&self) -> &[Message] {
        self.active_session()
            .map(|session| session.messages.as_slice())
            .unwrap_or_default()
    }

    /// Starts a new session holding `first_message`, at the front of the collection.
    pub fn create_session(&mut self, first_message: Message) -> SessionId {
        let session_id = self.issue_session_id();
        self.sessions
            .insert(0, Session::started_with(session_id, first_message));
        tracing::info!(session_id = %session_id, "created session");
        self.evict_overflow();
        session_id
    }

    /// Appends to `session_id` and moves it to the front.
    ///
    /// When the session no longer exists a new one is started from `message`, so a
    /// message is never dropped. Returns the session that received the message.
    pub fn append_message(&mut self, session_id: SessionId, message: Message) -> SessionId {
        let Some(position) = self
            .sessions
            .iter()
            .position(|session| session.id == session_id)
        else {
            tracing::warn!(
                session_id = %session_id,
                "append target no longer exists; starting a new session"
            );
            let replacement_id = self.create_session(message);
            if self.active_session_id == Some(session_id) {
                self.active_session_id = Some(replacement_id);
            }
            return replacement_id;
        };

        let mut session = self.sessions.remove(position);
        session.messages.push(message);
        self.sessions.insert(0, session);
        session_id
    }

    /// Selects a session, or the fresh new-chat view for `None`.
    ///
    /// Unknown ids leave the selection unchanged and return `false`.
    pub fn select_session(&mut self, session_id: Option<SessionId>) -> bool {
        match session_id {
            Some(session_id) if !self.contains(session_id) => {
                tracing::debug!(session_id = %session_id, "ignoring selection of unknown session");
                false
            }
            selection => {
                self.active_session_id = selection;
                true
            }
        }
    }

    pub fn to_records(&self) -> Vec<SessionRecord> {
        self.sessions.iter().map(SessionRecord::from).collect()
    }

    /// Rebuilds a store from persisted records, keeping the first copy of any
    /// duplicated id and at most [`MAX_SESSIONS`] entries. Nothing is selected.
    pub fn from_records(records: Vec<SessionRecord>) -> Self {
        let mut seen = HashSet::new();
        let sessions = records
            .into_iter()
            .filter(|record| seen.insert(record.id))
            .take(MAX_SESSIONS)
            .map(Session::from)
            .collect::<Vec<_>>();

        Self {
            sessions,
            active_session_id: None,
            last_issued_id: 0,
        }
    }

    fn evict_overflow(&mut self) {
        while self.sessions.len() > MAX_SESSIONS {
            let Some(evicted) = self.sessions.pop() else {
                break;
            };
            if self.active_session_id == Some(evicted.id) {
                self.active_session_id = None;
            }
            tracing::info!(session_id = %evicted.id, "evicted least recently active session");
        }
    }

    // Wall-clock milliseconds, bumped past every id already issued or stored.
    fn issue_session_id(&mut self) -> SessionId {
        let floor = self
            .sessions
            .iter()
            .map(|session| session.id.0)
            .max()
            .unwrap_or(0)
            .max(self.last_issued_id);
        let now = current_unix_timestamp_millis();
        let raw = if now > floor {
            now
        } else {
            floor.saturating_add(1)
        };
        self.last_issued_id = raw;
        SessionId::new(raw)
    }
}

pub(crate) fn current_unix_timestamp_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map_or(0, |duration| {
            u64::try_from(duration.as_millis()).unwrap_or(u64::MAX)
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ids(store: &SessionStore) -> Vec<SessionId> {
        store.sessions().iter().map(|session| session.id).collect()
    }

    fn store_with(count: usize) -> (SessionStore, Vec<SessionId>) {
        let mut store = SessionStore::new();
        let created = (0..count)
            .map(|index| store.create_session(Message::user(format!("prompt {index}"))))
            .collect();
        (store, created)
    }

    #[test]
    fn created_ids_are_unique_and_increasing() {
        let (_, created) = store_with(5);

        assert!(created.windows(2).all(|pair| pair[0] < pair[1]));
    }

    #[test]
    fn new_session_goes_to_the_front() {
        let (mut store, created) = store_with(2);

        let newest = store.create_session(Message::user("Hello"));

        assert_eq!(ids(&store), vec![newest, created[1], created[0]]);
        let session = store.get(newest).expect("created session");
        assert_eq!(session.title, "Hello");
        assert_eq!(session.messages, vec![Message::user("Hello")]);
    }

    #[test]
    fn capacity_evicts_the_least_recently_active_session() {
        let (mut store, created) = store_with(MAX_SESSIONS);
        // Touch the oldest so the second-oldest becomes least recently active.
        store.append_message(created[0], Message::assistant("still here"));

        store.create_session(Message::user("one more"));

        assert_eq!(store.len(), MAX_SESSIONS);
        assert!(store.contains(created[0]));
        assert!(!store.contains(created[1]));
    }

    #[test]
    fn collection_never_exceeds_capacity() {
        let mut store = SessionStore::new();
        for index in 0..(MAX_SESSIONS * 3) {
            let session_id = store.create_session(Message::user(format!("q{index}")));
            store.append_message(session_id, Message::assistant("a"));
            assert!(store.len() <= MAX_SESSIONS);
        }
        assert_eq!(store.len(), MAX_SESSIONS);
    }

    #[test]
    fn append_moves_session_to_front_and_keeps_the_rest_in_order() {
        let (mut store, created) = store_with(4);
        // Front to back: c3, c2, c1, c0.

        let landed = store.append_message(created[1], Message::user("again"));

        assert_eq!(landed, created[1]);
        assert_eq!(
            ids(&store),
            vec![created[1], created[3], created[2], created[0]]
        );
        assert_eq!(
            store.get(created[1]).expect("session").messages.last(),
            Some(&Message::user("again"))
        );
    }

    #[test]
    fn append_to_missing_session_starts_a_new_one() {
        let (mut store, created) = store_with(1);

        let landed = store.append_message(SessionId::new(1), Message::assistant("late reply"));

        assert_ne!(landed, SessionId::new(1));
        assert_eq!(ids(&store), vec![landed, created[0]]);
        let session = store.get(landed).expect("replacement");
        assert_eq!(session.title, "late reply");
        assert_eq!(session.messages, vec![Message::assistant("late reply")]);
    }

    #[test]
    fn selection_tracks_known_sessions_only() {
        let (mut store, created) = store_with(2);

        assert!(store.active_messages().is_empty());
        assert!(store.select_session(Some(created[0])));
        assert_eq!(store.active_messages(), &[Message::user("prompt 0")]);

        assert!(!store.select_session(Some(SessionId::new(3))));
        assert_eq!(store.active_session_id(), Some(created[0]));

        assert!(store.select_session(None));
        assert!(store.active_messages().is_empty());
    }

    #[test]
    fn evicting_the_selected_session_clears_the_selection() {
        let (mut store, created) = store_with(MAX_SESSIONS);
        store.select_session(Some(created[0]));

        store.create_session(Message::user("overflow"));

        assert!(!store.contains(created[0]));
        assert_eq!(store.active_session_id(), None);
    }

    #[test]
    fn records_round_trip_including_empty_sessions() {
        let (mut store, created) = store_with(3);
        store.append_message(created[0], Message::assistant("Cześć! 👋"));
        let mut records = store.to_records();
        records.push(SessionRecord::new(1, "empty", Vec::new()));

        let restored = SessionStore::from_records(records.clone());

        assert_eq!(restored.to_records(), records);
    }

    #[test]
    fn restore_drops_duplicates_and_overflow() {
        let mut records = (1..=12)
            .rev()
            .map(|id| SessionRecord::new(id, format!("s{id}"), Vec::new()))
            .collect::<Vec<_>>();
        records.insert(1, SessionRecord::new(12, "duplicate", Vec::new()));

        let restored = SessionStore::from_records(records);

        assert_eq!(restored.len(), MAX_SESSIONS);
        assert_eq!(restored.sessions()[0].title, "s12");
        assert_eq!(restored.sessions()[1].title, "s11");
    }

    #[test]
    fn ids_stay_ahead_of_restored_sessions() {
        let far_future = u64::MAX / 2;
        let mut store =
            SessionStore::from_records(vec![SessionRecord::new(far_future, "future", Vec::new())]);

        let created = store.create_session(Message::user("now"));

        assert_eq!(created, SessionId::new(far_future + 1));
    }
}
