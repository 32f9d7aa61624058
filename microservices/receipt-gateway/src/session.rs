//! Receipt dialogue session management

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use std::sync::Arc;
use tracing::debug;

use crate::fields::{ReceiptField, ReceiptRecord};

/// Where a user currently is in the receipt dialogue.
///
/// Edit targets ride inside the variants: the single-field target exists
/// exactly while a replacement value is awaited, and the multi-field queue
/// exists exactly while the batch of replacement values is awaited. Leaving
/// the variant clears them, so no separate bookkeeping can drift.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DialogueState {
    /// Waiting for the user to send a receipt photo.
    AwaitingImage,
    /// An extracted receipt is on display; waiting for 1 (submit) or 2 (edit).
    AwaitingConfirmation,
    /// Waiting for an edit-menu selection.
    AwaitingEditField,
    /// Waiting for a replacement value for one field.
    AwaitingNewValue { field: ReceiptField },
    /// Waiting for a comma-separated list of field numbers to batch-edit.
    AwaitingMultiFieldSelection,
    /// Waiting for comma-separated values matching `queue` positionally.
    AwaitingMultiFieldValues { queue: Vec<ReceiptField> },
}

impl DialogueState {
    /// The field currently being edited, if any.
    pub fn edit_field(&self) -> Option<ReceiptField> {
        match self {
            Self::AwaitingNewValue { field } => Some(*field),
            _ => None,
        }
    }

    /// The multi-edit queue; empty outside the batch-values state.
    pub fn fields_queue(&self) -> &[ReceiptField] {
        match self {
            Self::AwaitingMultiFieldValues { queue } => queue,
            _ => &[],
        }
    }
}

/// One user's dialogue session, keyed by WhatsApp sender id.
#[derive(Debug, Clone)]
pub struct ReceiptSession {
    pub id: String,
    pub state: DialogueState,
    pub receipt: ReceiptRecord,
    pub created_at: DateTime<Utc>,
    pub last_activity: DateTime<Utc>,
}

impl ReceiptSession {
    pub fn new() -> Self {
        let now = Utc::now();
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            state: DialogueState::AwaitingImage,
            receipt: ReceiptRecord::default(),
            created_at: now,
            last_activity: now,
        }
    }

    /// Back to the initial state with a cleared record (after submission).
    pub fn reset(&mut self) {
        self.state = DialogueState::AwaitingImage;
        self.receipt = ReceiptRecord::default();
    }
}

impl Default for ReceiptSession {
    fn default() -> Self {
        Self::new()
    }
}

/// Injectable session repository.
///
/// The dialogue engine reads with `get_or_create`, mutates, and writes back
/// with `put`; swapping the backing store (e.g. for an external cache with
/// expiry) never touches the engine.
#[async_trait]
pub trait SessionStore: Send + Sync {
    /// Fetch the session for a key, creating a fresh one on first contact.
    async fn get_or_create(&self, key: &str) -> ReceiptSession;

    /// Write a session back. Concurrent events on one key are last-write-wins;
    /// WhatsApp delivers a conversation's events serially in practice.
    async fn put(&self, key: &str, session: ReceiptSession);
}

/// In-memory store: DashMap keyed by sender id with idle-TTL eviction.
#[derive(Clone)]
pub struct InMemorySessionStore {
    sessions: Arc<DashMap<String, ReceiptSession>>,
    ttl_secs: u64,
}

impl InMemorySessionStore {
    pub fn new(ttl_secs: u64) -> Self {
        Self {
            sessions: Arc::new(DashMap::new()),
            ttl_secs,
        }
    }

    /// Spawn the periodic eviction sweep.
    pub fn start_cleanup(&self, interval_secs: u64) {
        let store = self.clone();
        tokio::spawn(async move {
            let mut ticker =
                tokio::time::interval(tokio::time::Duration::from_secs(interval_secs));
            loop {
                ticker.tick().await;
                store.cleanup_expired();
            }
        });
    }

    /// Drop sessions idle past the TTL.
    pub fn cleanup_expired(&self) {
        let now = Utc::now();
        let ttl_secs = self.ttl_secs;
        let before = self.sessions.len();
        self.sessions
            .retain(|_, session| !is_expired(session, ttl_secs, now));
        let evicted = before.saturating_sub(self.sessions.len());
        if evicted > 0 {
            debug!(evicted, remaining = self.sessions.len(), "Evicted idle sessions");
        }
    }
}

fn is_expired(session: &ReceiptSession, ttl_secs: u64, now: DateTime<Utc>) -> bool {
    now.signed_duration_since(session.last_activity).num_seconds() > ttl_secs as i64
}

#[async_trait]
impl SessionStore for InMemorySessionStore {
    async fn get_or_create(&self, key: &str) -> ReceiptSession {
        if let Some(session) = self.sessions.get(key) {
            if !is_expired(&session, self.ttl_secs, Utc::now()) {
                return session.clone();
            }
        }
        let session = ReceiptSession::new();
        debug!(key, session_id = %session.id, "Created session");
        self.sessions.insert(key.to_string(), session.clone());
        session
    }

    async fn put(&self, key: &str, mut session: ReceiptSession) {
        session.last_activity = Utc::now();
        self.sessions.insert(key.to_string(), session);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    #[test]
    fn test_edit_field_set_only_while_awaiting_new_value() {
        let states = [
            DialogueState::AwaitingImage,
            DialogueState::AwaitingConfirmation,
            DialogueState::AwaitingEditField,
            DialogueState::AwaitingMultiFieldSelection,
        ];
        for state in states {
            assert_eq!(state.edit_field(), None);
        }

        let editing = DialogueState::AwaitingNewValue {
            field: ReceiptField::Phone,
        };
        assert_eq!(editing.edit_field(), Some(ReceiptField::Phone));
    }

    #[test]
    fn test_fields_queue_nonempty_only_while_awaiting_values() {
        let queued = DialogueState::AwaitingMultiFieldValues {
            queue: vec![ReceiptField::Name, ReceiptField::Email],
        };
        assert_eq!(
            queued.fields_queue(),
            &[ReceiptField::Name, ReceiptField::Email]
        );

        assert!(DialogueState::AwaitingImage.fields_queue().is_empty());
        assert!(DialogueState::AwaitingMultiFieldSelection
            .fields_queue()
            .is_empty());
        assert!(DialogueState::AwaitingEditField.fields_queue().is_empty());
    }

    #[test]
    fn test_new_session_starts_blank_and_awaiting_image() {
        let session = ReceiptSession::new();
        assert_eq!(session.state, DialogueState::AwaitingImage);
        assert!(session.receipt.is_blank());
        assert!(!session.id.is_empty());
    }

    #[test]
    fn test_reset_clears_receipt_and_state() {
        let mut session = ReceiptSession::new();
        session.state = DialogueState::AwaitingConfirmation;
        session.receipt.set(ReceiptField::Name, "Jane");
        session.reset();
        assert_eq!(session.state, DialogueState::AwaitingImage);
        assert!(session.receipt.is_blank());
    }

    #[test]
    fn test_reset_keeps_id_and_creation_time() {
        let mut session = ReceiptSession::new();
        let id = session.id.clone();
        let created_at = session.created_at;

        session.state = DialogueState::AwaitingConfirmation;
        session.receipt.set(ReceiptField::Name, "Jane");
        session.reset();

        // Session age keeps measuring from first contact across submissions.
        assert_eq!(session.id, id);
        assert_eq!(session.created_at, created_at);
    }

    #[tokio::test]
    async fn test_get_or_create_is_stable_per_key() {
        let store = InMemorySessionStore::new(1800);
        let first = store.get_or_create("2348031234567").await;
        let again = store.get_or_create("2348031234567").await;
        assert_eq!(first.id, again.id);

        let other = store.get_or_create("2348098765432").await;
        assert_ne!(first.id, other.id);
    }

    #[tokio::test]
    async fn test_put_then_get_returns_updated_session() {
        let store = InMemorySessionStore::new(1800);
        let mut session = store.get_or_create("user").await;
        session.state = DialogueState::AwaitingConfirmation;
        session.receipt.set(ReceiptField::Name, "Jane");
        store.put("user", session.clone()).await;

        let read_back = store.get_or_create("user").await;
        assert_eq!(read_back.state, DialogueState::AwaitingConfirmation);
        assert_eq!(read_back.receipt.get(ReceiptField::Name), "Jane");
    }

    #[tokio::test]
    async fn test_cleanup_evicts_only_idle_sessions() {
        let store = InMemorySessionStore::new(60);

        let mut stale = ReceiptSession::new();
        stale.last_activity = Utc::now() - Duration::seconds(120);
        store.sessions.insert("stale".to_string(), stale);

        let fresh = store.get_or_create("fresh").await;
        store.put("fresh", fresh).await;

        store.cleanup_expired();
        assert!(!store.sessions.contains_key("stale"));
        assert!(store.sessions.contains_key("fresh"));
    }

    #[tokio::test]
    async fn test_expired_session_replaced_on_next_contact() {
        let store = InMemorySessionStore::new(60);

        let mut stale = ReceiptSession::new();
        stale.state = DialogueState::AwaitingConfirmation;
        stale.last_activity = Utc::now() - Duration::seconds(120);
        let stale_id = stale.id.clone();
        store.sessions.insert("user".to_string(), stale);

        let replacement = store.get_or_create("user").await;
        assert_ne!(replacement.id, stale_id);
        assert_eq!(replacement.state, DialogueState::AwaitingImage);
    }
}
