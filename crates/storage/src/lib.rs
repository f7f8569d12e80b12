use std::collections::HashMap;
use std::sync::Arc;

use anyhow::Result;
use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use villa_core::{BookingRecord, BookingSession, ChatSession};

/// A submitted booking kept for the confirmation page.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoredConfirmation {
    pub handoff_id: String,
    pub record: BookingRecord,
    pub stored_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

pub trait ChatSessionRepository: Send + Sync {
    async fn load_chat_session(&self, session_id: &str) -> Result<Option<ChatSession>>;
    async fn upsert_chat_session(&self, session: &ChatSession) -> Result<()>;
}

pub trait BookingSessionRepository: Send + Sync {
    async fn load_booking_session(&self, session_id: &str) -> Result<Option<BookingSession>>;
    async fn upsert_booking_session(&self, session: &BookingSession) -> Result<()>;
}

pub trait ConfirmationRepository: Send + Sync {
    async fn save_confirmation(&self, confirmation: StoredConfirmation) -> Result<()>;
    async fn load_confirmation(&self, handoff_id: &str) -> Result<Option<StoredConfirmation>>;
}

pub trait ExpiringRepository: Send + Sync {
    /// Drops everything whose expiry is at or before `now`.
    async fn purge_expired(&self, now: DateTime<Utc>) -> Result<u64>;
}

#[derive(Clone, Default)]
pub struct MemoryStore {
    chat_sessions: Arc<RwLock<HashMap<String, ChatSession>>>,
    booking_sessions: Arc<RwLock<HashMap<String, BookingSession>>>,
    confirmations: Arc<RwLock<HashMap<String, StoredConfirmation>>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl ChatSessionRepository for MemoryStore {
    async fn load_chat_session(&self, session_id: &str) -> Result<Option<ChatSession>> {
        Ok(self.chat_sessions.read().get(session_id).cloned())
    }

    async fn upsert_chat_session(&self, session: &ChatSession) -> Result<()> {
        self.chat_sessions
            .write()
            .insert(session.session_id.clone(), session.clone());
        Ok(())
    }
}

impl BookingSessionRepository for MemoryStore {
    async fn load_booking_session(&self, session_id: &str) -> Result<Option<BookingSession>> {
        Ok(self.booking_sessions.read().get(session_id).cloned())
    }

    async fn upsert_booking_session(&self, session: &BookingSession) -> Result<()> {
        self.booking_sessions
            .write()
            .insert(session.session_id.clone(), session.clone());
        Ok(())
    }
}

impl ConfirmationRepository for MemoryStore {
    async fn save_confirmation(&self, confirmation: StoredConfirmation) -> Result<()> {
        self.confirmations
            .write()
            .insert(confirmation.handoff_id.clone(), confirmation);
        Ok(())
    }

    async fn load_confirmation(&self, handoff_id: &str) -> Result<Option<StoredConfirmation>> {
        Ok(self.confirmations.read().get(handoff_id).cloned())
    }
}

impl ExpiringRepository for MemoryStore {
    async fn purge_expired(&self, now: DateTime<Utc>) -> Result<u64> {
        let mut removed = 0_u64;

        self.chat_sessions.write().retain(|_, value| {
            let keep = value.expires_at > now;
            if !keep {
                removed += 1;
            }
            keep
        });
        self.booking_sessions.write().retain(|_, value| {
            let keep = value.expires_at > now;
            if !keep {
                removed += 1;
            }
            keep
        });
        self.confirmations.write().retain(|_, value| {
            let keep = value.expires_at > now;
            if !keep {
                removed += 1;
            }
            keep
        });

        Ok(removed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    #[tokio::test]
    async fn chat_session_round_trip() {
        let store = MemoryStore::new();
        let now = Utc::now();
        let session = ChatSession::open("c-1".to_string(), now, now + Duration::hours(1));

        store.upsert_chat_session(&session).await.unwrap();
        let loaded = store.load_chat_session("c-1").await.unwrap().unwrap();

        assert_eq!(loaded.transcript.len(), 1);
        assert!(store.load_chat_session("c-2").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn purge_drops_only_expired_entries() {
        let store = MemoryStore::new();
        let now = Utc::now();

        store
            .upsert_booking_session(&BookingSession::new(
                "old".to_string(),
                now - Duration::minutes(1),
            ))
            .await
            .unwrap();
        store
            .upsert_booking_session(&BookingSession::new(
                "fresh".to_string(),
                now + Duration::hours(1),
            ))
            .await
            .unwrap();
        store
            .upsert_chat_session(&ChatSession::open(
                "gone".to_string(),
                now,
                now - Duration::seconds(1),
            ))
            .await
            .unwrap();

        assert_eq!(store.purge_expired(now).await.unwrap(), 2);
        assert!(store.load_booking_session("fresh").await.unwrap().is_some());
        assert!(store.load_booking_session("old").await.unwrap().is_none());
    }
}
