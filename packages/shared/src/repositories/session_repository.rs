use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::watch;
use tracing::warn;

use crate::models::chat_session::ChatSession;
use crate::repositories::errors::session_repository_errors::SessionRepositoryError;
use crate::store::document_store::{Document, DocumentStore, Precondition, StoreError};

pub const SESSIONS_COLLECTION: &str = "sessions";

/// Push-based subscription to one session record. Wraps the store's change
/// notification and hands out typed snapshots. Dropping the watch is the
/// unsubscribe.
pub struct SessionWatch {
    receiver: watch::Receiver<Option<Document>>,
}

impl SessionWatch {
    /// Waits for the next remote change. Returns false once the store side
    /// of the channel is gone.
    pub async fn changed(&mut self) -> bool {
        self.receiver.changed().await.is_ok()
    }

    /// The latest session state pushed by the store, if any.
    pub fn latest(&self) -> Option<ChatSession> {
        let document = self.receiver.borrow().clone()?;
        match serde_json::from_value(document.body) {
            Ok(session) => Some(session),
            Err(e) => {
                warn!("Dropping undecodable session notification: {}", e);
                None
            }
        }
    }
}

#[async_trait]
pub trait SessionRepository: Send + Sync {
    async fn create_session(&self, session: &ChatSession) -> Result<(), SessionRepositoryError>;

    /// Returns the session together with the store version the snapshot was
    /// read at; the version is what a subsequent conditional update is
    /// predicated on.
    async fn get_session(
        &self,
        session_id: &str,
    ) -> Result<Option<(ChatSession, u64)>, SessionRepositoryError>;

    /// Conditionally replaces the session record. Returns false when the
    /// record moved on since `expected_version` was read (lost race).
    async fn update_session(
        &self,
        session: &ChatSession,
        expected_version: u64,
    ) -> Result<bool, SessionRepositoryError>;

    fn subscribe_session(&self, session_id: &str) -> SessionWatch;
}

pub struct StoreSessionRepository {
    store: Arc<dyn DocumentStore>,
}

impl StoreSessionRepository {
    pub fn new(store: Arc<dyn DocumentStore>) -> Self {
        Self { store }
    }
}

#[async_trait]
impl SessionRepository for StoreSessionRepository {
    async fn create_session(&self, session: &ChatSession) -> Result<(), SessionRepositoryError> {
        let body = serde_json::to_value(session)
            .map_err(|e| SessionRepositoryError::Serialization(e.to_string()))?;

        self.store
            .update(
                SESSIONS_COLLECTION,
                &session.session_id,
                body,
                Precondition::MustNotExist,
            )
            .await
            .map_err(|e| match e {
                StoreError::AlreadyExists => SessionRepositoryError::AlreadyExists,
                other => SessionRepositoryError::Store(other.to_string()),
            })?;

        Ok(())
    }

    async fn get_session(
        &self,
        session_id: &str,
    ) -> Result<Option<(ChatSession, u64)>, SessionRepositoryError> {
        let document = self
            .store
            .get(SESSIONS_COLLECTION, session_id)
            .await
            .map_err(|e| SessionRepositoryError::Store(e.to_string()))?;

        let Some(document) = document else {
            return Ok(None);
        };

        let session = serde_json::from_value(document.body)
            .map_err(|e| SessionRepositoryError::Serialization(e.to_string()))?;

        Ok(Some((session, document.version)))
    }

    async fn update_session(
        &self,
        session: &ChatSession,
        expected_version: u64,
    ) -> Result<bool, SessionRepositoryError> {
        let body = serde_json::to_value(session)
            .map_err(|e| SessionRepositoryError::Serialization(e.to_string()))?;

        match self
            .store
            .update(
                SESSIONS_COLLECTION,
                &session.session_id,
                body,
                Precondition::Version(expected_version),
            )
            .await
        {
            Ok(_) => Ok(true),
            Err(StoreError::VersionConflict) => Ok(false),
            Err(StoreError::NotFound) => Err(SessionRepositoryError::NotFound),
            Err(e) => Err(SessionRepositoryError::Store(e.to_string())),
        }
    }

    fn subscribe_session(&self, session_id: &str) -> SessionWatch {
        SessionWatch {
            receiver: self.store.subscribe(SESSIONS_COLLECTION, session_id),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::chat_session::{PartnerKind, SessionStatus};
    use crate::store::memory_store::MemoryStore;

    fn repository() -> StoreSessionRepository {
        StoreSessionRepository::new(Arc::new(MemoryStore::new()))
    }

    #[tokio::test]
    async fn test_create_and_get_session() {
        let repository = repository();
        let session = ChatSession::new("player-a");

        repository.create_session(&session).await.unwrap();

        let (loaded, version) = repository
            .get_session(&session.session_id)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(loaded.session_id, session.session_id);
        assert_eq!(loaded.status, SessionStatus::Waiting);
        assert_eq!(version, 1);
    }

    #[tokio::test]
    async fn test_create_rejects_duplicate_session() {
        let repository = repository();
        let session = ChatSession::new("player-a");

        repository.create_session(&session).await.unwrap();
        let result = repository.create_session(&session).await;

        assert!(matches!(result, Err(SessionRepositoryError::AlreadyExists)));
    }

    #[tokio::test]
    async fn test_get_missing_session() {
        let repository = repository();

        let result = repository.get_session("missing").await.unwrap();

        assert!(result.is_none());
    }

    #[tokio::test]
    async fn test_update_session_detects_lost_race() {
        let repository = repository();
        let session = ChatSession::new("player-a");
        repository.create_session(&session).await.unwrap();

        let (mut first, version) = repository
            .get_session(&session.session_id)
            .await
            .unwrap()
            .unwrap();
        let mut second = first.clone();

        first.activate_with("player-b", PartnerKind::Human);
        assert!(repository.update_session(&first, version).await.unwrap());

        // The second writer still holds the stale version.
        second.activate_with("player-c", PartnerKind::Human);
        assert!(!repository.update_session(&second, version).await.unwrap());

        let (loaded, _) = repository
            .get_session(&session.session_id)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(loaded.participant_b.as_deref(), Some("player-b"));
    }

    #[tokio::test]
    async fn test_subscription_delivers_updates() {
        let repository = repository();
        let session = ChatSession::new("player-a");

        let mut watch = repository.subscribe_session(&session.session_id);
        assert!(watch.latest().is_none());

        repository.create_session(&session).await.unwrap();

        assert!(watch.changed().await);
        let latest = watch.latest().unwrap();
        assert_eq!(latest.session_id, session.session_id);
    }
}
