use std::sync::Arc;

use async_trait::async_trait;
use serde_json::json;
use tracing::debug;

use crate::models::chat_session::ChatSession;
use crate::models::waiting_pool::{WaitingEntry, WAITING_STATUS};
use crate::repositories::errors::waiting_pool_repository_errors::WaitingPoolRepositoryError;
use crate::repositories::session_repository::SESSIONS_COLLECTION;
use crate::store::document_store::{
    BatchOp, DocumentStore, Precondition, QueryFilter, StoreError,
};

pub const WAITING_POOL_COLLECTION: &str = "waiting_pool";

#[async_trait]
pub trait WaitingPoolRepository: Send + Sync {
    /// All users currently seeking a human partner, excluding the requester,
    /// sorted oldest-waiting first.
    async fn find_waiting(
        &self,
        excluded_identity: &str,
    ) -> Result<Vec<WaitingEntry>, WaitingPoolRepositoryError>;

    async fn join_pool(&self, entry: &WaitingEntry) -> Result<(), WaitingPoolRepositoryError>;

    /// The atomic pairing step: removes `pool_identity`'s waiting entry and
    /// writes the activated session in one batch, conditioned on the session
    /// version the caller observed. Returns false when another matchmaking
    /// attempt (or the fallback timer) won the race; the shared state is
    /// untouched in that case.
    async fn claim_and_activate(
        &self,
        pool_identity: &str,
        activated: &ChatSession,
        expected_version: u64,
    ) -> Result<bool, WaitingPoolRepositoryError>;
}

pub struct StoreWaitingPoolRepository {
    store: Arc<dyn DocumentStore>,
}

impl StoreWaitingPoolRepository {
    pub fn new(store: Arc<dyn DocumentStore>) -> Self {
        Self { store }
    }
}

#[async_trait]
impl WaitingPoolRepository for StoreWaitingPoolRepository {
    async fn find_waiting(
        &self,
        excluded_identity: &str,
    ) -> Result<Vec<WaitingEntry>, WaitingPoolRepositoryError> {
        let filter = QueryFilter::FieldEquals("status".to_string(), json!(WAITING_STATUS));
        let documents = self
            .store
            .query(WAITING_POOL_COLLECTION, &filter)
            .await
            .map_err(|e| WaitingPoolRepositoryError::Store(e.to_string()))?;

        let mut entries = Vec::new();
        for document in documents {
            let entry: WaitingEntry = serde_json::from_value(document.body)
                .map_err(|e| WaitingPoolRepositoryError::Serialization(e.to_string()))?;

            if entry.identity != excluded_identity {
                entries.push(entry);
            }
        }

        // Longest waiting first, so nobody waits indefinitely.
        entries.sort_by_key(|entry| entry.joined_at);

        Ok(entries)
    }

    async fn join_pool(&self, entry: &WaitingEntry) -> Result<(), WaitingPoolRepositoryError> {
        let body = serde_json::to_value(entry)
            .map_err(|e| WaitingPoolRepositoryError::Serialization(e.to_string()))?;

        self.store
            .update(
                WAITING_POOL_COLLECTION,
                &entry.identity,
                body,
                Precondition::MustNotExist,
            )
            .await
            .map_err(|e| match e {
                StoreError::AlreadyExists => WaitingPoolRepositoryError::AlreadyWaiting,
                other => WaitingPoolRepositoryError::Store(other.to_string()),
            })?;

        Ok(())
    }

    async fn claim_and_activate(
        &self,
        pool_identity: &str,
        activated: &ChatSession,
        expected_version: u64,
    ) -> Result<bool, WaitingPoolRepositoryError> {
        let body = serde_json::to_value(activated)
            .map_err(|e| WaitingPoolRepositoryError::Serialization(e.to_string()))?;

        let ops = vec![
            BatchOp::Delete {
                collection: WAITING_POOL_COLLECTION.to_string(),
                id: pool_identity.to_string(),
                precondition: Precondition::None,
            },
            BatchOp::Update {
                collection: SESSIONS_COLLECTION.to_string(),
                id: activated.session_id.to_string(),
                body,
                precondition: Precondition::Version(expected_version),
            },
        ];

        match self.store.atomic_batch(ops).await {
            Ok(()) => Ok(true),
            Err(StoreError::VersionConflict) | Err(StoreError::NotFound) => {
                debug!(
                    "Lost the pairing race for session {}; leaving state untouched",
                    activated.session_id
                );
                Ok(false)
            }
            Err(e) => Err(WaitingPoolRepositoryError::Store(e.to_string())),
        }
    }
}
