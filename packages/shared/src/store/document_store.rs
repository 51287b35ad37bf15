use async_trait::async_trait;
use serde_json::Value;
use tokio::sync::watch;

/// A single versioned document. The version is bumped on every committed
/// write and is the handle for optimistic conditional updates.
#[derive(Debug, Clone, PartialEq)]
pub struct Document {
    pub id: String,
    pub version: u64,
    pub body: Value,
}

/// Condition attached to a write. `Version` is the optimistic-update guard;
/// `MustNotExist` is the create guard.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Precondition {
    None,
    MustNotExist,
    Version(u64),
}

/// One operation inside an atomic batch.
#[derive(Debug, Clone)]
pub enum BatchOp {
    Update {
        collection: String,
        id: String,
        body: Value,
        precondition: Precondition,
    },
    Delete {
        collection: String,
        id: String,
        precondition: Precondition,
    },
}

#[derive(Debug, Clone, PartialEq)]
pub enum QueryFilter {
    All,
    FieldEquals(String, Value),
}

#[derive(Debug)]
pub enum StoreError {
    NotFound,
    AlreadyExists,
    VersionConflict,
    Serialization(String),
}

impl std::fmt::Display for StoreError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            StoreError::NotFound => write!(f, "Document not found"),
            StoreError::AlreadyExists => write!(f, "Document already exists"),
            StoreError::VersionConflict => write!(f, "Document version conflict"),
            StoreError::Serialization(msg) => write!(f, "Serialization error: {}", msg),
        }
    }
}

impl std::error::Error for StoreError {}

/// The shared mutable record both clients coordinate through: atomic
/// single-document read and conditional update, a collection query, an
/// all-or-nothing conditional batch (used only by the matchmaker paths), and
/// a push-based subscription delivering the latest document state on every
/// change. Unsubscribing is dropping the receiver.
#[async_trait]
pub trait DocumentStore: Send + Sync {
    async fn get(&self, collection: &str, id: &str) -> Result<Option<Document>, StoreError>;

    async fn update(
        &self,
        collection: &str,
        id: &str,
        body: Value,
        precondition: Precondition,
    ) -> Result<u64, StoreError>;

    async fn query(
        &self,
        collection: &str,
        filter: &QueryFilter,
    ) -> Result<Vec<Document>, StoreError>;

    async fn atomic_batch(&self, ops: Vec<BatchOp>) -> Result<(), StoreError>;

    fn subscribe(&self, collection: &str, id: &str) -> watch::Receiver<Option<Document>>;
}
