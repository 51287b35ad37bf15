use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Status value stored on every pool entry; entries are removed the instant
/// they are matched, so no other status ever appears.
pub const WAITING_STATUS: &str = "waiting";

/// One user currently seeking a human partner. Keyed by identity in the
/// store, which guarantees at most one entry per identity at any time.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WaitingEntry {
    pub identity: String,
    pub session_id: String,
    pub status: String,
    pub joined_at: DateTime<Utc>,
}

impl WaitingEntry {
    pub fn new(identity: &str, session_id: &str) -> Self {
        WaitingEntry {
            identity: identity.to_string(),
            session_id: session_id.to_string(),
            status: WAITING_STATUS.to_string(),
            joined_at: Utc::now(),
        }
    }
}
