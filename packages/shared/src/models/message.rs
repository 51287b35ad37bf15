use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Sender marker for messages produced by the synthetic partner responder.
pub const SYNTHETIC_SENDER: &str = "synthetic-partner";

/// Sender marker for messages injected by the core itself.
pub const SYSTEM_SENDER: &str = "system";

/// Notice appended to the log when a session becomes active.
pub const CONNECTED_NOTICE: &str = "You are now connected to a stranger. Say hi!";

/// How a message sender reads from a given viewer's perspective.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum MessageRole {
    Own,
    Partner,
    System,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Message {
    pub message_id: String,
    pub text: String,
    pub sender: String,
    pub sent_at: DateTime<Utc>,
}

impl Message {
    pub fn new(sender: &str, text: &str) -> Self {
        Message {
            message_id: Uuid::new_v4().to_string(),
            text: text.to_string(),
            sender: sender.to_string(),
            sent_at: Utc::now(),
        }
    }

    /// Resolves the sender to a role from `viewer`'s perspective. The
    /// viewer's own identity always maps to `Own`; the counterpart identity
    /// or the synthetic marker always maps to `Partner`, regardless of which
    /// literal identity created the session.
    pub fn role_for(&self, viewer: &str) -> MessageRole {
        if self.sender == SYSTEM_SENDER {
            MessageRole::System
        } else if self.sender == viewer {
            MessageRole::Own
        } else {
            MessageRole::Partner
        }
    }
}

/// One line of the normalized transcript handed to the reply generator.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TranscriptLine {
    pub role: MessageRole,
    pub text: String,
}

impl std::fmt::Display for TranscriptLine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let role = match self.role {
            MessageRole::Own => "self",
            MessageRole::Partner => "partner",
            MessageRole::System => "system",
        };
        write!(f, "{}: {}", role, self.text)
    }
}
