use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::models::message::{
    Message, MessageRole, TranscriptLine, CONNECTED_NOTICE, SYSTEM_SENDER,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SessionStatus {
    Waiting,
    Active,
    Guessing,
    Finished,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PartnerKind {
    Human,
    Synthetic,
}

/// The authoritative shared state for one paired conversation. Created by the
/// first participant in `Waiting`, activated by the matchmaker, and retained
/// (never deleted) once it reaches `Finished`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatSession {
    pub session_id: String,
    pub participant_a: String,
    pub participant_b: Option<String>,
    pub started_at: DateTime<Utc>,
    pub ended_at: Option<DateTime<Utc>>,
    pub status: SessionStatus,
    pub partner_kind: PartnerKind,
    pub log: Vec<Message>,
    pub guess_a: Option<PartnerKind>,
    pub guess_b: Option<PartnerKind>,
}

impl ChatSession {
    pub fn new(participant_a: &str) -> Self {
        ChatSession {
            session_id: Uuid::new_v4().to_string(),
            participant_a: participant_a.to_string(),
            participant_b: None,
            started_at: Utc::now(),
            ended_at: None,
            status: SessionStatus::Waiting,
            // Tentative until the waiting -> active transition fixes it.
            partner_kind: PartnerKind::Human,
            log: Vec::new(),
            guess_a: None,
            guess_b: None,
        }
    }

    pub fn is_participant(&self, identity: &str) -> bool {
        self.participant_a == identity || self.participant_b.as_deref() == Some(identity)
    }

    pub fn partner_of(&self, viewer: &str) -> Option<&str> {
        if self.participant_a == viewer {
            self.participant_b.as_deref()
        } else if self.participant_b.as_deref() == Some(viewer) {
            Some(self.participant_a.as_str())
        } else {
            None
        }
    }

    /// Fills in the second participant and moves the session to `Active`,
    /// fixing the partner kind for the rest of the session's life. A system
    /// notice is appended so both sides see the moment the pairing happened.
    pub fn activate_with(&mut self, partner: &str, kind: PartnerKind) {
        self.participant_b = Some(partner.to_string());
        self.partner_kind = kind;
        self.status = SessionStatus::Active;
        self.append_message(Message::new(SYSTEM_SENDER, CONNECTED_NOTICE));
    }

    /// Appends to the log, clamping the timestamp so it never precedes the
    /// previous entry. The log is append-only; nothing is ever edited or
    /// reordered after commit.
    pub fn append_message(&mut self, mut message: Message) {
        if let Some(last) = self.log.last() {
            if message.sent_at < last.sent_at {
                message.sent_at = last.sent_at;
            }
        }
        self.log.push(message);
    }

    pub fn last_message_at(&self) -> Option<DateTime<Utc>> {
        self.log.last().map(|message| message.sent_at)
    }

    pub fn guess_of(&self, identity: &str) -> Option<PartnerKind> {
        if self.participant_a == identity {
            self.guess_a
        } else if self.participant_b.as_deref() == Some(identity) {
            self.guess_b
        } else {
            None
        }
    }

    /// Records a guess for one participant. Returns false when the identity
    /// is not a participant of this session.
    pub fn record_guess(&mut self, identity: &str, guess: PartnerKind) -> bool {
        if self.participant_a == identity {
            self.guess_a = Some(guess);
            true
        } else if self.participant_b.as_deref() == Some(identity) {
            self.guess_b = Some(guess);
            true
        } else {
            false
        }
    }

    /// Renders the conversation as ordered `role: text` lines normalized to
    /// `viewer`'s perspective. System notices are not part of the transcript.
    pub fn transcript_for(&self, viewer: &str) -> Vec<TranscriptLine> {
        self.log
            .iter()
            .filter(|message| message.role_for(viewer) != MessageRole::System)
            .map(|message| TranscriptLine {
                role: message.role_for(viewer),
                text: message.text.clone(),
            })
            .collect()
    }
}
