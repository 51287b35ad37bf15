use std::collections::HashSet;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use chrono::Utc;
use tracing::{debug, info, warn};

use crate::collaborators::reply_generator::ReplyGenerator;
use crate::collaborators::text_filter::TextFilter;
use crate::models::chat_session::{ChatSession, PartnerKind, SessionStatus};
use crate::models::message::{Message, SYNTHETIC_SENDER};
use crate::repositories::session_repository::SessionRepository;
use crate::services::errors::chat_service_errors::ChatServiceError;

#[derive(Debug, Clone)]
pub struct ChatConfig {
    /// Window the synthetic reply is delayed by, emulating human typing
    /// latency. Jitter is sampled uniformly inside the window.
    pub reply_delay_min: Duration,
    pub reply_delay_max: Duration,
}

impl Default for ChatConfig {
    fn default() -> Self {
        ChatConfig {
            reply_delay_min: Duration::from_millis(1500),
            reply_delay_max: Duration::from_millis(2500),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SendOutcome {
    Sent,
    /// Empty input or a send already in flight for this sender; nothing was
    /// committed.
    Ignored,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GuessResult {
    pub correct: bool,
    pub actual: PartnerKind,
}

#[derive(Clone)]
pub struct ChatService {
    sessions: Arc<dyn SessionRepository>,
    filter: Arc<dyn TextFilter>,
    responder: Arc<dyn ReplyGenerator>,
    config: ChatConfig,
    /// Senders with an outstanding send; at most one outbound send may be in
    /// flight per sender at a time.
    in_flight: Arc<Mutex<HashSet<String>>>,
}

impl ChatService {
    pub fn new(
        sessions: Arc<dyn SessionRepository>,
        filter: Arc<dyn TextFilter>,
        responder: Arc<dyn ReplyGenerator>,
        config: ChatConfig,
    ) -> Self {
        ChatService {
            sessions,
            filter,
            responder,
            config,
            in_flight: Arc::new(Mutex::new(HashSet::new())),
        }
    }

    /// Filters and commits one message. Exactly one append happens per
    /// accepted call; whitespace-only input and overlapping sends are
    /// ignored without touching shared state. While the partner is
    /// synthetic, a delayed reply is scheduled after each accepted send.
    pub async fn send_message(
        &self,
        session_id: &str,
        sender: &str,
        raw_text: &str,
    ) -> Result<SendOutcome, ChatServiceError> {
        let text = raw_text.trim();
        if text.is_empty() {
            return Ok(SendOutcome::Ignored);
        }

        {
            let mut in_flight = self.in_flight.lock().expect("in-flight lock poisoned");
            if !in_flight.insert(sender.to_string()) {
                debug!("Send already in flight for {}, ignoring", sender);
                return Ok(SendOutcome::Ignored);
            }
        }

        let result = self.deliver(session_id, sender, text).await;

        {
            let mut in_flight = self.in_flight.lock().expect("in-flight lock poisoned");
            in_flight.remove(sender);
        }

        let session = result?;

        if session.partner_kind == PartnerKind::Synthetic {
            self.schedule_synthetic_reply(session_id);
        }

        Ok(SendOutcome::Sent)
    }

    async fn deliver(
        &self,
        session_id: &str,
        sender: &str,
        text: &str,
    ) -> Result<ChatSession, ChatServiceError> {
        let outcome = self.filter.filter_text(text).await;
        if outcome.flagged {
            info!("Profanity filtered out of a message in session {}", session_id);
        }

        self.append(session_id, Message::new(sender, &outcome.filtered_text))
            .await
    }

    /// Optimistic append: the update is always based on a freshly fetched
    /// copy of the log, and a lost race re-reads and retries so concurrent
    /// appends from the counterpart are never overwritten. The session must
    /// still be active at the moment the write lands.
    async fn append(
        &self,
        session_id: &str,
        message: Message,
    ) -> Result<ChatSession, ChatServiceError> {
        loop {
            let Some((mut session, version)) = self.sessions.get_session(session_id).await?
            else {
                return Err(ChatServiceError::SessionNotFound);
            };

            if session.status != SessionStatus::Active {
                return Err(ChatServiceError::SessionNotActive);
            }

            if message.sender != SYNTHETIC_SENDER && !session.is_participant(&message.sender) {
                return Err(ChatServiceError::NotAParticipant);
            }

            session.append_message(message.clone());

            if self.sessions.update_session(&session, version).await? {
                return Ok(session);
            }

            debug!("Concurrent append to session {}, retrying", session_id);
        }
    }

    fn schedule_synthetic_reply(&self, session_id: &str) {
        let service = self.clone();
        let session_id = session_id.to_string();
        let delay = self.sample_reply_delay();

        tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            match service.deliver_synthetic_reply(&session_id).await {
                Ok(()) => {}
                Err(ChatServiceError::SessionNotActive) => {
                    debug!(
                        "Session {} left the active phase; synthetic reply discarded",
                        session_id
                    );
                }
                Err(e) => {
                    warn!("Synthetic reply for session {} failed: {}", session_id, e);
                }
            }
        });
    }

    async fn deliver_synthetic_reply(&self, session_id: &str) -> Result<(), ChatServiceError> {
        let Some((session, _)) = self.sessions.get_session(session_id).await? else {
            return Err(ChatServiceError::SessionNotFound);
        };

        if session.status != SessionStatus::Active {
            return Err(ChatServiceError::SessionNotActive);
        }

        let transcript = session.transcript_for(SYNTHETIC_SENDER);
        let reply = self
            .responder
            .generate_reply(&transcript)
            .await
            .map_err(|e| ChatServiceError::Responder(e.to_string()))?;

        // The append re-checks the status, so a session that moved past
        // active while the responder ran still discards the reply.
        self.append(session_id, Message::new(SYNTHETIC_SENDER, &reply))
            .await?;

        Ok(())
    }

    fn sample_reply_delay(&self) -> Duration {
        use rand::Rng;
        let min = self.config.reply_delay_min.min(self.config.reply_delay_max);
        let span = (self.config.reply_delay_max.saturating_sub(min)).as_millis() as u64;
        let jitter = rand::thread_rng().gen_range(0..=span);
        min + Duration::from_millis(jitter)
    }

    /// Moves an active session to the guessing phase. Idempotent: both
    /// clients' round timers race to make this transition and the second
    /// arrival is a no-op.
    pub async fn end_chat(&self, session_id: &str) -> Result<(), ChatServiceError> {
        loop {
            let Some((mut session, version)) = self.sessions.get_session(session_id).await?
            else {
                return Err(ChatServiceError::SessionNotFound);
            };

            match session.status {
                SessionStatus::Guessing | SessionStatus::Finished => return Ok(()),
                SessionStatus::Waiting => return Err(ChatServiceError::SessionNotActive),
                SessionStatus::Active => {}
            }

            session.status = SessionStatus::Guessing;

            if self.sessions.update_session(&session, version).await? {
                info!("Session {} moved to guessing", session_id);
                return Ok(());
            }
        }
    }

    /// Records one participant's guess and compares it against the
    /// session's immutable partner kind. A second guess from the same
    /// participant is a contract violation and mutates nothing.
    pub async fn submit_guess(
        &self,
        session_id: &str,
        identity: &str,
        guess: PartnerKind,
    ) -> Result<GuessResult, ChatServiceError> {
        loop {
            let Some((mut session, version)) = self.sessions.get_session(session_id).await?
            else {
                return Err(ChatServiceError::SessionNotFound);
            };

            if !session.is_participant(identity) {
                return Err(ChatServiceError::NotAParticipant);
            }

            match session.status {
                SessionStatus::Waiting | SessionStatus::Active => {
                    return Err(ChatServiceError::GuessNotOpen);
                }
                SessionStatus::Guessing | SessionStatus::Finished => {}
            }

            if session.guess_of(identity).is_some() {
                return Err(ChatServiceError::GuessAlreadyRecorded);
            }

            session.record_guess(identity, guess);
            session.status = SessionStatus::Finished;
            if session.ended_at.is_none() {
                session.ended_at = Some(Utc::now());
            }

            let actual = session.partner_kind;

            if self.sessions.update_session(&session, version).await? {
                let result = GuessResult {
                    correct: guess == actual,
                    actual,
                };
                info!(
                    "Guess recorded for {} in session {}: correct={}",
                    identity, session_id, result.correct
                );
                return Ok(result);
            }
        }
    }
}
