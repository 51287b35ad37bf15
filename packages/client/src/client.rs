use std::sync::{Arc, Mutex};

use tokio::sync::watch;
use tokio::task::AbortHandle;
use tracing::{info, warn};

use shared::models::chat_session::{ChatSession, PartnerKind};
use shared::models::message::Message;
use shared::repositories::session_repository::SessionRepository;
use shared::services::chat_service::{ChatService, GuessResult, SendOutcome};
use shared::services::matchmaking_service::{MatchTicket, MatchmakingService};

use crate::config::ClientConfig;
use crate::errors::ClientError;
use crate::round_timer::RoundTimer;
use crate::state::ClientPhase;

#[derive(Default)]
struct ClientInner {
    session_id: Option<String>,
    ticket: Option<MatchTicket>,
    watcher: Option<AbortHandle>,
    round_timer: Option<RoundTimer>,
    expiry_watch: Option<AbortHandle>,
    last_session: Option<ChatSession>,
}

/// Per-client session controller. Single-owner of the local phase, driven by
/// two input sources only: remote change notifications on the session record
/// and local timer events. All coordination with the counterpart goes
/// through the shared store; the two clients never share memory.
pub struct ChatClient {
    identity: String,
    matchmaking: MatchmakingService,
    chat: ChatService,
    sessions: Arc<dyn SessionRepository>,
    config: ClientConfig,
    phase: watch::Sender<ClientPhase>,
    inner: Mutex<ClientInner>,
}

impl ChatClient {
    pub fn new(
        identity: String,
        matchmaking: MatchmakingService,
        chat: ChatService,
        sessions: Arc<dyn SessionRepository>,
        config: ClientConfig,
    ) -> Arc<Self> {
        Arc::new(ChatClient {
            identity,
            matchmaking,
            chat,
            sessions,
            config,
            phase: watch::channel(ClientPhase::Idle).0,
            inner: Mutex::new(ClientInner::default()),
        })
    }

    pub fn identity(&self) -> &str {
        &self.identity
    }

    pub fn phase(&self) -> ClientPhase {
        *self.phase.borrow()
    }

    /// Live view of the phase, for UIs and tests that wait on transitions.
    pub fn phases(&self) -> watch::Receiver<ClientPhase> {
        self.phase.subscribe()
    }

    pub fn session_id(&self) -> Option<String> {
        self.inner.lock().expect("client lock poisoned").session_id.clone()
    }

    /// The conversation as of the last store notification.
    pub fn visible_log(&self) -> Vec<Message> {
        self.inner
            .lock()
            .expect("client lock poisoned")
            .last_session
            .as_ref()
            .map(|session| session.log.clone())
            .unwrap_or_default()
    }

    /// Ticks left in the round while playing.
    pub fn remaining_ticks(&self) -> Option<u32> {
        self.inner
            .lock()
            .expect("client lock poisoned")
            .round_timer
            .as_ref()
            .map(|timer| timer.remaining())
    }

    /// Starts a search for a partner: requests a match and subscribes to the
    /// resulting session record. Allowed from idle or from a finished game
    /// (play again).
    pub async fn find_partner(self: &Arc<Self>) -> Result<(), ClientError> {
        match self.phase() {
            ClientPhase::Idle | ClientPhase::Finished(_) => {}
            _ => return Err(ClientError::NotIdle),
        }

        self.reset_local();
        self.phase.send_replace(ClientPhase::Searching);

        let pacing = self.config.sample_search_delay();
        if !pacing.is_zero() {
            tokio::time::sleep(pacing).await;
        }

        let ticket = self.matchmaking.request_match(&self.identity).await?;
        let session_id = ticket.session_id.clone();
        let mut session_watch = self.sessions.subscribe_session(&session_id);

        {
            let mut inner = self.inner.lock().expect("client lock poisoned");
            inner.session_id = Some(session_id.clone());
            inner.ticket = Some(ticket);
        }

        // The pairing write may have landed before the subscription; pull
        // the current state once so an already-active session is not missed.
        if let Some(session) = session_watch.latest() {
            self.apply_remote(session).await;
        }

        let weak = Arc::downgrade(self);
        let watcher = tokio::spawn(async move {
            loop {
                if !session_watch.changed().await {
                    break;
                }
                let Some(session) = session_watch.latest() else {
                    continue;
                };
                let Some(client) = weak.upgrade() else {
                    break;
                };
                client.apply_remote(session).await;
            }
        })
        .abort_handle();

        let mut inner = self.inner.lock().expect("client lock poisoned");
        inner.watcher = Some(watcher);

        Ok(())
    }

    /// Feeds one remote session snapshot into the state machine. Duplicate
    /// and stale notifications are absorbed: the phase only ever moves
    /// forward on remote input.
    pub async fn apply_remote(self: &Arc<Self>, session: ChatSession) {
        {
            let mut inner = self.inner.lock().expect("client lock poisoned");
            if inner.session_id.as_deref() != Some(session.session_id.as_str()) {
                return;
            }
            inner.last_session = Some(session.clone());
        }

        let target = ClientPhase::for_remote_status(session.status);
        if !self.phase().advances_to(&target) {
            return;
        }

        match target {
            ClientPhase::Playing => {
                {
                    let inner = self.inner.lock().expect("client lock poisoned");
                    if let Some(ticket) = &inner.ticket {
                        ticket.cancel_fallback();
                    }
                }
                self.phase.send_replace(ClientPhase::Playing);
                self.start_round_timer();
                info!(
                    "{} connected to a {:?} partner in session {}",
                    self.identity, session.partner_kind, session.session_id
                );
            }
            ClientPhase::Guessing => {
                self.enter_guessing();
            }
            _ => {}
        }
    }

    fn start_round_timer(self: &Arc<Self>) {
        let timer = RoundTimer::start(
            self.config.round_ticks,
            self.config.tick_interval,
            self.phase.subscribe(),
        );
        let mut remaining = timer.subscribe();

        let weak = Arc::downgrade(self);
        let expiry = tokio::spawn(async move {
            while remaining.changed().await.is_ok() {
                let left = *remaining.borrow();
                if left == 0 {
                    if let Some(client) = weak.upgrade() {
                        client.on_round_expired().await;
                    }
                    break;
                }
            }
        })
        .abort_handle();

        let mut inner = self.inner.lock().expect("client lock poisoned");
        inner.round_timer = Some(timer);
        inner.expiry_watch = Some(expiry);
    }

    async fn on_round_expired(&self) {
        if self.phase() != ClientPhase::Playing {
            return;
        }
        info!("{}: round time is up, guess time", self.identity);
        self.enter_guessing();
        if let Some(session_id) = self.session_id() {
            // Both clients race to make this transition; the second arrival
            // is an idempotent no-op.
            if let Err(e) = self.chat.end_chat(&session_id).await {
                warn!("Failed to end session {}: {}", session_id, e);
            }
        }
    }

    /// Cancels the round timer and moves the local phase to guessing.
    fn enter_guessing(&self) {
        {
            let mut inner = self.inner.lock().expect("client lock poisoned");
            if let Some(timer) = inner.round_timer.take() {
                timer.cancel();
            }
            if let Some(handle) = inner.expiry_watch.take() {
                handle.abort();
            }
        }
        self.phase.send_replace(ClientPhase::Guessing);
    }

    pub async fn send_message(&self, text: &str) -> Result<SendOutcome, ClientError> {
        if self.phase() != ClientPhase::Playing {
            return Err(ClientError::NotPlaying);
        }
        let session_id = self.session_id().ok_or(ClientError::NoActiveSession)?;
        Ok(self.chat.send_message(&session_id, &self.identity, text).await?)
    }

    /// Manual end of the chat phase.
    pub async fn end_chat(&self) -> Result<(), ClientError> {
        if self.phase() != ClientPhase::Playing {
            return Err(ClientError::NotPlaying);
        }
        let session_id = self.session_id().ok_or(ClientError::NoActiveSession)?;
        self.enter_guessing();
        self.chat.end_chat(&session_id).await?;
        Ok(())
    }

    pub async fn submit_guess(&self, guess: PartnerKind) -> Result<GuessResult, ClientError> {
        if self.phase() != ClientPhase::Guessing {
            return Err(ClientError::NotGuessing);
        }
        let session_id = self.session_id().ok_or(ClientError::NoActiveSession)?;
        let result = self.chat.submit_guess(&session_id, &self.identity, guess).await?;
        self.phase.send_replace(ClientPhase::Finished(result));
        Ok(result)
    }

    /// Play again: straight back into a fresh search.
    pub async fn play_again(self: &Arc<Self>) -> Result<(), ClientError> {
        self.find_partner().await
    }

    /// Back to the main menu. Local reset only: timers are canceled, the
    /// subscription is dropped, and the session record is left as it is.
    pub fn main_menu(&self) {
        self.reset_local();
        self.phase.send_replace(ClientPhase::Idle);
    }

    fn reset_local(&self) {
        let mut inner = self.inner.lock().expect("client lock poisoned");
        if let Some(handle) = inner.watcher.take() {
            handle.abort();
        }
        if let Some(timer) = inner.round_timer.take() {
            timer.cancel();
        }
        if let Some(handle) = inner.expiry_watch.take() {
            handle.abort();
        }
        if let Some(ticket) = inner.ticket.take() {
            ticket.cancel_fallback();
        }
        inner.session_id = None;
        inner.last_session = None;
    }
}

impl Drop for ChatClient {
    fn drop(&mut self) {
        self.reset_local();
    }
}
