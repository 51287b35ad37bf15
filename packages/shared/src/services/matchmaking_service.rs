use std::sync::Arc;
use std::time::Duration;

use tokio::task::AbortHandle;
use tracing::{debug, info, warn};

use crate::models::chat_session::{ChatSession, PartnerKind, SessionStatus};
use crate::models::message::SYNTHETIC_SENDER;
use crate::models::waiting_pool::WaitingEntry;
use crate::repositories::session_repository::SessionRepository;
use crate::repositories::waiting_pool_repository::WaitingPoolRepository;
use crate::services::errors::matchmaking_service_errors::MatchmakingServiceError;

#[derive(Debug, Clone)]
pub struct MatchConfig {
    /// How long a waiting user is given to find a human partner before the
    /// session is completed with a synthetic one.
    pub fallback_wait: Duration,
}

impl Default for MatchConfig {
    fn default() -> Self {
        MatchConfig {
            fallback_wait: Duration::from_secs(5),
        }
    }
}

/// Result of a match request. When the requester ended up waiting, the
/// ticket carries the handle of the armed fallback timer so the client can
/// cancel it the moment a human partner activates the session; a firing
/// that loses that race is a guarded no-op regardless.
#[derive(Debug)]
pub struct MatchTicket {
    pub session_id: String,
    fallback: Option<AbortHandle>,
}

impl MatchTicket {
    pub fn paired(session_id: String) -> Self {
        MatchTicket {
            session_id,
            fallback: None,
        }
    }

    pub fn waiting(session_id: String, fallback: AbortHandle) -> Self {
        MatchTicket {
            session_id,
            fallback: Some(fallback),
        }
    }

    pub fn has_fallback(&self) -> bool {
        self.fallback.is_some()
    }

    pub fn cancel_fallback(&self) {
        if let Some(handle) = &self.fallback {
            handle.abort();
        }
    }
}

#[derive(Clone)]
pub struct MatchmakingService {
    sessions: Arc<dyn SessionRepository>,
    pool: Arc<dyn WaitingPoolRepository>,
    config: MatchConfig,
}

impl MatchmakingService {
    pub fn new(
        sessions: Arc<dyn SessionRepository>,
        pool: Arc<dyn WaitingPoolRepository>,
        config: MatchConfig,
    ) -> Self {
        MatchmakingService {
            sessions,
            pool,
            config,
        }
    }

    /// Either joins the requester to a waiting user or creates a fresh
    /// waiting session with the fallback timer armed. Lost pairing races are
    /// not errors; the next candidate is tried and the call falls through to
    /// waiting when every candidate is gone.
    pub async fn request_match(
        &self,
        identity: &str,
    ) -> Result<MatchTicket, MatchmakingServiceError> {
        let candidates = self.pool.find_waiting(identity).await?;

        for candidate in candidates {
            let Some((session, version)) =
                self.sessions.get_session(&candidate.session_id).await?
            else {
                debug!(
                    "Waiting entry for {} points at a missing session, skipping",
                    candidate.identity
                );
                continue;
            };

            if session.status != SessionStatus::Waiting {
                continue;
            }

            let mut activated = session;
            activated.activate_with(identity, PartnerKind::Human);

            if self
                .pool
                .claim_and_activate(&candidate.identity, &activated, version)
                .await?
            {
                info!(
                    "Paired {} with waiting user {} in session {}",
                    identity, candidate.identity, activated.session_id
                );
                return Ok(MatchTicket::paired(activated.session_id));
            }
            // Another requester or the fallback timer claimed this candidate
            // first; try the next one.
        }

        self.enter_waiting_pool(identity).await
    }

    async fn enter_waiting_pool(
        &self,
        identity: &str,
    ) -> Result<MatchTicket, MatchmakingServiceError> {
        let session = ChatSession::new(identity);
        self.sessions.create_session(&session).await?;
        self.pool
            .join_pool(&WaitingEntry::new(identity, &session.session_id))
            .await?;

        info!(
            "{} is waiting in session {}; fallback in {:?}",
            identity, session.session_id, self.config.fallback_wait
        );

        let service = self.clone();
        let session_id = session.session_id.clone();
        let owner = identity.to_string();
        let wait = self.config.fallback_wait;
        let fallback = tokio::spawn(async move {
            tokio::time::sleep(wait).await;
            if let Err(e) = service.resolve_fallback(&session_id, &owner).await {
                warn!("Fallback for session {} failed: {}", session_id, e);
            }
        })
        .abort_handle();

        Ok(MatchTicket::waiting(session.session_id, fallback))
    }

    /// Fires when the fallback wait elapses. Completes the session with a
    /// synthetic partner only if it is still waiting; any other status means
    /// a human match arrived first and the firing is a no-op.
    pub async fn resolve_fallback(
        &self,
        session_id: &str,
        identity: &str,
    ) -> Result<(), MatchmakingServiceError> {
        let Some((session, version)) = self.sessions.get_session(session_id).await? else {
            warn!("Fallback fired for unknown session {}", session_id);
            return Ok(());
        };

        if session.status != SessionStatus::Waiting {
            debug!(
                "Session {} is already {:?}; fallback is a no-op",
                session_id, session.status
            );
            return Ok(());
        }

        let mut activated = session;
        activated.activate_with(SYNTHETIC_SENDER, PartnerKind::Synthetic);

        if self
            .pool
            .claim_and_activate(identity, &activated, version)
            .await?
        {
            info!(
                "No human partner arrived for {}; session {} completed with a synthetic partner",
                identity, session_id
            );
        } else {
            debug!(
                "Fallback for session {} lost the race to a human match",
                session_id
            );
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::repositories::errors::waiting_pool_repository_errors::WaitingPoolRepositoryError;
    use crate::repositories::session_repository::StoreSessionRepository;
    use crate::repositories::waiting_pool_repository::StoreWaitingPoolRepository;
    use crate::store::memory_store::MemoryStore;
    use async_trait::async_trait;

    fn service_with_store() -> (MatchmakingService, Arc<dyn SessionRepository>) {
        let store = Arc::new(MemoryStore::new());
        let sessions: Arc<dyn SessionRepository> =
            Arc::new(StoreSessionRepository::new(store.clone()));
        let pool = Arc::new(StoreWaitingPoolRepository::new(store));
        (
            MatchmakingService::new(sessions.clone(), pool, MatchConfig::default()),
            sessions,
        )
    }

    #[tokio::test]
    async fn test_first_requester_enters_waiting_pool() {
        let (service, sessions) = service_with_store();

        let ticket = service.request_match("player-1").await.unwrap();

        assert!(ticket.has_fallback());
        let (session, _) = sessions.get_session(&ticket.session_id).await.unwrap().unwrap();
        assert_eq!(session.status, SessionStatus::Waiting);
        assert_eq!(session.participant_a, "player-1");
        assert!(session.participant_b.is_none());
        ticket.cancel_fallback();
    }

    #[tokio::test]
    async fn test_second_requester_pairs_with_first() {
        let (service, sessions) = service_with_store();

        let first = service.request_match("player-1").await.unwrap();
        let second = service.request_match("player-2").await.unwrap();

        assert_eq!(first.session_id, second.session_id);
        assert!(!second.has_fallback());

        let (session, _) = sessions.get_session(&second.session_id).await.unwrap().unwrap();
        assert_eq!(session.status, SessionStatus::Active);
        assert_eq!(session.partner_kind, PartnerKind::Human);
        assert_eq!(session.participant_b.as_deref(), Some("player-2"));
        first.cancel_fallback();
    }

    #[tokio::test]
    async fn test_requester_never_matches_own_entry() {
        let (service, sessions) = service_with_store();

        let first = service.request_match("player-1").await.unwrap();
        let second = service.request_match("player-1").await;

        // The only waiting entry belongs to the requester, so the second
        // call falls through to creating another entry and is rejected by
        // the one-entry-per-identity invariant.
        assert!(matches!(
            second,
            Err(MatchmakingServiceError::PoolRepository(
                WaitingPoolRepositoryError::AlreadyWaiting
            ))
        ));

        let (session, _) = sessions.get_session(&first.session_id).await.unwrap().unwrap();
        assert_eq!(session.status, SessionStatus::Waiting);
        first.cancel_fallback();
    }

    #[tokio::test]
    async fn test_fallback_completes_waiting_session_with_synthetic_partner() {
        let (service, sessions) = service_with_store();

        let ticket = service.request_match("player-1").await.unwrap();
        ticket.cancel_fallback();

        service
            .resolve_fallback(&ticket.session_id, "player-1")
            .await
            .unwrap();

        let (session, _) = sessions.get_session(&ticket.session_id).await.unwrap().unwrap();
        assert_eq!(session.status, SessionStatus::Active);
        assert_eq!(session.partner_kind, PartnerKind::Synthetic);
        assert_eq!(session.participant_b.as_deref(), Some(SYNTHETIC_SENDER));
    }

    #[tokio::test]
    async fn test_fallback_is_noop_after_human_match() {
        let (service, sessions) = service_with_store();

        let first = service.request_match("player-1").await.unwrap();
        first.cancel_fallback();
        let _second = service.request_match("player-2").await.unwrap();

        // Simulate the timer firing late.
        service
            .resolve_fallback(&first.session_id, "player-1")
            .await
            .unwrap();

        let (session, _) = sessions.get_session(&first.session_id).await.unwrap().unwrap();
        assert_eq!(session.partner_kind, PartnerKind::Human);
        assert_eq!(session.participant_b.as_deref(), Some("player-2"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_fallback_timer_fires_after_wait() {
        let store = Arc::new(MemoryStore::new());
        let sessions: Arc<dyn SessionRepository> =
            Arc::new(StoreSessionRepository::new(store.clone()));
        let pool = Arc::new(StoreWaitingPoolRepository::new(store));
        let config = MatchConfig {
            fallback_wait: Duration::from_secs(5),
        };
        let service = MatchmakingService::new(sessions.clone(), pool, config);

        let ticket = service.request_match("player-1").await.unwrap();

        tokio::time::sleep(Duration::from_secs(6)).await;

        let (session, _) = sessions.get_session(&ticket.session_id).await.unwrap().unwrap();
        assert_eq!(session.status, SessionStatus::Active);
        assert_eq!(session.partner_kind, PartnerKind::Synthetic);
    }

    #[tokio::test(start_paused = true)]
    async fn test_canceled_fallback_never_fires() {
        let store = Arc::new(MemoryStore::new());
        let sessions: Arc<dyn SessionRepository> =
            Arc::new(StoreSessionRepository::new(store.clone()));
        let pool = Arc::new(StoreWaitingPoolRepository::new(store));
        let config = MatchConfig {
            fallback_wait: Duration::from_secs(5),
        };
        let service = MatchmakingService::new(sessions.clone(), pool, config);

        let ticket = service.request_match("player-1").await.unwrap();
        ticket.cancel_fallback();

        tokio::time::sleep(Duration::from_secs(10)).await;

        let (session, _) = sessions.get_session(&ticket.session_id).await.unwrap().unwrap();
        assert_eq!(session.status, SessionStatus::Waiting);
    }

    // Pool repository that always loses the pairing race, mirroring two
    // requesters grabbing the same waiting entry at once.
    struct LosingPoolRepository {
        inner: StoreWaitingPoolRepository,
    }

    #[async_trait]
    impl WaitingPoolRepository for LosingPoolRepository {
        async fn find_waiting(
            &self,
            excluded_identity: &str,
        ) -> Result<Vec<WaitingEntry>, WaitingPoolRepositoryError> {
            self.inner.find_waiting(excluded_identity).await
        }

        async fn join_pool(
            &self,
            entry: &WaitingEntry,
        ) -> Result<(), WaitingPoolRepositoryError> {
            self.inner.join_pool(entry).await
        }

        async fn claim_and_activate(
            &self,
            _pool_identity: &str,
            _activated: &ChatSession,
            _expected_version: u64,
        ) -> Result<bool, WaitingPoolRepositoryError> {
            Ok(false)
        }
    }

    #[tokio::test]
    async fn test_lost_race_falls_through_to_waiting() {
        let store = Arc::new(MemoryStore::new());
        let sessions: Arc<dyn SessionRepository> =
            Arc::new(StoreSessionRepository::new(store.clone()));
        let real_pool = StoreWaitingPoolRepository::new(store.clone());
        let losing_pool = Arc::new(LosingPoolRepository { inner: real_pool });
        let service =
            MatchmakingService::new(sessions.clone(), losing_pool, MatchConfig::default());

        // Seed a waiting candidate through a normal service.
        let seeder = MatchmakingService::new(
            sessions.clone(),
            Arc::new(StoreWaitingPoolRepository::new(store)),
            MatchConfig::default(),
        );
        let candidate = seeder.request_match("player-1").await.unwrap();
        candidate.cancel_fallback();

        // Every claim fails, so the requester must end up waiting itself
        // instead of erroring out.
        let ticket = service.request_match("player-2").await.unwrap();

        assert_ne!(ticket.session_id, candidate.session_id);
        assert!(ticket.has_fallback());
        let (session, _) = sessions.get_session(&ticket.session_id).await.unwrap().unwrap();
        assert_eq!(session.status, SessionStatus::Waiting);
        assert_eq!(session.participant_a, "player-2");
        ticket.cancel_fallback();
    }
}
