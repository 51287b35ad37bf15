use crate::repositories::errors::session_repository_errors::SessionRepositoryError;
use crate::repositories::errors::waiting_pool_repository_errors::WaitingPoolRepositoryError;

#[derive(Debug)]
pub enum MatchmakingServiceError {
    SessionRepository(SessionRepositoryError),
    PoolRepository(WaitingPoolRepositoryError),
}

impl std::fmt::Display for MatchmakingServiceError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            MatchmakingServiceError::SessionRepository(err) => {
                write!(f, "Session repository error: {}", err)
            }
            MatchmakingServiceError::PoolRepository(err) => {
                write!(f, "Waiting-pool repository error: {}", err)
            }
        }
    }
}

impl std::error::Error for MatchmakingServiceError {}

impl From<SessionRepositoryError> for MatchmakingServiceError {
    fn from(err: SessionRepositoryError) -> Self {
        MatchmakingServiceError::SessionRepository(err)
    }
}

impl From<WaitingPoolRepositoryError> for MatchmakingServiceError {
    fn from(err: WaitingPoolRepositoryError) -> Self {
        MatchmakingServiceError::PoolRepository(err)
    }
}
