use crate::repositories::errors::session_repository_errors::SessionRepositoryError;

#[derive(Debug)]
pub enum ChatServiceError {
    SessionNotFound,
    /// Contract violation: a send or end targeted a session that is not in
    /// the phase the operation requires. Shared state is never mutated.
    SessionNotActive,
    /// A guess arrived while the session was still waiting or active.
    GuessNotOpen,
    GuessAlreadyRecorded,
    NotAParticipant,
    Responder(String),
    Repository(SessionRepositoryError),
}

impl std::fmt::Display for ChatServiceError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ChatServiceError::SessionNotFound => write!(f, "Session not found"),
            ChatServiceError::SessionNotActive => write!(f, "Session is not active"),
            ChatServiceError::GuessNotOpen => {
                write!(f, "Session is not accepting guesses yet")
            }
            ChatServiceError::GuessAlreadyRecorded => {
                write!(f, "A guess was already recorded for this participant")
            }
            ChatServiceError::NotAParticipant => {
                write!(f, "Identity is not a participant of this session")
            }
            ChatServiceError::Responder(msg) => write!(f, "Responder error: {}", msg),
            ChatServiceError::Repository(err) => write!(f, "Repository error: {}", err),
        }
    }
}

impl std::error::Error for ChatServiceError {}

impl From<SessionRepositoryError> for ChatServiceError {
    fn from(err: SessionRepositoryError) -> Self {
        ChatServiceError::Repository(err)
    }
}
