use shared::services::errors::chat_service_errors::ChatServiceError;
use shared::services::errors::matchmaking_service_errors::MatchmakingServiceError;

#[derive(Debug)]
pub enum ClientError {
    /// A new search can only start from the idle or finished phase.
    NotIdle,
    NotPlaying,
    NotGuessing,
    NoActiveSession,
    Matchmaking(MatchmakingServiceError),
    Chat(ChatServiceError),
}

impl std::fmt::Display for ClientError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ClientError::NotIdle => write!(f, "Client is already in a session"),
            ClientError::NotPlaying => write!(f, "Client is not in the playing phase"),
            ClientError::NotGuessing => write!(f, "Client is not in the guessing phase"),
            ClientError::NoActiveSession => write!(f, "Client has no session"),
            ClientError::Matchmaking(err) => write!(f, "Matchmaking error: {}", err),
            ClientError::Chat(err) => write!(f, "Chat error: {}", err),
        }
    }
}

impl std::error::Error for ClientError {}

impl From<MatchmakingServiceError> for ClientError {
    fn from(err: MatchmakingServiceError) -> Self {
        ClientError::Matchmaking(err)
    }
}

impl From<ChatServiceError> for ClientError {
    fn from(err: ChatServiceError) -> Self {
        ClientError::Chat(err)
    }
}
