#[derive(Debug)]
pub enum SessionRepositoryError {
    NotFound,
    AlreadyExists,
    Serialization(String),
    Store(String),
}

impl std::fmt::Display for SessionRepositoryError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SessionRepositoryError::NotFound => write!(f, "Session not found"),
            SessionRepositoryError::AlreadyExists => write!(f, "Session already exists"),
            SessionRepositoryError::Serialization(msg) => {
                write!(f, "Serialization error: {}", msg)
            }
            SessionRepositoryError::Store(msg) => write!(f, "Store error: {}", msg),
        }
    }
}

impl std::error::Error for SessionRepositoryError {}
