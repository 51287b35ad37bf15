#[derive(Debug)]
pub enum WaitingPoolRepositoryError {
    AlreadyWaiting,
    Serialization(String),
    Store(String),
}

impl std::fmt::Display for WaitingPoolRepositoryError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            WaitingPoolRepositoryError::AlreadyWaiting => {
                write!(f, "Identity already has a waiting-pool entry")
            }
            WaitingPoolRepositoryError::Serialization(msg) => {
                write!(f, "Serialization error: {}", msg)
            }
            WaitingPoolRepositoryError::Store(msg) => write!(f, "Store error: {}", msg),
        }
    }
}

impl std::error::Error for WaitingPoolRepositoryError {}
