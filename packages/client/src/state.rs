use shared::models::chat_session::SessionStatus;
use shared::services::chat_service::GuessResult;

/// The visible game phase on one client. Driven by local timer events and
/// remote session notifications; remote input may only move the phase
/// forward, so duplicate or out-of-order notifications are absorbed.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ClientPhase {
    Idle,
    Searching,
    Playing,
    Guessing,
    Finished(GuessResult),
}

impl ClientPhase {
    fn rank(&self) -> u8 {
        match self {
            ClientPhase::Idle => 0,
            ClientPhase::Searching => 1,
            ClientPhase::Playing => 2,
            ClientPhase::Guessing => 3,
            ClientPhase::Finished(_) => 4,
        }
    }

    /// True when moving to `next` is a forward transition. Local resets
    /// (play again, main menu) bypass this guard on purpose.
    pub fn advances_to(&self, next: &ClientPhase) -> bool {
        next.rank() > self.rank()
    }

    /// The local phase a remote session status argues for. A remote
    /// `Finished` means the counterpart already guessed; this client still
    /// owes its own guess, so it maps to `Guessing`.
    pub fn for_remote_status(status: SessionStatus) -> ClientPhase {
        match status {
            SessionStatus::Waiting => ClientPhase::Searching,
            SessionStatus::Active => ClientPhase::Playing,
            SessionStatus::Guessing | SessionStatus::Finished => ClientPhase::Guessing,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use shared::models::chat_session::PartnerKind;

    #[test]
    fn test_forward_transitions_advance() {
        assert!(ClientPhase::Idle.advances_to(&ClientPhase::Searching));
        assert!(ClientPhase::Searching.advances_to(&ClientPhase::Playing));
        assert!(ClientPhase::Playing.advances_to(&ClientPhase::Guessing));
        assert!(ClientPhase::Guessing.advances_to(&ClientPhase::Finished(GuessResult {
            correct: true,
            actual: PartnerKind::Human,
        })));
    }

    #[test]
    fn test_duplicate_status_does_not_advance() {
        assert!(!ClientPhase::Searching.advances_to(&ClientPhase::Searching));
        assert!(!ClientPhase::Playing.advances_to(&ClientPhase::Playing));
    }

    #[test]
    fn test_stale_status_never_regresses() {
        assert!(!ClientPhase::Playing.advances_to(&ClientPhase::Searching));
        assert!(!ClientPhase::Guessing.advances_to(&ClientPhase::Playing));
        let finished = ClientPhase::Finished(GuessResult {
            correct: false,
            actual: PartnerKind::Synthetic,
        });
        assert!(!finished.advances_to(&ClientPhase::Guessing));
    }

    #[test]
    fn test_remote_status_mapping() {
        assert_eq!(
            ClientPhase::for_remote_status(SessionStatus::Waiting),
            ClientPhase::Searching
        );
        assert_eq!(
            ClientPhase::for_remote_status(SessionStatus::Active),
            ClientPhase::Playing
        );
        assert_eq!(
            ClientPhase::for_remote_status(SessionStatus::Guessing),
            ClientPhase::Guessing
        );
        assert_eq!(
            ClientPhase::for_remote_status(SessionStatus::Finished),
            ClientPhase::Guessing
        );
    }
}
