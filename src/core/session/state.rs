use serde::{Deserialize, Serialize};
use std::fmt;

/// Lifecycle of a server-side session.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum SessionState {
    /// Connection accepted, transport not yet built
    Accepted,
    /// Waiting for the first line, which names the user
    AwaitingUsername,
    /// Registered and relaying
    Active,
    /// Torn down
    Closed,
}

/// Why a session reached `Closed`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CloseReason {
    /// Peer sent the quit keyword
    Quit,
    /// Peer closed the connection
    EndOfStream,
    /// Read or write failure
    TransportError(String),
}

impl SessionState {
    /// Whether moving to `next` is a legal transition.
    pub fn can_transition_to(self, next: SessionState) -> bool {
        use SessionState::*;
        matches!(
            (self, next),
            (Accepted, AwaitingUsername)
                | (AwaitingUsername, Active)
                | (Active, Active)
                | (Accepted, Closed)
                | (AwaitingUsername, Closed)
                | (Active, Closed)
        )
    }
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SessionState::Accepted => write!(f, "Accepted"),
            SessionState::AwaitingUsername => write!(f, "AwaitingUsername"),
            SessionState::Active => write!(f, "Active"),
            SessionState::Closed => write!(f, "Closed"),
        }
    }
}

impl fmt::Display for CloseReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CloseReason::Quit => write!(f, "quit"),
            CloseReason::EndOfStream => write!(f, "end of stream"),
            CloseReason::TransportError(err) => write!(f, "transport error: {}", err),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_forward_transitions() {
        assert!(SessionState::Accepted.can_transition_to(SessionState::AwaitingUsername));
        assert!(SessionState::AwaitingUsername.can_transition_to(SessionState::Active));
        assert!(SessionState::Active.can_transition_to(SessionState::Active));
        assert!(SessionState::Active.can_transition_to(SessionState::Closed));
        assert!(SessionState::AwaitingUsername.can_transition_to(SessionState::Closed));
    }

    #[test]
    fn test_closed_is_terminal() {
        for next in [
            SessionState::Accepted,
            SessionState::AwaitingUsername,
            SessionState::Active,
            SessionState::Closed,
        ] {
            assert!(!SessionState::Closed.can_transition_to(next));
        }
        assert!(!SessionState::Active.can_transition_to(SessionState::AwaitingUsername));
    }

    #[test]
    fn test_display() {
        assert_eq!(SessionState::AwaitingUsername.to_string(), "AwaitingUsername");
        assert_eq!(CloseReason::Quit.to_string(), "quit");
        assert_eq!(
            CloseReason::TransportError("reset".into()).to_string(),
            "transport error: reset"
        );
    }
}
