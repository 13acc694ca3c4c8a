use crate::core::communication::format_relay;
use tokio::sync::{mpsc, Mutex};
use tracing::{debug, warn};

pub type SessionId = String;

/// Generate a unique session identifier.
pub fn new_session_id() -> SessionId {
    format!("session_{}", uuid::Uuid::new_v4().simple())
}

/// Registry view of one active session.
///
/// `outbox` feeds the session's writer task. Pushing into it never blocks,
/// so one slow peer cannot stall a broadcast to the others.
#[derive(Debug, Clone)]
pub struct SessionHandle {
    pub id: SessionId,
    pub username: String,
    outbox: mpsc::UnboundedSender<String>,
}

impl SessionHandle {
    pub fn new(id: SessionId, username: String, outbox: mpsc::UnboundedSender<String>) -> Self {
        Self {
            id,
            username,
            outbox,
        }
    }

    fn deliver(&self, line: String) -> bool {
        self.outbox.send(line).is_ok()
    }
}

/// Shared collection of active sessions, in registration order.
pub struct ClientRegistry {
    sessions: Mutex<Vec<SessionHandle>>,
}

impl ClientRegistry {
    pub fn new() -> Self {
        Self {
            sessions: Mutex::new(Vec::new()),
        }
    }

    /// Append a session. A second registration of the same id is ignored.
    pub async fn register(&self, handle: SessionHandle) {
        let mut sessions = self.sessions.lock().await;
        if sessions.iter().any(|s| s.id == handle.id) {
            warn!("Session '{}' is already registered", handle.id);
            return;
        }
        debug!("Registered session '{}' as '{}'", handle.id, handle.username);
        sessions.push(handle);
    }

    /// Remove a session. Returns the removed entry, or `None` if it was
    /// not registered (removal is idempotent).
    pub async fn unregister(&self, id: &str) -> Option<SessionHandle> {
        let mut sessions = self.sessions.lock().await;
        let index = sessions.iter().position(|s| s.id == id)?;
        let handle = sessions.remove(index);
        debug!("Unregistered session '{}'", id);
        Some(handle)
    }

    /// Relay `<username>: <message>` to every session except `sender_id`.
    ///
    /// A recipient whose writer has already gone away is skipped; its own
    /// session notices the dead writer and tears itself down. Returns the
    /// number of recipients the line was queued for.
    pub async fn broadcast_excluding(&self, sender_id: &str, username: &str, message: &str) -> usize {
        let line = format_relay(username, message);
        let sessions = self.sessions.lock().await;

        let mut delivered = 0;
        for recipient in sessions.iter().filter(|s| s.id != sender_id) {
            if recipient.deliver(line.clone()) {
                delivered += 1;
            } else {
                warn!(
                    "Dropping relay to '{}': connection already closing",
                    recipient.username
                );
            }
        }

        debug!("Relayed line from '{}' to {} recipient(s)", username, delivered);
        delivered
    }

    pub async fn contains(&self, id: &str) -> bool {
        let sessions = self.sessions.lock().await;
        sessions.iter().any(|s| s.id == id)
    }

    pub async fn len(&self) -> usize {
        self.sessions.lock().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.sessions.lock().await.is_empty()
    }

    /// Usernames in registration order.
    pub async fn usernames(&self) -> Vec<String> {
        let sessions = self.sessions.lock().await;
        sessions.iter().map(|s| s.username.clone()).collect()
    }
}

impl Default for ClientRegistry {
    fn default() -> Self {
        Self::new()
    }
}
