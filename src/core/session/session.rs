use crate::core::communication::message::{ChatLine, JOIN_NOTICE, LEAVE_NOTICE};
use crate::core::communication::transport::{LineReader, LineWriter};
use crate::core::session::registry::{new_session_id, ClientRegistry, SessionHandle, SessionId};
use crate::core::session::state::{CloseReason, SessionState};
use crate::domain::error::ChatResult;
use std::sync::Arc;
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::TcpStream;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

type WriterTask = JoinHandle<ChatResult<()>>;

/// Server-side representation of one accepted connection.
pub struct Session<R, W> {
    id: SessionId,
    peer: String,
    state: SessionState,
    reader: LineReader<R>,
    writer: LineWriter<W>,
    registry: Arc<ClientRegistry>,
}

impl Session<OwnedReadHalf, OwnedWriteHalf> {
    /// Build a session over a freshly accepted TCP connection.
    pub fn accept(stream: TcpStream, registry: Arc<ClientRegistry>) -> Self {
        let peer = stream
            .peer_addr()
            .map(|addr| addr.to_string())
            .unwrap_or_else(|_| "unknown".to_string());
        let (reader, writer) = stream.into_split();
        Self::new(reader, writer, peer, registry)
    }
}

impl<R, W> Session<R, W>
where
    R: AsyncRead + Unpin + Send + 'static,
    W: AsyncWrite + Unpin + Send + 'static,
{
    pub fn new(reader: R, writer: W, peer: impl Into<String>, registry: Arc<ClientRegistry>) -> Self {
        let mut session = Self {
            id: new_session_id(),
            peer: peer.into(),
            state: SessionState::Accepted,
            reader: LineReader::new(reader),
            writer: LineWriter::new(writer),
            registry,
        };
        session.advance(SessionState::AwaitingUsername);
        session
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    /// Drive the session until it closes, returning why it closed.
    ///
    /// Every exit path after registration funnels through the same teardown,
    /// so the leave notice is relayed exactly once.
    pub async fn run(mut self) -> CloseReason {
        let username = match self.await_username().await {
            Ok(Some(username)) => username,
            Ok(None) => return self.close_unregistered(CloseReason::EndOfStream).await,
            Err(e) => {
                return self
                    .close_unregistered(CloseReason::TransportError(e.to_string()))
                    .await
            }
        };

        let Session {
            id,
            peer,
            mut state,
            mut reader,
            writer,
            registry,
        } = self;

        let (outbox, inbox) = mpsc::unbounded_channel();
        let writer_task = tokio::spawn(write_loop(writer, inbox));

        registry
            .register(SessionHandle::new(id.clone(), username.clone(), outbox))
            .await;
        transition(&id, &mut state, SessionState::Active);
        info!("'{}' joined the chat from {}", username, peer);
        registry.broadcast_excluding(&id, &username, JOIN_NOTICE).await;

        let (reason, writer_task) =
            relay_loop(&id, &username, &mut state, &mut reader, &registry, writer_task).await;

        transition(&id, &mut state, SessionState::Closed);
        if registry.unregister(&id).await.is_some() {
            registry.broadcast_excluding(&id, &username, LEAVE_NOTICE).await;
            info!("'{}' left the chat ({})", username, reason);
        }

        // The registry held the only outbox sender, so the writer drains what
        // is queued and shuts the connection down.
        if let Some(task) = writer_task {
            match task.await {
                Ok(Err(e)) => debug!("Writer for '{}' stopped: {}", username, e),
                Err(e) => warn!("Writer task for '{}' failed: {}", username, e),
                Ok(Ok(())) => {}
            }
        }
        drop(reader);

        reason
    }

    async fn await_username(&mut self) -> ChatResult<Option<String>> {
        while let Some(line) = self.reader.receive_line().await? {
            if line.is_empty() {
                debug!("Ignoring blank username line from {}", self.peer);
                continue;
            }
            return Ok(Some(line));
        }
        Ok(None)
    }

    async fn close_unregistered(mut self, reason: CloseReason) -> CloseReason {
        debug!(
            "Connection from {} closed before registration ({})",
            self.peer, reason
        );
        self.advance(SessionState::Closed);
        self.writer.close().await;
        reason
    }

    fn advance(&mut self, next: SessionState) {
        transition(&self.id, &mut self.state, next);
    }
}

fn transition(id: &str, state: &mut SessionState, next: SessionState) {
    if !state.can_transition_to(next) {
        warn!("Session '{}' ignoring transition {} -> {}", id, state, next);
        return;
    }
    if *state != next {
        debug!("Session '{}' {} -> {}", id, state, next);
    }
    *state = next;
}

async fn relay_loop<R>(
    id: &str,
    username: &str,
    state: &mut SessionState,
    reader: &mut LineReader<R>,
    registry: &ClientRegistry,
    mut writer_task: WriterTask,
) -> (CloseReason, Option<WriterTask>)
where
    R: AsyncRead + Unpin,
{
    loop {
        tokio::select! {
            received = reader.receive_line() => match received {
                Ok(Some(line)) => match ChatLine::parse(line) {
                    ChatLine::Quit => return (CloseReason::Quit, Some(writer_task)),
                    ChatLine::Chat(text) => {
                        transition(id, state, SessionState::Active);
                        registry.broadcast_excluding(id, username, &text).await;
                    }
                },
                Ok(None) => return (CloseReason::EndOfStream, Some(writer_task)),
                Err(e) => return (CloseReason::TransportError(e.to_string()), Some(writer_task)),
            },
            finished = &mut writer_task => {
                // The outbox is still registered, so the writer only ends on failure.
                let reason = match finished {
                    Ok(Err(e)) => e.to_string(),
                    Ok(Ok(())) => "writer stopped".to_string(),
                    Err(e) => e.to_string(),
                };
                return (CloseReason::TransportError(reason), None);
            }
        }
    }
}

async fn write_loop<W>(mut writer: LineWriter<W>, mut inbox: mpsc::UnboundedReceiver<String>) -> ChatResult<()>
where
    W: AsyncWrite + Unpin,
{
    while let Some(line) = inbox.recv().await {
        if let Err(e) = writer.send_line(&line).await {
            writer.close().await;
            return Err(e);
        }
    }
    writer.close().await;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::{duplex, AsyncBufReadExt, AsyncWriteExt, BufReader, DuplexStream};
    use tokio::time::{timeout, Duration};

    struct Peer {
        to_session: DuplexStream,
        from_session: tokio::io::Lines<BufReader<DuplexStream>>,
    }

    impl Peer {
        async fn send(&mut self, line: &str) {
            self.to_session
                .write_all(format!("{}\n", line).as_bytes())
                .await
                .unwrap();
        }

        async fn next(&mut self) -> Option<String> {
            timeout(Duration::from_secs(2), self.from_session.next_line())
                .await
                .expect("timed out waiting for line")
                .unwrap()
        }
    }

    fn spawn_session(registry: &Arc<ClientRegistry>) -> (Peer, JoinHandle<CloseReason>) {
        let (to_session, session_in) = duplex(1024);
        let (session_out, from_session) = duplex(1024);
        let session = Session::new(session_in, session_out, "test-peer", Arc::clone(registry));
        assert_eq!(session.state(), SessionState::AwaitingUsername);
        let handle = tokio::spawn(session.run());
        (
            Peer {
                to_session,
                from_session: BufReader::new(from_session).lines(),
            },
            handle,
        )
    }

    async fn wait_for_len(registry: &ClientRegistry, expected: usize) {
        timeout(Duration::from_secs(2), async {
            while registry.len().await != expected {
                tokio::time::sleep(Duration::from_millis(5)).await;
            }
        })
        .await
        .expect("registry never reached expected size");
    }

    #[tokio::test]
    async fn test_close_before_username_skips_registry() {
        let registry = Arc::new(ClientRegistry::new());
        let (peer, handle) = spawn_session(&registry);

        drop(peer);

        assert_eq!(handle.await.unwrap(), CloseReason::EndOfStream);
        assert!(registry.is_empty().await);
    }

    #[tokio::test]
    async fn test_first_line_registers_username() {
        let registry = Arc::new(ClientRegistry::new());
        let (mut alice, _handle) = spawn_session(&registry);

        alice.send("alice").await;
        wait_for_len(&registry, 1).await;

        assert_eq!(registry.usernames().await, vec!["alice"]);
    }

    #[tokio::test]
    async fn test_relay_join_and_leave() {
        let registry = Arc::new(ClientRegistry::new());
        let (mut alice, alice_handle) = spawn_session(&registry);
        alice.send("alice").await;
        wait_for_len(&registry, 1).await;

        let (mut bob, bob_handle) = spawn_session(&registry);
        bob.send("bob").await;
        assert_eq!(alice.next().await.as_deref(), Some("bob: has entered the chat."));

        alice.send("hello").await;
        assert_eq!(bob.next().await.as_deref(), Some("alice: hello"));

        bob.send("!QUIT").await;
        assert_eq!(bob_handle.await.unwrap(), CloseReason::Quit);
        assert_eq!(alice.next().await.as_deref(), Some("bob: has left the chat."));
        assert_eq!(bob.next().await, None);

        alice.send("anyone?").await;
        alice.send("!quit").await;
        assert_eq!(alice_handle.await.unwrap(), CloseReason::Quit);
        assert!(registry.is_empty().await);
    }

    #[tokio::test]
    async fn test_abrupt_disconnect_announces_leave_once() {
        let registry = Arc::new(ClientRegistry::new());
        let (mut alice, _alice_handle) = spawn_session(&registry);
        alice.send("alice").await;
        wait_for_len(&registry, 1).await;

        let (mut bob, bob_handle) = spawn_session(&registry);
        bob.send("bob").await;
        assert_eq!(alice.next().await.as_deref(), Some("bob: has entered the chat."));

        drop(bob);
        assert_eq!(bob_handle.await.unwrap(), CloseReason::EndOfStream);
        assert_eq!(alice.next().await.as_deref(), Some("bob: has left the chat."));

        alice.send("still here").await;
        let extra = timeout(Duration::from_millis(100), alice.from_session.next_line()).await;
        assert!(extra.is_err(), "no further notices expected");
    }

    #[tokio::test]
    async fn test_failed_write_tears_down_recipient() {
        let registry = Arc::new(ClientRegistry::new());
        let (mut alice, _alice_handle) = spawn_session(&registry);
        alice.send("alice").await;
        wait_for_len(&registry, 1).await;

        let (mut bob, bob_handle) = spawn_session(&registry);
        bob.send("bob").await;
        assert_eq!(alice.next().await.as_deref(), Some("bob: has entered the chat."));

        // Bob stops reading but keeps his sending side open.
        let Peer {
            to_session: bob_input,
            from_session: bob_output,
        } = bob;
        drop(bob_output);

        alice.send("hello").await;
        let reason = timeout(Duration::from_secs(2), bob_handle)
            .await
            .expect("session did not close")
            .unwrap();
        assert!(matches!(reason, CloseReason::TransportError(_)), "{:?}", reason);

        assert_eq!(alice.next().await.as_deref(), Some("bob: has left the chat."));
        wait_for_len(&registry, 1).await;
        assert_eq!(registry.usernames().await, vec!["alice"]);

        let extra = timeout(Duration::from_millis(100), alice.from_session.next_line()).await;
        assert!(extra.is_err(), "leave notice must be relayed once");
        drop(bob_input);
    }
}
