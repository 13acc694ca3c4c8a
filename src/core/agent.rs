//! Client-side duplex agent.
//!
//! One connection, two loops: the send loop runs on the caller's task and
//! forwards local input, the receive loop runs on its own task and hands
//! every server line to a [`MessageSink`]. Both loops watch a shared
//! [`RunningFlag`]; whichever loop fails or finishes first flips it and the
//! other one follows.

use crate::core::communication::message::{is_quit, QUIT_KEYWORD};
use crate::core::communication::transport::{LineReader, LineWriter};
use crate::domain::error::{ChatError, ChatResult};
use async_trait::async_trait;
use std::sync::Arc;
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::TcpStream;
use tokio::sync::{mpsc, watch};
use tracing::{debug, info, warn};

/// Source of locally typed lines.
#[async_trait]
pub trait InputSource: Send {
    /// Next input line without its terminator, `None` once input is exhausted.
    async fn next_line(&mut self) -> ChatResult<Option<String>>;
}

/// Destination for lines received from the server.
pub trait MessageSink: Send + 'static {
    fn display(&mut self, line: &str) -> ChatResult<()>;
}

#[async_trait]
impl InputSource for mpsc::UnboundedReceiver<String> {
    async fn next_line(&mut self) -> ChatResult<Option<String>> {
        Ok(self.recv().await)
    }
}

impl MessageSink for mpsc::UnboundedSender<String> {
    fn display(&mut self, line: &str) -> ChatResult<()> {
        self.send(line.to_string())
            .map_err(|e| ChatError::Output(format!("message sink closed: {}", e)))
    }
}

/// Shared run state of the two agent loops.
///
/// Starts out running and flips to stopped exactly once.
#[derive(Clone)]
pub struct RunningFlag {
    state: Arc<watch::Sender<bool>>,
}

impl RunningFlag {
    pub fn new() -> Self {
        let (state, _) = watch::channel(true);
        Self {
            state: Arc::new(state),
        }
    }

    pub fn is_running(&self) -> bool {
        *self.state.borrow()
    }

    /// Flip to stopped. Returns true only for the call that actually did it.
    pub fn stop(&self) -> bool {
        self.state.send_if_modified(|running| {
            if *running {
                *running = false;
                true
            } else {
                false
            }
        })
    }

    /// Resolves once the flag has been stopped.
    pub async fn stopped(&self) {
        let mut rx = self.state.subscribe();
        // The sender lives in `self`, so this cannot fail while we wait.
        let _ = rx.wait_for(|running| !*running).await;
    }
}

impl Default for RunningFlag {
    fn default() -> Self {
        Self::new()
    }
}

/// How the agent finished.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AgentExit {
    /// The user typed the quit keyword
    Quit,
    /// Local input ended; a quit was sent on the user's behalf
    InputClosed,
    /// The server closed the connection or a read failed
    ConnectionClosed,
    /// Sending to the server failed
    SendFailed(String),
}

pub struct DuplexAgent<R, W> {
    username: String,
    reader: LineReader<R>,
    writer: LineWriter<W>,
    running: RunningFlag,
}

impl DuplexAgent<OwnedReadHalf, OwnedWriteHalf> {
    pub fn from_stream(stream: TcpStream, username: impl Into<String>) -> Self {
        let (reader, writer) = stream.into_split();
        Self::new(reader, writer, username)
    }
}

impl<R, W> DuplexAgent<R, W>
where
    R: AsyncRead + Unpin + Send + 'static,
    W: AsyncWrite + Unpin + Send,
{
    pub fn new(reader: R, writer: W, username: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            reader: LineReader::new(reader),
            writer: LineWriter::new(writer),
            running: RunningFlag::new(),
        }
    }

    pub fn running_flag(&self) -> RunningFlag {
        self.running.clone()
    }

    /// Register with the server and relay until either side stops.
    ///
    /// The send loop runs here; the receive loop is spawned. Local input
    /// errors are returned after the connection has been torn down.
    pub async fn run<I, S>(self, input: &mut I, sink: S) -> ChatResult<AgentExit>
    where
        I: InputSource + ?Sized,
        S: MessageSink,
    {
        let DuplexAgent {
            username,
            reader,
            mut writer,
            running,
        } = self;

        let receiver = tokio::spawn(receive_loop(reader, sink, running.clone()));

        let outcome = match writer.send_line(&username).await {
            Ok(()) => {
                info!("Registered as '{}'", username);
                send_loop(&mut writer, input, &running).await
            }
            Err(e) => Ok(AgentExit::SendFailed(e.to_string())),
        };

        // Shared teardown; safe whichever loop got here first.
        running.stop();
        writer.close().await;
        if let Err(e) = receiver.await {
            warn!("Receive loop ended abnormally: {}", e);
        }

        debug!("Agent for '{}' finished: {:?}", username, outcome);
        outcome
    }
}

async fn send_loop<W, I>(writer: &mut LineWriter<W>, input: &mut I, running: &RunningFlag) -> ChatResult<AgentExit>
where
    W: AsyncWrite + Unpin,
    I: InputSource + ?Sized,
{
    loop {
        let line = tokio::select! {
            _ = running.stopped() => return Ok(AgentExit::ConnectionClosed),
            line = input.next_line() => line,
        };

        let (line, exit) = match line {
            Ok(Some(line)) if is_quit(&line) => (line, Some(AgentExit::Quit)),
            Ok(Some(line)) => (line, None),
            Ok(None) => (QUIT_KEYWORD.to_string(), Some(AgentExit::InputClosed)),
            Err(e) => {
                running.stop();
                return Err(e);
            }
        };

        if let Err(e) = writer.send_line(&line).await {
            warn!("Failed to send to server: {}", e);
            return Ok(exit.unwrap_or(AgentExit::SendFailed(e.to_string())));
        }

        if let Some(exit) = exit {
            running.stop();
            return Ok(exit);
        }
    }
}

async fn receive_loop<R, S>(mut reader: LineReader<R>, mut sink: S, running: RunningFlag)
where
    R: AsyncRead + Unpin,
    S: MessageSink,
{
    loop {
        let received = tokio::select! {
            _ = running.stopped() => break,
            received = reader.receive_line() => received,
        };

        match received {
            Ok(Some(line)) => {
                if let Err(e) = sink.display(&line) {
                    warn!("Failed to display message: {}", e);
                }
            }
            Ok(None) => {
                info!("Server closed the connection");
                break;
            }
            Err(e) => {
                warn!("Failed to receive from server: {}", e);
                break;
            }
        }
    }

    running.stop();
}
