//! ChatRelay Library
//!
//! Line-oriented multi-client chat relay: a TCP server that rebroadcasts
//! every line to all other connected clients, and a duplex client agent
//! that reads broadcasts while sending typed input.

pub mod cli;
pub mod core;
pub mod domain;
pub mod infrastructure;

pub use crate::domain::error::{ChatError, ChatResult};
pub use crate::domain::config::ChatConfig;
pub use crate::core::agent::{AgentExit, DuplexAgent, InputSource, MessageSink};
pub use crate::core::session::{ClientRegistry, Session, SessionState};
pub use crate::infrastructure::tcp::{connect_with_retry, ChatServer, RetryPolicy, TcpConnector};
