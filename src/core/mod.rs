// Core module - Relay engine shared by server and client
pub mod agent;
pub mod communication;
pub mod session;

pub use agent::{AgentExit, DuplexAgent, InputSource, MessageSink, RunningFlag};
