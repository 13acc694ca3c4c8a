use thiserror::Error;

/// ChatRelay unified error type
#[derive(Error, Debug)]
pub enum ChatError {
    #[error("Connection to {addr} failed after {attempts} attempt(s): {source}")]
    ConnectFailure {
        addr: String,
        attempts: u32,
        #[source]
        source: std::io::Error,
    },

    #[error("Transport error: {0}")]
    Transport(#[from] std::io::Error),

    #[error("Failed to bind {addr}: {source}")]
    Bind {
        addr: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Configuration error: {message}")]
    Config { message: String },

    #[error("Server error: {message}")]
    Server { message: String },

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Output error: {0}")]
    Output(String),
}

impl ChatError {
    /// True for failures that end the owning session or agent.
    pub fn is_transport(&self) -> bool {
        matches!(self, ChatError::Transport(_))
    }
}

pub type ChatResult<T> = Result<T, ChatError>;
