use crate::cli::args::OutputFormat;
use crate::core::agent::MessageSink;
use crate::domain::config::ChatConfig;
use crate::domain::error::{ChatError, ChatResult};
use std::io::{self, Write};

/// Output writer trait for console rendering
pub trait OutputWriter {
    fn write_config(&self, config: &ChatConfig) -> Result<(), OutputError>;
    fn write_message(&self, message: &str) -> Result<(), OutputError>;
    fn write_error(&self, error: &str) -> Result<(), OutputError>;
}

/// Output formatting errors
#[derive(Debug, thiserror::Error)]
pub enum OutputError {
    #[error("JSON serialization error: {0}")]
    JsonError(#[from] serde_json::Error),
    #[error("TOML serialization error: {0}")]
    TomlError(#[from] toml::ser::Error),
    #[error("IO error: {0}")]
    IoError(#[from] io::Error),
}

impl From<OutputError> for ChatError {
    fn from(err: OutputError) -> Self {
        Self::Output(err.to_string())
    }
}

/// Console output writer
///
/// Chat lines and status messages go to stdout, errors to stderr.
#[derive(Debug, Clone)]
pub struct ConsoleWriter {
    format: OutputFormat,
}

impl ConsoleWriter {
    pub fn new(format: OutputFormat) -> Self {
        Self { format }
    }

    /// Render a configuration in this writer's format
    pub fn render_config(&self, config: &ChatConfig) -> Result<String, OutputError> {
        match self.format {
            OutputFormat::Text => Ok(toml::to_string_pretty(config)?),
            OutputFormat::Json => Ok(serde_json::to_string_pretty(config)?),
        }
    }
}

impl Default for ConsoleWriter {
    fn default() -> Self {
        Self::new(OutputFormat::Text)
    }
}

impl OutputWriter for ConsoleWriter {
    fn write_config(&self, config: &ChatConfig) -> Result<(), OutputError> {
        let rendered = self.render_config(config)?;
        self.write_message(rendered.trim_end())
    }

    fn write_message(&self, message: &str) -> Result<(), OutputError> {
        let mut stdout = io::stdout().lock();
        writeln!(stdout, "{}", message)?;
        stdout.flush()?;
        Ok(())
    }

    fn write_error(&self, error: &str) -> Result<(), OutputError> {
        let mut stderr = io::stderr().lock();
        writeln!(stderr, "{}", error)?;
        Ok(())
    }
}

impl MessageSink for ConsoleWriter {
    fn display(&mut self, line: &str) -> ChatResult<()> {
        Ok(self.write_message(line)?)
    }
}
