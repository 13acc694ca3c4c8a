use crate::core::agent::InputSource;
use crate::domain::error::{ChatError, ChatResult};
use async_trait::async_trait;
use tokio::io::{AsyncBufReadExt, BufReader, Lines, Stdin};

/// Line input from the terminal.
pub struct StdinInput {
    lines: Lines<BufReader<Stdin>>,
}

impl StdinInput {
    pub fn new() -> Self {
        Self {
            lines: BufReader::new(tokio::io::stdin()).lines(),
        }
    }

    /// Read the username typed at the prompt.
    pub async fn read_username(&mut self) -> ChatResult<String> {
        loop {
            match self.next_line().await? {
                Some(line) if line.is_empty() => continue,
                Some(line) => return Ok(line),
                None => {
                    return Err(ChatError::InvalidInput(
                        "input closed before a username was entered".to_string(),
                    ))
                }
            }
        }
    }
}

impl Default for StdinInput {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl InputSource for StdinInput {
    async fn next_line(&mut self) -> ChatResult<Option<String>> {
        Ok(self.lines.next_line().await?)
    }
}
