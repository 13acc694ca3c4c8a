use crate::domain::error::ChatResult;
use tokio::io::{AsyncBufReadExt, AsyncRead, AsyncWrite, AsyncWriteExt, BufReader};
use tracing::debug;

/// Receiving half of the newline-delimited transport.
pub struct LineReader<R> {
    inner: BufReader<R>,
    buffer: Vec<u8>,
}

/// Sending half of the newline-delimited transport.
///
/// The two halves are independent, so each can live on its own task
/// without any locking between reads and writes.
pub struct LineWriter<W> {
    inner: W,
    closed: bool,
}

impl<R: AsyncRead + Unpin> LineReader<R> {
    pub fn new(inner: R) -> Self {
        Self {
            inner: BufReader::new(inner),
            buffer: Vec::new(),
        }
    }

    /// Wait for the next full line.
    ///
    /// Returns `Ok(None)` once the peer has closed its side. The terminator
    /// (`\n` or `\r\n`) is stripped; a trailing fragment without a
    /// terminator at end of stream is still delivered as a line.
    pub async fn receive_line(&mut self) -> ChatResult<Option<String>> {
        self.buffer.clear();
        let n = self.inner.read_until(b'\n', &mut self.buffer).await?;
        if n == 0 {
            return Ok(None);
        }

        if self.buffer.last() == Some(&b'\n') {
            self.buffer.pop();
            if self.buffer.last() == Some(&b'\r') {
                self.buffer.pop();
            }
        }

        let line = String::from_utf8_lossy(&self.buffer).into_owned();
        debug!("Received line ({} bytes)", n);
        Ok(Some(line))
    }
}

impl<W: AsyncWrite + Unpin> LineWriter<W> {
    pub fn new(inner: W) -> Self {
        Self {
            inner,
            closed: false,
        }
    }

    /// Write `text` plus a line terminator and flush before returning.
    pub async fn send_line(&mut self, text: &str) -> ChatResult<()> {
        if self.closed {
            return Err(std::io::Error::new(
                std::io::ErrorKind::NotConnected,
                "line writer already closed",
            )
            .into());
        }

        self.inner.write_all(text.as_bytes()).await?;
        self.inner.write_all(b"\n").await?;
        self.inner.flush().await?;
        debug!("Sent line ({} bytes)", text.len() + 1);
        Ok(())
    }

    /// Shut the write side down. Calling it again is a no-op.
    pub async fn close(&mut self) {
        if self.closed {
            return;
        }
        self.closed = true;

        if let Err(e) = self.inner.shutdown().await {
            debug!("Ignoring error while closing line writer: {}", e);
        }
    }

    pub fn is_closed(&self) -> bool {
        self.closed
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio_test::io::Builder;

    #[tokio::test]
    async fn test_receive_lines_strips_terminators() {
        let mock = Builder::new()
            .read(b"alice\nhello there\r\n")
            .read(b"partial")
            .build();
        let mut reader = LineReader::new(mock);

        assert_eq!(reader.receive_line().await.unwrap().as_deref(), Some("alice"));
        assert_eq!(
            reader.receive_line().await.unwrap().as_deref(),
            Some("hello there")
        );
        assert_eq!(reader.receive_line().await.unwrap().as_deref(), Some("partial"));
        assert_eq!(reader.receive_line().await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_receive_line_split_across_reads() {
        let mock = Builder::new().read(b"hel").read(b"lo\n").build();
        let mut reader = LineReader::new(mock);

        assert_eq!(reader.receive_line().await.unwrap().as_deref(), Some("hello"));
        assert_eq!(reader.receive_line().await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_empty_line_is_not_end_of_stream() {
        let mock = Builder::new().read(b"\n").build();
        let mut reader = LineReader::new(mock);

        assert_eq!(reader.receive_line().await.unwrap().as_deref(), Some(""));
        assert_eq!(reader.receive_line().await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_receive_error_is_transport_error() {
        let mock = Builder::new()
            .read_error(std::io::Error::new(
                std::io::ErrorKind::ConnectionReset,
                "reset",
            ))
            .build();
        let mut reader = LineReader::new(mock);

        let err = reader.receive_line().await.unwrap_err();
        assert!(err.is_transport());
    }

    #[tokio::test]
    async fn test_send_line_appends_newline() {
        let mock = Builder::new().write(b"alice: hi").write(b"\n").build();
        let mut writer = LineWriter::new(mock);

        writer.send_line("alice: hi").await.unwrap();
    }

    #[tokio::test]
    async fn test_send_after_close_fails() {
        let (client, _server) = tokio::io::duplex(64);
        let mut writer = LineWriter::new(client);

        writer.close().await;
        writer.close().await;
        assert!(writer.is_closed());

        let err = writer.send_line("late").await.unwrap_err();
        assert!(err.is_transport());
    }

    #[tokio::test]
    async fn test_duplex_round_trip() {
        let (client, server) = tokio::io::duplex(256);
        let mut writer = LineWriter::new(client);
        let mut reader = LineReader::new(server);

        writer.send_line("first").await.unwrap();
        writer.send_line("second").await.unwrap();
        writer.close().await;

        assert_eq!(reader.receive_line().await.unwrap().as_deref(), Some("first"));
        assert_eq!(reader.receive_line().await.unwrap().as_deref(), Some("second"));
        assert_eq!(reader.receive_line().await.unwrap(), None);
    }
}
