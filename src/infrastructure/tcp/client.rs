use crate::domain::config::ClientConfig;
use crate::domain::error::{ChatError, ChatResult};
use async_trait::async_trait;
use std::time::Duration;
use tokio::net::TcpStream;
use tracing::{info, warn};

/// Opens connections to the chat server.
#[async_trait]
pub trait Connector: Send + Sync {
    type Stream: Send;

    async fn connect(&self, host: &str, port: u16) -> std::io::Result<Self::Stream>;
}

/// Plain TCP connector.
#[derive(Debug, Clone, Default)]
pub struct TcpConnector;

#[async_trait]
impl Connector for TcpConnector {
    type Stream = TcpStream;

    async fn connect(&self, host: &str, port: u16) -> std::io::Result<TcpStream> {
        let stream = TcpStream::connect((host, port)).await?;
        if let Err(e) = stream.set_nodelay(true) {
            warn!("Failed to set TCP_NODELAY: {}", e);
        }
        Ok(stream)
    }
}

/// Bounded connect retry: fixed attempt count, fixed pause between attempts.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryPolicy {
    pub attempts: u32,
    pub delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::from(&ClientConfig::default())
    }
}

impl From<&ClientConfig> for RetryPolicy {
    fn from(config: &ClientConfig) -> Self {
        Self {
            attempts: config.connect_attempts,
            delay: config.retry_delay(),
        }
    }
}

/// Connect, retrying failed attempts up to `policy.attempts` in total.
///
/// `on_retry` runs once for every failure that will be retried, with the
/// 1-based number of the attempt that failed. The last failure is returned
/// as [`ChatError::ConnectFailure`] without a trailing pause.
pub async fn connect_with_retry<C, F>(
    connector: &C,
    host: &str,
    port: u16,
    policy: &RetryPolicy,
    mut on_retry: F,
) -> ChatResult<C::Stream>
where
    C: Connector + ?Sized,
    F: FnMut(u32, &std::io::Error) + Send,
{
    let attempts = policy.attempts.max(1);
    let mut attempt = 0;

    loop {
        attempt += 1;
        match connector.connect(host, port).await {
            Ok(stream) => {
                info!("Connected to {}:{} on attempt {}", host, port, attempt);
                return Ok(stream);
            }
            Err(e) if attempt < attempts => {
                warn!(
                    "Connection attempt {}/{} to {}:{} failed: {}",
                    attempt, attempts, host, port, e
                );
                on_retry(attempt, &e);
                tokio::time::sleep(policy.delay).await;
            }
            Err(e) => {
                warn!("Giving up on {}:{} after {} attempt(s)", host, port, attempt);
                return Err(ChatError::ConnectFailure {
                    addr: format!("{}:{}", host, port),
                    attempts: attempt,
                    source: e,
                });
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::VecDeque;
    use std::sync::Mutex;
    use tokio::net::TcpListener;

    /// Connector that plays back a fixed script of outcomes.
    struct ScriptedConnector {
        outcomes: Mutex<VecDeque<bool>>,
        calls: Mutex<u32>,
    }

    impl ScriptedConnector {
        fn new(outcomes: &[bool]) -> Self {
            Self {
                outcomes: Mutex::new(outcomes.iter().copied().collect()),
                calls: Mutex::new(0),
            }
        }

        fn calls(&self) -> u32 {
            *self.calls.lock().unwrap()
        }
    }

    #[async_trait]
    impl Connector for ScriptedConnector {
        type Stream = ();

        async fn connect(&self, _host: &str, _port: u16) -> std::io::Result<()> {
            *self.calls.lock().unwrap() += 1;
            match self.outcomes.lock().unwrap().pop_front() {
                Some(true) => Ok(()),
                _ => Err(std::io::Error::new(
                    std::io::ErrorKind::ConnectionRefused,
                    "refused",
                )),
            }
        }
    }

    fn fast_policy() -> RetryPolicy {
        RetryPolicy {
            attempts: 3,
            delay: Duration::from_millis(1),
        }
    }

    #[test]
    fn test_default_policy_matches_client_defaults() {
        let policy = RetryPolicy::default();
        assert_eq!(policy.attempts, 3);
        assert_eq!(policy.delay, Duration::from_secs(3));
    }

    #[tokio::test]
    async fn test_two_failures_then_success() {
        let connector = ScriptedConnector::new(&[false, false, true]);
        let mut retries = Vec::new();

        let result = connect_with_retry(&connector, "localhost", 1025, &fast_policy(), |n, _| {
            retries.push(n)
        })
        .await;

        assert!(result.is_ok());
        assert_eq!(retries, vec![1, 2]);
        assert_eq!(connector.calls(), 3);
    }

    #[tokio::test]
    async fn test_three_failures_abandon() {
        let connector = ScriptedConnector::new(&[false, false, false, true]);
        let mut retries = 0;

        let result = connect_with_retry(&connector, "localhost", 1025, &fast_policy(), |_, _| {
            retries += 1
        })
        .await;

        match result {
            Err(ChatError::ConnectFailure { attempts, addr, .. }) => {
                assert_eq!(attempts, 3);
                assert_eq!(addr, "localhost:1025");
            }
            other => panic!("expected ConnectFailure, got {:?}", other.map(|_| ())),
        }
        assert_eq!(retries, 2);
        assert_eq!(connector.calls(), 3);
    }

    #[tokio::test]
    async fn test_zero_attempts_still_tries_once() {
        let connector = ScriptedConnector::new(&[true]);
        let policy = RetryPolicy {
            attempts: 0,
            delay: Duration::from_millis(1),
        };

        assert!(connect_with_retry(&connector, "h", 1, &policy, |_, _| {})
            .await
            .is_ok());
        assert_eq!(connector.calls(), 1);
    }

    #[tokio::test]
    async fn test_tcp_connector_reaches_listener() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();

        let stream = connect_with_retry(
            &TcpConnector,
            &addr.ip().to_string(),
            addr.port(),
            &fast_policy(),
            |_, _| {},
        )
        .await
        .unwrap();

        assert_eq!(stream.peer_addr().unwrap(), addr);
    }
}
