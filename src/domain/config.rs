use serde::{Deserialize, Serialize};
use std::time::Duration;

/// ChatRelay configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ChatConfig {
    /// Global configuration
    #[serde(default)]
    pub global: GlobalConfig,
    /// Server (acceptor) settings
    #[serde(default)]
    pub server: ServerConfig,
    /// Client (duplex agent) settings
    #[serde(default)]
    pub client: ClientConfig,
}

/// Global configuration settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GlobalConfig {
    /// Default log level
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

/// Listening socket settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Interface to bind
    #[serde(default = "default_bind_host")]
    pub bind_host: String,
    /// Listening port
    #[serde(default = "default_port")]
    pub port: u16,
    /// Set SO_REUSEADDR so a restart can rebind promptly
    #[serde(default = "default_reuse_address")]
    pub reuse_address: bool,
}

/// Client connection settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClientConfig {
    /// Server host
    #[serde(default = "default_host")]
    pub host: String,
    /// Server port
    #[serde(default = "default_port")]
    pub port: u16,
    /// Total connection attempts before giving up
    #[serde(default = "default_connect_attempts")]
    pub connect_attempts: u32,
    /// Pause between connection attempts in milliseconds
    #[serde(default = "default_retry_delay")]
    pub retry_delay_ms: u64,
}

impl ServerConfig {
    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.bind_host, self.port)
    }
}

impl ClientConfig {
    pub fn retry_delay(&self) -> Duration {
        Duration::from_millis(self.retry_delay_ms)
    }
}

// Default value functions
fn default_log_level() -> String {
    "info".to_string()
}

fn default_bind_host() -> String {
    "0.0.0.0".to_string()
}

fn default_host() -> String {
    "localhost".to_string()
}

fn default_port() -> u16 {
    1025
}

fn default_reuse_address() -> bool {
    true
}

fn default_connect_attempts() -> u32 {
    3
}

fn default_retry_delay() -> u64 {
    3000
}

impl Default for GlobalConfig {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
        }
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_host: default_bind_host(),
            port: default_port(),
            reuse_address: default_reuse_address(),
        }
    }
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            connect_attempts: default_connect_attempts(),
            retry_delay_ms: default_retry_delay(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_serialization() {
        let config = ChatConfig::default();
        let toml_str = toml::to_string(&config).unwrap();
        let deserialized: ChatConfig = toml::from_str(&toml_str).unwrap();
        assert_eq!(deserialized.server.port, config.server.port);
        assert_eq!(deserialized.client.host, config.client.host);
    }

    #[test]
    fn test_partial_config_fills_defaults() {
        let config: ChatConfig = toml::from_str(
            r#"
            [client]
            host = "chat.example.org"
            "#,
        )
        .unwrap();

        assert_eq!(config.client.host, "chat.example.org");
        assert_eq!(config.client.port, 1025);
        assert_eq!(config.client.connect_attempts, 3);
        assert_eq!(config.client.retry_delay(), Duration::from_secs(3));
        assert_eq!(config.server.port, 1025);
        assert!(config.server.reuse_address);
        assert_eq!(config.global.log_level, "info");
    }

    #[test]
    fn test_server_bind_addr() {
        let server = ServerConfig {
            bind_host: "127.0.0.1".to_string(),
            port: 4000,
            reuse_address: true,
        };
        assert_eq!(server.bind_addr(), "127.0.0.1:4000");
    }
}
