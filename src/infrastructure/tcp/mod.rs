// TCP module - Connection acceptor and client connector
pub mod client;
pub mod server;

pub use client::{connect_with_retry, Connector, RetryPolicy, TcpConnector};
pub use server::ChatServer;
