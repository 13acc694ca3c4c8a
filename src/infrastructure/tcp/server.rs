use crate::core::session::{ClientRegistry, Session};
use crate::domain::config::ServerConfig;
use crate::domain::error::{ChatError, ChatResult};
use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::{TcpListener, TcpSocket};
use tokio::sync::oneshot;
use tracing::{debug, error, info, warn};

const LISTEN_BACKLOG: u32 = 1024;

/// Connection acceptor: one spawned session per accepted connection.
pub struct ChatServer {
    listener: Option<TcpListener>,
    bind_addr: SocketAddr,
    registry: Arc<ClientRegistry>,
    shutdown_sender: Option<oneshot::Sender<()>>,
    server_handle: Option<tokio::task::JoinHandle<ChatResult<()>>>,
}

impl ChatServer {
    /// Bind the listening socket described by `config`.
    pub async fn bind(config: &ServerConfig) -> ChatResult<Self> {
        Self::new(&config.bind_addr(), config.reuse_address).await
    }

    pub async fn new(bind_addr: &str, reuse_address: bool) -> ChatResult<Self> {
        let listener = bind_listener(bind_addr, reuse_address).await?;
        let actual_addr = listener.local_addr().map_err(|e| ChatError::Bind {
            addr: bind_addr.to_string(),
            source: e,
        })?;

        info!("Chat server bound on {}", actual_addr);

        Ok(Self {
            listener: Some(listener),
            bind_addr: actual_addr,
            registry: Arc::new(ClientRegistry::new()),
            shutdown_sender: None,
            server_handle: None,
        })
    }

    pub fn local_addr(&self) -> SocketAddr {
        self.bind_addr
    }

    pub fn registry(&self) -> Arc<ClientRegistry> {
        Arc::clone(&self.registry)
    }

    pub async fn client_count(&self) -> usize {
        self.registry.len().await
    }

    pub fn is_running(&self) -> bool {
        self.server_handle.is_some()
    }

    /// Spawn the accept loop in the background.
    pub fn start(&mut self) -> ChatResult<()> {
        let listener = self.listener.take().ok_or_else(|| ChatError::Server {
            message: "Server is already running".to_string(),
        })?;

        let (shutdown_sender, shutdown_receiver) = oneshot::channel();
        let registry = Arc::clone(&self.registry);
        let handle = tokio::spawn(accept_loop(listener, registry, async move {
            let _ = shutdown_receiver.await;
        }));

        self.shutdown_sender = Some(shutdown_sender);
        self.server_handle = Some(handle);
        info!("Chat server started on {}", self.bind_addr);
        Ok(())
    }

    /// Close the listening socket. Sessions already running are left alone.
    pub async fn stop(&mut self) -> ChatResult<()> {
        let Some(handle) = self.server_handle.take() else {
            return Ok(());
        };

        info!("Stopping chat server");
        if let Some(sender) = self.shutdown_sender.take() {
            if sender.send(()).is_err() {
                debug!("Accept loop already finished");
            }
        }

        match handle.await {
            Ok(result) => result,
            Err(e) => Err(ChatError::Server {
                message: format!("Accept loop panicked: {}", e),
            }),
        }
    }

    /// Run the accept loop on the current task until `shutdown` resolves.
    pub async fn run_until<F>(mut self, shutdown: F) -> ChatResult<()>
    where
        F: Future<Output = ()> + Send,
    {
        let listener = self.listener.take().ok_or_else(|| ChatError::Server {
            message: "Server is already running".to_string(),
        })?;
        accept_loop(listener, Arc::clone(&self.registry), shutdown).await
    }
}

impl Drop for ChatServer {
    fn drop(&mut self) {
        if self.server_handle.is_some() {
            warn!("ChatServer dropped while still running - accept loop stops with it");
        }
    }
}

async fn bind_listener(bind_addr: &str, reuse_address: bool) -> ChatResult<TcpListener> {
    let bind_error = |source: std::io::Error| ChatError::Bind {
        addr: bind_addr.to_string(),
        source,
    };

    let addr = tokio::net::lookup_host(bind_addr)
        .await
        .map_err(bind_error)?
        .next()
        .ok_or_else(|| {
            bind_error(std::io::Error::new(
                std::io::ErrorKind::AddrNotAvailable,
                "address did not resolve",
            ))
        })?;

    let socket = if addr.is_ipv4() {
        TcpSocket::new_v4()
    } else {
        TcpSocket::new_v6()
    }
    .map_err(bind_error)?;

    socket.set_reuseaddr(reuse_address).map_err(bind_error)?;
    socket.bind(addr).map_err(bind_error)?;
    socket.listen(LISTEN_BACKLOG).map_err(bind_error)
}

/// Accept until `shutdown` resolves. An accept failure is fatal.
async fn accept_loop<F>(listener: TcpListener, registry: Arc<ClientRegistry>, shutdown: F) -> ChatResult<()>
where
    F: Future<Output = ()> + Send,
{
    tokio::pin!(shutdown);

    loop {
        tokio::select! {
            _ = &mut shutdown => {
                info!("Received shutdown signal, closing listener");
                return Ok(());
            }
            accepted = listener.accept() => match accepted {
                Ok((stream, addr)) => {
                    info!("New client connected: {}", addr);
                    let session = Session::accept(stream, Arc::clone(&registry));
                    tokio::spawn(async move {
                        let reason = session.run().await;
                        debug!("Session for {} closed: {}", addr, reason);
                    });
                }
                Err(e) => {
                    error!("Failed to accept connection: {}", e);
                    return Err(ChatError::Transport(e));
                }
            }
        }
    }
}
