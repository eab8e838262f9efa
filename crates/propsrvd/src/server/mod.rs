//! TCP server for the property protocol.
//!
//! The server:
//! - Listens on the loopback interface for client connections
//! - Spawns a [`ClientSession`] for each client
//! - Tracks live sessions so they can be disconnected on stop
//! - Supports graceful shutdown via CancellationToken
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────┐
//! │ PropertyServer  │
//! │                 │
//! │  TcpListener    │
//! └───────┬─────────┘
//!         │ accept()
//!         ▼
//! ┌─────────────────┐  subscribe   ┌─────────────────────┐
//! │  ClientSession  │─────────────▶│ SubscriptionManager │
//! │   (per client)  │◀─────────────│                     │
//! └─────────────────┘   notify     └──────────▲──────────┘
//!                                             │ push_update
//!                                  ┌──────────┴──────────┐
//!                                  │     TickBridge      │
//!                                  │   (host ticks)      │
//!                                  └─────────────────────┘
//! ```
//!
//! # Panic-Free Guarantees
//!
//! - No `.unwrap()`, `.expect()`, `panic!()`, `unreachable!()`, `todo!()`
//! - All fallible operations use `?`, pattern matching, or `unwrap_or`
//! - Accept errors are logged and allow continued operation

mod session;

pub use session::{
    ClientSession, CloseReason, SessionError, SessionHandle, SessionState, MAX_LINE_LENGTH,
    WRITE_TIMEOUT,
};

use std::collections::HashMap;
use std::net::{Ipv4Addr, SocketAddr};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use futures::future::join_all;
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::{Mutex, RwLock};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::host::InputTrigger;
use crate::subscriptions::SubscriptionManager;

/// Live sessions keyed by client id
pub type SessionsMap = Arc<RwLock<HashMap<u64, SessionHandle>>>;

/// Dependencies shared by every session.
pub struct ServerContext {
    pub subscriptions: Arc<SubscriptionManager>,
    pub input: Arc<dyn InputTrigger>,
    /// Shown in the greeting line
    pub product_name: String,
}

impl ServerContext {
    pub fn new(
        subscriptions: Arc<SubscriptionManager>,
        input: Arc<dyn InputTrigger>,
        product_name: impl Into<String>,
    ) -> Self {
        Self {
            subscriptions,
            input,
            product_name: product_name.into(),
        }
    }
}

/// Line protocol server on `127.0.0.1`.
pub struct PropertyServer {
    listener: Mutex<Option<TcpListener>>,
    local_addr: SocketAddr,
    ctx: Arc<ServerContext>,
    cancel_token: CancellationToken,
    connection_counter: AtomicU64,
    sessions: SessionsMap,
}

impl PropertyServer {
    /// Binds the listening socket. Port 0 picks a free port.
    pub async fn bind(
        port: u16,
        ctx: Arc<ServerContext>,
        cancel_token: CancellationToken,
    ) -> Result<Self, ServerError> {
        let addr = SocketAddr::from((Ipv4Addr::LOCALHOST, port));
        let listener = TcpListener::bind(addr)
            .await
            .map_err(|e| ServerError::Bind { addr, source: e })?;
        let local_addr = listener
            .local_addr()
            .map_err(|e| ServerError::Bind { addr, source: e })?;

        Ok(Self {
            listener: Mutex::new(Some(listener)),
            local_addr,
            ctx,
            cancel_token,
            connection_counter: AtomicU64::new(0),
            sessions: Arc::new(RwLock::new(HashMap::new())),
        })
    }

    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    pub fn context(&self) -> &Arc<ServerContext> {
        &self.ctx
    }

    /// Runs the accept loop until the cancellation token is triggered.
    pub async fn run(&self) -> Result<(), ServerError> {
        let listener = self.listener.lock().await.take().ok_or(ServerError::NotListening)?;

        info!(addr = %self.local_addr, "Property server listening");

        loop {
            tokio::select! {
                biased;

                _ = self.cancel_token.cancelled() => {
                    info!("Server shutdown requested");
                    break;
                }

                result = listener.accept() => {
                    match result {
                        Ok((stream, peer)) => {
                            let client_id = self.connection_counter.fetch_add(1, Ordering::Relaxed) + 1;
                            debug!(client_id, peer = %peer, "Accepted connection");
                            self.handle_connection(stream, client_id).await;
                        }
                        Err(e) => {
                            error!(error = %e, "Failed to accept connection");
                        }
                    }
                }
            }
        }

        drop(listener);
        self.disconnect_all().await;
        info!("Property server stopped");
        Ok(())
    }

    /// Disconnects every live session, then stops accepting.
    ///
    /// Safe to call from any task, also while [`run`](Self::run) is active.
    pub async fn stop(&self) {
        self.disconnect_all().await;
        self.cancel_token.cancel();
        self.listener.lock().await.take();
    }

    /// Handles of all live sessions.
    pub async fn sessions(&self) -> Vec<SessionHandle> {
        self.sessions.read().await.values().cloned().collect()
    }

    pub async fn session_count(&self) -> usize {
        self.sessions.read().await.len()
    }

    async fn handle_connection(&self, stream: TcpStream, client_id: u64) {
        if let Err(e) = stream.set_nodelay(true) {
            warn!(client_id, error = %e, "Failed to disable Nagle's algorithm");
        }

        let (reader, writer) = stream.into_split();
        let session = ClientSession::new(
            client_id,
            reader,
            writer,
            Arc::clone(&self.ctx),
            self.cancel_token.child_token(),
        );

        self.sessions.write().await.insert(client_id, session.handle());
        info!(client_id, "Client connected");

        let sessions = Arc::clone(&self.sessions);
        tokio::spawn(async move {
            session.run().await;

            if sessions.write().await.remove(&client_id).is_some() {
                debug!(client_id, "Removed session");
            }
        });
    }

    async fn disconnect_all(&self) {
        let sessions = self.sessions().await;
        if sessions.is_empty() {
            return;
        }
        info!(count = sessions.len(), "Disconnecting clients");
        join_all(sessions.iter().map(SessionHandle::disconnect)).await;
    }
}

/// Errors that can occur in server operations.
#[derive(Debug, thiserror::Error)]
pub enum ServerError {
    #[error("Failed to bind {addr}: {source}")]
    Bind {
        addr: SocketAddr,
        #[source]
        source: std::io::Error,
    },

    #[error("Server is not listening (already running or stopped)")]
    NotListening,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_server_error_display() {
        let err = ServerError::Bind {
            addr: SocketAddr::from((Ipv4Addr::LOCALHOST, 18082)),
            source: std::io::Error::new(std::io::ErrorKind::AddrInUse, "address in use"),
        };
        assert!(err.to_string().contains("127.0.0.1:18082"));
        assert!(err.to_string().contains("address in use"));
    }

    #[test]
    fn test_not_listening_display() {
        assert!(ServerError::NotListening.to_string().contains("not listening"));
    }
}
