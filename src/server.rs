//! TCP server for the line echo protocol.
//!
//! Accepts connections one at a time and hands each to its own task running
//! the echo control loop. Connection tasks are not joined; a failure in one
//! is logged and goes no further.

use crate::config::Config;
use crate::protocols::echo::{self, ConnectionError};
use crate::runtime::{AdapterError, EventListener, ListenerAdapter, TokioListener};
use std::io;
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::Semaphore;
use tracing::{debug, error, info, trace};

/// Fatal server failure.
#[derive(Debug, Error)]
pub enum ServerError {
    #[error("failed to bind: {0}")]
    Bind(#[from] io::Error),
    #[error("accept failed: {0}")]
    Accept(#[from] AdapterError),
}

fn is_disconnect(e: &AdapterError) -> bool {
    matches!(
        e.io_kind(),
        Some(io::ErrorKind::ConnectionReset | io::ErrorKind::BrokenPipe)
    )
}

/// Server instance
pub struct Server {
    config: Config,
    connection_limit: Arc<Semaphore>,
}

impl Server {
    /// Create a new server instance
    pub fn new(config: Config) -> Self {
        let connection_limit = Arc::new(Semaphore::new(config.max_connections));
        Server {
            config,
            connection_limit,
        }
    }

    /// Bind the configured address.
    pub fn bind(&self) -> Result<ListenerAdapter<TokioListener>, ServerError> {
        let listener = TokioListener::bind(self.config.listen_addr())?;
        Ok(ListenerAdapter::new(listener))
    }

    /// Bind and begin accepting connections. Returns only on a fatal
    /// listener error.
    pub async fn run(&self) -> Result<(), ServerError> {
        let listener = self.bind()?;
        self.serve(listener).await
    }

    /// Accept connections from `listener` until it fails.
    pub async fn serve<L: EventListener>(
        &self,
        listener: ListenerAdapter<L>,
    ) -> Result<(), ServerError> {
        info!(address = %listener.local_addr(), "Server listening");
        let max_line_length = self.config.max_line_length;

        loop {
            // Wait for a connection slot
            let permit = self
                .connection_limit
                .clone()
                .acquire_owned()
                .await
                .map_err(|_| AdapterError::Closed)?;

            let conn = match listener.accept().await {
                Ok(conn) => conn,
                Err(e) => {
                    error!(error = %e, "Failed to accept connection");
                    return Err(e.into());
                }
            };

            let peer = conn.peer_addr();
            debug!(
                peer = ?peer,
                available = self.available_connections(),
                "New connection"
            );

            tokio::spawn(async move {
                match echo::handle_connection(conn, max_line_length).await {
                    Ok(exit) => trace!(peer = ?peer, ?exit, "Connection finished"),
                    Err(ConnectionError::Adapter(e)) if is_disconnect(&e) => {
                        trace!(peer = ?peer, error = %e, "Peer dropped connection")
                    }
                    Err(e) => debug!(peer = ?peer, error = %e, "Connection error"),
                }
                drop(permit);
            });
        }
    }

    /// Connection slots currently free.
    pub fn available_connections(&self) -> usize {
        self.connection_limit.available_permits()
    }
}
