//! `MathduelServer` builder and accept loop.

use std::sync::Arc;

use tokio::net::TcpListener;

use crate::handler::handle_connection;
use crate::service::App;
use crate::{ServerConfig, ServerError};

/// Builder for configuring and starting a Mathduel server.
///
/// # Example
///
/// ```rust,ignore
/// let server = MathduelServer::builder()
///     .bind("0.0.0.0:8080")
///     .build()
///     .await?;
/// server.run().await
/// ```
pub struct MathduelServerBuilder {
    bind_addr: String,
    config: ServerConfig,
}

impl MathduelServerBuilder {
    pub fn new() -> Self {
        Self {
            bind_addr: "127.0.0.1:8080".to_string(),
            config: ServerConfig::default(),
        }
    }

    /// Address to bind the listener to.
    pub fn bind(mut self, addr: &str) -> Self {
        self.bind_addr = addr.to_string();
        self
    }

    /// Grace period before the automatic round advance.
    pub fn advance_delay(mut self, delay: std::time::Duration) -> Self {
        self.config.advance_delay = delay;
        self
    }

    /// Debounce window for presence broadcasts.
    pub fn presence_debounce(mut self, window: std::time::Duration) -> Self {
        self.config.presence_debounce = window;
        self
    }

    /// Retention window for the idle-room sweep.
    pub fn idle_room_ttl(mut self, ttl: std::time::Duration) -> Self {
        self.config.idle_room_ttl = ttl;
        self
    }

    /// Binds the listener and builds the server.
    pub async fn build(self) -> Result<MathduelServer, ServerError> {
        let listener = TcpListener::bind(&self.bind_addr).await?;
        tracing::info!(addr = %self.bind_addr, "listener bound");
        Ok(MathduelServer {
            listener,
            app: App::new(self.config),
        })
    }
}

impl Default for MathduelServerBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// A running Mathduel game server.
pub struct MathduelServer {
    listener: TcpListener,
    app: Arc<App>,
}

impl MathduelServer {
    pub fn builder() -> MathduelServerBuilder {
        MathduelServerBuilder::new()
    }

    /// The locally bound address (useful with port 0 in tests).
    pub fn local_addr(&self) -> std::io::Result<std::net::SocketAddr> {
        self.listener.local_addr()
    }

    /// Shared application handle, for the read-only debug surfaces.
    pub fn app(&self) -> Arc<App> {
        Arc::clone(&self.app)
    }

    /// Runs the accept loop until the process terminates.
    pub async fn run(self) -> Result<(), ServerError> {
        tracing::info!("Mathduel server running");

        loop {
            match self.listener.accept().await {
                Ok((stream, peer)) => {
                    let app = Arc::clone(&self.app);
                    tokio::spawn(async move {
                        if let Err(e) = handle_connection(app, stream, peer).await {
                            tracing::debug!(error = %e, "connection ended with error");
                        }
                    });
                }
                Err(e) => {
                    tracing::error!(error = %e, "accept failed");
                }
            }
        }
    }
}
