//! `Server` builder and accept loop.
//!
//! This is the entry point for running a Slipstream hub. It ties the
//! layers together: transport → protocol → hub → store. The credential
//! service and the keyed store are injected by the embedder; the server
//! never conjures keys or storage out of thin air.

use std::sync::Arc;
use std::time::Duration;

use slipstream_credential::CredentialService;
use slipstream_hub::{Hub, HubConfig};
use slipstream_store::{KeyedStore, OwnershipPolicy, StateRepository};
use slipstream_transport::{Transport, WebSocketTransport};

use crate::SlipstreamError;
use crate::handler::handle_connection;

/// Server settings.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Address to bind the WebSocket listener to.
    pub bind_addr: String,

    /// How long a fresh connection has to deliver its first frame (the
    /// hello) before it is closed.
    pub handshake_timeout: Duration,

    /// Hub behavior settings.
    pub hub: HubConfig,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_addr: "127.0.0.1:8080".to_string(),
            handshake_timeout: Duration::from_secs(5),
            hub: HubConfig::default(),
        }
    }
}

/// Builder for configuring and starting a Slipstream server.
///
/// # Example
///
/// ```rust,ignore
/// let server = ServerBuilder::new()
///     .bind("0.0.0.0:8080")
///     .build(credentials, MemoryStore::new())
///     .await?;
/// server.run().await
/// ```
pub struct ServerBuilder {
    config: ServerConfig,
    policy: OwnershipPolicy,
}

impl ServerBuilder {
    /// Creates a new builder with default settings.
    pub fn new() -> Self {
        Self {
            config: ServerConfig::default(),
            policy: OwnershipPolicy::default(),
        }
    }

    /// Sets the address to bind the server to.
    pub fn bind(mut self, addr: &str) -> Self {
        self.config.bind_addr = addr.to_string();
        self
    }

    /// Sets the handshake timeout.
    pub fn handshake_timeout(mut self, timeout: Duration) -> Self {
        self.config.handshake_timeout = timeout;
        self
    }

    /// Sets the hub configuration.
    pub fn hub_config(mut self, hub: HubConfig) -> Self {
        self.config.hub = hub;
        self
    }

    /// Sets the ownership policy (admin identity).
    pub fn ownership(mut self, policy: OwnershipPolicy) -> Self {
        self.policy = policy;
        self
    }

    /// Binds the transport and assembles the hub over the given
    /// credential service and keyed store.
    pub async fn build<S: KeyedStore>(
        self,
        credentials: CredentialService,
        store: S,
    ) -> Result<Server<S>, SlipstreamError> {
        let transport =
            WebSocketTransport::bind(&self.config.bind_addr).await?;

        let hub = Arc::new(Hub::new(
            credentials,
            StateRepository::new(store),
            self.policy,
            self.config.hub,
        ));

        Ok(Server {
            transport,
            hub,
            handshake_timeout: self.config.handshake_timeout,
        })
    }
}

impl Default for ServerBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// A running Slipstream server.
///
/// Call [`run()`](Self::run) to start accepting connections.
pub struct Server<S: KeyedStore> {
    transport: WebSocketTransport,
    hub: Arc<Hub<S>>,
    handshake_timeout: Duration,
}

impl<S: KeyedStore> Server<S> {
    /// Creates a new builder.
    pub fn builder() -> ServerBuilder {
        ServerBuilder::new()
    }

    /// Returns the local address the server is bound to.
    pub fn local_addr(&self) -> std::io::Result<std::net::SocketAddr> {
        self.transport.local_addr()
    }

    /// A handle to the hub, for introspection or embedding.
    pub fn hub(&self) -> Arc<Hub<S>> {
        Arc::clone(&self.hub)
    }

    /// Runs the server accept loop.
    ///
    /// Accepts incoming connections and spawns a handler task for each.
    /// Runs until the process is terminated.
    pub async fn run(mut self) -> Result<(), SlipstreamError> {
        tracing::info!("Slipstream hub running");

        loop {
            match self.transport.accept().await {
                Ok(conn) => {
                    let hub = Arc::clone(&self.hub);
                    let timeout = self.handshake_timeout;
                    tokio::spawn(handle_connection(conn, hub, timeout));
                }
                Err(e) => {
                    tracing::error!(error = %e, "accept failed");
                }
            }
        }
    }
}
