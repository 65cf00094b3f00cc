//! WebTransport server
//!
//! Each session opens one bidirectional stream. Frames read from it go to a
//! [`ConnectionSession`]; a writer task drains the connection's outbound
//! queue onto the send half. If the writer stops, the session ends and the
//! player is disconnected from their room.

use std::net::SocketAddr;
use std::sync::Arc;

use tokio::sync::mpsc;
use tracing::{debug, info, warn};
use wtransport::endpoint::IncomingSession;
use wtransport::Endpoint;

use crate::config::ServerConfig;
use crate::lobby::RoomRegistry;
use crate::metrics::Metrics;
use crate::net::framing::{read_message, write_json, FramingError};
use crate::net::gateway::ConnectionSession;
use crate::net::protocol::ServerMessage;
use crate::net::tls::TlsConfig;

/// WebTransport server
pub struct WebTransportServer {
    config: ServerConfig,
    tls_config: TlsConfig,
    registry: RoomRegistry,
}

impl WebTransportServer {
    pub fn new(config: ServerConfig, tls_config: TlsConfig, registry: RoomRegistry) -> Self {
        Self {
            config,
            tls_config,
            registry,
        }
    }

    /// Get the certificate hash for client configuration
    pub fn cert_hash(&self) -> &str {
        &self.tls_config.cert_hash
    }

    pub fn bind_addr(&self) -> SocketAddr {
        SocketAddr::new(self.config.bind_address, self.config.port)
    }

    /// Accept sessions until the endpoint fails
    pub async fn run(self) -> anyhow::Result<()> {
        let builder = wtransport::ServerConfig::builder();
        // Unspecified address: bind dual-stack
        let builder = if self.config.bind_address.is_unspecified() {
            builder.with_bind_default(self.config.port)
        } else {
            builder.with_bind_address(self.bind_addr())
        };
        let server_config = builder.with_identity(self.tls_config.identity).build();

        let server = Endpoint::server(server_config)?;
        info!("WebTransport server listening on port {}", self.config.port);

        loop {
            let incoming = server.accept().await;
            let registry = self.registry.clone();

            tokio::spawn(async move {
                if let Err(e) = handle_connection(incoming, registry).await {
                    warn!("Connection error: {}", e);
                }
            });
        }
    }
}

async fn handle_connection(incoming: IncomingSession, registry: RoomRegistry) -> anyhow::Result<()> {
    let session_request = incoming.await?;
    debug!(
        "New session from {}, path {}",
        session_request.authority(),
        session_request.path()
    );

    let connection = session_request.accept().await?;
    let (mut send, mut recv) = connection.accept_bi().await?;

    let metrics = Arc::clone(registry.metrics());
    Metrics::incr(&metrics.connections_active);

    let (tx, mut rx) = mpsc::unbounded_channel::<ServerMessage>();
    let writer_metrics = Arc::clone(&metrics);
    let mut writer = tokio::spawn(async move {
        while let Some(message) = rx.recv().await {
            match write_json(&mut send, &message).await {
                Ok(bytes) => writer_metrics.record_sent(bytes),
                Err(e) => {
                    warn!("Stream write error: {}", e);
                    return;
                }
            }
        }
    });

    // A dead writer ends the session so the room sees a disconnect
    let mut session = ConnectionSession::new(registry, tx);
    let result = loop {
        tokio::select! {
            read = read_message(&mut recv) => match read {
                Ok(frame) => {
                    metrics.record_received(frame.len());
                    session.handle_frame(&frame).await;
                }
                Err(FramingError::ConnectionClosed) => break Ok(()),
                Err(FramingError::MessageTooLarge(len, max)) => {
                    warn!("Closing connection after oversized frame: {} bytes (max {})", len, max);
                    break Ok(());
                }
                Err(e) => break Err(e),
            },
            _ = &mut writer => {
                warn!("Closing connection after writer stopped");
                break Ok(());
            }
        }
    };

    session.close().await;
    drop(session);
    writer.abort();
    Metrics::decr(&metrics.connections_active);
    debug!("Session closed");

    Ok(result?)
}
