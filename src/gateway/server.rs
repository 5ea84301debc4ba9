//! Gateway server

use std::net::SocketAddr;
use std::sync::Arc;

use tokio::net::TcpListener;
use tokio::signal;
use tracing::{info, warn};

use super::IdentityGateway;
use super::router::{AppState, create_router};
use crate::config::GatewayConfig;
use crate::{Error, Result};

/// HTTP front for the identity gateway
pub struct Server {
    /// Configuration
    config: GatewayConfig,
    /// Identity provider adapter
    gateway: Arc<IdentityGateway>,
}

impl Server {
    /// Create a new server
    pub fn new(config: GatewayConfig) -> Result<Self> {
        let gateway = Arc::new(IdentityGateway::from_config(config.clone())?);
        Ok(Self { config, gateway })
    }

    /// Run until Ctrl-C
    pub async fn run(self) -> Result<()> {
        let addr = SocketAddr::new(
            self.config
                .server
                .host
                .parse()
                .map_err(|e| Error::Config(format!("Invalid host: {e}")))?,
            self.config.server.port,
        );

        if !self.config.has_decryption_key() {
            warn!("No decryption key configured - get-user-info will fail");
        }

        let app = create_router(Arc::new(AppState {
            gateway: Arc::clone(&self.gateway),
        }));

        let listener = TcpListener::bind(addr).await?;

        info!("============================================================");
        info!("IDENTITY GATEWAY v{}", env!("CARGO_PKG_VERSION"));
        info!("============================================================");
        info!(host = %self.config.server.host, port = %self.config.server.port, "Listening");
        info!(api_base = %self.gateway.api_base(), "Identity provider");
        info!("============================================================");

        axum::serve(listener, app)
            .with_graceful_shutdown(shutdown_signal())
            .await?;

        info!("Gateway shutdown complete");
        Ok(())
    }
}

async fn shutdown_signal() {
    match signal::ctrl_c().await {
        Ok(()) => info!("Shutdown signal received"),
        Err(e) => warn!(error = %e, "Failed to listen for shutdown signal"),
    }
}
