//! HTTP host for the gateway.
//!
//! A thin axum adapter: launch, role-gated session endpoints, grade posting
//! and a liveness check. Sessions live in memory and expire when idle.

pub mod session;
pub mod transport;

use std::net::SocketAddr;

use crate::gateway::LtiGateway;

/// HTTP server wrapping an [`LtiGateway`].
#[derive(Debug)]
pub struct LtiServer {
    gateway: LtiGateway,
}

impl LtiServer {
    /// Create a new server.
    #[must_use]
    pub const fn new(gateway: LtiGateway) -> Self {
        Self { gateway }
    }

    /// Gateway served by this server.
    #[must_use]
    pub const fn gateway(&self) -> &LtiGateway {
        &self.gateway
    }

    /// Run the server until CTRL+C.
    ///
    /// # Errors
    ///
    /// Returns error on server failure.
    pub async fn run_http(self, port: u16, base_url: Option<String>) -> anyhow::Result<()> {
        tracing::info!("Starting LTI gateway on port {}", port);
        tracing::info!("Serving {} consumer(s)", self.gateway.registry().len());

        let router = transport::create_router(self.gateway, base_url);
        let addr = SocketAddr::from(([0, 0, 0, 0], port));

        tracing::info!("HTTP server listening on http://{}", addr);

        let listener = tokio::net::TcpListener::bind(addr).await?;
        axum::serve(listener, router).with_graceful_shutdown(shutdown_signal()).await?;

        tracing::info!("HTTP server shut down");
        Ok(())
    }
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "Failed to install CTRL+C handler");
        std::future::pending::<()>().await;
    }
    tracing::info!("Received shutdown signal");
}
