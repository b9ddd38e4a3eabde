//! Read-only HTTP surface for the custody-fee subsystem, plus the client
//! mirror daemons and wallets use against it.

mod client;
mod error;
mod handlers;
mod routes;

use std::net::SocketAddr;

pub use client::{ClientError, PluginClient};
pub use error::ApiError;
pub use handlers::CoinOutputInfoGet;
pub use routes::{consensus_custodyfees_router, explorer_custodyfees_router, ApiState, ExplorerApiState};

/// Serves a composed router until the process stops.
pub async fn serve(addr: SocketAddr, router: axum::Router) -> Result<(), std::io::Error> {
    let listener = tokio::net::TcpListener::bind(addr).await?;
    tracing::info!(%addr, "custody fee api listening");
    axum::serve(listener, router).await
}
