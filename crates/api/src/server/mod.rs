//! HTTP server for the i3X bridge.

pub mod router;
pub mod types;

pub use router::create_router;
pub use types::{ServerState, MAX_REQUEST_BODY_SIZE};

use std::net::SocketAddr;

use tracing::info;

use i3x_core::{Error, Result};

/// Run the server until ctrl-c.
pub async fn run(bind: SocketAddr, state: ServerState) -> Result<()> {
    let router = create_router(state);
    let listener = tokio::net::TcpListener::bind(bind)
        .await
        .map_err(|e| Error::Internal(format!("cannot bind {}: {}", bind, e)))?;
    info!(%bind, "HTTP server listening");

    axum::serve(listener, router)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .map_err(|e| Error::Internal(format!("server error: {}", e)))
}

async fn shutdown_signal() {
    if tokio::signal::ctrl_c().await.is_ok() {
        info!("shutdown signal received");
    }
}
