//! Server startup and lifecycle

use crate::{routes, AppState, GatewayConfig};
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio::task::JoinHandle;
use tracing::info;

/// Run the gateway until the process is stopped
pub async fn run_server(config: GatewayConfig) -> anyhow::Result<()> {
    let state = Arc::new(AppState::new(config.clone()));
    let app = routes::create_router(state);

    let addr = config.bind_addr();
    let listener = TcpListener::bind(&addr).await?;

    info!("s3lite gateway listening on http://{}", listener.local_addr()?);
    info!(access_key = %config.access_key, region = %config.region, "Signed requests required");

    axum::serve(listener, app).await?;

    Ok(())
}

/// Run the gateway with graceful shutdown
pub async fn run_server_with_shutdown(
    config: GatewayConfig,
    shutdown_signal: impl std::future::Future<Output = ()> + Send + 'static,
) -> anyhow::Result<()> {
    let state = Arc::new(AppState::new(config.clone()));
    let app = routes::create_router(state);

    let listener = TcpListener::bind(config.bind_addr()).await?;
    info!("s3lite gateway listening on http://{}", listener.local_addr()?);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal)
        .await?;

    info!("Gateway shutdown complete");

    Ok(())
}

/// A gateway running in the background of the current runtime
pub struct TestServer {
    addr: SocketAddr,
    state: Arc<AppState>,
    handle: JoinHandle<()>,
}

impl TestServer {
    /// `host:port` the gateway listens on
    pub fn endpoint(&self) -> String {
        self.addr.to_string()
    }

    /// Base URL, e.g. `http://127.0.0.1:41234`
    pub fn base_url(&self) -> String {
        format!("http://{}", self.addr)
    }

    /// Shared state, for inspecting what the gateway stored
    pub fn state(&self) -> &Arc<AppState> {
        &self.state
    }

    /// Access key the gateway expects
    pub fn access_key(&self) -> &str {
        &self.state.config.access_key
    }

    /// Secret key the gateway expects
    pub fn secret_key(&self) -> &str {
        &self.state.config.secret_key
    }
}

impl Drop for TestServer {
    fn drop(&mut self) {
        self.handle.abort();
    }
}

/// Bind and serve in a background task; returns once the socket is listening
pub async fn spawn(config: GatewayConfig) -> anyhow::Result<TestServer> {
    let state = Arc::new(AppState::new(config.clone()));
    let app = routes::create_router(Arc::clone(&state));

    let listener = TcpListener::bind(config.bind_addr()).await?;
    let addr = listener.local_addr()?;

    let handle = tokio::spawn(async move {
        if let Err(e) = axum::serve(listener, app).await {
            tracing::error!(error = %e, "Gateway stopped");
        }
    });

    Ok(TestServer {
        addr,
        state,
        handle,
    })
}
