//! Axum routers and listener setup.
//! Used by: main.

use std::net::SocketAddr;

use axum::routing::{get, post};
use axum::Router;
use axum_server::tls_rustls::RustlsConfig;
use tower_http::trace::TraceLayer;

use crate::config::{ServerConfig, TlsFiles};
use crate::handlers;
use crate::state::AppState;

/// Token issuance and token review.
pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/ldapAuth", post(handlers::issue::issue))
        .route("/authenticate", post(handlers::review::review))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Unauthenticated probes, served on their own port.
pub fn build_health_router(state: AppState) -> Router {
    Router::new()
        .route("/healthz", get(handlers::health::healthz))
        .route("/metrics", get(handlers::metrics::counters))
        .with_state(state)
}

async fn serve_plain(router: Router, addr: SocketAddr) -> std::io::Result<()> {
    let listener = tokio::net::TcpListener::bind(addr).await?;
    tracing::info!("listening on http://{}", addr);
    axum::serve(listener, router).await
}

async fn serve_tls(router: Router, addr: SocketAddr, files: &TlsFiles) -> std::io::Result<()> {
    let config = RustlsConfig::from_pem_file(&files.cert, &files.key).await?;
    tracing::info!("listening on https://{}", addr);
    axum_server::bind_rustls(addr, config)
        .serve(router.into_make_service())
        .await
}

pub async fn run(state: AppState, config: &ServerConfig) -> std::io::Result<()> {
    let api_addr = SocketAddr::from(([0, 0, 0, 0], config.port));
    let health_addr = SocketAddr::from(([0, 0, 0, 0], config.health_port));

    let health = serve_plain(build_health_router(state.clone()), health_addr);
    let api = async {
        let router = build_router(state);
        match &config.tls {
            Some(files) => serve_tls(router, api_addr, files).await,
            None => serve_plain(router, api_addr).await,
        }
    };

    tokio::try_join!(health, api)?;
    Ok(())
}
