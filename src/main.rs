//! ldap-token-gateway: LDAP login in, signed token out, token review webhook.
//! Used by: binary entrypoint.

pub mod config;
pub mod directory;
pub mod error;
pub mod handlers;
pub mod server;
pub mod state;
pub mod telemetry;
pub mod token;

use clap::Parser;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    telemetry::init_tracing();

    let settings = config::Cli::parse().into_settings()?;
    tracing::info!(directory = ?settings.directory, "starting ldap-token-gateway");

    if rustls::crypto::ring::default_provider().install_default().is_err() {
        tracing::debug!("rustls crypto provider already installed");
    }

    let state = state::build_state(&settings)?;
    tracing::info!(
        port = settings.server.port,
        health_port = settings.server.health_port,
        tls = settings.server.tls.is_some(),
        "serving /ldapAuth and /authenticate, probes on /healthz"
    );

    server::run(state, &settings.server).await?;
    Ok(())
}
