//! Vellum API server
//!
//! HTTP surface for the PDF ingestion pipeline: intake, job inspection, and
//! health, backed by an embedded background worker.

use std::net::SocketAddr;

use tracing::info;
use vellum_api::routes;
use vellum_config::{ApplicationConfig, Profile};

type MainResult = Result<(), Box<dyn std::error::Error>>;

#[tokio::main]
async fn main() -> MainResult {
    vellum_common::initialize_environment();

    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    info!("starting vellum-api");

    let config = ApplicationConfig::with_profile(Profile::Development);
    info!(
        port = config.api.port,
        database = %config.database.safe_connection_string(),
        "configuration loaded"
    );

    let state = vellum_api::initialize_app_state(&config).await?;
    let app = routes::create_router(state);

    let addr: SocketAddr = format!("{}:{}", config.api.host, config.api.port).parse()?;
    info!(%addr, "listening");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
