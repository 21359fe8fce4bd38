mod config;
mod db;
mod errors;
mod export;
mod models;
mod resumes;
mod routes;
mod state;
mod store;

use anyhow::Result;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::config::Config;
use crate::db::create_pool;
use crate::export::{HttpPdfRenderer, PdfRenderer, UnconfiguredRenderer};
use crate::routes::build_router;
use crate::state::AppState;
use crate::store::{MemoryResumeStore, PgResumeStore, ResumeStore};

#[tokio::main]
async fn main() -> Result<()> {
    // Load configuration first (fails on malformed env vars)
    let config = Config::from_env()?;

    // Initialize structured logging
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| {
            EnvFilter::new(format!("{}={}", env!("CARGO_PKG_NAME"), &config.rust_log))
        }))
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting Resume API v{}", env!("CARGO_PKG_VERSION"));

    let store: Arc<dyn ResumeStore> = match &config.database_url {
        Some(url) => {
            let pool = create_pool(url, config.database_max_connections).await?;
            Arc::new(PgResumeStore::new(pool))
        }
        None => {
            warn!("DATABASE_URL not set; resumes are kept in memory and lost on restart");
            Arc::new(MemoryResumeStore::new())
        }
    };

    let pdf_renderer: Arc<dyn PdfRenderer> = match &config.pdf_renderer_url {
        Some(url) => {
            let timeout = Duration::from_secs(config.pdf_renderer_timeout_secs);
            let renderer = HttpPdfRenderer::new(url.clone(), timeout)?;
            info!("PDF renderer at {url} (timeout {timeout:?})");
            Arc::new(renderer)
        }
        None => {
            warn!("PDF_RENDERER_URL not set; PDF export is disabled");
            Arc::new(UnconfiguredRenderer)
        }
    };

    info!("Version chain limit: {}", config.version_chain_limit);

    // Build app state
    let state = AppState {
        store,
        pdf_renderer,
        config: config.clone(),
    };

    // Build router
    let app = build_router(state)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive()); // TODO: restrict CORS origins once the frontend host is fixed

    let addr: SocketAddr = format!("0.0.0.0:{}", config.port).parse()?;
    info!("Listening on {addr}");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
