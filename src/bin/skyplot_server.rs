//! Sky map REST API server
//!
//! Serves one shared sky map session over HTTP.
//!
//! ## Usage
//!
//! ```bash
//! # Start the server (optionally with a YAML config)
//! SKYPLOT_CONFIG=skyplot.yaml cargo run --bin skyplot_server --features server
//!
//! # Test endpoints
//! curl -X POST http://localhost:3000/api/submit \
//!   -H "Content-Type: application/json" \
//!   -d '{"target_text": "TIC 261136679", "cycle": 1}'
//!
//! curl -X POST http://localhost:3000/api/click \
//!   -H "Content-Type: application/json" \
//!   -d '{"ra": 83.82, "dec": -5.39}'
//!
//! curl http://localhost:3000/api/scene
//! curl http://localhost:3000/api/health
//! ```

use anyhow::Context;
use tower::ServiceBuilder;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::info;

use skyplot::api::{create_router, AppState};
use skyplot::{SceneMap, SkyMapSession, SkyPlotConfig};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load environment variables
    dotenvy::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "skyplot=info,tower_http=debug".into()),
        )
        .init();

    let mut config = match std::env::var("SKYPLOT_CONFIG") {
        Ok(path) => SkyPlotConfig::from_yaml_file(&path)
            .with_context(|| format!("Failed to load config from {}", path))?,
        Err(_) => SkyPlotConfig::default(),
    };
    config
        .apply_overrides(|key| std::env::var(key).ok())
        .context("Invalid SKYPLOT_* environment override")?;

    info!(
        backend = %config.backend_url,
        footprints = %config.footprint_source,
        "Starting sky map session"
    );
    let session = SkyMapSession::from_config(&config, SceneMap::new())
        .context("Failed to build session")?;
    let state = AppState::new(session, config.submit_timeout());

    let app = create_router(state).layer(
        ServiceBuilder::new().layer(TraceLayer::new_for_http()).layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        ),
    );

    let listener = tokio::net::TcpListener::bind(&config.bind_addr)
        .await
        .with_context(|| format!("Failed to bind {}", config.bind_addr))?;
    info!("Server running on http://{}", config.bind_addr);

    axum::serve(listener, app).await.context("Server error")?;

    Ok(())
}
