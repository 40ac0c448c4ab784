use std::sync::Arc;

use anyhow::Result;
use tracing::info;

use tracklane_server::state::AppState;

/// `tracklane health` — liveness probe for Docker HEALTHCHECK.
///
/// Calls `GET http://localhost:$TRACKLANE_PORT/health`.
/// Exits 0 if the server responds with HTTP 200, exits 1 otherwise.
fn run_health_check() -> ! {
    let port = std::env::var("TRACKLANE_PORT").unwrap_or_else(|_| "4000".to_string());
    let url = format!("http://localhost:{}/health", port);
    match ureq::get(&url).call() {
        Ok(resp) if resp.status() == 200 => std::process::exit(0),
        _ => std::process::exit(1),
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    // Health-check subcommand — handled before anything else so the binary
    // stays fast when used as a Docker HEALTHCHECK probe.
    let args: Vec<String> = std::env::args().collect();
    if args.get(1).map(|s| s.as_str()) == Some("health") {
        run_health_check();
    }

    // Structured JSON logging. Level controlled via RUST_LOG.
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("tracklane=info".parse()?),
        )
        .json()
        .init();

    let cfg = tracklane_core::config::Config::from_env().map_err(|e| anyhow::anyhow!(e))?;

    // Ensure the data directory exists before opening DuckDB.
    std::fs::create_dir_all(&cfg.data_dir)?;
    let db_path = format!("{}/tracklane.db", cfg.data_dir);
    let db = tracklane_duckdb::DuckDbBackend::open(&db_path, &cfg.duckdb_memory_limit)?;

    if !std::path::Path::new(&cfg.geoip_path).exists() {
        tracing::warn!(
            geoip_path = %cfg.geoip_path,
            "GeoIP database not found. Clicks will be stored with Unknown geo fields. \
             Point TRACKLANE_GEOIP_PATH at a MaxMind City database to enable lookups."
        );
    }

    let backend: Arc<dyn tracklane_core::backend::TrackingBackend> = Arc::new(db);
    let state = Arc::new(AppState::new(backend, cfg.clone()));

    let addr = format!("0.0.0.0:{}", cfg.port);
    let app = tracklane_server::app::build_app(Arc::clone(&state));

    info!(port = cfg.port, "tracklane listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(async move {
            tokio::signal::ctrl_c().await.ok();
        })
        .await?;

    Ok(())
}
