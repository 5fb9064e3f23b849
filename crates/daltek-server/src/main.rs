//! Daltek server binary
//!
//! Reads `config.yaml` (or the file named by `DALTEK_CONFIG`), applies
//! environment overrides and serves the pipeline API.

use std::sync::Arc;

use daltek_ir::Table;
use daltek_server::{logging, router, AppState, Config};
use daltek_sql::StaticRowSource;
use tracing::info;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load environment variables
    dotenvy::dotenv().ok();

    let config_path = std::env::var("DALTEK_CONFIG").unwrap_or_else(|_| "config.yaml".to_string());
    let config = Config::load_or_default(&config_path)?;

    logging::init(&config.logging)?;

    let addr = config.server.addr();
    info!(
        config = %config_path,
        saved_queries = config.saved_queries.len(),
        datasets = config.datasets.len(),
        preview_limit = config.pipeline.preview_limit,
        "configuration loaded"
    );

    let mut source = StaticRowSource::new();
    for (name, rows) in &config.datasets {
        source.add_table(name.clone(), Table::from_records(rows)?);
    }

    let state = AppState::new(config, Arc::new(source))?;
    let app = router(state);

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    info!("Starting daltek server on {}", addr);
    axum::serve(listener, app).await?;

    Ok(())
}
