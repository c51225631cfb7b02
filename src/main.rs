use anyhow::{Context, Result};
use codesift::config::Config;
use codesift::db::{ChunkStore, Db};
use codesift::embedder::mock::MockEmbedder;
use codesift::indexer::Indexer;
use codesift::report::ComplexityAnalyzer;
use std::sync::Arc;
use tokio::sync::Mutex as TokioMutex;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(std::io::stderr)
        .init();

    // 1. Load config
    let config_path = std::env::var("CODESIFT_CONFIG").unwrap_or_default();
    let config = Config::load(&config_path)?;
    config.validate().context("invalid configuration")?;
    info!("Indexing {}", config.root);

    // 2. Open the chunk store
    std::fs::create_dir_all(config.index_dir())
        .with_context(|| format!("failed to create {}", config.index_dir().display()))?;
    let db = Db::open(config.db_path(), config.model.dimensions).context("Failed to open database")?;
    let store = Arc::new(TokioMutex::new(db));

    // 3. Embedder
    let embedder = Arc::new(MockEmbedder::new(config.model.dimensions));

    // 4. Incremental pass
    let indexer = Indexer::new(store.clone(), embedder, config.indexer_options())?;
    let result = indexer.index(false).await;
    info!("{}", serde_json::to_string(&result)?);
    if !result.success {
        anyhow::bail!(
            "indexing failed: {}",
            result.error.unwrap_or_else(|| "unknown error".to_string())
        );
    }

    // 5. Report
    let chunks = store.lock().await.scan_all().context("failed to read chunks")?;
    let report = ComplexityAnalyzer::new(config.complexity.thresholds.clone()).analyze(&chunks, None);
    println!("{}", serde_json::to_string_pretty(&report)?);

    Ok(())
}
