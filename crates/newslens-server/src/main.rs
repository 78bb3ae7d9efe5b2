//! newslens API server binary.
//!
//! Loads configuration, opens the SQLite database, wires the LLM scorer and
//! reanalysis orchestrator, and serves the REST API.

use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use clap::Parser;
use tracing_subscriber::EnvFilter;

use newslens_core::analysis::Reanalyzer;
use newslens_core::cache::ResponseCache;
use newslens_core::config::Config;
use newslens_core::llm::openai_compat::OpenAiCompatScorer;
use newslens_core::llm::ArticleScorer;
use newslens_core::progress::ProgressTracker;
use newslens_core::storage;

use newslens_server::state::AppState;

/// newslens API server — LLM-ensemble political-bias scoring for news.
#[derive(Parser)]
#[command(name = "newslens-server", version, about)]
struct Cli {
    /// Port to listen on (overrides the config file).
    #[arg(long)]
    port: Option<u16>,

    /// Host address to bind to (overrides the config file).
    #[arg(long)]
    host: Option<String>,

    /// Path to the newslens configuration file.
    #[arg(long)]
    config: Option<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let config = Config::load_and_validate(cli.config.as_deref()).map_err(|errors| {
        for error in &errors {
            eprintln!("config: {error}");
        }
        anyhow::anyhow!("invalid configuration ({} errors)", errors.len())
    })?;
    let config = Arc::new(config);

    // Initialize tracing: RUST_LOG wins, the config file level is the
    // fallback.
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(config.logging.level.clone())),
        )
        .init();

    let pool = storage::init_db(&config.storage.db_path).await?;

    let scorer: Arc<dyn ArticleScorer> = Arc::new(OpenAiCompatScorer::new(
        config.llm.base_url.clone(),
        config.llm.api_key.clone(),
        Duration::from_secs(config.llm.http_timeout_secs),
    ));
    let progress = Arc::new(ProgressTracker::new());
    let cache = Arc::new(ResponseCache::new(Duration::from_secs(config.cache.ttl_secs)));

    let reanalyzer = Arc::new(Reanalyzer::new(
        pool.clone(),
        Arc::clone(&scorer),
        Arc::clone(&progress),
        Arc::clone(&cache),
        Arc::clone(&config),
    ));

    let host = cli.host.unwrap_or_else(|| config.server.host.clone());
    let port = cli.port.unwrap_or(config.server.port);

    let state = Arc::new(AppState {
        db: pool,
        scorer,
        progress,
        cache,
        reanalyzer,
    });

    let router = newslens_server::build_router(state);

    let addr = format!("{host}:{port}");
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    tracing::info!(%addr, "newslens server listening");

    axum::serve(listener, router).await?;

    Ok(())
}
