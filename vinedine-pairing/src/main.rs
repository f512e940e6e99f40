//! vinedine-pairing - recipe, wine and song pairing service
//!
//! **Module Identity:**
//! - Name: vinedine-pairing
//! - Default bind: 127.0.0.1:5740
//!
//! Serves `POST /api/recipes`, `GET /api/recipes` and `GET /health`.

use anyhow::{Context, Result};
use clap::Parser;
use std::path::PathBuf;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::info;
use tracing_subscriber::EnvFilter;

use vinedine_common::config::{load_config, RootFolderInitializer, RootFolderResolver};
use vinedine_pairing::config::{
    call_deadline, orchestrator_settings, resolve_catalog_credentials, resolve_openai_api_key,
    retry_policy,
};
use vinedine_pairing::db::RecordStore;
use vinedine_pairing::services::{
    CatalogClient, GenerationClient, Orchestrator, OpenAiGenerator, SpotifyCatalog,
};
use vinedine_pairing::AppState;

#[derive(Debug, Parser)]
#[command(name = "vinedine-pairing", version, about = "Recipe, wine and song pairing service")]
struct Args {
    /// TOML configuration file
    #[arg(long, env = "VINEDINE_CONFIG")]
    config: Option<PathBuf>,

    /// Folder holding the database
    #[arg(long)]
    root_folder: Option<PathBuf>,

    /// Listen address, overrides [server] bind
    #[arg(long)]
    bind: Option<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    let (toml_config, config_source) = load_config(args.config.as_deref())?;

    // RUST_LOG overrides the configured level
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&toml_config.logging.level));
    tracing_subscriber::fmt().with_env_filter(filter).init();
    config_source.log();

    info!("Starting vinedine-pairing");
    info!("Version: {}", env!("CARGO_PKG_VERSION"));

    // Step 1: Resolve and create root folder
    let root_folder =
        RootFolderResolver::new(args.root_folder, toml_config.root_folder.clone()).resolve();
    let initializer = RootFolderInitializer::new(root_folder);
    initializer
        .ensure_directory_exists()
        .context("Failed to initialize root folder")?;

    // Step 2: Open or create database
    let db_path = initializer.database_path();
    info!("Database: {}", db_path.display());
    let pool = vinedine_common::db::init_database(&db_path).await?;

    let policy = retry_policy(&toml_config);
    let deadline = call_deadline(&toml_config);
    let store = RecordStore::open(pool, policy.clone()).await?;

    // Step 3: Construct upstream clients
    let api_key = resolve_openai_api_key(&toml_config)?;
    let generator = OpenAiGenerator::from_config(&toml_config.generation, api_key)
        .context("Failed to build generation client")?;
    let generation = GenerationClient::new(Arc::new(generator), policy.clone(), deadline)
        .with_sampling(
            toml_config.generation.temperature,
            toml_config.generation.max_tokens,
        );

    let credentials = resolve_catalog_credentials(&toml_config)?;
    let catalog = SpotifyCatalog::new(
        &toml_config.catalog,
        credentials.client_id,
        credentials.client_secret,
    )
    .context("Failed to build catalog client")?;
    let catalog = CatalogClient::new(Arc::new(catalog), generation.clone(), policy, deadline);

    let settings = orchestrator_settings(&toml_config)?;
    info!(
        strategy = %settings.strategy,
        dispatch = %settings.dispatch,
        seeded = settings.rng_seed.is_some(),
        "Pipeline configured"
    );
    let orchestrator = Orchestrator::new(Arc::new(generation), Arc::new(catalog), store, settings);

    // Step 4: Serve
    let shutdown = CancellationToken::new();
    let state = AppState::new(Arc::new(orchestrator), shutdown.clone());
    let app = vinedine_pairing::build_router(state);

    let bind = args.bind.unwrap_or(toml_config.server.bind);
    let listener = tokio::net::TcpListener::bind(&bind)
        .await
        .with_context(|| format!("Failed to bind {}", bind))?;
    info!("Listening on http://{}", bind);
    info!("Health check: http://{}/health", bind);

    axum::serve(listener, app)
        .with_graceful_shutdown(async move {
            let _ = tokio::signal::ctrl_c().await;
            info!("Shutdown requested, cancelling in-flight requests");
            shutdown.cancel();
        })
        .await?;

    Ok(())
}
