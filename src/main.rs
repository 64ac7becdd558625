use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::sync::Arc;
use std::time::Instant;
use swapi_ingest::database_ops::swapi::{ingest, IngestConfig, SwapiClient};
use swapi_ingest::util::{env as env_util, tracing::init_tracing};
use swapi_ingest::{CharacterStore, Db};
use tracing::{info, warn};

#[derive(Parser)]
#[command(name = "swapi_ingest", about = "Load the SWAPI people catalog into Postgres")]
struct Cli {
    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand)]
enum Command {
    /// Ingest every record of the catalog (default)
    Run,
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    env_util::init_env();
    init_tracing()?;

    let cli = Cli::parse();
    match cli.command.unwrap_or(Command::Run) {
        Command::Run => run().await,
    }
}

async fn run() -> Result<()> {
    let config = IngestConfig::from_env()?;
    let database_url = env_util::store_dsn().context("store connection settings")?;
    let max_conns: u32 = env_util::env_parse("DB_MAX_CONNS", 10);

    let db = Arc::new(
        Db::connect(&database_url, max_conns)
            .await
            .context("Db::connect failed")?,
    );
    db.initialize_storage()
        .await
        .context("initialize_storage failed")?;

    let client = Arc::new(SwapiClient::new(env_util::env_parse_opt("HTTP_TIMEOUT_SECS"))?);
    info!(base_url = %config.base_url, chunk_size = config.chunk_size, "starting swapi ingest");

    let t0 = Instant::now();
    let outcome = ingest::run(client, Arc::clone(&db), &config).await;
    db.shutdown_storage().await;

    let summary = outcome.context("swapi ingest failed")?;
    summary.log(t0.elapsed());
    if !summary.is_clean() {
        warn!(
            failures = summary.failures.len(),
            "ingest finished with failed chunks; stored data is partial"
        );
    }
    Ok(())
}
