use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use clap::{Parser, Subcommand};
use player_count::{
    config::{Config, StorageConfig, read_config_file},
    orchestrator::{AggregationSettings, Orchestrator, RunReport},
    provider::HttpStatsProvider,
    storage::{MemoryStore, MetricStore},
    util::get_config_path,
};
use tracing::{info, level_filters::LevelFilter, trace, warn};
use tracing_subscriber::{filter, layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Debug, Clone, Parser)]
struct Args {
    /// Config file (defaults to $PLAYER_COUNT_CONFIG or ./player-count.json)
    #[arg(short, long)]
    file: Option<String>,

    /// Increase log verbosity (-v info, -vv debug, -vvv trace)
    #[arg(short, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Clone, Subcommand)]
enum Command {
    /// Fetch today's player count for every tracked application
    Daily,
    /// Aggregate last month's samples into monthly summaries
    Monthly,
    /// Retry every queued daily failure
    Recovery,
}

fn init(verbose: u8) {
    let level = match verbose {
        0 => LevelFilter::WARN,
        1 => LevelFilter::INFO,
        2 => LevelFilter::DEBUG,
        _ => LevelFilter::TRACE,
    };
    let filter = filter::Targets::new().with_targets(vec![
        ("player_count", level),
        ("sqlx", LevelFilter::WARN),
    ]);
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::fmt::layer()
                .with_writer(std::io::stderr)
                .compact()
                .with_ansi(false),
        )
        .with(filter)
        .init();
}

async fn open_store(config: &StorageConfig) -> anyhow::Result<Arc<dyn MetricStore>> {
    match config {
        StorageConfig::None => {
            warn!("using in-memory store, nothing will be persisted");
            Ok(Arc::new(MemoryStore::new()))
        }
        #[cfg(feature = "storage-sqlite")]
        StorageConfig::Sqlite { path } => {
            let store = player_count::storage::sqlite::SqliteStore::new(path).await?;
            Ok(Arc::new(store))
        }
        #[cfg(not(feature = "storage-sqlite"))]
        StorageConfig::Sqlite { .. } => {
            anyhow::bail!("built without SQLite support, use the \"none\" backend")
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenv::dotenv().ok();

    let args = Args::parse();
    init(args.verbose);
    trace!("started with args: {args:?}");

    let path = args.file.clone().unwrap_or_else(get_config_path);
    let config: Config = read_config_file(&path)?.with_env_overrides();

    let store = open_store(&config.storage).await?;

    let health = store.health_check().await?;
    if !health.healthy {
        anyhow::bail!("metric store unavailable: {}", health.message);
    }

    for application in &config.applications {
        store.add_application(application.clone()).await?;
    }
    info!("registered {} configured applications", config.applications.len());

    let provider = HttpStatsProvider::new(
        config.provider.base_url.clone(),
        Duration::from_secs(config.provider.timeout_secs),
    )?;

    let orchestrator = Orchestrator::new(
        store.clone(),
        Arc::new(provider),
        AggregationSettings::from(&config.aggregation),
    );

    let report: RunReport = match args.command {
        Command::Daily => orchestrator.run_daily(Utc::now()).await,
        Command::Monthly => orchestrator.run_monthly(Utc::now()).await,
        Command::Recovery => orchestrator.run_recovery().await,
    };

    info!("REPORT: {report}");
    println!("{report}");

    store.close().await?;

    Ok(())
}
