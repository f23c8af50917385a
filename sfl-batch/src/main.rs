//! sfl-batch - daily sentiment ingestion job
//!
//! Intended to be started once a day by an external scheduler.

use std::path::PathBuf;
use std::sync::{Arc, Mutex};

use anyhow::{Context, Result};
use chrono::NaiveDate;
use clap::{Parser, Subcommand};
use sfl_batch::pipeline::roll_up_month;
use sfl_batch::{
    BackupSink, DayFetcher, DayProcessor, FsBackupSink, HttpClassifier, HttpFetchSource, IngestPipeline,
    NoopBackupSink, Reprocessor, RetryPolicy, SchedulePolicy,
};
use sfl_common::config::{LoggingConfig, TomlConfig};
use sfl_common::db::init_database;
use sfl_common::scoring::ScoringEngine;
use sfl_common::store::{InMemoryStore, SqliteStore};
use sfl_common::time::LocalTime;
use sfl_common::{Granularity, PeriodLabel, TimeSeriesStore};
use tracing::{error, info};

/// Command-line arguments for sfl-batch
#[derive(Parser, Debug)]
#[command(name = "sfl-batch")]
#[command(about = "Daily sentiment ingestion and rollup job")]
#[command(version)]
struct Args {
    /// Config file (default: $SFL_CONFIG, ~/.config/sfl/config.toml, /etc/sfl/config.toml)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Database path, overrides the config file
    #[arg(short, long, env = "SFL_DATABASE")]
    database: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Ingest one day (default: today minus the configured day delay)
    Run {
        /// Day to ingest (YYYY-MM-DD)
        #[arg(long)]
        date: Option<NaiveDate>,

        /// Write to an in-memory store and skip backups
        #[arg(long)]
        dry_run: bool,
    },

    /// Roll the day buckets of one month up into its month bucket
    RollupMonth {
        /// Month to roll up (YYYY-MM)
        #[arg(long)]
        month: String,
    },

    /// Replay backed-up days into an empty store
    Reprocess {
        /// First day to replay (YYYY-MM-DD)
        #[arg(long)]
        from: Option<NaiveDate>,

        /// Last day to replay (YYYY-MM-DD)
        #[arg(long)]
        to: Option<NaiveDate>,
    },
}

fn init_tracing(logging: &LoggingConfig) -> Result<()> {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .or_else(|_| tracing_subscriber::EnvFilter::try_new(&logging.level))
        .context("Invalid log level")?;

    match &logging.file {
        Some(path) => {
            let file = std::fs::OpenOptions::new()
                .create(true)
                .append(true)
                .open(path)
                .with_context(|| format!("Failed to open log file {}", path.display()))?;
            tracing_subscriber::fmt()
                .with_env_filter(filter)
                .with_ansi(false)
                .with_writer(Mutex::new(file))
                .init();
        }
        None => tracing_subscriber::fmt().with_env_filter(filter).init(),
    }
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let config = TomlConfig::load(args.config.as_deref());
    init_tracing(config.as_ref().map(|c| &c.logging).unwrap_or(&LoggingConfig::default()))?;

    // Log build identification immediately after tracing init
    info!("Starting SFL Batch (sfl-batch) v{}", env!("CARGO_PKG_VERSION"));

    let mut config = config.context("Failed to load configuration")?;
    if let Some(database) = args.database {
        config.database_path = database;
    }

    let result = match args.command {
        Command::Run { date, dry_run } => run(&config, date, dry_run).await,
        Command::RollupMonth { month } => rollup(&config, &month).await,
        Command::Reprocess { from, to } => reprocess(&config, from, to).await,
    };

    if let Err(e) = &result {
        error!("sfl-batch failed: {:#}", e);
    }
    result
}

async fn open_store(config: &TomlConfig) -> Result<Arc<dyn TimeSeriesStore>> {
    info!("Database path: {}", config.database_path.display());
    let pool = init_database(&config.database_path)
        .await
        .context("Failed to initialize database")?;
    Ok(Arc::new(SqliteStore::new(pool)))
}

async fn run(config: &TomlConfig, date: Option<NaiveDate>, dry_run: bool) -> Result<()> {
    let schedule = SchedulePolicy::from_config(&config.schedule)?;
    let today = match date {
        Some(day) => schedule.run_date_for(day),
        None => LocalTime::from_offset_minutes(config.fetch.utc_offset_minutes)?.today(),
    };

    let memory = Arc::new(InMemoryStore::new());
    let (store, backup): (Arc<dyn TimeSeriesStore>, Arc<dyn BackupSink>) = if dry_run {
        info!("Dry run: using in-memory store, backups disabled");
        (memory.clone(), Arc::new(NoopBackupSink))
    } else if config.backup.enabled {
        (open_store(config).await?, Arc::new(FsBackupSink::new(&config.backup.dir)))
    } else {
        (open_store(config).await?, Arc::new(NoopBackupSink))
    };

    let source = Arc::new(HttpFetchSource::from_env(&config.fetch).context("Failed to create fetch source")?);
    let classifier =
        Arc::new(HttpClassifier::from_config(&config.classifier).context("Failed to create classifier")?);
    let fetcher = DayFetcher::from_config(source, &config.fetch)?;

    let pipeline = IngestPipeline::from_config(config, fetcher, classifier, store, backup)?;
    let report = pipeline.run(today).await.context("Ingestion run failed")?;

    info!(
        run_id = %report.run_id,
        day = %report.outcome.day,
        records = report.outcome.records,
        hour_buckets = report.outcome.hour_buckets,
        "✓ Run finished"
    );

    if dry_run {
        for bucket in memory.snapshot().await {
            info!(
                period = %bucket.period,
                positive = bucket.counts.positive,
                neutral = bucket.counts.neutral,
                negative = bucket.counts.negative,
                "Dry run bucket"
            );
        }
    }

    Ok(())
}

async fn rollup(config: &TomlConfig, month: &str) -> Result<()> {
    let month = PeriodLabel::parse(Granularity::Month, month)?;
    let store = open_store(config).await?;
    let retry = RetryPolicy::from(&config.store_retry);

    match roll_up_month(store.as_ref(), &retry, &month).await? {
        Some(bucket) => info!(period = %bucket.period, total = bucket.counts.total(), "✓ Month rolled up"),
        None => info!(month = %month, "No day buckets found, nothing rolled up"),
    }
    Ok(())
}

async fn reprocess(config: &TomlConfig, from: Option<NaiveDate>, to: Option<NaiveDate>) -> Result<()> {
    let store = open_store(config).await?;
    let backup = Arc::new(FsBackupSink::new(&config.backup.dir));
    info!("Backup directory: {}", backup.dir().display());

    let classifier =
        Arc::new(HttpClassifier::from_config(&config.classifier).context("Failed to create classifier")?);
    let processor = DayProcessor::new(
        classifier,
        store,
        ScoringEngine::new(config.scoring)?,
        RetryPolicy::from(&config.store_retry),
    );

    let report = Reprocessor::new(backup, processor)
        .run(from, to)
        .await
        .context("Reprocessing failed")?;

    info!(
        days = report.days.len(),
        months = report.months.len(),
        records = report.total_records(),
        "✓ Reprocessing finished"
    );
    Ok(())
}
