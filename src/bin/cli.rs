//! vigie CLI
//!
//! Local execution entry point. The `sync` subcommand is what the external
//! scheduler invokes once per cadence; the query subcommands back the
//! read-only query surface over the persisted dataset.

use std::path::PathBuf;

use chrono::NaiveDate;
use clap::{Parser, Subcommand};
use vigie::{
    config::Config,
    error::{AppError, Result},
    notify::{FeedChannel, MailChannel, NotificationChannel},
    pipeline::{HttpFetcher, SyncPipeline},
    storage::{CheckpointFile, SearchField, SqliteStore},
};

/// vigie - Montréal food-safety violation watcher
#[derive(Parser, Debug)]
#[command(
    name = "vigie",
    version,
    about = "Watches the published violations dataset and notifies on new prosecutions"
)]
struct Cli {
    /// Path to the TOML configuration file
    #[arg(short, long, default_value = "config.toml")]
    config: PathBuf,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run one sync attempt: fetch, diff, notify, persist, checkpoint
    Sync,

    /// List violations in a date period, optionally for one establishment
    Query {
        /// Period start (YYYY-MM-DD)
        #[arg(long)]
        from: String,

        /// Period end (YYYY-MM-DD)
        #[arg(long)]
        to: String,

        /// Restrict to one establishment name
        #[arg(long)]
        establishment: Option<String>,
    },

    /// Substring search over one field of the dataset
    Search {
        /// Field to search: etablissement, proprietaire or rue
        field: String,

        /// Search term (minimum 3 characters)
        term: String,
    },

    /// Establishments ranked by violation count, descending
    Establishments,

    /// Validate the configuration file
    Validate,

    /// Show snapshot and checkpoint status
    Info,
}

/// Initialize logging based on verbosity flag.
fn init_logging(verbose: bool) {
    let level = if verbose { "debug" } else { "info" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level))
        .format_timestamp_secs()
        .init();
}

/// Validate a date period: both bounds required, ISO 8601, start ≤ end.
fn validate_period(from: &str, to: &str) -> Result<()> {
    let start = NaiveDate::parse_from_str(from, "%Y-%m-%d")
        .map_err(|_| AppError::validation("dates must be in YYYY-MM-DD format"))?;
    let end = NaiveDate::parse_from_str(to, "%Y-%m-%d")
        .map_err(|_| AppError::validation("dates must be in YYYY-MM-DD format"))?;
    if start > end {
        return Err(AppError::validation(
            "the period start must be on or before the period end",
        ));
    }
    Ok(())
}

/// Build the channel list from configuration; absent sections are skipped
/// with a logged reason.
fn build_channels(config: &Config) -> Vec<Box<dyn NotificationChannel>> {
    let mut channels: Vec<Box<dyn NotificationChannel>> = Vec::new();

    match &config.mail {
        Some(mail) => channels.push(Box::new(MailChannel::new(mail.clone()))),
        None => log::info!("Mail channel not configured; skipping"),
    }
    match &config.feed {
        Some(feed) => channels.push(Box::new(FeedChannel::new(feed.clone()))),
        None => log::info!("Feed channel not configured; skipping"),
    }

    channels
}

/// Run one sync attempt over the configured dependencies.
async fn run_sync(config: &Config) -> Result<()> {
    let fetcher = HttpFetcher::from_config(&config.source)?;
    let store = SqliteStore::open(&config.storage.database).await?;
    let checkpoint = CheckpointFile::new(&config.storage.known_ids);
    let channels = build_channels(config);

    let pipeline = SyncPipeline::new(Box::new(fetcher), Box::new(store), checkpoint, channels);
    let report = pipeline.run().await?;

    log::info!(
        "Run finished: {} rows persisted, {} new, checkpoint {}",
        report.record_count,
        report.new_count,
        if report.checkpoint_saved {
            "saved"
        } else {
            "NOT saved"
        }
    );
    for outcome in &report.channels {
        match &outcome.result {
            Ok(()) => log::info!("Channel '{}': delivered", outcome.channel),
            Err(e) => log::warn!("Channel '{}': {}", outcome.channel, e),
        }
    }

    Ok(())
}

/// Main entry point for the CLI application.
#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let config = Config::load_or_default(&cli.config);

    match cli.command {
        Command::Sync => run_sync(&config).await?,

        Command::Query {
            from,
            to,
            establishment,
        } => {
            validate_period(&from, &to)?;
            let store = SqliteStore::open(&config.storage.database).await?;

            let rows = match establishment {
                Some(name) => store.by_establishment(&name, &from, &to).await?,
                None => store.by_date_range(&from, &to).await?,
            };
            if rows.is_empty() {
                log::warn!("No violations found for the given period");
            }
            println!("{}", serde_json::to_string_pretty(&rows)?);
        }

        Command::Search { field, term } => {
            let field = SearchField::from_name(&field).ok_or_else(|| {
                AppError::validation("search field must be etablissement, proprietaire or rue")
            })?;
            let store = SqliteStore::open(&config.storage.database).await?;

            let rows = store.search(field, &term).await?;
            println!("{}", serde_json::to_string_pretty(&rows)?);
        }

        Command::Establishments => {
            let store = SqliteStore::open(&config.storage.database).await?;
            let ranked = store.establishments_by_violation_count().await?;
            println!("{}", serde_json::to_string_pretty(&ranked)?);
        }

        Command::Validate => {
            log::info!("Validating configuration from {}", cli.config.display());
            let config = Config::load(&cli.config)?;
            config.validate()?;
            log::info!("✓ Config OK");
        }

        Command::Info => {
            let store = SqliteStore::open(&config.storage.database).await?;
            let count = store.count().await?;
            let checkpoint = CheckpointFile::new(&config.storage.known_ids);
            let known = checkpoint.load().await?;

            log::info!(
                "Dataset: {} rows in {}",
                count,
                config.storage.database.display()
            );
            log::info!(
                "Checkpoint: {} identity keys in {}",
                known.len(),
                config.storage.known_ids.display()
            );
        }
    }

    Ok(())
}
