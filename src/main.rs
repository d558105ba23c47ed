use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use std::path::Path;
use std::process::ExitCode;
use std::time::Duration;
use tracing::{error, info};
use tracing_subscriber::{EnvFilter, FmtSubscriber};

use sp500_updater::api::YahooClient;
use sp500_updater::models::Config;
use sp500_updater::notify::{SummaryFileWriter, WebhookNotifier};
use sp500_updater::storage::{CsvFileStore, RunLock, TableStore};
use sp500_updater::Updater;

/// Daily S&P 500 opening price updater
#[derive(Parser)]
#[command(name = "sp500-updater")]
#[command(version)]
#[command(about = "Append today's index opening price to a CSV table")]
#[command(long_about = "
Fetches the opening price of the latest trading day and appends it to a CSV
table (date,opening_price), skipping dates that are already present. Meant to
be triggered once a day by an external scheduler; the exit status reports
success or failure of the run.

Examples:
  sp500-updater                       # one sync run
  sp500-updater --csv data/sp500.csv status
  sp500-updater repair                # drop unparseable rows, dedupe, sort
  sp500-updater reset --yes           # back up and empty the table
")]
struct Args {
    /// Path of the CSV table (overrides CSV_PATH)
    #[arg(long, global = true)]
    csv: Option<String>,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Debug, Clone, PartialEq)]
enum Command {
    /// Sync the latest trading day's opening price (default)
    Run,
    /// Rewrite the table keeping only parseable rows
    Repair,
    /// Back up the table to <csv>.bak and replace it with an empty one
    Reset {
        /// Confirm the reset
        #[arg(long)]
        yes: bool,
    },
    /// Print a summary of the stored table without fetching
    Status,
}

fn init_logging() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("sp500_updater=info"));
    let subscriber = FmtSubscriber::builder().with_env_filter(filter).finish();
    tracing::subscriber::set_global_default(subscriber).expect("setting default subscriber failed");
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> ExitCode {
    init_logging();
    let args = Args::parse();

    match execute(args).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("{:#}", e);
            eprintln!("❌ {:#}", e);
            ExitCode::FAILURE
        }
    }
}

async fn execute(args: Args) -> Result<()> {
    let mut config = Config::from_env().context("failed to load configuration")?;
    if let Some(csv) = args.csv {
        config.csv_path = csv;
    }

    match args.command.unwrap_or(Command::Run) {
        Command::Run => run_update(&config).await,
        Command::Repair => repair(&config),
        Command::Reset { yes } => reset(&config, yes),
        Command::Status => status(&config).await,
    }
}

async fn run_update(config: &Config) -> Result<()> {
    let store = CsvFileStore::new(&config.csv_path);
    let _lock = RunLock::acquire(store.lock_path())?;

    let source = YahooClient::new(config)?;
    let mut updater = Updater::new(Box::new(source), Box::new(store), config.market_timezone);

    match &config.webhook_url {
        Some(url) => {
            let timeout = Duration::from_secs(config.webhook_timeout_secs);
            updater = updater.with_sink(Box::new(WebhookNotifier::new(url.as_str(), timeout)?));
        }
        None => info!("📡 No webhook configured, notification skipped"),
    }

    if let Some(summary_path) = &config.summary_path {
        let file_name = Path::new(&config.csv_path)
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| config.csv_path.clone());
        updater = updater.with_sink(Box::new(SummaryFileWriter::new(
            summary_path,
            file_name,
            &config.symbol,
        )));
    }

    let report = updater.run().await?;
    println!(
        "✅ {} opening price for {}: {} ({})",
        config.symbol, report.date, report.price, report.status
    );
    Ok(())
}

fn repair(config: &Config) -> Result<()> {
    let store = CsvFileStore::new(&config.csv_path);
    let _lock = RunLock::acquire(store.lock_path())?;

    let report = store.repair()?;
    println!(
        "🔧 {}: {} rows kept, {} rows dropped, {} duplicates removed",
        config.csv_path,
        report.kept,
        report.skipped.len(),
        report.duplicates_removed
    );
    for issue in &report.skipped {
        println!("   - line {}: {}", issue.line, issue.message);
    }
    Ok(())
}

fn reset(config: &Config, confirmed: bool) -> Result<()> {
    if !confirmed {
        bail!("reset discards every stored row, pass --yes to confirm");
    }

    let store = CsvFileStore::new(&config.csv_path);
    let _lock = RunLock::acquire(store.lock_path())?;

    match store.reset()? {
        Some(backup) => println!("🧹 {} reset, previous contents in {}", config.csv_path, backup.display()),
        None => println!("🧹 {} created empty", config.csv_path),
    }
    Ok(())
}

async fn status(config: &Config) -> Result<()> {
    let store = CsvFileStore::new(&config.csv_path);
    let Some(table) = store.read().await? else {
        println!("📄 No table at {}", config.csv_path);
        return Ok(());
    };

    let summary = table.summary(chrono::Utc::now());
    println!("📊 {}", config.csv_path);
    println!("   records:      {}", summary.record_count);
    match (summary.latest_date, summary.latest_price) {
        (Some(date), Some(price)) => println!("   latest:       {} @ {}", date, price),
        _ => println!("   latest:       -"),
    }
    Ok(())
}
