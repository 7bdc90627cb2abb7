use std::error::Error;
use std::path::PathBuf;
use std::time::Instant;

use chrono::{Datelike, Local};
use clap::Parser;
use indicatif::{ProgressBar, ProgressStyle};
use tracing::info;

use fz10_importer::cache::DownloadCache;
use fz10_importer::db;
use fz10_importer::db::RegistrationRepository;
use fz10_importer::importers::excel_importer::DEFAULT_SHEET;
use fz10_importer::importers::{ExcelImporter, KbaDownloader};
use fz10_importer::period::{ReportPeriod, DEFAULT_BASE_URL};
use fz10_importer::pipeline::{ImportOptions, ImportPipeline, ImportSummary};

#[derive(Parser)]
#[command(name = "fz10-importer")]
#[command(about = "Import KBA FZ10 new-registration reports into SQLite", long_about = None)]
struct Cli {
    /// Report year (e.g. 2025); use together with --month
    #[arg(long, requires = "month", conflicts_with = "year_to_date")]
    year: Option<i32>,

    /// Report month (1-12); use together with --year
    #[arg(long, requires = "year", conflicts_with = "year_to_date")]
    month: Option<u32>,

    /// Import every month of the current year up to and including last month
    #[arg(long)]
    year_to_date: bool,

    /// SQLite database file (created on first use)
    #[arg(long, env = "FZ10_DATABASE_PATH", default_value = "fz10.db")]
    database: PathBuf,

    /// Directory holding cached downloads
    #[arg(long, env = "FZ10_CACHE_DIR", default_value = ".fz10-cache")]
    cache_dir: PathBuf,

    /// Destination table
    #[arg(long, default_value = "fz10")]
    table: String,

    /// Worksheet holding the tabular data
    #[arg(long, default_value = DEFAULT_SHEET)]
    sheet: String,

    /// Download location of the monthly workbooks
    #[arg(long, env = "KBA_BASE_URL", default_value = DEFAULT_BASE_URL)]
    base_url: String,

    /// Re-download even when a cached copy exists
    #[arg(long)]
    refresh: bool,

    /// Fetch and parse only; report what would be loaded
    #[arg(long)]
    dry_run: bool,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error>> {
    // Load .env file if it exists (ignore errors if not found)
    let _ = dotenvy::dotenv();

    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();
    let start_time = Instant::now();

    let cache = DownloadCache::open(&cli.cache_dir)?;
    let pool = db::connect(&cli.database).await?;
    let repository = RegistrationRepository::new(pool);
    let downloader = KbaDownloader::with_base_url(cli.base_url.clone());
    let importer = ExcelImporter::new(cli.sheet.as_str());
    let options = ImportOptions {
        refresh: cli.refresh,
        dry_run: cli.dry_run,
    };
    let pipeline = ImportPipeline::new(
        downloader,
        cache,
        repository,
        importer,
        cli.table.as_str(),
        options,
    );

    let summary = if cli.year_to_date {
        let today = Local::now().date_naive();
        info!("Importing year {} through last month", today.year());

        let pb = spinner(format!("Importing {} year to date...", today.year()));
        let summary = pipeline.import_year_to_date(today).await?;
        pb.finish_with_message(format!("✓ {} periods imported", summary.periods.len()));
        summary
    } else {
        let year = cli
            .year
            .ok_or("Specify --year and --month, or --year-to-date")?;
        let month = cli.month.ok_or("--month is required alongside --year")?;
        let period = ReportPeriod::new(year, month)?;

        let pb = spinner(format!("Importing {period}..."));
        let report = pipeline.import_period(period).await?;
        pb.finish_with_message(format!(
            "✓ {} rows written for {period}",
            report.rows_written
        ));
        ImportSummary {
            periods: vec![report],
        }
    };

    if cli.dry_run {
        for report in &summary.periods {
            println!("{}", serde_json::to_string(report)?);
        }
    }

    print_summary(&summary, cli.dry_run, start_time.elapsed());
    Ok(())
}

fn spinner(message: String) -> ProgressBar {
    let pb = ProgressBar::new_spinner();
    pb.set_style(
        ProgressStyle::default_spinner()
            .template("{spinner:.green} {msg}")
            .unwrap(),
    );
    pb.enable_steady_tick(std::time::Duration::from_millis(120));
    pb.set_message(message);
    pb
}

/// Print import summary
fn print_summary(summary: &ImportSummary, dry_run: bool, elapsed: std::time::Duration) {
    println!("\n{}", "=".repeat(60));
    println!("{}", if dry_run { "Dry Run Summary" } else { "Import Summary" });
    println!("{}", "=".repeat(60));

    for report in &summary.periods {
        println!(
            "{}  {:>8} rows  {}",
            report.period,
            if dry_run {
                report.rows_parsed as u64
            } else {
                report.rows_written
            },
            if report.served_from_cache {
                "(cache)"
            } else {
                "(download)"
            }
        );
    }

    println!("{}", "-".repeat(60));
    println!("Periods:            {}", summary.periods.len());
    if dry_run {
        println!("Rows Parsed:        {}", summary.total_rows_parsed());
    } else {
        println!("Rows Written:       {}", summary.total_rows_written());
    }
    println!("Total Time:         {:.2}s", elapsed.as_secs_f64());
    println!("{}", "=".repeat(60));
}
