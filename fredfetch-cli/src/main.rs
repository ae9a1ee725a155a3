//! fredfetch CLI — fetch FRED series and manage the local cache.
//!
//! Commands:
//! - `fetch` — fetch series (cache first), write the batch report as JSON
//! - `cache status` — list cached entries, sizes and observation counts
//! - `cache clear` — remove cached entries for one series or all of them

use anyhow::{bail, Context, Result};
use chrono::NaiveDate;
use clap::{Args, Parser, Subcommand};
use fredfetch_core::config::{API_KEY_ENV, DEFAULT_CACHE_DIR};
use fredfetch_core::data::{
    BatchOrchestrator, BatchReport, CacheStore, ClearScope, DisabledCache, FredClient,
    JsonFileCache, LogProgress, SeriesFetcher,
};
use fredfetch_core::domain::SortOrder;
use fredfetch_core::{resolve_api_key, FetchConfig};
use log::info;
use std::path::{Path, PathBuf};

#[derive(Parser)]
#[command(
    name = "fredfetch",
    about = "fredfetch — fetch economic data series from the FRED API"
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Fetch series from FRED (cache first) and write them to a JSON file.
    Fetch(FetchArgs),
    /// Cache management commands.
    Cache {
        #[command(subcommand)]
        action: CacheAction,
    },
}

#[derive(Args)]
struct FetchArgs {
    /// FRED series IDs to fetch (e.g., SLOAS LNS14027662).
    #[arg(long, num_args = 1..)]
    series: Vec<String>,

    /// JSON or TOML config file with a series list and parameters.
    #[arg(long)]
    config: Option<PathBuf>,

    /// FRED API key (or set FRED_API_KEY).
    #[arg(long)]
    api_key: Option<String>,

    /// Output file path. Defaults to fred_data.json.
    #[arg(long)]
    output: Option<PathBuf>,

    /// Maximum observations per series. Defaults to 1000.
    #[arg(long)]
    limit: Option<u32>,

    /// Sort order: asc or desc. Defaults to asc.
    #[arg(long)]
    sort_order: Option<SortOrder>,

    /// First observation date (YYYY-MM-DD), inclusive.
    #[arg(long)]
    start: Option<NaiveDate>,

    /// Last observation date (YYYY-MM-DD), inclusive.
    #[arg(long)]
    end: Option<NaiveDate>,

    /// Cache directory. Defaults to ./.fred_cache.
    #[arg(long)]
    cache_dir: Option<PathBuf>,

    /// Disable caching (always fetch fresh).
    #[arg(long, default_value_t = false)]
    no_cache: bool,

    /// Clear cached data before fetching.
    #[arg(long, default_value_t = false)]
    clear_cache: bool,

    /// Refetch cache entries older than this many seconds.
    #[arg(long)]
    cache_ttl_secs: Option<u64>,

    /// Request timeout in seconds. Defaults to 30.
    #[arg(long)]
    timeout_secs: Option<u64>,
}

impl FetchArgs {
    /// Overlay command-line values on a config loaded from file.
    fn apply_to(&self, config: &mut FetchConfig) {
        if !self.series.is_empty() {
            config.series = self.series.clone();
        }
        if self.output.is_some() {
            config.output = self.output.clone();
        }
        if self.limit.is_some() {
            config.limit = self.limit;
        }
        if self.sort_order.is_some() {
            config.sort_order = self.sort_order;
        }
        if self.start.is_some() {
            config.observation_start = self.start;
        }
        if self.end.is_some() {
            config.observation_end = self.end;
        }
        if self.cache_dir.is_some() {
            config.cache_dir = self.cache_dir.clone();
        }
        if self.no_cache {
            config.no_cache = true;
        }
        if self.cache_ttl_secs.is_some() {
            config.cache_ttl_secs = self.cache_ttl_secs;
        }
        if self.timeout_secs.is_some() {
            config.timeout_secs = self.timeout_secs;
        }
    }
}

#[derive(Subcommand)]
enum CacheAction {
    /// List cached entries with observation counts and sizes.
    Status {
        /// Cache directory. Defaults to ./.fred_cache.
        #[arg(long, default_value = DEFAULT_CACHE_DIR)]
        cache_dir: PathBuf,
    },
    /// Remove cached entries for one series, or everything.
    Clear {
        /// Only clear this series (default: all series).
        #[arg(long)]
        series: Option<String>,

        /// Cache directory. Defaults to ./.fred_cache.
        #[arg(long, default_value = DEFAULT_CACHE_DIR)]
        cache_dir: PathBuf,
    },
}

fn main() -> Result<()> {
    dotenv::dotenv().ok();
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Fetch(args) => run_fetch(args),
        Commands::Cache { action } => match action {
            CacheAction::Status { cache_dir } => run_cache_status(&cache_dir),
            CacheAction::Clear { series, cache_dir } => run_cache_clear(&cache_dir, series),
        },
    }
}

fn run_fetch(args: FetchArgs) -> Result<()> {
    let mut config = match &args.config {
        Some(path) => FetchConfig::from_file(path)
            .with_context(|| format!("loading config {}", path.display()))?,
        None => FetchConfig::default(),
    };
    args.apply_to(&mut config);

    if config.series.is_empty() {
        bail!("either --series or --config (with a non-empty series list) must be provided");
    }

    let api_key = resolve_api_key(args.api_key.clone(), std::env::var(API_KEY_ENV).ok())?;
    let options = config.fetch_options()?;
    let client = FredClient::with_timeout(api_key, config.timeout())?;

    let cache: Box<dyn CacheStore> = match config.cache_dir() {
        Some(dir) => Box::new(JsonFileCache::new(dir)),
        None => Box::new(DisabledCache),
    };

    if args.clear_cache {
        let (dir, removed) = clear_configured_cache(&config)?;
        info!("Cleared all cached data in {} ({removed} entries)", dir.display());
    }

    info!("Fetching {} series from FRED...", config.series.len());

    let fetcher = SeriesFetcher::new(&client, cache.as_ref()).with_ttl(config.cache_ttl());
    let report = BatchOrchestrator::new(fetcher)
        .with_progress(&LogProgress)
        .fetch_all(config.series.as_slice(), &options);

    let output = config.output();
    write_report(&report, &output)?;
    print_summary(&report, &output);

    Ok(())
}

/// Empty the configured cache directory. `--no-cache` only stops this run from
/// using the cache, so clearing still targets the directory on disk.
fn clear_configured_cache(config: &FetchConfig) -> Result<(PathBuf, usize)> {
    let dir = config
        .cache_dir
        .clone()
        .unwrap_or_else(|| PathBuf::from(DEFAULT_CACHE_DIR));
    let removed = JsonFileCache::new(&dir).clear(&ClearScope::All)?;
    Ok((dir, removed))
}

/// Write the report as pretty JSON: temp file, then rename.
fn write_report(report: &BatchReport, output: &Path) -> Result<()> {
    let json = serde_json::to_string_pretty(report).context("serializing report")?;
    let tmp = output.with_extension("json.tmp");
    std::fs::write(&tmp, json).with_context(|| format!("writing {}", tmp.display()))?;
    std::fs::rename(&tmp, output).with_context(|| format!("writing {}", output.display()))?;
    Ok(())
}

fn print_summary(report: &BatchReport, output: &Path) {
    eprintln!();
    eprintln!("Successfully fetched {} series", report.succeeded_count());
    eprintln!("Output written to: {}", output.display());

    if !report.all_succeeded() {
        eprintln!();
        eprintln!("Failed: {} series", report.failed_count());
        for (series_id, failure) in report.failures() {
            eprintln!("  {series_id}: [{}] {}", failure.kind, failure.message);
        }
    }

    eprintln!();
    eprintln!("Summary:");
    for (series_id, result) in report.successes() {
        eprintln!("  {series_id}: {} observations", result.count());
    }
}

fn run_cache_status(cache_dir: &Path) -> Result<()> {
    if !cache_dir.exists() {
        println!("Cache directory does not exist: {}", cache_dir.display());
        return Ok(());
    }

    let cache = JsonFileCache::new(cache_dir);
    let entries = cache.entries()?;

    if entries.is_empty() {
        println!("Cache is empty: {}", cache_dir.display());
        return Ok(());
    }

    let total_size: u64 = entries.iter().map(|e| e.bytes).sum();

    println!("Cache: {}", cache_dir.display());
    println!("Entries: {}", entries.len());
    println!("Total size: {}", format_size(total_size));
    println!();
    println!(
        "{:<16} {:>7} {:<5} {:<14} {:<26} {:>10}",
        "Series", "Limit", "Sort", "Observations", "Retrieved", "Size"
    );
    println!("{}", "-".repeat(83));
    for entry in &entries {
        let count = match (entry.quarantined, entry.count) {
            (true, _) => "(quarantined)".to_string(),
            (false, Some(n)) => n.to_string(),
            (false, None) => "(corrupt)".to_string(),
        };
        let retrieved = entry
            .retrieved_at
            .map(|t| t.format("%Y-%m-%d %H:%M:%S UTC").to_string())
            .unwrap_or_else(|| "-".into());
        println!(
            "{:<16} {:>7} {:<5} {:<14} {:<26} {:>10}",
            entry.key.series_id(),
            entry.key.limit(),
            entry.key.sort_order(),
            count,
            retrieved,
            format_size(entry.bytes)
        );
    }

    Ok(())
}

fn run_cache_clear(cache_dir: &Path, series: Option<String>) -> Result<()> {
    let cache = JsonFileCache::new(cache_dir);
    let scope = match series {
        Some(id) => ClearScope::Series(id),
        None => ClearScope::All,
    };

    let removed = cache.clear(&scope)?;
    match &scope {
        ClearScope::All => println!("Cleared all cached data ({removed} entries)"),
        ClearScope::Series(id) => println!("Cleared cache for {id} ({removed} entries)"),
    }
    Ok(())
}

fn format_size(bytes: u64) -> String {
    if bytes < 1024 {
        format!("{bytes} B")
    } else if bytes < 1024 * 1024 {
        format!("{:.1} KB", bytes as f64 / 1024.0)
    } else {
        format!("{:.1} MB", bytes as f64 / (1024.0 * 1024.0))
    }
}
