//! CLI command definitions, routing, and tracing setup.

use std::path::PathBuf;
use std::time::Duration;

use clap::{Parser, Subcommand};
use color_eyre::eyre::{Result, eyre};
use indicatif::{ProgressBar, ProgressStyle};
use pricescrape_core::{ProgressReporter, RunSummary};
use pricescrape_shared::{
    AppConfig, Condition, FetchConfig, IngestConfig, NormalizedItem, StoreConfig, init_config,
    load_config,
};
use pricescrape_storage::Store;
use tracing::info;

// ---------------------------------------------------------------------------
// CLI structure
// ---------------------------------------------------------------------------

/// pricescrape: collect video game resale prices into a local database.
#[derive(Parser)]
#[command(
    name = "pricescrape",
    version,
    about = "Scrape completed-sales price history for a game catalog into a local database.",
    long_about = None,
)]
pub(crate) struct Cli {
    /// Log format: text (default) or json.
    #[arg(long, default_value = "text", global = true)]
    pub log_format: LogFormat,

    /// Verbosity level (-v, -vv, -vvv).
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    #[command(subcommand)]
    pub command: Command,
}

/// Log output format.
#[derive(Clone, Debug, clap::ValueEnum)]
pub(crate) enum LogFormat {
    Text,
    Json,
}

/// Top-level CLI subcommands.
#[derive(Subcommand)]
pub(crate) enum Command {
    /// Rebuild the database from the catalog and scrape sales history.
    ///
    /// With `--resume` the existing database is kept and only the scraped
    /// items' history is replaced.
    Ingest {
        /// Catalog CSV (defaults to `ingest.catalog_path`).
        #[arg(long)]
        catalog: Option<PathBuf>,

        /// URL override table (TOML).
        #[arg(long)]
        overrides: Option<PathBuf>,

        /// Database file (defaults to `store.path`).
        #[arg(long, env = "PRICESCRAPE_DB")]
        db: Option<PathBuf>,

        /// Pause between items, in milliseconds.
        #[arg(long)]
        delay_ms: Option<u64>,

        /// Only scrape these consoles (repeatable).
        #[arg(long = "console")]
        consoles: Vec<String>,

        /// Stop after this many items.
        #[arg(long)]
        limit: Option<usize>,

        /// Keep the existing database instead of rebuilding it.
        #[arg(long)]
        resume: bool,

        /// Write the run summary as JSON to this path.
        #[arg(long)]
        summary_json: Option<PathBuf>,
    },

    /// List consoles with their average catalog prices.
    Consoles {
        #[arg(long, env = "PRICESCRAPE_DB")]
        db: Option<PathBuf>,
    },

    /// List the games of one console.
    Games {
        #[arg(long)]
        console_id: u32,

        #[arg(long, env = "PRICESCRAPE_DB")]
        db: Option<PathBuf>,
    },

    /// Show the sales history of one game.
    History {
        #[arg(long)]
        game_id: u32,

        /// loose, complete, or new (all three when omitted).
        #[arg(long)]
        condition: Option<Condition>,

        #[arg(long, env = "PRICESCRAPE_DB")]
        db: Option<PathBuf>,
    },

    /// Configuration management.
    Config {
        /// Config subcommand.
        #[command(subcommand)]
        action: ConfigAction,
    },
}

/// Config subcommands.
#[derive(Subcommand)]
pub(crate) enum ConfigAction {
    /// Initialize config file with defaults.
    Init,
    /// Show resolved configuration.
    Show,
}

// ---------------------------------------------------------------------------
// Tracing setup
// ---------------------------------------------------------------------------

/// Initialize tracing based on CLI flags.
pub(crate) fn init_tracing(cli: &Cli) {
    use tracing_subscriber::{EnvFilter, fmt};

    let filter = match cli.verbose {
        0 => "pricescrape=info",
        1 => "pricescrape=debug",
        _ => "pricescrape=trace",
    };

    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter));

    match cli.log_format {
        LogFormat::Text => {
            fmt()
                .with_env_filter(env_filter)
                .with_target(false)
                .with_writer(std::io::stderr)
                .init();
        }
        LogFormat::Json => {
            fmt()
                .json()
                .with_env_filter(env_filter)
                .with_writer(std::io::stderr)
                .init();
        }
    }
}

// ---------------------------------------------------------------------------
// Command dispatch
// ---------------------------------------------------------------------------

/// Run the CLI command.
pub(crate) async fn run(cli: Cli) -> Result<()> {
    match cli.command {
        Command::Ingest {
            catalog,
            overrides,
            db,
            delay_ms,
            consoles,
            limit,
            resume,
            summary_json,
        } => {
            let args = IngestArgs {
                catalog,
                overrides,
                db,
                delay_ms,
                consoles,
                limit,
                resume,
            };
            cmd_ingest(args, summary_json).await
        }
        Command::Consoles { db } => cmd_consoles(db).await,
        Command::Games { console_id, db } => cmd_games(console_id, db).await,
        Command::History {
            game_id,
            condition,
            db,
        } => cmd_history(game_id, condition, db).await,
        Command::Config { action } => match action {
            ConfigAction::Init => cmd_config_init().await,
            ConfigAction::Show => cmd_config_show().await,
        },
    }
}

/// `ingest` flags that override the config file.
#[derive(Debug, Default)]
struct IngestArgs {
    catalog: Option<PathBuf>,
    overrides: Option<PathBuf>,
    db: Option<PathBuf>,
    delay_ms: Option<u64>,
    consoles: Vec<String>,
    limit: Option<usize>,
    resume: bool,
}

/// Merge config file values with CLI flags.
fn resolve_ingest(
    config: &AppConfig,
    args: IngestArgs,
) -> (StoreConfig, FetchConfig, IngestConfig) {
    let mut store = StoreConfig::from(config);
    if let Some(db) = args.db {
        store.path = db;
    }

    let mut ingest = IngestConfig::from(config);
    if let Some(catalog) = args.catalog {
        ingest.catalog_path = catalog;
    }
    if args.overrides.is_some() {
        ingest.overrides_path = args.overrides;
    }
    if let Some(ms) = args.delay_ms {
        ingest.item_delay = Duration::from_millis(ms);
    }
    ingest.consoles = args.consoles;
    ingest.limit = args.limit;
    ingest.resume = args.resume;

    (store, FetchConfig::from(config), ingest)
}

fn store_config(db: Option<PathBuf>) -> Result<StoreConfig> {
    let config = load_config()?;
    let mut store = StoreConfig::from(&config);
    if let Some(db) = db {
        store.path = db;
    }
    Ok(store)
}

// ---------------------------------------------------------------------------
// Command handlers
// ---------------------------------------------------------------------------

async fn cmd_ingest(args: IngestArgs, summary_json: Option<PathBuf>) -> Result<()> {
    let config = load_config()?;
    let (store, fetch, ingest) = resolve_ingest(&config, args);

    info!(
        catalog = %ingest.catalog_path.display(),
        db = %store.path.display(),
        delay_ms = ingest.item_delay.as_millis() as u64,
        resume = ingest.resume,
        "starting ingestion"
    );

    let reporter = CliProgress::new();
    let summary = pricescrape_core::ingest(&store, &fetch, &ingest, &reporter).await?;

    print_summary(&summary, &store);

    if let Some(path) = summary_json {
        summary.write_json(&path)?;
        println!("  Summary written to {}", path.display());
    }

    Ok(())
}

fn print_summary(summary: &RunSummary, store: &StoreConfig) {
    println!();
    println!("  Ingestion finished.");
    println!("  Run:        {}", summary.run_id);
    println!("  Database:   {}", store.path.display());
    if summary.resumed {
        println!("  Mode:       resumed");
    }
    println!("  Rows read:  {}", summary.rows_read);
    println!("  Excluded:   {}", summary.excluded.len());
    println!("  Items:      {}", summary.items_loaded);
    println!("  Consoles:   {}", summary.consoles);
    println!("  Committed:  {}", summary.consoles_completed.join(", "));
    println!(
        "  Scraped:    {} attempted, {} succeeded, {} failed",
        summary.items_attempted,
        summary.items_succeeded,
        summary.items_failed()
    );
    println!(
        "  Sales:      {} loose, {} complete, {} new",
        summary.records.loose, summary.records.complete, summary.records.new
    );
    if summary.parse_fallbacks > 0 {
        println!("  Fallbacks:  {} (unexpected page layout)", summary.parse_fallbacks);
    }
    println!("  Time:       {:.1}s", summary.elapsed.as_secs_f64());

    if !summary.failures.is_empty() {
        println!();
        println!("  Failed items:");
        for failure in &summary.failures {
            println!("    #{} {}: {}", failure.game_id, failure.url, failure.error);
        }
    }
    if !summary.condition_failures.is_empty() {
        println!();
        println!("  Dropped conditions:");
        for failure in &summary.condition_failures {
            println!(
                "    #{} {}: {}",
                failure.game_id, failure.condition, failure.error
            );
        }
    }
    println!();
}

async fn cmd_consoles(db: Option<PathBuf>) -> Result<()> {
    let store = Store::open_readonly(&store_config(db)?).await?;
    let consoles = store.list_consoles().await?;
    let averages = store.avg_prices_by_console().await?;

    if consoles.is_empty() {
        println!("No consoles in the database. Run `pricescrape ingest` first.");
        return Ok(());
    }

    println!(
        "{:>4}  {:<28} {:>6} {:>10} {:>10} {:>10}",
        "ID", "CONSOLE", "GAMES", "LOOSE", "COMPLETE", "NEW"
    );
    for console in &consoles {
        let avg = averages.iter().find(|a| a.console == console.console);
        match avg {
            Some(a) => println!(
                "{:>4}  {:<28} {:>6} {:>10.2} {:>10.2} {:>10.2}",
                console.console_id, console.console, a.games, a.avg_loose, a.avg_complete, a.avg_new
            ),
            None => println!("{:>4}  {:<28} {:>6}", console.console_id, console.console, 0),
        }
    }
    Ok(())
}

async fn cmd_games(console_id: u32, db: Option<PathBuf>) -> Result<()> {
    let store = Store::open_readonly(&store_config(db)?).await?;
    let games = store.games_by_console(console_id).await?;

    if games.is_empty() {
        return Err(eyre!("no games found for console id {console_id}"));
    }

    println!(
        "{:>6}  {:<40} {:>10} {:>10} {:>10}",
        "ID", "SLUG", "LOOSE", "COMPLETE", "NEW"
    );
    for game in &games {
        println!(
            "{:>6}  {:<40} {:>10.2} {:>10.2} {:>10.2}",
            game.game_id,
            game.game_url.as_deref().unwrap_or("-"),
            game.loose_val,
            game.complete_val,
            game.new_val
        );
    }
    Ok(())
}

async fn cmd_history(game_id: u32, condition: Option<Condition>, db: Option<PathBuf>) -> Result<()> {
    let store = Store::open_readonly(&store_config(db)?).await?;
    let game = store
        .get_game(game_id)
        .await?
        .ok_or_else(|| eyre!("no game with id {game_id}"))?;

    println!("Game #{} ({})", game.game_id, game.url.as_deref().unwrap_or("-"));

    let conditions: Vec<Condition> = match condition {
        Some(c) => vec![c],
        None => Condition::ALL.to_vec(),
    };

    for condition in conditions {
        let sales = store.sales_history(game_id, condition).await?;
        println!();
        println!("  {condition} ({})", condition.table());
        if sales.is_empty() {
            println!("    no rows");
            continue;
        }
        for sale in &sales {
            if sale.is_placeholder() {
                println!("    no completed sales observed");
            } else {
                println!(
                    "    {:<16} {:>10}",
                    sale.date_sold.as_deref().unwrap_or("-"),
                    sale.price_sold
                );
            }
        }
    }
    Ok(())
}

async fn cmd_config_init() -> Result<()> {
    let path = init_config()?;
    println!("Config initialized at: {}", path.display());
    Ok(())
}

async fn cmd_config_show() -> Result<()> {
    let config: AppConfig = load_config()?;
    let toml_str = toml::to_string_pretty(&config)?;
    println!("{toml_str}");
    Ok(())
}

// ---------------------------------------------------------------------------
// CLI progress reporter
// ---------------------------------------------------------------------------

/// CLI progress reporter using an indicatif spinner.
struct CliProgress {
    spinner: ProgressBar,
}

impl CliProgress {
    fn new() -> Self {
        let spinner = ProgressBar::new_spinner();
        spinner.set_style(
            ProgressStyle::with_template("{spinner:.cyan} {msg}")
                .unwrap_or_else(|_| ProgressStyle::default_spinner())
                .tick_strings(&["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏"]),
        );
        spinner.enable_steady_tick(Duration::from_millis(80));
        Self { spinner }
    }
}

impl ProgressReporter for CliProgress {
    fn phase(&self, name: &str) {
        self.spinner.set_message(name.to_string());
    }

    fn console_started(&self, console: &str, items: usize) {
        self.spinner.println(format!("  {console}: {items} items"));
    }

    fn item_finished(&self, item: &NormalizedItem, ok: bool, current: usize, total: usize) {
        let mark = if ok { "" } else { " (failed)" };
        self.spinner.set_message(format!(
            "Scraping [{current}/{total}] {}{mark}",
            item.item.game
        ));
    }

    fn done(&self, _summary: &RunSummary) {
        self.spinner.finish_and_clear();
    }
}
