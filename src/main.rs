//! Weibo-Harvest main entry point
//!
//! This is the command-line interface for the Weibo-Harvest feed harvester.

use anyhow::Context;
use chrono::Local;
use clap::Parser;
use std::path::PathBuf;
use weibo_harvest::config::{load_config_with_hash, Config};
use weibo_harvest::crawler::harvest;
use weibo_harvest::dates::MINUTE_FORMAT;
use weibo_harvest::output::print_summary;
use weibo_harvest::targets::{TargetList, TargetSource};
use tracing_subscriber::EnvFilter;

/// Weibo-Harvest: an incremental, polite feed harvester
///
/// Weibo-Harvest pages through the posts of the configured accounts,
/// pauses between pages and accounts, writes posts to the selected
/// outputs and downloads their pictures and videos.
#[derive(Parser, Debug)]
#[command(name = "weibo-harvest")]
#[command(version = "1.0.0")]
#[command(about = "An incremental, polite feed harvester", long_about = None)]
struct Cli {
    /// Path to TOML configuration file
    #[arg(value_name = "CONFIG", default_value = "config.toml")]
    config: PathBuf,

    /// Harvest these account ids instead of the configured list
    #[arg(short = 'u', long = "user-id", value_name = "ID")]
    user_ids: Vec<String>,

    /// Override the output directory from the configuration
    #[arg(long, value_name = "DIR")]
    output_dir: Option<PathBuf>,

    /// Increase logging verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Suppress non-error output
    #[arg(short, long, conflicts_with = "verbose")]
    quiet: bool,

    /// Validate config and show what would be harvested without fetching anything
    #[arg(long)]
    dry_run: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    setup_logging(cli.verbose, cli.quiet);

    tracing::info!("Loading configuration from: {}", cli.config.display());
    let (mut config, config_hash) = match load_config_with_hash(&cli.config) {
        Ok((cfg, hash)) => {
            tracing::info!("Configuration loaded successfully (hash: {})", hash);
            (cfg, hash)
        }
        Err(e) => {
            tracing::error!("Failed to load configuration: {}", e);
            return Err(e.into());
        }
    };

    if let Some(dir) = &cli.output_dir {
        config.output.output_dir = dir.display().to_string();
    }

    let targets = build_targets(&config, &cli.user_ids)?;

    if cli.dry_run {
        handle_dry_run(&config, &targets);
        return Ok(());
    }

    handle_harvest(config, targets, &config_hash).await
}

/// Sets up the logging/tracing subscriber based on verbosity level
fn setup_logging(verbose: u8, quiet: bool) {
    let filter = if quiet {
        EnvFilter::new("error")
    } else {
        match verbose {
            0 => EnvFilter::new("weibo_harvest=info,warn"),
            1 => EnvFilter::new("weibo_harvest=debug,info"),
            2 => EnvFilter::new("weibo_harvest=trace,debug"),
            _ => EnvFilter::new("trace"),
        }
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .init();
}

/// Accounts from the command line win over the configured list
fn build_targets(config: &Config, user_ids: &[String]) -> anyhow::Result<TargetList> {
    let today = Local::now().date_naive();
    if user_ids.is_empty() {
        return TargetList::from_config(&config.crawler, today)
            .context("failed to build the account list");
    }

    let since = config.crawler.since(today)?;
    let end = config.crawler.end()?;
    Ok(TargetList::from_ids(user_ids, since, end))
}

/// Handles the --dry-run mode: shows what would be harvested
fn handle_dry_run(config: &Config, targets: &TargetList) {
    println!("=== Weibo-Harvest Dry Run ===\n");

    println!("Crawler Configuration:");
    println!("  Base URL: {}", config.crawler.base_url);
    println!("  Original posts only: {}", config.crawler.filter);
    println!(
        "  Page jitter: every {}-{} pages, {}-{}s",
        config.crawler.random_wait_pages[0],
        config.crawler.random_wait_pages[1],
        config.crawler.random_wait_seconds[0],
        config.crawler.random_wait_seconds[1]
    );
    for [pages, seconds] in &config.crawler.global_wait {
        println!("  Cooldown: {}s after {} pages", seconds, pages);
    }

    println!("\nOutput:");
    println!("  Directory: {}", config.output.output_dir);
    println!("  Writers: {}", config.output.write_mode.join(", "));
    println!("  Pictures: {}", config.output.pic_download);
    println!("  Videos: {}", config.output.video_download);
    if let Some(sqlite) = &config.sqlite {
        println!("  Database: {}", sqlite.path);
    }

    match targets.source() {
        TargetSource::File(path) => println!("\nAccounts (from {}):", path.display()),
        TargetSource::InMemory => println!("\nAccounts:"),
    }
    for target in targets.targets() {
        println!(
            "  - {} since {} until {}",
            target.account_id,
            target.since_date.format(MINUTE_FORMAT),
            target.end_date
        );
    }

    println!("\n✓ Configuration is valid");
    println!("✓ Would harvest {} accounts", targets.len());
}

/// Handles the main harvest operation
async fn handle_harvest(
    config: Config,
    targets: TargetList,
    config_hash: &str,
) -> anyhow::Result<()> {
    tracing::info!(
        "Harvesting {} accounts into {} ({})",
        targets.len(),
        config.output.output_dir,
        config.output.write_mode.join(", ")
    );

    match harvest(config, targets, config_hash).await {
        Ok(summary) => {
            tracing::info!("Harvest completed successfully");
            print_summary(&summary);
            Ok(())
        }
        Err(e) => {
            tracing::error!("Harvest failed: {}", e);
            Err(e.into())
        }
    }
}
