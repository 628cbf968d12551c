//! Page-Harvest main entry point
//!
//! This is the command-line interface for submitting extraction jobs and
//! checking service configuration.

use anyhow::{bail, Context};
use clap::{Parser, Subcommand};
use page_harvest::config::{load_config_with_hash, Config, StorageBackend};
use page_harvest::{ExtractionRequest, JobOrchestrator, JobStatus};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing_subscriber::EnvFilter;

/// Page-Harvest: asynchronous content extraction
///
/// Submits a URL for extraction as a background job, follows pagination up to a
/// page budget, and prints the extracted content once the job completes.
#[derive(Parser, Debug)]
#[command(name = "page-harvest")]
#[command(version = "1.0.0")]
#[command(about = "Asynchronous web content extraction", long_about = None)]
struct Cli {
    /// Path to TOML configuration file (defaults apply when omitted)
    #[arg(short, long, value_name = "CONFIG", global = true)]
    config: Option<PathBuf>,

    /// Increase logging verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    /// Suppress non-error output
    #[arg(short, long, conflicts_with = "verbose", global = true)]
    quiet: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run one extraction job and print its result as JSON
    Extract(ExtractArgs),

    /// Validate the configuration and print a summary
    CheckConfig,
}

#[derive(clap::Args, Debug)]
struct ExtractArgs {
    /// Page to extract from
    #[arg(long)]
    url: String,

    /// CSS selector for the content to extract (whole body when omitted)
    #[arg(long)]
    selector: Option<String>,

    /// Collect hyperlinks found in the selected content
    #[arg(long)]
    include_links: bool,

    /// Render the page with JavaScript first
    #[arg(long)]
    use_js: bool,

    /// Seconds to let JavaScript settle before capturing the page
    #[arg(long, default_value_t = 0.0)]
    wait_time: f64,

    /// Follow "next page" links
    #[arg(long)]
    pagination: bool,

    /// Page budget when following pagination
    #[arg(long, default_value_t = 1)]
    max_pages: u32,

    /// Status polling interval in milliseconds
    #[arg(long, default_value_t = 500)]
    poll_ms: u64,
}

impl From<&ExtractArgs> for ExtractionRequest {
    fn from(args: &ExtractArgs) -> Self {
        ExtractionRequest {
            url: args.url.clone(),
            selector: args.selector.clone(),
            include_links: args.include_links,
            use_js: args.use_js,
            wait_time: args.wait_time,
            has_pagination: args.pagination,
            max_pages: args.max_pages,
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    setup_logging(cli.verbose, cli.quiet);

    let config = load(cli.config.as_deref())?;

    match &cli.command {
        Command::Extract(args) => handle_extract(&config, args).await,
        Command::CheckConfig => {
            handle_check_config(&config);
            Ok(())
        }
    }
}

/// Sets up the logging/tracing subscriber based on verbosity level
fn setup_logging(verbose: u8, quiet: bool) {
    let filter = if quiet {
        EnvFilter::new("error")
    } else {
        match verbose {
            0 => EnvFilter::new("page_harvest=info,warn"),
            1 => EnvFilter::new("page_harvest=debug,info"),
            2 => EnvFilter::new("page_harvest=trace,debug"),
            _ => EnvFilter::new("trace"),
        }
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .with_writer(std::io::stderr)
        .init();
}

fn load(path: Option<&Path>) -> anyhow::Result<Config> {
    let Some(path) = path else {
        tracing::info!("No configuration file given, using defaults");
        return Ok(Config::default());
    };

    tracing::info!("Loading configuration from: {}", path.display());
    let (config, hash) = load_config_with_hash(path)
        .with_context(|| format!("Failed to load configuration from {}", path.display()))?;
    tracing::info!("Configuration loaded successfully (hash: {})", hash);

    Ok(config)
}

/// Handles `check-config`: prints the effective configuration
fn handle_check_config(config: &Config) {
    let backend = |backend: StorageBackend| match backend {
        StorageBackend::Memory => "memory",
        StorageBackend::Sqlite => "sqlite",
    };

    println!("=== Page-Harvest Configuration ===\n");

    println!("Service:");
    println!("  Max concurrent jobs: {}", config.service.max_concurrent_jobs);
    println!("  Job record TTL: {}s", config.service.job_ttl_secs);
    match config.service.job_timeout_secs {
        Some(secs) => println!("  Job timeout: {}s", secs),
        None => println!("  Job timeout: none"),
    }

    println!("\nCrawler:");
    println!("  Page delay: {}ms", config.crawler.page_delay_ms);

    println!("\nRenderer:");
    println!("  User agent: {}", config.renderer.user_agent);
    println!("  Timeout: {}s", config.renderer.timeout_secs);
    println!(
        "  Render endpoint: {}",
        config
            .renderer
            .render_endpoint
            .as_deref()
            .unwrap_or("none (plain fetch)")
    );

    println!("\nStorage:");
    println!("  Job records: {}", backend(config.storage.job_backend));
    println!("  Results: {}", backend(config.storage.result_backend));
    if let Some(path) = &config.storage.database_path {
        println!("  Database: {}", path);
    }

    println!("\n✓ Configuration is valid");
}

/// Handles `extract`: submits a job, polls until it is terminal, prints the outcome
async fn handle_extract(config: &Config, args: &ExtractArgs) -> anyhow::Result<()> {
    let orchestrator =
        JobOrchestrator::from_config(config).context("Failed to start orchestrator")?;
    let job_id = orchestrator
        .create(ExtractionRequest::from(args))
        .context("Failed to submit extraction job")?;
    tracing::info!("Submitted job {}", job_id);

    let poll = Duration::from_millis(args.poll_ms.max(10));
    let status = loop {
        tokio::select! {
            _ = tokio::time::sleep(poll) => {}
            _ = tokio::signal::ctrl_c() => {
                tracing::warn!("Interrupted, cancelling job {}", job_id);
                orchestrator.cancel(job_id)?;
            }
        }

        let status = orchestrator.get_status(job_id)?;
        tracing::debug!(
            "Job {}: {} ({}%) {}",
            job_id,
            status.status,
            status.progress,
            status.message
        );
        if status.status.is_terminal() {
            break status;
        }
    };

    orchestrator.shutdown().await;

    if status.status != JobStatus::Completed {
        println!("{}", serde_json::to_string_pretty(&status)?);
        bail!("Job {} ended as {}: {}", job_id, status.status, status.message);
    }

    let result = orchestrator.get_result(job_id)?;
    println!("{}", serde_json::to_string_pretty(&result)?);
    Ok(())
}
