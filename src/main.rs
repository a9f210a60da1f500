use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use rankmatch::config::Config;

mod commands;

use commands::{analyze, filter, AnalyzeParams};

#[derive(Parser)]
#[command(
    name = "rankmatch",
    version,
    about = "Match competitor rankings against client keywords for iGaming outreach",
    long_about = None
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// TOML configuration file
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Log format (text, json); overrides the config file
    #[arg(long, global = true)]
    log_format: Option<String>,
}

#[derive(Subcommand)]
enum Commands {
    /// Fetch rankings for in-scope domains and write outreach reports
    Analyze {
        /// Keyword list CSV (path or URL)
        #[arg(short, long)]
        keywords: String,

        /// Domain export CSV (path or URL)
        #[arg(short, long)]
        domains: String,

        /// Output directory
        #[arg(short, long, default_value = "./output")]
        output: PathBuf,

        /// Maximum position counted as a match
        #[arg(short, long)]
        threshold: Option<u32>,

        /// Concurrent ranking requests
        #[arg(long)]
        concurrency: Option<usize>,

        /// Process at most this many in-scope domains
        #[arg(long)]
        max_domains: Option<usize>,

        /// Compare keywords case-insensitively
        #[arg(long, default_value = "false")]
        case_insensitive: bool,
    },

    /// List in-scope domains without calling the ranking API
    Filter {
        /// Domain export CSV (path or URL)
        #[arg(short, long)]
        domains: String,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let config = match &cli.config {
        Some(path) => Config::from_file(path)?,
        None => Config::from_env()?,
    };

    // Initialize tracing/logging
    let format = cli
        .log_format
        .clone()
        .unwrap_or_else(|| config.logging.format.clone());
    setup_tracing(&format, &config.logging.level, cli.verbose)?;

    tracing::info!("rankmatch starting");

    match cli.command {
        Commands::Analyze {
            keywords,
            domains,
            output,
            threshold,
            concurrency,
            max_domains,
            case_insensitive,
        } => {
            tracing::info!(
                keywords = %keywords,
                domains = %domains,
                output = %output.display(),
                threshold = ?threshold,
                concurrency = ?concurrency,
                "Starting analyze command"
            );
            analyze(
                config,
                AnalyzeParams {
                    keywords,
                    domains,
                    output,
                    threshold,
                    concurrency,
                    max_domains,
                    case_insensitive,
                },
            )
            .await?;
        }

        Commands::Filter { domains } => {
            tracing::info!(domains = %domains, "Starting filter command");
            filter(config, domains).await?;
        }
    }

    tracing::info!("rankmatch completed successfully");
    Ok(())
}

fn setup_tracing(format: &str, level: &str, verbose: bool) -> Result<()> {
    let env_filter = if verbose {
        tracing_subscriber::EnvFilter::new("rankmatch=debug,info")
    } else {
        tracing_subscriber::EnvFilter::try_from_default_env()
            .or_else(|_| tracing_subscriber::EnvFilter::try_new(format!("rankmatch={level},warn")))
            .context("Invalid log level")?
    };

    match format {
        "json" => {
            tracing_subscriber::registry()
                .with(env_filter)
                .with(tracing_subscriber::fmt::layer().json())
                .init();
        }
        _ => {
            tracing_subscriber::registry()
                .with(env_filter)
                .with(tracing_subscriber::fmt::layer().pretty())
                .init();
        }
    }

    Ok(())
}
