//! pmm - prompt-guided movie mapper
//!
//! Matches local movie files against TMDb and registers them with Radarr.

use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use pmm_common::config::{self as common_config, AppConfig, DEFAULT_CONFIG_PATH};
use pmm_resolver::config;
use pmm_resolver::models::{ProcessingResult, SessionSummary};
use pmm_resolver::services::{LibraryManager, RadarrClient};
use pmm_resolver::{logging, BatchOrchestrator, NonInteractive, ProcessOptions, TerminalInteraction, UserInteraction};
use tracing::{info, warn};

const LONG_VERSION: &str = concat!(
    env!("CARGO_PKG_VERSION"),
    " (",
    env!("GIT_HASH"),
    " ",
    env!("BUILD_PROFILE"),
    ", built ",
    env!("BUILD_TIMESTAMP"),
    ")"
);

/// Command-line arguments for pmm
#[derive(Parser, Debug)]
#[command(name = "pmm")]
#[command(about = "Prompt-guided movie mapper: match local movies with TMDb and Radarr")]
#[command(version, long_version = LONG_VERSION)]
struct Cli {
    /// Path to configuration file
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Enable verbose (debug) logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Run without making changes to the library
    #[arg(long, global = true)]
    dry_run: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Scan movie files or directories and process them
    #[command(alias = "process")]
    Scan {
        #[arg(required = true)]
        paths: Vec<PathBuf>,

        /// Custom guidance for movie resolution
        #[arg(short, long)]
        prompt: Option<String>,

        /// Use a named prompt profile
        #[arg(long)]
        profile: Option<String>,

        /// Process without interactive prompts
        #[arg(long)]
        batch: bool,

        /// Add movies to Radarr without confirmation
        #[arg(long)]
        auto_add: bool,

        /// Import files after adding
        #[arg(long)]
        auto_import: bool,
    },

    /// Validate configuration and prerequisites
    Validate,

    /// Write a default configuration file
    Init {
        #[arg(short, long, default_value = DEFAULT_CONFIG_PATH)]
        output: PathBuf,

        /// Overwrite an existing file
        #[arg(long)]
        force: bool,
    },

    /// Show configuration and service status
    Status,
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    if let Command::Init { output, force } = &cli.command {
        return match common_config::write_default_config(output, *force) {
            Ok(()) => {
                println!("Configuration file created at: {}", output.display());
                println!("Please edit the configuration file with your API keys and preferences.");
                ExitCode::SUCCESS
            }
            Err(e) => {
                eprintln!("Failed to create configuration: {}", e);
                ExitCode::FAILURE
            }
        };
    }

    let config = match config::load(cli.config.as_deref(), cli.dry_run) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Configuration error: {}", e);
            return ExitCode::FAILURE;
        }
    };

    logging::init(&config.logging, cli.verbose);
    info!(version = LONG_VERSION, "Starting pmm");

    match run(cli.command, config).await {
        Ok(code) => code,
        Err(e) => {
            eprintln!("Error: {:#}", e);
            ExitCode::FAILURE
        }
    }
}

async fn run(command: Command, config: AppConfig) -> Result<ExitCode> {
    match command {
        Command::Scan {
            paths,
            prompt,
            profile,
            batch,
            auto_add,
            auto_import,
        } => {
            let guidance = match config::guidance(&config, prompt.as_deref(), profile.as_deref()) {
                Ok(guidance) => guidance,
                Err(e) => {
                    eprintln!("Configuration error: {}", e);
                    return Ok(ExitCode::FAILURE);
                }
            };

            let mut options = ProcessOptions::from_config(&config);
            options.guidance = guidance;
            options.auto_add |= auto_add;
            options.auto_import |= auto_import;

            let interactive = config.app.interactive && !batch;
            let interaction: Arc<dyn UserInteraction> = if interactive {
                Arc::new(TerminalInteraction::new())
            } else {
                Arc::new(NonInteractive)
            };

            let orchestrator =
                BatchOrchestrator::from_config(config, interaction).context("Failed to initialize service clients")?;
            run_scan(&orchestrator, &paths, &options, batch).await
        }
        Command::Validate => {
            let orchestrator = BatchOrchestrator::from_config(config, Arc::new(NonInteractive))
                .context("Failed to initialize service clients")?;
            let errors = orchestrator.validate_prerequisites().await;
            if errors.is_empty() {
                println!("All prerequisites validated successfully");
                return Ok(ExitCode::SUCCESS);
            }
            for error in &errors {
                println!("✗ {}", error);
            }
            Ok(ExitCode::FAILURE)
        }
        Command::Status => {
            show_status(&config).await;
            Ok(ExitCode::SUCCESS)
        }
        Command::Init { .. } => Ok(ExitCode::SUCCESS),
    }
}

async fn run_scan(
    orchestrator: &BatchOrchestrator,
    paths: &[PathBuf],
    options: &ProcessOptions,
    batch: bool,
) -> Result<ExitCode> {
    let errors = orchestrator.validate_prerequisites().await;
    if !errors.is_empty() {
        for error in &errors {
            eprintln!("✗ {}", error);
        }
        eprintln!("Prerequisites not met");
        return Ok(ExitCode::FAILURE);
    }

    let cancel_token = orchestrator.cancellation_token();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("Interrupt received, pending items will be cancelled");
            cancel_token.cancel();
        }
    });

    if paths.len() == 1 && !batch {
        println!("Processing: {}", paths[0].display());
        let result = orchestrator.process_single(&paths[0], options).await;
        display_result(&result);
    } else {
        println!("Processing {} paths...", paths.len());
        let mut summary = SessionSummary::new();
        orchestrator.process_batch(paths, options, &mut summary).await;
        display_summary(&summary);
    }

    Ok(ExitCode::SUCCESS)
}

async fn show_status(config: &AppConfig) {
    let mark = |ok: bool| if ok { "✓" } else { "✗" };

    println!("pmm {}", LONG_VERSION);
    println!("{}", "=".repeat(40));
    println!("LLM Provider: {}", config.llm.provider.as_str());
    println!("LLM Model: {}", config.llm.model);
    println!("LLM Configured: {}", mark(common_config::is_configured(&config.llm.api_key)));
    println!("TMDb Configured: {}", mark(common_config::is_configured(&config.tmdb.api_key)));
    println!("Radarr Enabled: {}", mark(config.radarr.enabled));
    println!("Selection Strategy: {:?}", config.matching.selection_strategy);
    println!("Retry Attempts: {}", config.app.retry_attempts);
    println!("Dry Run Mode: {}", mark(config.app.dry_run));

    if !config.radarr.enabled {
        return;
    }
    if !common_config::is_configured(&config.radarr.api_key) {
        println!("Radarr Status: ✗ API key not configured");
        return;
    }

    match RadarrClient::new(&config.radarr) {
        Ok(client) => match client.system_status().await {
            Ok(status) => println!("Radarr Status: ✓ {}", status.version),
            Err(e) => println!("Radarr Status: ✗ {}", e),
        },
        Err(e) => println!("Radarr Status: ✗ {}", e),
    }
}

fn display_result(result: &ProcessingResult) {
    println!("Status: {}", result.status);
    if let Some(resolution) = &result.resolution {
        let movie = &resolution.chosen_entry;
        println!("Movie: {}", movie.display_title());
        println!("TMDb ID: {}", movie.external_id);
        println!("Confidence: {:.2}", resolution.confidence);
    }
    if let Some(action) = result.library_action {
        println!("Radarr Action: {}", action);
    }
    if !result.imports.is_empty() {
        println!("Files Imported: {}/{}", result.files_imported_count(), result.imports.len());
        for failed in result.imports.iter().filter(|i| !i.imported) {
            println!(
                "  ✗ {}: {}",
                failed.source_path.display(),
                failed.error.as_deref().unwrap_or("unknown error")
            );
        }
    }
    if let Some(url) = &result.tmdb_url {
        println!("TMDb: {}", url);
    }
    if let Some(url) = &result.library_url {
        println!("Radarr: {}", url);
    }
    if let Some(message) = &result.error_message {
        eprintln!("Error: {}", message);
    }
}

fn display_summary(summary: &SessionSummary) {
    println!();
    println!("Session Summary");
    println!("{}", "=".repeat(20));
    println!("Total Processed: {}", summary.total_processed);
    println!("Successful: {}", summary.successful);
    println!("Requires Review: {}", summary.requires_review);
    println!("Failed: {}", summary.failed);
    println!("Skipped: {}", summary.skipped);
    println!("Cancelled: {}", summary.user_cancelled);
    println!("Success Rate: {:.1}%", summary.success_rate());
    println!("Movies Added: {}", summary.added);
    println!("Already In Library: {}", summary.existed);
    println!("Files Imported: {}", summary.files_imported);
    println!("Total Time: {:.1}s", summary.wall_clock_seconds);

    for result in summary.results.iter().filter(|r| r.error_message.is_some()) {
        println!(
            "  [{}] {}: {}",
            result.status,
            result.source_path.display(),
            result.error_message.as_deref().unwrap_or_default()
        );
    }
}
