//! Limn CLI - Command-line interface
//!
//! Usage:
//!   limn extract <path> [--mode MODE] [--config FILE] [--keep-rejected]
//!   limn stats <dir> [--config FILE]
//!   limn signals <path>

use std::io::Read;
use std::path::PathBuf;

use anyhow::Context;
use clap::{Parser, Subcommand};

use limn_core::{ExtractionRequest, StrategyConfig, StrategyMode};
use limn_engine::{ExtractionManager, TextSignals};

#[derive(Parser)]
#[command(name = "limn")]
#[command(about = "Multi-strategy descriptive passage extraction")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Extract descriptions from a text file ("-" reads stdin)
    Extract {
        /// Path to a plain-text file
        path: PathBuf,

        /// Strategy mode override (single, parallel, sequential, ensemble,
        /// adaptive)
        #[arg(long)]
        mode: Option<StrategyMode>,

        /// TOML configuration file
        #[arg(long)]
        config: Option<PathBuf>,

        /// Include below-threshold candidates in the output
        #[arg(long)]
        keep_rejected: bool,
    },
    /// Run adaptive extraction over every .txt file in a directory and
    /// print the per-strategy success statistics
    Stats {
        /// Directory of plain-text files
        dir: PathBuf,

        /// TOML configuration file
        #[arg(long)]
        config: Option<PathBuf>,
    },
    /// Show the adaptive selector's text signals for a file
    Signals {
        /// Path to a plain-text file ("-" reads stdin)
        path: PathBuf,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "warn".into()),
        )
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Extract {
            path,
            mode,
            config,
            keep_rejected,
        } => extract(path, mode, config, keep_rejected).await,
        Commands::Stats { dir, config } => stats(dir, config).await,
        Commands::Signals { path } => {
            let text = read_input(&path)?;
            let signals = TextSignals::analyze(&text);
            println!(
                "{}",
                serde_json::json!({
                    "chars": signals.chars,
                    "pronoun_density": signals.pronoun_density,
                    "proper_noun_density": signals.proper_noun_density,
                    "ambiguity": signals.ambiguity(),
                })
            );
            Ok(())
        }
    }
}

async fn extract(
    path: PathBuf,
    mode: Option<StrategyMode>,
    config_path: Option<PathBuf>,
    keep_rejected: bool,
) -> anyhow::Result<()> {
    let text = read_input(&path)?;

    let mut config = match config_path {
        Some(path) => StrategyConfig::from_file(path)?,
        None => StrategyConfig::default().with_env_override()?,
    };
    if let Some(mode) = mode {
        config.mode = mode;
    }
    if keep_rejected {
        config.scorer.keep_rejected = true;
    }

    let manager = ExtractionManager::builtin(config)?;
    let outcome = manager.extract(ExtractionRequest::new(text)).await?;

    if outcome.degraded {
        tracing::warn!("extraction ran degraded: over half the processor trust weight was unavailable");
    }

    println!("{}", serde_json::to_string_pretty(&outcome)?);
    Ok(())
}

async fn stats(dir: PathBuf, config_path: Option<PathBuf>) -> anyhow::Result<()> {
    let mut config = match config_path {
        Some(path) => StrategyConfig::from_file(path)?,
        None => StrategyConfig::default().with_env_override()?,
    };
    config.mode = StrategyMode::Adaptive;

    let manager = ExtractionManager::builtin(config)?;
    let mut files = 0usize;

    for entry in std::fs::read_dir(&dir)
        .with_context(|| format!("failed to read directory {}", dir.display()))?
    {
        let path = entry?.path();
        if path.extension().and_then(|e| e.to_str()) != Some("txt") {
            continue;
        }
        let text = std::fs::read_to_string(&path)
            .with_context(|| format!("failed to read {}", path.display()))?;
        if text.trim().is_empty() {
            continue;
        }
        let outcome = manager.extract(ExtractionRequest::new(text)).await?;
        tracing::info!(
            file = %path.display(),
            strategy = %outcome.strategy_used,
            descriptions = outcome.descriptions.len(),
            degraded = outcome.degraded,
            "extracted"
        );
        files += 1;
    }

    anyhow::ensure!(files > 0, "no .txt files found in {}", dir.display());
    println!("{}", serde_json::to_string_pretty(&manager.stats_report())?);
    Ok(())
}

fn read_input(path: &PathBuf) -> anyhow::Result<String> {
    if path.as_os_str() == "-" {
        let mut text = String::new();
        std::io::stdin()
            .read_to_string(&mut text)
            .context("failed to read stdin")?;
        Ok(text)
    } else {
        std::fs::read_to_string(path)
            .with_context(|| format!("failed to read {}", path.display()))
    }
}
