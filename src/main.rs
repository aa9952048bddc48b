//! Solana Wallet Checker - real-time buyer classification and holder risk reports

use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing::error;

use wallet_checker::cli::commands;
use wallet_checker::config::Config;

/// Solana Wallet Checker
#[derive(Parser)]
#[command(name = "wallet-checker")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Path to config file
    #[arg(short, long, default_value = "config.toml")]
    config: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Watch a token and classify every new buyer
    Monitor {
        /// Token mint address (prompted for if omitted)
        token: Option<String>,

        /// Poll for signatures instead of subscribing over WebSocket
        #[arg(long)]
        poll: bool,
    },

    /// Classify a single wallet
    Analyze {
        /// Wallet address
        wallet: String,

        /// Token mint to leave out of the diversity count
        #[arg(long)]
        exclude: Option<String>,
    },

    /// Risk report for a token's largest holders
    Holders {
        /// Token mint address
        token: String,

        /// Number of holders to analyse
        #[arg(short, long)]
        limit: Option<usize>,

        /// Group holders by overlapping trading history
        #[arg(long)]
        similarity: bool,

        /// Also write the report to this file
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Risk report from a holder CSV export
    Import {
        /// CSV file (Solscan export or similar)
        csv: PathBuf,

        /// Token mint the export belongs to
        #[arg(long)]
        token: Option<String>,

        /// Group holders by overlapping trading history (needs --token)
        #[arg(long)]
        similarity: bool,

        /// Also write the report to this file
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Show current configuration (secrets masked)
    Config,
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load environment variables from .env file
    dotenvy::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("wallet_checker=info".parse()?),
        )
        .with_target(true)
        .init();

    let cli = Cli::parse();

    let config = match Config::load(&cli.config) {
        Ok(cfg) => cfg,
        Err(e) => {
            error!("Failed to load configuration: {:#}", e);
            std::process::exit(1);
        }
    };

    let result = match cli.command {
        Commands::Monitor { token, poll } => commands::monitor(&config, token, poll).await,
        Commands::Analyze { wallet, exclude } => {
            commands::analyze(&config, &wallet, exclude.as_deref()).await
        }
        Commands::Holders {
            token,
            limit,
            similarity,
            output,
        } => commands::holders(&config, &token, limit, similarity, output).await,
        Commands::Import {
            csv,
            token,
            similarity,
            output,
        } => commands::import(&config, &csv, token.as_deref(), similarity, output).await,
        Commands::Config => commands::show_config(&config),
    };

    if let Err(e) = result {
        error!("Command failed: {:#}", e);
        std::process::exit(1);
    }

    Ok(())
}
