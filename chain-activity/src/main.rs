//! Chain Activity CLI
//!
//! Inspect wallet activity across EVM chains from the terminal.

use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use chain_activity::ActivityConfig;

mod commands;

#[derive(Parser)]
#[command(name = "chain-activity")]
#[command(about = "Multi-chain wallet activity, balances and gas")]
#[command(version)]
struct Cli {
    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Custom config file path
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// List supported chains
    Chains,

    /// Select the active chain
    Select {
        /// Chain id (0x89, 137) or name (polygon)
        chain: String,
    },

    /// Show outgoing transaction history
    History {
        /// Account address
        address: String,

        /// Number of pages to load
        #[arg(short, long, default_value = "1")]
        pages: usize,
    },

    /// Show token balances
    Tokens {
        /// Account address
        address: String,
    },

    /// Show owned NFTs
    Nfts {
        /// Account address
        address: String,
    },

    /// Show the current gas price
    Gas {
        /// Keep polling for this many seconds
        #[arg(long, value_name = "SECS")]
        watch: Option<u64>,
    },

    /// Connect a wallet through an EIP-1193 bridge
    Connect {
        /// Bridge JSON-RPC URL (defaults to wallet.bridge_url)
        #[arg(long)]
        bridge: Option<String>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize logging
    let filter = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| filter.into()),
        )
        .with(tracing_subscriber::fmt::layer().with_target(false))
        .init();

    // Determine config path
    let config_path = cli.config.unwrap_or_else(ActivityConfig::default_path);
    let config = ActivityConfig::load_or_default(&config_path)?;

    match cli.command {
        Commands::Chains => commands::chains::run(&config).await,
        Commands::Select { chain } => commands::select::run(&config, &chain).await,
        Commands::History { address, pages } => {
            commands::history::run(&config, &address, pages).await
        }
        Commands::Tokens { address } => commands::tokens::run(&config, &address).await,
        Commands::Nfts { address } => commands::nfts::run(&config, &address).await,
        Commands::Gas { watch } => commands::gas::run(&config, watch).await,
        Commands::Connect { bridge } => commands::connect::run(&config, bridge).await,
    }
}
