mod commands;
mod config;

use clap::{Parser, Subcommand};
use config::CliConfig;
use raffle_core::RaffleError;
use std::path::PathBuf;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser)]
#[command(name = "raffle")]
#[command(about = "Automated raffle with oracle-drawn winners")]
#[command(version)]
struct Cli {
    /// Data directory for round history and configuration
    #[arg(short, long, global = true)]
    data_dir: Option<PathBuf>,

    /// Verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Raffle configuration commands
    #[command(subcommand)]
    Config(commands::ConfigCommands),

    /// Run raffle rounds against a local mock coordinator
    Simulate(commands::SimulateArgs),

    /// Show recorded rounds
    History {
        /// Maximum number of rounds to show
        #[arg(short, long, default_value_t = 20)]
        limit: usize,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Initialize logging
    let log_level = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(format!(
            "raffle={},raffle_core={}",
            log_level, log_level
        )))
        .with(tracing_subscriber::fmt::layer())
        .init();

    let cli_config = CliConfig::new(cli.data_dir, cli.verbose);

    // Ensure data directory exists
    tokio::fs::create_dir_all(&cli_config.data_dir).await?;

    // Execute command
    let result = match cli.command {
        Commands::Config(cmd) => commands::handle_config_command(cmd, &cli_config).await,
        Commands::Simulate(args) => commands::handle_simulate(args, &cli_config).await,
        Commands::History { limit } => commands::handle_history(limit, &cli_config).await,
    };

    if let Err(e) = result {
        match e {
            RaffleError::Config(msg) => {
                eprintln!("Error: Invalid configuration: {}", msg);
                eprintln!("Use 'raffle config show' to inspect the resolved configuration");
            }
            RaffleError::InsufficientPayment { sent, required } => {
                eprintln!("Error: Insufficient payment");
                eprintln!("Sent: {}, Entrance fee: {}", sent, required);
            }
            RaffleError::Storage(err) => {
                eprintln!("Error: Round history unavailable: {}", err);
                eprintln!("Data directory: {}", cli_config.data_dir.display());
            }
            _ => {
                eprintln!("Error: {}", e);
            }
        }
        std::process::exit(1);
    }

    Ok(())
}
