use crate::config::CliConfig;
use clap::Subcommand;
use raffle_core::config::LOCAL_CHAIN_ID;
use raffle_core::{Address, NetworkConfig, RaffleConfig, RaffleError, Result};
use std::str::FromStr;

#[derive(Subcommand)]
pub enum ConfigCommands {
    /// Show the configuration preset for a chain and any saved configuration
    Show {
        /// Chain id to resolve the preset for
        #[arg(long, default_value_t = LOCAL_CHAIN_ID)]
        chain_id: u64,
    },
    /// Resolve a chain preset and save it to the data directory
    Init {
        /// Chain id to resolve the preset for
        #[arg(long, default_value_t = LOCAL_CHAIN_ID)]
        chain_id: u64,
        /// VRF coordinator address (required when the chain has no preset)
        #[arg(long)]
        coordinator: Option<String>,
        /// Subscription id used to pay for randomness
        #[arg(long)]
        subscription_id: Option<u64>,
        /// Overwrite an existing configuration file
        #[arg(long)]
        force: bool,
    },
}

pub async fn handle_config_command(cmd: ConfigCommands, cli_config: &CliConfig) -> Result<()> {
    match cmd {
        ConfigCommands::Show { chain_id } => {
            let network = NetworkConfig::for_chain(chain_id)?;

            println!("Network '{}' (chain id {}):", network.name, network.chain_id);
            match network.vrf_coordinator {
                Some(address) => println!("  VRF coordinator: {}", address),
                None => println!("  VRF coordinator: local mock (deployed per run)"),
            }
            match network.subscription_id {
                Some(id) => println!("  Subscription: {}", id),
                None => println!("  Subscription: not set"),
            }
            println!("  Entrance fee: {}", network.entrance_fee);
            println!("  Gas lane: {}", network.gas_lane);
            println!("  Callback gas limit: {}", network.callback_gas_limit);
            println!("  Interval: {}s", network.interval_secs);

            let path = cli_config.raffle_config_path();
            if path.exists() {
                let saved = RaffleConfig::from_json_file(&path)?;
                println!();
                println!("Saved configuration ({}):", path.display());
                println!("{}", serde_json::to_string_pretty(&saved)?);
            }
        }

        ConfigCommands::Init {
            chain_id,
            coordinator,
            subscription_id,
            force,
        } => {
            let path = cli_config.raffle_config_path();
            if path.exists() && !force {
                return Err(RaffleError::config(format!(
                    "{} already exists, pass --force to overwrite",
                    path.display()
                )));
            }

            let coordinator = coordinator
                .as_deref()
                .map(Address::from_str)
                .transpose()?;
            let network = NetworkConfig::for_chain(chain_id)?;
            let config = network.raffle_config(coordinator, subscription_id)?;
            config.save_json_file(&path)?;

            println!("Saved {} configuration to {}", network.name, path.display());
        }
    }

    Ok(())
}
