use crate::config::CliConfig;
use clap::Args;
use comfy_table::{presets::UTF8_FULL, Table};
use raffle_core::config::{LOCAL_CHAIN_ID, MOCK_BASE_FEE, MOCK_FUND_AMOUNT, MOCK_GAS_PRICE_LINK};
use raffle_core::oracle::{fulfillment_channel, spawn_fulfillment_listener};
use raffle_core::storage::{RoundRecorder, Storage};
use raffle_core::{
    Address, InMemoryBank, Keeper, ManualClock, MockCoordinator, NetworkConfig, Raffle,
    RaffleConfig, RaffleError, RaffleEvent, RaffleHandle, Result,
};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::broadcast;

const DELIVERY_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Args)]
pub struct SimulateArgs {
    /// Number of players entering each round
    #[arg(short, long, default_value_t = 5)]
    players: usize,

    /// Number of rounds to run
    #[arg(short, long, default_value_t = 3)]
    rounds: u64,

    /// Chain whose preset fee, gas lane and interval are used
    #[arg(long, default_value_t = LOCAL_CHAIN_ID)]
    chain_id: u64,

    /// Raffle configuration file; coordinator and subscription are replaced
    /// by the local mock. Takes precedence over --chain-id.
    #[arg(short, long)]
    config: Option<PathBuf>,
}

struct RoundOutcome {
    round: u64,
    request_id: String,
    winner: Address,
    payout: String,
    players: usize,
}

pub async fn handle_simulate(args: SimulateArgs, cli_config: &CliConfig) -> Result<()> {
    if args.players == 0 {
        return Err(RaffleError::config("At least one player is needed per round"));
    }

    let storage = Arc::new(Storage::new(&cli_config.db_path()).await?);

    // Local network: deploy the mock and pay for a subscription
    let coordinator = Arc::new(MockCoordinator::new(MOCK_BASE_FEE, MOCK_GAS_PRICE_LINK));
    let subscription_id = coordinator.create_subscription();
    coordinator.fund_subscription(subscription_id, MOCK_FUND_AMOUNT)?;

    let config = resolve_config(
        args.config.as_ref(),
        args.chain_id,
        coordinator.address(),
        subscription_id,
    )?;
    let interval_secs = config.interval_secs as i64;

    let address = Address::random();
    coordinator.add_consumer(subscription_id, address)?;

    let bank = Arc::new(InMemoryBank::new());
    let clock = Arc::new(ManualClock::starting_now());
    let handle = RaffleHandle::new(Raffle::new(
        address,
        config,
        coordinator.clone(),
        bank.clone(),
        clock.clone(),
    )?);

    let mut events = handle.subscribe();
    let recorder = RoundRecorder::new(storage.clone(), address).spawn(handle.subscribe_completed_rounds());
    let (channel, rx) = fulfillment_channel();
    let listener = spawn_fulfillment_listener(handle.clone(), rx);
    let keeper = Keeper::new(handle.clone(), Duration::from_secs(1));

    println!("Raffle deployed at {}", address);
    println!("Entrance fee: {}", handle.entrance_fee());
    println!();

    let players: Vec<Address> = (0..args.players)
        .map(|n| Address::derive(&format!("player-{}", n)))
        .collect();

    let mut outcomes = Vec::new();
    for round in 1..=args.rounds {
        let fee = handle.entrance_fee();
        for player in &players {
            handle.enter(*player, fee)?;
        }
        if cli_config.verbose {
            println!("Round {}: {} players entered", round, players.len());
        }

        // Let the interval pass, then act as the automation trigger
        clock.advance_secs(interval_secs + 1);
        let request_id = keeper
            .poll_once()
            .ok_or_else(|| RaffleError::internal(format!("Round {} draw did not start", round)))?;

        // Act as the oracle; delivery goes through the channel and is only
        // settled once the raffle accepts it
        coordinator
            .fulfill_over_channel(request_id, &channel, Vec::new())
            .await?;

        let outcome = wait_for_winner(&mut events).await?;
        println!("Round {}: winner {} received {}", round, outcome.winner, outcome.payout);
        outcomes.push(outcome);
    }

    let mut table = Table::new();
    table.load_preset(UTF8_FULL);
    table.set_header(vec!["Round", "Request", "Winner", "Payout", "Players"]);
    for outcome in &outcomes {
        table.add_row(vec![
            outcome.round.to_string(),
            outcome.request_id.clone(),
            outcome.winner.to_string(),
            outcome.payout.clone(),
            outcome.players.to_string(),
        ]);
    }
    println!();
    println!("{}", table);

    println!("Final balances:");
    for player in &players {
        println!("  {}: {}", player, bank.balance_of(player));
    }
    if let Some(balance) = coordinator.subscription_balance(subscription_id) {
        println!("Subscription {} balance left: {}", subscription_id, balance);
    }

    // Close everything that feeds the recorder so it can drain
    drop(channel);
    listener
        .await
        .map_err(|e| RaffleError::internal(format!("Fulfillment listener failed: {}", e)))?;
    drop(keeper);
    drop(handle);
    recorder
        .await
        .map_err(|e| RaffleError::internal(format!("Round recorder failed: {}", e)))?;

    println!("Recorded {} rounds in {}", outcomes.len(), cli_config.db_path().display());
    Ok(())
}

fn resolve_config(
    path: Option<&PathBuf>,
    chain_id: u64,
    coordinator: Address,
    subscription_id: u64,
) -> Result<RaffleConfig> {
    match path {
        Some(path) => {
            let mut config = RaffleConfig::from_json_file(path)?;
            config.vrf_coordinator = coordinator;
            config.subscription_id = subscription_id;
            config.validate()?;
            Ok(config)
        }
        None => {
            let network = NetworkConfig::for_chain(chain_id)?;
            if !network.is_development() {
                tracing::info!(
                    "Simulating with {} presets against the local mock coordinator",
                    network.name
                );
            }
            network.raffle_config(Some(coordinator), Some(subscription_id))
        }
    }
}

async fn wait_for_winner(events: &mut broadcast::Receiver<RaffleEvent>) -> Result<RoundOutcome> {
    let wait = async {
        loop {
            match events.recv().await {
                Ok(RaffleEvent::WinnerPicked {
                    winner,
                    round,
                    request_id,
                    payout,
                    players,
                    ..
                }) => {
                    return Ok(RoundOutcome {
                        round,
                        request_id: request_id.to_string(),
                        winner,
                        payout: payout.to_string(),
                        players,
                    })
                }
                Ok(_) => continue,
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    tracing::warn!("Missed {} raffle events", skipped);
                }
                Err(broadcast::error::RecvError::Closed) => {
                    return Err(RaffleError::internal("Raffle event stream closed"));
                }
            }
        }
    };

    tokio::time::timeout(DELIVERY_TIMEOUT, wait)
        .await
        .map_err(|_| RaffleError::internal("Timed out waiting for the winner"))?
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;
    use raffle_core::config::SEPOLIA_CHAIN_ID;

    #[derive(Parser)]
    struct Harness {
        #[command(flatten)]
        args: SimulateArgs,
    }

    #[test]
    fn test_chain_id_flag() {
        let parsed = Harness::try_parse_from(["simulate", "--chain-id", "11155111", "-p", "3"]).unwrap();
        assert_eq!(parsed.args.chain_id, SEPOLIA_CHAIN_ID);
        assert_eq!(parsed.args.players, 3);

        let defaults = Harness::try_parse_from(["simulate"]).unwrap();
        assert_eq!(defaults.args.chain_id, LOCAL_CHAIN_ID);
    }

    #[test]
    fn test_chain_presets_run_against_the_mock() {
        let mock = Address::derive("mock");
        let config = resolve_config(None, SEPOLIA_CHAIN_ID, mock, 1).unwrap();
        assert_eq!(config.vrf_coordinator, mock);
        assert_eq!(config.subscription_id, 1);

        assert!(matches!(
            resolve_config(None, 1, mock, 1),
            Err(RaffleError::Config(_))
        ));
    }
}
