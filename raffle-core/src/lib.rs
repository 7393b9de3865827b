//! Raffle core - automated, periodically drawn raffle
//!
//! Participants pay a fixed entrance fee into a pool. Once the draw interval
//! has passed, an automation trigger starts a draw that asks an external
//! randomness oracle for one random value. When the oracle delivers it, the
//! winner is picked, paid the whole pool, and a new round begins.

pub mod automation;
pub mod clock;
pub mod config;
pub mod error;
pub mod events;
pub mod ledger;
pub mod oracle;
pub mod payout;
pub mod raffle;
pub mod service;
pub mod storage;
pub mod types;
pub mod upkeep;

pub use automation::Keeper;
pub use clock::{Clock, ManualClock, SystemClock};
pub use config::{NetworkConfig, RaffleConfig};
pub use error::{OracleError, RaffleError, Result};
pub use events::{EventBus, RaffleEvent};
pub use oracle::{MockCoordinator, RandomnessConsumer, RandomnessCoordinator};
pub use payout::{FundsTransfer, InMemoryBank};
pub use raffle::{Raffle, RaffleSnapshot};
pub use service::RaffleHandle;
pub use types::{Address, Amount, KeyHash, RaffleState, RandomWord, RequestId};

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{LOCAL_CHAIN_ID, MOCK_BASE_FEE, MOCK_FUND_AMOUNT, MOCK_GAS_PRICE_LINK};
    use crate::oracle::{fulfillment_channel, spawn_fulfillment_listener};
    use crate::storage::{RoundRecorder, RoundStore, Storage};
    use std::sync::Arc;
    use std::time::Duration;
    use tempfile::tempdir;

    fn init_tracing() {
        let _ = tracing_subscriber::fmt()
            .with_max_level(tracing::Level::DEBUG)
            .with_test_writer()
            .try_init();
    }

    #[tokio::test]
    async fn test_two_rounds_end_to_end() {
        init_tracing();
        let temp_dir = tempdir().unwrap();
        let storage = Arc::new(Storage::new(&temp_dir.path().join("raffle.db")).await.unwrap());

        let coordinator = Arc::new(MockCoordinator::new(MOCK_BASE_FEE, MOCK_GAS_PRICE_LINK));
        let subscription_id = coordinator.create_subscription();
        coordinator
            .fund_subscription(subscription_id, MOCK_FUND_AMOUNT)
            .unwrap();
        let config = NetworkConfig::for_chain(LOCAL_CHAIN_ID)
            .unwrap()
            .raffle_config(Some(coordinator.address()), Some(subscription_id))
            .unwrap();

        let address = Address::random();
        coordinator.add_consumer(subscription_id, address).unwrap();
        let bank = Arc::new(InMemoryBank::new());
        let clock = Arc::new(ManualClock::starting_now());
        let handle = RaffleHandle::new(
            Raffle::new(address, config, coordinator.clone(), bank.clone(), clock.clone()).unwrap(),
        );

        let mut events = handle.subscribe();
        let recorder = RoundRecorder::new(storage.clone(), address).spawn(handle.subscribe_completed_rounds());
        let (channel, rx) = fulfillment_channel();
        let listener = spawn_fulfillment_listener(handle.clone(), rx);
        let keeper = Keeper::new(handle.clone(), Duration::from_secs(1));
        let fee = handle.entrance_fee();

        for (round, players) in [(1u64, 3usize), (2, 2)] {
            let entrants: Vec<Address> = (0..players)
                .map(|n| Address::derive(&format!("round-{}-player-{}", round, n)))
                .collect();
            for entrant in &entrants {
                handle.enter(*entrant, fee).unwrap();
            }
            assert!(keeper.poll_once().is_none());

            clock.advance_secs(31);
            let request_id = keeper.poll_once().unwrap();
            assert!(handle.enter(entrants[0], fee).is_err());

            coordinator
                .fulfill_over_channel(request_id, &channel, vec![RandomWord::from_u64(4)])
                .await
                .unwrap();
            assert!(coordinator.pending_requests().is_empty());

            let winner = loop {
                if let RaffleEvent::WinnerPicked { winner, .. } = events.recv().await.unwrap() {
                    break winner;
                }
            };
            assert_eq!(winner, entrants[4 % players]);
            assert_eq!(bank.balance_of(&winner), fee.checked_mul(players as u128).unwrap());
            assert_eq!(handle.state(), RaffleState::Open);
        }

        drop(channel);
        listener.await.unwrap();
        drop(keeper);
        drop(handle);
        recorder.await.unwrap();

        let rounds = RoundStore::new(&storage).rounds_for_raffle(&address).await.unwrap();
        assert_eq!(rounds.iter().map(|r| r.round).collect::<Vec<_>>(), vec![1, 2]);
        assert_eq!(rounds[0].players, 3);
        assert_eq!(rounds[1].players, 2);
    }
}
