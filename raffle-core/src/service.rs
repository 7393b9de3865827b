use crate::error::Result;
use crate::events::{EventBus, RaffleEvent};
use crate::oracle::RandomnessConsumer;
use crate::raffle::{Raffle, RaffleSnapshot};
use crate::types::{Address, Amount, RaffleState, RandomWord, RequestId};
use crate::upkeep::UpkeepCheck;
use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{broadcast, mpsc};

/// Shared handle to a raffle.
///
/// Every operation runs under one lock, so callers on different tasks or
/// threads see each operation as one indivisible transaction. The lock is
/// never held across an `.await`.
///
/// The two outbound calls, the randomness request and the payout, are made
/// with the lock released while the raffle is CALCULATING. Anything that
/// reaches the handle meanwhile, including the coordinator or treasury
/// calling back from inside that call, sees CALCULATING and is rejected.
#[derive(Clone)]
pub struct RaffleHandle {
    inner: Arc<Mutex<Raffle>>,
    events: EventBus,
    address: Address,
}

impl RaffleHandle {
    pub fn new(raffle: Raffle) -> Self {
        let events = raffle.events().clone();
        let address = raffle.address();
        Self {
            inner: Arc::new(Mutex::new(raffle)),
            events,
            address,
        }
    }

    pub fn address(&self) -> Address {
        self.address
    }

    pub fn subscribe(&self) -> broadcast::Receiver<RaffleEvent> {
        self.events.subscribe()
    }

    pub fn subscribe_completed_rounds(&self) -> mpsc::UnboundedReceiver<RaffleEvent> {
        self.events.subscribe_completed_rounds()
    }

    pub fn enter(&self, participant: Address, payment: Amount) -> Result<()> {
        self.inner.lock().enter(participant, payment)
    }

    pub fn check_upkeep(&self, check_data: &[u8]) -> UpkeepCheck {
        self.inner.lock().check_upkeep(check_data)
    }

    pub fn perform_upkeep(&self, perform_data: &[u8]) -> Result<RequestId> {
        let outbound = self.inner.lock().begin_draw(perform_data)?;
        let outcome = outbound.send();
        self.inner.lock().finish_draw(outcome)
    }

    pub fn fulfill_random_words(
        &self,
        caller: Address,
        request_id: RequestId,
        words: &[RandomWord],
    ) -> Result<Address> {
        let settlement = self
            .inner
            .lock()
            .begin_settlement(caller, request_id, words)?;
        let outcome = settlement.pay();
        self.inner.lock().finish_settlement(settlement, outcome)
    }

    pub fn entrance_fee(&self) -> Amount {
        self.inner.lock().entrance_fee()
    }

    pub fn interval(&self) -> Duration {
        self.inner.lock().interval()
    }

    pub fn player(&self, index: usize) -> Result<Address> {
        self.inner.lock().player(index)
    }

    pub fn number_of_players(&self) -> usize {
        self.inner.lock().number_of_players()
    }

    pub fn recent_winner(&self) -> Option<Address> {
        self.inner.lock().recent_winner()
    }

    pub fn state(&self) -> RaffleState {
        self.inner.lock().state()
    }

    pub fn last_timestamp(&self) -> DateTime<Utc> {
        self.inner.lock().last_timestamp()
    }

    pub fn round(&self) -> u64 {
        self.inner.lock().round()
    }

    pub fn pending_request(&self) -> Option<RequestId> {
        self.inner.lock().pending_request()
    }

    pub fn snapshot(&self) -> RaffleSnapshot {
        self.inner.lock().snapshot()
    }

    /// Run `f` with exclusive access, for reads that need several fields
    /// from the same instant.
    pub fn with_raffle<T>(&self, f: impl FnOnce(&Raffle) -> T) -> T {
        f(&self.inner.lock())
    }
}

impl RandomnessConsumer for RaffleHandle {
    fn raw_fulfill_random_words(
        &self,
        caller: Address,
        request_id: RequestId,
        words: Vec<RandomWord>,
    ) -> Result<()> {
        self.fulfill_random_words(caller, request_id, &words)
            .map(|_| ())
    }
}

impl std::fmt::Debug for RaffleHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RaffleHandle")
            .field("address", &self.address)
            .finish()
    }
}
