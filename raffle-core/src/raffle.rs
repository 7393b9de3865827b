use crate::clock::Clock;
use crate::config::{RaffleConfig, NUM_WORDS, REQUEST_CONFIRMATIONS};
use crate::error::{OracleError, RaffleError, Result};
use crate::events::{EventBus, RaffleEvent};
use crate::ledger::EntryLedger;
use crate::oracle::{RandomnessCoordinator, RandomnessRequest};
use crate::payout::FundsTransfer;
use crate::types::{Address, Amount, RaffleState, RandomWord, RequestId};
use crate::upkeep::{UpkeepCheck, UpkeepEvaluator, UpkeepInputs};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

/// Context kept for an outstanding randomness request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PendingDraw {
    pub round: u64,
    pub requested_at: DateTime<Utc>,
}

#[derive(Debug)]
struct Round {
    number: u64,
    state: RaffleState,
    last_timestamp: DateTime<Utc>,
    ledger: EntryLedger,
    pending: HashMap<RequestId, PendingDraw>,
    /// Request whose payout is in flight. Parked outside `pending` so a
    /// duplicate delivery is rejected meanwhile.
    settling: Option<(RequestId, PendingDraw)>,
    recent_winner: Option<Address>,
}

/// A draw that has flipped the raffle to CALCULATING but not yet reached the
/// coordinator.
pub(crate) struct OutboundRequest {
    consumer: Address,
    request: RandomnessRequest,
    coordinator: Arc<dyn RandomnessCoordinator>,
}

impl OutboundRequest {
    pub(crate) fn send(&self) -> std::result::Result<RequestId, OracleError> {
        self.coordinator
            .request_random_words(self.consumer, &self.request)
    }
}

/// A winner picked for a delivered request, waiting on its payout. Nothing
/// about the round changes until the payout succeeds.
pub(crate) struct Settlement {
    request_id: RequestId,
    winner: Address,
    payout: Amount,
    players: usize,
    treasury: Arc<dyn FundsTransfer>,
}

impl Settlement {
    pub(crate) fn pay(&self) -> Result<()> {
        self.treasury.transfer(self.winner, self.payout)
    }
}

/// Point-in-time view of the raffle for display and persistence.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RaffleSnapshot {
    pub address: Address,
    pub state: RaffleState,
    pub round: u64,
    pub players: Vec<Address>,
    pub pooled_balance: Amount,
    pub recent_winner: Option<Address>,
    pub last_timestamp: DateTime<Utc>,
    pub pending_request: Option<RequestId>,
}

/// The raffle record and its OPEN / CALCULATING lifecycle.
///
/// `Raffle` itself is not synchronized; wrap it in a
/// [`RaffleHandle`](crate::service::RaffleHandle) to share it.
pub struct Raffle {
    address: Address,
    config: RaffleConfig,
    round: Round,
    coordinator: Arc<dyn RandomnessCoordinator>,
    treasury: Arc<dyn FundsTransfer>,
    clock: Arc<dyn Clock>,
    events: EventBus,
}

impl Raffle {
    pub fn new(
        address: Address,
        config: RaffleConfig,
        coordinator: Arc<dyn RandomnessCoordinator>,
        treasury: Arc<dyn FundsTransfer>,
        clock: Arc<dyn Clock>,
    ) -> Result<Self> {
        config.validate()?;

        if coordinator.address() != config.vrf_coordinator {
            return Err(RaffleError::config(format!(
                "Coordinator at {} does not match configured {}",
                coordinator.address(),
                config.vrf_coordinator
            )));
        }

        let now = clock.now();
        tracing::info!(
            "Raffle {} created: entrance fee {}, interval {}s",
            address,
            config.entrance_fee,
            config.interval_secs
        );

        Ok(Self {
            address,
            config,
            round: Round {
                number: 1,
                state: RaffleState::Open,
                last_timestamp: now,
                ledger: EntryLedger::new(),
                pending: HashMap::new(),
                settling: None,
                recent_winner: None,
            },
            coordinator,
            treasury,
            clock,
            events: EventBus::new(),
        })
    }

    /// Join the current round. Each call is one more chance to win.
    pub fn enter(&mut self, participant: Address, payment: Amount) -> Result<()> {
        if payment < self.config.entrance_fee {
            return Err(RaffleError::InsufficientPayment {
                sent: payment,
                required: self.config.entrance_fee,
            });
        }

        if self.round.state != RaffleState::Open {
            return Err(RaffleError::RaffleNotOpen);
        }

        self.round.ledger.record(participant, payment)?;

        tracing::info!(
            "Player {} entered round {} with {}",
            participant,
            self.round.number,
            payment
        );
        self.events
            .publish(RaffleEvent::RaffleEnter { player: participant });
        Ok(())
    }

    pub fn check_upkeep(&self, _check_data: &[u8]) -> UpkeepCheck {
        UpkeepEvaluator::check(&UpkeepInputs {
            state: self.round.state,
            last_timestamp: self.round.last_timestamp,
            now: self.clock.now(),
            interval: self.config.interval(),
            ledger: &self.round.ledger,
        })
    }

    /// Start a draw: freeze entries and ask the coordinator for one random word.
    pub fn perform_upkeep(&mut self, perform_data: &[u8]) -> Result<RequestId> {
        let outbound = self.begin_draw(perform_data)?;
        let outcome = outbound.send();
        self.finish_draw(outcome)
    }

    /// Validate a draw and flip to CALCULATING. While the request is out,
    /// entries and further triggers are rejected.
    pub(crate) fn begin_draw(&mut self, perform_data: &[u8]) -> Result<OutboundRequest> {
        let check = self.check_upkeep(perform_data);
        if !check.upkeep_needed || self.draw_in_flight() {
            return Err(RaffleError::UpkeepNotNeeded {
                balance: self.round.ledger.pooled_balance(),
                players: self.round.ledger.len(),
                state: self.round.state,
            });
        }

        self.round.state = RaffleState::Calculating;

        Ok(OutboundRequest {
            consumer: self.address,
            request: RandomnessRequest {
                key_hash: self.config.gas_lane,
                subscription_id: self.config.subscription_id,
                request_confirmations: REQUEST_CONFIRMATIONS,
                callback_gas_limit: self.config.callback_gas_limit,
                num_words: NUM_WORDS,
            },
            coordinator: self.coordinator.clone(),
        })
    }

    pub(crate) fn finish_draw(
        &mut self,
        outcome: std::result::Result<RequestId, OracleError>,
    ) -> Result<RequestId> {
        let request_id = match outcome {
            Ok(id) => id,
            Err(e) => {
                self.round.state = RaffleState::Open;
                tracing::warn!("Randomness request failed, raffle stays open: {}", e);
                return Err(e.into());
            }
        };

        self.round.pending.insert(
            request_id,
            PendingDraw {
                round: self.round.number,
                requested_at: self.clock.now(),
            },
        );

        tracing::info!(
            "Requested winner for round {} ({} players): request {}",
            self.round.number,
            self.round.ledger.len(),
            request_id
        );
        self.events
            .publish(RaffleEvent::RequestedRaffleWinner { request_id });
        Ok(request_id)
    }

    /// Consume delivered randomness: pick the winner, pay out, start a new round.
    ///
    /// Either everything commits or nothing does. A failed payout leaves the
    /// request pending so the same delivery can be retried.
    pub fn fulfill_random_words(
        &mut self,
        caller: Address,
        request_id: RequestId,
        words: &[RandomWord],
    ) -> Result<Address> {
        let settlement = self.begin_settlement(caller, request_id, words)?;
        let outcome = settlement.pay();
        self.finish_settlement(settlement, outcome)
    }

    /// Match a delivery to the pending request and pick the winner. The
    /// raffle stays CALCULATING until [`Raffle::finish_settlement`].
    pub(crate) fn begin_settlement(
        &mut self,
        caller: Address,
        request_id: RequestId,
        words: &[RandomWord],
    ) -> Result<Settlement> {
        if caller != self.config.vrf_coordinator {
            return Err(RaffleError::UnauthorizedCaller {
                caller,
                expected: self.config.vrf_coordinator,
            });
        }

        if !self.round.pending.contains_key(&request_id) {
            return Err(RaffleError::UnknownRequest(request_id));
        }

        let word = words.first().ok_or(OracleError::NoRandomWords)?;
        let players = self.round.ledger.len();
        if players == 0 {
            return Err(RaffleError::internal(format!(
                "Request {} is pending with no players",
                request_id
            )));
        }

        let winner = self.round.ledger.player(word.reduce(players))?;
        if let Some(draw) = self.round.pending.remove(&request_id) {
            self.round.settling = Some((request_id, draw));
        }

        Ok(Settlement {
            request_id,
            winner,
            payout: self.round.ledger.pooled_balance(),
            players,
            treasury: self.treasury.clone(),
        })
    }

    pub(crate) fn finish_settlement(
        &mut self,
        settlement: Settlement,
        outcome: Result<()>,
    ) -> Result<Address> {
        let Settlement {
            request_id,
            winner,
            payout,
            players,
            ..
        } = settlement;
        let finished_round = self.round.number;

        if let Err(e) = outcome {
            if let Some((id, draw)) = self.round.settling.take() {
                self.round.pending.insert(id, draw);
            }
            tracing::warn!(
                "Payout of {} to {} failed, round {} left pending: {}",
                payout,
                winner,
                finished_round,
                e
            );
            return Err(match e {
                RaffleError::TransferFailed { .. } => e,
                other => RaffleError::TransferFailed {
                    to: winner,
                    amount: payout,
                    reason: other.to_string(),
                },
            });
        }

        let now = self.clock.now();
        self.round.settling = None;
        self.round.ledger.take();
        self.round.recent_winner = Some(winner);
        self.round.last_timestamp = now;
        self.round.state = RaffleState::Open;
        self.round.number += 1;

        tracing::info!(
            "Round {} winner {} ({} players) received {}",
            finished_round,
            winner,
            players,
            payout
        );
        self.events.publish(RaffleEvent::WinnerPicked {
            winner,
            round: finished_round,
            request_id,
            payout,
            players,
            timestamp: now,
        });
        Ok(winner)
    }

    fn draw_in_flight(&self) -> bool {
        !self.round.pending.is_empty() || self.round.settling.is_some()
    }

    pub fn address(&self) -> Address {
        self.address
    }

    pub fn config(&self) -> &RaffleConfig {
        &self.config
    }

    pub fn events(&self) -> &EventBus {
        &self.events
    }

    pub fn entrance_fee(&self) -> Amount {
        self.config.entrance_fee
    }

    pub fn interval(&self) -> Duration {
        self.config.interval()
    }

    pub fn player(&self, index: usize) -> Result<Address> {
        self.round.ledger.player(index)
    }

    pub fn number_of_players(&self) -> usize {
        self.round.ledger.len()
    }

    pub fn players(&self) -> &[Address] {
        self.round.ledger.players()
    }

    pub fn pooled_balance(&self) -> Amount {
        self.round.ledger.pooled_balance()
    }

    pub fn recent_winner(&self) -> Option<Address> {
        self.round.recent_winner
    }

    pub fn state(&self) -> RaffleState {
        self.round.state
    }

    pub fn last_timestamp(&self) -> DateTime<Utc> {
        self.round.last_timestamp
    }

    /// Number of the round currently accepting entries or being drawn.
    pub fn round(&self) -> u64 {
        self.round.number
    }

    pub fn pending_request(&self) -> Option<RequestId> {
        self.round
            .pending
            .keys()
            .next()
            .copied()
            .or_else(|| self.round.settling.as_ref().map(|(id, _)| *id))
    }

    pub fn pending_draw(&self, request_id: &RequestId) -> Option<&PendingDraw> {
        self.round.pending.get(request_id).or_else(|| {
            self.round
                .settling
                .as_ref()
                .filter(|(id, _)| id == request_id)
                .map(|(_, draw)| draw)
        })
    }

    pub fn num_words(&self) -> u32 {
        NUM_WORDS
    }

    pub fn request_confirmations(&self) -> u16 {
        REQUEST_CONFIRMATIONS
    }

    pub fn snapshot(&self) -> RaffleSnapshot {
        RaffleSnapshot {
            address: self.address,
            state: self.round.state,
            round: self.round.number,
            players: self.round.ledger.players().to_vec(),
            pooled_balance: self.round.ledger.pooled_balance(),
            recent_winner: self.round.recent_winner,
            last_timestamp: self.round.last_timestamp,
            pending_request: self.pending_request(),
        }
    }
}

impl std::fmt::Debug for Raffle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Raffle")
            .field("address", &self.address)
            .field("state", &self.round.state)
            .field("round", &self.round.number)
            .field("players", &self.round.ledger.len())
            .field("pending", &self.round.pending.len())
            .field("settling", &self.round.settling.is_some())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use crate::config::{NetworkConfig, LOCAL_CHAIN_ID, MOCK_BASE_FEE, MOCK_FUND_AMOUNT, MOCK_GAS_PRICE_LINK};
    use crate::oracle::MockCoordinator;
    use crate::payout::InMemoryBank;

    struct Fixture {
        raffle: Raffle,
        coordinator: Arc<MockCoordinator>,
        bank: Arc<InMemoryBank>,
        clock: Arc<ManualClock>,
        fee: Amount,
        interval: i64,
    }

    fn fixture() -> Fixture {
        let coordinator = Arc::new(MockCoordinator::new(MOCK_BASE_FEE, MOCK_GAS_PRICE_LINK));
        let subscription_id = coordinator.create_subscription();
        coordinator
            .fund_subscription(subscription_id, MOCK_FUND_AMOUNT)
            .unwrap();

        let config = NetworkConfig::for_chain(LOCAL_CHAIN_ID)
            .unwrap()
            .raffle_config(Some(coordinator.address()), Some(subscription_id))
            .unwrap();
        let fee = config.entrance_fee;
        let interval = config.interval_secs as i64;

        let bank = Arc::new(InMemoryBank::new());
        let clock = Arc::new(ManualClock::starting_now());
        let address = Address::derive("raffle");
        coordinator.add_consumer(subscription_id, address).unwrap();

        let raffle = Raffle::new(
            address,
            config,
            coordinator.clone(),
            bank.clone(),
            clock.clone(),
        )
        .unwrap();

        Fixture {
            raffle,
            coordinator,
            bank,
            clock,
            fee,
            interval,
        }
    }

    fn player(n: usize) -> Address {
        Address::derive(&format!("player-{}", n))
    }

    impl Fixture {
        fn enter_and_wait(&mut self, players: usize) {
            for n in 0..players {
                self.raffle.enter(player(n), self.fee).unwrap();
            }
            self.clock.advance_secs(self.interval + 1);
        }

        fn deliver(&mut self, request_id: RequestId, value: u64) -> Result<Address> {
            let caller = self.coordinator.address();
            self.raffle
                .fulfill_random_words(caller, request_id, &[RandomWord::from_u64(value)])
        }
    }

    #[test]
    fn test_initializes_open() {
        let f = fixture();
        assert_eq!(f.raffle.state(), RaffleState::Open);
        assert_eq!(f.raffle.state().as_u8(), 0);
        assert_eq!(f.raffle.interval(), Duration::from_secs(30));
        assert_eq!(f.raffle.round(), 1);
        assert_eq!(f.raffle.num_words(), 1);
        assert_eq!(f.raffle.request_confirmations(), 3);
        assert!(f.raffle.recent_winner().is_none());
    }

    #[test]
    fn test_rejects_mismatched_coordinator() {
        let f = fixture();
        let mut config = f.raffle.config().clone();
        config.vrf_coordinator = Address::derive("someone-else");
        let result = Raffle::new(
            Address::derive("raffle"),
            config,
            f.coordinator.clone(),
            f.bank.clone(),
            f.clock.clone(),
        );
        assert!(matches!(result, Err(RaffleError::Config(_))));
    }

    #[test]
    fn test_enter_requires_entrance_fee() {
        let mut f = fixture();
        let short = Amount::from_wei(f.fee.to_wei() - 1);

        let err = f.raffle.enter(player(0), short).unwrap_err();
        assert!(matches!(err, RaffleError::InsufficientPayment { .. }));
        assert_eq!(f.raffle.number_of_players(), 0);
        assert!(f.raffle.pooled_balance().is_zero());

        assert!(matches!(
            f.raffle.enter(player(0), Amount::ZERO),
            Err(RaffleError::InsufficientPayment { .. })
        ));
    }

    #[test]
    fn test_enter_records_player_and_emits_event() {
        let mut f = fixture();
        let mut events = f.raffle.events().subscribe();
        let overpay = f.fee.checked_mul(2).unwrap();

        f.raffle.enter(player(0), f.fee).unwrap();
        f.raffle.enter(player(1), overpay).unwrap();
        f.raffle.enter(player(0), f.fee).unwrap();

        assert_eq!(f.raffle.player(0).unwrap(), player(0));
        assert_eq!(f.raffle.players(), &[player(0), player(1), player(0)]);
        assert_eq!(f.raffle.pooled_balance(), f.fee.checked_mul(4).unwrap());
        assert_eq!(
            events.try_recv().unwrap(),
            RaffleEvent::RaffleEnter { player: player(0) }
        );
    }

    #[test]
    fn test_enter_rejected_while_calculating() {
        let mut f = fixture();
        f.enter_and_wait(1);
        f.raffle.perform_upkeep(&[]).unwrap();

        assert!(matches!(
            f.raffle.enter(player(2), f.fee),
            Err(RaffleError::RaffleNotOpen)
        ));
        assert_eq!(f.raffle.number_of_players(), 1);
    }

    #[test]
    fn test_check_upkeep_false_without_players() {
        let f = fixture();
        f.clock.advance_secs(f.interval + 1);
        assert!(!f.raffle.check_upkeep(&[]).upkeep_needed);
    }

    #[test]
    fn test_check_upkeep_false_when_calculating() {
        let mut f = fixture();
        f.enter_and_wait(1);
        f.raffle.perform_upkeep(&[]).unwrap();
        assert_eq!(f.raffle.state().as_u8(), 1);
        assert!(!f.raffle.check_upkeep(&[]).upkeep_needed);
    }

    #[test]
    fn test_check_upkeep_false_before_interval() {
        let mut f = fixture();
        f.raffle.enter(player(0), f.fee).unwrap();
        f.clock.advance_secs(f.interval - 1);
        assert!(!f.raffle.check_upkeep(&[]).upkeep_needed);
        assert!(f.raffle.perform_upkeep(&[]).is_err());
    }

    #[test]
    fn test_check_upkeep_true_when_ready() {
        let mut f = fixture();
        f.enter_and_wait(1);
        assert!(f.raffle.check_upkeep(&[]).upkeep_needed);
    }

    #[test]
    fn test_perform_upkeep_rejected_without_mutation() {
        let mut f = fixture();
        let before = f.raffle.snapshot();

        let err = f.raffle.perform_upkeep(&[]).unwrap_err();
        assert!(matches!(
            err,
            RaffleError::UpkeepNotNeeded {
                players: 0,
                state: RaffleState::Open,
                ..
            }
        ));
        assert_eq!(f.raffle.snapshot(), before);
        assert!(f.coordinator.pending_requests().is_empty());
    }

    #[test]
    fn test_perform_upkeep_starts_draw() {
        let mut f = fixture();
        let mut events = f.raffle.events().subscribe();
        f.enter_and_wait(1);

        let request_id = f.raffle.perform_upkeep(&[]).unwrap();

        assert!(request_id.value() > 0);
        assert_eq!(f.raffle.state(), RaffleState::Calculating);
        assert_eq!(f.raffle.pending_request(), Some(request_id));
        assert_eq!(f.raffle.pending_draw(&request_id).unwrap().round, 1);
        assert_eq!(f.coordinator.pending_requests(), vec![request_id]);

        let _enter = events.try_recv().unwrap();
        assert_eq!(
            events.try_recv().unwrap(),
            RaffleEvent::RequestedRaffleWinner { request_id }
        );
    }

    #[test]
    fn test_second_draw_not_requested_while_pending() {
        let mut f = fixture();
        f.enter_and_wait(1);
        f.raffle.perform_upkeep(&[]).unwrap();

        f.clock.advance_secs(f.interval * 10);
        assert!(matches!(
            f.raffle.perform_upkeep(&[]),
            Err(RaffleError::UpkeepNotNeeded {
                state: RaffleState::Calculating,
                ..
            })
        ));
        assert_eq!(f.coordinator.pending_requests().len(), 1);
    }

    #[test]
    fn test_failed_request_reopens_raffle() {
        let mut f = fixture();
        f.coordinator
            .remove_consumer(f.raffle.config().subscription_id, f.raffle.address())
            .unwrap();
        f.enter_and_wait(1);

        let err = f.raffle.perform_upkeep(&[]).unwrap_err();
        assert!(matches!(
            err,
            RaffleError::Oracle(OracleError::InvalidConsumer { .. })
        ));
        assert_eq!(f.raffle.state(), RaffleState::Open);
        assert!(f.raffle.pending_request().is_none());
    }

    #[test]
    fn test_fulfill_rejects_unknown_request() {
        let mut f = fixture();
        for id in [0, 1] {
            let err = f.deliver(RequestId::new(id), 7).unwrap_err();
            assert!(err.is_unknown_request());
        }

        f.enter_and_wait(1);
        let request_id = f.raffle.perform_upkeep(&[]).unwrap();
        let stale = RequestId::new(request_id.value() + 1);
        assert!(matches!(
            f.deliver(stale, 7),
            Err(RaffleError::UnknownRequest(id)) if id == stale
        ));
        assert_eq!(f.raffle.state(), RaffleState::Calculating);
    }

    #[test]
    fn test_fulfill_rejects_foreign_caller() {
        let mut f = fixture();
        f.enter_and_wait(1);
        let request_id = f.raffle.perform_upkeep(&[]).unwrap();

        let err = f
            .raffle
            .fulfill_random_words(Address::derive("spoofer"), request_id, &[RandomWord::from_u64(1)])
            .unwrap_err();
        assert!(matches!(err, RaffleError::UnauthorizedCaller { .. }));
        assert!(err.is_unknown_request());
        assert_eq!(f.raffle.pending_request(), Some(request_id));
    }

    #[test]
    fn test_fulfill_rejects_empty_words() {
        let mut f = fixture();
        f.enter_and_wait(1);
        let request_id = f.raffle.perform_upkeep(&[]).unwrap();

        let caller = f.coordinator.address();
        assert!(matches!(
            f.raffle.fulfill_random_words(caller, request_id, &[]),
            Err(RaffleError::Oracle(OracleError::NoRandomWords))
        ));
        assert_eq!(f.raffle.pending_request(), Some(request_id));
    }

    #[test]
    fn test_replayed_fulfillment_rejected() {
        let mut f = fixture();
        f.enter_and_wait(1);
        let request_id = f.raffle.perform_upkeep(&[]).unwrap();

        f.deliver(request_id, 7).unwrap();
        assert!(matches!(
            f.deliver(request_id, 7),
            Err(RaffleError::UnknownRequest(_))
        ));
    }

    #[test]
    fn test_single_player_wins_everything() {
        let mut f = fixture();
        f.enter_and_wait(1);
        let request_id = f.raffle.perform_upkeep(&[]).unwrap();

        let winner = f.deliver(request_id, 7).unwrap();

        assert_eq!(winner, player(0));
        assert_eq!(f.bank.balance_of(&player(0)), f.fee);
        assert_eq!(f.raffle.recent_winner(), Some(player(0)));
    }

    #[test]
    fn test_five_players_index_by_modulo() {
        let mut f = fixture();
        let mut events = f.raffle.events().subscribe();
        f.enter_and_wait(5);
        let started_at = f.raffle.last_timestamp();
        let request_id = f.raffle.perform_upkeep(&[]).unwrap();

        let winner = f.deliver(request_id, 12).unwrap();

        assert_eq!(winner, player(2));
        assert_eq!(f.bank.balance_of(&player(2)), f.fee.checked_mul(5).unwrap());
        assert_eq!(f.raffle.number_of_players(), 0);
        assert!(f.raffle.pooled_balance().is_zero());
        assert_eq!(f.raffle.state(), RaffleState::Open);
        assert!(f.raffle.last_timestamp() > started_at);
        assert!(f.raffle.pending_request().is_none());
        assert_eq!(f.raffle.round(), 2);
        assert!(f.raffle.player(0).is_err());

        let picked = std::iter::from_fn(|| events.try_recv().ok())
            .find(|e| matches!(e, RaffleEvent::WinnerPicked { .. }))
            .unwrap();
        match picked {
            RaffleEvent::WinnerPicked {
                winner,
                round,
                payout,
                players,
                ..
            } => {
                assert_eq!(winner, player(2));
                assert_eq!(round, 1);
                assert_eq!(payout, f.fee.checked_mul(5).unwrap());
                assert_eq!(players, 5);
            }
            _ => unreachable!(),
        }
    }

    #[test]
    fn test_zero_players_never_draws_even_after_interval() {
        let mut f = fixture();
        f.clock.advance_secs(f.interval * 3);
        assert!(matches!(
            f.raffle.perform_upkeep(&[]),
            Err(RaffleError::UpkeepNotNeeded {
                players: 0,
                balance: Amount::ZERO,
                ..
            })
        ));
    }

    #[test]
    fn test_rounds_are_independent() {
        let mut f = fixture();
        f.enter_and_wait(3);
        let first = f.raffle.perform_upkeep(&[]).unwrap();
        f.deliver(first, 1).unwrap();

        f.raffle.enter(player(9), f.fee).unwrap();
        assert_eq!(f.raffle.players(), &[player(9)]);
        assert_eq!(f.raffle.pooled_balance(), f.fee);

        f.clock.advance_secs(f.interval + 1);
        let second = f.raffle.perform_upkeep(&[]).unwrap();
        assert_ne!(first, second);
        assert_eq!(f.deliver(second, 123).unwrap(), player(9));
        assert_eq!(f.bank.balance_of(&player(9)), f.fee);
        assert_eq!(f.raffle.round(), 3);
    }

    #[test]
    fn test_failed_transfer_rolls_back_everything() {
        let mut f = fixture();
        f.enter_and_wait(5);
        let request_id = f.raffle.perform_upkeep(&[]).unwrap();
        let before = f.raffle.snapshot();
        f.bank.refuse_transfers_to(player(2));

        let err = f.deliver(request_id, 12).unwrap_err();
        assert!(matches!(err, RaffleError::TransferFailed { to, .. } if to == player(2)));
        assert_eq!(f.raffle.snapshot(), before);
        assert_eq!(f.raffle.state(), RaffleState::Calculating);
        assert!(f.bank.balance_of(&player(2)).is_zero());

        f.bank.accept_transfers_to(&player(2));
        assert_eq!(f.deliver(request_id, 12).unwrap(), player(2));
        assert_eq!(f.bank.balance_of(&player(2)), f.fee.checked_mul(5).unwrap());
    }
}
