use crate::types::{Address, Amount, RequestId};
use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::sync::{broadcast, mpsc};

const EVENT_BUS_CAPACITY: usize = 256;

/// Observable events emitted by the raffle after each committed operation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum RaffleEvent {
    RaffleEnter {
        player: Address,
    },
    RequestedRaffleWinner {
        request_id: RequestId,
    },
    WinnerPicked {
        winner: Address,
        round: u64,
        request_id: RequestId,
        payout: Amount,
        players: usize,
        timestamp: DateTime<Utc>,
    },
}

/// Fan-out of raffle events. Publishing never blocks and never fails; with
/// no subscribers the event is simply dropped.
///
/// Broadcast subscribers that fall more than the bus capacity behind lose
/// the oldest events. Completed-round subscribers get every `WinnerPicked`
/// over an unbounded queue instead. All receivers close once the last clone
/// of the bus is dropped.
#[derive(Debug, Clone)]
pub struct EventBus {
    tx: broadcast::Sender<RaffleEvent>,
    completed_rounds: Arc<Mutex<Vec<mpsc::UnboundedSender<RaffleEvent>>>>,
}

impl EventBus {
    pub fn new() -> Self {
        let (tx, _) = broadcast::channel(EVENT_BUS_CAPACITY);
        Self {
            tx,
            completed_rounds: Arc::new(Mutex::new(Vec::new())),
        }
    }

    pub fn publish(&self, event: RaffleEvent) {
        tracing::debug!(?event, "Publishing raffle event");
        if matches!(event, RaffleEvent::WinnerPicked { .. }) {
            self.completed_rounds
                .lock()
                .retain(|tx| tx.send(event.clone()).is_ok());
        }
        let _ = self.tx.send(event);
    }

    pub fn subscribe(&self) -> broadcast::Receiver<RaffleEvent> {
        self.tx.subscribe()
    }

    /// Every `WinnerPicked` published from now on, none skipped.
    pub fn subscribe_completed_rounds(&self) -> mpsc::UnboundedReceiver<RaffleEvent> {
        let (tx, rx) = mpsc::unbounded_channel();
        self.completed_rounds.lock().push(tx);
        rx
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn winner_picked(round: u64) -> RaffleEvent {
        RaffleEvent::WinnerPicked {
            winner: Address::derive("alice"),
            round,
            request_id: RequestId::new(round),
            payout: Amount::from_wei(100),
            players: 1,
            timestamp: Utc::now(),
        }
    }

    #[test]
    fn test_completed_rounds_survive_a_flood_of_entries() {
        let bus = EventBus::new();
        let mut events = bus.subscribe();
        let mut rounds = bus.subscribe_completed_rounds();

        bus.publish(winner_picked(1));
        for _ in 0..EVENT_BUS_CAPACITY + 44 {
            bus.publish(RaffleEvent::RaffleEnter {
                player: Address::derive("bob"),
            });
        }
        bus.publish(winner_picked(2));

        assert!(matches!(
            events.try_recv(),
            Err(broadcast::error::TryRecvError::Lagged(_))
        ));
        assert!(matches!(rounds.try_recv().unwrap(), RaffleEvent::WinnerPicked { round: 1, .. }));
        assert!(matches!(rounds.try_recv().unwrap(), RaffleEvent::WinnerPicked { round: 2, .. }));
        assert!(rounds.try_recv().is_err());
    }

    #[test]
    fn test_completed_rounds_close_with_the_bus() {
        let bus = EventBus::new();
        let mut rounds = bus.subscribe_completed_rounds();
        let clone = bus.clone();

        drop(bus);
        assert!(matches!(
            rounds.try_recv(),
            Err(mpsc::error::TryRecvError::Empty)
        ));
        drop(clone);
        assert!(matches!(
            rounds.try_recv(),
            Err(mpsc::error::TryRecvError::Disconnected)
        ));
    }
}
