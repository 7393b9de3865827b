use crate::events::RaffleEvent;
use crate::storage::{RoundRecord, RoundStore, Storage};
use crate::types::Address;
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

/// Persists every completed round of one raffle as it is announced.
pub struct RoundRecorder {
    storage: Arc<Storage>,
    raffle: Address,
}

impl RoundRecorder {
    pub fn new(storage: Arc<Storage>, raffle: Address) -> Self {
        Self { storage, raffle }
    }

    /// Record until the event bus closes. Takes a completed-round
    /// subscription, so no round is lost however far behind the task runs.
    pub fn spawn(self, mut rounds: mpsc::UnboundedReceiver<RaffleEvent>) -> JoinHandle<()> {
        tokio::spawn(async move {
            while let Some(event) = rounds.recv().await {
                self.handle(event).await;
            }
            tracing::debug!("Round recorder for {} stopped", self.raffle);
        })
    }

    async fn handle(&self, event: RaffleEvent) {
        let RaffleEvent::WinnerPicked {
            winner,
            round,
            request_id,
            payout,
            players,
            timestamp,
        } = event
        else {
            return;
        };

        let record = RoundRecord::new(
            self.raffle,
            round,
            request_id,
            winner,
            payout,
            players,
            timestamp,
        );
        if let Err(e) = RoundStore::new(&self.storage).save_round(&record).await {
            tracing::error!("Failed to record round {} of {}: {}", round, self.raffle, e);
        }
    }
}
