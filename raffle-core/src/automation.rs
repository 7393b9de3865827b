use crate::error::RaffleError;
use crate::service::RaffleHandle;
use crate::types::RequestId;
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;

/// Automation trigger: periodically asks the raffle whether a draw is due
/// and starts it when it is.
#[derive(Debug, Clone)]
pub struct Keeper {
    raffle: RaffleHandle,
    poll_every: Duration,
}

impl Keeper {
    pub fn new(raffle: RaffleHandle, poll_every: Duration) -> Self {
        Self { raffle, poll_every }
    }

    /// One check-then-perform cycle. Returns the request id when a draw started.
    pub fn poll_once(&self) -> Option<RequestId> {
        let check = self.raffle.check_upkeep(&[]);
        if !check.upkeep_needed {
            tracing::debug!("Keeper poll: upkeep not needed");
            return None;
        }

        match self.raffle.perform_upkeep(&check.perform_data) {
            Ok(request_id) => {
                tracing::info!("Keeper started draw, request {}", request_id);
                Some(request_id)
            }
            // Someone else won the race between check and perform.
            Err(e @ RaffleError::UpkeepNotNeeded { .. }) => {
                tracing::debug!("Keeper perform rejected: {}", e);
                None
            }
            Err(e) => {
                tracing::warn!("Keeper failed to perform upkeep: {}", e);
                None
            }
        }
    }

    /// Poll until `shutdown` becomes true or its sender is dropped.
    pub async fn run(self, mut shutdown: watch::Receiver<bool>) {
        let mut ticker = tokio::time::interval(self.poll_every);
        tracing::info!(
            "Keeper polling raffle {} every {:?}",
            self.raffle.address(),
            self.poll_every
        );

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    self.poll_once();
                }
                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        break;
                    }
                }
            }
        }

        tracing::info!("Keeper stopped");
    }

    pub fn spawn(self) -> (JoinHandle<()>, watch::Sender<bool>) {
        let (tx, rx) = watch::channel(false);
        let task = tokio::spawn(self.run(rx));
        (task, tx)
    }
}
