use super::RandomnessConsumer;
use crate::error::{RaffleError, Result};
use crate::types::{Address, RandomWord, RequestId};
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;

/// A fulfillment in flight from the coordinator to the raffle.
#[derive(Debug)]
pub struct Fulfillment {
    pub coordinator: Address,
    pub request_id: RequestId,
    pub words: Vec<RandomWord>,
    /// Receives the consumer's verdict once the message is applied.
    pub ack: Option<oneshot::Sender<Result<()>>>,
}

/// Consumer that queues fulfillments instead of applying them inline.
///
/// Handing one of these to a coordinator decouples delivery from the
/// coordinator's call: the listener applies messages on its own schedule.
#[derive(Debug, Clone)]
pub struct FulfillmentChannel {
    tx: mpsc::UnboundedSender<Fulfillment>,
}

pub fn fulfillment_channel() -> (FulfillmentChannel, mpsc::UnboundedReceiver<Fulfillment>) {
    let (tx, rx) = mpsc::unbounded_channel();
    (FulfillmentChannel { tx }, rx)
}

impl FulfillmentChannel {
    /// Queue a fulfillment and wait for the consumer to accept or reject it.
    pub async fn deliver(
        &self,
        caller: Address,
        request_id: RequestId,
        words: Vec<RandomWord>,
    ) -> Result<()> {
        let (ack, verdict) = oneshot::channel();
        self.tx
            .send(Fulfillment {
                coordinator: caller,
                request_id,
                words,
                ack: Some(ack),
            })
            .map_err(|_| RaffleError::internal("Fulfillment listener has shut down"))?;

        verdict.await.map_err(|_| {
            RaffleError::internal(format!(
                "Fulfillment listener dropped request {} without a verdict",
                request_id
            ))
        })?
    }
}

impl RandomnessConsumer for FulfillmentChannel {
    fn raw_fulfill_random_words(
        &self,
        caller: Address,
        request_id: RequestId,
        words: Vec<RandomWord>,
    ) -> Result<()> {
        self.tx
            .send(Fulfillment {
                coordinator: caller,
                request_id,
                words,
                ack: None,
            })
            .map_err(|_| RaffleError::internal("Fulfillment listener has shut down"))?;

        tracing::debug!("Queued fulfillment for request {}", request_id);
        Ok(())
    }
}

/// Apply queued fulfillments to `consumer` until every sender is dropped.
/// Senders that asked for a verdict get the consumer's result back.
///
/// Messages are handled in arrival order, but acceptance is decided by the
/// consumer matching request ids, so stale or spoofed messages are dropped
/// with a warning.
pub fn spawn_fulfillment_listener<C>(
    consumer: C,
    mut rx: mpsc::UnboundedReceiver<Fulfillment>,
) -> JoinHandle<()>
where
    C: RandomnessConsumer + 'static,
{
    tokio::spawn(async move {
        while let Some(message) = rx.recv().await {
            let request_id = message.request_id;
            let result = consumer.raw_fulfill_random_words(
                message.coordinator,
                message.request_id,
                message.words,
            );
            match &result {
                Ok(()) => tracing::debug!("Applied fulfillment for request {}", request_id),
                Err(e) => tracing::warn!("Dropped fulfillment for request {}: {}", request_id, e),
            }
            if let Some(ack) = message.ack {
                let _ = ack.send(result);
            }
        }
        tracing::debug!("Fulfillment listener stopped");
    })
}
