use super::{FulfillmentChannel, RandomnessConsumer, RandomnessCoordinator, RandomnessRequest};
use crate::error::{OracleError, Result};
use crate::types::{Address, Amount, RandomWord, RequestId};
use parking_lot::Mutex;
use sha2::{Digest, Sha256};
use std::collections::{HashMap, HashSet};

pub const MAX_NUM_WORDS: u32 = 500;
pub const MAX_CALLBACK_GAS_LIMIT: u32 = 2_500_000;

#[derive(Debug, Default)]
struct Subscription {
    balance: Amount,
    consumers: HashSet<Address>,
}

#[derive(Debug, Clone)]
struct PendingRequest {
    subscription_id: u64,
    consumer: Address,
    callback_gas_limit: u32,
    num_words: u32,
}

#[derive(Debug)]
struct MockState {
    next_subscription_id: u64,
    next_request_id: u64,
    subscriptions: HashMap<u64, Subscription>,
    requests: HashMap<RequestId, PendingRequest>,
}

/// In-process coordinator for local networks and tests.
///
/// Fulfillment is manual: nothing is delivered until
/// [`MockCoordinator::fulfill_random_words`] is called for a request id.
#[derive(Debug)]
pub struct MockCoordinator {
    address: Address,
    base_fee: Amount,
    gas_price: Amount,
    state: Mutex<MockState>,
}

impl MockCoordinator {
    pub fn new(base_fee: Amount, gas_price: Amount) -> Self {
        Self::with_address(Address::random(), base_fee, gas_price)
    }

    pub fn with_address(address: Address, base_fee: Amount, gas_price: Amount) -> Self {
        tracing::info!("Deployed mock VRF coordinator at {}", address);
        Self {
            address,
            base_fee,
            gas_price,
            state: Mutex::new(MockState {
                next_subscription_id: 1,
                next_request_id: 1,
                subscriptions: HashMap::new(),
                requests: HashMap::new(),
            }),
        }
    }

    /// Identity used as the caller of every fulfillment.
    pub fn address(&self) -> Address {
        self.address
    }

    pub fn create_subscription(&self) -> u64 {
        let mut state = self.state.lock();
        let id = state.next_subscription_id;
        state.next_subscription_id += 1;
        state.subscriptions.insert(id, Subscription::default());

        tracing::info!("Created subscription {}", id);
        id
    }

    pub fn fund_subscription(
        &self,
        subscription_id: u64,
        amount: Amount,
    ) -> std::result::Result<Amount, OracleError> {
        let mut state = self.state.lock();
        let subscription = state
            .subscriptions
            .get_mut(&subscription_id)
            .ok_or(OracleError::InvalidSubscription(subscription_id))?;

        subscription.balance = subscription
            .balance
            .checked_add(amount)
            .unwrap_or(Amount::from_wei(u128::MAX));

        tracing::info!(
            "Funded subscription {} with {}, balance {}",
            subscription_id,
            amount,
            subscription.balance
        );
        Ok(subscription.balance)
    }

    pub fn add_consumer(
        &self,
        subscription_id: u64,
        consumer: Address,
    ) -> std::result::Result<(), OracleError> {
        let mut state = self.state.lock();
        let subscription = state
            .subscriptions
            .get_mut(&subscription_id)
            .ok_or(OracleError::InvalidSubscription(subscription_id))?;

        subscription.consumers.insert(consumer);
        tracing::info!("Added consumer {} to subscription {}", consumer, subscription_id);
        Ok(())
    }

    pub fn remove_consumer(
        &self,
        subscription_id: u64,
        consumer: Address,
    ) -> std::result::Result<(), OracleError> {
        let mut state = self.state.lock();
        let subscription = state
            .subscriptions
            .get_mut(&subscription_id)
            .ok_or(OracleError::InvalidSubscription(subscription_id))?;

        if !subscription.consumers.remove(&consumer) {
            return Err(OracleError::InvalidConsumer {
                subscription_id,
                consumer,
            });
        }
        Ok(())
    }

    pub fn subscription_balance(&self, subscription_id: u64) -> Option<Amount> {
        self.state
            .lock()
            .subscriptions
            .get(&subscription_id)
            .map(|s| s.balance)
    }

    pub fn pending_requests(&self) -> Vec<RequestId> {
        let mut ids: Vec<RequestId> = self.state.lock().requests.keys().copied().collect();
        ids.sort();
        ids
    }

    /// Deliver words derived from the request id to `consumer`.
    pub fn fulfill_random_words(
        &self,
        request_id: RequestId,
        consumer: &dyn RandomnessConsumer,
    ) -> Result<()> {
        self.fulfill_random_words_with_override(request_id, consumer, Vec::new())
    }

    /// Deliver caller-chosen words. An empty `words` falls back to the
    /// derived ones. The request stays pending if the consumer rejects it.
    ///
    /// A [`FulfillmentChannel`] accepts as soon as the message is queued;
    /// use [`MockCoordinator::fulfill_over_channel`] to wait for the
    /// raffle's verdict instead.
    pub fn fulfill_random_words_with_override(
        &self,
        request_id: RequestId,
        consumer: &dyn RandomnessConsumer,
        words: Vec<RandomWord>,
    ) -> Result<()> {
        let (request, payment, words) = self.prepare_fulfillment(request_id, words)?;

        // Lock released: the consumer may call back into us.
        if let Err(e) = consumer.raw_fulfill_random_words(self.address, request_id, words) {
            tracing::warn!(
                "Consumer {} rejected fulfillment of request {}: {}",
                request.consumer,
                request_id,
                e
            );
            return Err(e);
        }

        self.settle(request_id, &request, payment);
        Ok(())
    }

    /// Deliver through `channel` and settle only once the listener reports
    /// that the consumer accepted. A rejection leaves the request pending
    /// and the subscription uncharged, so it can be delivered again.
    pub async fn fulfill_over_channel(
        &self,
        request_id: RequestId,
        channel: &FulfillmentChannel,
        words: Vec<RandomWord>,
    ) -> Result<()> {
        let (request, payment, words) = self.prepare_fulfillment(request_id, words)?;

        if let Err(e) = channel.deliver(self.address, request_id, words).await {
            tracing::warn!(
                "Consumer {} rejected fulfillment of request {}: {}",
                request.consumer,
                request_id,
                e
            );
            return Err(e);
        }

        self.settle(request_id, &request, payment);
        Ok(())
    }

    fn prepare_fulfillment(
        &self,
        request_id: RequestId,
        words: Vec<RandomWord>,
    ) -> Result<(PendingRequest, Amount, Vec<RandomWord>)> {
        let state = self.state.lock();
        let request = state
            .requests
            .get(&request_id)
            .cloned()
            .ok_or(OracleError::NonexistentRequest(request_id))?;

        let payment = self.fulfillment_cost(request.callback_gas_limit);
        let available = state
            .subscriptions
            .get(&request.subscription_id)
            .map(|s| s.balance)
            .ok_or(OracleError::InvalidSubscription(request.subscription_id))?;
        if available < payment {
            return Err(OracleError::InsufficientBalance {
                need: payment,
                available,
            }
            .into());
        }

        let words = if words.is_empty() {
            derive_words(request_id, request.num_words)
        } else {
            words
        };
        Ok((request, payment, words))
    }

    fn settle(&self, request_id: RequestId, request: &PendingRequest, payment: Amount) {
        let mut state = self.state.lock();
        state.requests.remove(&request_id);
        if let Some(subscription) = state.subscriptions.get_mut(&request.subscription_id) {
            subscription.balance = subscription
                .balance
                .checked_sub(payment)
                .unwrap_or(Amount::ZERO);
        }

        tracing::info!(
            "Fulfilled request {} for {} (charged {})",
            request_id,
            request.consumer,
            payment
        );
    }

    fn fulfillment_cost(&self, callback_gas_limit: u32) -> Amount {
        self.gas_price
            .checked_mul(callback_gas_limit as u128)
            .and_then(|gas| gas.checked_add(self.base_fee))
            .unwrap_or(Amount::from_wei(u128::MAX))
    }
}

impl RandomnessCoordinator for MockCoordinator {
    fn address(&self) -> Address {
        self.address
    }

    fn request_random_words(
        &self,
        consumer: Address,
        request: &RandomnessRequest,
    ) -> std::result::Result<RequestId, OracleError> {
        if request.num_words > MAX_NUM_WORDS {
            return Err(OracleError::NumWordsTooBig {
                have: request.num_words,
                max: MAX_NUM_WORDS,
            });
        }
        if request.callback_gas_limit > MAX_CALLBACK_GAS_LIMIT {
            return Err(OracleError::GasLimitTooBig {
                have: request.callback_gas_limit,
                max: MAX_CALLBACK_GAS_LIMIT,
            });
        }

        let mut state = self.state.lock();
        let subscription = state
            .subscriptions
            .get(&request.subscription_id)
            .ok_or(OracleError::InvalidSubscription(request.subscription_id))?;
        if !subscription.consumers.contains(&consumer) {
            return Err(OracleError::InvalidConsumer {
                subscription_id: request.subscription_id,
                consumer,
            });
        }

        let request_id = RequestId::new(state.next_request_id);
        state.next_request_id += 1;
        state.requests.insert(
            request_id,
            PendingRequest {
                subscription_id: request.subscription_id,
                consumer,
                callback_gas_limit: request.callback_gas_limit,
                num_words: request.num_words,
            },
        );

        tracing::info!(
            "Random words requested: id {} by {} (key hash {}, {} words)",
            request_id,
            consumer,
            request.key_hash,
            request.num_words
        );
        Ok(request_id)
    }
}

/// `sha256(request_id || index)` for each requested word.
fn derive_words(request_id: RequestId, num_words: u32) -> Vec<RandomWord> {
    (0..num_words)
        .map(|index| {
            let mut hasher = Sha256::new();
            hasher.update(request_id.value().to_be_bytes());
            hasher.update(index.to_be_bytes());
            RandomWord::from_bytes(hasher.finalize().into())
        })
        .collect()
}
