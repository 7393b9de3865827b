//! Randomness oracle seams.
//!
//! The raffle talks to the oracle through two traits: it issues requests via
//! [`RandomnessCoordinator`] and receives results via [`RandomnessConsumer`].
//! The result arrives later, pushed by the coordinator, and is matched to the
//! outstanding request by id.

pub mod channel;
pub mod mock;

pub use channel::{fulfillment_channel, spawn_fulfillment_listener, Fulfillment, FulfillmentChannel};
pub use mock::MockCoordinator;

use crate::error::{OracleError, Result};
use crate::types::{Address, KeyHash, RandomWord, RequestId};
use serde::{Deserialize, Serialize};

/// Parameters of a single randomness request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RandomnessRequest {
    pub key_hash: KeyHash,
    pub subscription_id: u64,
    pub request_confirmations: u16,
    pub callback_gas_limit: u32,
    pub num_words: u32,
}

/// Outbound side: the coordinator accepts a request and hands back its id.
/// The random words are delivered later through a [`RandomnessConsumer`].
pub trait RandomnessCoordinator: Send + Sync {
    /// Identity the coordinator uses when it calls back into consumers.
    fn address(&self) -> Address;

    fn request_random_words(
        &self,
        consumer: Address,
        request: &RandomnessRequest,
    ) -> std::result::Result<RequestId, OracleError>;
}

/// Inbound side: receives `(request id, words)` pushed by a coordinator.
pub trait RandomnessConsumer: Send + Sync {
    fn raw_fulfill_random_words(
        &self,
        caller: Address,
        request_id: RequestId,
        words: Vec<RandomWord>,
    ) -> Result<()>;
}
