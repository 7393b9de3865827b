use crate::types::{Address, Amount, RaffleState, RequestId};
use thiserror::Error;

pub type Result<T> = std::result::Result<T, RaffleError>;

#[derive(Error, Debug)]
pub enum RaffleError {
    #[error("Insufficient payment: sent {sent}, entrance fee is {required}")]
    InsufficientPayment { sent: Amount, required: Amount },

    #[error("Raffle is not open")]
    RaffleNotOpen,

    #[error("Upkeep not needed: balance {balance}, players {players}, state {state}")]
    UpkeepNotNeeded {
        balance: Amount,
        players: usize,
        state: RaffleState,
    },

    #[error("Unknown randomness request: {0}")]
    UnknownRequest(RequestId),

    /// A fulfillment from anyone but the configured coordinator. Reported
    /// separately from `UnknownRequest` for diagnostics, but treated as an
    /// unknown request; see [`RaffleError::is_unknown_request`].
    #[error("Unauthorized fulfillment caller {caller}, expected {expected}")]
    UnauthorizedCaller { caller: Address, expected: Address },

    #[error("Transfer of {amount} to {to} failed: {reason}")]
    TransferFailed {
        to: Address,
        amount: Amount,
        reason: String,
    },

    #[error("Player index {index} out of range ({len} players)")]
    PlayerIndexOutOfRange { index: usize, len: usize },

    #[error("Oracle error: {0}")]
    Oracle(#[from] OracleError),

    #[error("Storage error: {0}")]
    Storage(#[from] rusqlite::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Invalid configuration: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl RaffleError {
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    pub fn internal(msg: impl Into<String>) -> Self {
        Self::Internal(msg.into())
    }

    /// True for fulfillments that do not belong to the outstanding request,
    /// whether mismatched by id or delivered by the wrong caller.
    pub fn is_unknown_request(&self) -> bool {
        matches!(
            self,
            Self::UnknownRequest(_) | Self::UnauthorizedCaller { .. }
        )
    }
}

/// Failures raised by a randomness coordinator.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum OracleError {
    #[error("nonexistent request")]
    NonexistentRequest(RequestId),

    #[error("invalid subscription {0}")]
    InvalidSubscription(u64),

    #[error("invalid consumer {consumer} for subscription {subscription_id}")]
    InvalidConsumer {
        subscription_id: u64,
        consumer: Address,
    },

    #[error("insufficient subscription balance: need {need}, have {available}")]
    InsufficientBalance { need: Amount, available: Amount },

    #[error("num words too big: {have} > {max}")]
    NumWordsTooBig { have: u32, max: u32 },

    #[error("gas limit too big: {have} > {max}")]
    GasLimitTooBig { have: u32, max: u32 },

    #[error("no random words delivered")]
    NoRandomWords,
}
