use crate::ledger::EntryLedger;
use crate::types::RaffleState;
use chrono::{DateTime, Utc};
use std::time::Duration;

/// Result of a readiness check. `perform_data` is passed back verbatim to
/// `perform_upkeep` and is currently always empty.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UpkeepCheck {
    pub upkeep_needed: bool,
    pub perform_data: Vec<u8>,
}

/// Read-only view of everything the readiness predicate looks at.
#[derive(Debug, Clone, Copy)]
pub struct UpkeepInputs<'a> {
    pub state: RaffleState,
    pub last_timestamp: DateTime<Utc>,
    pub now: DateTime<Utc>,
    pub interval: Duration,
    pub ledger: &'a EntryLedger,
}

pub struct UpkeepEvaluator;

impl UpkeepEvaluator {
    pub fn check(inputs: &UpkeepInputs<'_>) -> UpkeepCheck {
        let is_open = inputs.state == RaffleState::Open;
        let time_passed = Self::interval_elapsed(inputs);
        let has_players = !inputs.ledger.is_empty();
        let has_balance = !inputs.ledger.pooled_balance().is_zero();

        let upkeep_needed = is_open && time_passed && has_players && has_balance;

        tracing::debug!(
            is_open,
            time_passed,
            has_players,
            has_balance,
            upkeep_needed,
            "Evaluated upkeep"
        );

        UpkeepCheck {
            upkeep_needed,
            perform_data: Vec::new(),
        }
    }

    // A clock that went backwards never counts as elapsed.
    fn interval_elapsed(inputs: &UpkeepInputs<'_>) -> bool {
        (inputs.now - inputs.last_timestamp)
            .to_std()
            .map(|elapsed| elapsed >= inputs.interval)
            .unwrap_or(false)
    }
}
