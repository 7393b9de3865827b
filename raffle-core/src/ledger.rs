use crate::error::{RaffleError, Result};
use crate::types::{Address, Amount};

/// Participants of the current round and the balance they paid in.
///
/// Duplicates are allowed: every entry is one more chance to win.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EntryLedger {
    players: Vec<Address>,
    pooled_balance: Amount,
}

impl EntryLedger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append an entry. Nothing changes if the balance would overflow.
    pub fn record(&mut self, participant: Address, payment: Amount) -> Result<()> {
        let pooled_balance = self
            .pooled_balance
            .checked_add(payment)
            .ok_or_else(|| RaffleError::internal("Pooled balance overflow"))?;

        self.players.push(participant);
        self.pooled_balance = pooled_balance;
        Ok(())
    }

    pub fn player(&self, index: usize) -> Result<Address> {
        self.players
            .get(index)
            .copied()
            .ok_or(RaffleError::PlayerIndexOutOfRange {
                index,
                len: self.players.len(),
            })
    }

    pub fn players(&self) -> &[Address] {
        &self.players
    }

    pub fn len(&self) -> usize {
        self.players.len()
    }

    pub fn is_empty(&self) -> bool {
        self.players.is_empty()
    }

    pub fn pooled_balance(&self) -> Amount {
        self.pooled_balance
    }

    /// Empty the ledger, handing back what it held.
    pub fn take(&mut self) -> EntryLedger {
        std::mem::take(self)
    }
}
