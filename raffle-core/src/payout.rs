use crate::error::{RaffleError, Result};
use crate::types::{Address, Amount};
use parking_lot::RwLock;
use std::collections::{HashMap, HashSet};

/// Moves the pooled balance out of the raffle to the winner.
pub trait FundsTransfer: Send + Sync {
    fn transfer(&self, to: Address, amount: Amount) -> Result<()>;
}

/// Account balances kept in memory. Addresses can be marked as refusing
/// incoming transfers to exercise the failed-payout path.
#[derive(Debug, Default)]
pub struct InMemoryBank {
    balances: RwLock<HashMap<Address, Amount>>,
    refusing: RwLock<HashSet<Address>>,
}

impl InMemoryBank {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn balance_of(&self, address: &Address) -> Amount {
        self.balances
            .read()
            .get(address)
            .copied()
            .unwrap_or(Amount::ZERO)
    }

    pub fn refuse_transfers_to(&self, address: Address) {
        self.refusing.write().insert(address);
    }

    pub fn accept_transfers_to(&self, address: &Address) {
        self.refusing.write().remove(address);
    }
}

impl FundsTransfer for InMemoryBank {
    fn transfer(&self, to: Address, amount: Amount) -> Result<()> {
        if self.refusing.read().contains(&to) {
            return Err(RaffleError::TransferFailed {
                to,
                amount,
                reason: "recipient refused the transfer".to_string(),
            });
        }

        let mut balances = self.balances.write();
        let balance = balances.entry(to).or_insert(Amount::ZERO);
        *balance = balance
            .checked_add(amount)
            .ok_or_else(|| RaffleError::internal(format!("Balance overflow for {}", to)))?;

        tracing::debug!("Transferred {} to {}", amount, to);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transfer_credits_recipient() {
        let bank = InMemoryBank::new();
        let alice = Address::derive("alice");

        bank.transfer(alice, Amount::from_wei(40)).unwrap();
        bank.transfer(alice, Amount::from_wei(2)).unwrap();
        assert_eq!(bank.balance_of(&alice), Amount::from_wei(42));
    }

    #[test]
    fn test_refusing_recipient() {
        let bank = InMemoryBank::new();
        let alice = Address::derive("alice");
        bank.refuse_transfers_to(alice);

        assert!(matches!(
            bank.transfer(alice, Amount::from_wei(1)),
            Err(RaffleError::TransferFailed { .. })
        ));
        assert!(bank.balance_of(&alice).is_zero());

        bank.accept_transfers_to(&alice);
        assert!(bank.transfer(alice, Amount::from_wei(1)).is_ok());
    }
}
