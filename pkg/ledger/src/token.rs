use std::{collections::HashMap, sync::Arc};

use parking_lot::RwLock;
use primitives::{Address, Amount};
use tracing::debug;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TokenError {
    #[error("insufficient balance for {holder}: have {balance}, need {required}")]
    InsufficientBalance {
        holder: Address,
        balance: Amount,
        required: Amount,
    },

    #[error("insufficient allowance from {owner} to {spender}: have {allowance}, need {required}")]
    InsufficientAllowance {
        owner: Address,
        spender: Address,
        allowance: Amount,
        required: Amount,
    },

    #[error("balance overflow for {holder}")]
    Overflow { holder: Address },
}

/// The fungible token the pool holds in custody
///
/// Modelled on an ERC-20: holders approve the pool as a spender, the pool pulls deposits with
/// [`Token::transfer_from`] and pays out of its own balance with [`Token::transfer`].
pub trait Token: Send + Sync {
    fn balance_of(&self, holder: &Address) -> Amount;

    fn allowance(&self, owner: &Address, spender: &Address) -> Amount;

    /// Move `amount` out of `from`'s own balance
    fn transfer(&self, from: Address, to: Address, amount: Amount) -> Result<(), TokenError>;

    /// Move `amount` from `owner` to `to` on `spender`'s allowance
    fn transfer_from(
        &self,
        spender: Address,
        owner: Address,
        to: Address,
        amount: Amount,
    ) -> Result<(), TokenError>;
}

impl<T: Token + ?Sized> Token for Arc<T> {
    fn balance_of(&self, holder: &Address) -> Amount {
        (**self).balance_of(holder)
    }

    fn allowance(&self, owner: &Address, spender: &Address) -> Amount {
        (**self).allowance(owner, spender)
    }

    fn transfer(&self, from: Address, to: Address, amount: Amount) -> Result<(), TokenError> {
        (**self).transfer(from, to, amount)
    }

    fn transfer_from(
        &self,
        spender: Address,
        owner: Address,
        to: Address,
        amount: Amount,
    ) -> Result<(), TokenError> {
        (**self).transfer_from(spender, owner, to, amount)
    }
}

#[derive(Debug, Default)]
struct Balances {
    balances: HashMap<Address, Amount>,
    allowances: HashMap<(Address, Address), Amount>,
}

impl Balances {
    fn balance(&self, holder: &Address) -> Amount {
        self.balances.get(holder).copied().unwrap_or_default()
    }

    fn move_funds(&mut self, from: Address, to: Address, amount: Amount) -> Result<(), TokenError> {
        let balance = self.balance(&from);
        let debited = balance
            .checked_sub(amount)
            .map_err(|_| TokenError::InsufficientBalance {
                holder: from,
                balance,
                required: amount,
            })?;

        if from == to {
            return Ok(());
        }

        let credited = self
            .balance(&to)
            .checked_add(amount)
            .map_err(|_| TokenError::Overflow { holder: to })?;

        self.balances.insert(from, debited);
        self.balances.insert(to, credited);

        Ok(())
    }
}

/// An in-process [`Token`] with mint, for tests and local simulation
#[derive(Debug, Default)]
pub struct InMemoryToken {
    state: RwLock<Balances>,
}

impl InMemoryToken {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn mint(&self, to: Address, amount: Amount) -> Result<(), TokenError> {
        let mut state = self.state.write();
        let balance = state
            .balance(&to)
            .checked_add(amount)
            .map_err(|_| TokenError::Overflow { holder: to })?;
        state.balances.insert(to, balance);

        debug!(%to, %amount, "minted");
        Ok(())
    }

    pub fn approve(&self, owner: Address, spender: Address, amount: Amount) {
        self.state.write().allowances.insert((owner, spender), amount);
    }
}

impl Token for InMemoryToken {
    fn balance_of(&self, holder: &Address) -> Amount {
        self.state.read().balance(holder)
    }

    fn allowance(&self, owner: &Address, spender: &Address) -> Amount {
        self.state
            .read()
            .allowances
            .get(&(*owner, *spender))
            .copied()
            .unwrap_or_default()
    }

    fn transfer(&self, from: Address, to: Address, amount: Amount) -> Result<(), TokenError> {
        self.state.write().move_funds(from, to, amount)
    }

    fn transfer_from(
        &self,
        spender: Address,
        owner: Address,
        to: Address,
        amount: Amount,
    ) -> Result<(), TokenError> {
        let mut state = self.state.write();

        let allowance = state
            .allowances
            .get(&(owner, spender))
            .copied()
            .unwrap_or_default();
        let remaining =
            allowance
                .checked_sub(amount)
                .map_err(|_| TokenError::InsufficientAllowance {
                    owner,
                    spender,
                    allowance,
                    required: amount,
                })?;

        state.move_funds(owner, to, amount)?;
        state.allowances.insert((owner, spender), remaining);

        Ok(())
    }
}
