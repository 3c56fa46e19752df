//! The bank's account table: client accounts and their balances.
//!
//! An account is opened for a client with a starting balance. A client may hold several. The
//! balance bounds what the client may withdraw as tokens; see [`Wallet::with_funds`].
//!
//! [`Wallet::with_funds`]: crate::wallet::Wallet::with_funds

use crate::{Amount, Error};
use serde::{Deserialize, Serialize};
use std::{collections::BTreeMap, fmt};
use tracing::{debug, info};

/// Identifier of an account, unique within one [`AccountLedger`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct AccountId(u64);

impl fmt::Display for AccountId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "acct-{}", self.0)
    }
}

/// An account record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Account {
    /// Identifier.
    pub id: AccountId,
    /// The client that owns the account.
    pub client_id: String,
    /// Current balance.
    pub balance: Amount,
}

/// An in-memory account table.
#[derive(Debug, Default)]
pub struct AccountLedger {
    accounts: BTreeMap<AccountId, Account>,
    next_id: u64,
}

impl AccountLedger {
    /// An empty table.
    pub fn new() -> Self {
        Self::default()
    }

    /// Open an account for `client_id` holding `initial_balance`.
    pub fn create(&mut self, client_id: &str, initial_balance: Amount) -> &Account {
        self.next_id += 1;
        let id = AccountId(self.next_id);
        info!(%id, client_id, balance = %initial_balance, "opened account");
        self.accounts.entry(id).or_insert(Account {
            id,
            client_id: client_id.to_string(),
            balance: initial_balance,
        })
    }

    /// Look up an account.
    pub fn get(&self, id: AccountId) -> Result<&Account, Error> {
        self.accounts.get(&id).ok_or(Error::UnknownAccount(id))
    }

    /// Every account owned by `client_id`, by id.
    pub fn by_client(&self, client_id: &str) -> Vec<&Account> {
        self.accounts
            .values()
            .filter(|account| account.client_id == client_id)
            .collect()
    }

    /// Replace an account's balance.
    pub fn update_balance(&mut self, id: AccountId, balance: Amount) -> Result<&Account, Error> {
        let account = self.accounts.get_mut(&id).ok_or(Error::UnknownAccount(id))?;
        debug!(%id, from = %account.balance, to = %balance, "updated account balance");
        account.balance = balance;
        Ok(account)
    }

    /// Take `amount` out of an account, refusing to overdraw it.
    pub fn withdraw(&mut self, id: AccountId, amount: Amount) -> Result<&Account, Error> {
        let balance = self.get(id)?.balance;
        let remaining = balance
            .value()
            .checked_sub(amount.value())
            .ok_or(Error::InsufficientFunds {
                balance,
                requested: amount,
            })?;
        self.update_balance(id, Amount::from(remaining))
    }
}
