//! Account storage.
//!
//! Accounts are handed out as [`AccountHandle`]s. Holding the handle's lock
//! is the only way to mutate an account, which serialises every operation
//! on one account while leaving different accounts independent.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, RwLock};

use crate::account::Account;
use crate::error::{LedgerError, Result};

pub type AccountHandle = Arc<Mutex<Account>>;

pub trait AccountRepository: Send + Sync {
    /// Returns the account for `address`, creating an empty one if needed.
    fn get_or_create(&self, address: &str) -> AccountHandle;

    fn get(&self, address: &str) -> Result<AccountHandle>;

    fn addresses(&self) -> Vec<String>;
}

/// Locks an account, recovering the data if a previous holder panicked.
pub fn lock(handle: &AccountHandle) -> MutexGuard<'_, Account> {
    handle.lock().unwrap_or_else(PoisonError::into_inner)
}

#[derive(Default)]
pub struct InMemoryAccounts {
    accounts: RwLock<HashMap<String, AccountHandle>>,
}

impl InMemoryAccounts {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.accounts
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl AccountRepository for InMemoryAccounts {
    fn get_or_create(&self, address: &str) -> AccountHandle {
        if let Some(handle) = self
            .accounts
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(address)
        {
            return handle.clone();
        }

        let mut accounts = self.accounts.write().unwrap_or_else(PoisonError::into_inner);
        accounts
            .entry(address.to_string())
            .or_insert_with(|| {
                tracing::info!("opened account {}", address);
                Arc::new(Mutex::new(Account::new(address)))
            })
            .clone()
    }

    fn get(&self, address: &str) -> Result<AccountHandle> {
        self.accounts
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(address)
            .cloned()
            .ok_or_else(|| LedgerError::AccountNotFound(address.to_string()))
    }

    fn addresses(&self) -> Vec<String> {
        self.accounts
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .keys()
            .cloned()
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Currency;
    use rust_decimal_macros::dec;

    #[test]
    fn test_get_or_create_returns_same_account() {
        let repo = InMemoryAccounts::new();
        let a = repo.get_or_create("wallet");
        let b = repo.get_or_create("wallet");
        assert!(Arc::ptr_eq(&a, &b));
        assert_eq!(repo.len(), 1);
    }

    #[test]
    fn test_get_unknown_account() {
        let repo = InMemoryAccounts::new();
        assert_eq!(
            repo.get("nobody").err(),
            Some(LedgerError::AccountNotFound("nobody".to_string()))
        );
    }

    #[test]
    fn test_mutation_visible_through_every_handle() {
        let repo = InMemoryAccounts::new();
        let handle = repo.get_or_create("wallet");
        lock(&handle).deposit(Currency::TRX, dec!(12)).unwrap();

        let again = repo.get("wallet").unwrap();
        assert_eq!(
            lock(&again).balance(crate::types::BalanceKind::Deposit, Currency::TRX),
            dec!(12)
        );
        assert_eq!(repo.addresses(), vec!["wallet".to_string()]);
    }
}
