use crate::account_number::{next_in_sequence, number_space, AccountNumberGenerator};
use crate::config::LedgerConfig;
use crate::errors::{LedgerError, LedgerResult};
use crate::models::{Account, AccountStatus, AccountType, AccountUpdate, NewAccount};
use crate::money::Money;
use async_trait::async_trait;
use chrono::Utc;
use std::collections::{BTreeMap, HashMap, HashSet};
use std::str::FromStr;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{debug, warn};

/// Storage backend for account rows.
///
/// Implementations keep `account_number` unique and immutable: a number is
/// never handed out again, not even after its account is deleted, since the
/// transaction log refers to accounts by number. Balance changes are only
/// issued by the ledger while it holds the account's critical section.
#[async_trait]
pub trait AccountStore: Send + Sync {
    async fn get(&self, id: u64) -> LedgerResult<Account>;
    async fn get_by_number(&self, account_number: &str) -> LedgerResult<Account>;
    /// Persists a new account under a freshly generated, unique number.
    async fn create(&self, account: NewAccount) -> LedgerResult<Account>;
    async fn update(&self, id: u64, update: AccountUpdate) -> LedgerResult<Account>;
    /// Sets several balances at once; either every account is updated or none.
    async fn update_balances(&self, balances: &[(u64, Money)]) -> LedgerResult<Vec<Account>>;
    async fn delete(&self, id: u64) -> LedgerResult<()>;
    async fn exists_by_number(&self, account_number: &str) -> LedgerResult<bool>;
    async fn list_all(&self) -> LedgerResult<Vec<Account>>;
    async fn list_by_customer(&self, customer_id: u64) -> LedgerResult<Vec<Account>>;
    async fn list_by_type(&self, account_type: &str) -> LedgerResult<Vec<Account>>;
    async fn list_by_status(&self, status: &str) -> LedgerResult<Vec<Account>>;
    async fn search_by_number(&self, fragment: &str) -> LedgerResult<Vec<Account>>;
}

#[derive(Default)]
struct Tables {
    accounts: BTreeMap<u64, Account>,
    by_number: HashMap<String, u64>,
    /// Numbers of deleted accounts, never reissued
    retired: HashSet<String>,
    next_id: u64,
}

/// In-memory account table with a unique index on the account number.
pub struct InMemoryAccountStore {
    tables: Arc<RwLock<Tables>>,
    generator: Arc<dyn AccountNumberGenerator>,
    number_length: usize,
    random_attempts_before_probe: u32,
}

impl InMemoryAccountStore {
    pub fn new(generator: Arc<dyn AccountNumberGenerator>, config: &LedgerConfig) -> Self {
        Self {
            tables: Arc::new(RwLock::new(Tables {
                next_id: 1,
                ..Tables::default()
            })),
            generator,
            number_length: config.account_number_length,
            random_attempts_before_probe: config.random_attempts_before_probe,
        }
    }

    /// Draws random candidates until one is free; after too many collisions
    /// walks the number space sequentially from the last candidate, so the
    /// loop ends as long as any number is left.
    fn allocate_number(&self, tables: &Tables) -> LedgerResult<String> {
        let length = self.number_length;
        let taken = |candidate: &str| {
            tables.by_number.contains_key(candidate) || tables.retired.contains(candidate)
        };
        let mut candidate = String::new();

        for attempt in 0..self.random_attempts_before_probe.max(1) {
            candidate = self.generator.generate(length);
            if candidate.len() != length || !candidate.bytes().all(|b| b.is_ascii_digit()) {
                warn!(candidate = %candidate, "Generator produced a malformed account number");
                continue;
            }
            if !taken(candidate.as_str()) {
                return Ok(candidate);
            }
            debug!(attempt, candidate = %candidate, "Account number collision, retrying");
        }

        if (tables.by_number.len() + tables.retired.len()) as u64 >= number_space(length) {
            return Err(LedgerError::AccountNumberSpaceExhausted);
        }

        warn!(
            attempts = self.random_attempts_before_probe,
            "Random account numbers keep colliding, probing sequentially"
        );

        for _ in 0..number_space(length) {
            candidate = next_in_sequence(&candidate, length);
            if !taken(candidate.as_str()) {
                return Ok(candidate);
            }
        }

        Err(LedgerError::AccountNumberSpaceExhausted)
    }

    async fn filter<F>(&self, predicate: F) -> Vec<Account>
    where
        F: Fn(&Account) -> bool,
    {
        let tables = self.tables.read().await;
        tables
            .accounts
            .values()
            .filter(|account| predicate(account))
            .cloned()
            .collect()
    }
}

#[async_trait]
impl AccountStore for InMemoryAccountStore {
    async fn get(&self, id: u64) -> LedgerResult<Account> {
        let tables = self.tables.read().await;
        tables
            .accounts
            .get(&id)
            .cloned()
            .ok_or_else(|| LedgerError::AccountNotFound(format!("id {id}")))
    }

    async fn get_by_number(&self, account_number: &str) -> LedgerResult<Account> {
        let tables = self.tables.read().await;
        tables
            .by_number
            .get(account_number)
            .and_then(|id| tables.accounts.get(id))
            .cloned()
            .ok_or_else(|| LedgerError::AccountNotFound(account_number.to_string()))
    }

    async fn create(&self, new_account: NewAccount) -> LedgerResult<Account> {
        // Number allocation and insert happen under one write lock, so two
        // concurrent creations cannot claim the same number.
        let mut tables = self.tables.write().await;
        let account_number = self.allocate_number(&tables)?;

        let id = tables.next_id;
        tables.next_id += 1;

        let account = Account {
            id,
            account_number: account_number.clone(),
            account_type: new_account.account_type,
            balance: new_account.opening_balance,
            status: new_account.status,
            opened_at: Utc::now(),
            customer_id: new_account.customer_id,
        };

        tables.by_number.insert(account_number, id);
        tables.accounts.insert(id, account.clone());
        Ok(account)
    }

    async fn update(&self, id: u64, update: AccountUpdate) -> LedgerResult<Account> {
        let mut tables = self.tables.write().await;
        let account = tables
            .accounts
            .get_mut(&id)
            .ok_or_else(|| LedgerError::AccountNotFound(format!("id {id}")))?;
        update.apply(account);
        Ok(account.clone())
    }

    async fn update_balances(&self, balances: &[(u64, Money)]) -> LedgerResult<Vec<Account>> {
        let mut tables = self.tables.write().await;
        if let Some((id, _)) = balances
            .iter()
            .find(|(id, _)| !tables.accounts.contains_key(id))
        {
            return Err(LedgerError::AccountNotFound(format!("id {id}")));
        }

        let mut updated = Vec::with_capacity(balances.len());
        for (id, balance) in balances {
            if let Some(account) = tables.accounts.get_mut(id) {
                account.balance = *balance;
                updated.push(account.clone());
            }
        }
        Ok(updated)
    }

    async fn delete(&self, id: u64) -> LedgerResult<()> {
        let mut tables = self.tables.write().await;
        let account = tables
            .accounts
            .remove(&id)
            .ok_or_else(|| LedgerError::AccountNotFound(format!("id {id}")))?;
        tables.by_number.remove(&account.account_number);
        tables.retired.insert(account.account_number);
        Ok(())
    }

    async fn exists_by_number(&self, account_number: &str) -> LedgerResult<bool> {
        Ok(self.tables.read().await.by_number.contains_key(account_number))
    }

    async fn list_all(&self) -> LedgerResult<Vec<Account>> {
        Ok(self.filter(|_| true).await)
    }

    async fn list_by_customer(&self, customer_id: u64) -> LedgerResult<Vec<Account>> {
        Ok(self.filter(|account| account.customer_id == customer_id).await)
    }

    async fn list_by_type(&self, account_type: &str) -> LedgerResult<Vec<Account>> {
        // An unknown type matches nothing rather than failing.
        match AccountType::from_str(account_type) {
            Ok(wanted) => Ok(self.filter(|account| account.account_type == wanted).await),
            Err(_) => Ok(Vec::new()),
        }
    }

    async fn list_by_status(&self, status: &str) -> LedgerResult<Vec<Account>> {
        match AccountStatus::from_str(status) {
            Ok(wanted) => Ok(self.filter(|account| account.status == wanted).await),
            Err(_) => Ok(Vec::new()),
        }
    }

    async fn search_by_number(&self, fragment: &str) -> LedgerResult<Vec<Account>> {
        let needle = fragment.trim().to_lowercase();
        Ok(self
            .filter(|account| account.account_number.to_lowercase().contains(&needle))
            .await)
    }
}
