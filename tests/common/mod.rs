#![allow(dead_code)]

use account_ledger::{
    Account, AccountNumberGenerator, AccountStore, AccountType, AccountUpdate, InMemoryAccountStore,
    InMemoryCustomers, InMemoryLog, Ledger, LedgerConfig, LedgerError, LedgerResult, Money,
    NewAccount, NewTransaction, Transaction, TransactionLog, TransactionType,
};
use async_trait::async_trait;
use rust_decimal::Decimal;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

pub const CUSTOMER: u64 = 1;

/// Hands out a fixed list of account numbers, then all zeros.
pub struct ScriptedNumbers {
    queue: Mutex<VecDeque<String>>,
}

impl ScriptedNumbers {
    pub fn new(numbers: &[&str]) -> Self {
        Self {
            queue: Mutex::new(numbers.iter().map(|n| n.to_string()).collect()),
        }
    }
}

impl AccountNumberGenerator for ScriptedNumbers {
    fn generate(&self, length: usize) -> String {
        self.queue
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| "0".repeat(length))
    }
}

pub async fn customers() -> Arc<InMemoryCustomers> {
    let customers = Arc::new(InMemoryCustomers::new());
    customers.register(CUSTOMER, "Siti Rahma").await;
    customers
}

pub struct Fixture {
    pub ledger: Ledger,
    pub accounts: Arc<dyn AccountStore>,
    pub log: Arc<dyn TransactionLog>,
}

pub async fn fixture_with(
    accounts: Arc<dyn AccountStore>,
    log: Arc<dyn TransactionLog>,
    config: &LedgerConfig,
) -> Fixture {
    let ledger = Ledger::new(accounts.clone(), log.clone(), customers().await, config);
    Fixture {
        ledger,
        accounts,
        log,
    }
}

/// Ledger whose account numbers come from `numbers` in order.
pub async fn fixture(numbers: &[&str]) -> Fixture {
    let config = LedgerConfig::default();
    let accounts: Arc<dyn AccountStore> = Arc::new(InMemoryAccountStore::new(
        Arc::new(ScriptedNumbers::new(numbers)),
        &config,
    ));
    let log: Arc<dyn TransactionLog> = Arc::new(InMemoryLog::new());
    fixture_with(accounts, log, &config).await
}

pub async fn open(ledger: &Ledger, balance: Decimal) -> Account {
    ledger
        .open_account(
            NewAccount::new(CUSTOMER, AccountType::Savings)
                .with_opening_balance(Money::new(balance).unwrap()),
        )
        .await
        .unwrap()
}

pub async fn balance(ledger: &Ledger, account_number: &str) -> Decimal {
    ledger
        .queries()
        .account_by_number(account_number)
        .await
        .unwrap()
        .balance
        .amount()
}

/// Log that can be switched into failing every append.
pub struct FailingLog {
    inner: InMemoryLog,
    pub failing: AtomicBool,
}

impl FailingLog {
    pub fn new() -> Self {
        Self {
            inner: InMemoryLog::new(),
            failing: AtomicBool::new(false),
        }
    }

    pub fn fail(&self) {
        self.failing.store(true, Ordering::SeqCst);
    }
}

#[async_trait]
impl TransactionLog for FailingLog {
    async fn append_batch(&self, txs: Vec<NewTransaction>) -> LedgerResult<Vec<Transaction>> {
        if self.failing.load(Ordering::SeqCst) {
            return Err(LedgerError::storage("disk full"));
        }
        self.inner.append_batch(txs).await
    }

    async fn get(&self, id: u64) -> LedgerResult<Option<Transaction>> {
        self.inner.get(id).await
    }

    async fn list_by_account(&self, account_number: &str) -> LedgerResult<Vec<Transaction>> {
        self.inner.list_by_account(account_number).await
    }

    async fn list_by_type(&self, tx_type: TransactionType) -> LedgerResult<Vec<Transaction>> {
        self.inner.list_by_type(tx_type).await
    }

    async fn list_by_reference(&self, reference_number: &str) -> LedgerResult<Vec<Transaction>> {
        self.inner.list_by_reference(reference_number).await
    }

    async fn list_all(&self) -> LedgerResult<Vec<Transaction>> {
        self.inner.list_all().await
    }
}

/// Store that refuses balance updates for one account id, and can fail
/// searches outright.
pub struct FlakyStore {
    inner: InMemoryAccountStore,
    pub reject_balance_for: Mutex<Option<u64>>,
    pub fail_reads: AtomicBool,
}

impl FlakyStore {
    pub fn new(numbers: &[&str]) -> Self {
        Self {
            inner: InMemoryAccountStore::new(
                Arc::new(ScriptedNumbers::new(numbers)),
                &LedgerConfig::default(),
            ),
            reject_balance_for: Mutex::new(None),
            fail_reads: AtomicBool::new(false),
        }
    }

    fn check_reads(&self) -> LedgerResult<()> {
        if self.fail_reads.load(Ordering::SeqCst) {
            return Err(LedgerError::storage("connection reset"));
        }
        Ok(())
    }
}

#[async_trait]
impl AccountStore for FlakyStore {
    async fn get(&self, id: u64) -> LedgerResult<Account> {
        self.inner.get(id).await
    }

    async fn get_by_number(&self, account_number: &str) -> LedgerResult<Account> {
        self.inner.get_by_number(account_number).await
    }

    async fn create(&self, account: NewAccount) -> LedgerResult<Account> {
        self.inner.create(account).await
    }

    async fn update(&self, id: u64, update: AccountUpdate) -> LedgerResult<Account> {
        let rejected = *self.reject_balance_for.lock().unwrap();
        if update.balance.is_some() && rejected == Some(id) {
            return Err(LedgerError::storage("row lock timeout"));
        }
        self.inner.update(id, update).await
    }

    async fn update_balances(&self, balances: &[(u64, Money)]) -> LedgerResult<Vec<Account>> {
        let rejected = *self.reject_balance_for.lock().unwrap();
        if balances.iter().any(|(id, _)| rejected == Some(*id)) {
            return Err(LedgerError::storage("row lock timeout"));
        }
        self.inner.update_balances(balances).await
    }

    async fn delete(&self, id: u64) -> LedgerResult<()> {
        self.inner.delete(id).await
    }

    async fn exists_by_number(&self, account_number: &str) -> LedgerResult<bool> {
        self.inner.exists_by_number(account_number).await
    }

    async fn list_all(&self) -> LedgerResult<Vec<Account>> {
        self.check_reads()?;
        self.inner.list_all().await
    }

    async fn list_by_customer(&self, customer_id: u64) -> LedgerResult<Vec<Account>> {
        self.inner.list_by_customer(customer_id).await
    }

    async fn list_by_type(&self, account_type: &str) -> LedgerResult<Vec<Account>> {
        self.inner.list_by_type(account_type).await
    }

    async fn list_by_status(&self, status: &str) -> LedgerResult<Vec<Account>> {
        self.inner.list_by_status(status).await
    }

    async fn search_by_number(&self, fragment: &str) -> LedgerResult<Vec<Account>> {
        self.check_reads()?;
        self.inner.search_by_number(fragment).await
    }
}
