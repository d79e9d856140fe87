use crate::account_number::AccountNumberGenerator;
use crate::account_store::{AccountStore, InMemoryAccountStore};
use crate::config::LedgerConfig;
use crate::customers::CustomerDirectory;
use crate::errors::{LedgerError, LedgerResult};
use crate::journal::JournaledLog;
use crate::locks::{AccountLocks, SettleGate};
use crate::models::{
    Account, AccountStatus, AccountType, AccountUpdate, Movement, NewAccount, NewTransaction,
    TransactionType, TransferReceipt,
};
use crate::money::Money;
use crate::query::LedgerQueries;
use crate::reference::{ReferenceGenerator, ReferenceKind};
use crate::transaction_log::{InMemoryLog, TransactionLog};
use rust_decimal::Decimal;
use std::str::FromStr;
use std::sync::Arc;
use tracing::{debug, error, info};

const DEPOSIT_DESCRIPTION: &str = "Cash deposit";
const WITHDRAWAL_DESCRIPTION: &str = "Cash withdrawal";

/// The only component allowed to change a balance or write a transaction.
///
/// Every movement runs inside the critical section of the account(s) it
/// touches: validate, apply the new balance(s), then log. If logging fails the
/// balances are put back before the error is returned. Applying and logging
/// happen behind a [`SettleGate`] that [`LedgerQueries`] waits on, so a reader
/// never observes a balance change without its transaction record.
#[derive(Clone)]
pub struct Ledger {
    accounts: Arc<dyn AccountStore>,
    log: Arc<dyn TransactionLog>,
    customers: Arc<dyn CustomerDirectory>,
    locks: Arc<AccountLocks>,
    gate: Arc<SettleGate>,
    references: Arc<ReferenceGenerator>,
    reject_inactive_movements: bool,
}

impl Ledger {
    pub fn new(
        accounts: Arc<dyn AccountStore>,
        log: Arc<dyn TransactionLog>,
        customers: Arc<dyn CustomerDirectory>,
        config: &LedgerConfig,
    ) -> Self {
        Self {
            accounts,
            log,
            customers,
            locks: Arc::new(AccountLocks::new(config.lock_shards)),
            gate: Arc::new(SettleGate::new()),
            references: Arc::new(ReferenceGenerator::new()),
            reject_inactive_movements: config.reject_inactive_movements,
        }
    }

    /// In-memory account store plus either a journaled or an in-memory log,
    /// depending on `config.journal_path`.
    pub async fn from_config(
        config: &LedgerConfig,
        generator: Arc<dyn AccountNumberGenerator>,
        customers: Arc<dyn CustomerDirectory>,
    ) -> anyhow::Result<Self> {
        config.validate()?;
        let accounts: Arc<dyn AccountStore> =
            Arc::new(InMemoryAccountStore::new(generator, config));

        match &config.journal_path {
            Some(path) => {
                let journal = JournaledLog::open(path).await?;
                let issued = journal.len().await as u64;
                let log: Arc<dyn TransactionLog> = Arc::new(journal);
                Ok(Self::new(accounts, log, customers, config)
                    .with_references(ReferenceGenerator::starting_at(issued)))
            }
            None => {
                let log: Arc<dyn TransactionLog> = Arc::new(InMemoryLog::new());
                Ok(Self::new(accounts, log, customers, config))
            }
        }
    }

    pub fn with_references(mut self, references: ReferenceGenerator) -> Self {
        self.references = Arc::new(references);
        self
    }

    /// Read-only view over the same account store and log.
    pub fn queries(&self) -> LedgerQueries {
        LedgerQueries::new(self.accounts.clone(), self.log.clone(), self.gate.clone())
    }

    /// Per-account lock registry.
    pub fn locks(&self) -> &AccountLocks {
        &self.locks
    }

    pub async fn open_account(&self, request: NewAccount) -> LedgerResult<Account> {
        let customer = self.customers.resolve_customer(request.customer_id).await?;
        let account = self.accounts.create(request).await?;

        info!(
            account = %account.account_number,
            customer = customer.id,
            account_type = %account.account_type,
            opening_balance = %account.balance,
            "Opened account"
        );

        Ok(account)
    }

    pub async fn deposit(&self, account_number: &str, amount: Decimal) -> LedgerResult<Movement> {
        let amount = Money::positive(amount)?;
        let account = self.accounts.get_by_number(account_number).await?;

        let _guard = self.locks.lock(account.id).await;
        let account = self.reload(account.id, account_number).await?;
        self.ensure_movable(&account)?;

        let balance = account.balance.checked_add(amount)?;

        let _settle = self.gate.apply().await;
        let updated = self
            .accounts
            .update(account.id, AccountUpdate::balance(balance))
            .await?;

        let record = NewTransaction::for_account(
            &updated,
            TransactionType::Deposit,
            amount,
            DEPOSIT_DESCRIPTION,
            self.references.next(ReferenceKind::Deposit),
        );

        match self.log.append(record).await {
            Ok(transaction) => {
                info!(
                    account = %updated.account_number,
                    amount = %amount,
                    balance = %updated.balance,
                    reference = %transaction.reference_number,
                    "Deposit applied"
                );
                Ok(Movement {
                    account: updated,
                    transaction,
                })
            }
            Err(e) => {
                self.roll_back(&[&account], &e).await;
                Err(e)
            }
        }
    }

    pub async fn withdraw(&self, account_number: &str, amount: Decimal) -> LedgerResult<Movement> {
        let amount = Money::positive(amount)?;
        let account = self.accounts.get_by_number(account_number).await?;

        let _guard = self.locks.lock(account.id).await;
        let account = self.reload(account.id, account_number).await?;
        self.ensure_movable(&account)?;
        ensure_funds(&account, amount)?;

        let balance = account.balance.checked_sub(amount)?;

        let _settle = self.gate.apply().await;
        let updated = self
            .accounts
            .update(account.id, AccountUpdate::balance(balance))
            .await?;

        let record = NewTransaction::for_account(
            &updated,
            TransactionType::Withdrawal,
            amount,
            WITHDRAWAL_DESCRIPTION,
            self.references.next(ReferenceKind::Withdrawal),
        );

        match self.log.append(record).await {
            Ok(transaction) => {
                info!(
                    account = %updated.account_number,
                    amount = %amount,
                    balance = %updated.balance,
                    reference = %transaction.reference_number,
                    "Withdrawal applied"
                );
                Ok(Movement {
                    account: updated,
                    transaction,
                })
            }
            Err(e) => {
                self.roll_back(&[&account], &e).await;
                Err(e)
            }
        }
    }

    /// Moves `amount` between two accounts and records both legs under one
    /// reference number. Without a description each leg names the other
    /// account.
    pub async fn transfer(
        &self,
        from_number: &str,
        to_number: &str,
        amount: Decimal,
        description: Option<&str>,
    ) -> LedgerResult<TransferReceipt> {
        if from_number == to_number {
            return Err(LedgerError::SameAccount(from_number.to_string()));
        }
        let amount = Money::positive(amount)?;

        let source = self.accounts.get_by_number(from_number).await?;
        let destination = self.accounts.get_by_number(to_number).await?;

        let (_source_guard, _destination_guard) =
            self.locks.lock_pair(source.id, destination.id).await;
        let source = self.reload(source.id, from_number).await?;
        let destination = self.reload(destination.id, to_number).await?;

        self.ensure_movable(&source)?;
        self.ensure_movable(&destination)?;
        ensure_funds(&source, amount)?;

        let source_balance = source.balance.checked_sub(amount)?;
        let destination_balance = destination.balance.checked_add(amount)?;

        let _settle = self.gate.apply().await;
        let mut applied = self
            .accounts
            .update_balances(&[
                (source.id, source_balance),
                (destination.id, destination_balance),
            ])
            .await?
            .into_iter();

        let (Some(debited), Some(credited)) = (applied.next(), applied.next()) else {
            let e = LedgerError::storage("transfer did not update both accounts");
            self.roll_back(&[&source, &destination], &e).await;
            return Err(e);
        };

        let reference = self.references.next(ReferenceKind::Transfer);
        let debit_description = description
            .map(str::to_string)
            .unwrap_or_else(|| format!("Transfer to {to_number}"));
        let credit_description = description
            .map(str::to_string)
            .unwrap_or_else(|| format!("Transfer from {from_number}"));

        let legs = vec![
            NewTransaction::for_account(
                &debited,
                TransactionType::TransferDebit,
                amount,
                debit_description,
                reference.clone(),
            ),
            NewTransaction::for_account(
                &credited,
                TransactionType::TransferCredit,
                amount,
                credit_description,
                reference.clone(),
            ),
        ];

        let written = match self.log.append_batch(legs).await {
            Ok(written) => written,
            Err(e) => {
                self.roll_back(&[&source, &destination], &e).await;
                return Err(e);
            }
        };

        let mut written = written.into_iter();
        let (Some(debit), Some(credit)) = (written.next(), written.next()) else {
            return Err(LedgerError::storage(format!(
                "transfer {reference} was not logged as two legs"
            )));
        };

        info!(
            from = %debited.account_number,
            to = %credited.account_number,
            amount = %amount,
            reference = %reference,
            "Transfer applied"
        );

        Ok(TransferReceipt {
            from: debited,
            to: credited,
            debit,
            credit,
        })
    }

    /// Accepts `ACTIVE` / `INACTIVE` in any case; stored uppercase.
    pub async fn update_status(&self, account_id: u64, status: &str) -> LedgerResult<Account> {
        let status = AccountStatus::from_str(status)?;
        self.update_fields(account_id, AccountUpdate::status(status)).await
    }

    pub async fn update_account_type(
        &self,
        account_id: u64,
        account_type: AccountType,
    ) -> LedgerResult<Account> {
        self.update_fields(account_id, AccountUpdate::account_type(account_type))
            .await
    }

    /// Removes an empty account. Its transactions stay in the log.
    pub async fn close_account(&self, account_id: u64) -> LedgerResult<()> {
        let closed = {
            let _guard = self.locks.lock(account_id).await;
            self.remove_if_empty(account_id).await
        };

        // The account is gone either way; its lock entry goes with it
        if matches!(closed, Ok(()) | Err(LedgerError::AccountNotFound(_))) {
            self.locks.forget(account_id).await;
        }
        closed
    }

    async fn remove_if_empty(&self, account_id: u64) -> LedgerResult<()> {
        let account = self.accounts.get(account_id).await?;

        if !account.balance.is_zero() {
            return Err(LedgerError::BalanceNotZero {
                account: account.account_number,
                balance: account.balance.to_string(),
            });
        }

        self.accounts.delete(account_id).await?;
        info!(account = %account.account_number, "Closed account");
        Ok(())
    }

    async fn update_fields(&self, account_id: u64, update: AccountUpdate) -> LedgerResult<Account> {
        let updated = {
            let _guard = self.locks.lock(account_id).await;
            self.accounts.update(account_id, update).await
        };

        if let Err(LedgerError::AccountNotFound(_)) = &updated {
            self.locks.forget(account_id).await;
        }
        let account = updated?;

        info!(
            account = %account.account_number,
            status = %account.status,
            account_type = %account.account_type,
            "Updated account"
        );

        Ok(account)
    }

    /// Fresh copy of an account once its lock is held. An account closed
    /// while we waited for the lock leaves no registry entry behind.
    async fn reload(&self, account_id: u64, account_number: &str) -> LedgerResult<Account> {
        match self.accounts.get(account_id).await {
            Err(LedgerError::AccountNotFound(_)) => {
                self.locks.forget(account_id).await;
                Err(LedgerError::AccountNotFound(account_number.to_string()))
            }
            other => other,
        }
    }

    fn ensure_movable(&self, account: &Account) -> LedgerResult<()> {
        if self.reject_inactive_movements && !account.is_active() {
            debug!(account = %account.account_number, "Rejected movement on inactive account");
            return Err(LedgerError::AccountInactive(account.account_number.clone()));
        }
        Ok(())
    }

    /// Restores the balances captured in `snapshots`, all in one store call.
    async fn roll_back(&self, snapshots: &[&Account], cause: &LedgerError) {
        let balances: Vec<(u64, Money)> = snapshots
            .iter()
            .map(|snapshot| (snapshot.id, snapshot.balance))
            .collect();

        let restored = self.accounts.update_balances(&balances).await;
        for snapshot in snapshots {
            match &restored {
                Ok(_) => error!(
                    account = %snapshot.account_number,
                    balance = %snapshot.balance,
                    error = %cause,
                    "Rolled back balance after failed movement"
                ),
                Err(e) => error!(
                    account = %snapshot.account_number,
                    expected_balance = %snapshot.balance,
                    error = ?e,
                    cause = %cause,
                    "Failed to roll back balance"
                ),
            }
        }
    }
}

fn ensure_funds(account: &Account, amount: Money) -> LedgerResult<()> {
    if account.balance < amount {
        debug!(
            account = %account.account_number,
            balance = %account.balance,
            requested = %amount,
            "Rejected movement: insufficient funds"
        );
        return Err(LedgerError::InsufficientFunds {
            account: account.account_number.clone(),
            balance: account.balance.to_string(),
            requested: amount.to_string(),
        });
    }
    Ok(())
}
