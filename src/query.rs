use crate::account_store::AccountStore;
use crate::errors::LedgerResult;
use crate::locks::SettleGate;
use crate::models::{Account, Transaction, TransactionType};
use crate::money::Money;
use crate::transaction_log::TransactionLog;
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::sync::Arc;
use tracing::warn;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AccountStatistics {
    pub total_accounts: usize,
    pub total_balance: Money,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TransactionStatistics {
    pub total_transactions: usize,
    pub deposits: usize,
    pub withdrawals: usize,
    /// Logical transfers, one per debit/credit pair.
    pub transfers: usize,
    /// Money moved today (UTC); each transfer counted once.
    pub today_volume: Money,
}

/// A transfer reassembled from its two legs.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TransferView {
    pub reference_number: String,
    pub from_account: String,
    pub to_account: String,
    pub amount: Money,
    pub description: String,
    pub timestamp: DateTime<Utc>,
}

/// Read-only reporting over accounts and the transaction log.
///
/// Every read waits until no movement is half applied, so balances and
/// transaction rows are always seen together.
#[derive(Clone)]
pub struct LedgerQueries {
    accounts: Arc<dyn AccountStore>,
    log: Arc<dyn TransactionLog>,
    gate: Arc<SettleGate>,
}

impl LedgerQueries {
    pub fn new(
        accounts: Arc<dyn AccountStore>,
        log: Arc<dyn TransactionLog>,
        gate: Arc<SettleGate>,
    ) -> Self {
        Self {
            accounts,
            log,
            gate,
        }
    }

    pub async fn statistics(&self) -> LedgerResult<AccountStatistics> {
        let _settled = self.gate.settled().await;
        let accounts = self.accounts.list_all().await?;
        let total_balance = Money::sum(accounts.iter().map(|account| account.balance))?;

        Ok(AccountStatistics {
            total_accounts: accounts.len(),
            total_balance,
        })
    }

    pub async fn transaction_statistics(&self) -> LedgerResult<TransactionStatistics> {
        let _settled = self.gate.settled().await;
        let transactions = self.log.list_all().await?;
        let today = Utc::now().date_naive();

        let count = |tx_type: TransactionType| {
            transactions
                .iter()
                .filter(|tx| tx.tx_type == tx_type)
                .count()
        };

        let today_volume = Money::sum(
            transactions
                .iter()
                .filter(|tx| tx.tx_type != TransactionType::TransferCredit)
                .filter(|tx| tx.timestamp.date_naive() == today)
                .map(|tx| tx.amount),
        )?;

        Ok(TransactionStatistics {
            total_transactions: transactions.len(),
            deposits: count(TransactionType::Deposit),
            withdrawals: count(TransactionType::Withdrawal),
            transfers: count(TransactionType::TransferDebit),
            today_volume,
        })
    }

    pub async fn account(&self, id: u64) -> LedgerResult<Account> {
        let _settled = self.gate.settled().await;
        self.accounts.get(id).await
    }

    pub async fn account_by_number(&self, account_number: &str) -> LedgerResult<Account> {
        let _settled = self.gate.settled().await;
        self.accounts.get_by_number(account_number).await
    }

    pub async fn exists_by_number(&self, account_number: &str) -> LedgerResult<bool> {
        let _settled = self.gate.settled().await;
        self.accounts.exists_by_number(account_number).await
    }

    pub async fn accounts(&self) -> LedgerResult<Vec<Account>> {
        let _settled = self.gate.settled().await;
        self.accounts.list_all().await
    }

    pub async fn accounts_by_customer(&self, customer_id: u64) -> LedgerResult<Vec<Account>> {
        let _settled = self.gate.settled().await;
        self.accounts.list_by_customer(customer_id).await
    }

    pub async fn accounts_by_type(&self, account_type: &str) -> LedgerResult<Vec<Account>> {
        let _settled = self.gate.settled().await;
        self.accounts.list_by_type(account_type).await
    }

    pub async fn accounts_by_status(&self, status: &str) -> LedgerResult<Vec<Account>> {
        let _settled = self.gate.settled().await;
        self.accounts.list_by_status(status).await
    }

    /// Case-insensitive substring match on the account number. A failing
    /// lookup is reported as no matches.
    pub async fn search_accounts(&self, fragment: &str) -> Vec<Account> {
        let _settled = self.gate.settled().await;
        match self.accounts.search_by_number(fragment).await {
            Ok(found) => found,
            Err(e) => {
                warn!(fragment, error = %e, "Account search failed, returning no results");
                Vec::new()
            }
        }
    }

    pub async fn transaction(&self, id: u64) -> LedgerResult<Option<Transaction>> {
        let _settled = self.gate.settled().await;
        self.log.get(id).await
    }

    pub async fn transactions(&self) -> LedgerResult<Vec<Transaction>> {
        let _settled = self.gate.settled().await;
        self.log.list_all().await
    }

    /// Oldest first.
    pub async fn account_history(&self, account_number: &str) -> LedgerResult<Vec<Transaction>> {
        let _settled = self.gate.settled().await;
        let mut history = self.log.list_by_account(account_number).await?;
        history.sort_by_key(|tx| tx.id);
        Ok(history)
    }

    pub async fn transactions_by_type(
        &self,
        tx_type: TransactionType,
    ) -> LedgerResult<Vec<Transaction>> {
        let _settled = self.gate.settled().await;
        self.log.list_by_type(tx_type).await
    }

    pub async fn transactions_by_reference(
        &self,
        reference_number: &str,
    ) -> LedgerResult<Vec<Transaction>> {
        let _settled = self.gate.settled().await;
        self.log.list_by_reference(reference_number).await
    }

    /// `None` unless the reference names exactly one debit and one credit leg.
    pub async fn transfer(&self, reference_number: &str) -> LedgerResult<Option<TransferView>> {
        let _settled = self.gate.settled().await;
        let legs = self.log.list_by_reference(reference_number).await?;
        if legs.len() != 2 {
            return Ok(None);
        }

        let debit = legs
            .iter()
            .find(|tx| tx.tx_type == TransactionType::TransferDebit);
        let credit = legs
            .iter()
            .find(|tx| tx.tx_type == TransactionType::TransferCredit);

        Ok(match (debit, credit) {
            (Some(debit), Some(credit)) => Some(TransferView {
                reference_number: reference_number.to_string(),
                from_account: debit.account_number.clone(),
                to_account: credit.account_number.clone(),
                amount: debit.amount,
                description: debit.description.clone(),
                timestamp: debit.timestamp,
            }),
            _ => None,
        })
    }
}
