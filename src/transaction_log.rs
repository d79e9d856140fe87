use crate::errors::{LedgerError, LedgerResult};
use crate::models::{NewTransaction, Transaction, TransactionType};
use async_trait::async_trait;
use chrono::Utc;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;

/// Append-only audit trail of completed movements.
///
/// No update or delete: a written row is final.
#[async_trait]
pub trait TransactionLog: Send + Sync {
    async fn append(&self, tx: NewTransaction) -> LedgerResult<Transaction> {
        let mut written = self.append_batch(vec![tx]).await?;
        written
            .pop()
            .ok_or_else(|| LedgerError::storage("append returned no record"))
    }

    /// Appends every record or none of them.
    async fn append_batch(&self, txs: Vec<NewTransaction>) -> LedgerResult<Vec<Transaction>>;
    async fn get(&self, id: u64) -> LedgerResult<Option<Transaction>>;
    async fn list_by_account(&self, account_number: &str) -> LedgerResult<Vec<Transaction>>;
    async fn list_by_type(&self, tx_type: TransactionType) -> LedgerResult<Vec<Transaction>>;
    async fn list_by_reference(&self, reference_number: &str) -> LedgerResult<Vec<Transaction>>;
    async fn list_all(&self) -> LedgerResult<Vec<Transaction>>;
}

#[derive(Default)]
struct Entries {
    rows: Vec<Transaction>,
    by_reference: HashMap<String, Vec<usize>>,
    by_account: HashMap<String, Vec<usize>>,
}

impl Entries {
    fn push(&mut self, tx: Transaction) {
        let position = self.rows.len();
        self.by_reference
            .entry(tx.reference_number.clone())
            .or_default()
            .push(position);
        self.by_account
            .entry(tx.account_number.clone())
            .or_default()
            .push(position);
        self.rows.push(tx);
    }

    fn select(&self, positions: Option<&Vec<usize>>) -> Vec<Transaction> {
        positions
            .map(|positions| positions.iter().map(|&p| self.rows[p].clone()).collect())
            .unwrap_or_default()
    }
}

/// In-memory log, indexed by account number and reference number. Ids are
/// assigned sequentially from 1 in append order.
pub struct InMemoryLog {
    entries: Arc<RwLock<Entries>>,
}

impl InMemoryLog {
    pub fn new() -> Self {
        Self {
            entries: Arc::new(RwLock::new(Entries::default())),
        }
    }

    /// Loads already-written rows (journal replay) without assigning new ids.
    pub(crate) async fn restore(&self, rows: Vec<Transaction>) {
        let mut entries = self.entries.write().await;
        for tx in rows {
            entries.push(tx);
        }
    }

    pub async fn len(&self) -> usize {
        self.entries.read().await.rows.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }

    /// Assigns ids and timestamps without storing anything.
    pub(crate) async fn stamp(&self, txs: Vec<NewTransaction>) -> Vec<Transaction> {
        let entries = self.entries.read().await;
        let next_id = entries.rows.last().map(|tx| tx.id + 1).unwrap_or(1);
        let now = Utc::now();
        txs.into_iter()
            .enumerate()
            .map(|(offset, tx)| tx.into_transaction(next_id + offset as u64, now))
            .collect()
    }

    /// Stores rows stamped by [`InMemoryLog::stamp`].
    pub(crate) async fn commit(&self, rows: &[Transaction]) {
        let mut entries = self.entries.write().await;
        for tx in rows {
            entries.push(tx.clone());
        }
    }
}

impl Default for InMemoryLog {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl TransactionLog for InMemoryLog {
    async fn append_batch(&self, txs: Vec<NewTransaction>) -> LedgerResult<Vec<Transaction>> {
        // Stamp and store under a single write lock so concurrent batches
        // never interleave ids.
        let mut entries = self.entries.write().await;
        let next_id = entries.rows.last().map(|tx| tx.id + 1).unwrap_or(1);
        let now = Utc::now();

        let written: Vec<Transaction> = txs
            .into_iter()
            .enumerate()
            .map(|(offset, tx)| tx.into_transaction(next_id + offset as u64, now))
            .collect();

        for tx in &written {
            entries.push(tx.clone());
        }

        Ok(written)
    }

    async fn get(&self, id: u64) -> LedgerResult<Option<Transaction>> {
        let entries = self.entries.read().await;
        Ok(entries
            .rows
            .binary_search_by_key(&id, |tx| tx.id)
            .ok()
            .map(|position| entries.rows[position].clone()))
    }

    async fn list_by_account(&self, account_number: &str) -> LedgerResult<Vec<Transaction>> {
        let entries = self.entries.read().await;
        Ok(entries.select(entries.by_account.get(account_number)))
    }

    async fn list_by_type(&self, tx_type: TransactionType) -> LedgerResult<Vec<Transaction>> {
        let entries = self.entries.read().await;
        Ok(entries
            .rows
            .iter()
            .filter(|tx| tx.tx_type == tx_type)
            .cloned()
            .collect())
    }

    async fn list_by_reference(&self, reference_number: &str) -> LedgerResult<Vec<Transaction>> {
        let entries = self.entries.read().await;
        Ok(entries.select(entries.by_reference.get(reference_number)))
    }

    async fn list_all(&self) -> LedgerResult<Vec<Transaction>> {
        Ok(self.entries.read().await.rows.clone())
    }
}
