mod common;

use account_ledger::{
    journal, ErrorKind, InMemoryAccountStore, JournalFile, JournaledLog, Ledger, LedgerConfig,
    RandomDigits, TransactionLog, TransactionType,
};
use async_trait::async_trait;
use common::{balance, customers, open};
use rust_decimal_macros::dec;
use std::io;
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tempfile::TempDir;
use tokio::fs::File;

/// Journal file whose next sync can be made to fail after the bytes are written.
struct UnsyncedFile {
    inner: File,
    fail_next_sync: Arc<AtomicBool>,
}

#[async_trait]
impl JournalFile for UnsyncedFile {
    async fn len(&mut self) -> io::Result<u64> {
        self.inner.len().await
    }

    async fn append(&mut self, bytes: &[u8]) -> io::Result<()> {
        self.inner.append(bytes).await
    }

    async fn sync(&mut self) -> io::Result<()> {
        if self.fail_next_sync.swap(false, Ordering::SeqCst) {
            return Err(io::Error::new(io::ErrorKind::Other, "fsync failed"));
        }
        self.inner.sync().await
    }

    async fn truncate(&mut self, len: u64) -> io::Result<()> {
        self.inner.truncate(len).await
    }
}

async fn journaled_ledger(log: JournaledLog) -> Ledger {
    let config = LedgerConfig::default();
    Ledger::new(
        Arc::new(InMemoryAccountStore::new(Arc::new(RandomDigits::seeded(1)), &config)),
        Arc::new(log),
        customers().await,
        &config,
    )
}

async fn append_torn_line(path: &Path) {
    let mut contents = tokio::fs::read_to_string(path).await.unwrap();
    contents.push_str("7,1,100000");
    tokio::fs::write(path, contents).await.unwrap();
}

// ============================================================================
// JOURNAL PERSISTENCE & RECOVERY
// ============================================================================

#[tokio::test]
async fn test_journal_persistence_and_recovery() {
    let temp_dir = TempDir::new().unwrap();
    let path = temp_dir.path().join("ledger.journal");

    let config = LedgerConfig {
        journal_path: Some(path.clone()),
        ..LedgerConfig::default()
    };

    let reference = {
        let ledger = Ledger::from_config(&config, Arc::new(RandomDigits::seeded(7)), customers().await)
            .await
            .unwrap();

        let a = open(&ledger, dec!(100)).await;
        let b = open(&ledger, dec!(0)).await;
        ledger.deposit(&a.account_number, dec!(50.25)).await.unwrap();
        let receipt = ledger
            .transfer(&a.account_number, &b.account_number, dec!(30), Some("Invoice 12, March"))
            .await
            .unwrap();
        ledger.withdraw(&b.account_number, dec!(10)).await.unwrap();
        receipt.reference_number().to_string()
    };

    // Reopen: the log is rebuilt from the file
    let log = JournaledLog::open(&path).await.unwrap();
    let all = log.list_all().await.unwrap();
    assert_eq!(all.len(), 4);
    assert_eq!(
        all.iter().map(|tx| tx.id).collect::<Vec<_>>(),
        vec![1, 2, 3, 4]
    );

    let legs = log.list_by_reference(&reference).await.unwrap();
    assert_eq!(legs.len(), 2);
    assert!(legs.iter().all(|tx| tx.description == "Invoice 12, March"));
    assert!(legs.iter().all(|tx| tx.amount.amount() == dec!(30.00)));

    let deposits = log.list_by_type(TransactionType::Deposit).await.unwrap();
    assert_eq!(deposits[0].amount.amount(), dec!(50.25));
}

#[tokio::test]
async fn test_journal_appends_continue_ids_after_restart() {
    let temp_dir = TempDir::new().unwrap();
    let path = temp_dir.path().join("ids.journal");

    let config = LedgerConfig {
        journal_path: Some(path.clone()),
        ..LedgerConfig::default()
    };

    let mut references = Vec::new();
    for _ in 0..2 {
        let ledger = Ledger::from_config(&config, Arc::new(RandomDigits::new()), customers().await)
            .await
            .unwrap();
        let account = open(&ledger, dec!(0)).await;
        let movement = ledger.deposit(&account.account_number, dec!(1)).await.unwrap();
        references.push(movement.transaction.reference_number);
    }

    let rows = journal::replay(&path).await.unwrap();
    assert_eq!(rows.len(), 2);
    assert_eq!(rows[0].id, 1);
    assert_eq!(rows[1].id, 2);
    assert_ne!(references[0], references[1]);
}

#[tokio::test]
async fn test_torn_trailing_line_is_skipped() {
    let temp_dir = TempDir::new().unwrap();
    let path = temp_dir.path().join("torn.journal");

    {
        let ledger = journaled_ledger(JournaledLog::open(&path).await.unwrap()).await;
        let account = open(&ledger, dec!(0)).await;
        ledger.deposit(&account.account_number, dec!(5)).await.unwrap();
    }
    append_torn_line(&path).await;

    let rows = journal::replay(&path).await.unwrap();
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].amount.amount(), dec!(5));
}

#[tokio::test]
async fn test_appends_after_torn_line_survive_replay() {
    let temp_dir = TempDir::new().unwrap();
    let path = temp_dir.path().join("torn-append.journal");

    {
        let ledger = journaled_ledger(JournaledLog::open(&path).await.unwrap()).await;
        let account = open(&ledger, dec!(0)).await;
        ledger.deposit(&account.account_number, dec!(5)).await.unwrap();
    }
    append_torn_line(&path).await;

    {
        let ledger = journaled_ledger(JournaledLog::open(&path).await.unwrap()).await;
        let account = open(&ledger, dec!(0)).await;
        let movement = ledger.deposit(&account.account_number, dec!(8)).await.unwrap();
        assert_eq!(movement.transaction.id, 2);
    }

    let rows = journal::replay(&path).await.unwrap();
    assert_eq!(rows.iter().map(|tx| tx.id).collect::<Vec<_>>(), vec![1, 2]);
    assert_eq!(rows[1].amount.amount(), dec!(8));

    // Reopening again neither loses nor duplicates anything
    let log = JournaledLog::open(&path).await.unwrap();
    assert_eq!(log.len().await, 2);
}

#[tokio::test]
async fn test_failed_sync_leaves_no_record_behind() {
    let temp_dir = TempDir::new().unwrap();
    let path = temp_dir.path().join("unsynced.journal");
    let fail_next_sync = Arc::new(AtomicBool::new(false));

    {
        let flag = fail_next_sync.clone();
        let log = JournaledLog::open_with(&path, move |inner| UnsyncedFile {
            inner,
            fail_next_sync: flag,
        })
        .await
        .unwrap();
        let ledger = journaled_ledger(log).await;
        let account = open(&ledger, dec!(0)).await;
        let number = account.account_number;

        ledger.deposit(&number, dec!(5)).await.unwrap();

        fail_next_sync.store(true, Ordering::SeqCst);
        let err = ledger.deposit(&number, dec!(7)).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::StorageFailure);
        assert_eq!(balance(&ledger, &number).await, dec!(5));

        let movement = ledger.deposit(&number, dec!(3)).await.unwrap();
        assert_eq!(movement.transaction.id, 2);
    }

    let rows = journal::replay(&path).await.unwrap();
    assert_eq!(rows.iter().map(|tx| tx.id).collect::<Vec<_>>(), vec![1, 2]);
    assert_eq!(
        rows.iter().map(|tx| tx.amount.amount()).collect::<Vec<_>>(),
        vec![dec!(5), dec!(3)]
    );
}

#[tokio::test]
async fn test_missing_journal_replays_empty() {
    let temp_dir = TempDir::new().unwrap();
    let rows = journal::replay(&temp_dir.path().join("absent.journal"))
        .await
        .unwrap();
    assert!(rows.is_empty());
}
