use crate::errors::{LedgerError, LedgerResult};
use crate::models::{NewTransaction, Transaction, TransactionType};
use crate::transaction_log::{InMemoryLog, TransactionLog};
use anyhow::{Context, Result};
use async_trait::async_trait;
use csv_async::{AsyncReaderBuilder, AsyncWriterBuilder};
use futures::StreamExt;
use std::io::{self, SeekFrom};
use std::path::{Path, PathBuf};
use tokio::fs::{File, OpenOptions};
use tokio::io::{AsyncReadExt, AsyncSeekExt, AsyncWriteExt};
use tokio::sync::Mutex;
use tokio_util::compat::TokioAsyncReadCompatExt;
use tracing::{error, info, warn};

/// The file underneath a [`JournaledLog`], opened in append mode.
#[async_trait]
pub trait JournalFile: Send {
    /// Current length in bytes.
    async fn len(&mut self) -> io::Result<u64>;
    /// Writes all of `bytes` at the end of the file.
    async fn append(&mut self, bytes: &[u8]) -> io::Result<()>;
    /// Flushes and forces written bytes to disk.
    async fn sync(&mut self) -> io::Result<()>;
    /// Cuts the file back to `len` bytes.
    async fn truncate(&mut self, len: u64) -> io::Result<()>;
}

#[async_trait]
impl JournalFile for File {
    async fn len(&mut self) -> io::Result<u64> {
        Ok(self.metadata().await?.len())
    }

    async fn append(&mut self, bytes: &[u8]) -> io::Result<()> {
        self.write_all(bytes).await
    }

    async fn sync(&mut self) -> io::Result<()> {
        self.flush().await?;
        self.sync_data().await
    }

    async fn truncate(&mut self, len: u64) -> io::Result<()> {
        self.set_len(len).await
    }
}

/// Transaction log persisted as an append-only CSV journal.
///
/// Every batch is encoded up front and written with a single `write_all`
/// followed by a sync, then indexed in memory. A batch that fails to reach the
/// disk is cut back out of the file. Queries never touch the file.
pub struct JournaledLog {
    path: PathBuf,
    writer: Mutex<Box<dyn JournalFile>>,
    index: InMemoryLog,
}

impl JournaledLog {
    /// Opens (or creates) the journal and replays what is already in it.
    pub async fn open(path: impl AsRef<Path>) -> Result<Self> {
        Self::open_with(path, |file| file).await
    }

    /// Like [`JournaledLog::open`], with the opened file wrapped by `wrap`.
    pub async fn open_with<F, W>(path: impl AsRef<Path>, wrap: W) -> Result<Self>
    where
        F: JournalFile + 'static,
        W: FnOnce(File) -> F,
    {
        let path = path.as_ref().to_path_buf();
        let index = InMemoryLog::new();

        let existing = replay(&path).await?;
        if !existing.is_empty() {
            info!(path = %path.display(), records = existing.len(), "Replayed transaction journal");
        }
        index.restore(existing).await;

        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .await
            .with_context(|| format!("opening journal {}", path.display()))?;

        // New records must start on a fresh line, not extend a torn one
        if ends_mid_line(&path).await? {
            warn!(path = %path.display(), "Terminating torn journal record");
            file.write_all(b"\n").await?;
            file.sync_data().await?;
        }

        let writer: Box<dyn JournalFile> = Box::new(wrap(file));
        Ok(Self {
            path,
            writer: Mutex::new(writer),
            index,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub async fn len(&self) -> usize {
        self.index.len().await
    }

    pub async fn is_empty(&self) -> bool {
        self.index.is_empty().await
    }
}

/// Reads every well-formed record; a torn trailing line from an interrupted
/// write is skipped.
pub async fn replay(path: &Path) -> Result<Vec<Transaction>> {
    if !path.exists() {
        return Ok(Vec::new());
    }

    let file = File::open(path)
        .await
        .with_context(|| format!("reading journal {}", path.display()))?;
    let mut records = AsyncReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .create_deserializer(file.compat())
        .into_deserialize::<Transaction>();

    let mut transactions = Vec::new();
    while let Some(record) = records.next().await {
        match record {
            Ok(tx) => transactions.push(tx),
            Err(e) => warn!(path = %path.display(), error = %e, "Skipping unreadable journal record"),
        }
    }

    Ok(transactions)
}

async fn ends_mid_line(path: &Path) -> Result<bool> {
    let mut file = File::open(path)
        .await
        .with_context(|| format!("reading journal {}", path.display()))?;
    if file.metadata().await?.len() == 0 {
        return Ok(false);
    }

    file.seek(SeekFrom::End(-1)).await?;
    let mut last = [0u8; 1];
    file.read_exact(&mut last).await?;
    Ok(last[0] != b'\n')
}

async fn encode(rows: &[Transaction]) -> LedgerResult<Vec<u8>> {
    let mut serializer = AsyncWriterBuilder::new()
        .has_headers(false)
        .create_serializer(Vec::new());

    for row in rows {
        serializer
            .serialize(row)
            .await
            .map_err(|e| LedgerError::storage(format!("encoding journal record: {e}")))?;
    }

    serializer
        .into_inner()
        .await
        .map_err(|_| LedgerError::storage("encoding journal batch"))
}

#[async_trait]
impl TransactionLog for JournaledLog {
    async fn append_batch(&self, txs: Vec<NewTransaction>) -> LedgerResult<Vec<Transaction>> {
        // Holding the writer serializes id assignment with the file order.
        let mut writer = self.writer.lock().await;

        let rows = self.index.stamp(txs).await;
        let bytes = encode(&rows).await?;

        let start = writer
            .len()
            .await
            .map_err(|e| LedgerError::storage(format!("reading journal length: {e}")))?;

        let written = match writer.append(&bytes).await {
            Ok(()) => writer.sync().await,
            Err(e) => Err(e),
        };

        if let Err(e) = written {
            // Nothing of a failed batch may survive for replay to pick up
            if let Err(truncate_error) = writer.truncate(start).await {
                error!(
                    path = %self.path.display(),
                    length = start,
                    error = %truncate_error,
                    "Failed to cut unsynced batch out of journal"
                );
            }
            return Err(LedgerError::storage(format!("writing journal: {e}")));
        }

        self.index.commit(&rows).await;
        Ok(rows)
    }

    async fn get(&self, id: u64) -> LedgerResult<Option<Transaction>> {
        self.index.get(id).await
    }

    async fn list_by_account(&self, account_number: &str) -> LedgerResult<Vec<Transaction>> {
        self.index.list_by_account(account_number).await
    }

    async fn list_by_type(&self, tx_type: TransactionType) -> LedgerResult<Vec<Transaction>> {
        self.index.list_by_type(tx_type).await
    }

    async fn list_by_reference(&self, reference_number: &str) -> LedgerResult<Vec<Transaction>> {
        self.index.list_by_reference(reference_number).await
    }

    async fn list_all(&self) -> LedgerResult<Vec<Transaction>> {
        self.index.list_all().await
    }
}
