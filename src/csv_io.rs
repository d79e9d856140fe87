use crate::models::{Account, Transaction};
use csv_async::AsyncReaderBuilder;
use futures::stream::Stream;
use rust_decimal::Decimal;
use serde::Deserialize;
use tokio::io::{AsyncRead, AsyncWrite, AsyncWriteExt};
use tokio_util::compat::TokioAsyncReadCompatExt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Operation {
    Customer,
    Open,
    Deposit,
    Withdraw,
    Transfer,
    Status,
}

/// One line of a batch file: `op,account,counterparty,amount,note`.
///
/// | op       | account          | counterparty | amount  | note           |
/// |----------|------------------|--------------|---------|----------------|
/// | customer | customer id      |              |         | full name      |
/// | open     | label            | customer id  | opening | account type   |
/// | deposit  | label or number  |              | amount  |                |
/// | withdraw | label or number  |              | amount  |                |
/// | transfer | source           | destination  | amount  | description    |
/// | status   | label or number  |              |         | ACTIVE/INACTIVE|
#[derive(Debug, Clone, Deserialize)]
pub struct CommandRow {
    pub op: Operation,
    pub account: String,
    #[serde(default)]
    pub counterparty: Option<String>,
    #[serde(default)]
    pub amount: Option<Decimal>,
    #[serde(default)]
    pub note: Option<String>,
}

#[derive(Debug)]
pub struct AccountOutput {
    pub account_number: String,
    pub label: String,
    pub account: Account,
}

/// Stream command rows from async reader
pub fn stream_commands<R: AsyncRead + Unpin + Send + 'static>(
    reader: R,
) -> impl Stream<Item = Result<CommandRow, csv_async::Error>> {
    let compat_reader = reader.compat();
    let csv_reader = AsyncReaderBuilder::new()
        .trim(csv_async::Trim::All)
        .flexible(true)
        .create_deserializer(compat_reader);

    csv_reader.into_deserialize::<CommandRow>()
}

pub async fn write_accounts<W: AsyncWrite + Unpin>(
    mut writer: W,
    accounts: Vec<AccountOutput>,
) -> Result<(), anyhow::Error> {
    writer
        .write_all(b"account_number,label,type,status,balance\n")
        .await?;

    for output in accounts {
        let line = format!(
            "{},{},{},{},{}\n",
            output.account_number,
            output.label,
            output.account.account_type,
            output.account.status,
            output.account.balance
        );
        writer.write_all(line.as_bytes()).await?;
    }

    writer.flush().await?;
    Ok(())
}

pub async fn write_transactions<W: AsyncWrite + Unpin>(
    mut writer: W,
    transactions: &[Transaction],
) -> Result<(), anyhow::Error> {
    writer
        .write_all(b"id,reference,type,account_number,amount,timestamp,description\n")
        .await?;

    for tx in transactions {
        let line = format!(
            "{},{},{},{},{},{},\"{}\"\n",
            tx.id,
            tx.reference_number,
            tx.tx_type,
            tx.account_number,
            tx.amount,
            tx.timestamp.to_rfc3339(),
            tx.description.replace('"', "\"\"")
        );
        writer.write_all(line.as_bytes()).await?;
    }

    writer.flush().await?;
    Ok(())
}
