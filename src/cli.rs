use crate::account_number::{AccountNumberGenerator, RandomDigits};
use crate::config::LedgerConfig;
use crate::csv_io::{stream_commands, write_accounts, write_transactions, AccountOutput, CommandRow, Operation};
use crate::customers::InMemoryCustomers;
use crate::journal;
use crate::ledger::Ledger;
use crate::models::{AccountType, NewAccount};
use crate::money::Money;
use anyhow::{Context, Result};
use futures::StreamExt;
use rust_decimal::Decimal;
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::fs::File;
use tokio::io::BufReader;
use tracing::warn;

/// Runs a batch file through a fresh ledger and prints the final accounts.
pub async fn run(
    input_path: PathBuf,
    journal_path: Option<PathBuf>,
    seed: Option<u64>,
    mut config: LedgerConfig,
) -> Result<()> {
    if journal_path.is_some() {
        config.journal_path = journal_path;
    }

    let generator: Arc<dyn AccountNumberGenerator> = match seed {
        Some(seed) => Arc::new(RandomDigits::seeded(seed)),
        None => Arc::new(RandomDigits::new()),
    };
    let customers = Arc::new(InMemoryCustomers::new());
    let ledger = Ledger::from_config(&config, generator, customers.clone()).await?;

    let file = File::open(&input_path)
        .await
        .with_context(|| format!("opening {}", input_path.display()))?;
    let reader = BufReader::new(file);
    let mut stream = stream_commands(reader);

    let mut batch = Batch {
        ledger: ledger.clone(),
        customers,
        labels: HashMap::new(),
    };

    let mut line = 1usize;
    while let Some(result) = stream.next().await {
        line += 1;
        match result {
            Ok(row) => {
                let op = row.op;
                if let Err(e) = batch.apply(row).await {
                    warn!(line, op = ?op, error = %e, "Rejected row");
                }
            }
            Err(e) => {
                warn!(line, error = %e, "Skipping unparsable row");
            }
        }
    }

    let labels_by_number: HashMap<String, String> = batch
        .labels
        .into_iter()
        .map(|(label, number)| (number, label))
        .collect();

    let mut accounts: Vec<AccountOutput> = ledger
        .queries()
        .accounts()
        .await?
        .into_iter()
        .map(|account| AccountOutput {
            account_number: account.account_number.clone(),
            label: labels_by_number
                .get(&account.account_number)
                .cloned()
                .unwrap_or_default(),
            account,
        })
        .collect();

    accounts.sort_by(|a, b| a.account_number.cmp(&b.account_number));

    write_accounts(tokio::io::stdout(), accounts).await?;

    Ok(())
}

/// Prints every record of a journal file.
pub async fn history(journal_path: PathBuf) -> Result<()> {
    if !journal_path.exists() {
        anyhow::bail!("journal {} does not exist", journal_path.display());
    }

    let transactions = journal::replay(&journal_path).await?;
    write_transactions(tokio::io::stdout(), &transactions).await
}

struct Batch {
    ledger: Ledger,
    customers: Arc<InMemoryCustomers>,
    /// Label from an `open` row to the generated account number
    labels: HashMap<String, String>,
}

impl Batch {
    async fn apply(&mut self, row: CommandRow) -> Result<()> {
        match row.op {
            Operation::Customer => {
                let id: u64 = row.account.parse().context("customer id")?;
                self.customers
                    .register(id, row.note.unwrap_or_default())
                    .await;
            }
            Operation::Open => {
                let customer_id: u64 = row
                    .counterparty
                    .as_deref()
                    .context("missing customer id")?
                    .parse()
                    .context("customer id")?;
                let account_type = match row.note.as_deref() {
                    Some(name) => name.parse()?,
                    None => AccountType::Savings,
                };
                let opening = Money::new(row.amount.unwrap_or(Decimal::ZERO))?;

                let account = self
                    .ledger
                    .open_account(
                        NewAccount::new(customer_id, account_type).with_opening_balance(opening),
                    )
                    .await?;
                self.labels.insert(row.account, account.account_number);
            }
            Operation::Deposit => {
                let number = self.resolve(&row.account);
                self.ledger.deposit(&number, required_amount(&row)?).await?;
            }
            Operation::Withdraw => {
                let number = self.resolve(&row.account);
                self.ledger.withdraw(&number, required_amount(&row)?).await?;
            }
            Operation::Transfer => {
                let from = self.resolve(&row.account);
                let to = self.resolve(row.counterparty.as_deref().context("missing destination")?);
                self.ledger
                    .transfer(&from, &to, required_amount(&row)?, row.note.as_deref())
                    .await?;
            }
            Operation::Status => {
                let number = self.resolve(&row.account);
                let account = self.ledger.queries().account_by_number(&number).await?;
                self.ledger
                    .update_status(account.id, row.note.as_deref().unwrap_or_default())
                    .await?;
            }
        }

        Ok(())
    }

    fn resolve(&self, label_or_number: &str) -> String {
        self.labels
            .get(label_or_number)
            .cloned()
            .unwrap_or_else(|| label_or_number.to_string())
    }
}

fn required_amount(row: &CommandRow) -> Result<Decimal> {
    row.amount.context("missing amount")
}
