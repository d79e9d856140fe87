pub mod account_number;
pub mod account_store;
pub mod cli;
pub mod config;
pub mod csv_io;
pub mod customers;
pub mod errors;
pub mod journal;
pub mod ledger;
pub mod locks;
pub mod models;
pub mod money;
pub mod query;
pub mod reference;
pub mod transaction_log;

pub use account_number::{AccountNumberGenerator, RandomDigits};
pub use account_store::{AccountStore, InMemoryAccountStore};
pub use config::LedgerConfig;
pub use customers::{CustomerDirectory, InMemoryCustomers};
pub use errors::{ErrorKind, LedgerError, LedgerResult};
pub use journal::{JournalFile, JournaledLog};
pub use locks::{AccountLocks, SettleGate};
pub use ledger::Ledger;
pub use models::{
    Account, AccountStatus, AccountType, AccountUpdate, Customer, Movement, NewAccount,
    NewTransaction, Transaction, TransactionStatus, TransactionType, TransferReceipt,
};
pub use money::Money;
pub use query::{AccountStatistics, LedgerQueries, TransactionStatistics, TransferView};
pub use transaction_log::{InMemoryLog, TransactionLog};
