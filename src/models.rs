use crate::errors::LedgerError;
use crate::money::Money;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AccountType {
    Savings,
    Checking,
    Current,
}

impl AccountType {
    pub fn as_str(&self) -> &'static str {
        match self {
            AccountType::Savings => "SAVINGS",
            AccountType::Checking => "CHECKING",
            AccountType::Current => "CURRENT",
        }
    }
}

impl FromStr for AccountType {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_uppercase().as_str() {
            "SAVINGS" => Ok(AccountType::Savings),
            "CHECKING" => Ok(AccountType::Checking),
            "CURRENT" => Ok(AccountType::Current),
            _ => anyhow::bail!("Unknown account type: {}", s),
        }
    }
}

impl fmt::Display for AccountType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AccountStatus {
    Active,
    Inactive,
}

impl AccountStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            AccountStatus::Active => "ACTIVE",
            AccountStatus::Inactive => "INACTIVE",
        }
    }
}

impl FromStr for AccountStatus {
    type Err = LedgerError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_uppercase().as_str() {
            "ACTIVE" => Ok(AccountStatus::Active),
            "INACTIVE" => Ok(AccountStatus::Inactive),
            _ => Err(LedgerError::InvalidStatus(s.to_string())),
        }
    }
}

impl fmt::Display for AccountStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Account {
    pub id: u64,
    pub account_number: String,
    pub account_type: AccountType,
    pub balance: Money,
    pub status: AccountStatus,
    pub opened_at: DateTime<Utc>,
    pub customer_id: u64,
}

impl Account {
    pub fn is_active(&self) -> bool {
        self.status == AccountStatus::Active
    }
}

/// Request to open an account for an existing customer.
#[derive(Debug, Clone)]
pub struct NewAccount {
    pub customer_id: u64,
    pub account_type: AccountType,
    pub opening_balance: Money,
    pub status: AccountStatus,
}

impl NewAccount {
    pub fn new(customer_id: u64, account_type: AccountType) -> Self {
        Self {
            customer_id,
            account_type,
            opening_balance: Money::ZERO,
            status: AccountStatus::Active,
        }
    }

    pub fn with_opening_balance(mut self, balance: Money) -> Self {
        self.opening_balance = balance;
        self
    }

    pub fn with_status(mut self, status: AccountStatus) -> Self {
        self.status = status;
        self
    }
}

/// Partial update of the mutable account fields; `None` leaves a field as is.
#[derive(Debug, Clone, Default)]
pub struct AccountUpdate {
    pub account_type: Option<AccountType>,
    pub status: Option<AccountStatus>,
    pub balance: Option<Money>,
}

impl AccountUpdate {
    pub fn balance(balance: Money) -> Self {
        Self {
            balance: Some(balance),
            ..Self::default()
        }
    }

    pub fn status(status: AccountStatus) -> Self {
        Self {
            status: Some(status),
            ..Self::default()
        }
    }

    pub fn account_type(account_type: AccountType) -> Self {
        Self {
            account_type: Some(account_type),
            ..Self::default()
        }
    }

    pub fn apply(&self, account: &mut Account) {
        if let Some(account_type) = self.account_type {
            account.account_type = account_type;
        }
        if let Some(status) = self.status {
            account.status = status;
        }
        if let Some(balance) = self.balance {
            account.balance = balance;
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TransactionType {
    Deposit,
    Withdrawal,
    TransferDebit,
    TransferCredit,
}

impl TransactionType {
    pub fn as_str(&self) -> &'static str {
        match self {
            TransactionType::Deposit => "DEPOSIT",
            TransactionType::Withdrawal => "WITHDRAWAL",
            TransactionType::TransferDebit => "TRANSFER_DEBIT",
            TransactionType::TransferCredit => "TRANSFER_CREDIT",
        }
    }
}

impl FromStr for TransactionType {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_uppercase().as_str() {
            "DEPOSIT" => Ok(TransactionType::Deposit),
            "WITHDRAWAL" => Ok(TransactionType::Withdrawal),
            "TRANSFER_DEBIT" => Ok(TransactionType::TransferDebit),
            "TRANSFER_CREDIT" => Ok(TransactionType::TransferCredit),
            _ => anyhow::bail!("Unknown transaction type: {}", s),
        }
    }
}

impl fmt::Display for TransactionType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Outcome stored on a transaction row.
///
/// The ledger only logs movements that went through, so every row it writes is
/// `Success`; a rejected movement writes no row at all. `Failed` is still
/// accepted when a journal is read back.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TransactionStatus {
    Success,
    Failed,
}

/// One immutable row of the audit trail.
///
/// The account number is carried next to the account id; numbers never change
/// after creation, so the row stays readable even if the account is closed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Transaction {
    pub id: u64,
    pub account_id: u64,
    pub account_number: String,
    pub tx_type: TransactionType,
    pub amount: Money,
    pub description: String,
    pub status: TransactionStatus,
    pub reference_number: String,
    pub timestamp: DateTime<Utc>,
}

/// A transaction before the log has assigned its id.
#[derive(Debug, Clone)]
pub struct NewTransaction {
    pub account_id: u64,
    pub account_number: String,
    pub tx_type: TransactionType,
    pub amount: Money,
    pub description: String,
    pub reference_number: String,
}

impl NewTransaction {
    pub fn for_account(
        account: &Account,
        tx_type: TransactionType,
        amount: Money,
        description: impl Into<String>,
        reference_number: impl Into<String>,
    ) -> Self {
        Self {
            account_id: account.id,
            account_number: account.account_number.clone(),
            tx_type,
            amount,
            description: description.into(),
            reference_number: reference_number.into(),
        }
    }

    pub fn into_transaction(self, id: u64, timestamp: DateTime<Utc>) -> Transaction {
        Transaction {
            id,
            account_id: self.account_id,
            account_number: self.account_number,
            tx_type: self.tx_type,
            amount: self.amount,
            description: self.description,
            status: TransactionStatus::Success,
            reference_number: self.reference_number,
            timestamp,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Customer {
    pub id: u64,
    pub full_name: String,
}

/// Result of a deposit or withdrawal.
#[derive(Debug, Clone)]
pub struct Movement {
    pub account: Account,
    pub transaction: Transaction,
}

/// Result of a transfer: both updated accounts and both legs.
#[derive(Debug, Clone)]
pub struct TransferReceipt {
    pub from: Account,
    pub to: Account,
    pub debit: Transaction,
    pub credit: Transaction,
}

impl TransferReceipt {
    pub fn reference_number(&self) -> &str {
        &self.debit.reference_number
    }
}
