use std::fmt;
use thiserror::Error;

pub type LedgerResult<T> = Result<T, LedgerError>;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum LedgerError {
    #[error("invalid amount: {0}")]
    InvalidAmount(String),
    #[error("amount would drop below zero")]
    NegativeResult,
    #[error("account not found: {0}")]
    AccountNotFound(String),
    #[error("customer not found: {0}")]
    CustomerNotFound(u64),
    #[error("insufficient funds in account {account}: balance {balance}, requested {requested}")]
    InsufficientFunds {
        account: String,
        balance: String,
        requested: String,
    },
    #[error("source and destination account are the same: {0}")]
    SameAccount(String),
    #[error("invalid status '{0}', expected ACTIVE or INACTIVE")]
    InvalidStatus(String),
    #[error("account {0} is inactive")]
    AccountInactive(String),
    #[error("account {account} still holds {balance}")]
    BalanceNotZero { account: String, balance: String },
    #[error("account number {0} already exists")]
    DuplicateAccountNumber(String),
    #[error("no free account numbers left")]
    AccountNumberSpaceExhausted,
    #[error("storage failure: {0}")]
    StorageFailure(String),
}

/// Stable classification of a [`LedgerError`], suitable for mapping onto a
/// transport-level status code.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    InvalidAmount,
    NegativeResult,
    AccountNotFound,
    CustomerNotFound,
    InsufficientFunds,
    SameAccount,
    InvalidStatus,
    AccountInactive,
    BalanceNotZero,
    DuplicateAccountNumber,
    AccountNumberSpaceExhausted,
    StorageFailure,
}

impl LedgerError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            LedgerError::InvalidAmount(_) => ErrorKind::InvalidAmount,
            LedgerError::NegativeResult => ErrorKind::NegativeResult,
            LedgerError::AccountNotFound(_) => ErrorKind::AccountNotFound,
            LedgerError::CustomerNotFound(_) => ErrorKind::CustomerNotFound,
            LedgerError::InsufficientFunds { .. } => ErrorKind::InsufficientFunds,
            LedgerError::SameAccount(_) => ErrorKind::SameAccount,
            LedgerError::InvalidStatus(_) => ErrorKind::InvalidStatus,
            LedgerError::AccountInactive(_) => ErrorKind::AccountInactive,
            LedgerError::BalanceNotZero { .. } => ErrorKind::BalanceNotZero,
            LedgerError::DuplicateAccountNumber(_) => ErrorKind::DuplicateAccountNumber,
            LedgerError::AccountNumberSpaceExhausted => ErrorKind::AccountNumberSpaceExhausted,
            LedgerError::StorageFailure(_) => ErrorKind::StorageFailure,
        }
    }

    pub fn storage(msg: impl fmt::Display) -> Self {
        LedgerError::StorageFailure(msg.to_string())
    }

    /// Validation and lookup failures the caller can correct and retry.
    pub fn is_recoverable(&self) -> bool {
        !matches!(
            self.kind(),
            ErrorKind::StorageFailure | ErrorKind::AccountNumberSpaceExhausted
        )
    }
}

impl ErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorKind::InvalidAmount => "INVALID_AMOUNT",
            ErrorKind::NegativeResult => "NEGATIVE_RESULT",
            ErrorKind::AccountNotFound => "ACCOUNT_NOT_FOUND",
            ErrorKind::CustomerNotFound => "CUSTOMER_NOT_FOUND",
            ErrorKind::InsufficientFunds => "INSUFFICIENT_FUNDS",
            ErrorKind::SameAccount => "SAME_ACCOUNT",
            ErrorKind::InvalidStatus => "INVALID_STATUS",
            ErrorKind::AccountInactive => "ACCOUNT_INACTIVE",
            ErrorKind::BalanceNotZero => "BALANCE_NOT_ZERO",
            ErrorKind::DuplicateAccountNumber => "DUPLICATE_ACCOUNT_NUMBER",
            ErrorKind::AccountNumberSpaceExhausted => "ACCOUNT_NUMBER_SPACE_EXHAUSTED",
            ErrorKind::StorageFailure => "STORAGE_FAILURE",
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
