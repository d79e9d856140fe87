mod common;

use account_ledger::{
    AccountNumberGenerator, AccountStore, AccountType, ErrorKind, InMemoryAccountStore,
    LedgerConfig, NewAccount, RandomDigits,
};
use common::ScriptedNumbers;
use std::collections::HashSet;
use std::sync::Arc;

fn store_with(generator: Arc<dyn AccountNumberGenerator>, config: LedgerConfig) -> InMemoryAccountStore {
    InMemoryAccountStore::new(generator, &config)
}

fn savings() -> NewAccount {
    NewAccount::new(1, AccountType::Savings)
}

// ============================================================================
// UNIQUENESS
// ============================================================================

#[tokio::test]
async fn test_ten_thousand_sequential_creations_are_unique() {
    let store = store_with(Arc::new(RandomDigits::seeded(42)), LedgerConfig::default());

    let mut seen = HashSet::new();
    for _ in 0..10_000 {
        let account = store.create(savings()).await.unwrap();
        assert_eq!(account.account_number.len(), 10);
        assert!(account.account_number.bytes().all(|b| b.is_ascii_digit()));
        assert!(seen.insert(account.account_number));
    }

    assert_eq!(store.list_all().await.unwrap().len(), 10_000);
}

#[tokio::test]
async fn test_random_digits_respects_length() {
    let generator = RandomDigits::seeded(3);
    for length in [1, 4, 10, 18] {
        let candidate = generator.generate(length);
        assert_eq!(candidate.len(), length);
        assert!(candidate.bytes().all(|b| b.is_ascii_digit()));
    }
}

#[tokio::test]
async fn test_collision_retries_with_next_random_candidate() {
    let store = store_with(
        Arc::new(ScriptedNumbers::new(&["5555555555", "5555555555", "1234567890"])),
        LedgerConfig::default(),
    );

    let first = store.create(savings()).await.unwrap();
    let second = store.create(savings()).await.unwrap();

    assert_eq!(first.account_number, "5555555555");
    assert_eq!(second.account_number, "1234567890");
}

// ============================================================================
// TERMINATION
// ============================================================================

#[tokio::test]
async fn test_stuck_generator_falls_back_to_sequential_probe() {
    // ScriptedNumbers with an empty script always answers all zeros
    let config = LedgerConfig {
        random_attempts_before_probe: 3,
        ..LedgerConfig::default()
    };
    let store = store_with(Arc::new(ScriptedNumbers::new(&[])), config);

    let numbers: Vec<String> = {
        let mut numbers = Vec::new();
        for _ in 0..4 {
            numbers.push(store.create(savings()).await.unwrap().account_number);
        }
        numbers
    };

    assert_eq!(
        numbers,
        vec!["0000000000", "0000000001", "0000000002", "0000000003"]
    );
}

#[tokio::test]
async fn test_exhausted_number_space_is_an_error() {
    let config = LedgerConfig {
        account_number_length: 1,
        random_attempts_before_probe: 5,
        ..LedgerConfig::default()
    };
    let store = store_with(Arc::new(RandomDigits::seeded(9)), config);

    let mut seen = HashSet::new();
    for _ in 0..10 {
        seen.insert(store.create(savings()).await.unwrap().account_number);
    }
    assert_eq!(seen.len(), 10);

    let err = store.create(savings()).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::AccountNumberSpaceExhausted);
}

#[tokio::test]
async fn test_deleted_number_is_retired() {
    let config = LedgerConfig {
        account_number_length: 1,
        random_attempts_before_probe: 1,
        ..LedgerConfig::default()
    };
    let store = store_with(Arc::new(ScriptedNumbers::new(&[])), config);

    let first = store.create(savings()).await.unwrap();
    store.delete(first.id).await.unwrap();
    let again = store.create(savings()).await.unwrap();

    assert_eq!(first.account_number, "0");
    assert_eq!(again.account_number, "1");
    assert!(!store.exists_by_number("0").await.unwrap());
}

#[tokio::test]
async fn test_retired_numbers_count_towards_exhaustion() {
    let config = LedgerConfig {
        account_number_length: 1,
        random_attempts_before_probe: 1,
        ..LedgerConfig::default()
    };
    let store = store_with(Arc::new(ScriptedNumbers::new(&[])), config);

    let mut ids = Vec::new();
    for _ in 0..10 {
        ids.push(store.create(savings()).await.unwrap().id);
    }
    for id in ids.into_iter().take(3) {
        store.delete(id).await.unwrap();
    }

    let err = store.create(savings()).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::AccountNumberSpaceExhausted);
    assert_eq!(store.list_all().await.unwrap().len(), 7);
}
