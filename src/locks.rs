use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{Mutex, OwnedMutexGuard, RwLock, RwLockReadGuard, RwLockWriteGuard};

/// Registry of per-account critical sections, sharded to keep lookups cheap
/// under contention.
pub struct AccountLocks {
    shards: Vec<Arc<RwLock<Shard>>>,
    num_shards: usize,
}

struct Shard {
    locks: HashMap<u64, Arc<Mutex<()>>>,
}

/// Held critical section for one account; released on drop.
pub struct AccountGuard {
    pub account_id: u64,
    _guard: OwnedMutexGuard<()>,
}

impl AccountLocks {
    pub fn new(num_shards: usize) -> Self {
        let num_shards = num_shards.max(1);
        let shards = (0..num_shards)
            .map(|_| {
                Arc::new(RwLock::new(Shard {
                    locks: HashMap::new(),
                }))
            })
            .collect();

        Self { shards, num_shards }
    }

    /// Get or create the mutex for an account
    async fn get_or_create(&self, account_id: u64) -> Arc<Mutex<()>> {
        let shard = &self.shards[(account_id as usize) % self.num_shards];

        {
            let shard_lock = shard.read().await;
            if let Some(lock) = shard_lock.locks.get(&account_id) {
                return lock.clone();
            }
        }

        let mut shard_lock = shard.write().await;

        // Double-check (another task might have created it)
        if let Some(lock) = shard_lock.locks.get(&account_id) {
            return lock.clone();
        }

        let lock = Arc::new(Mutex::new(()));
        shard_lock.locks.insert(account_id, lock.clone());
        lock
    }

    pub async fn lock(&self, account_id: u64) -> AccountGuard {
        let guard = self.get_or_create(account_id).await.lock_owned().await;
        AccountGuard {
            account_id,
            _guard: guard,
        }
    }

    /// Locks two distinct accounts in ascending id order, so two transfers
    /// running in opposite directions cannot deadlock. Guards come back in
    /// argument order.
    ///
    /// The locks are not reentrant: passing the same id twice panics in debug
    /// builds and never returns otherwise.
    pub async fn lock_pair(&self, first: u64, second: u64) -> (AccountGuard, AccountGuard) {
        debug_assert_ne!(first, second, "lock_pair needs two distinct accounts");
        if first <= second {
            let a = self.lock(first).await;
            let b = self.lock(second).await;
            (a, b)
        } else {
            let b = self.lock(second).await;
            let a = self.lock(first).await;
            (a, b)
        }
    }

    /// Drops the registry entry of a deleted or unknown account.
    pub async fn forget(&self, account_id: u64) {
        let shard = &self.shards[(account_id as usize) % self.num_shards];
        shard.write().await.locks.remove(&account_id);
    }

    /// Number of accounts with a registry entry.
    pub async fn tracked(&self) -> usize {
        let mut total = 0;
        for shard in &self.shards {
            total += shard.read().await.locks.len();
        }
        total
    }
}

/// Keeps readers out of half-applied movements.
///
/// Movements share the gate from their first balance write until their
/// transaction rows are logged (or the balances are restored). Readers that
/// need a settled view take it exclusively, so they never see a balance
/// without its transaction or a change that is about to be undone.
#[derive(Default)]
pub struct SettleGate {
    inner: RwLock<()>,
}

impl SettleGate {
    pub fn new() -> Self {
        Self::default()
    }

    /// Taken by a movement after its account locks, never before.
    pub async fn apply(&self) -> RwLockReadGuard<'_, ()> {
        self.inner.read().await
    }

    pub async fn settled(&self) -> RwLockWriteGuard<'_, ()> {
        self.inner.write().await
    }
}
