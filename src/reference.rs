use chrono::Utc;
use std::sync::atomic::{AtomicU64, Ordering};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReferenceKind {
    Deposit,
    Withdrawal,
    Transfer,
}

impl ReferenceKind {
    pub fn prefix(&self) -> &'static str {
        match self {
            ReferenceKind::Deposit => "DEP",
            ReferenceKind::Withdrawal => "WD",
            ReferenceKind::Transfer => "TRF",
        }
    }
}

/// Issues reference numbers of the form `TRF-1760000000000-000042`.
///
/// The millisecond timestamp separates process runs; the sequence separates
/// references issued within the same millisecond.
pub struct ReferenceGenerator {
    sequence: AtomicU64,
}

impl ReferenceGenerator {
    pub fn new() -> Self {
        Self::starting_at(0)
    }

    /// Continues after `issued` references, e.g. the size of a replayed journal.
    pub fn starting_at(issued: u64) -> Self {
        Self {
            sequence: AtomicU64::new(issued),
        }
    }

    pub fn next(&self, kind: ReferenceKind) -> String {
        let sequence = self.sequence.fetch_add(1, Ordering::Relaxed) + 1;
        format!(
            "{}-{}-{:06}",
            kind.prefix(),
            Utc::now().timestamp_millis(),
            sequence
        )
    }
}

impl Default for ReferenceGenerator {
    fn default() -> Self {
        Self::new()
    }
}
