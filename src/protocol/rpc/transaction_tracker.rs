//! Retransmission tracking by `(xid, client)`.
//!
//! NFS mutators are not idempotent, so a retransmitted call must not be
//! executed twice. Seen transactions are remembered for a retention window;
//! in-progress ones are kept regardless of age.

use std::collections::HashMap;
use std::sync::Mutex;
use std::time::{Duration, SystemTime};

pub struct TransactionTracker {
    retention_period: Duration,
    transactions: Mutex<HashMap<(u32, String), TransactionState>>,
}

enum TransactionState {
    InProgress,
    Completed(SystemTime),
}

impl TransactionTracker {
    pub fn new(retention_period: Duration) -> Self {
        Self { retention_period, transactions: Mutex::new(HashMap::new()) }
    }

    /// Returns true if this `(xid, client)` pair was already seen. A new pair
    /// is marked in-progress as a side effect.
    pub fn is_retransmission(&self, xid: u32, client_addr: &str) -> bool {
        let key = (xid, client_addr.to_string());
        let mut transactions =
            self.transactions.lock().expect("transaction tracker lock poisoned");
        housekeeping(&mut transactions, self.retention_period);
        if let std::collections::hash_map::Entry::Vacant(entry) = transactions.entry(key) {
            entry.insert(TransactionState::InProgress);
            false
        } else {
            true
        }
    }

    /// Records that the reply for this transaction went out; the entry ages
    /// out after the retention period.
    pub fn mark_processed(&self, xid: u32, client_addr: &str) {
        let key = (xid, client_addr.to_string());
        let mut transactions =
            self.transactions.lock().expect("transaction tracker lock poisoned");
        if let Some(state) = transactions.get_mut(&key) {
            *state = TransactionState::Completed(SystemTime::now());
        }
    }
}

fn housekeeping(
    transactions: &mut HashMap<(u32, String), TransactionState>,
    max_age: Duration,
) {
    let cutoff = SystemTime::now() - max_age;
    transactions.retain(|_, state| match state {
        TransactionState::InProgress => true,
        TransactionState::Completed(done) => *done >= cutoff,
    });
}
