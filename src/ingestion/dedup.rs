use metrics::counter;
use std::collections::HashMap;
use std::sync::Mutex;
use std::time::{Duration, Instant};

/// Retention horizon for seen transaction IDs. The venue redelivers only
/// recent history after a reconnect, so a day of retention is ample.
pub const DEDUP_HORIZON: Duration = Duration::from_secs(24 * 3600);

/// Prune cadence, counted in inserts. Keeps eviction amortized without a
/// background task.
const PRUNE_EVERY: usize = 4_096;

struct DedupState {
    entries: HashMap<String, Instant>,
    inserts_since_prune: usize,
}

/// Bounded-retention duplicate filter keyed by transaction ID.
///
/// Consulted before any classification work so reconnect replays and
/// primary/backup overlap cannot double-emit an alert. Safe for concurrent
/// use from multiple feed consumers.
pub struct Deduplicator {
    state: Mutex<DedupState>,
    horizon: Duration,
}

impl Default for Deduplicator {
    fn default() -> Self {
        Self::new()
    }
}

impl Deduplicator {
    pub fn new() -> Self {
        Self::with_horizon(DEDUP_HORIZON)
    }

    pub fn with_horizon(horizon: Duration) -> Self {
        Self {
            state: Mutex::new(DedupState {
                entries: HashMap::new(),
                inserts_since_prune: 0,
            }),
            horizon,
        }
    }

    /// Returns `true` the first time a transaction ID is seen and marks it;
    /// `false` for any replay within the horizon. Check and mark are one
    /// atomic step under the lock.
    pub fn check_and_mark(&self, tx_id: &str) -> bool {
        self.check_and_mark_at(tx_id, Instant::now())
    }

    fn check_and_mark_at(&self, tx_id: &str, now: Instant) -> bool {
        let mut state = self.state.lock().unwrap();

        if let Some(seen_at) = state.entries.get(tx_id) {
            if now.duration_since(*seen_at) < self.horizon {
                counter!("dedup_hits_total").increment(1);
                return false;
            }
        }

        state.entries.insert(tx_id.to_string(), now);
        state.inserts_since_prune += 1;
        if state.inserts_since_prune >= PRUNE_EVERY {
            let horizon = self.horizon;
            state
                .entries
                .retain(|_, seen_at| now.duration_since(*seen_at) < horizon);
            state.inserts_since_prune = 0;
        }
        true
    }

    pub fn len(&self) -> usize {
        self.state.lock().unwrap().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
