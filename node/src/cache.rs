//! # Response Cache
//!
//! Optional read-through cache for the two query endpoints that scan the
//! whole chain: `GET /chain` and `GET /student/{id}`.
//!
//! The ledger is always the source of truth. Entries expire after a fixed
//! TTL, and every successful append drops the full-chain entry and the
//! entry for the appended student before the `POST /add_mark` response is
//! sent.
//!
//! ## Stale writes
//!
//! A reader can compute a response, lose the race to an append, and then try
//! to cache what it computed. To stop that, the cache carries a generation
//! counter that every invalidation bumps before removing keys. Readers note
//! the generation before touching the ledger and [`ResponseCache::store_chain`]
//! / [`ResponseCache::store_student`] refuse the write if it moved. The check
//! runs while the DashMap shard for that key is locked, so an invalidation
//! either happens before the check (write refused) or its removal waits for
//! the write and then deletes it.
//!
//! ## Eviction
//!
//! Expired entries are dropped when their key is read, and every insert
//! sweeps the whole map once at least one TTL has passed since the last
//! sweep. An entry therefore lives at most about two TTLs, however many
//! distinct keys are requested.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use parking_lot::Mutex;

use gradechain_ledger::{BlockRecord, Payload};

/// How long a cached full-chain listing stays fresh.
pub const CHAIN_TTL: Duration = Duration::from_secs(10);

/// How long cached per-student records stay fresh.
pub const STUDENT_TTL: Duration = Duration::from_secs(30);

const FULL_CHAIN_KEY: &str = "full_chain";

struct Slot<V> {
    value: V,
    expires_at: Instant,
}

/// String-keyed map whose entries expire `ttl` after insertion.
struct TtlMap<V> {
    entries: DashMap<String, Slot<V>>,
    ttl: Duration,
    last_sweep: Mutex<Instant>,
}

impl<V: Clone> TtlMap<V> {
    fn new(ttl: Duration) -> Self {
        Self {
            entries: DashMap::new(),
            ttl,
            last_sweep: Mutex::new(Instant::now()),
        }
    }

    fn get(&self, key: &str) -> Option<V> {
        let now = Instant::now();
        if let Some(slot) = self.entries.get(key) {
            if slot.expires_at > now {
                return Some(slot.value.clone());
            }
        }
        // The read guard is gone; evict if still expired.
        self.entries.remove_if(key, |_, slot| slot.expires_at <= now);
        None
    }

    fn insert_if(&self, key: String, value: V, still_current: impl FnOnce() -> bool) -> bool {
        // Must run before `entry()` takes a shard lock; `retain` locks them all.
        self.sweep_if_due();

        let entry = self.entries.entry(key);
        if !still_current() {
            return false;
        }
        let slot = Slot {
            value,
            expires_at: Instant::now() + self.ttl,
        };
        match entry {
            Entry::Occupied(mut occupied) => {
                occupied.insert(slot);
            }
            Entry::Vacant(vacant) => {
                vacant.insert(slot);
            }
        }
        true
    }

    fn sweep_if_due(&self) {
        let now = Instant::now();
        {
            let mut last = self.last_sweep.lock();
            if now.duration_since(*last) < self.ttl {
                return;
            }
            *last = now;
        }
        let before = self.entries.len();
        self.entries.retain(|_, slot| slot.expires_at > now);
        let evicted = before.saturating_sub(self.entries.len());
        if evicted > 0 {
            tracing::debug!(evicted, "swept expired cache entries");
        }
    }

    fn remove(&self, key: &str) {
        self.entries.remove(key);
    }

    fn len(&self) -> usize {
        self.entries.len()
    }
}

/// Cache for query responses. Share behind an `Arc`.
pub struct ResponseCache {
    generation: AtomicU64,
    chain: TtlMap<Vec<BlockRecord>>,
    students: TtlMap<Vec<Payload>>,
}

impl ResponseCache {
    pub fn new() -> Self {
        Self::with_ttls(CHAIN_TTL, STUDENT_TTL)
    }

    pub fn with_ttls(chain_ttl: Duration, student_ttl: Duration) -> Self {
        Self {
            generation: AtomicU64::new(0),
            chain: TtlMap::new(chain_ttl),
            students: TtlMap::new(student_ttl),
        }
    }

    /// Current invalidation generation. Read it before querying the ledger
    /// and pass it back when storing the result.
    pub fn generation(&self) -> u64 {
        self.generation.load(Ordering::SeqCst)
    }

    pub fn chain(&self) -> Option<Vec<BlockRecord>> {
        self.chain.get(FULL_CHAIN_KEY)
    }

    /// Cache a full listing computed at generation `observed`.
    /// Returns `false` if an append invalidated the cache in the meantime.
    pub fn store_chain(&self, records: Vec<BlockRecord>, observed: u64) -> bool {
        self.chain
            .insert_if(FULL_CHAIN_KEY.to_string(), records, || self.generation() == observed)
    }

    pub fn student(&self, student_id: &str) -> Option<Vec<Payload>> {
        self.students.get(&student_key(student_id))
    }

    /// Cache one student's records computed at generation `observed`.
    pub fn store_student(&self, student_id: &str, records: Vec<Payload>, observed: u64) -> bool {
        self.students
            .insert_if(student_key(student_id), records, || self.generation() == observed)
    }

    /// Drop everything an append for `student_id` makes stale.
    pub fn invalidate_for_append(&self, student_id: &str) {
        self.generation.fetch_add(1, Ordering::SeqCst);
        self.chain.remove(FULL_CHAIN_KEY);
        self.students.remove(&student_key(student_id));
    }

    /// Number of live or not-yet-evicted entries.
    pub fn len(&self) -> usize {
        self.chain.len() + self.students.len()
    }
}

impl Default for ResponseCache {
    fn default() -> Self {
        Self::new()
    }
}

fn student_key(student_id: &str) -> String {
    format!("student:{}", student_id)
}

#[cfg(test)]
mod tests {
    use super::*;
    use gradechain_ledger::{Block, StudentRecord};

    fn records() -> Vec<BlockRecord> {
        vec![Block::genesis().to_record()]
    }

    fn ann() -> Vec<Payload> {
        vec![StudentRecord::new("S1", "Ann", "Math", 90).into()]
    }

    #[test]
    fn stores_and_returns_entries() {
        let cache = ResponseCache::new();
        assert!(cache.chain().is_none());

        let listing = records();
        let generation = cache.generation();
        assert!(cache.store_chain(listing.clone(), generation));
        assert!(cache.store_student("S1", ann(), generation));

        assert_eq!(cache.chain(), Some(listing));
        assert_eq!(cache.student("S1"), Some(ann()));
        assert!(cache.student("S2").is_none());
        assert_eq!(cache.len(), 2);
    }

    #[test]
    fn entries_expire_after_ttl() {
        let cache = ResponseCache::with_ttls(Duration::from_millis(20), Duration::from_millis(20));
        cache.store_chain(records(), cache.generation());
        cache.store_student("S1", ann(), cache.generation());

        std::thread::sleep(Duration::from_millis(40));
        assert!(cache.chain().is_none());
        assert!(cache.student("S1").is_none());
        assert_eq!(cache.len(), 0);
    }

    #[test]
    fn expired_entries_for_unread_keys_are_swept_on_insert() {
        let ttl = Duration::from_millis(5);
        let cache = ResponseCache::with_ttls(ttl, ttl);
        for i in 0..10_000 {
            cache.store_student(&format!("S{}", i), Vec::new(), cache.generation());
        }

        std::thread::sleep(Duration::from_millis(30));
        assert!(cache.student("unrelated").is_none());
        cache.store_student("fresh", ann(), cache.generation());

        assert_eq!(cache.len(), 1);
        assert_eq!(cache.student("fresh"), Some(ann()));
    }

    #[test]
    fn append_invalidates_chain_and_that_student_only() {
        let cache = ResponseCache::new();
        let generation = cache.generation();
        cache.store_chain(records(), generation);
        cache.store_student("S1", ann(), generation);
        cache.store_student("S2", Vec::new(), generation);

        cache.invalidate_for_append("S1");

        assert!(cache.chain().is_none());
        assert!(cache.student("S1").is_none());
        assert_eq!(cache.student("S2"), Some(Vec::new()));
    }

    #[test]
    fn results_computed_before_an_append_are_not_stored() {
        let cache = ResponseCache::new();
        let observed = cache.generation();

        cache.invalidate_for_append("S1");

        assert!(!cache.store_chain(records(), observed));
        assert!(!cache.store_student("S1", ann(), observed));
        assert_eq!(cache.len(), 0);
    }
}
