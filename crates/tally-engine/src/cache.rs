//! Active-subscription cache: a derived user → entitlement index.
//!
//! Rebuilt in full on every store write; a fresh grant force-marks its
//! entry so the user is visible before the next rebuild. Entries carry
//! the record's expiry deadline, and a `true` hit whose deadline has
//! passed reads as a miss — the caller re-derives from the record, so
//! an expiry between rebuilds is never reported active and the
//! active→expired transition runs exactly once.

use rustc_hash::FxHashMap;

use tally_core::records::{RecordStore, SubscriptionStatus};

#[derive(Debug, Clone, Copy)]
struct CacheEntry {
    active: bool,
    expires_at: u64,
}

/// Derived index answering "is this user currently entitled" without a
/// record lookup. Not authoritative — valid as of the last rebuild.
#[derive(Debug, Default)]
pub struct ActiveCache {
    entries: FxHashMap<String, CacheEntry>,
}

impl ActiveCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Rebuild the whole index from the record store.
    ///
    /// Records still marked active whose deadline has already passed
    /// are left out entirely: their lazy expiry flip is pending, and a
    /// cached `false` would let lookups skip it.
    pub fn rebuild(&mut self, store: &RecordStore, now: u64) {
        self.entries.clear();
        for (user_id, record) in store.iter() {
            let live = record.expires_at > now;
            match record.status {
                SubscriptionStatus::Active if live => {
                    self.entries.insert(
                        user_id.clone(),
                        CacheEntry {
                            active: true,
                            expires_at: record.expires_at,
                        },
                    );
                }
                SubscriptionStatus::Active => {}
                SubscriptionStatus::Expired => {
                    self.entries.insert(
                        user_id.clone(),
                        CacheEntry {
                            active: false,
                            expires_at: record.expires_at,
                        },
                    );
                }
            }
        }
    }

    /// Force-mark a user active after a fresh grant, covering the gap
    /// between a write and the next full rebuild.
    pub fn mark_active(&mut self, user_id: &str, expires_at: u64) {
        self.entries.insert(
            user_id.to_string(),
            CacheEntry {
                active: true,
                expires_at,
            },
        );
    }

    /// Cached entitlement hint. `None` means "re-derive from the
    /// record" — the user is uncached, or a `true` entry went stale
    /// because its deadline passed since the last rebuild.
    pub fn lookup(&self, user_id: &str, now: u64) -> Option<bool> {
        match self.entries.get(user_id) {
            Some(entry) if entry.active && entry.expires_at <= now => None,
            Some(entry) => Some(entry.active),
            None => None,
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tally_core::records::EntitlementRecord;

    const NOW: u64 = 1_700_000_000;

    fn store_with(status: SubscriptionStatus, expires_at: u64) -> RecordStore {
        let mut store = RecordStore::default();
        store.insert(
            "u1",
            EntitlementRecord {
                plan_name: "single".to_string(),
                status,
                created_at: NOW - 86_400,
                expires_at,
                payment_id: None,
                generations_limit: 1,
                generations_used: 0,
            },
        );
        store
    }

    #[test]
    fn rebuild_marks_live_records_active() {
        let mut cache = ActiveCache::new();
        cache.rebuild(&store_with(SubscriptionStatus::Active, NOW + 100), NOW);
        assert_eq!(cache.lookup("u1", NOW), Some(true));
    }

    #[test]
    fn rebuild_marks_expired_records_inactive() {
        let mut cache = ActiveCache::new();
        cache.rebuild(&store_with(SubscriptionStatus::Expired, NOW - 100), NOW);
        assert_eq!(cache.lookup("u1", NOW), Some(false));
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn pending_expiry_flip_is_a_miss() {
        // Active status but deadline already passed: the lazy flip has
        // not run yet, so the cache must not answer for this user.
        let mut cache = ActiveCache::new();
        cache.rebuild(&store_with(SubscriptionStatus::Active, NOW - 1), NOW);
        assert_eq!(cache.lookup("u1", NOW), None);
        assert!(cache.is_empty());
    }

    #[test]
    fn stale_true_entry_reads_as_miss() {
        let mut cache = ActiveCache::new();
        cache.rebuild(&store_with(SubscriptionStatus::Active, NOW + 50), NOW);
        assert_eq!(cache.lookup("u1", NOW + 49), Some(true));
        // Deadline passes between rebuilds: the entry stops answering.
        assert_eq!(cache.lookup("u1", NOW + 50), None);
    }

    #[test]
    fn unknown_user_is_a_miss() {
        let cache = ActiveCache::new();
        assert_eq!(cache.lookup("ghost", NOW), None);
    }

    #[test]
    fn mark_active_overrides_until_rebuild() {
        let mut cache = ActiveCache::new();
        cache.mark_active("u2", NOW + 1_000);
        assert_eq!(cache.lookup("u2", NOW), Some(true));

        cache.rebuild(&RecordStore::default(), NOW);
        assert_eq!(cache.lookup("u2", NOW), None);
    }
}
