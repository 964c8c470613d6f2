//! Entitlement records and the persisted store model.
//! Wire layout: `{ "users": { "<user_id>": { ... } } }` — one record
//! per user, overwritten wholesale on renewal, never historized.

use rustc_hash::FxHashMap;
use serde::{Deserialize, Serialize};

/// Sentinel quota meaning "no generation limit".
pub const UNLIMITED_GENERATIONS: i64 = -1;

/// Lifecycle status of a subscription record.
///
/// The only transitions are `Active → Expired` (observed lazily on
/// read when the deadline has passed) and `Expired → Active` through a
/// fresh grant, which replaces the whole record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SubscriptionStatus {
    Active,
    Expired,
}

/// One user's subscription: plan label, lifecycle status, expiry
/// window, payment reference, and generation quota accounting.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EntitlementRecord {
    /// Plan label from the payment layer; only interpreted for quota lookup.
    pub plan_name: String,
    pub status: SubscriptionStatus,
    /// Unix seconds.
    pub created_at: u64,
    /// Unix seconds. Always strictly greater than `created_at`.
    pub expires_at: u64,
    /// External payment reference, when the grant was tied to one.
    pub payment_id: Option<String>,
    /// `-1` means unlimited.
    pub generations_limit: i64,
    pub generations_used: i64,
}

impl EntitlementRecord {
    /// True when the expiry deadline has passed at `now`.
    pub fn is_expired(&self, now: u64) -> bool {
        self.expires_at <= now
    }

    pub fn is_unlimited(&self) -> bool {
        self.generations_limit == UNLIMITED_GENERATIONS
    }

    /// Remaining generations: `-1` for unlimited plans, otherwise
    /// `limit - used` floored at zero.
    pub fn generations_left(&self) -> i64 {
        if self.is_unlimited() {
            UNLIMITED_GENERATIONS
        } else {
            (self.generations_limit - self.generations_used).max(0)
        }
    }

    /// True when the counter still admits one more generation.
    /// Expiry is the caller's concern; this checks the quota only.
    pub fn has_quota(&self) -> bool {
        self.is_unlimited() || self.generations_used < self.generations_limit
    }
}

/// The full persisted record store, keyed by user identifier.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RecordStore {
    #[serde(default)]
    pub users: FxHashMap<String, EntitlementRecord>,
}

impl RecordStore {
    pub fn get(&self, user_id: &str) -> Option<&EntitlementRecord> {
        self.users.get(user_id)
    }

    pub fn get_mut(&mut self, user_id: &str) -> Option<&mut EntitlementRecord> {
        self.users.get_mut(user_id)
    }

    /// Insert or overwrite the record for a user.
    pub fn insert(&mut self, user_id: impl Into<String>, record: EntitlementRecord) {
        self.users.insert(user_id.into(), record);
    }

    pub fn len(&self) -> usize {
        self.users.len()
    }

    pub fn is_empty(&self) -> bool {
        self.users.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &EntitlementRecord)> {
        self.users.iter()
    }
}
