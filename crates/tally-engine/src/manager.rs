//! `SubscriptionManager` — grant, check, meter.
//!
//! The single owner of the record store: loads it at open, serializes
//! every read-modify-write under one lock, and is the only component
//! that writes the store file. Expiry is lazy — a record flips
//! active→expired when a read observes the deadline passed; there is
//! no background sweep.

use std::sync::RwLock;

use serde::Serialize;
use tracing::{error, info, warn};

use tally_core::config::SubscriptionConfig;
use tally_core::errors::StoreError;
use tally_core::plans::quota_for_plan;
use tally_core::records::{
    EntitlementRecord, RecordStore, SubscriptionStatus, UNLIMITED_GENERATIONS,
};
use tally_core::time::{current_unix_time, days_until, format_unix};

use crate::cache::ActiveCache;
use crate::store::JsonStore;
use crate::verifier::PaymentVerifier;

const DAY_SECS: u64 = 86_400;

/// Mutable engine state. Owning the store handle here too means a save
/// can never race the mutation it persists.
struct ManagerState {
    records: RecordStore,
    cache: ActiveCache,
    store: JsonStore,
}

impl ManagerState {
    /// Persist and rebuild the derived index. The index is rebuilt even
    /// when the save fails: in-memory state stays authoritative.
    fn save_and_rebuild(&mut self, now: u64) -> Result<(), StoreError> {
        let result = self.store.save(&self.records);
        self.cache.rebuild(&self.records, now);
        result
    }
}

/// Result of a generation-access check, carrying an actionable prompt
/// for the denial cases.
#[derive(Debug, Clone)]
pub enum GenerationAccess {
    Allowed,
    NoSubscription {
        upgrade_url: String,
    },
    QuotaExhausted {
        used: i64,
        limit: i64,
        upgrade_url: String,
    },
}

impl GenerationAccess {
    pub fn is_allowed(&self) -> bool {
        matches!(self, Self::Allowed)
    }

    /// User-facing prompt for the denial cases.
    pub fn denial_message(&self) -> Option<String> {
        match self {
            Self::Allowed => None,
            Self::NoSubscription { upgrade_url } => Some(format!(
                "An active subscription is required. Choose a plan at {upgrade_url}"
            )),
            Self::QuotaExhausted {
                used,
                limit,
                upgrade_url,
            } => Some(format!(
                "Generation limit reached ({used}/{limit}). Upgrade your plan at {upgrade_url}"
            )),
        }
    }
}

/// Subscription record enriched for display. Field names mirror the
/// persisted record; the `*_formatted` and `days_left` fields are
/// derived at read time.
#[derive(Debug, Clone, Serialize)]
pub struct SubscriptionDetails {
    pub plan_name: String,
    pub status: SubscriptionStatus,
    pub created_at: u64,
    pub expires_at: u64,
    pub payment_id: Option<String>,
    pub generations_limit: i64,
    pub generations_used: i64,
    pub created_at_formatted: String,
    pub expires_at_formatted: String,
    /// Days remaining, one decimal, floored at zero.
    pub days_left: f64,
}

/// Per-user generation accounting snapshot for the application layer.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerationsInfo {
    pub has_subscription: bool,
    pub generations_limit: i64,
    pub generations_used: i64,
    /// `-1` when the plan is unlimited.
    pub generations_left: i64,
    pub is_unlimited: bool,
    pub can_generate: bool,
}

impl GenerationsInfo {
    fn none() -> Self {
        Self {
            has_subscription: false,
            generations_limit: 0,
            generations_used: 0,
            generations_left: 0,
            is_unlimited: false,
            can_generate: false,
        }
    }
}

/// The entitlement facade. Construct one per process and share it by
/// reference; all mutations are serialized internally.
pub struct SubscriptionManager {
    state: RwLock<ManagerState>,
    verifier: PaymentVerifier,
    upgrade_url: String,
}

impl SubscriptionManager {
    /// Open the store, load all records, and build the active index.
    pub fn open(config: &SubscriptionConfig) -> Result<Self, StoreError> {
        let store = JsonStore::open(config.effective_store_path())?;
        let records = store.load();
        let now = current_unix_time();
        let mut cache = ActiveCache::new();
        cache.rebuild(&records, now);

        let verifier = PaymentVerifier::new(
            config.effective_gateway_url(),
            config.effective_verify_timeout(),
            config.effective_test_mode(),
        );

        info!(
            users = records.len(),
            store = %store.path().display(),
            test_mode = verifier.test_mode(),
            "subscription manager ready"
        );

        Ok(Self {
            state: RwLock::new(ManagerState {
                records,
                cache,
                store,
            }),
            verifier,
            upgrade_url: config.effective_upgrade_url().to_string(),
        })
    }

    /// Grant or renew a subscription. The record for `user_id` is
    /// replaced wholesale: fresh counters, new expiry, status active.
    ///
    /// Returns `false` without mutating anything on an empty user id,
    /// a zero duration, a bad explicit limit, or a payment that fails
    /// verification.
    pub fn add_user_subscription(
        &self,
        user_id: &str,
        plan_name: &str,
        duration_days: u32,
        payment_id: Option<&str>,
        generations_limit: Option<i64>,
    ) -> bool {
        if user_id.is_empty() {
            warn!("grant rejected: empty user id");
            return false;
        }
        if duration_days == 0 {
            warn!(user_id, "grant rejected: zero duration");
            return false;
        }

        let limit = generations_limit.unwrap_or_else(|| quota_for_plan(plan_name));
        if limit < 0 && limit != UNLIMITED_GENERATIONS {
            warn!(user_id, limit, "grant rejected: negative generation limit");
            return false;
        }

        if let Some(pid) = payment_id {
            if let Err(e) = self.verifier.check(pid) {
                warn!(user_id, payment_id = pid, error = %e,
                    "payment verification failed, grant aborted");
                return false;
            }
        }

        let now = current_unix_time();
        let expires_at = now + u64::from(duration_days) * DAY_SECS;
        let record = EntitlementRecord {
            plan_name: plan_name.to_string(),
            status: SubscriptionStatus::Active,
            created_at: now,
            expires_at,
            payment_id: payment_id.map(str::to_string),
            generations_limit: limit,
            generations_used: 0,
        };

        let mut state = self.state.write().unwrap();
        state.records.insert(user_id, record);
        if let Err(e) = state.save_and_rebuild(now) {
            error!(user_id, error = %e,
                "store save failed after grant; in-memory state is authoritative");
        }
        // Visible immediately, before any save elsewhere rebuilds.
        state.cache.mark_active(user_id, expires_at);

        info!(
            user_id,
            plan = plan_name,
            generations_limit = limit,
            expires = %format_unix(expires_at),
            "subscription granted"
        );
        true
    }

    /// Does the user currently hold an active subscription?
    ///
    /// Lazy expiry happens here: an observed passed deadline flips the
    /// record to expired and persists before answering `false`.
    pub fn check_user_subscription(&self, user_id: &str) -> bool {
        let now = current_unix_time();

        if let Some(hit) = self.state.read().unwrap().cache.lookup(user_id, now) {
            return hit;
        }

        // Miss or stale hit: derive from the record under the write
        // lock, since an expiry flip mutates and persists.
        let mut state = self.state.write().unwrap();
        Self::check_subscription_locked(&mut state, user_id, now)
    }

    fn check_subscription_locked(state: &mut ManagerState, user_id: &str, now: u64) -> bool {
        let (expired_now, expires_at) = match state.records.get(user_id) {
            None => return false,
            Some(r) if r.status != SubscriptionStatus::Active => return false,
            Some(r) => (r.is_expired(now), r.expires_at),
        };

        if expired_now {
            info!(user_id, expired = %format_unix(expires_at), "subscription expired, updating record");
            if let Some(record) = state.records.get_mut(user_id) {
                record.status = SubscriptionStatus::Expired;
            }
            if let Err(e) = state.save_and_rebuild(now) {
                error!(user_id, error = %e, "store save failed after expiry flip");
            }
            return false;
        }

        state.cache.mark_active(user_id, expires_at);
        true
    }

    /// May the user consume one more generation right now?
    pub fn can_user_generate(&self, user_id: &str) -> bool {
        self.generation_access(user_id).is_allowed()
    }

    /// Generation-access decision with an actionable denial prompt.
    pub fn generation_access(&self, user_id: &str) -> GenerationAccess {
        let now = current_unix_time();
        let mut state = self.state.write().unwrap();
        self.generation_access_locked(&mut state, user_id, now)
    }

    fn generation_access_locked(
        &self,
        state: &mut ManagerState,
        user_id: &str,
        now: u64,
    ) -> GenerationAccess {
        if !Self::check_subscription_locked(state, user_id, now) {
            return GenerationAccess::NoSubscription {
                upgrade_url: self.upgrade_url.clone(),
            };
        }
        let Some(record) = state.records.get(user_id) else {
            return GenerationAccess::NoSubscription {
                upgrade_url: self.upgrade_url.clone(),
            };
        };
        if record.has_quota() {
            GenerationAccess::Allowed
        } else {
            GenerationAccess::QuotaExhausted {
                used: record.generations_used,
                limit: record.generations_limit,
                upgrade_url: self.upgrade_url.clone(),
            }
        }
    }

    /// Consume one generation. Access check and increment run under a
    /// single critical section, so concurrent callers can never push
    /// `generations_used` past the limit.
    pub fn use_user_generation(&self, user_id: &str) -> bool {
        let now = current_unix_time();
        let mut state = self.state.write().unwrap();

        if !self
            .generation_access_locked(&mut state, user_id, now)
            .is_allowed()
        {
            return false;
        }
        let Some(record) = state.records.get_mut(user_id) else {
            return false;
        };
        record.generations_used += 1;
        let used = record.generations_used;
        let limit = record.generations_limit;

        if let Err(e) = state.save_and_rebuild(now) {
            error!(user_id, error = %e, "store save failed after generation use");
        }
        info!(user_id, used, limit, "generation consumed");
        true
    }

    /// Full record for display, or `None` for an unknown user.
    /// Reads the record as stored; a passed deadline shows up as
    /// `days_left == 0.0` and flips on the next active check.
    pub fn get_subscription_info(&self, user_id: &str) -> Option<SubscriptionDetails> {
        let now = current_unix_time();
        let state = self.state.read().unwrap();
        let record = state.records.get(user_id)?;
        Some(SubscriptionDetails {
            plan_name: record.plan_name.clone(),
            status: record.status,
            created_at: record.created_at,
            expires_at: record.expires_at,
            payment_id: record.payment_id.clone(),
            generations_limit: record.generations_limit,
            generations_used: record.generations_used,
            created_at_formatted: format_unix(record.created_at),
            expires_at_formatted: format_unix(record.expires_at),
            days_left: days_until(record.expires_at, now),
        })
    }

    /// Generation accounting snapshot for the application layer.
    pub fn get_user_generations_info(&self, user_id: &str) -> GenerationsInfo {
        let now = current_unix_time();
        let mut state = self.state.write().unwrap();

        if !Self::check_subscription_locked(&mut state, user_id, now) {
            return GenerationsInfo::none();
        }
        let Some(record) = state.records.get(user_id) else {
            return GenerationsInfo::none();
        };
        GenerationsInfo {
            has_subscription: true,
            generations_limit: record.generations_limit,
            generations_used: record.generations_used,
            generations_left: record.generations_left(),
            is_unlimited: record.is_unlimited(),
            can_generate: record.has_quota(),
        }
    }

    /// Number of records currently held, all statuses.
    pub fn user_count(&self) -> usize {
        self.state.read().unwrap().records.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn denial_messages_are_actionable() {
        let access = GenerationAccess::QuotaExhausted {
            used: 3,
            limit: 3,
            upgrade_url: "https://example.com/pricing".to_string(),
        };
        let message = access.denial_message().unwrap();
        assert!(message.contains("3/3"));
        assert!(message.contains("https://example.com/pricing"));

        let access = GenerationAccess::NoSubscription {
            upgrade_url: "https://example.com/pricing".to_string(),
        };
        assert!(access.denial_message().unwrap().contains("subscription"));

        assert!(GenerationAccess::Allowed.denial_message().is_none());
    }

    #[test]
    fn generations_info_serializes_camel_case() {
        let info = GenerationsInfo {
            has_subscription: true,
            generations_limit: 3,
            generations_used: 1,
            generations_left: 2,
            is_unlimited: false,
            can_generate: true,
        };
        let raw = serde_json::to_value(&info).unwrap();
        assert_eq!(raw["hasSubscription"], true);
        assert_eq!(raw["generationsLimit"], 3);
        assert_eq!(raw["generationsLeft"], 2);
        assert_eq!(raw["isUnlimited"], false);
        assert_eq!(raw["canGenerate"], true);
    }
}
