//! Plan-name → generation-quota table.
//!
//! Plan names arrive from the payment layer as labels; the engine only
//! interprets them to resolve a quota. Unrecognized names fall back to
//! a single generation.

use crate::records::UNLIMITED_GENERATIONS;

/// Quota granted to a plan name the table does not recognize.
pub const DEFAULT_PLAN_QUOTA: i64 = 1;

/// Known plan aliases and their generation quotas.
const PLAN_QUOTAS: [(&str, i64); 4] = [
    ("single", 1),
    ("triple", 3),
    ("pack", 10),
    ("unlimited", UNLIMITED_GENERATIONS),
];

/// Resolve the generation quota for a plan name.
/// Lookup is case-insensitive; unknown plans get [`DEFAULT_PLAN_QUOTA`].
pub fn quota_for_plan(plan_name: &str) -> i64 {
    let normalized = plan_name.trim().to_ascii_lowercase();
    PLAN_QUOTAS
        .iter()
        .find(|(name, _)| *name == normalized)
        .map(|(_, quota)| *quota)
        .unwrap_or(DEFAULT_PLAN_QUOTA)
}

/// All plan aliases the table recognizes.
pub fn known_plans() -> impl Iterator<Item = &'static str> {
    PLAN_QUOTAS.iter().map(|(name, _)| *name)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn known_aliases_resolve() {
        assert_eq!(quota_for_plan("single"), 1);
        assert_eq!(quota_for_plan("triple"), 3);
        assert_eq!(quota_for_plan("pack"), 10);
        assert_eq!(quota_for_plan("unlimited"), UNLIMITED_GENERATIONS);
    }

    #[test]
    fn lookup_is_case_insensitive() {
        assert_eq!(quota_for_plan("Triple"), 3);
        assert_eq!(quota_for_plan(" PACK "), 10);
    }

    #[test]
    fn unknown_plans_default_to_one() {
        assert_eq!(quota_for_plan("Standard"), DEFAULT_PLAN_QUOTA);
        assert_eq!(quota_for_plan(""), DEFAULT_PLAN_QUOTA);
    }

    #[test]
    fn alias_listing_is_complete() {
        let aliases: Vec<_> = known_plans().collect();
        assert_eq!(aliases, vec!["single", "triple", "pack", "unlimited"]);
    }
}
