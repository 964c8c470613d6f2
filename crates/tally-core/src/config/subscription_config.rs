//! Subscription engine configuration.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::warn;

/// Default payment-gateway base URL.
pub const DEFAULT_GATEWAY_URL: &str = "https://payments.tallyhq.dev";
/// Default persisted-store location, relative to the working directory.
pub const DEFAULT_STORE_PATH: &str = "subscriptions.json";
/// Default upgrade URL shown in denial prompts.
pub const DEFAULT_UPGRADE_URL: &str = "https://tallyhq.dev/pricing";
/// Default gateway request timeout in seconds.
pub const DEFAULT_VERIFY_TIMEOUT_SECS: u64 = 10;

const GATEWAY_URL_ENV: &str = "TALLY_GATEWAY_URL";
const STORE_PATH_ENV: &str = "TALLY_STORE_PATH";
const VERIFY_TIMEOUT_ENV: &str = "TALLY_VERIFY_TIMEOUT_SECS";
const TEST_MODE_ENV: &str = "TALLY_TEST_MODE";
const UPGRADE_URL_ENV: &str = "TALLY_UPGRADE_URL";

/// Configuration for the subscription engine.
/// All fields are optional; `effective_*` accessors apply defaults.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct SubscriptionConfig {
    /// Payment gateway base URL.
    pub gateway_url: Option<String>,
    /// Path to the persisted record store. Default: "subscriptions.json".
    pub store_path: Option<PathBuf>,
    /// Gateway request timeout in seconds. Default: 10.
    pub verify_timeout_secs: Option<u64>,
    /// Honor the test-payment bypass. Default: the `TALLY_TEST_MODE`
    /// environment variable. Request data can never set this.
    pub test_mode: Option<bool>,
    /// Upgrade URL shown in quota/subscription denial prompts.
    pub upgrade_url: Option<String>,
}

impl SubscriptionConfig {
    pub fn effective_gateway_url(&self) -> &str {
        self.gateway_url.as_deref().unwrap_or(DEFAULT_GATEWAY_URL)
    }

    pub fn effective_store_path(&self) -> PathBuf {
        self.store_path
            .clone()
            .unwrap_or_else(|| PathBuf::from(DEFAULT_STORE_PATH))
    }

    pub fn effective_verify_timeout(&self) -> Duration {
        Duration::from_secs(
            self.verify_timeout_secs
                .unwrap_or(DEFAULT_VERIFY_TIMEOUT_SECS),
        )
    }

    pub fn effective_test_mode(&self) -> bool {
        self.test_mode.unwrap_or_else(|| env_flag(TEST_MODE_ENV))
    }

    pub fn effective_upgrade_url(&self) -> &str {
        self.upgrade_url.as_deref().unwrap_or(DEFAULT_UPGRADE_URL)
    }

    /// Parse from TOML, the on-disk config format.
    pub fn from_toml_str(raw: &str) -> Result<Self, toml::de::Error> {
        toml::from_str(raw)
    }

    /// Load from a TOML file. A missing or unparsable file yields the
    /// defaults; a parse failure is logged.
    pub fn load(path: &Path) -> Self {
        match std::fs::read_to_string(path) {
            Ok(raw) => Self::from_toml_str(&raw).unwrap_or_else(|e| {
                warn!(path = %path.display(), error = %e, "config unreadable, using defaults");
                Self::default()
            }),
            Err(_) => Self::default(),
        }
    }

    /// Build from environment variables alone: `TALLY_GATEWAY_URL`,
    /// `TALLY_STORE_PATH`, `TALLY_VERIFY_TIMEOUT_SECS`,
    /// `TALLY_TEST_MODE`, `TALLY_UPGRADE_URL`.
    pub fn from_env() -> Self {
        Self {
            gateway_url: env_string(GATEWAY_URL_ENV),
            store_path: env_string(STORE_PATH_ENV).map(PathBuf::from),
            verify_timeout_secs: env_string(VERIFY_TIMEOUT_ENV).and_then(|v| v.parse().ok()),
            test_mode: env_string(TEST_MODE_ENV).map(|v| parse_flag(&v)),
            upgrade_url: env_string(UPGRADE_URL_ENV),
        }
    }
}

fn env_string(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|v| !v.trim().is_empty())
}

fn env_flag(key: &str) -> bool {
    env_string(key).map(|v| parse_flag(&v)).unwrap_or(false)
}

fn parse_flag(raw: &str) -> bool {
    let v = raw.trim().to_ascii_lowercase();
    v == "1" || v == "true" || v == "yes"
}
