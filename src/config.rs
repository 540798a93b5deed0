//! Configuration types.

use std::time::Duration;

use crate::flow::balance::BalanceThresholds;

/// Onboarding service configuration.
#[derive(Debug, Clone)]
pub struct OnboardingConfig {
    /// Settings-table user id (single-session service).
    pub user_id: String,
    /// Settings key under which the session record is persisted.
    pub session_key: String,
    /// Minimum balances the balance probe checks against.
    pub thresholds: BalanceThresholds,
    /// How often the chain watcher polls the wallet state.
    pub poll_interval: Duration,
    /// Yagna wallet address supplied externally (deep link / operator env).
    pub yagna_address: Option<String>,
}

impl Default for OnboardingConfig {
    fn default() -> Self {
        Self {
            user_id: "default".to_string(),
            session_key: "onboarding_session".to_string(),
            thresholds: BalanceThresholds::default(),
            poll_interval: Duration::from_secs(10),
            yagna_address: None,
        }
    }
}
