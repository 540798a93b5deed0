//! Wallet balance classification.

use serde::{Deserialize, Serialize};

use super::context::TokenBalance;

/// Which tokens the wallet is missing, relative to the configured minimums.
///
/// "Matic" stands in for whatever the native gas token of the active chain
/// is; on Polygon it literally is MATIC.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BalanceCase {
    NoGlm,
    NoMatic,
    NoGlmNoMatic,
    Both,
}

/// Minimum usable amounts, in the smallest token unit.
///
/// Supplied by configuration so policy changes never touch the classifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BalanceThresholds {
    pub glm_min: u128,
    pub native_min: u128,
}

impl Default for BalanceThresholds {
    fn default() -> Self {
        // 1 GLM / 0.01 MATIC, both 18-decimals tokens
        Self {
            glm_min: 1_000_000_000_000_000_000,
            native_min: 10_000_000_000_000_000,
        }
    }
}

/// Classify a wallet's balances against the thresholds.
///
/// First match wins; the four cases are mutually exclusive by construction.
pub fn classify(balance: &TokenBalance, thresholds: &BalanceThresholds) -> BalanceCase {
    let glm_low = balance.glm < thresholds.glm_min;
    let native_low = balance.native < thresholds.native_min;
    match (glm_low, native_low) {
        (true, true) => BalanceCase::NoGlmNoMatic,
        (true, false) => BalanceCase::NoGlm,
        (false, true) => BalanceCase::NoMatic,
        (false, false) => BalanceCase::Both,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn thresholds(glm: u128, native: u128) -> BalanceThresholds {
        BalanceThresholds {
            glm_min: glm,
            native_min: native,
        }
    }

    #[test]
    fn empty_wallet_misses_both() {
        let balance = TokenBalance { glm: 0, native: 0 };
        assert_eq!(
            classify(&balance, &thresholds(1, 1)),
            BalanceCase::NoGlmNoMatic
        );
    }

    #[test]
    fn zero_thresholds_always_pass() {
        let balance = TokenBalance { glm: 100, native: 100 };
        assert_eq!(classify(&balance, &thresholds(0, 0)), BalanceCase::Both);
    }

    #[test]
    fn glm_below_native_above() {
        let balance = TokenBalance { glm: 5, native: 500 };
        assert_eq!(classify(&balance, &thresholds(10, 10)), BalanceCase::NoGlm);
    }

    #[test]
    fn native_below_glm_above() {
        let balance = TokenBalance { glm: 500, native: 5 };
        assert_eq!(classify(&balance, &thresholds(10, 10)), BalanceCase::NoMatic);
    }

    #[test]
    fn threshold_is_exclusive() {
        // Exactly at the minimum counts as sufficient
        let balance = TokenBalance { glm: 10, native: 10 };
        assert_eq!(classify(&balance, &thresholds(10, 10)), BalanceCase::Both);
    }

    #[test]
    fn classification_is_deterministic() {
        let balance = TokenBalance { glm: 3, native: 42 };
        let t = thresholds(7, 7);
        assert_eq!(classify(&balance, &t), classify(&balance, &t));
    }

    #[test]
    fn default_thresholds_are_nonzero() {
        let t = BalanceThresholds::default();
        assert!(t.glm_min > 0);
        assert!(t.native_min > 0);
    }
}
