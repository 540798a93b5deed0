//! Wizard steps and the coarse progress stage derived from them.

use serde::{Deserialize, Serialize};

/// A single wizard screen.
///
/// Exactly one step is current at any time. `Finish` is terminal — no
/// command moves the flow out of it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Step {
    Welcome,
    ConnectWallet,
    ChooseNetwork,
    OnRamp,
    GaslessSwap,
    Swap,
    AddGlm,
    CheckAccountBalances,
    Transfer,
    Finish,
}

/// Coarse progress-bar bucket.
///
/// Used only for display; transition decisions never read it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    Wallet,
    Matic,
    Glm,
    Yagna,
    Finish,
}

impl Step {
    /// The progress stage shown while this step is current.
    ///
    /// Total over all steps; `Welcome` is the only step with no stage
    /// (the progress bar is hidden on the welcome screen).
    pub fn stage(&self) -> Option<Stage> {
        match self {
            Self::Welcome => None,
            Self::ConnectWallet => Some(Stage::Wallet),
            Self::ChooseNetwork => Some(Stage::Wallet),
            Self::CheckAccountBalances => Some(Stage::Wallet),
            Self::OnRamp => Some(Stage::Matic),
            Self::GaslessSwap => Some(Stage::Matic),
            Self::Swap => Some(Stage::Glm),
            Self::AddGlm => Some(Stage::Glm),
            Self::Transfer => Some(Stage::Yagna),
            Self::Finish => Some(Stage::Finish),
        }
    }

    /// Whether this step is terminal (the wizard is done).
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Finish)
    }
}

impl Default for Step {
    fn default() -> Self {
        Self::Welcome
    }
}

impl std::fmt::Display for Step {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Welcome => "welcome",
            Self::ConnectWallet => "connect_wallet",
            Self::ChooseNetwork => "choose_network",
            Self::OnRamp => "on_ramp",
            Self::GaslessSwap => "gasless_swap",
            Self::Swap => "swap",
            Self::AddGlm => "add_glm",
            Self::CheckAccountBalances => "check_account_balances",
            Self::Transfer => "transfer",
            Self::Finish => "finish",
        };
        write!(f, "{s}")
    }
}

impl std::fmt::Display for Stage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Wallet => "wallet",
            Self::Matic => "matic",
            Self::Glm => "glm",
            Self::Yagna => "yagna",
            Self::Finish => "finish",
        };
        write!(f, "{s}")
    }
}
