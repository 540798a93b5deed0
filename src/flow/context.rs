//! Context carried by the flow machine, and the commands offered to it.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use super::balance::BalanceCase;
use super::step::Stage;

/// User intent selected on the welcome screen.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BudgetOption {
    PlayAround,
    Compute,
    Ambitious,
    Custom,
}

impl BudgetOption {
    /// Suggested GLM amount for this budget, if it has a fixed suggestion.
    pub fn suggested_glm(&self) -> Option<Decimal> {
        use rust_decimal_macros::dec;
        match self {
            Self::PlayAround => Some(dec!(10)),
            Self::Compute => Some(dec!(40)),
            Self::Ambitious => Some(dec!(100)),
            Self::Custom => None,
        }
    }
}

impl Default for BudgetOption {
    fn default() -> Self {
        Self::Compute
    }
}

impl std::fmt::Display for BudgetOption {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::PlayAround => "play_around",
            Self::Compute => "compute",
            Self::Ambitious => "ambitious",
            Self::Custom => "custom",
        };
        write!(f, "{s}")
    }
}

/// Token balances in the smallest unit (wei for 18-decimals tokens).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenBalance {
    pub glm: u128,
    pub native: u128,
}

/// Read-only snapshot of externally-owned wallet state.
///
/// The wallet collaborator is the source of truth; the machine only holds
/// the latest reported values and never writes them back.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlockchainSnapshot {
    /// Active chain, if any. Absent means the wallet is not connected.
    pub chain_id: Option<u64>,
    /// Browser wallet address, if known.
    pub address: Option<String>,
    pub balance: TokenBalance,
}

impl BlockchainSnapshot {
    /// Connected means a chain id has been reported.
    pub fn is_connected(&self) -> bool {
        self.chain_id.is_some()
    }

    /// Merge an update, keeping any field the update does not carry.
    pub fn merge(&mut self, update: ChainContextUpdate) {
        if let Some(chain_id) = update.chain_id {
            self.chain_id = Some(chain_id);
        }
        if let Some(address) = update.address {
            self.address = Some(address);
        }
        if let Some(balance) = update.balance {
            self.balance = balance;
        }
    }
}

/// Partial wallet-state update reported by the chain collaborator.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChainContextUpdate {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub chain_id: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub address: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub balance: Option<TokenBalance>,
}

/// Mutable data the machine carries across transitions.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FlowContext {
    /// Destination Yagna wallet for the final transfer, usually supplied
    /// via deep link. Empty until known.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub yagna_address: Option<String>,
    pub budget: BudgetOption,
    /// Cumulative amounts the user reported buying, recorded verbatim.
    pub bought_glm: Decimal,
    pub bought_native: Decimal,
    /// Whether the GLM token has been added to the user's wallet asset list.
    pub glm_tracked: bool,
    pub blockchain: BlockchainSnapshot,
    /// Derived from the current step on every transition; nothing else
    /// writes it.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stage: Option<Stage>,
}

impl Default for FlowContext {
    fn default() -> Self {
        Self {
            yagna_address: None,
            budget: BudgetOption::default(),
            bought_glm: Decimal::ZERO,
            bought_native: Decimal::ZERO,
            glm_tracked: false,
            blockchain: BlockchainSnapshot::default(),
            stage: None,
        }
    }
}

/// An external event offered to the machine.
///
/// Unmatched commands are silent no-ops — the UI dispatches optimistically
/// and must never be punished for a stale re-render.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "payload", rename_all = "snake_case")]
pub enum Command {
    /// Advance to the next step, subject to the current step's guards.
    Next,
    /// Overwrite the selected budget. Never changes step.
    SelectBudget(BudgetOption),
    /// Record the amount of GLM bought. Never changes step.
    BuyGlm(Decimal),
    /// Record the amount of the native token bought. Never changes step.
    BuyNative(Decimal),
    /// Merge a wallet-state update into the context. Never changes step.
    ChainContextChanged(ChainContextUpdate),
    /// Internal completion of an armed balance probe.
    BalancesChecked { case: BalanceCase, probe: u64 },
}
