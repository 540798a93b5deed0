//! Wallet/network collaborator.
//!
//! The flow machine never talks to a chain. This module is the read-only
//! collaborator that does: it fetches wallet state (chain id, address,
//! balances) and reports it into the session as `ChainContextChanged`
//! commands. The machine keeps a snapshot; the chain stays the source of
//! truth.

pub mod networks;
pub mod rpc;
pub mod watcher;

use async_trait::async_trait;

use crate::error::ChainError;
use crate::flow::ChainContextUpdate;

pub use rpc::JsonRpcChain;
pub use watcher::ChainWatcher;

/// Source of wallet-state updates.
#[async_trait]
pub trait ChainProvider: Send + Sync {
    /// Fetch the current wallet state. Fields the provider cannot determine
    /// (e.g. balances with no known address) stay `None` so the merge keeps
    /// previous values.
    async fn fetch(&self) -> Result<ChainContextUpdate, ChainError>;
}
