//! Onboarding flow — the wizard state machine and its session host.
//!
//! The wizard walks a user from "no wallet" to "funded Yagna wallet":
//! connect a browser wallet, pick a network, buy the gas token, swap for
//! GLM, transfer to the Yagna wallet. [`machine::FlowMachine`] owns the
//! step/context state and the guarded transitions; [`manager::FlowManager`]
//! hosts one machine per session, persisting progress so a reload resumes
//! mid-flow.

pub mod balance;
pub mod context;
pub mod machine;
pub mod manager;
pub mod routes;
pub mod step;

pub use balance::{BalanceCase, BalanceThresholds, classify};
pub use context::{
    BlockchainSnapshot, BudgetOption, ChainContextUpdate, Command, FlowContext, TokenBalance,
};
pub use machine::{DispatchEffect, FlowMachine, FlowSeed, FlowSnapshot};
pub use manager::{FlowManager, SessionRecord, WeakFlowManager};
pub use routes::{OnboardingRouteState, onboarding_routes};
pub use step::{Stage, Step};
