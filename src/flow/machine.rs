//! The onboarding flow machine.
//!
//! Owns the current step and context, applies guarded transitions, and
//! recomputes the progress stage on every step change. Commands that match
//! nothing are silent no-ops: step components re-render optimistically and
//! may dispatch events that no longer apply.

use rust_decimal::Decimal;
use serde::Serialize;
use tracing::{debug, warn};

use super::balance::BalanceCase;
use super::context::{BudgetOption, Command, FlowContext};
use super::step::Step;

/// Initial values for a new machine.
///
/// Everything is optional; a blank seed starts a fresh wizard at `Welcome`.
#[derive(Debug, Clone, Default)]
pub struct FlowSeed {
    pub step: Option<Step>,
    pub yagna_address: Option<String>,
    pub budget: Option<BudgetOption>,
    pub bought_glm: Option<Decimal>,
    pub bought_native: Option<Decimal>,
    pub glm_tracked: bool,
}

/// Immutable view of the machine, safe to hand to any number of readers.
#[derive(Debug, Clone, Serialize)]
pub struct FlowSnapshot {
    pub step: Step,
    pub context: FlowContext,
}

/// What a dispatch did, for the host to act on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct DispatchEffect {
    /// The command changed step or context (false = no-op).
    pub changed: bool,
    /// The step changed; the host should persist and re-publish.
    pub step_changed: bool,
    /// Entering `CheckAccountBalances` armed a balance probe with this id;
    /// the host must resolve it with a `BalancesChecked` dispatch.
    pub armed_probe: Option<u64>,
}

/// The wizard state machine.
pub struct FlowMachine {
    step: Step,
    context: FlowContext,
    /// Probe id the machine is waiting on, while in `CheckAccountBalances`.
    armed_probe: Option<u64>,
    probe_counter: u64,
}

impl FlowMachine {
    /// Build a machine from a seed. The stage is derived from the initial
    /// step, never taken from the seed.
    pub fn new(seed: FlowSeed) -> Self {
        let step = seed.step.unwrap_or_default();
        let context = FlowContext {
            yagna_address: seed.yagna_address,
            budget: seed.budget.unwrap_or_default(),
            bought_glm: seed.bought_glm.unwrap_or_default(),
            bought_native: seed.bought_native.unwrap_or_default(),
            glm_tracked: seed.glm_tracked,
            stage: step.stage(),
            ..FlowContext::default()
        };
        let mut machine = Self {
            step,
            context,
            armed_probe: None,
            probe_counter: 0,
        };
        if step == Step::CheckAccountBalances {
            machine.arm_probe();
        }
        machine
    }

    pub fn step(&self) -> Step {
        self.step
    }

    pub fn context(&self) -> &FlowContext {
        &self.context
    }

    /// Probe id currently awaiting resolution, if any.
    pub fn armed_probe(&self) -> Option<u64> {
        self.armed_probe
    }

    pub fn snapshot(&self) -> FlowSnapshot {
        FlowSnapshot {
            step: self.step,
            context: self.context.clone(),
        }
    }

    /// Offer a command to the machine.
    ///
    /// Global commands mutate context at any step and never change step.
    /// Step-scoped commands fire only when the current step has a matching
    /// transition whose guard passes; anything else leaves the machine
    /// untouched.
    pub fn dispatch(&mut self, command: Command) -> DispatchEffect {
        match command {
            Command::SelectBudget(budget) => {
                self.context.budget = budget;
                DispatchEffect {
                    changed: true,
                    ..Default::default()
                }
            }
            Command::BuyGlm(amount) => {
                if amount.is_sign_negative() {
                    warn!(%amount, "negative GLM purchase amount recorded");
                }
                self.context.bought_glm = amount;
                DispatchEffect {
                    changed: true,
                    ..Default::default()
                }
            }
            Command::BuyNative(amount) => {
                if amount.is_sign_negative() {
                    warn!(%amount, "negative native purchase amount recorded");
                }
                self.context.bought_native = amount;
                DispatchEffect {
                    changed: true,
                    ..Default::default()
                }
            }
            Command::ChainContextChanged(update) => {
                self.context.blockchain.merge(update);
                DispatchEffect {
                    changed: true,
                    ..Default::default()
                }
            }
            Command::BalancesChecked { case, probe } => {
                // Only the currently armed probe may fire the transition; a
                // resolution that raced a teardown or re-entry is stale.
                if self.step != Step::CheckAccountBalances || self.armed_probe != Some(probe) {
                    debug!(probe, "stale balance probe dropped");
                    return DispatchEffect::default();
                }
                self.enter(balance_target(case, &self.context))
            }
            step_scoped => match transition_for(self.step, &step_scoped, &self.context) {
                Some(target) => self.enter(target),
                None => {
                    debug!(step = %self.step, command = ?step_scoped, "no matching transition");
                    DispatchEffect::default()
                }
            },
        }
    }

    /// Move to `target` and run its entry actions.
    fn enter(&mut self, target: Step) -> DispatchEffect {
        debug!(from = %self.step, to = %target, "transition");
        self.step = target;
        self.context.stage = target.stage();
        // Leaving the balance-check step invalidates any in-flight probe.
        self.armed_probe = None;
        let armed_probe = if target == Step::CheckAccountBalances {
            Some(self.arm_probe())
        } else {
            None
        };
        DispatchEffect {
            changed: true,
            step_changed: true,
            armed_probe,
        }
    }

    fn arm_probe(&mut self) -> u64 {
        self.probe_counter += 1;
        self.armed_probe = Some(self.probe_counter);
        self.probe_counter
    }

    /// Resolve an armed balance probe; sugar for dispatching the internal
    /// completion command.
    pub fn resolve_probe(&mut self, probe: u64, case: BalanceCase) -> DispatchEffect {
        self.dispatch(Command::BalancesChecked { case, probe })
    }
}

/// The step-scoped transition table.
///
/// Pure over `(step, command, context)` so every guard is testable in
/// isolation. Returns the target step, or `None` when nothing matches.
fn transition_for(step: Step, command: &Command, context: &FlowContext) -> Option<Step> {
    match (step, command) {
        (Step::Welcome, Command::Next) => {
            if context.blockchain.is_connected() {
                Some(Step::ChooseNetwork)
            } else {
                Some(Step::ConnectWallet)
            }
        }
        (Step::ConnectWallet, Command::Next) => Some(Step::ChooseNetwork),
        (Step::ChooseNetwork, Command::Next) => Some(Step::OnRamp),
        (Step::OnRamp, Command::Next) => Some(Step::Swap),
        (Step::GaslessSwap, Command::Next) => Some(Step::OnRamp),
        (Step::Swap, Command::Next) => Some(Step::Transfer),
        (Step::AddGlm, Command::Next) => Some(Step::Swap),
        (Step::Transfer, Command::Next) => Some(Step::Finish),
        // Finish is terminal; everything else has no step-scoped commands.
        _ => None,
    }
}

/// Where the balance probe sends the flow.
fn balance_target(case: BalanceCase, context: &FlowContext) -> Step {
    match case {
        BalanceCase::NoGlm if context.glm_tracked => Step::AddGlm,
        BalanceCase::NoGlm => Step::Swap,
        BalanceCase::NoGlmNoMatic => Step::OnRamp,
        BalanceCase::Both if context.yagna_address.is_some() => Step::Transfer,
        BalanceCase::Both => Step::Finish,
        BalanceCase::NoMatic => Step::GaslessSwap,
    }
}
