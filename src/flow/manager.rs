//! FlowManager — hosts the machine for one onboarding session.
//!
//! Serializes dispatches through a lock, persists the session record on
//! every step change, resolves armed balance probes on a background task,
//! and broadcasts fresh snapshots to WebSocket subscribers. All mutation
//! flows through [`FlowManager::dispatch`]; readers only ever see
//! snapshots.

use std::sync::{Arc, Weak};

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Deserializer, Serialize};
use tokio::sync::{RwLock, broadcast};
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::config::OnboardingConfig;
use crate::error::Result;
use crate::store::Database;

use super::balance::classify;
use super::context::{BudgetOption, Command};
use super::machine::{DispatchEffect, FlowMachine, FlowSeed, FlowSnapshot};
use super::step::Step;

/// Session record persisted in the settings table.
///
/// A reload resumes the wizard from this. The blockchain snapshot is
/// deliberately absent: the wallet collaborator owns that state and
/// re-reports it after every reload.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionRecord {
    #[serde(deserialize_with = "step_or_welcome")]
    pub step: Step,
    pub glm_tracked: bool,
    pub budget: BudgetOption,
    pub bought_glm: Decimal,
    pub bought_native: Decimal,
    pub updated_at: DateTime<Utc>,
}

/// A step value written by a newer (or older) build must not brick the
/// session; anything unrecognized restarts the wizard at `Welcome`.
fn step_or_welcome<'de, D>(deserializer: D) -> std::result::Result<Step, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = serde_json::Value::deserialize(deserializer)?;
    match serde_json::from_value::<Step>(raw.clone()) {
        Ok(step) => Ok(step),
        Err(_) => {
            warn!(?raw, "unrecognized persisted step, falling back to welcome");
            Ok(Step::Welcome)
        }
    }
}

struct ManagerInner {
    machine: RwLock<FlowMachine>,
    db: Arc<dyn Database>,
    config: OnboardingConfig,
    tx: broadcast::Sender<FlowSnapshot>,
    session_id: Uuid,
}

/// Handle to a running onboarding session.
///
/// Cheap to clone; the session is torn down when the last clone drops.
#[derive(Clone)]
pub struct FlowManager {
    inner: Arc<ManagerInner>,
}

impl FlowManager {
    /// Restore a session from the settings store (or start fresh) and
    /// return a running manager.
    pub async fn restore(db: Arc<dyn Database>, config: OnboardingConfig) -> Result<Self> {
        let mut seed = FlowSeed {
            yagna_address: config.yagna_address.clone(),
            ..Default::default()
        };

        match db.get_setting(&config.user_id, &config.session_key).await? {
            Some(value) => match serde_json::from_value::<SessionRecord>(value) {
                Ok(record) => {
                    debug!(step = %record.step, "restoring persisted session");
                    seed.step = Some(record.step);
                    seed.glm_tracked = record.glm_tracked;
                    seed.budget = Some(record.budget);
                    seed.bought_glm = Some(record.bought_glm);
                    seed.bought_native = Some(record.bought_native);
                }
                Err(e) => {
                    warn!(error = %e, "corrupt session record, starting over");
                }
            },
            None => debug!("no persisted session, starting at welcome"),
        }

        Ok(Self::start(db, config, seed))
    }

    /// Start a session from an explicit seed, skipping the store read.
    pub fn start(db: Arc<dyn Database>, config: OnboardingConfig, seed: FlowSeed) -> Self {
        let machine = FlowMachine::new(seed);
        let armed = machine.armed_probe();
        let (tx, _) = broadcast::channel(64);
        let session_id = Uuid::new_v4();
        info!(%session_id, step = %machine.step(), "onboarding session started");

        let manager = Self {
            inner: Arc::new(ManagerInner {
                machine: RwLock::new(machine),
                db,
                config,
                tx,
                session_id,
            }),
        };
        // A session resumed mid-balance-check re-arms its probe.
        if let Some(probe) = armed {
            manager.spawn_probe(probe);
        }
        manager
    }

    /// Downgrade to a weak handle that does not keep the session alive.
    pub fn downgrade(&self) -> WeakFlowManager {
        WeakFlowManager {
            inner: Arc::downgrade(&self.inner),
        }
    }

    /// Current immutable view of the machine.
    pub async fn snapshot(&self) -> FlowSnapshot {
        self.inner.machine.read().await.snapshot()
    }

    /// Subscribe to snapshot broadcasts (one per state change).
    pub fn subscribe(&self) -> broadcast::Receiver<FlowSnapshot> {
        self.inner.tx.subscribe()
    }

    /// Offer a command to the machine and publish/persist the outcome.
    pub async fn dispatch(&self, command: Command) -> FlowSnapshot {
        let (effect, snapshot) = {
            let mut machine = self.inner.machine.write().await;
            let effect = machine.dispatch(command);
            (effect, machine.snapshot())
        };
        self.settle(effect, &snapshot).await;
        snapshot
    }

    /// Drop the persisted record and restart the wizard at `Welcome`.
    pub async fn reset(&self) -> FlowSnapshot {
        let inner = &self.inner;
        if let Err(e) = inner
            .db
            .delete_setting(&inner.config.user_id, &inner.config.session_key)
            .await
        {
            warn!(session_id = %inner.session_id, error = %e, "failed to clear session record");
        }
        let snapshot = {
            let mut machine = inner.machine.write().await;
            *machine = FlowMachine::new(FlowSeed {
                yagna_address: inner.config.yagna_address.clone(),
                ..Default::default()
            });
            machine.snapshot()
        };
        info!(session_id = %inner.session_id, "onboarding session reset");
        let _ = inner.tx.send(snapshot.clone());
        snapshot
    }

    /// Run post-dispatch effects: persistence, broadcast, probe spawn.
    async fn settle(&self, effect: DispatchEffect, snapshot: &FlowSnapshot) {
        if !effect.changed {
            return;
        }
        if effect.step_changed {
            self.persist(snapshot).await;
        }
        let _ = self.inner.tx.send(snapshot.clone());
        if let Some(probe) = effect.armed_probe {
            self.spawn_probe(probe);
        }
    }

    async fn persist(&self, snapshot: &FlowSnapshot) {
        let inner = &self.inner;
        let record = SessionRecord {
            step: snapshot.step,
            glm_tracked: snapshot.context.glm_tracked,
            budget: snapshot.context.budget,
            bought_glm: snapshot.context.bought_glm,
            bought_native: snapshot.context.bought_native,
            updated_at: Utc::now(),
        };
        let value = match serde_json::to_value(&record) {
            Ok(v) => v,
            Err(e) => {
                warn!(session_id = %inner.session_id, error = %e, "failed to serialize session record");
                return;
            }
        };
        if let Err(e) = inner
            .db
            .set_setting(&inner.config.user_id, &inner.config.session_key, &value)
            .await
        {
            warn!(session_id = %inner.session_id, error = %e, "failed to persist session record");
        }
    }

    /// Resolve an armed balance probe on a background task.
    ///
    /// The task holds only a weak handle: if the session is torn down before
    /// the probe resolves, the resolution is a no-op.
    fn spawn_probe(&self, probe: u64) {
        let weak: Weak<ManagerInner> = Arc::downgrade(&self.inner);
        tokio::spawn(async move {
            let Some(inner) = weak.upgrade() else {
                debug!(probe, "session gone before balance probe resolved");
                return;
            };
            let manager = FlowManager { inner };
            let case = {
                let machine = manager.inner.machine.read().await;
                classify(
                    &machine.context().blockchain.balance,
                    &manager.inner.config.thresholds,
                )
            };
            debug!(session_id = %manager.inner.session_id, probe, ?case, "balance probe resolved");
            let (effect, snapshot) = {
                let mut machine = manager.inner.machine.write().await;
                let effect = machine.resolve_probe(probe, case);
                (effect, machine.snapshot())
            };
            manager.settle(effect, &snapshot).await;
        });
    }
}

/// Weak counterpart of [`FlowManager`], for background collaborators that
/// must not outlive the session.
#[derive(Clone)]
pub struct WeakFlowManager {
    inner: Weak<ManagerInner>,
}

impl WeakFlowManager {
    pub fn upgrade(&self) -> Option<FlowManager> {
        self.inner.upgrade().map(|inner| FlowManager { inner })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::flow::context::{ChainContextUpdate, TokenBalance};
    use crate::flow::step::Stage;
    use crate::store::LibSqlBackend;
    use rust_decimal_macros::dec;
    use serde_json::json;
    use std::time::Duration;
    use tokio::time::timeout;

    async fn memory_db() -> Arc<dyn Database> {
        Arc::new(LibSqlBackend::new_memory().await.unwrap())
    }

    /// Wait until the session reaches `step` or the timeout hits.
    async fn wait_for_step(manager: &FlowManager, step: Step) {
        let mut rx = manager.subscribe();
        if manager.snapshot().await.step == step {
            return;
        }
        timeout(Duration::from_secs(2), async {
            loop {
                let snapshot = rx.recv().await.expect("broadcast closed");
                if snapshot.step == step {
                    break;
                }
            }
        })
        .await
        .unwrap_or_else(|_| panic!("never reached step {step}"));
    }

    #[tokio::test]
    async fn fresh_session_starts_at_welcome() {
        let manager = FlowManager::restore(memory_db().await, OnboardingConfig::default())
            .await
            .unwrap();
        let snapshot = manager.snapshot().await;
        assert_eq!(snapshot.step, Step::Welcome);
        assert_eq!(snapshot.context.stage, None);
    }

    #[tokio::test]
    async fn step_change_is_persisted_and_resumed() {
        let db = memory_db().await;
        let config = OnboardingConfig::default();

        let manager = FlowManager::restore(db.clone(), config.clone())
            .await
            .unwrap();
        manager
            .dispatch(Command::ChainContextChanged(ChainContextUpdate {
                chain_id: Some(137),
                ..Default::default()
            }))
            .await;
        manager.dispatch(Command::Next).await; // ChooseNetwork
        manager.dispatch(Command::Next).await; // OnRamp
        manager.dispatch(Command::Next).await; // Swap
        manager.dispatch(Command::SelectBudget(BudgetOption::Ambitious)).await;
        drop(manager);

        let resumed = FlowManager::restore(db, config).await.unwrap();
        let snapshot = resumed.snapshot().await;
        assert_eq!(snapshot.step, Step::Swap);
        assert_eq!(snapshot.context.stage, Some(Stage::Glm));
        // Budget changed after the last step change, so the persisted copy
        // is the one from the swap transition.
        assert_eq!(snapshot.context.budget, BudgetOption::Compute);
    }

    #[tokio::test]
    async fn context_only_commands_do_not_persist() {
        let db = memory_db().await;
        let config = OnboardingConfig::default();
        let manager = FlowManager::restore(db.clone(), config.clone())
            .await
            .unwrap();
        manager.dispatch(Command::BuyGlm(dec!(7))).await;
        drop(manager);

        let record = db
            .get_setting(&config.user_id, &config.session_key)
            .await
            .unwrap();
        assert!(record.is_none(), "no step change, nothing persisted");
    }

    #[tokio::test]
    async fn unrecognized_persisted_step_falls_back_to_welcome() {
        let db = memory_db().await;
        let config = OnboardingConfig::default();
        db.set_setting(
            &config.user_id,
            &config.session_key,
            &json!({
                "step": "teleport",
                "glm_tracked": true,
                "budget": "ambitious",
                "bought_glm": "1",
                "bought_native": "0",
                "updated_at": "2024-01-01T00:00:00Z"
            }),
        )
        .await
        .unwrap();

        let manager = FlowManager::restore(db, config).await.unwrap();
        let snapshot = manager.snapshot().await;
        assert_eq!(snapshot.step, Step::Welcome);
        // The rest of the record survives the fallback
        assert_eq!(snapshot.context.budget, BudgetOption::Ambitious);
        assert!(snapshot.context.glm_tracked);
    }

    #[tokio::test]
    async fn corrupt_record_starts_over() {
        let db = memory_db().await;
        let config = OnboardingConfig::default();
        db.set_setting(&config.user_id, &config.session_key, &json!("not a record"))
            .await
            .unwrap();
        let manager = FlowManager::restore(db, config).await.unwrap();
        assert_eq!(manager.snapshot().await.step, Step::Welcome);
    }

    #[tokio::test]
    async fn yagna_address_comes_from_config() {
        let config = OnboardingConfig {
            yagna_address: Some("0x00d4e2e7a02313c1466ad57b0b9dd44b9a73bd47".to_string()),
            ..Default::default()
        };
        let manager = FlowManager::restore(memory_db().await, config).await.unwrap();
        assert_eq!(
            manager.snapshot().await.context.yagna_address.as_deref(),
            Some("0x00d4e2e7a02313c1466ad57b0b9dd44b9a73bd47")
        );
    }

    #[tokio::test]
    async fn resumed_balance_check_probes_and_routes() {
        let db = memory_db().await;
        let config = OnboardingConfig::default();
        db.set_setting(
            &config.user_id,
            &config.session_key,
            &json!({
                "step": "check_account_balances",
                "glm_tracked": false,
                "budget": "compute",
                "bought_glm": "0",
                "bought_native": "0",
                "updated_at": "2024-01-01T00:00:00Z"
            }),
        )
        .await
        .unwrap();

        let manager = FlowManager::restore(db, config).await.unwrap();
        // No wallet state reported yet, so the probe sees empty balances.
        wait_for_step(&manager, Step::OnRamp).await;
        let snapshot = manager.snapshot().await;
        assert_eq!(snapshot.context.stage, Some(Stage::Matic));
    }

    #[tokio::test]
    async fn wallet_state_flows_into_dispatch_guards() {
        let config = OnboardingConfig::default();
        let thresholds = config.thresholds;
        let manager = FlowManager::start(
            memory_db().await,
            config,
            FlowSeed {
                step: Some(Step::Swap),
                ..Default::default()
            },
        );
        manager
            .dispatch(Command::ChainContextChanged(ChainContextUpdate {
                chain_id: Some(137),
                balance: Some(TokenBalance {
                    glm: thresholds.glm_min,
                    native: thresholds.native_min,
                }),
                ..Default::default()
            }))
            .await;
        let snapshot = manager.dispatch(Command::Next).await;
        assert_eq!(snapshot.step, Step::Transfer);
        assert_eq!(snapshot.context.stage, Some(Stage::Yagna));
        assert_eq!(snapshot.context.blockchain.balance.glm, thresholds.glm_min);
    }

    #[tokio::test]
    async fn reset_clears_record_and_restarts() {
        let db = memory_db().await;
        let config = OnboardingConfig::default();
        let manager = FlowManager::restore(db.clone(), config.clone())
            .await
            .unwrap();
        manager.dispatch(Command::Next).await; // ConnectWallet, persisted
        assert!(db
            .get_setting(&config.user_id, &config.session_key)
            .await
            .unwrap()
            .is_some());

        let snapshot = manager.reset().await;
        assert_eq!(snapshot.step, Step::Welcome);
        assert!(db
            .get_setting(&config.user_id, &config.session_key)
            .await
            .unwrap()
            .is_none());
    }

    #[tokio::test]
    async fn broadcast_carries_every_change() {
        let manager = FlowManager::restore(memory_db().await, OnboardingConfig::default())
            .await
            .unwrap();
        let mut rx = manager.subscribe();
        manager.dispatch(Command::SelectBudget(BudgetOption::Custom)).await;
        manager.dispatch(Command::Next).await;

        let first = rx.recv().await.unwrap();
        assert_eq!(first.context.budget, BudgetOption::Custom);
        let second = rx.recv().await.unwrap();
        assert_eq!(second.step, Step::ConnectWallet);
    }

    #[tokio::test]
    async fn noop_commands_do_not_broadcast() {
        let manager = FlowManager::start(
            memory_db().await,
            OnboardingConfig::default(),
            FlowSeed {
                step: Some(Step::Finish),
                ..Default::default()
            },
        );
        let mut rx = manager.subscribe();
        manager.dispatch(Command::Next).await; // terminal, no-op
        assert!(rx.try_recv().is_err());
    }
}
