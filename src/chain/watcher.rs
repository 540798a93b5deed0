//! Polling loop that feeds wallet state into the session.

use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;
use tracing::{debug, warn};

use crate::flow::manager::WeakFlowManager;
use crate::flow::Command;

use super::ChainProvider;

/// Periodically fetches wallet state and dispatches `ChainContextChanged`.
///
/// Holds only a weak session handle, so the loop winds down on its own once
/// the session is gone.
pub struct ChainWatcher {
    handle: JoinHandle<()>,
}

impl ChainWatcher {
    pub fn spawn(
        provider: Arc<dyn ChainProvider>,
        manager: WeakFlowManager,
        interval: Duration,
    ) -> Self {
        let handle = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            loop {
                ticker.tick().await;
                let Some(manager) = manager.upgrade() else {
                    debug!("session gone, chain watcher stopping");
                    break;
                };
                match provider.fetch().await {
                    Ok(update) => {
                        manager.dispatch(Command::ChainContextChanged(update)).await;
                    }
                    Err(e) => {
                        // Transient RPC trouble reads as "no change"; the
                        // wizard simply does not advance its wallet state.
                        warn!(error = %e, "chain fetch failed");
                    }
                }
            }
        });
        Self { handle }
    }

    /// Stop the loop immediately instead of waiting for teardown.
    pub fn abort(&self) {
        self.handle.abort();
    }

    /// Whether the loop has wound down.
    pub fn is_finished(&self) -> bool {
        self.handle.is_finished()
    }
}

impl Drop for ChainWatcher {
    fn drop(&mut self) {
        self.handle.abort();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::OnboardingConfig;
    use crate::error::ChainError;
    use crate::flow::{ChainContextUpdate, FlowManager, FlowSeed, TokenBalance};
    use crate::store::{Database, LibSqlBackend};
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicU64, Ordering};
    use tokio::time::timeout;

    struct StubChain {
        calls: AtomicU64,
    }

    #[async_trait]
    impl ChainProvider for StubChain {
        async fn fetch(&self) -> Result<ChainContextUpdate, ChainError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(ChainContextUpdate {
                chain_id: Some(137),
                address: Some("0x00d4e2e7a02313c1466ad57b0b9dd44b9a73bd47".to_string()),
                balance: Some(TokenBalance { glm: 42, native: 7 }),
            })
        }
    }

    struct FailingChain;

    #[async_trait]
    impl ChainProvider for FailingChain {
        async fn fetch(&self) -> Result<ChainContextUpdate, ChainError> {
            Err(ChainError::Request("connection refused".to_string()))
        }
    }

    async fn manager() -> FlowManager {
        let db: Arc<dyn Database> = Arc::new(LibSqlBackend::new_memory().await.unwrap());
        FlowManager::start(db, OnboardingConfig::default(), FlowSeed::default())
    }

    #[tokio::test]
    async fn watcher_reports_wallet_state() {
        let manager = manager().await;
        let mut rx = manager.subscribe();
        let _watcher = ChainWatcher::spawn(
            Arc::new(StubChain {
                calls: AtomicU64::new(0),
            }),
            manager.downgrade(),
            Duration::from_millis(10),
        );

        let snapshot = timeout(Duration::from_secs(2), rx.recv())
            .await
            .expect("no update arrived")
            .unwrap();
        assert_eq!(snapshot.context.blockchain.chain_id, Some(137));
        assert_eq!(snapshot.context.blockchain.balance.glm, 42);
        assert!(snapshot.context.blockchain.is_connected());
    }

    #[tokio::test]
    async fn watcher_stops_when_session_drops() {
        let manager = manager().await;
        let weak = manager.downgrade();
        let watcher = ChainWatcher::spawn(
            Arc::new(StubChain {
                calls: AtomicU64::new(0),
            }),
            weak,
            Duration::from_millis(5),
        );
        drop(manager);
        timeout(Duration::from_secs(2), async {
            while !watcher.is_finished() {
                tokio::time::sleep(Duration::from_millis(5)).await;
            }
        })
        .await
        .expect("watcher should stop after session teardown");
    }

    #[tokio::test]
    async fn fetch_failures_leave_state_untouched() {
        let manager = manager().await;
        let _watcher = ChainWatcher::spawn(
            Arc::new(FailingChain),
            manager.downgrade(),
            Duration::from_millis(5),
        );
        tokio::time::sleep(Duration::from_millis(50)).await;
        let snapshot = manager.snapshot().await;
        assert!(!snapshot.context.blockchain.is_connected());
    }
}
