//! HTTP surface for the onboarding frontend.
//!
//! REST for snapshot reads and command dispatch, WebSocket for pushed
//! snapshots. The frontend owns rendering; this layer only moves commands
//! in and snapshots out.

use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::State;
use axum::response::IntoResponse;
use axum::routing::{delete, get, post};
use axum::{Json, Router};
use serde::Serialize;
use tokio::sync::broadcast;
use tracing::{debug, info, warn};

use crate::chain::networks::{self, NetworkInfo};

use super::context::{BudgetOption, Command, FlowContext};
use super::machine::FlowSnapshot;
use super::manager::FlowManager;
use super::step::Step;

/// Shared state for the onboarding routes.
#[derive(Clone)]
pub struct OnboardingRouteState {
    pub manager: FlowManager,
}

/// Snapshot payload served to the frontend.
#[derive(Debug, Clone, Serialize)]
pub struct StatusPayload {
    pub step: Step,
    pub context: FlowContext,
    pub completed: bool,
    /// The active network, when the reported chain id is a supported one.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub network: Option<&'static NetworkInfo>,
    pub budgets: Vec<BudgetDescriptor>,
}

/// One selectable budget card.
#[derive(Debug, Clone, Serialize)]
pub struct BudgetDescriptor {
    pub option: BudgetOption,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub suggested_glm: Option<rust_decimal::Decimal>,
}

impl StatusPayload {
    fn from_snapshot(snapshot: FlowSnapshot) -> Self {
        let network = snapshot
            .context
            .blockchain
            .chain_id
            .and_then(networks::by_chain_id);
        let budgets = [
            BudgetOption::PlayAround,
            BudgetOption::Compute,
            BudgetOption::Ambitious,
            BudgetOption::Custom,
        ]
        .into_iter()
        .map(|option| BudgetDescriptor {
            option,
            suggested_glm: option.suggested_glm(),
        })
        .collect();
        Self {
            step: snapshot.step,
            completed: snapshot.step.is_terminal(),
            context: snapshot.context,
            network,
            budgets,
        }
    }
}

/// GET /api/onboarding/status
async fn get_status(State(state): State<OnboardingRouteState>) -> impl IntoResponse {
    let snapshot = state.manager.snapshot().await;
    Json(StatusPayload::from_snapshot(snapshot))
}

/// POST /api/onboarding/command
///
/// Dispatches a command and returns the resulting snapshot. A command with
/// no matching transition still returns 200 — the snapshot simply did not
/// change.
async fn post_command(
    State(state): State<OnboardingRouteState>,
    Json(command): Json<Command>,
) -> impl IntoResponse {
    let snapshot = state.manager.dispatch(command).await;
    Json(StatusPayload::from_snapshot(snapshot))
}

/// DELETE /api/onboarding/session
async fn delete_session(State(state): State<OnboardingRouteState>) -> impl IntoResponse {
    let snapshot = state.manager.reset().await;
    Json(StatusPayload::from_snapshot(snapshot))
}

/// GET /ws/onboarding
async fn ws_handler(
    ws: WebSocketUpgrade,
    State(state): State<OnboardingRouteState>,
) -> impl IntoResponse {
    info!("Onboarding WebSocket client connecting");
    ws.on_upgrade(|socket| handle_socket(socket, state))
}

async fn handle_socket(mut socket: WebSocket, state: OnboardingRouteState) {
    // Current snapshot on connect, updates afterwards.
    let snapshot = state.manager.snapshot().await;
    if send_snapshot(&mut socket, snapshot).await.is_err() {
        warn!("Failed to send initial snapshot, client disconnected");
        return;
    }

    let mut rx = state.manager.subscribe();
    loop {
        tokio::select! {
            result = rx.recv() => {
                match result {
                    Ok(snapshot) => {
                        if send_snapshot(&mut socket, snapshot).await.is_err() {
                            debug!("Onboarding WS client disconnected during send");
                            break;
                        }
                    }
                    Err(broadcast::error::RecvError::Lagged(n)) => {
                        warn!(missed = n, "Onboarding WS client lagged, re-syncing");
                        let snapshot = state.manager.snapshot().await;
                        if send_snapshot(&mut socket, snapshot).await.is_err() {
                            break;
                        }
                    }
                    Err(broadcast::error::RecvError::Closed) => {
                        debug!("Snapshot broadcast closed");
                        break;
                    }
                }
            }
            incoming = socket.recv() => {
                match incoming {
                    Some(Ok(Message::Close(_))) | None => {
                        debug!("Onboarding WS client closed");
                        break;
                    }
                    Some(Ok(_)) => {} // commands go through REST, ignore
                    Some(Err(e)) => {
                        debug!(error = %e, "Onboarding WS receive error");
                        break;
                    }
                }
            }
        }
    }
}

async fn send_snapshot(socket: &mut WebSocket, snapshot: FlowSnapshot) -> Result<(), ()> {
    let payload = StatusPayload::from_snapshot(snapshot);
    let json = serde_json::to_string(&payload).map_err(|_| ())?;
    socket
        .send(Message::Text(json.into()))
        .await
        .map_err(|_| ())
}

/// Build the onboarding Router.
pub fn onboarding_routes(state: OnboardingRouteState) -> Router {
    Router::new()
        .route("/api/onboarding/status", get(get_status))
        .route("/api/onboarding/command", post(post_command))
        .route("/api/onboarding/session", delete(delete_session))
        .route("/ws/onboarding", get(ws_handler))
        .with_state(state)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::flow::context::{BlockchainSnapshot, TokenBalance};

    #[test]
    fn status_payload_resolves_network() {
        let snapshot = FlowSnapshot {
            step: Step::ChooseNetwork,
            context: FlowContext {
                blockchain: BlockchainSnapshot {
                    chain_id: Some(137),
                    address: None,
                    balance: TokenBalance::default(),
                },
                ..FlowContext::default()
            },
        };
        let payload = StatusPayload::from_snapshot(snapshot);
        assert_eq!(payload.network.unwrap().name, "Polygon");
        assert!(!payload.completed);
        assert_eq!(payload.budgets.len(), 4);
    }

    #[test]
    fn status_payload_on_unknown_chain() {
        let snapshot = FlowSnapshot {
            step: Step::Finish,
            context: FlowContext {
                blockchain: BlockchainSnapshot {
                    chain_id: Some(1), // mainnet is not an onboarding target
                    ..Default::default()
                },
                ..FlowContext::default()
            },
        };
        let payload = StatusPayload::from_snapshot(snapshot);
        assert!(payload.network.is_none());
        assert!(payload.completed);
    }
}
