use std::fmt::Display;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

use tower::ServiceBuilder;
use tower_http::cors::CorsLayer;

use yagna_onboard::chain::{ChainWatcher, JsonRpcChain};
use yagna_onboard::config::OnboardingConfig;
use yagna_onboard::error::ConfigError;
use yagna_onboard::flow::{FlowManager, OnboardingRouteState, onboarding_routes};
use yagna_onboard::store::{Database, LibSqlBackend};

/// Read and parse an optional environment variable; a present-but-invalid
/// value is a hard configuration error, not a silent default.
fn parse_env<T: FromStr>(key: &str) -> Result<Option<T>, ConfigError>
where
    T::Err: Display,
{
    match std::env::var(key) {
        Ok(raw) => raw.parse().map(Some).map_err(|e: T::Err| {
            ConfigError::InvalidValue {
                key: key.to_string(),
                message: e.to_string(),
            }
        }),
        Err(_) => Ok(None),
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_target(false)
        .init();

    let db_path = std::env::var("YAGNA_ONBOARD_DB_PATH")
        .unwrap_or_else(|_| "./data/yagna-onboard.db".to_string());
    let port: u16 = parse_env("YAGNA_ONBOARD_PORT")?.unwrap_or(8080);
    let rpc_url = std::env::var("YAGNA_ONBOARD_RPC_URL").ok();
    let wallet_address = std::env::var("YAGNA_ONBOARD_WALLET_ADDRESS").ok();

    let mut config = OnboardingConfig {
        yagna_address: std::env::var("YAGNA_ONBOARD_YAGNA_ADDRESS").ok(),
        ..Default::default()
    };
    if let Some(secs) = parse_env::<u64>("YAGNA_ONBOARD_POLL_SECS")? {
        config.poll_interval = Duration::from_secs(secs);
    }
    if let Some(min) = parse_env("YAGNA_ONBOARD_GLM_MIN_WEI")? {
        config.thresholds.glm_min = min;
    }
    if let Some(min) = parse_env("YAGNA_ONBOARD_NATIVE_MIN_WEI")? {
        config.thresholds.native_min = min;
    }

    eprintln!("🧙 Yagna Onboard v{}", env!("CARGO_PKG_VERSION"));
    eprintln!("   Status API: http://0.0.0.0:{}/api/onboarding/status", port);
    eprintln!("   Command API: http://0.0.0.0:{}/api/onboarding/command", port);
    eprintln!("   Snapshot WS: ws://0.0.0.0:{}/ws/onboarding", port);
    match &rpc_url {
        Some(url) => eprintln!("   Chain RPC: {url}"),
        None => eprintln!("   Chain RPC: disabled (wallet state via command API only)"),
    }

    let db: Arc<dyn Database> = Arc::new(
        LibSqlBackend::new_local(std::path::Path::new(&db_path))
            .await
            .map_err(|e| anyhow::anyhow!("failed to open database at {db_path}: {e}"))?,
    );

    let poll_interval = config.poll_interval;
    let manager = FlowManager::restore(db, config).await?;

    // Wallet-state poller, when an RPC endpoint is configured. Without one
    // the frontend reports chain context through the command API itself.
    let _watcher = rpc_url.map(|url| {
        let provider = Arc::new(JsonRpcChain::new(url, wallet_address));
        ChainWatcher::spawn(provider, manager.downgrade(), poll_interval)
    });

    let app = onboarding_routes(OnboardingRouteState { manager })
        .layer(ServiceBuilder::new().layer(CorsLayer::permissive()));

    let listener = tokio::net::TcpListener::bind(("0.0.0.0", port)).await?;
    tracing::info!(port, "onboarding service listening");
    axum::serve(listener, app).await?;

    Ok(())
}
