use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use api_rest::{AppState, router};
use caremanager_core::{CareManagerService, CoreConfig, InMemoryStore};
use caremanager_peers::PeerConfig;

/// Main entry point for the care manager
///
/// Serves the REST API on port 3000 (configurable via `CAREMANAGER_REST_ADDR`).
///
/// # Environment Variables
/// - `CAREMANAGER_REST_ADDR`: REST server address (default: "0.0.0.0:3000")
/// - `BOOKING_PEER_URL`, `ROUTING_PEER_URL`: peer base URLs (required)
/// - `PEER_TIMEOUT_SECS`: per-request peer timeout (default: 30)
/// - `PEER_AUTH_TOKEN`: bearer token sent to both peers (optional)
/// - `API_KEY`: key callers must present in `x-api-key` (required)
/// - `ADVANCED_CARE_SERVICE_LINE_ID`: booking-peer id of the advanced care line (default: 9)
#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("caremanager=info".parse()?)
                .add_directive("api_rest=info".parse()?),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let rest_addr =
        std::env::var("CAREMANAGER_REST_ADDR").unwrap_or_else(|_| "0.0.0.0:3000".into());
    let api_key = std::env::var("API_KEY")
        .map_err(|_| anyhow::anyhow!("API_KEY must be set"))?;

    let core_config =
        CoreConfig::from_overrides(std::env::var("ADVANCED_CARE_SERVICE_LINE_ID").ok())?;
    let peer_config = PeerConfig::from_env()?;
    let (booking, routing) = caremanager_peers::connect(&peer_config)?;

    tracing::info!(
        booking = peer_config.booking_base_url(),
        routing = peer_config.routing_base_url(),
        "peers configured"
    );

    let service = CareManagerService::new(
        Arc::new(InMemoryStore::new()),
        Arc::new(booking),
        Arc::new(routing),
        core_config,
    );
    let app = router(AppState::new(service, api_key));

    tracing::info!("++ Starting care manager REST on {}", rest_addr);
    let listener = tokio::net::TcpListener::bind(&rest_addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
