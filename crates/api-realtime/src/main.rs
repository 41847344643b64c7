//! Standalone real-time server binary.
//!
//! ## Purpose
//! Runs the WebSocket server on its own, for development and debugging of the socket
//! protocol. Messages posted over REST only reach sockets when both servers share one
//! process, which is what the workspace's `clinic-run` binary does.

use std::sync::Arc;
use std::time::Duration;

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use api_realtime::{router, RealtimeState};
use api_shared::{TokenConfig, TokenService};
use clinic_core::config::{duration_ms_from_env_value, number_from_env_value};
use clinic_core::constants::{
    DEFAULT_MESSAGE_HISTORY_LIMIT, DEFAULT_PRESENCE_WRITE_TIMEOUT_MS, DEFAULT_TOKEN_TTL_SECS,
    DEFAULT_WS_ADDR,
};
use clinic_core::{ClinicContext, CoreConfig};

/// Main entry point for the clinic real-time server
///
/// # Environment Variables
/// - `CLINIC_WS_ADDR`: Server address (default: "0.0.0.0:3001")
/// - `CLINIC_JWT_SECRET`: Token signing secret (required, at least 32 bytes)
/// - `CLINIC_PRESENCE_WRITE_TIMEOUT_MS`: Upper bound on presence writes (default: 2000)
///
/// # Errors
/// Returns an error if configuration is invalid, the address cannot be bound, or the server
/// fails while running.
#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("api_realtime=info".parse()?)
                .add_directive("clinic_core=info".parse()?),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let addr = std::env::var("CLINIC_WS_ADDR").unwrap_or_else(|_| DEFAULT_WS_ADDR.into());

    tracing::info!("-- Starting clinic real-time server on {}", addr);

    let secret = std::env::var("CLINIC_JWT_SECRET")
        .map_err(|_| anyhow::anyhow!("CLINIC_JWT_SECRET must be set"))?;
    let ttl_secs = number_from_env_value(
        std::env::var("CLINIC_TOKEN_TTL_SECS").ok(),
        DEFAULT_TOKEN_TTL_SECS,
    )?;
    let tokens = TokenService::new(&TokenConfig::new(secret, Duration::from_secs(ttl_secs))?);

    let cfg = CoreConfig::new(
        duration_ms_from_env_value(
            std::env::var("CLINIC_PRESENCE_WRITE_TIMEOUT_MS").ok(),
            DEFAULT_PRESENCE_WRITE_TIMEOUT_MS,
        )?,
        DEFAULT_MESSAGE_HISTORY_LIMIT,
    )?;
    let ctx = ClinicContext::in_memory(cfg);

    let app = router(RealtimeState::new(ctx.clone(), Arc::new(tokens)));

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app).await?;

    ctx.shutdown().await;
    Ok(())
}
