use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use api_realtime::RealtimeState;
use api_rest::AppState;
use api_shared::{TokenConfig, TokenService};
use clinic_core::config::{duration_ms_from_env_value, number_from_env_value};
use clinic_core::constants::{
    DEFAULT_MESSAGE_HISTORY_LIMIT, DEFAULT_PRESENCE_WRITE_TIMEOUT_MS, DEFAULT_REST_ADDR,
    DEFAULT_TOKEN_TTL_SECS, DEFAULT_WS_ADDR,
};
use clinic_core::{ClinicContext, CoreConfig};

/// Main entry point for the clinic backend
///
/// Starts the REST and real-time servers concurrently over one shared [`ClinicContext`], so a
/// message posted over REST reaches subscribed sockets:
/// - REST server on port 3000 (configurable via CLINIC_REST_ADDR)
/// - WebSocket server on port 3001 (configurable via CLINIC_WS_ADDR)
///
/// Both servers require a bearer token signed with `CLINIC_JWT_SECRET` on every route except
/// health checks and login.
///
/// # Environment Variables
/// - `CLINIC_REST_ADDR`: REST server address (default: "0.0.0.0:3000")
/// - `CLINIC_WS_ADDR`: WebSocket server address (default: "0.0.0.0:3001")
/// - `CLINIC_JWT_SECRET`: Token signing secret (required, at least 32 bytes)
/// - `CLINIC_TOKEN_TTL_SECS`: Token lifetime (default: 3600)
/// - `CLINIC_PRESENCE_WRITE_TIMEOUT_MS`: Upper bound on presence writes (default: 2000)
/// - `CLINIC_BOOTSTRAP_ADMIN_EMAIL` / `CLINIC_BOOTSTRAP_ADMIN_PASSWORD`: optional seed admin
///
/// # Returns
/// * `Ok(())` - If servers start, run and shut down cleanly on Ctrl-C
/// * `Err(anyhow::Error)` - If configuration, startup or either server fails
#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("clinic_run=info".parse()?)
                .add_directive("clinic_core=info".parse()?)
                .add_directive("api_rest=info".parse()?)
                .add_directive("api_realtime=info".parse()?),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let rest_addr = std::env::var("CLINIC_REST_ADDR").unwrap_or_else(|_| DEFAULT_REST_ADDR.into());
    let ws_addr = std::env::var("CLINIC_WS_ADDR").unwrap_or_else(|_| DEFAULT_WS_ADDR.into());

    let secret = std::env::var("CLINIC_JWT_SECRET")
        .map_err(|_| anyhow::anyhow!("CLINIC_JWT_SECRET must be set"))?;
    let ttl_secs = number_from_env_value(
        std::env::var("CLINIC_TOKEN_TTL_SECS").ok(),
        DEFAULT_TOKEN_TTL_SECS,
    )?;
    let tokens = Arc::new(TokenService::new(&TokenConfig::new(
        secret,
        Duration::from_secs(ttl_secs),
    )?));

    let mut cfg = CoreConfig::new(
        duration_ms_from_env_value(
            std::env::var("CLINIC_PRESENCE_WRITE_TIMEOUT_MS").ok(),
            DEFAULT_PRESENCE_WRITE_TIMEOUT_MS,
        )?,
        DEFAULT_MESSAGE_HISTORY_LIMIT,
    )?;
    if let (Ok(email), Ok(password)) = (
        std::env::var("CLINIC_BOOTSTRAP_ADMIN_EMAIL"),
        std::env::var("CLINIC_BOOTSTRAP_ADMIN_PASSWORD"),
    ) {
        cfg = cfg.with_bootstrap_admin(&email, password)?;
    }

    let ctx = ClinicContext::in_memory(cfg);
    ctx.bootstrap().await?;

    tracing::info!("++ Starting clinic REST on {}", rest_addr);
    tracing::info!("++ Starting clinic WebSocket on {}", ws_addr);

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    tokio::spawn(async move {
        let _ = tokio::signal::ctrl_c().await;
        tracing::info!("shutdown requested");
        let _ = shutdown_tx.send(true);
    });

    let rest_app = api_rest::router(AppState::new(ctx.clone(), tokens.clone()));
    let ws_app = api_realtime::router(RealtimeState::new(ctx.clone(), tokens));

    let rest_listener = tokio::net::TcpListener::bind(&rest_addr).await?;
    let ws_listener = tokio::net::TcpListener::bind(&ws_addr).await?;

    let rest_server = async {
        axum::serve(rest_listener, rest_app)
            .with_graceful_shutdown(shutdown(shutdown_rx.clone()))
            .await
    };
    let ws_server = async {
        let result = axum::serve(ws_listener, ws_app)
            .with_graceful_shutdown(shutdown(shutdown_rx.clone()))
            .await;
        // Close live sockets: dropping every outbox ends their event loops.
        ctx.shutdown().await;
        result
    };

    // Run both
    let (rest_result, ws_result) = tokio::join!(rest_server, ws_server);
    rest_result.map_err(anyhow::Error::from)?;
    ws_result.map_err(anyhow::Error::from)?;

    Ok(())
}

async fn shutdown(mut rx: watch::Receiver<bool>) {
    while !*rx.borrow() {
        if rx.changed().await.is_err() {
            return;
        }
    }
}
