//! Standalone REST API server binary.
//!
//! ## Purpose
//! Runs the REST API server on its own.
//!
//! ## Intended use
//! Useful for development and debugging when you only want the REST server (with
//! OpenAPI/Swagger UI). The workspace's main `clinic-run` binary runs the REST and real-time
//! servers together over one shared context, which is required for live delivery.

use std::sync::Arc;
use std::time::Duration;

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use api_rest::{router, AppState};
use api_shared::{TokenConfig, TokenService};
use clinic_core::config::{duration_ms_from_env_value, number_from_env_value};
use clinic_core::constants::{
    DEFAULT_MESSAGE_HISTORY_LIMIT, DEFAULT_PRESENCE_WRITE_TIMEOUT_MS, DEFAULT_REST_ADDR,
    DEFAULT_TOKEN_TTL_SECS,
};
use clinic_core::{ClinicContext, CoreConfig};

/// Main entry point for the clinic REST API server
///
/// # Environment Variables
/// - `CLINIC_REST_ADDR`: Server address (default: "0.0.0.0:3000")
/// - `CLINIC_JWT_SECRET`: Token signing secret (required, at least 32 bytes)
/// - `CLINIC_TOKEN_TTL_SECS`: Token lifetime in seconds (default: 3600)
/// - `CLINIC_BOOTSTRAP_ADMIN_EMAIL` / `CLINIC_BOOTSTRAP_ADMIN_PASSWORD`: optional seed admin
///
/// # Errors
/// Returns an error if:
/// - the logging/tracing configuration cannot be initialised,
/// - configuration from the environment is invalid,
/// - the server address cannot be bound, or
/// - the HTTP server fails while running.
#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("api_rest=info".parse()?)
                .add_directive("clinic_core=info".parse()?),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let addr = std::env::var("CLINIC_REST_ADDR").unwrap_or_else(|_| DEFAULT_REST_ADDR.into());

    tracing::info!("-- Starting clinic REST API on {}", addr);

    let secret = std::env::var("CLINIC_JWT_SECRET")
        .map_err(|_| anyhow::anyhow!("CLINIC_JWT_SECRET must be set"))?;
    let ttl_secs = number_from_env_value(
        std::env::var("CLINIC_TOKEN_TTL_SECS").ok(),
        DEFAULT_TOKEN_TTL_SECS,
    )?;
    let tokens = TokenService::new(&TokenConfig::new(secret, Duration::from_secs(ttl_secs))?);

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

    let app = router(AppState::new(ctx, Arc::new(tokens)));

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
