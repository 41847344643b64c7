//! # API Realtime
//!
//! WebSocket channel for the clinic backend.
//!
//! Handles:
//! - Bearer authentication of the upgrade request (header or `?token=`)
//! - The client event protocol (`protocol`)
//! - One event loop per connection, bridging the socket and the connection's outbox
//!
//! Room membership, presence and fan-out live in `clinic-core`; this crate only moves frames.

#![warn(rust_2018_idioms)]

pub mod protocol;
pub mod service;
pub mod socket;


use std::sync::Arc;

use axum::{response::Json, routing::get, Router};

use api_shared::{HealthRes, HealthService, TokenService};
use clinic_core::ClinicContext;

pub use protocol::ClientEvent;
pub use service::RealtimeService;

/// State shared by every socket handler.
#[derive(Clone)]
pub struct RealtimeState {
    pub service: RealtimeService,
    pub tokens: Arc<TokenService>,
}

impl RealtimeState {
    pub fn new(ctx: ClinicContext, tokens: Arc<TokenService>) -> Self {
        Self {
            service: RealtimeService::new(ctx),
            tokens,
        }
    }
}

/// Builds the real-time router: the socket at `/ws` plus `/health`.
pub fn router(state: RealtimeState) -> Router {
    Router::new()
        .route("/ws", get(socket::ws_handler))
        .route("/health", get(health))
        .with_state(state)
}

async fn health() -> Json<HealthRes> {
    Json(HealthService::check_health())
}
