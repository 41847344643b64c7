use api_shared::TokenService;
use clinic_core::ClinicContext;
use std::sync::Arc;

/// Application state shared across REST handlers.
#[derive(Clone)]
pub struct AppState {
    pub ctx: ClinicContext,
    pub tokens: Arc<TokenService>,
}

impl AppState {
    pub fn new(ctx: ClinicContext, tokens: Arc<TokenService>) -> Self {
        Self { ctx, tokens }
    }
}
