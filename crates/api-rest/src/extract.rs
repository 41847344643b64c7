//! Request extractors.

use axum::extract::FromRequestParts;
use axum::http::header::AUTHORIZATION;
use axum::http::request::Parts;
use clinic_core::{Actor, ClinicUuid};

use crate::error::ApiError;
use crate::state::AppState;

/// The authenticated actor of a request, taken from `Authorization: Bearer <token>`.
///
/// Rejects with 401 when the header is missing or the token does not verify.
#[derive(Debug, Clone, Copy)]
pub struct AuthActor(pub Actor);

#[axum::async_trait]
impl FromRequestParts<AppState> for AuthActor {
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        let header = parts
            .headers
            .get(AUTHORIZATION)
            .and_then(|h| h.to_str().ok());

        match state.tokens.verify_header(header) {
            Ok(actor) => Ok(AuthActor(actor)),
            Err(err) => {
                tracing::debug!(error = %err, "rejected bearer token");
                Err(ApiError::from(err))
            }
        }
    }
}

/// Parses a path segment as a canonical id, mapping failure to 400.
pub fn parse_id(raw: &str) -> Result<ClinicUuid, ApiError> {
    ClinicUuid::parse(raw.trim()).map_err(|e| ApiError::from(clinic_core::ClinicError::from(e)))
}
