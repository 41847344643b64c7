//! HTTP error mapping.
//!
//! Every handler returns [`ApiError`] on failure, which renders as a status code plus a
//! `{ code, message }` JSON body. Internal failures are logged here and reach the client
//! only as a generic message.

use api_shared::{ErrorRes, TokenError};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use clinic_core::ClinicError;

#[derive(Debug)]
pub struct ApiError {
    pub status: StatusCode,
    pub body: ErrorRes,
}

impl ApiError {
    pub fn new(status: StatusCode, code: &str, message: impl Into<String>) -> Self {
        Self {
            status,
            body: ErrorRes {
                code: code.to_string(),
                message: message.into(),
            },
        }
    }
}

impl From<ClinicError> for ApiError {
    fn from(err: ClinicError) -> Self {
        let status = match err.code() {
            "bad_request" => StatusCode::BAD_REQUEST,
            "unauthenticated" => StatusCode::UNAUTHORIZED,
            "forbidden" => StatusCode::FORBIDDEN,
            "not_found" => StatusCode::NOT_FOUND,
            "conflict" => StatusCode::CONFLICT,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        };

        if err.is_internal() {
            tracing::error!(error = ?err, "request failed");
            return Self::new(status, err.code(), "internal error");
        }
        Self::new(status, err.code(), err.to_string())
    }
}

impl From<TokenError> for ApiError {
    fn from(err: TokenError) -> Self {
        ClinicError::from(err).into()
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (self.status, Json(self.body)).into_response()
    }
}

pub type ApiResult<T> = std::result::Result<T, ApiError>;

#[cfg(test)]
mod tests {
    use super::*;
    use clinic_core::StoreError;

    #[test]
    fn test_taxonomy_maps_to_statuses() {
        let cases = [
            (ClinicError::bad_request("x"), StatusCode::BAD_REQUEST),
            (
                ClinicError::Unauthenticated("x".into()),
                StatusCode::UNAUTHORIZED,
            ),
            (ClinicError::forbidden("x"), StatusCode::FORBIDDEN),
            (ClinicError::not_found("x"), StatusCode::NOT_FOUND),
            (ClinicError::Conflict("x".into()), StatusCode::CONFLICT),
            (
                ClinicError::Internal("x".into()),
                StatusCode::INTERNAL_SERVER_ERROR,
            ),
        ];
        for (err, status) in cases {
            assert_eq!(ApiError::from(err).status, status);
        }
    }

    #[test]
    fn test_internal_details_are_hidden() {
        let err: ClinicError = StoreError::Unavailable("db password=hunter2".into()).into();
        let api = ApiError::from(err);
        assert_eq!(api.status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(api.body.message, "internal error");
    }
}
