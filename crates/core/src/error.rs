/// Errors surfaced by the clinic core.
///
/// The variants form the taxonomy every transport maps onto its own status codes:
/// REST uses HTTP statuses, the real-time channel emits `error` events.
#[derive(Debug, thiserror::Error)]
pub enum ClinicError {
    #[error("bad request: {0}")]
    BadRequest(String),
    #[error("unauthenticated: {0}")]
    Unauthenticated(String),
    #[error("forbidden: {0}")]
    Forbidden(String),
    #[error("not found: {0}")]
    NotFound(String),
    #[error("conflict: {0}")]
    Conflict(String),
    #[error("internal error: {0}")]
    Internal(String),

    #[error("invalid identifier: {0}")]
    Uuid(#[from] clinic_uuid::UuidError),
    #[error("invalid text: {0}")]
    Text(#[from] clinic_types::TextError),
    #[error("store error: {0}")]
    Store(#[source] StoreError),
    #[error("failed to hash password: {0}")]
    PasswordHash(String),
}

impl ClinicError {
    /// Stable machine-readable code for the error category.
    pub fn code(&self) -> &'static str {
        match self {
            ClinicError::BadRequest(_) | ClinicError::Uuid(_) | ClinicError::Text(_) => {
                "bad_request"
            }
            ClinicError::Unauthenticated(_) => "unauthenticated",
            ClinicError::Forbidden(_) => "forbidden",
            ClinicError::NotFound(_) => "not_found",
            ClinicError::Conflict(_) => "conflict",
            ClinicError::Internal(_) | ClinicError::Store(_) | ClinicError::PasswordHash(_) => {
                "internal"
            }
        }
    }

    /// True for failures of the server rather than of the request.
    pub fn is_internal(&self) -> bool {
        self.code() == "internal"
    }

    pub fn forbidden(message: impl Into<String>) -> Self {
        ClinicError::Forbidden(message.into())
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        ClinicError::NotFound(message.into())
    }

    pub fn bad_request(message: impl Into<String>) -> Self {
        ClinicError::BadRequest(message.into())
    }
}

impl From<StoreError> for ClinicError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::NotFound(what) => ClinicError::NotFound(what),
            StoreError::Conflict(what) => ClinicError::Conflict(what),
            other => ClinicError::Store(other),
        }
    }
}

pub type ClinicResult<T> = std::result::Result<T, ClinicError>;

/// Errors raised by durable store backends.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("not found: {0}")]
    NotFound(String),
    #[error("conflict: {0}")]
    Conflict(String),
    #[error("store unavailable: {0}")]
    Unavailable(String),
    #[error(transparent)]
    Unexpected(#[from] anyhow::Error),
}

pub type StoreResult<T> = std::result::Result<T, StoreError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_store_not_found_maps_to_not_found() {
        let err: ClinicError = StoreError::NotFound("patient".into()).into();
        assert!(matches!(err, ClinicError::NotFound(_)));
        assert_eq!(err.code(), "not_found");
    }

    #[test]
    fn test_store_unavailable_maps_to_internal() {
        let err: ClinicError = StoreError::Unavailable("timeout".into()).into();
        assert!(matches!(err, ClinicError::Store(_)));
        assert!(err.is_internal());
    }

    #[test]
    fn test_invalid_identifier_is_bad_request() {
        let err: ClinicError = clinic_uuid::ClinicUuid::parse("nope").unwrap_err().into();
        assert_eq!(err.code(), "bad_request");
    }
}
