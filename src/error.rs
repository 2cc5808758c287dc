//! Error taxonomy for the ensemble orchestrator.
//!
//! One enum, one surfaced HTTP status, one error type string per variant.
//! Mirrors the shape of a typical service error enum: `thiserror` derives the
//! `Display`/`Error` impls, and a couple of inherent methods project each
//! variant onto the wire-level taxonomy from the error envelope contract.

use thiserror::Error;

/// Crate-wide result alias.
pub type Result<T> = std::result::Result<T, EnsembleError>;

/// The orthogonal-to-provider-errors taxonomy.
#[derive(Error, Debug, Clone)]
pub enum EnsembleError {
    #[error("invalid request: {0}")]
    InvalidRequest(String),

    #[error("authentication failed: {0}")]
    AuthenticationError(String),

    #[error("not found: {0}")]
    NotFound(String),

    #[error("conflict: {0}")]
    Conflict(String),

    #[error("rate limited: {0}")]
    RateLimited(String),

    #[error("timeout: {0}")]
    Timeout(String),

    #[error("service unavailable: {0}")]
    ServiceUnavailable(String),

    #[error("internal error: {0}")]
    Internal(String),
}

impl EnsembleError {
    /// The `type` field of the error envelope.
    pub fn error_type(&self) -> &'static str {
        match self {
            EnsembleError::InvalidRequest(_) => "invalid_request",
            EnsembleError::AuthenticationError(_) => "authentication_error",
            EnsembleError::NotFound(_) => "not_found",
            EnsembleError::Conflict(_) => "conflict",
            EnsembleError::RateLimited(_) => "rate_limited",
            EnsembleError::Timeout(_) => "timeout",
            EnsembleError::ServiceUnavailable(_) => "service_unavailable",
            EnsembleError::Internal(_) => "internal_error",
        }
    }

    /// The mapped HTTP status code.
    pub fn status_code(&self) -> u16 {
        match self {
            EnsembleError::InvalidRequest(_) => 400,
            EnsembleError::AuthenticationError(_) => 401,
            EnsembleError::NotFound(_) => 404,
            EnsembleError::Conflict(_) => 409,
            EnsembleError::RateLimited(_) => 429,
            EnsembleError::Timeout(_) => 504,
            EnsembleError::ServiceUnavailable(_) => 503,
            EnsembleError::Internal(_) => 500,
        }
    }

    /// `already_exists` is surfaced as a conflict.
    pub fn already_exists(debate_id: impl std::fmt::Display) -> Self {
        EnsembleError::Conflict(format!("debate {debate_id} already_exists"))
    }

    pub fn no_available_provider() -> Self {
        EnsembleError::ServiceUnavailable("no_available_provider".to_string())
    }

    pub fn insufficient_providers() -> Self {
        EnsembleError::ServiceUnavailable("insufficient_providers".to_string())
    }

    pub fn all_providers_failed() -> Self {
        EnsembleError::ServiceUnavailable("all_providers_failed".to_string())
    }
}

impl From<serde_json::Error> for EnsembleError {
    fn from(err: serde_json::Error) -> Self {
        EnsembleError::Internal(format!("serialization error: {err}"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_codes_match_taxonomy() {
        assert_eq!(EnsembleError::InvalidRequest("x".into()).status_code(), 400);
        assert_eq!(EnsembleError::NotFound("x".into()).status_code(), 404);
        assert_eq!(EnsembleError::Conflict("x".into()).status_code(), 409);
        assert_eq!(EnsembleError::RateLimited("x".into()).status_code(), 429);
        assert_eq!(EnsembleError::Timeout("x".into()).status_code(), 504);
        assert_eq!(
            EnsembleError::ServiceUnavailable("x".into()).status_code(),
            503
        );
        assert_eq!(EnsembleError::Internal("x".into()).status_code(), 500);
    }

    #[test]
    fn service_unavailable_helpers_carry_distinct_messages() {
        assert!(EnsembleError::no_available_provider()
            .to_string()
            .contains("no_available_provider"));
        assert!(EnsembleError::insufficient_providers()
            .to_string()
            .contains("insufficient_providers"));
        assert!(EnsembleError::all_providers_failed()
            .to_string()
            .contains("all_providers_failed"));
    }
}
