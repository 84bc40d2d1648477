//! Error types for cwm-hub
//!
//! One variant per failure class a caller can observe. Each maps to an HTTP
//! status and carries a `retryable` hint so clients know whether resubmitting
//! the same frame or request can succeed.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use cwm_common::attention::UnknownLabel;
use serde_json::json;
use std::fmt;
use thiserror::Error;

use crate::classifier::ClassifierError;

/// Required frame submission input that was absent
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MissingField {
    Frame,
    StudentId,
    SessionId,
}

impl fmt::Display for MissingField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MissingField::Frame => f.write_str("missing frame"),
            MissingField::StudentId => f.write_str("missing student id"),
            MissingField::SessionId => f.write_str("missing session id"),
        }
    }
}

/// Main error type for cwm-hub
#[derive(Error, Debug)]
pub enum Error {
    /// Required input absent; nothing was mutated
    #[error("Bad request: {0}")]
    BadRequest(MissingField),

    /// Request body could not be read as the expected JSON
    #[error("Malformed request body: {0}")]
    MalformedBody(String),

    /// Session unknown or ended; nothing was mutated
    #[error("Session inactive: {0}")]
    SessionInactive(String),

    /// Frame bytes could not be decoded; similarity cache untouched
    #[error("Invalid frame: {0}")]
    InvalidFrame(String),

    /// Classifier returned a label outside the known set
    #[error("Invalid label: {0}")]
    InvalidLabel(#[from] UnknownLabel),

    /// Classifier call failed or timed out
    #[error("Classifier error: {0}")]
    Classifier(#[from] ClassifierError),

    /// Storage rejected a write that controls session admission
    #[error("Persistence error: {0}")]
    Persistence(String),

    #[error("Session not found: {0}")]
    SessionNotFound(String),

    #[error("Session already ended: {0}")]
    AlreadyEnded(String),

    /// Storage or configuration failure from the common layer
    #[error(transparent)]
    Common(#[from] cwm_common::Error),
}

impl Error {
    /// Stable machine-readable error code
    pub fn code(&self) -> &'static str {
        match self {
            Error::BadRequest(_) | Error::MalformedBody(_) => "BAD_REQUEST",
            Error::SessionInactive(_) => "SESSION_INACTIVE",
            Error::InvalidFrame(_) => "INVALID_FRAME",
            Error::InvalidLabel(_) => "INVALID_LABEL",
            Error::Classifier(_) => "CLASSIFIER_ERROR",
            Error::Persistence(_) => "PERSISTENCE_ERROR",
            Error::SessionNotFound(_) => "SESSION_NOT_FOUND",
            Error::AlreadyEnded(_) => "ALREADY_ENDED",
            Error::Common(_) => "INTERNAL_ERROR",
        }
    }

    pub fn status(&self) -> StatusCode {
        match self {
            Error::BadRequest(_) | Error::MalformedBody(_) | Error::InvalidFrame(_) => {
                StatusCode::BAD_REQUEST
            }
            Error::SessionInactive(_) | Error::AlreadyEnded(_) => StatusCode::CONFLICT,
            Error::SessionNotFound(_) => StatusCode::NOT_FOUND,
            Error::InvalidLabel(_) | Error::Classifier(_) => StatusCode::BAD_GATEWAY,
            Error::Persistence(_) | Error::Common(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Whether resubmitting the same request may succeed
    pub fn is_retryable(&self) -> bool {
        matches!(self, Error::Classifier(_) | Error::Persistence(_))
    }
}

impl IntoResponse for Error {
    fn into_response(self) -> Response {
        let status = self.status();
        let body = Json(json!({
            "success": false,
            "error": {
                "code": self.code(),
                "message": self.to_string(),
                "retryable": self.is_retryable(),
            }
        }));

        (status, body).into_response()
    }
}

/// Convenience Result type using cwm-hub Error
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bad_request_messages_name_the_field() {
        assert_eq!(
            Error::BadRequest(MissingField::StudentId).to_string(),
            "Bad request: missing student id"
        );
        assert_eq!(Error::BadRequest(MissingField::Frame).status(), StatusCode::BAD_REQUEST);
    }

    #[test]
    fn test_only_transient_failures_are_retryable() {
        assert!(Error::Classifier(ClassifierError::Timeout).is_retryable());
        assert!(!Error::SessionInactive("x".into()).is_retryable());
        assert!(!Error::BadRequest(MissingField::SessionId).is_retryable());
        assert!(!Error::InvalidFrame("truncated".into()).is_retryable());
    }

    #[test]
    fn test_status_codes() {
        assert_eq!(Error::SessionNotFound("x".into()).status(), StatusCode::NOT_FOUND);
        assert_eq!(Error::AlreadyEnded("x".into()).status(), StatusCode::CONFLICT);
        let malformed = Error::MalformedBody("EOF while parsing".into());
        assert_eq!(malformed.status(), StatusCode::BAD_REQUEST);
        assert_eq!(malformed.code(), "BAD_REQUEST");
        assert!(!malformed.is_retryable());
        assert_eq!(
            Error::Classifier(ClassifierError::Status(503, String::new())).status(),
            StatusCode::BAD_GATEWAY
        );
    }
}
