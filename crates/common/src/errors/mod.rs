//! Error types for ArticleForge services
//!
//! Provides a closed error taxonomy with:
//! - Distinct error kinds for validation, state-machine, and lookup failures
//! - HTTP status code mapping
//! - The `{title, detail}` error body shared by every endpoint
//! - Machine-readable error codes for client handling

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::ids::Msid;

/// Result type alias using AppError
pub type Result<T> = std::result::Result<T, AppError>;

/// Error codes for machine-readable error identification
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorCode {
    // Document errors (1xxx)
    Invalid,
    BadRequest,
    ParseError,

    // State machine errors (2xxx)
    AlreadyPublished,
    PreviousVersionUnpublished,
    PreviousVersionDne,

    // Resource errors (4xxx)
    NoRecord,

    // Negotiation errors (5xxx)
    NotAcceptable,
    UnsupportedMediaType,

    // Authorization errors (6xxx)
    Forbidden,

    // Infrastructure errors (7xxx)
    DatabaseError,
    ConfigurationError,
    SchemaLoadError,
    SerializationError,
    EventError,

    // Unclassified
    Unknown,
}

impl ErrorCode {
    /// Get the numeric code for this error
    pub fn as_code(&self) -> u16 {
        match self {
            // Document (1xxx)
            ErrorCode::Invalid => 1001,
            ErrorCode::BadRequest => 1002,
            ErrorCode::ParseError => 1003,

            // State machine (2xxx)
            ErrorCode::AlreadyPublished => 2001,
            ErrorCode::PreviousVersionUnpublished => 2002,
            ErrorCode::PreviousVersionDne => 2003,

            // Resources (4xxx)
            ErrorCode::NoRecord => 4001,

            // Negotiation (5xxx)
            ErrorCode::NotAcceptable => 5001,
            ErrorCode::UnsupportedMediaType => 5002,

            // Authorization (6xxx)
            ErrorCode::Forbidden => 6001,

            // Infrastructure (7xxx)
            ErrorCode::DatabaseError => 7001,
            ErrorCode::ConfigurationError => 7002,
            ErrorCode::SchemaLoadError => 7003,
            ErrorCode::SerializationError => 7004,
            ErrorCode::EventError => 7005,

            ErrorCode::Unknown => 9001,
        }
    }
}

/// One machine-checkable sub-error from a schema validation attempt.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct SubError {
    /// JSON pointer to the offending value
    pub path: String,
    /// Human-readable constraint description
    pub message: String,
}

/// The rejections collected from one schema version.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SchemaAttempt {
    pub schema_version: u32,
    pub errors: Vec<SubError>,
}

/// Validation failure across every attempted schema version,
/// newest attempt first.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ValidationFailure {
    pub content_type: String,
    pub attempts: Vec<SchemaAttempt>,
}

impl ValidationFailure {
    /// The first (newest-schema) error, used as the headline diagnostic.
    pub fn first_error(&self) -> Option<&SubError> {
        self.attempts.first().and_then(|a| a.errors.first())
    }
}

impl std::fmt::Display for ValidationFailure {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self.first_error() {
            Some(err) => write!(
                f,
                "'{}' document rejected by {} schema version(s); newest: {} at {}",
                self.content_type,
                self.attempts.len(),
                err.message,
                if err.path.is_empty() { "/" } else { &err.path }
            ),
            None => write!(f, "'{}' document rejected", self.content_type),
        }
    }
}

/// Application error types
#[derive(Error, Debug)]
pub enum AppError {
    // Document errors
    #[error("article data failed validation: {0}")]
    Invalid(ValidationFailure),

    #[error("bad request: {message}")]
    BadRequest { message: String },

    #[error("unusable document: {message}")]
    Parse { message: String },

    // State machine errors
    #[error("version {version} of article {msid} has already been published")]
    AlreadyPublished { msid: Msid, version: i32 },

    #[error("cannot ingest version {version} of article {msid}: the previous version is unpublished")]
    PreviousVersionUnpublished { msid: Msid, version: i32 },

    #[error("cannot ingest version {version} of article {msid}: the previous version does not exist")]
    PreviousVersionDne { msid: Msid, version: i32 },

    // Resource errors
    #[error("{resource} not found: {id}")]
    NoRecord { resource: &'static str, id: String },

    // Negotiation errors
    #[error("no acceptable content type could be negotiated")]
    NotAcceptable,

    #[error("unsupported media type: {mime}")]
    UnsupportedMediaType { mime: String },

    // Authorization errors
    #[error("forbidden: {message}")]
    Forbidden { message: String },

    // Infrastructure errors
    #[error("database error: {0}")]
    Database(#[from] sea_orm::DbErr),

    #[error("configuration error: {message}")]
    Configuration { message: String },

    #[error("schema load error: {message}")]
    SchemaLoad { message: String },

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("event sink error: {message}")]
    Event { message: String },

    // Generic
    #[error("{0}")]
    Other(#[from] anyhow::Error),
}

impl AppError {
    /// Convenience constructor for lookup misses.
    pub fn no_record(resource: &'static str, id: impl ToString) -> Self {
        AppError::NoRecord {
            resource,
            id: id.to_string(),
        }
    }

    /// Get the error code for this error
    pub fn code(&self) -> ErrorCode {
        match self {
            AppError::Invalid(_) => ErrorCode::Invalid,
            AppError::BadRequest { .. } => ErrorCode::BadRequest,
            AppError::Parse { .. } => ErrorCode::ParseError,
            AppError::AlreadyPublished { .. } => ErrorCode::AlreadyPublished,
            AppError::PreviousVersionUnpublished { .. } => ErrorCode::PreviousVersionUnpublished,
            AppError::PreviousVersionDne { .. } => ErrorCode::PreviousVersionDne,
            AppError::NoRecord { .. } => ErrorCode::NoRecord,
            AppError::NotAcceptable => ErrorCode::NotAcceptable,
            AppError::UnsupportedMediaType { .. } => ErrorCode::UnsupportedMediaType,
            AppError::Forbidden { .. } => ErrorCode::Forbidden,
            AppError::Database(_) => ErrorCode::DatabaseError,
            AppError::Configuration { .. } => ErrorCode::ConfigurationError,
            AppError::SchemaLoad { .. } => ErrorCode::SchemaLoadError,
            AppError::Serialization(_) => ErrorCode::SerializationError,
            AppError::Event { .. } => ErrorCode::EventError,
            AppError::Other(_) => ErrorCode::Unknown,
        }
    }

    /// Get the HTTP status code for this error
    pub fn status_code(&self) -> StatusCode {
        match self {
            // 400 Bad Request
            AppError::Invalid(_)
            | AppError::BadRequest { .. }
            | AppError::Parse { .. }
            | AppError::AlreadyPublished { .. }
            | AppError::PreviousVersionUnpublished { .. }
            | AppError::PreviousVersionDne { .. } => StatusCode::BAD_REQUEST,

            // 403 Forbidden
            AppError::Forbidden { .. } => StatusCode::FORBIDDEN,

            // 404 Not Found
            AppError::NoRecord { .. } => StatusCode::NOT_FOUND,

            // 406 Not Acceptable
            AppError::NotAcceptable => StatusCode::NOT_ACCEPTABLE,

            // 415 Unsupported Media Type
            AppError::UnsupportedMediaType { .. } => StatusCode::UNSUPPORTED_MEDIA_TYPE,

            // 500 Internal Server Error
            AppError::Database(_)
            | AppError::Configuration { .. }
            | AppError::SchemaLoad { .. }
            | AppError::Serialization(_)
            | AppError::Event { .. }
            | AppError::Other(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Short, stable title for the error body.
    pub fn title(&self) -> &'static str {
        match self {
            AppError::Invalid(_) => "validating article data failed",
            AppError::BadRequest { .. } => "bad request",
            AppError::Parse { .. } => "unusable document",
            AppError::AlreadyPublished { .. } => "already published",
            AppError::PreviousVersionUnpublished { .. } => "previous version unpublished",
            AppError::PreviousVersionDne { .. } => "previous version does not exist",
            AppError::NoRecord { .. } => "not found",
            AppError::NotAcceptable => "not acceptable",
            AppError::UnsupportedMediaType { .. } => "unsupported media type",
            AppError::Forbidden { .. } => "forbidden",
            AppError::Database(_)
            | AppError::Configuration { .. }
            | AppError::SchemaLoad { .. }
            | AppError::Serialization(_)
            | AppError::Event { .. }
            | AppError::Other(_) => "internal error",
        }
    }

    /// Check if this error should be logged at error level
    pub fn is_server_error(&self) -> bool {
        self.status_code().is_server_error()
    }

    /// Check if this error is a client error
    pub fn is_client_error(&self) -> bool {
        self.status_code().is_client_error()
    }
}

/// Error body shared by every endpoint: `{title, detail?}`.
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorBody {
    pub title: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
}

impl ErrorBody {
    pub fn new(title: impl Into<String>, detail: Option<String>) -> Self {
        Self {
            title: title.into(),
            detail,
        }
    }
}

impl From<&AppError> for ErrorBody {
    fn from(err: &AppError) -> Self {
        ErrorBody {
            title: err.title().to_string(),
            detail: Some(err.to_string()),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let code = self.code();
        let message = self.to_string();

        // Log based on severity
        if self.is_server_error() {
            tracing::error!(
                error = %message,
                code = ?code,
                status = status.as_u16(),
                "Server error"
            );
        } else if self.is_client_error() {
            tracing::warn!(
                error = %message,
                code = ?code,
                status = status.as_u16(),
                "Client error"
            );
        }

        let body = ErrorBody::from(&self);

        (status, Json(body)).into_response()
    }
}

impl From<std::io::Error> for AppError {
    fn from(err: std::io::Error) -> Self {
        AppError::Other(anyhow::Error::new(err))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_code_mapping() {
        let err = AppError::no_record("article", 3);
        assert_eq!(err.code(), ErrorCode::NoRecord);
        assert_eq!(err.status_code(), StatusCode::NOT_FOUND);
    }

    #[test]
    fn test_sequencing_errors_are_client_errors() {
        let err = AppError::PreviousVersionDne { msid: 5, version: 2 };
        assert_eq!(err.code(), ErrorCode::PreviousVersionDne);
        assert_eq!(err.status_code(), StatusCode::BAD_REQUEST);
        assert!(err.is_client_error());

        let err = AppError::AlreadyPublished { msid: 5, version: 1 };
        assert_eq!(err.code(), ErrorCode::AlreadyPublished);
        assert!(!err.is_server_error());
    }

    #[test]
    fn test_negotiation_distinct_from_not_found() {
        assert_eq!(AppError::NotAcceptable.status_code(), StatusCode::NOT_ACCEPTABLE);
        assert_ne!(
            AppError::NotAcceptable.status_code(),
            AppError::no_record("article", 1).status_code()
        );
    }

    #[test]
    fn test_validation_failure_headline() {
        let failure = ValidationFailure {
            content_type: "poa".to_string(),
            attempts: vec![
                SchemaAttempt {
                    schema_version: 2,
                    errors: vec![SubError {
                        path: "/title".to_string(),
                        message: "expected string".to_string(),
                    }],
                },
                SchemaAttempt {
                    schema_version: 1,
                    errors: vec![SubError {
                        path: "/abstract".to_string(),
                        message: "required".to_string(),
                    }],
                },
            ],
        };
        let first = failure.first_error().unwrap();
        assert_eq!(first.path, "/title");

        let err = AppError::Invalid(failure);
        assert_eq!(err.status_code(), StatusCode::BAD_REQUEST);
        assert_eq!(err.title(), "validating article data failed");
    }

    #[test]
    fn test_error_body_shape() {
        let err = AppError::Forbidden {
            message: "not allowed to modify fragments".to_string(),
        };
        let body = ErrorBody::from(&err);
        let json = serde_json::to_value(&body).unwrap();
        assert_eq!(json["title"], "forbidden");
        assert!(json["detail"].as_str().unwrap().contains("fragments"));
    }
}
