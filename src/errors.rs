//! # Error Handling
//!
//! Every handler returns `Result<_, ApiError>`. The error type:
//! - maps to the right HTTP status code
//! - sends a sanitized JSON body to the client
//! - logs internal detail (database errors, slug exhaustion) through `tracing`
//!
//! Database and internal errors never reach the client verbatim; the user only sees a
//! generic message while the cause goes to the log.
//!
//! ```rust,ignore
//! use diecast_vault::ApiError;
//!
//! async fn handler(State(db): State<DatabaseConnection>) -> Result<Json<car::Model>, ApiError> {
//!     let car = car::Entity::find_by_id(1)
//!         .one(&db)
//!         .await?
//!         .ok_or_else(|| ApiError::not_found("car", Some("1".to_string())))?;
//!     Ok(Json(car))
//! }
//! ```

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use sea_orm::{DbErr, SqlErr};
use serde::Serialize;
use std::fmt;

use crate::validation::{ValidationError, ValidationErrors};

/// API error type with automatic logging and sanitized responses
#[derive(Debug)]
pub enum ApiError {
    /// 404 Not Found - the identifier does not resolve to a record
    NotFound {
        /// Resource type (e.g. "car", "series")
        resource: String,
        /// Optional key that wasn't found
        id: Option<String>,
    },

    /// 422 Unprocessable Entity - field-level validation failed
    ValidationFailed {
        /// Field to message detail, enough to redisplay a form
        errors: ValidationErrors,
    },

    /// 500 Internal Server Error - Database error (details logged, not exposed)
    Database {
        /// User-facing generic message
        message: String,
        /// Internal error (logged, not sent to user)
        internal: DbErr,
    },

    /// 500 Internal Server Error - Generic internal error
    Internal {
        /// User-facing generic message
        message: String,
        /// Internal error details (logged, not sent to user)
        internal: Option<String>,
    },
}

impl ApiError {
    /// Create a 404 Not Found error
    ///
    /// # Example
    /// ```rust,ignore
    /// return Err(ApiError::not_found("series", Some(slug.to_string())));
    /// ```
    pub fn not_found(resource: impl Into<String>, id: Option<String>) -> Self {
        Self::NotFound {
            resource: resource.into(),
            id,
        }
    }

    /// Create a 422 error carrying a single field message
    ///
    /// # Example
    /// ```rust,ignore
    /// return Err(ApiError::invalid_field("name", "Series with this Name already exists."));
    /// ```
    pub fn invalid_field(field: &str, message: impl Into<String>) -> Self {
        let mut errors = ValidationErrors::new();
        errors.add(ValidationError::new(field, message));
        Self::ValidationFailed { errors }
    }

    /// Create a 500 Internal Server Error from a database error
    ///
    /// The database error details are logged but NOT sent to the user.
    pub fn database(err: DbErr) -> Self {
        Self::Database {
            message: "A database error occurred".to_string(),
            internal: err,
        }
    }

    /// Create a 500 Internal Server Error with optional details
    pub fn internal(message: impl Into<String>, internal: Option<String>) -> Self {
        Self::Internal {
            message: message.into(),
            internal,
        }
    }

    /// Turn a unique-constraint violation into a field-level validation error.
    ///
    /// Any other database error stays a 500.
    #[must_use]
    pub fn from_unique_violation(err: DbErr, field: &str, message: &str) -> Self {
        if is_unique_violation(&err) {
            Self::invalid_field(field, message)
        } else {
            Self::database(err)
        }
    }

    /// Get the HTTP status code for this error
    #[must_use]
    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::NotFound { .. } => StatusCode::NOT_FOUND,
            Self::ValidationFailed { .. } => StatusCode::UNPROCESSABLE_ENTITY,
            Self::Database { .. } | Self::Internal { .. } => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Get the user-facing error message (sanitized)
    #[must_use]
    pub fn user_message(&self) -> String {
        match self {
            Self::NotFound { resource, id } => {
                if let Some(id) = id {
                    format!("{resource} '{id}' not found")
                } else {
                    format!("{resource} not found")
                }
            }
            Self::Database { message, .. }
            | Self::Internal { message, .. } => message.clone(),
            Self::ValidationFailed { errors } => {
                if errors.len() == 1 {
                    errors.errors()[0].to_string()
                } else {
                    format!("Validation failed with {} errors", errors.len())
                }
            }
        }
    }

    /// Field errors carried by a validation failure, if any
    #[must_use]
    pub fn validation_errors(&self) -> Option<&ValidationErrors> {
        match self {
            Self::ValidationFailed { errors } => Some(errors),
            _ => None,
        }
    }

    /// Log internal error details (not sent to user)
    fn log_internal(&self) {
        match self {
            Self::Database { internal, .. } => {
                tracing::error!(error = ?internal, "Database error occurred");
            }
            Self::Internal {
                internal: Some(details),
                ..
            } => {
                tracing::error!(details = %details, "Internal error occurred");
            }
            _ => {
                tracing::debug!(
                    error = %self.user_message(),
                    status = %self.status_code(),
                    "API error"
                );
            }
        }
    }
}

/// `true` when the database rejected a write because of a unique constraint
#[must_use]
pub fn is_unique_violation(err: &DbErr) -> bool {
    matches!(err.sql_err(), Some(SqlErr::UniqueConstraintViolation(_)))
}

/// Error response sent to users (sanitized)
#[derive(Serialize)]
struct ErrorResponse {
    error: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    details: Option<Vec<ValidationError>>,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        self.log_internal();

        let status = self.status_code();
        let response = match &self {
            Self::ValidationFailed { errors } => ErrorResponse {
                error: "Validation failed".to_string(),
                details: Some(errors.errors().to_vec()),
            },
            _ => ErrorResponse {
                error: self.user_message(),
                details: None,
            },
        };

        (status, Json(response)).into_response()
    }
}

impl fmt::Display for ApiError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.user_message())
    }
}

impl std::error::Error for ApiError {}

/// - `DbErr::RecordNotFound` → 404 Not Found
/// - All other `DbErr` variants → 500 (logged internally, sanitized for users)
impl From<DbErr> for ApiError {
    fn from(err: DbErr) -> Self {
        match &err {
            DbErr::RecordNotFound(msg) => {
                let resource = msg.split_whitespace().next().unwrap_or("Resource");
                Self::NotFound {
                    resource: resource.to_string(),
                    id: None,
                }
            }
            _ => Self::database(err),
        }
    }
}

impl From<ValidationErrors> for ApiError {
    fn from(errors: ValidationErrors) -> Self {
        Self::ValidationFailed { errors }
    }
}

impl From<ValidationError> for ApiError {
    fn from(error: ValidationError) -> Self {
        ValidationErrors::from(error).into()
    }
}
