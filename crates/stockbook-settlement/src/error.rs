//! # Engine Error Type
//!
//! What callers of the settlement engine see when an operation fails.
//!
//! ## Error Handling Strategy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                    Error Flow in Stockbook                              │
//! │                                                                         │
//! │  engine.create_sale(actor, request)                                    │
//! │         │                                                               │
//! │         ▼                                                               │
//! │  ┌──────────────────────────────────────────────────────────────────┐  │
//! │  │  Validation? ── ValidationError ──┐                              │  │
//! │  │  Business rule? ── CoreError ─────┼──► EngineError::Domain       │  │
//! │  │  SQLite? ── DbError ──────────────┴──► EngineError::Storage      │  │
//! │  │                                                                  │  │
//! │  │  Any error ⇒ the write transaction is dropped ⇒ rollback         │  │
//! │  └──────────────────────────────────────────────────────────────────┘  │
//! │         │                                                               │
//! │         ▼                                                               │
//! │  err.code()            INSUFFICIENT_STOCK, NOT_FOUND, ...              │
//! │  err.is_client_error() 4xx-like vs 5xx-like                            │
//! │  err.report()          { code, message } safe to show a user           │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Nothing is retried. Infrastructure failures are logged once, when the
//! report is built, and surfaced with a generic message.

use serde::Serialize;
use thiserror::Error;
use ts_rs::TS;

use stockbook_core::{CoreError, StockShortfall, ValidationError};
use stockbook_db::DbError;

// =============================================================================
// Engine Error
// =============================================================================

/// Error returned by every engine operation.
#[derive(Debug, Error)]
pub enum EngineError {
    /// A business rule rejected the request.
    #[error(transparent)]
    Domain(#[from] CoreError),

    /// The database failed.
    #[error(transparent)]
    Storage(#[from] DbError),

    /// The engine could not be configured at startup.
    #[error(transparent)]
    Config(#[from] ConfigError),
}

impl From<ValidationError> for EngineError {
    fn from(err: ValidationError) -> Self {
        EngineError::Domain(CoreError::Validation(err))
    }
}

impl From<sqlx::Error> for EngineError {
    fn from(err: sqlx::Error) -> Self {
        EngineError::Storage(DbError::from(err))
    }
}

/// Result type for engine operations.
pub type EngineResult<T> = Result<T, EngineError>;

/// Machine-readable error codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, TS)]
#[ts(export)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorCode {
    /// Input validation failed (400)
    ValidationError,

    /// Referenced record does not exist (404)
    NotFound,

    /// Not enough stock for one or more items (409)
    InsufficientStock,

    /// Caller's role does not allow the operation (403)
    InsufficientPermission,

    /// Request conflicts with recorded state (422)
    InvalidState,

    /// Stock moved underneath the operation (409)
    ConcurrentModification,

    /// Duplicate or dangling reference rejected by the schema (409)
    Conflict,

    /// Database failure (500/503)
    DatabaseError,

    /// Engine configuration is unusable (500)
    ConfigurationError,
}

impl EngineError {
    pub fn code(&self) -> ErrorCode {
        match self {
            EngineError::Domain(err) => match err {
                CoreError::NotFound { .. } => ErrorCode::NotFound,
                CoreError::InsufficientStock { .. } => ErrorCode::InsufficientStock,
                CoreError::InsufficientPermission { .. } => ErrorCode::InsufficientPermission,
                CoreError::InvalidState { .. } => ErrorCode::InvalidState,
                CoreError::ConcurrentModification { .. } => ErrorCode::ConcurrentModification,
                CoreError::Validation(_) => ErrorCode::ValidationError,
            },
            EngineError::Storage(err) => match err {
                DbError::NotFound { .. } => ErrorCode::NotFound,
                DbError::UniqueViolation { .. }
                | DbError::ForeignKeyViolation { .. }
                | DbError::CheckViolation { .. } => ErrorCode::Conflict,
                _ => ErrorCode::DatabaseError,
            },
            EngineError::Config(_) => ErrorCode::ConfigurationError,
        }
    }

    /// True for failures the caller can fix by changing the request.
    pub fn is_client_error(&self) -> bool {
        !matches!(
            self.code(),
            ErrorCode::DatabaseError | ErrorCode::ConfigurationError
        )
    }

    /// Items that blocked a sale, if this is a stock failure.
    pub fn shortfalls(&self) -> &[StockShortfall] {
        match self {
            EngineError::Domain(CoreError::InsufficientStock { shortfalls }) => shortfalls,
            _ => &[],
        }
    }

    /// Builds the caller-facing report. Infrastructure details are logged
    /// here and replaced with a generic message.
    pub fn report(&self) -> ErrorReport {
        let code = self.code();
        let message = match self {
            EngineError::Domain(err) => err.to_string(),
            EngineError::Storage(DbError::NotFound { entity, id }) => {
                format!("{} not found: {}", entity, id)
            }
            EngineError::Storage(DbError::UniqueViolation { field, .. }) => {
                format!("{} already exists", field)
            }
            EngineError::Storage(DbError::ForeignKeyViolation { message }) => {
                tracing::warn!("Foreign key violation: {}", message);
                "Invalid reference".to_string()
            }
            EngineError::Storage(DbError::CheckViolation { message }) => {
                tracing::error!("Check constraint violation: {}", message);
                "Request violates a stored invariant".to_string()
            }
            EngineError::Storage(DbError::Busy) => {
                tracing::warn!("Database busy timeout elapsed");
                "Database is busy, try again".to_string()
            }
            EngineError::Storage(err) => {
                tracing::error!("Database error: {}", err);
                "Database operation failed".to_string()
            }
            EngineError::Config(err) => {
                tracing::error!("Configuration error: {}", err);
                "Engine is misconfigured".to_string()
            }
        };

        ErrorReport { code, message }
    }
}

/// Serializable error payload for callers.
///
/// ```json
/// { "code": "INSUFFICIENT_STOCK", "message": "Insufficient stock: product B (available 1, requested 3)" }
/// ```
#[derive(Debug, Clone, Serialize, TS)]
#[ts(export)]
#[serde(rename_all = "camelCase")]
pub struct ErrorReport {
    pub code: ErrorCode,
    pub message: String,
}

impl std::fmt::Display for ErrorReport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "[{:?}] {}", self.code, self.message)
    }
}

// =============================================================================
// Config Error
// =============================================================================

/// Errors while loading or saving [`EngineConfig`](crate::config::EngineConfig).
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to load config: {0}")]
    LoadFailed(String),

    #[error("Failed to save config: {0}")]
    SaveFailed(String),

    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

impl From<std::io::Error> for ConfigError {
    fn from(err: std::io::Error) -> Self {
        ConfigError::LoadFailed(err.to_string())
    }
}

impl From<toml::de::Error> for ConfigError {
    fn from(err: toml::de::Error) -> Self {
        ConfigError::LoadFailed(err.to_string())
    }
}

impl From<toml::ser::Error> for ConfigError {
    fn from(err: toml::ser::Error) -> Self {
        ConfigError::SaveFailed(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use stockbook_core::{ItemKind, Quantity};

    #[test]
    fn test_codes_and_client_classification() {
        let err: EngineError = CoreError::insufficient_stock(
            ItemKind::Product,
            "B",
            Quantity::from_units(1),
            Quantity::from_units(3),
        )
        .into();
        assert_eq!(err.code(), ErrorCode::InsufficientStock);
        assert!(err.is_client_error());
        assert_eq!(err.shortfalls().len(), 1);

        let err: EngineError = DbError::QueryFailed("disk I/O error".into()).into();
        assert_eq!(err.code(), ErrorCode::DatabaseError);
        assert!(!err.is_client_error());
    }

    #[test]
    fn test_report_hides_infrastructure_detail() {
        let err: EngineError = DbError::Internal("SQLITE_IOERR at page 42".into()).into();
        let report = err.report();
        assert_eq!(report.message, "Database operation failed");

        let json = serde_json::to_string(&report).unwrap();
        assert!(json.contains("\"DATABASE_ERROR\""));
    }

    #[test]
    fn test_validation_converts() {
        let err: EngineError = ValidationError::Required {
            field: "reason".into(),
        }
        .into();
        assert_eq!(err.code(), ErrorCode::ValidationError);
        assert_eq!(err.report().message, "Validation error: reason is required");
    }
}
