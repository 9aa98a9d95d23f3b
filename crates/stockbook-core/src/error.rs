//! # Error Types
//!
//! Domain-specific error types for stockbook-core.
//!
//! ## Error Hierarchy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                         Error Types                                     │
//! │                                                                         │
//! │  stockbook-core errors (this file)                                     │
//! │  ├── CoreError        - Business rule failures (4xx-equivalent)        │
//! │  └── ValidationError  - Malformed or missing input                     │
//! │                                                                         │
//! │  stockbook-db errors (separate crate)                                  │
//! │  └── DbError          - Storage failures (5xx-equivalent)              │
//! │                                                                         │
//! │  stockbook-settlement                                                  │
//! │  └── EngineError      - What callers see, with an ErrorCode            │
//! │                                                                         │
//! │  Flow: ValidationError → CoreError ─┬─► EngineError → Caller           │
//! │                          DbError ───┘                                   │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Every variant here aborts the whole unit of work it occurs in.

use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use ts_rs::TS;

use crate::quantity::Quantity;
use crate::types::ItemKind;

// =============================================================================
// Stock Shortfall
// =============================================================================

/// One item that cannot cover the requested quantity.
///
/// A failed multi-line sale reports every shortfall at once so the caller
/// can show a single consolidated message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct StockShortfall {
    pub item_kind: ItemKind,
    pub item_id: String,
    pub available: Quantity,
    pub requested: Quantity,
}

impl fmt::Display for StockShortfall {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} {} (available {}, requested {})",
            self.item_kind, self.item_id, self.available, self.requested
        )
    }
}

fn join_shortfalls(shortfalls: &[StockShortfall]) -> String {
    shortfalls
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}

// =============================================================================
// Core Error
// =============================================================================

/// Business rule violations.
#[derive(Debug, Error)]
pub enum CoreError {
    /// A referenced customer, supplier, item, obligation or line does not exist.
    #[error("{entity} not found: {id}")]
    NotFound { entity: String, id: String },

    /// One or more items cannot cover the requested quantity.
    ///
    /// ## User Workflow
    /// ```text
    /// Sale: A×2, B×3
    ///      │
    ///      ▼
    /// Pre-flight: A ok (5), B short (1)
    ///      │
    ///      ▼
    /// InsufficientStock { shortfalls: [B] }   ← nothing was mutated
    /// ```
    #[error("Insufficient stock: {}", join_shortfalls(.shortfalls))]
    InsufficientStock { shortfalls: Vec<StockShortfall> },

    /// The caller's role does not grant the operation.
    #[error("{actor_id} ({role}) is not permitted to {operation}")]
    InsufficientPermission {
        actor_id: String,
        role: String,
        operation: String,
    },

    /// The request is well-formed but conflicts with recorded state
    /// (e.g. lowering a total below what was already paid).
    #[error("Invalid state: {reason}")]
    InvalidState { reason: String },

    /// An optimistic check failed: the stored value changed underneath us.
    #[error("{entity} {id} was modified concurrently")]
    ConcurrentModification { entity: String, id: String },

    /// Validation error (wraps ValidationError).
    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),
}

impl CoreError {
    /// Creates a NotFound error for a given entity type and ID.
    pub fn not_found(entity: impl Into<String>, id: impl Into<String>) -> Self {
        CoreError::NotFound {
            entity: entity.into(),
            id: id.into(),
        }
    }

    /// Creates an InvalidState error.
    pub fn invalid_state(reason: impl Into<String>) -> Self {
        CoreError::InvalidState {
            reason: reason.into(),
        }
    }

    /// Creates an InsufficientStock error for a single item.
    pub fn insufficient_stock(
        item_kind: ItemKind,
        item_id: impl Into<String>,
        available: Quantity,
        requested: Quantity,
    ) -> Self {
        CoreError::InsufficientStock {
            shortfalls: vec![StockShortfall {
                item_kind,
                item_id: item_id.into(),
                available,
                requested,
            }],
        }
    }

    /// Creates a ConcurrentModification error.
    pub fn concurrent(entity: impl Into<String>, id: impl Into<String>) -> Self {
        CoreError::ConcurrentModification {
            entity: entity.into(),
            id: id.into(),
        }
    }
}

// =============================================================================
// Validation Error
// =============================================================================

/// Input validation errors.
///
/// Raised before any mutation is attempted.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    /// A required field is missing or empty.
    #[error("{field} is required")]
    Required { field: String },

    /// Field value is too long.
    #[error("{field} must be at most {max} characters")]
    TooLong { field: String, max: usize },

    /// Numeric value is out of range.
    #[error("{field} must be between {min} and {max}")]
    OutOfRange { field: String, min: i64, max: i64 },

    /// Value must be positive.
    #[error("{field} must be positive")]
    MustBePositive { field: String },

    /// Value must not be negative.
    #[error("{field} must not be negative")]
    MustNotBeNegative { field: String },

    /// Invalid format (e.g., invalid UUID, unparsable quantity).
    #[error("{field} has invalid format: {reason}")]
    InvalidFormat { field: String, reason: String },

    /// Two fields contradict each other (e.g. paid more than the total).
    #[error("{field} {reason}")]
    Inconsistent { field: String, reason: String },
}

// =============================================================================
// Result Type Alias
// =============================================================================

/// Convenience type alias for Results with CoreError.
pub type CoreResult<T> = Result<T, CoreError>;

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_insufficient_stock_names_every_item() {
        let err = CoreError::InsufficientStock {
            shortfalls: vec![
                StockShortfall {
                    item_kind: ItemKind::Product,
                    item_id: "A".to_string(),
                    available: Quantity::from_units(1),
                    requested: Quantity::from_units(2),
                },
                StockShortfall {
                    item_kind: ItemKind::Product,
                    item_id: "B".to_string(),
                    available: Quantity::from_units(1),
                    requested: Quantity::from_units(3),
                },
            ],
        };
        assert_eq!(
            err.to_string(),
            "Insufficient stock: product A (available 1, requested 2); \
             product B (available 1, requested 3)"
        );
    }

    #[test]
    fn test_validation_error_messages() {
        let err = ValidationError::Required {
            field: "reason".to_string(),
        };
        assert_eq!(err.to_string(), "reason is required");

        let err = ValidationError::MustBePositive {
            field: "quantity".to_string(),
        };
        assert_eq!(err.to_string(), "quantity must be positive");
    }

    #[test]
    fn test_validation_converts_to_core_error() {
        let validation_err = ValidationError::Required {
            field: "customer_id".to_string(),
        };
        let core_err: CoreError = validation_err.into();
        assert!(matches!(core_err, CoreError::Validation(_)));
    }
}
