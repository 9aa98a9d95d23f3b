//! # stockbook-core: Pure Settlement Logic for Stockbook
//!
//! Everything that decides *what* a sale, purchase or payment does to money
//! and stock lives here, as pure functions with zero I/O.
//!
//! ## Architecture Position
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                        Stockbook Architecture                           │
//! │                                                                         │
//! │  ┌─────────────────────────────────────────────────────────────────┐   │
//! │  │           Callers (HTTP handlers, desktop shell, CLI)           │   │
//! │  └─────────────────────────────┬───────────────────────────────────┘   │
//! │                                │ Actor + request                        │
//! │  ┌─────────────────────────────▼───────────────────────────────────┐   │
//! │  │              stockbook-settlement (transaction boundary)        │   │
//! │  │    create_sale, record_payment, adjust_stock, ...              │   │
//! │  └─────────────────────────────┬───────────────────────────────────┘   │
//! │                                │                                        │
//! │  ┌─────────────────────────────▼───────────────────────────────────┐   │
//! │  │             ★ stockbook-core (THIS CRATE) ★                     │   │
//! │  │                                                                 │   │
//! │  │  ┌─────────┐ ┌──────────┐ ┌────────────┐ ┌──────┐ ┌──────────┐ │   │
//! │  │  │  types  │ │  money   │ │ settlement │ │ auth │ │validation│ │   │
//! │  │  │  Sale   │ │  Money   │ │  status    │ │ Role │ │  rules   │ │   │
//! │  │  │  Ledger │ │ Quantity │ │  allocate  │ │      │ │          │ │   │
//! │  │  └─────────┘ └──────────┘ └────────────┘ └──────┘ └──────────┘ │   │
//! │  │                                                                 │   │
//! │  │   NO I/O • NO DATABASE • NO NETWORK • PURE FUNCTIONS           │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! │                                │                                        │
//! │  ┌─────────────────────────────▼───────────────────────────────────┐   │
//! │  │                stockbook-db (SQLite repositories)               │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Modules
//!
//! - [`types`] - Entities (StockItem, LedgerEntry, Sale, Purchase, ...)
//! - [`money`] - Money in integer cents
//! - [`quantity`] - Quantities in integer thousandths of a unit
//! - [`settlement`] - Status derivation, payment split, allocation plans
//! - [`auth`] - Actor, Role and the permission matrix
//! - [`error`] - Domain error types
//! - [`validation`] - Input validation
//!
//! ## Example Usage
//!
//! ```rust
//! use stockbook_core::money::Money;
//! use stockbook_core::settlement::{plan_sale_payment, CreditRequest};
//! use stockbook_core::types::ObligationStatus;
//!
//! // 200.00 sale paid with 250.00 cash
//! let plan = plan_sale_payment(
//!     Money::from_cents(20_000),
//!     Money::from_cents(25_000),
//!     CreditRequest::default(),
//!     Money::zero(),
//! )
//! .unwrap();
//!
//! assert_eq!(plan.totals.status, ObligationStatus::Paid);
//! assert_eq!(plan.excess.cents(), 5_000);
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod auth;
pub mod error;
pub mod money;
pub mod quantity;
pub mod settlement;
pub mod types;
pub mod validation;

// =============================================================================
// Re-exports for Convenience
// =============================================================================

pub use auth::{Actor, Operation, Role};
pub use error::{CoreError, CoreResult, StockShortfall, ValidationError};
pub use money::Money;
pub use quantity::Quantity;
pub use settlement::{derive_status, ObligationTotals};
pub use types::*;

// =============================================================================
// Crate-Level Constants
// =============================================================================

/// Maximum lines on a single sale.
pub const MAX_SALE_LINES: usize = 100;

/// Largest quantity accepted on a single line or stock movement (1,000,000 units).
///
/// ## Business Reason
/// Catches typos such as 10000 instead of 10.00 before they hit the ledger.
pub const MAX_LINE_QUANTITY: Quantity = Quantity::from_units(1_000_000);

/// Largest amount accepted for any single price, payment, total or credit
/// balance (10 trillion in major units).
///
/// ## Business Reason
/// Sums over a full sale stay far inside `i64`, and SQLite never sees an
/// integer overflow (which it would silently turn into a REAL).
pub const MAX_MONEY: Money = Money::from_cents(1_000_000_000_000_000);

/// Maximum length of an adjustment or replacement reason.
pub const MAX_REASON_LENGTH: usize = 500;

/// Maximum length of free-text notes.
pub const MAX_NOTES_LENGTH: usize = 1000;

/// Maximum length of a record id.
pub const MAX_ID_LENGTH: usize = 64;
