//! # stockbook-settlement: Settlement Engine for Stockbook
//!
//! The transaction boundary. Each public operation on [`SettlementEngine`]
//! takes an [`Actor`](stockbook_core::Actor) and a request, and either
//! commits every effect (stock, ledger entries, obligation totals, payment
//! records, store credit) or none of them.
//!
//! ## Data Flow
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                     create_sale(actor, request)                         │
//! │                                                                         │
//! │  authorize ──► validate ──► BEGIN IMMEDIATE                            │
//! │                                  │                                      │
//! │                                  ▼                                      │
//! │        StockStore::check_availability (all lines, all shortfalls)      │
//! │                                  │                                      │
//! │                                  ▼                                      │
//! │        plan_sale_payment ──► credit debit ──► sale + payment rows      │
//! │                                  │                                      │
//! │                                  ▼                                      │
//! │        InventoryLedger::record (one entry per line, CAS on stock)      │
//! │                                  │                                      │
//! │                                  ▼                                      │
//! │        PaymentAllocator::allocate (excess ─► oldest open sales ─►      │
//! │                                    store credit)                        │
//! │                                  │                                      │
//! │                                  ▼                                      │
//! │                               COMMIT                                    │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Modules
//!
//! - [`engine`] - `SettlementEngine`, the handle callers hold
//! - [`operations`] - One file per workflow
//! - [`stock`] - Stock rows and guarded quantity changes
//! - [`ledger`] - Append-only inventory ledger and chain verification
//! - [`allocator`] - Routing overpayments across open sales
//! - [`config`] - TOML configuration with env overrides
//! - [`error`] - `EngineError`, stable error codes and caller-safe reports
//! - [`telemetry`] - Tracing subscriber setup
//!
//! ## Usage
//!
//! ```rust,ignore
//! use stockbook_settlement::{init_tracing, EngineConfig, SettlementEngine};
//!
//! init_tracing();
//! let engine = SettlementEngine::open(EngineConfig::load_or_default(None)).await?;
//! let outcome = engine.create_sale(&actor, request).await?;
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod allocator;
pub mod config;
pub mod engine;
pub mod error;
pub mod ledger;
pub mod operations;
pub mod stock;
pub mod telemetry;

// =============================================================================
// Re-exports
// =============================================================================

pub use allocator::PaymentAllocator;
pub use config::{CodeSettings, DatabaseSettings, EngineConfig, StockSettings};
pub use engine::SettlementEngine;
pub use error::{ConfigError, EngineError, EngineResult, ErrorCode, ErrorReport};
pub use ledger::{ChainBreak, ChainReport, InventoryLedger, Posting};
pub use operations::{
    AdjustStockRequest, CorrectPurchaseRequest, CorrectSaleRequest, CreatePurchaseRequest,
    CreateSaleRequest, NewCustomer, NewMaterial, NewProduct, NewSupplier, ObligationRecord,
    PaymentOutcome, ReceiveGoodsRequest, ReconciliationReport, RecordPaymentRequest,
    RecordReplacementRequest, SaleLineCorrection, SaleLineInput, SaleOutcome,
};
pub use stock::StockStore;
pub use telemetry::init_tracing;
