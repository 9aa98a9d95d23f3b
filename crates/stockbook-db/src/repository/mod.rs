//! # Repository Module
//!
//! SQL for every Stockbook table, one repository per aggregate.
//!
//! ## Connection-Scoped Repositories
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  Repositories borrow a connection instead of owning the pool, so the   │
//! │  same repository code runs inside a write transaction or on a plain    │
//! │  pooled connection:                                                    │
//! │                                                                         │
//! │  let mut tx = db.begin_write().await?;                                 │
//! │  StockRepository::new(&mut tx).compare_and_set(...)   ─┐               │
//! │  LedgerRepository::new(&mut tx).insert(&entry)         ├─ one unit     │
//! │  SaleRepository::new(&mut tx).update_totals(&sale)    ─┘               │
//! │  tx.commit().await?;                                                   │
//! │                                                                         │
//! │  let mut conn = db.acquire().await?;                                   │
//! │  SaleRepository::new(&mut conn).get("sale-id")        read-only        │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! All queries are runtime-checked (`query_as::<_, T>`) and map rows with
//! `FromRow` derives from stockbook-core.
//!
//! ## Available Repositories
//!
//! - [`CustomerRepository`], [`SupplierRepository`] - parties, store credit
//! - [`ProductRepository`], [`MaterialRepository`] - catalog
//! - [`StockRepository`] - current stock levels (compare-and-set updates)
//! - [`LedgerRepository`] - append-only inventory ledger
//! - [`SaleRepository`], [`PurchaseRepository`] - obligations
//! - [`PaymentRepository`] - append-only payment records
//! - [`ReplacementRepository`] - replacement records
//! - [`SequenceRepository`] - daily code counters

pub mod catalog;
pub mod ledger;
pub mod party;
pub mod payment;
pub mod purchase;
pub mod replacement;
pub mod sale;
pub mod sequence;
pub mod stock;

pub use catalog::{MaterialRepository, ProductRepository};
pub use ledger::LedgerRepository;
pub use party::{CustomerRepository, SupplierRepository};
pub use payment::PaymentRepository;
pub use purchase::PurchaseRepository;
pub use replacement::ReplacementRepository;
pub use sale::SaleRepository;
pub use sequence::SequenceRepository;
pub use stock::StockRepository;

/// Generates a new record id.
pub fn new_id() -> String {
    uuid::Uuid::new_v4().to_string()
}
