//! # Engine Operations
//!
//! One file per workflow, each adding methods to
//! [`SettlementEngine`](crate::engine::SettlementEngine).
//!
//! | File | Operations |
//! |------|------------|
//! | `sale.rs` | `create_sale` |
//! | `purchase.rs` | `create_purchase` |
//! | `payment.rs` | `record_payment` |
//! | `inventory.rs` | `receive_goods`, `adjust_stock` |
//! | `replacement.rs` | `record_replacement` |
//! | `correction.rs` | `correct_sale`, `correct_purchase`, `delete_obligation` |
//! | `query.rs` | reads, chain verification, reconciliation |
//! | `registry.rs` | customers, suppliers, products, materials |

pub mod correction;
pub mod inventory;
pub mod payment;
pub mod purchase;
pub mod query;
pub mod registry;
pub mod replacement;
pub mod sale;

use chrono::{DateTime, Utc};
use sqlx::SqliteConnection;

use stockbook_core::settlement::sequence_code;
use stockbook_core::{CoreError, Money, ObligationKind, PaymentMode, PaymentRecord};
use stockbook_db::{new_id, PaymentRepository, SequenceRepository};

use crate::error::EngineResult;

pub use correction::{CorrectPurchaseRequest, CorrectSaleRequest, SaleLineCorrection};
pub use inventory::{AdjustStockRequest, ReceiveGoodsRequest};
pub use payment::{ObligationRecord, PaymentOutcome, RecordPaymentRequest};
pub use purchase::CreatePurchaseRequest;
pub use query::ReconciliationReport;
pub use registry::{NewCustomer, NewMaterial, NewProduct, NewSupplier};
pub use replacement::RecordReplacementRequest;
pub use sale::{CreateSaleRequest, SaleLineInput, SaleOutcome};

/// Draws the next daily code for `prefix`, e.g. `SAL-20261017-0004`.
pub(crate) async fn next_code(conn: &mut SqliteConnection, prefix: &str) -> EngineResult<String> {
    let day = Utc::now().date_naive();
    let value = SequenceRepository::new(conn).next(prefix, day).await?;
    Ok(sequence_code(prefix, day, value))
}

/// Appends a payment record; zero amounts are skipped.
pub(crate) async fn write_payment(
    conn: &mut SqliteConnection,
    kind: ObligationKind,
    obligation_id: &str,
    amount: Money,
    payment_date: DateTime<Utc>,
    payment_mode: PaymentMode,
    notes: Option<String>,
) -> EngineResult<Option<PaymentRecord>> {
    if !amount.is_positive() {
        return Ok(None);
    }

    let record = PaymentRecord {
        id: new_id(),
        obligation_kind: kind,
        obligation_id: obligation_id.to_string(),
        amount,
        payment_date,
        payment_mode,
        notes,
        created_at: Utc::now(),
    };
    PaymentRepository::new(conn).insert(&record).await?;

    Ok(Some(record))
}

pub(crate) fn missing(entity: &str, id: &str) -> CoreError {
    CoreError::not_found(entity, id)
}
