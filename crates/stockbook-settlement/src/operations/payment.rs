//! # Recording Payments
//!
//! ```text
//! Sale     amount ≤ balance ──► applied
//!          amount > balance ──► balance applied, rest ──► PaymentAllocator
//! Purchase amount ≤ balance ──► applied
//!          amount > balance ──► ValidationError (suppliers hold no credit)
//! ```

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::info;
use ts_rs::TS;

use stockbook_core::settlement::Allocation;
use stockbook_core::validation::{validate_id, validate_notes, validate_payment_amount};
use stockbook_core::{
    Actor, Money, Obligation, ObligationKind, ObligationTotals, Operation, PaymentMode, Purchase,
    Sale, ValidationError,
};
use stockbook_db::{PurchaseRepository, SaleRepository};

use crate::allocator::PaymentAllocator;
use crate::engine::SettlementEngine;
use crate::error::EngineResult;
use crate::operations::{missing, write_payment};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct RecordPaymentRequest {
    pub obligation_kind: ObligationKind,
    pub obligation_id: String,
    pub amount: Money,
    #[ts(as = "String")]
    pub payment_date: DateTime<Utc>,
    pub payment_mode: PaymentMode,
    #[serde(default)]
    pub notes: Option<String>,
}

impl RecordPaymentRequest {
    fn validate(&self) -> EngineResult<()> {
        validate_id("obligation_id", &self.obligation_id)?;
        validate_payment_amount(self.amount)?;
        validate_notes(self.notes.as_deref())?;
        Ok(())
    }
}

/// A sale or a purchase, as returned by operations that accept either.
#[derive(Debug, Clone, Serialize, TS)]
#[ts(export)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ObligationRecord {
    Sale(Sale),
    Purchase(Purchase),
}

impl ObligationRecord {
    pub fn totals(&self) -> ObligationTotals {
        match self {
            ObligationRecord::Sale(sale) => sale.totals(),
            ObligationRecord::Purchase(purchase) => purchase.totals(),
        }
    }

    pub fn id(&self) -> &str {
        match self {
            ObligationRecord::Sale(sale) => &sale.id,
            ObligationRecord::Purchase(purchase) => &purchase.id,
        }
    }
}

#[derive(Debug, Clone, Serialize, TS)]
#[ts(export)]
pub struct PaymentOutcome {
    pub obligation: ObligationRecord,
    /// Portion that landed on the obligation itself.
    pub applied: Money,
    /// Portion routed to the customer's other open sales.
    pub excess_applied: Money,
    pub allocations: Vec<Allocation>,
    pub credit_added: Money,
}

impl SettlementEngine {
    pub async fn record_payment(
        &self,
        actor: &Actor,
        request: RecordPaymentRequest,
    ) -> EngineResult<PaymentOutcome> {
        self.authorize(actor, Operation::RecordPayment)?;
        request.validate()?;

        match request.obligation_kind {
            ObligationKind::Sale => self.pay_sale(request).await,
            ObligationKind::Purchase => self.pay_purchase(request).await,
        }
    }

    async fn pay_sale(&self, request: RecordPaymentRequest) -> EngineResult<PaymentOutcome> {
        let mut tx = self.db.begin_write().await?;

        let mut sale = SaleRepository::new(&mut tx)
            .get(&request.obligation_id)
            .await?
            .ok_or_else(|| missing("Sale", &request.obligation_id))?;

        let (totals, applied, excess) = sale.totals().apply_payment(request.amount);
        if applied.is_positive() {
            sale.apply_totals(&totals);
            SaleRepository::new(&mut tx).update_totals(&sale).await?;
            write_payment(
                &mut tx,
                ObligationKind::Sale,
                &sale.id,
                applied,
                request.payment_date,
                request.payment_mode,
                request.notes.clone(),
            )
            .await?;
        }

        let allocation = PaymentAllocator::new(&mut tx)
            .allocate(&sale, excess, request.payment_date, request.payment_mode)
            .await?;

        tx.commit().await?;

        info!(
            sale_id = %sale.id,
            amount = request.amount.cents(),
            applied = applied.cents(),
            excess = excess.cents(),
            status = %sale.status,
            "Sale payment recorded"
        );

        Ok(PaymentOutcome {
            obligation: ObligationRecord::Sale(sale),
            applied,
            excess_applied: allocation.allocated(),
            allocations: allocation.allocations,
            credit_added: allocation.credit_added,
        })
    }

    async fn pay_purchase(&self, request: RecordPaymentRequest) -> EngineResult<PaymentOutcome> {
        let mut tx = self.db.begin_write().await?;

        let mut purchase = PurchaseRepository::new(&mut tx)
            .get(&request.obligation_id)
            .await?
            .ok_or_else(|| missing("Purchase", &request.obligation_id))?;

        if request.amount > purchase.balance {
            return Err(ValidationError::Inconsistent {
                field: "amount".to_string(),
                reason: format!("exceeds the outstanding balance of {}", purchase.balance),
            }
            .into());
        }

        let (totals, applied, _) = purchase.totals().apply_payment(request.amount);
        purchase.apply_totals(&totals);
        PurchaseRepository::new(&mut tx).update(&purchase).await?;
        write_payment(
            &mut tx,
            ObligationKind::Purchase,
            &purchase.id,
            applied,
            request.payment_date,
            request.payment_mode,
            request.notes.clone(),
        )
        .await?;

        tx.commit().await?;

        info!(
            purchase_id = %purchase.id,
            applied = applied.cents(),
            status = %purchase.status,
            "Purchase payment recorded"
        );

        Ok(PaymentOutcome {
            obligation: ObligationRecord::Purchase(purchase),
            applied,
            excess_applied: Money::zero(),
            allocations: Vec::new(),
            credit_added: Money::zero(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::testing::{cents, engine, owner, stock_product, units};
    use crate::error::ErrorCode;
    use crate::operations::{CreatePurchaseRequest, CreateSaleRequest, SaleLineInput};
    use stockbook_core::settlement::CreditRequest;
    use stockbook_core::{ObligationStatus, Quantity, Role};

    async fn open_sale(engine: &SettlementEngine, price: i64, days_ago: i64) -> Sale {
        engine
            .create_sale(
                &owner(),
                CreateSaleRequest {
                    customer_id: "c1".into(),
                    items: vec![SaleLineInput {
                        product_id: "A".into(),
                        quantity: units(1),
                        unit_price: cents(price),
                    }],
                    occurred_at: Utc::now() - chrono::Duration::days(days_ago),
                    payment_mode: PaymentMode::OnAccount,
                    cash_tendered: Money::zero(),
                    credit: CreditRequest::default(),
                },
            )
            .await
            .unwrap()
            .sale
    }

    fn pay(kind: ObligationKind, id: &str, amount: i64) -> RecordPaymentRequest {
        RecordPaymentRequest {
            obligation_kind: kind,
            obligation_id: id.into(),
            amount: cents(amount),
            payment_date: Utc::now(),
            payment_mode: PaymentMode::Cash,
            notes: None,
        }
    }

    #[tokio::test]
    async fn test_partial_then_full() {
        let engine = engine().await;
        stock_product(&engine, "A", 2).await;
        let sale = open_sale(&engine, 10_000, 0).await;
        assert_eq!(sale.status, ObligationStatus::Pending);

        let outcome = engine
            .record_payment(&owner(), pay(ObligationKind::Sale, &sale.id, 4_000))
            .await
            .unwrap();
        assert_eq!(outcome.obligation.totals().status, ObligationStatus::Partial);
        assert_eq!(outcome.obligation.totals().balance, cents(6_000));

        let outcome = engine
            .record_payment(&owner(), pay(ObligationKind::Sale, &sale.id, 6_000))
            .await
            .unwrap();
        assert_eq!(outcome.obligation.totals().status, ObligationStatus::Paid);
        assert_eq!(outcome.credit_added, Money::zero());

        let report = engine
            .reconcile_obligation(&owner(), ObligationKind::Sale, &sale.id)
            .await
            .unwrap();
        assert_eq!(report.payment_count, 2);
        assert!(report.consistent);
    }

    #[tokio::test]
    async fn test_sale_overpayment_routes_excess() {
        let engine = engine().await;
        stock_product(&engine, "A", 3).await;
        let old = open_sale(&engine, 3_000, 5).await;
        let current = open_sale(&engine, 2_000, 0).await;

        let outcome = engine
            .record_payment(&owner(), pay(ObligationKind::Sale, &current.id, 6_000))
            .await
            .unwrap();
        assert_eq!(outcome.applied, cents(2_000));
        assert_eq!(outcome.excess_applied, cents(3_000));
        assert_eq!(outcome.credit_added, cents(1_000));

        let old = engine.get_sale(&owner(), &old.id).await.unwrap();
        assert_eq!(old.status, ObligationStatus::Paid);
        assert_eq!(engine.customer_credit(&owner(), "c1").await.unwrap(), cents(1_000));
    }

    #[tokio::test]
    async fn test_purchase_payment_bounds() {
        let engine = engine().await;
        let purchase = engine
            .create_purchase(
                &owner(),
                CreatePurchaseRequest {
                    supplier_id: "sup1".into(),
                    material_id: "m1".into(),
                    quantity: Quantity::from_units(10),
                    total: cents(10_000),
                    amount_paid: Money::zero(),
                    occurred_at: Utc::now(),
                    payment_mode: PaymentMode::Cheque,
                    notes: None,
                },
            )
            .await
            .unwrap();

        let err = engine
            .record_payment(&owner(), pay(ObligationKind::Purchase, &purchase.id, 10_001))
            .await
            .unwrap_err();
        assert_eq!(err.code(), ErrorCode::ValidationError);

        let outcome = engine
            .record_payment(&owner(), pay(ObligationKind::Purchase, &purchase.id, 10_000))
            .await
            .unwrap();
        assert_eq!(outcome.obligation.totals().status, ObligationStatus::Paid);
    }

    #[tokio::test]
    async fn test_payment_validation_and_permission() {
        let engine = engine().await;

        let err = engine
            .record_payment(&owner(), pay(ObligationKind::Sale, "s1", 0))
            .await
            .unwrap_err();
        assert_eq!(err.code(), ErrorCode::ValidationError);

        let err = engine
            .record_payment(&owner(), pay(ObligationKind::Sale, "missing", 100))
            .await
            .unwrap_err();
        assert_eq!(err.code(), ErrorCode::NotFound);

        let keeper = Actor::new("k1", Role::Storekeeper);
        let err = engine
            .record_payment(&keeper, pay(ObligationKind::Sale, "s1", 100))
            .await
            .unwrap_err();
        assert_eq!(err.code(), ErrorCode::InsufficientPermission);
    }
}
