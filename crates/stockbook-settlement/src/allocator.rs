//! # Payment Allocator
//!
//! Routes money a sale could not absorb.
//!
//! ## Allocation Pass
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  excess = 150, triggering sale S3                                       │
//! │                                                                         │
//! │  open sales for the customer, oldest supply date first (S3 excluded):   │
//! │     S1 balance 60  ──► pay 60   (paid)     remaining 90                 │
//! │     S2 balance 50  ──► pay 50   (paid)     remaining 40                 │
//! │                                                                         │
//! │  remaining 40 ──► customers.credit_balance += 40                        │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! The open set is read once, inside the caller's write transaction, so it
//! is exactly the obligations that existed when the pass started.

use chrono::{DateTime, Utc};
use sqlx::SqliteConnection;
use tracing::{debug, info};

use stockbook_core::settlement::{plan_allocation, AllocationPlan, OutstandingBalance};
use stockbook_core::{
    CoreError, Money, Obligation, ObligationKind, PaymentMode, PaymentRecord, Sale,
    ValidationError, MAX_MONEY,
};
use stockbook_db::{new_id, CustomerRepository, PaymentRepository, SaleRepository};

use crate::error::EngineResult;

/// Allocator bound to one connection (always a write transaction).
#[derive(Debug)]
pub struct PaymentAllocator<'c> {
    conn: &'c mut SqliteConnection,
}

impl<'c> PaymentAllocator<'c> {
    pub fn new(conn: &'c mut SqliteConnection) -> Self {
        PaymentAllocator { conn }
    }

    /// Spreads `excess` from `trigger` over the customer's other open sales
    /// and credits whatever is left.
    pub async fn allocate(
        &mut self,
        trigger: &Sale,
        excess: Money,
        payment_date: DateTime<Utc>,
        payment_mode: PaymentMode,
    ) -> EngineResult<AllocationPlan> {
        if !excess.is_positive() {
            return Ok(AllocationPlan::default());
        }

        let open = SaleRepository::new(&mut *self.conn)
            .open_for_customer(&trigger.customer_id, Some(&trigger.id))
            .await?;

        let outstanding: Vec<OutstandingBalance> = open
            .iter()
            .map(|sale| OutstandingBalance {
                obligation_id: sale.id.clone(),
                balance: sale.balance,
            })
            .collect();
        let plan = plan_allocation(excess, &outstanding);

        let note = format!("Auto-allocated from excess on sale {}", trigger.code);
        for allocation in &plan.allocations {
            let Some(mut sale) = open.iter().find(|s| s.id == allocation.obligation_id).cloned() else {
                continue;
            };

            let (totals, applied, _) = sale.totals().apply_payment(allocation.amount);
            sale.apply_totals(&totals);
            SaleRepository::new(&mut *self.conn).update_totals(&sale).await?;

            PaymentRepository::new(&mut *self.conn)
                .insert(&PaymentRecord {
                    id: new_id(),
                    obligation_kind: ObligationKind::Sale,
                    obligation_id: sale.id.clone(),
                    amount: applied,
                    payment_date,
                    payment_mode,
                    notes: Some(note.clone()),
                    created_at: Utc::now(),
                })
                .await?;

            debug!(
                sale_id = %sale.id,
                applied = applied.cents(),
                status = %sale.status,
                "Excess allocated to open sale"
            );
        }

        if plan.credit_added.is_positive() {
            let mut customers = CustomerRepository::new(&mut *self.conn);
            let Some(balance) = customers
                .adjust_credit(&trigger.customer_id, plan.credit_added)
                .await?
            else {
                if customers.get(&trigger.customer_id).await?.is_none() {
                    return Err(CoreError::not_found("Customer", &trigger.customer_id).into());
                }
                return Err(ValidationError::OutOfRange {
                    field: "credit_balance".to_string(),
                    min: 0,
                    max: MAX_MONEY.cents(),
                }
                .into());
            };

            debug!(
                customer_id = %trigger.customer_id,
                added = plan.credit_added.cents(),
                balance = balance.cents(),
                "Excess added to store credit"
            );
        }

        info!(
            customer_id = %trigger.customer_id,
            trigger = %trigger.code,
            excess = excess.cents(),
            allocated = plan.allocated().cents(),
            credit_added = plan.credit_added.cents(),
            "Excess payment allocated"
        );

        Ok(plan)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;
    use stockbook_core::{Customer, ObligationStatus, ObligationTotals};
    use stockbook_db::{Database, DbConfig};

    use crate::error::ErrorCode;

    fn sale(id: &str, total: i64, paid: i64, occurred_at: DateTime<Utc>) -> Sale {
        let totals = ObligationTotals::new(Money::from_cents(total), Money::from_cents(paid));
        Sale {
            id: id.into(),
            code: format!("SAL-{}", id),
            customer_id: "c1".into(),
            total: totals.total,
            amount_paid: totals.amount_paid,
            balance: totals.balance,
            status: totals.status,
            payment_mode: PaymentMode::Cash,
            occurred_at,
            created_by: "u1".into(),
            created_at: Utc::now(),
            updated_at: Utc::now(),
            items: Vec::new(),
        }
    }

    #[tokio::test]
    async fn test_oldest_first_then_credit() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let mut conn = db.acquire().await.unwrap();
        let now = Utc::now();

        CustomerRepository::new(&mut conn)
            .insert(&Customer {
                id: "c1".into(),
                name: "Ayesha".into(),
                phone: None,
                credit_balance: Money::zero(),
                created_at: now,
                updated_at: now,
            })
            .await
            .unwrap();

        // Inserted newest first so ordering must come from occurred_at
        let s2 = sale("s2", 5_000, 0, now - Duration::days(1));
        let s1 = sale("s1", 6_000, 0, now - Duration::days(2));
        let trigger = sale("s3", 1_000, 1_000, now);
        for s in [&s2, &s1, &trigger] {
            SaleRepository::new(&mut conn).insert(s).await.unwrap();
        }

        let plan = PaymentAllocator::new(&mut conn)
            .allocate(&trigger, Money::from_cents(15_000), now, PaymentMode::Cash)
            .await
            .unwrap();

        assert_eq!(plan.allocations.len(), 2);
        assert_eq!(plan.allocations[0].obligation_id, "s1");
        assert_eq!(plan.credit_added, Money::from_cents(4_000));

        let mut sales = SaleRepository::new(&mut conn);
        let s1 = sales.get("s1").await.unwrap().unwrap();
        let s2 = sales.get("s2").await.unwrap().unwrap();
        assert_eq!(s1.status, ObligationStatus::Paid);
        assert_eq!(s2.status, ObligationStatus::Paid);
        assert_eq!(s2.balance, Money::zero());

        let customer = CustomerRepository::new(&mut conn).get("c1").await.unwrap().unwrap();
        assert_eq!(customer.credit_balance, Money::from_cents(4_000));

        let payments = PaymentRepository::new(&mut conn)
            .list_for(ObligationKind::Sale, "s1")
            .await
            .unwrap();
        assert_eq!(payments.len(), 1);
        assert_eq!(payments[0].amount, Money::from_cents(6_000));
        assert!(payments[0].notes.as_deref().unwrap_or_default().contains("SAL-s3"));
    }

    #[tokio::test]
    async fn test_zero_excess_is_a_no_op() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let mut conn = db.acquire().await.unwrap();
        let trigger = sale("s1", 1_000, 1_000, Utc::now());

        let plan = PaymentAllocator::new(&mut conn)
            .allocate(&trigger, Money::zero(), Utc::now(), PaymentMode::Cash)
            .await
            .unwrap();
        assert_eq!(plan, AllocationPlan::default());
    }

    #[tokio::test]
    async fn test_credit_above_max_money_rejected() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let mut conn = db.acquire().await.unwrap();
        let now = Utc::now();

        CustomerRepository::new(&mut conn)
            .insert(&Customer {
                id: "c1".into(),
                name: "Ayesha".into(),
                phone: None,
                credit_balance: Money::from_cents(MAX_MONEY.cents() - 10),
                created_at: now,
                updated_at: now,
            })
            .await
            .unwrap();
        let trigger = sale("s1", 1_000, 1_000, now);

        let err = PaymentAllocator::new(&mut conn)
            .allocate(&trigger, Money::from_cents(100), now, PaymentMode::Cash)
            .await
            .unwrap_err();
        assert_eq!(err.code(), ErrorCode::ValidationError);

        let orphan = Sale {
            customer_id: "ghost".into(),
            ..sale("s2", 1_000, 1_000, now)
        };
        let err = PaymentAllocator::new(&mut conn)
            .allocate(&orphan, Money::from_cents(100), now, PaymentMode::Cash)
            .await
            .unwrap_err();
        assert_eq!(err.code(), ErrorCode::NotFound);
    }
}
