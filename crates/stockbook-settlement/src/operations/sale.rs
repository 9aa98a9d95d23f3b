//! # Sale Creation
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                      create_sale (one transaction)                      │
//! │                                                                         │
//! │  1. customer + products exist                                          │
//! │  2. Σ quantity per product ≤ stock      ── InsufficientStock (all)      │
//! │  3. total = Σ quantity × unit_price                                    │
//! │  4. plan: credit first, then cash       ── applied / excess            │
//! │  5. debit credit_used                                                  │
//! │  6. insert sale + payment records (cash, store_credit)                 │
//! │  7. per line: insert line, ledger −quantity                            │
//! │  8. excess > 0 ⇒ PaymentAllocator                                      │
//! │  9. COMMIT                                                              │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};
use ts_rs::TS;

use stockbook_core::settlement::{
    aggregate_demand, line_total, obligation_total, plan_sale_payment, Allocation, CreditRequest,
};
use stockbook_core::validation::{
    validate_id, validate_line_count, validate_non_negative, validate_price, validate_quantity,
};
use stockbook_core::{
    Actor, CoreError, ItemKind, Money, ObligationKind, Operation, PaymentMode, Quantity,
    ReferenceKind, Sale, SaleLine, TransactionKind,
};
use stockbook_db::{new_id, CustomerRepository, ProductRepository, SaleRepository};

use crate::allocator::PaymentAllocator;
use crate::engine::SettlementEngine;
use crate::error::EngineResult;
use crate::ledger::{InventoryLedger, Posting};
use crate::operations::{missing, next_code, write_payment};
use crate::stock::StockStore;

/// One product line of a new sale.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct SaleLineInput {
    pub product_id: String,
    pub quantity: Quantity,
    pub unit_price: Money,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct CreateSaleRequest {
    pub customer_id: String,
    pub items: Vec<SaleLineInput>,
    /// Supply date.
    #[ts(as = "String")]
    pub occurred_at: DateTime<Utc>,
    pub payment_mode: PaymentMode,
    pub cash_tendered: Money,
    #[serde(default)]
    pub credit: CreditRequest,
}

impl CreateSaleRequest {
    fn validate(&self) -> EngineResult<()> {
        validate_id("customer_id", &self.customer_id)?;
        validate_line_count(self.items.len())?;
        for line in &self.items {
            validate_id("product_id", &line.product_id)?;
            validate_quantity(line.quantity)?;
            validate_price(line.unit_price)?;
        }
        validate_non_negative("cash_tendered", self.cash_tendered)?;
        if let Some(cap) = self.credit.cap {
            validate_non_negative("credit_cap", cap)?;
        }
        Ok(())
    }
}

/// What a committed sale did with the money.
#[derive(Debug, Clone, Serialize, TS)]
#[ts(export)]
pub struct SaleOutcome {
    pub sale: Sale,
    pub credit_used: Money,
    /// Excess that went to the customer's older open sales.
    pub excess_applied: Money,
    pub allocations: Vec<Allocation>,
    /// Excess left over after allocation, now store credit.
    pub credit_added: Money,
}

impl SettlementEngine {
    /// Creates a multi-line sale: stock, payments, ledger and excess
    /// allocation in one transaction.
    pub async fn create_sale(&self, actor: &Actor, request: CreateSaleRequest) -> EngineResult<SaleOutcome> {
        self.authorize(actor, Operation::CreateSale)?;
        request.validate()?;

        let mut tx = self.db.begin_write().await?;

        let customer = CustomerRepository::new(&mut tx)
            .get(&request.customer_id)
            .await?
            .ok_or_else(|| missing("Customer", &request.customer_id))?;

        for line in &request.items {
            let product = ProductRepository::new(&mut tx)
                .get(&line.product_id)
                .await?
                .ok_or_else(|| missing("Product", &line.product_id))?;
            if !product.is_active {
                return Err(CoreError::invalid_state(format!(
                    "product {} is inactive",
                    product.id
                ))
                .into());
            }
        }

        // Pre-flight: nothing is written unless every product can be supplied
        let demand = aggregate_demand(
            request
                .items
                .iter()
                .map(|line| (line.product_id.as_str(), line.quantity)),
        );
        if let Err(err) = StockStore::new(&mut tx)
            .check_availability(ItemKind::Product, &demand)
            .await
        {
            warn!(customer_id = %customer.id, shortfalls = err.shortfalls().len(), "Sale rejected");
            return Err(err);
        }

        let line_totals = request
            .items
            .iter()
            .map(|line| line_total(line.unit_price, line.quantity))
            .collect::<Result<Vec<_>, _>>()?;
        let total = obligation_total(line_totals.iter().copied())?;
        let plan = plan_sale_payment(
            total,
            request.cash_tendered,
            request.credit,
            customer.credit_balance,
        )?;

        if plan.credit_used.is_positive() {
            CustomerRepository::new(&mut tx)
                .adjust_credit(&customer.id, Money::zero() - plan.credit_used)
                .await?
                .ok_or_else(|| CoreError::invalid_state("store credit balance changed"))?;
        }

        let now = Utc::now();
        let code = next_code(&mut tx, &self.config.codes.sale).await?;
        let mut sale = Sale {
            id: new_id(),
            code,
            customer_id: customer.id.clone(),
            total: plan.totals.total,
            amount_paid: plan.totals.amount_paid,
            balance: plan.totals.balance,
            status: plan.totals.status,
            payment_mode: request.payment_mode,
            occurred_at: request.occurred_at,
            created_by: actor.actor_id.clone(),
            created_at: now,
            updated_at: now,
            items: Vec::with_capacity(request.items.len()),
        };
        SaleRepository::new(&mut tx).insert(&sale).await?;

        write_payment(
            &mut tx,
            ObligationKind::Sale,
            &sale.id,
            plan.cash_applied,
            request.occurred_at,
            request.payment_mode,
            None,
        )
        .await?;
        write_payment(
            &mut tx,
            ObligationKind::Sale,
            &sale.id,
            plan.credit_used,
            request.occurred_at,
            PaymentMode::StoreCredit,
            Some("Paid from store credit".to_string()),
        )
        .await?;

        for (input, total) in request.items.iter().zip(line_totals) {
            let line = SaleLine {
                id: new_id(),
                sale_id: sale.id.clone(),
                product_id: input.product_id.clone(),
                quantity: input.quantity,
                unit_price: input.unit_price,
                line_total: total,
                created_at: now,
            };
            SaleRepository::new(&mut tx).insert_line(&line).await?;

            let stock = StockStore::new(&mut tx)
                .get_or_init(ItemKind::Product, &line.product_id, &self.stock_defaults)
                .await?;
            InventoryLedger::new(&mut tx)
                .record(
                    &stock.id,
                    Posting {
                        transaction_kind: TransactionKind::Sale,
                        quantity_change: -line.quantity,
                        reference_id: &sale.id,
                        reference_kind: ReferenceKind::Sale,
                        notes: Some(&sale.code),
                        actor_id: Some(&actor.actor_id),
                    },
                )
                .await?;

            sale.items.push(line);
        }

        let allocation = PaymentAllocator::new(&mut tx)
            .allocate(&sale, plan.excess, request.occurred_at, request.payment_mode)
            .await?;

        tx.commit().await?;

        info!(
            sale_id = %sale.id,
            code = %sale.code,
            customer_id = %sale.customer_id,
            lines = sale.items.len(),
            total = sale.total.cents(),
            paid = sale.amount_paid.cents(),
            status = %sale.status,
            credit_used = plan.credit_used.cents(),
            excess = plan.excess.cents(),
            "Sale created"
        );

        Ok(SaleOutcome {
            sale,
            credit_used: plan.credit_used,
            excess_applied: allocation.allocated(),
            allocations: allocation.allocations,
            credit_added: allocation.credit_added,
        })
    }
}
