//! # Obligation Corrections
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  Edit                      Effect                                       │
//! │  ─────────────────────     ───────────────────────────────────────────  │
//! │  line / purchase quantity  compensating ledger entry (same kind)        │
//! │  line price / total        total recomputed, must stay ≥ Σ payments     │
//! │  amount paid ↑             corrective PaymentRecord for the difference  │
//! │  amount paid ↓             InvalidState (payments are append-only)      │
//! │  delete                    only without payments; stock reversed        │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Balance and status are always recomputed from total and amount paid.

use chrono::Utc;
use serde::{Deserialize, Serialize};
use tracing::info;
use ts_rs::TS;

use stockbook_core::settlement::{line_total, obligation_total};
use stockbook_core::validation::{
    validate_id, validate_non_negative, validate_price, validate_quantity,
};
use stockbook_core::{
    Actor, CoreError, ItemKind, Money, Obligation, ObligationKind, Operation, Purchase, Quantity,
    ReferenceKind, Sale, TransactionKind,
};
use stockbook_db::{PaymentRepository, PurchaseRepository, ReplacementRepository, SaleRepository};

use crate::engine::SettlementEngine;
use crate::error::{EngineError, EngineResult};
use crate::ledger::{InventoryLedger, Posting};
use crate::operations::{missing, write_payment};
use crate::stock::StockStore;

/// New values for one sale line. `None` keeps the stored value.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct SaleLineCorrection {
    pub line_id: String,
    #[serde(default)]
    pub quantity: Option<Quantity>,
    #[serde(default)]
    pub unit_price: Option<Money>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct CorrectSaleRequest {
    pub sale_id: String,
    #[serde(default)]
    pub lines: Vec<SaleLineCorrection>,
    #[serde(default)]
    pub amount_paid: Option<Money>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct CorrectPurchaseRequest {
    pub purchase_id: String,
    #[serde(default)]
    pub quantity: Option<Quantity>,
    #[serde(default)]
    pub total: Option<Money>,
    #[serde(default)]
    pub amount_paid: Option<Money>,
}

impl SettlementEngine {
    pub async fn correct_sale(&self, actor: &Actor, request: CorrectSaleRequest) -> EngineResult<Sale> {
        self.authorize(actor, Operation::CorrectObligation)?;
        validate_id("sale_id", &request.sale_id)?;
        for line in &request.lines {
            validate_id("line_id", &line.line_id)?;
            if let Some(quantity) = line.quantity {
                validate_quantity(quantity)?;
            }
            if let Some(price) = line.unit_price {
                validate_price(price)?;
            }
        }
        if let Some(paid) = request.amount_paid {
            validate_non_negative("amount_paid", paid)?;
        }

        let mut tx = self.db.begin_write().await?;

        let mut sale = SaleRepository::new(&mut tx)
            .get(&request.sale_id)
            .await?
            .ok_or_else(|| missing("Sale", &request.sale_id))?;
        let notes = format!("Correction of sale {}", sale.code);

        for correction in &request.lines {
            let index = sale
                .items
                .iter()
                .position(|line| line.id == correction.line_id)
                .ok_or_else(|| missing("Sale line", &correction.line_id))?;

            let old_quantity = sale.items[index].quantity;
            let new_quantity = correction.quantity.unwrap_or(old_quantity);
            let new_price = correction.unit_price.unwrap_or(sale.items[index].unit_price);

            let sold_more = new_quantity - old_quantity;
            if !sold_more.is_zero() {
                let stock = StockStore::new(&mut tx)
                    .get_or_init(ItemKind::Product, &sale.items[index].product_id, &self.stock_defaults)
                    .await?;
                InventoryLedger::new(&mut tx)
                    .record(
                        &stock.id,
                        Posting {
                            transaction_kind: TransactionKind::Sale,
                            quantity_change: -sold_more,
                            reference_id: &sale.id,
                            reference_kind: ReferenceKind::Sale,
                            notes: Some(&notes),
                            actor_id: Some(&actor.actor_id),
                        },
                    )
                    .await?;
            }

            let line = &mut sale.items[index];
            line.quantity = new_quantity;
            line.unit_price = new_price;
            line.line_total = line_total(new_price, new_quantity)?;
            SaleRepository::new(&mut tx).update_line(line).await?;
        }

        let new_total = obligation_total(sale.items.iter().map(|line| line.line_total))?;
        let recorded = PaymentRepository::new(&mut tx)
            .sum_for(ObligationKind::Sale, &sale.id)
            .await?;

        let mut totals = sale.totals().revise_total(new_total, recorded)?;
        if let Some(paid) = request.amount_paid {
            let (revised, corrective) = totals.revise_amount_paid(paid, recorded)?;
            write_payment(
                &mut tx,
                ObligationKind::Sale,
                &sale.id,
                corrective,
                Utc::now(),
                sale.payment_mode,
                Some(format!("Corrective payment on sale {}", sale.code)),
            )
            .await?;
            totals = revised;
        }

        sale.apply_totals(&totals);
        SaleRepository::new(&mut tx).update_totals(&sale).await?;

        tx.commit().await?;

        info!(
            sale_id = %sale.id,
            code = %sale.code,
            total = sale.total.cents(),
            paid = sale.amount_paid.cents(),
            status = %sale.status,
            actor_id = %actor.actor_id,
            "Sale corrected"
        );

        Ok(sale)
    }

    pub async fn correct_purchase(
        &self,
        actor: &Actor,
        request: CorrectPurchaseRequest,
    ) -> EngineResult<Purchase> {
        self.authorize(actor, Operation::CorrectObligation)?;
        validate_id("purchase_id", &request.purchase_id)?;
        if let Some(quantity) = request.quantity {
            validate_quantity(quantity)?;
        }
        if let Some(total) = request.total {
            validate_non_negative("total", total)?;
        }
        if let Some(paid) = request.amount_paid {
            validate_non_negative("amount_paid", paid)?;
        }

        let mut tx = self.db.begin_write().await?;

        let mut purchase = PurchaseRepository::new(&mut tx)
            .get(&request.purchase_id)
            .await?
            .ok_or_else(|| missing("Purchase", &request.purchase_id))?;

        if let Some(quantity) = request.quantity {
            let received_more = quantity - purchase.quantity;
            if !received_more.is_zero() {
                let stock = StockStore::new(&mut tx)
                    .get_or_init(ItemKind::Material, &purchase.material_id, &self.stock_defaults)
                    .await?;
                let notes = format!("Correction of purchase {}", purchase.code);
                InventoryLedger::new(&mut tx)
                    .record(
                        &stock.id,
                        Posting {
                            transaction_kind: TransactionKind::Purchase,
                            quantity_change: received_more,
                            reference_id: &purchase.id,
                            reference_kind: ReferenceKind::Purchase,
                            notes: Some(&notes),
                            actor_id: Some(&actor.actor_id),
                        },
                    )
                    .await?;
            }
            purchase.quantity = quantity;
        }

        let recorded = PaymentRepository::new(&mut tx)
            .sum_for(ObligationKind::Purchase, &purchase.id)
            .await?;

        let mut totals = purchase
            .totals()
            .revise_total(request.total.unwrap_or(purchase.total), recorded)?;
        if let Some(paid) = request.amount_paid {
            let (revised, corrective) = totals.revise_amount_paid(paid, recorded)?;
            write_payment(
                &mut tx,
                ObligationKind::Purchase,
                &purchase.id,
                corrective,
                Utc::now(),
                purchase.payment_mode,
                Some(format!("Corrective payment on purchase {}", purchase.code)),
            )
            .await?;
            totals = revised;
        }

        purchase.apply_totals(&totals);
        PurchaseRepository::new(&mut tx).update(&purchase).await?;

        tx.commit().await?;

        info!(
            purchase_id = %purchase.id,
            code = %purchase.code,
            quantity = %purchase.quantity,
            total = purchase.total.cents(),
            status = %purchase.status,
            actor_id = %actor.actor_id,
            "Purchase corrected"
        );

        Ok(purchase)
    }

    /// Deletes an obligation that has no payments, posting reversing ledger
    /// entries for its stock movements.
    pub async fn delete_obligation(
        &self,
        actor: &Actor,
        kind: ObligationKind,
        obligation_id: &str,
    ) -> EngineResult<()> {
        self.authorize(actor, Operation::DeleteObligation)?;
        validate_id("obligation_id", obligation_id)?;

        let mut tx = self.db.begin_write().await?;

        let payments = PaymentRepository::new(&mut tx)
            .count_for(kind, obligation_id)
            .await?;

        match kind {
            ObligationKind::Sale => {
                let sale = SaleRepository::new(&mut tx)
                    .get(obligation_id)
                    .await?
                    .ok_or_else(|| missing("Sale", obligation_id))?;
                if payments > 0 {
                    return Err(has_payments(kind, &sale.code));
                }
                let replacements = ReplacementRepository::new(&mut tx)
                    .list_for_sale(&sale.id)
                    .await?;
                if !replacements.is_empty() {
                    return Err(CoreError::invalid_state(format!(
                        "sale {} has {} replacement(s) and cannot be deleted",
                        sale.code,
                        replacements.len()
                    ))
                    .into());
                }

                let notes = format!("Reversal of deleted sale {}", sale.code);
                for line in &sale.items {
                    let stock = StockStore::new(&mut tx)
                        .get_or_init(ItemKind::Product, &line.product_id, &self.stock_defaults)
                        .await?;
                    InventoryLedger::new(&mut tx)
                        .record(
                            &stock.id,
                            Posting {
                                transaction_kind: TransactionKind::Sale,
                                quantity_change: line.quantity,
                                reference_id: &sale.id,
                                reference_kind: ReferenceKind::Sale,
                                notes: Some(&notes),
                                actor_id: Some(&actor.actor_id),
                            },
                        )
                        .await?;
                }

                SaleRepository::new(&mut tx).delete(&sale.id).await?;
                info!(sale_id = %sale.id, code = %sale.code, actor_id = %actor.actor_id, "Sale deleted");
            }
            ObligationKind::Purchase => {
                let purchase = PurchaseRepository::new(&mut tx)
                    .get(obligation_id)
                    .await?
                    .ok_or_else(|| missing("Purchase", obligation_id))?;
                if payments > 0 {
                    return Err(has_payments(kind, &purchase.code));
                }

                let notes = format!("Reversal of deleted purchase {}", purchase.code);
                let stock = StockStore::new(&mut tx)
                    .get_or_init(ItemKind::Material, &purchase.material_id, &self.stock_defaults)
                    .await?;
                InventoryLedger::new(&mut tx)
                    .record(
                        &stock.id,
                        Posting {
                            transaction_kind: TransactionKind::Purchase,
                            quantity_change: -purchase.quantity,
                            reference_id: &purchase.id,
                            reference_kind: ReferenceKind::Purchase,
                            notes: Some(&notes),
                            actor_id: Some(&actor.actor_id),
                        },
                    )
                    .await?;

                PurchaseRepository::new(&mut tx).delete(&purchase.id).await?;
                info!(
                    purchase_id = %purchase.id,
                    code = %purchase.code,
                    actor_id = %actor.actor_id,
                    "Purchase deleted"
                );
            }
        }

        tx.commit().await?;
        Ok(())
    }
}

fn has_payments(kind: ObligationKind, code: &str) -> EngineError {
    CoreError::invalid_state(format!(
        "{} {} has recorded payments and cannot be deleted",
        kind, code
    ))
    .into()
}
