//! Purchase creation: one material from one supplier, stock in, optional
//! initial payment. Suppliers hold no credit, so paying more than the total
//! is rejected up front.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::info;
use ts_rs::TS;

use stockbook_core::validation::{
    validate_id, validate_non_negative, validate_notes, validate_purchase_amounts,
    validate_quantity,
};
use stockbook_core::{
    Actor, ItemKind, Money, ObligationKind, ObligationTotals, Operation, PaymentMode, Purchase,
    Quantity, ReferenceKind, TransactionKind,
};
use stockbook_db::{new_id, MaterialRepository, PurchaseRepository, SupplierRepository};

use crate::engine::SettlementEngine;
use crate::error::EngineResult;
use crate::ledger::{InventoryLedger, Posting};
use crate::operations::{missing, next_code, write_payment};
use crate::stock::StockStore;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct CreatePurchaseRequest {
    pub supplier_id: String,
    pub material_id: String,
    pub quantity: Quantity,
    pub total: Money,
    #[serde(default)]
    pub amount_paid: Money,
    #[ts(as = "String")]
    pub occurred_at: DateTime<Utc>,
    pub payment_mode: PaymentMode,
    #[serde(default)]
    pub notes: Option<String>,
}

impl CreatePurchaseRequest {
    fn validate(&self) -> EngineResult<()> {
        validate_id("supplier_id", &self.supplier_id)?;
        validate_id("material_id", &self.material_id)?;
        validate_quantity(self.quantity)?;
        validate_non_negative("total", self.total)?;
        validate_non_negative("amount_paid", self.amount_paid)?;
        validate_purchase_amounts(self.total, self.amount_paid)?;
        validate_notes(self.notes.as_deref())?;
        Ok(())
    }
}

impl SettlementEngine {
    pub async fn create_purchase(
        &self,
        actor: &Actor,
        request: CreatePurchaseRequest,
    ) -> EngineResult<Purchase> {
        self.authorize(actor, Operation::CreatePurchase)?;
        request.validate()?;

        let mut tx = self.db.begin_write().await?;

        SupplierRepository::new(&mut tx)
            .get(&request.supplier_id)
            .await?
            .ok_or_else(|| missing("Supplier", &request.supplier_id))?;
        MaterialRepository::new(&mut tx)
            .get(&request.material_id)
            .await?
            .ok_or_else(|| missing("Material", &request.material_id))?;

        let totals = ObligationTotals::new(request.total, request.amount_paid);
        let now = Utc::now();
        let code = next_code(&mut tx, &self.config.codes.purchase).await?;
        let purchase = Purchase {
            id: new_id(),
            code,
            supplier_id: request.supplier_id.clone(),
            material_id: request.material_id.clone(),
            quantity: request.quantity,
            total: totals.total,
            amount_paid: totals.amount_paid,
            balance: totals.balance,
            status: totals.status,
            payment_mode: request.payment_mode,
            occurred_at: request.occurred_at,
            created_by: actor.actor_id.clone(),
            created_at: now,
            updated_at: now,
        };
        PurchaseRepository::new(&mut tx).insert(&purchase).await?;

        write_payment(
            &mut tx,
            ObligationKind::Purchase,
            &purchase.id,
            purchase.amount_paid,
            request.occurred_at,
            request.payment_mode,
            request.notes.clone(),
        )
        .await?;

        let stock = StockStore::new(&mut tx)
            .get_or_init(ItemKind::Material, &purchase.material_id, &self.stock_defaults)
            .await?;
        InventoryLedger::new(&mut tx)
            .record(
                &stock.id,
                Posting {
                    transaction_kind: TransactionKind::Purchase,
                    quantity_change: purchase.quantity,
                    reference_id: &purchase.id,
                    reference_kind: ReferenceKind::Purchase,
                    notes: Some(&purchase.code),
                    actor_id: Some(&actor.actor_id),
                },
            )
            .await?;

        tx.commit().await?;

        info!(
            purchase_id = %purchase.id,
            code = %purchase.code,
            supplier_id = %purchase.supplier_id,
            material_id = %purchase.material_id,
            quantity = %purchase.quantity,
            total = purchase.total.cents(),
            status = %purchase.status,
            "Purchase created"
        );

        Ok(purchase)
    }
}
