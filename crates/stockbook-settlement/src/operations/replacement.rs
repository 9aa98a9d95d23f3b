//! Replacing damaged or defective goods from a past sale. Stock leaves
//! again; the sale's money is untouched.

use chrono::Utc;
use serde::{Deserialize, Serialize};
use tracing::info;
use ts_rs::TS;

use stockbook_core::validation::{validate_id, validate_notes, validate_quantity};
use stockbook_core::{
    Actor, CoreError, ItemKind, Operation, Quantity, ReferenceKind, ReplacementReason,
    ReplacementRecord, TransactionKind,
};
use stockbook_db::{new_id, ReplacementRepository, SaleRepository};

use crate::engine::SettlementEngine;
use crate::error::EngineResult;
use crate::ledger::{InventoryLedger, Posting};
use crate::operations::{missing, next_code};
use crate::stock::StockStore;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct RecordReplacementRequest {
    pub sale_id: String,
    pub product_id: String,
    pub quantity: Quantity,
    pub reason: ReplacementReason,
    #[serde(default)]
    pub notes: Option<String>,
}

impl SettlementEngine {
    pub async fn record_replacement(
        &self,
        actor: &Actor,
        request: RecordReplacementRequest,
    ) -> EngineResult<ReplacementRecord> {
        self.authorize(actor, Operation::RecordReplacement)?;
        validate_id("sale_id", &request.sale_id)?;
        validate_id("product_id", &request.product_id)?;
        validate_quantity(request.quantity)?;
        validate_notes(request.notes.as_deref())?;

        let mut tx = self.db.begin_write().await?;

        let sale = SaleRepository::new(&mut tx)
            .get(&request.sale_id)
            .await?
            .ok_or_else(|| missing("Sale", &request.sale_id))?;
        if sale.line_for_product(&request.product_id).is_none() {
            return Err(CoreError::not_found(
                "Sale line",
                format!("{} on sale {}", request.product_id, sale.code),
            )
            .into());
        }

        let stock = StockStore::new(&mut tx)
            .get_or_init(ItemKind::Product, &request.product_id, &self.stock_defaults)
            .await?;

        let id = new_id();
        let code = next_code(&mut tx, &self.config.codes.replacement).await?;
        let notes = request
            .notes
            .clone()
            .unwrap_or_else(|| format!("Replacement for sale {}", sale.code));

        let entry = InventoryLedger::new(&mut tx)
            .record(
                &stock.id,
                Posting {
                    transaction_kind: TransactionKind::Replacement,
                    quantity_change: -request.quantity,
                    reference_id: &id,
                    reference_kind: ReferenceKind::Replacement,
                    notes: Some(&notes),
                    actor_id: Some(&actor.actor_id),
                },
            )
            .await?;

        let record = ReplacementRecord {
            id,
            code,
            sale_id: sale.id.clone(),
            product_id: request.product_id.clone(),
            quantity: request.quantity,
            reason: request.reason,
            notes: request.notes.clone(),
            ledger_entry_id: entry.id.clone(),
            actor_id: actor.actor_id.clone(),
            created_at: Utc::now(),
        };
        ReplacementRepository::new(&mut tx).insert(&record).await?;

        tx.commit().await?;

        info!(
            replacement_id = %record.id,
            code = %record.code,
            sale = %sale.code,
            product_id = %record.product_id,
            quantity = %record.quantity,
            "Replacement recorded"
        );

        Ok(record)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::testing::{cents, engine, owner, stock_product, units};
    use crate::error::ErrorCode;
    use crate::operations::{CreateSaleRequest, SaleLineInput};
    use stockbook_core::settlement::CreditRequest;
    use stockbook_core::PaymentMode;

    async fn sold_one_a(engine: &SettlementEngine) -> String {
        engine
            .create_sale(
                &owner(),
                CreateSaleRequest {
                    customer_id: "c1".into(),
                    items: vec![SaleLineInput {
                        product_id: "A".into(),
                        quantity: units(1),
                        unit_price: cents(10_000),
                    }],
                    occurred_at: Utc::now(),
                    payment_mode: PaymentMode::Cash,
                    cash_tendered: cents(10_000),
                    credit: CreditRequest::default(),
                },
            )
            .await
            .unwrap()
            .sale
            .id
    }

    fn replace(sale_id: &str, product_id: &str, quantity: i64) -> RecordReplacementRequest {
        RecordReplacementRequest {
            sale_id: sale_id.into(),
            product_id: product_id.into(),
            quantity: units(quantity),
            reason: ReplacementReason::Defective,
            notes: None,
        }
    }

    #[tokio::test]
    async fn test_replacement_decrements_stock() {
        let engine = engine().await;
        stock_product(&engine, "A", 3).await;
        let sale_id = sold_one_a(&engine).await;

        let record = engine
            .record_replacement(&owner(), replace(&sale_id, "A", 1))
            .await
            .unwrap();
        assert!(record.code.starts_with("RPL-"));

        let stock = engine.get_stock(&owner(), ItemKind::Product, "A").await.unwrap();
        assert_eq!(stock.quantity_on_hand, units(1));

        let entries = engine.list_ledger_by_reference(&owner(), &record.id).await.unwrap();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].id, record.ledger_entry_id);
        assert_eq!(entries[0].transaction_kind, TransactionKind::Replacement);

        // Sale money is untouched
        let sale = engine.get_sale(&owner(), &sale_id).await.unwrap();
        assert_eq!(sale.amount_paid, cents(10_000));
    }

    #[tokio::test]
    async fn test_product_must_be_on_sale() {
        let engine = engine().await;
        stock_product(&engine, "A", 3).await;
        stock_product(&engine, "B", 3).await;
        let sale_id = sold_one_a(&engine).await;

        let err = engine
            .record_replacement(&owner(), replace(&sale_id, "B", 1))
            .await
            .unwrap_err();
        assert_eq!(err.code(), ErrorCode::NotFound);

        let err = engine
            .record_replacement(&owner(), replace(&sale_id, "A", 5))
            .await
            .unwrap_err();
        assert_eq!(err.code(), ErrorCode::InsufficientStock);

        let stock = engine.get_stock(&owner(), ItemKind::Product, "A").await.unwrap();
        assert_eq!(stock.quantity_on_hand, units(2));
    }
}
