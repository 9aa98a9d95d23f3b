//! Goods received and manual stock adjustments. Neither touches an
//! obligation.

use serde::{Deserialize, Serialize};
use tracing::info;
use ts_rs::TS;

use stockbook_core::validation::{
    validate_code, validate_id, validate_notes, validate_quantity, validate_reason,
};
use stockbook_core::{
    Actor, AdjustmentDirection, ItemKind, LedgerEntry, Operation, Quantity, ReferenceKind,
    TransactionKind,
};
use stockbook_db::new_id;

use crate::engine::SettlementEngine;
use crate::error::EngineResult;
use crate::ledger::{InventoryLedger, Posting};
use crate::stock::StockStore;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct ReceiveGoodsRequest {
    pub item_kind: ItemKind,
    pub item_id: String,
    pub quantity: Quantity,
    /// Delivery note or invoice number; a fresh id is used when absent.
    #[serde(default)]
    pub reference_number: Option<String>,
    #[serde(default)]
    pub notes: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct AdjustStockRequest {
    pub item_kind: ItemKind,
    pub item_id: String,
    pub direction: AdjustmentDirection,
    pub quantity: Quantity,
    pub reason: String,
}

impl SettlementEngine {
    pub async fn receive_goods(
        &self,
        actor: &Actor,
        request: ReceiveGoodsRequest,
    ) -> EngineResult<LedgerEntry> {
        self.authorize(actor, Operation::ReceiveGoods)?;
        validate_id("item_id", &request.item_id)?;
        validate_quantity(request.quantity)?;
        if let Some(reference) = &request.reference_number {
            validate_code("reference_number", reference)?;
        }
        validate_notes(request.notes.as_deref())?;

        let reference_id = request
            .reference_number
            .as_deref()
            .map(|r| r.trim().to_string())
            .unwrap_or_else(new_id);

        let mut tx = self.db.begin_write().await?;

        let stock = StockStore::new(&mut tx)
            .get_or_init(request.item_kind, &request.item_id, &self.stock_defaults)
            .await?;
        let entry = InventoryLedger::new(&mut tx)
            .record(
                &stock.id,
                Posting {
                    transaction_kind: TransactionKind::GoodsReceived,
                    quantity_change: request.quantity,
                    reference_id: &reference_id,
                    reference_kind: ReferenceKind::GoodsReceipt,
                    notes: request.notes.as_deref(),
                    actor_id: Some(&actor.actor_id),
                },
            )
            .await?;

        tx.commit().await?;

        info!(
            item_kind = %request.item_kind,
            item_id = %request.item_id,
            quantity = %request.quantity,
            reference = %reference_id,
            after = %entry.quantity_after,
            "Goods received"
        );

        Ok(entry)
    }

    /// Manual correction of a stock level. The reason is mandatory and is
    /// stored as the entry's notes.
    pub async fn adjust_stock(
        &self,
        actor: &Actor,
        request: AdjustStockRequest,
    ) -> EngineResult<LedgerEntry> {
        self.authorize(actor, Operation::AdjustStock)?;
        validate_id("item_id", &request.item_id)?;
        validate_quantity(request.quantity)?;
        validate_reason(&request.reason)?;

        let change = match request.direction {
            AdjustmentDirection::Add => request.quantity,
            AdjustmentDirection::Subtract => -request.quantity,
        };
        let reference_id = new_id();

        let mut tx = self.db.begin_write().await?;

        let stock = StockStore::new(&mut tx)
            .get_or_init(request.item_kind, &request.item_id, &self.stock_defaults)
            .await?;
        let entry = InventoryLedger::new(&mut tx)
            .record(
                &stock.id,
                Posting {
                    transaction_kind: TransactionKind::Adjustment,
                    quantity_change: change,
                    reference_id: &reference_id,
                    reference_kind: ReferenceKind::Adjustment,
                    notes: Some(request.reason.trim()),
                    actor_id: Some(&actor.actor_id),
                },
            )
            .await?;

        tx.commit().await?;

        info!(
            item_kind = %request.item_kind,
            item_id = %request.item_id,
            change = %change,
            after = %entry.quantity_after,
            actor_id = %actor.actor_id,
            "Stock adjusted"
        );

        Ok(entry)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::testing::{engine, owner, stock_product, units};
    use crate::error::ErrorCode;
    use stockbook_core::Role;

    fn adjust(direction: AdjustmentDirection, quantity: i64, reason: &str) -> AdjustStockRequest {
        AdjustStockRequest {
            item_kind: ItemKind::Product,
            item_id: "A".into(),
            direction,
            quantity: units(quantity),
            reason: reason.into(),
        }
    }

    #[tokio::test]
    async fn test_subtract_beyond_stock_fails() {
        let engine = engine().await;
        stock_product(&engine, "A", 4).await;

        let err = engine
            .adjust_stock(&owner(), adjust(AdjustmentDirection::Subtract, 10, "Stock count"))
            .await
            .unwrap_err();
        assert_eq!(err.code(), ErrorCode::InsufficientStock);

        let stock = engine.get_stock(&owner(), ItemKind::Product, "A").await.unwrap();
        assert_eq!(stock.quantity_on_hand, units(4));

        let entry = engine
            .adjust_stock(&owner(), adjust(AdjustmentDirection::Subtract, 4, "Stock count"))
            .await
            .unwrap();
        assert_eq!(entry.quantity_after, Quantity::zero());
        assert_eq!(entry.notes.as_deref(), Some("Stock count"));
    }

    #[tokio::test]
    async fn test_reason_required() {
        let engine = engine().await;

        let err = engine
            .adjust_stock(&owner(), adjust(AdjustmentDirection::Add, 1, "   "))
            .await
            .unwrap_err();
        assert_eq!(err.code(), ErrorCode::ValidationError);
    }

    #[tokio::test]
    async fn test_receive_goods_lazily_creates_stock() {
        let engine = engine().await;
        let keeper = Actor::new("k1", Role::Storekeeper);

        let entry = engine
            .receive_goods(
                &keeper,
                ReceiveGoodsRequest {
                    item_kind: ItemKind::Material,
                    item_id: "m1".into(),
                    quantity: Quantity::from_milli(7_250),
                    reference_number: Some("GRN-0042".into()),
                    notes: None,
                },
            )
            .await
            .unwrap();
        assert_eq!(entry.transaction_kind, TransactionKind::GoodsReceived);
        assert_eq!(entry.reference_id, "GRN-0042");
        assert_eq!(entry.quantity_before, Quantity::zero());

        let stock = engine.get_stock(&keeper, ItemKind::Material, "m1").await.unwrap();
        assert_eq!(stock.quantity_on_hand, Quantity::from_milli(7_250));
        assert!(stock.last_restocked_at.is_some());

        let err = engine
            .receive_goods(
                &keeper,
                ReceiveGoodsRequest {
                    item_kind: ItemKind::Material,
                    item_id: "unknown".into(),
                    quantity: units(1),
                    reference_number: None,
                    notes: None,
                },
            )
            .await
            .unwrap_err();
        assert_eq!(err.code(), ErrorCode::NotFound);
    }

    #[tokio::test]
    async fn test_cashier_cannot_adjust() {
        let engine = engine().await;
        let cashier = Actor::new("c9", Role::Cashier);

        let err = engine
            .adjust_stock(&cashier, adjust(AdjustmentDirection::Add, 1, "Found one"))
            .await
            .unwrap_err();
        assert_eq!(err.code(), ErrorCode::InsufficientPermission);
    }
}
