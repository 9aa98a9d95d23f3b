//! # Stock Store
//!
//! Current quantity per product or material.
//!
//! ## Mutation Path
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                                                                         │
//! │  InventoryLedger::record                                               │
//! │        │  before = stock.quantity_on_hand                               │
//! │        ▼                                                                │
//! │  StockStore::apply_delta(item, delta, Some(before))                    │
//! │        │                                                                │
//! │        ├── stored != before ───────────► ConcurrentModification        │
//! │        ├── stored + delta < 0 ─────────► InsufficientStock             │
//! │        └── UPDATE ... WHERE quantity_on_hand = before                  │
//! │                  │                                                      │
//! │                  └── 0 rows ───────────► ConcurrentModification        │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Only the ledger calls [`StockStore::apply_delta`]; every other caller
//! goes through [`InventoryLedger::record`](crate::ledger::InventoryLedger::record)
//! so no quantity ever changes without an entry.

use chrono::{DateTime, Utc};
use sqlx::SqliteConnection;
use tracing::{debug, info};

use stockbook_core::{
    CoreError, ItemKind, Quantity, StockDefaults, StockItem, StockShortfall,
};
use stockbook_db::{new_id, MaterialRepository, ProductRepository, StockRepository};

use crate::error::EngineResult;

/// Stock store bound to one connection (normally a write transaction).
#[derive(Debug)]
pub struct StockStore<'c> {
    conn: &'c mut SqliteConnection,
}

impl<'c> StockStore<'c> {
    pub fn new(conn: &'c mut SqliteConnection) -> Self {
        StockStore { conn }
    }

    /// Returns the item's stock row, creating an empty one from `defaults`
    /// on first use.
    ///
    /// Fails with `NotFound` when the product or material is not registered.
    pub async fn get_or_init(
        &mut self,
        item_kind: ItemKind,
        item_id: &str,
        defaults: &StockDefaults,
    ) -> EngineResult<StockItem> {
        if let Some(item) = StockRepository::new(&mut *self.conn).find(item_kind, item_id).await? {
            return Ok(item);
        }

        self.ensure_registered(item_kind, item_id).await?;

        let item = StockItem::initial(new_id(), item_kind, item_id, defaults, Utc::now());
        StockRepository::new(&mut *self.conn).insert(&item).await?;

        info!(
            stock_item_id = %item.id,
            item_kind = %item_kind,
            item_id = %item_id,
            "Stock row initialized"
        );

        Ok(item)
    }

    /// Applies `delta` to the stored quantity of stock row `stock_item_id`.
    ///
    /// With `expected_before`, the stored value must still match it. Nothing
    /// is written when the result would be negative.
    pub async fn apply_delta(
        &mut self,
        stock_item_id: &str,
        delta: Quantity,
        expected_before: Option<Quantity>,
        restocked_at: Option<DateTime<Utc>>,
    ) -> EngineResult<StockItem> {
        let mut item = StockRepository::new(&mut *self.conn)
            .get(stock_item_id)
            .await?
            .ok_or_else(|| CoreError::not_found("Stock item", stock_item_id))?;

        let current = item.quantity_on_hand;
        if let Some(expected) = expected_before {
            if expected != current {
                return Err(CoreError::concurrent("Stock item", stock_item_id).into());
            }
        }

        let updated = current + delta;
        if updated.is_negative() {
            return Err(CoreError::insufficient_stock(
                item.item_kind,
                item.item_id.clone(),
                current,
                -delta,
            )
            .into());
        }

        let applied = StockRepository::new(&mut *self.conn)
            .compare_and_set(stock_item_id, current, updated, restocked_at)
            .await?;
        if !applied {
            return Err(CoreError::concurrent("Stock item", stock_item_id).into());
        }

        item.quantity_on_hand = updated;
        item.version += 1;
        if restocked_at.is_some() {
            item.last_restocked_at = restocked_at;
        }

        debug!(
            stock_item_id = %stock_item_id,
            before = %current,
            delta = %delta,
            after = %updated,
            "Stock delta applied"
        );

        Ok(item)
    }

    /// Checks every `(item_id, quantity)` against current stock without
    /// mutating anything.
    ///
    /// All shortfalls are collected so the caller sees the full picture. An
    /// item with no stock row has zero available.
    pub async fn check_availability(
        &mut self,
        item_kind: ItemKind,
        demand: &[(String, Quantity)],
    ) -> EngineResult<()> {
        let mut shortfalls = Vec::new();

        for (item_id, requested) in demand {
            let available = StockRepository::new(&mut *self.conn)
                .find(item_kind, item_id)
                .await?
                .map(|item| item.quantity_on_hand)
                .unwrap_or_default();

            if available < *requested {
                shortfalls.push(StockShortfall {
                    item_kind,
                    item_id: item_id.clone(),
                    available,
                    requested: *requested,
                });
            }
        }

        if shortfalls.is_empty() {
            Ok(())
        } else {
            debug!(count = shortfalls.len(), "Availability check failed");
            Err(CoreError::InsufficientStock { shortfalls }.into())
        }
    }

    pub async fn get(&mut self, item_kind: ItemKind, item_id: &str) -> EngineResult<Option<StockItem>> {
        Ok(StockRepository::new(&mut *self.conn).find(item_kind, item_id).await?)
    }

    /// Items at or below their reorder point.
    pub async fn list_low_stock(&mut self) -> EngineResult<Vec<StockItem>> {
        Ok(StockRepository::new(&mut *self.conn).list_low_stock().await?)
    }

    async fn ensure_registered(&mut self, item_kind: ItemKind, item_id: &str) -> EngineResult<()> {
        let exists = match item_kind {
            ItemKind::Product => ProductRepository::new(&mut *self.conn).get(item_id).await?.is_some(),
            ItemKind::Material => MaterialRepository::new(&mut *self.conn).get(item_id).await?.is_some(),
        };

        if exists {
            Ok(())
        } else {
            Err(CoreError::not_found(item_kind.to_string(), item_id).into())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorCode;
    use stockbook_core::{Material, Money, Product};
    use stockbook_db::{Database, DbConfig};

    async fn setup() -> Database {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let mut conn = db.acquire().await.unwrap();
        let now = Utc::now();
        ProductRepository::new(&mut conn)
            .insert(&Product {
                id: "p1".into(),
                sku: "SKU-1".into(),
                name: "Widget".into(),
                unit: "pcs".into(),
                unit_price: Money::from_cents(100),
                is_active: true,
                created_at: now,
            })
            .await
            .unwrap();
        MaterialRepository::new(&mut conn)
            .insert(&Material {
                id: "m1".into(),
                code: "FLOUR".into(),
                name: "Flour".into(),
                unit: "kg".into(),
                created_at: now,
            })
            .await
            .unwrap();
        drop(conn);
        db
    }

    #[tokio::test]
    async fn test_get_or_init_is_idempotent() {
        let db = setup().await;
        let mut conn = db.acquire().await.unwrap();
        let mut store = StockStore::new(&mut conn);

        let defaults = StockDefaults {
            reorder_point: Quantity::from_units(5),
            ..StockDefaults::default()
        };
        let first = store.get_or_init(ItemKind::Product, "p1", &defaults).await.unwrap();
        let second = store
            .get_or_init(ItemKind::Product, "p1", &StockDefaults::default())
            .await
            .unwrap();

        assert_eq!(first.id, second.id);
        assert_eq!(second.reorder_point, Quantity::from_units(5));
        assert_eq!(second.quantity_on_hand, Quantity::zero());
    }

    #[tokio::test]
    async fn test_get_or_init_unknown_item() {
        let db = setup().await;
        let mut conn = db.acquire().await.unwrap();
        let mut store = StockStore::new(&mut conn);

        let err = store
            .get_or_init(ItemKind::Material, "nope", &StockDefaults::default())
            .await
            .unwrap_err();
        assert_eq!(err.code(), ErrorCode::NotFound);
    }

    #[tokio::test]
    async fn test_apply_delta_guards() {
        let db = setup().await;
        let mut conn = db.acquire().await.unwrap();
        let mut store = StockStore::new(&mut conn);

        let item = store
            .get_or_init(ItemKind::Material, "m1", &StockDefaults::default())
            .await
            .unwrap();

        let item = store
            .apply_delta(&item.id, Quantity::from_milli(2_500), Some(Quantity::zero()), None)
            .await
            .unwrap();
        assert_eq!(item.quantity_on_hand, Quantity::from_milli(2_500));

        // Stale expectation
        let err = store
            .apply_delta(&item.id, Quantity::from_units(1), Some(Quantity::zero()), None)
            .await
            .unwrap_err();
        assert_eq!(err.code(), ErrorCode::ConcurrentModification);

        // Would go negative
        let err = store
            .apply_delta(&item.id, Quantity::from_units(-3), None, None)
            .await
            .unwrap_err();
        assert_eq!(err.code(), ErrorCode::InsufficientStock);

        let unchanged = store.get(ItemKind::Material, "m1").await.unwrap().unwrap();
        assert_eq!(unchanged.quantity_on_hand, Quantity::from_milli(2_500));
    }

    #[tokio::test]
    async fn test_check_availability_reports_every_shortfall() {
        let db = setup().await;
        let mut conn = db.acquire().await.unwrap();
        let mut store = StockStore::new(&mut conn);

        let item = store
            .get_or_init(ItemKind::Product, "p1", &StockDefaults::default())
            .await
            .unwrap();
        store
            .apply_delta(&item.id, Quantity::from_units(5), None, None)
            .await
            .unwrap();

        assert!(store
            .check_availability(ItemKind::Product, &[("p1".into(), Quantity::from_units(5))])
            .await
            .is_ok());

        let err = store
            .check_availability(
                ItemKind::Product,
                &[
                    ("p1".into(), Quantity::from_units(6)),
                    ("never-stocked".into(), Quantity::from_units(1)),
                ],
            )
            .await
            .unwrap_err();
        let shortfalls = err.shortfalls();
        assert_eq!(shortfalls.len(), 2);
        assert_eq!(shortfalls[0].available, Quantity::from_units(5));
        assert_eq!(shortfalls[1].available, Quantity::zero());
    }
}
