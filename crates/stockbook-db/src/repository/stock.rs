//! # Stock Repository
//!
//! Current quantity per (item kind, item id).
//!
//! ## Compare-and-Set Updates
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  UPDATE stock_items                                                     │
//! │  SET quantity_on_hand = :new, version = version + 1                     │
//! │  WHERE id = :id AND quantity_on_hand = :expected                        │
//! │                                                                         │
//! │  rows_affected = 1  → applied                                          │
//! │  rows_affected = 0  → someone else moved the stock; caller aborts      │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//! The column also carries `CHECK (quantity_on_hand >= 0)`, so a negative
//! level can never be committed even if a caller skips its own check.

use chrono::{DateTime, Utc};
use sqlx::SqliteConnection;
use tracing::debug;

use crate::error::DbResult;
use stockbook_core::{ItemKind, Quantity, StockItem};

const STOCK_COLUMNS: &str = r#"
    id, item_id, item_kind, quantity_on_hand, unit,
    minimum_stock, reorder_point, maximum_stock, last_restocked_at,
    version, created_at, updated_at
"#;

/// Repository for stock level operations.
#[derive(Debug)]
pub struct StockRepository<'c> {
    conn: &'c mut SqliteConnection,
}

impl<'c> StockRepository<'c> {
    pub fn new(conn: &'c mut SqliteConnection) -> Self {
        StockRepository { conn }
    }

    /// Finds the stock row for an item, if one has been created.
    pub async fn find(&mut self, item_kind: ItemKind, item_id: &str) -> DbResult<Option<StockItem>> {
        let sql = format!(
            "SELECT {} FROM stock_items WHERE item_kind = ?1 AND item_id = ?2",
            STOCK_COLUMNS
        );

        let item = sqlx::query_as::<_, StockItem>(&sql)
            .bind(item_kind)
            .bind(item_id)
            .fetch_optional(&mut *self.conn)
            .await?;

        Ok(item)
    }

    pub async fn get(&mut self, id: &str) -> DbResult<Option<StockItem>> {
        let sql = format!("SELECT {} FROM stock_items WHERE id = ?1", STOCK_COLUMNS);

        let item = sqlx::query_as::<_, StockItem>(&sql)
            .bind(id)
            .fetch_optional(&mut *self.conn)
            .await?;

        Ok(item)
    }

    pub async fn insert(&mut self, item: &StockItem) -> DbResult<()> {
        debug!(
            id = %item.id,
            item_kind = %item.item_kind,
            item_id = %item.item_id,
            "Creating stock row"
        );

        sqlx::query(
            r#"
            INSERT INTO stock_items (
                id, item_id, item_kind, quantity_on_hand, unit,
                minimum_stock, reorder_point, maximum_stock, last_restocked_at,
                version, created_at, updated_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12)
            "#,
        )
        .bind(&item.id)
        .bind(&item.item_id)
        .bind(item.item_kind)
        .bind(item.quantity_on_hand)
        .bind(&item.unit)
        .bind(item.minimum_stock)
        .bind(item.reorder_point)
        .bind(item.maximum_stock)
        .bind(item.last_restocked_at)
        .bind(item.version)
        .bind(item.created_at)
        .bind(item.updated_at)
        .execute(&mut *self.conn)
        .await?;

        Ok(())
    }

    /// Sets `quantity_on_hand` to `new_quantity` only if it still equals
    /// `expected`. Returns whether the row was updated.
    ///
    /// `restocked_at` also stamps `last_restocked_at` when given.
    pub async fn compare_and_set(
        &mut self,
        id: &str,
        expected: Quantity,
        new_quantity: Quantity,
        restocked_at: Option<DateTime<Utc>>,
    ) -> DbResult<bool> {
        let result = sqlx::query(
            r#"
            UPDATE stock_items
            SET quantity_on_hand = ?3,
                last_restocked_at = COALESCE(?4, last_restocked_at),
                version = version + 1,
                updated_at = ?5
            WHERE id = ?1 AND quantity_on_hand = ?2
            "#,
        )
        .bind(id)
        .bind(expected)
        .bind(new_quantity)
        .bind(restocked_at)
        .bind(Utc::now())
        .execute(&mut *self.conn)
        .await?;

        let applied = result.rows_affected() == 1;
        debug!(
            id = %id,
            expected = expected.milli(),
            new_quantity = new_quantity.milli(),
            applied,
            "Stock compare-and-set"
        );

        Ok(applied)
    }

    /// Items at or below their reorder point, lowest first.
    pub async fn list_low_stock(&mut self) -> DbResult<Vec<StockItem>> {
        let sql = format!(
            "SELECT {} FROM stock_items WHERE quantity_on_hand <= reorder_point \
             ORDER BY quantity_on_hand ASC, item_kind, item_id",
            STOCK_COLUMNS
        );

        let items = sqlx::query_as::<_, StockItem>(&sql)
            .fetch_all(&mut *self.conn)
            .await?;

        Ok(items)
    }
}
