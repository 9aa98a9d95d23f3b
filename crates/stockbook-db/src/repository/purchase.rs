//! # Purchase Repository
//!
//! One raw material per purchase, so there is no separate lines table.

use chrono::Utc;
use sqlx::SqliteConnection;
use tracing::debug;

use crate::error::DbResult;
use stockbook_core::Purchase;

const PURCHASE_COLUMNS: &str = r#"
    id, code, supplier_id, material_id, quantity, total, amount_paid, balance,
    status, payment_mode, occurred_at, created_by, created_at, updated_at
"#;

/// Repository for purchase database operations.
#[derive(Debug)]
pub struct PurchaseRepository<'c> {
    conn: &'c mut SqliteConnection,
}

impl<'c> PurchaseRepository<'c> {
    pub fn new(conn: &'c mut SqliteConnection) -> Self {
        PurchaseRepository { conn }
    }

    pub async fn get(&mut self, id: &str) -> DbResult<Option<Purchase>> {
        let sql = format!("SELECT {} FROM purchases WHERE id = ?1", PURCHASE_COLUMNS);

        let purchase = sqlx::query_as::<_, Purchase>(&sql)
            .bind(id)
            .fetch_optional(&mut *self.conn)
            .await?;

        Ok(purchase)
    }

    pub async fn insert(&mut self, purchase: &Purchase) -> DbResult<()> {
        debug!(
            id = %purchase.id,
            code = %purchase.code,
            material_id = %purchase.material_id,
            total = purchase.total.cents(),
            "Inserting purchase"
        );

        sqlx::query(
            r#"
            INSERT INTO purchases (
                id, code, supplier_id, material_id, quantity, total, amount_paid, balance,
                status, payment_mode, occurred_at, created_by, created_at, updated_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14)
            "#,
        )
        .bind(&purchase.id)
        .bind(&purchase.code)
        .bind(&purchase.supplier_id)
        .bind(&purchase.material_id)
        .bind(purchase.quantity)
        .bind(purchase.total)
        .bind(purchase.amount_paid)
        .bind(purchase.balance)
        .bind(purchase.status)
        .bind(purchase.payment_mode)
        .bind(purchase.occurred_at)
        .bind(&purchase.created_by)
        .bind(purchase.created_at)
        .bind(purchase.updated_at)
        .execute(&mut *self.conn)
        .await?;

        Ok(())
    }

    /// Writes quantity and money columns back.
    pub async fn update(&mut self, purchase: &Purchase) -> DbResult<()> {
        debug!(
            id = %purchase.id,
            quantity = purchase.quantity.milli(),
            total = purchase.total.cents(),
            amount_paid = purchase.amount_paid.cents(),
            status = %purchase.status,
            "Updating purchase"
        );

        sqlx::query(
            r#"
            UPDATE purchases
            SET quantity = ?2, total = ?3, amount_paid = ?4, balance = ?5,
                status = ?6, updated_at = ?7
            WHERE id = ?1
            "#,
        )
        .bind(&purchase.id)
        .bind(purchase.quantity)
        .bind(purchase.total)
        .bind(purchase.amount_paid)
        .bind(purchase.balance)
        .bind(purchase.status)
        .bind(Utc::now())
        .execute(&mut *self.conn)
        .await?;

        Ok(())
    }

    pub async fn delete(&mut self, id: &str) -> DbResult<()> {
        debug!(id = %id, "Deleting purchase");

        sqlx::query("DELETE FROM purchases WHERE id = ?1")
            .bind(id)
            .execute(&mut *self.conn)
            .await?;

        Ok(())
    }
}
