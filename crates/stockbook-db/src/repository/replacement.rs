//! # Replacement Repository

use sqlx::SqliteConnection;
use tracing::debug;

use crate::error::DbResult;
use stockbook_core::ReplacementRecord;

/// Repository for replacement records.
#[derive(Debug)]
pub struct ReplacementRepository<'c> {
    conn: &'c mut SqliteConnection,
}

impl<'c> ReplacementRepository<'c> {
    pub fn new(conn: &'c mut SqliteConnection) -> Self {
        ReplacementRepository { conn }
    }

    pub async fn insert(&mut self, record: &ReplacementRecord) -> DbResult<()> {
        debug!(
            id = %record.id,
            sale_id = %record.sale_id,
            product_id = %record.product_id,
            quantity = record.quantity.milli(),
            "Inserting replacement"
        );

        sqlx::query(
            r#"
            INSERT INTO replacements (
                id, code, sale_id, product_id, quantity, reason, notes,
                ledger_entry_id, actor_id, created_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)
            "#,
        )
        .bind(&record.id)
        .bind(&record.code)
        .bind(&record.sale_id)
        .bind(&record.product_id)
        .bind(record.quantity)
        .bind(record.reason)
        .bind(&record.notes)
        .bind(&record.ledger_entry_id)
        .bind(&record.actor_id)
        .bind(record.created_at)
        .execute(&mut *self.conn)
        .await?;

        Ok(())
    }

    pub async fn list_for_sale(&mut self, sale_id: &str) -> DbResult<Vec<ReplacementRecord>> {
        let records = sqlx::query_as::<_, ReplacementRecord>(
            r#"
            SELECT id, code, sale_id, product_id, quantity, reason, notes,
                   ledger_entry_id, actor_id, created_at
            FROM replacements
            WHERE sale_id = ?1
            ORDER BY rowid ASC
            "#,
        )
        .bind(sale_id)
        .fetch_all(&mut *self.conn)
        .await?;

        Ok(records)
    }
}
