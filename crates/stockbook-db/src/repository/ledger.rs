//! # Ledger Repository
//!
//! Insert and read for `inventory_ledger`. There is no update
//! or delete here; the table's triggers reject both.
//!
//! Entries are ordered by insertion (`rowid`), which is the order the
//! before/after chain was built in.

use sqlx::SqliteConnection;
use tracing::debug;

use crate::error::DbResult;
use stockbook_core::{LedgerEntry, Page};

const LEDGER_COLUMNS: &str = r#"
    id, stock_item_id, item_id, item_kind, transaction_kind,
    quantity_change, quantity_before, quantity_after,
    reference_id, reference_kind, notes, actor_id, created_at
"#;

/// Repository for inventory ledger entries.
#[derive(Debug)]
pub struct LedgerRepository<'c> {
    conn: &'c mut SqliteConnection,
}

impl<'c> LedgerRepository<'c> {
    pub fn new(conn: &'c mut SqliteConnection) -> Self {
        LedgerRepository { conn }
    }

    pub async fn insert(&mut self, entry: &LedgerEntry) -> DbResult<()> {
        debug!(
            id = %entry.id,
            stock_item_id = %entry.stock_item_id,
            transaction_kind = %entry.transaction_kind,
            change = entry.quantity_change.milli(),
            "Appending ledger entry"
        );

        sqlx::query(
            r#"
            INSERT INTO inventory_ledger (
                id, stock_item_id, item_id, item_kind, transaction_kind,
                quantity_change, quantity_before, quantity_after,
                reference_id, reference_kind, notes, actor_id, created_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13)
            "#,
        )
        .bind(&entry.id)
        .bind(&entry.stock_item_id)
        .bind(&entry.item_id)
        .bind(entry.item_kind)
        .bind(entry.transaction_kind)
        .bind(entry.quantity_change)
        .bind(entry.quantity_before)
        .bind(entry.quantity_after)
        .bind(&entry.reference_id)
        .bind(entry.reference_kind)
        .bind(&entry.notes)
        .bind(&entry.actor_id)
        .bind(entry.created_at)
        .execute(&mut *self.conn)
        .await?;

        Ok(())
    }

    /// Newest-first page of entries for one stock row.
    pub async fn list_for_stock_item(
        &mut self,
        stock_item_id: &str,
        page: Page,
    ) -> DbResult<Vec<LedgerEntry>> {
        let sql = format!(
            "SELECT {} FROM inventory_ledger WHERE stock_item_id = ?1 \
             ORDER BY rowid DESC LIMIT ?2 OFFSET ?3",
            LEDGER_COLUMNS
        );

        let entries = sqlx::query_as::<_, LedgerEntry>(&sql)
            .bind(stock_item_id)
            .bind(page.limit as i64)
            .bind(page.offset as i64)
            .fetch_all(&mut *self.conn)
            .await?;

        Ok(entries)
    }

    /// Every entry for one stock row, oldest first.
    pub async fn chain_for_stock_item(&mut self, stock_item_id: &str) -> DbResult<Vec<LedgerEntry>> {
        let sql = format!(
            "SELECT {} FROM inventory_ledger WHERE stock_item_id = ?1 ORDER BY rowid ASC",
            LEDGER_COLUMNS
        );

        let entries = sqlx::query_as::<_, LedgerEntry>(&sql)
            .bind(stock_item_id)
            .fetch_all(&mut *self.conn)
            .await?;

        Ok(entries)
    }

    /// Entries produced by one sale, purchase, receipt, adjustment or
    /// replacement, in the order they were written.
    pub async fn list_by_reference(&mut self, reference_id: &str) -> DbResult<Vec<LedgerEntry>> {
        let sql = format!(
            "SELECT {} FROM inventory_ledger WHERE reference_id = ?1 ORDER BY rowid ASC",
            LEDGER_COLUMNS
        );

        let entries = sqlx::query_as::<_, LedgerEntry>(&sql)
            .bind(reference_id)
            .fetch_all(&mut *self.conn)
            .await?;

        Ok(entries)
    }
}
