//! # Sale Repository
//!
//! Database operations for sales and their product lines.
//!
//! ## Sale Lifecycle
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                       Sale Lifecycle                                    │
//! │                                                                         │
//! │  1. CREATE                                                             │
//! │     └── insert() + insert_line() per product                           │
//! │                                                                         │
//! │  2. PAY (any number of times)                                          │
//! │     └── update_totals() → amount_paid ↑, balance ↓, status derived     │
//! │                                                                         │
//! │  3. (OPTIONAL) CORRECT                                                 │
//! │     └── update_line() + update_totals()                                │
//! │                                                                         │
//! │  4. (OPTIONAL) DELETE - only while no payment exists                   │
//! │     └── delete() → lines cascade                                       │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use chrono::Utc;
use sqlx::SqliteConnection;
use tracing::debug;

use crate::error::DbResult;
use stockbook_core::{Sale, SaleLine};

const SALE_COLUMNS: &str = r#"
    id, code, customer_id, total, amount_paid, balance, status,
    payment_mode, occurred_at, created_by, created_at, updated_at
"#;

/// Repository for sale database operations.
#[derive(Debug)]
pub struct SaleRepository<'c> {
    conn: &'c mut SqliteConnection,
}

impl<'c> SaleRepository<'c> {
    pub fn new(conn: &'c mut SqliteConnection) -> Self {
        SaleRepository { conn }
    }

    /// Gets a sale by ID, with its lines.
    pub async fn get(&mut self, id: &str) -> DbResult<Option<Sale>> {
        let sql = format!("SELECT {} FROM sales WHERE id = ?1", SALE_COLUMNS);

        let sale = sqlx::query_as::<_, Sale>(&sql)
            .bind(id)
            .fetch_optional(&mut *self.conn)
            .await?;

        match sale {
            Some(mut sale) => {
                sale.items = self.lines(id).await?;
                Ok(Some(sale))
            }
            None => Ok(None),
        }
    }

    /// Inserts the sale header. Lines are inserted separately.
    pub async fn insert(&mut self, sale: &Sale) -> DbResult<()> {
        debug!(id = %sale.id, code = %sale.code, total = sale.total.cents(), "Inserting sale");

        sqlx::query(
            r#"
            INSERT INTO sales (
                id, code, customer_id, total, amount_paid, balance, status,
                payment_mode, occurred_at, created_by, created_at, updated_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12)
            "#,
        )
        .bind(&sale.id)
        .bind(&sale.code)
        .bind(&sale.customer_id)
        .bind(sale.total)
        .bind(sale.amount_paid)
        .bind(sale.balance)
        .bind(sale.status)
        .bind(sale.payment_mode)
        .bind(sale.occurred_at)
        .bind(&sale.created_by)
        .bind(sale.created_at)
        .bind(sale.updated_at)
        .execute(&mut *self.conn)
        .await?;

        Ok(())
    }

    pub async fn insert_line(&mut self, line: &SaleLine) -> DbResult<()> {
        debug!(
            sale_id = %line.sale_id,
            product_id = %line.product_id,
            quantity = line.quantity.milli(),
            "Inserting sale line"
        );

        sqlx::query(
            r#"
            INSERT INTO sale_lines (
                id, sale_id, product_id, quantity, unit_price, line_total, created_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
            "#,
        )
        .bind(&line.id)
        .bind(&line.sale_id)
        .bind(&line.product_id)
        .bind(line.quantity)
        .bind(line.unit_price)
        .bind(line.line_total)
        .bind(line.created_at)
        .execute(&mut *self.conn)
        .await?;

        Ok(())
    }

    /// Gets all lines for a sale in insertion order.
    pub async fn lines(&mut self, sale_id: &str) -> DbResult<Vec<SaleLine>> {
        let lines = sqlx::query_as::<_, SaleLine>(
            r#"
            SELECT id, sale_id, product_id, quantity, unit_price, line_total, created_at
            FROM sale_lines
            WHERE sale_id = ?1
            ORDER BY rowid ASC
            "#,
        )
        .bind(sale_id)
        .fetch_all(&mut *self.conn)
        .await?;

        Ok(lines)
    }

    /// Writes the sale's money columns back.
    pub async fn update_totals(&mut self, sale: &Sale) -> DbResult<()> {
        debug!(
            id = %sale.id,
            total = sale.total.cents(),
            amount_paid = sale.amount_paid.cents(),
            status = %sale.status,
            "Updating sale totals"
        );

        sqlx::query(
            r#"
            UPDATE sales
            SET total = ?2, amount_paid = ?3, balance = ?4, status = ?5, updated_at = ?6
            WHERE id = ?1
            "#,
        )
        .bind(&sale.id)
        .bind(sale.total)
        .bind(sale.amount_paid)
        .bind(sale.balance)
        .bind(sale.status)
        .bind(Utc::now())
        .execute(&mut *self.conn)
        .await?;

        Ok(())
    }

    pub async fn update_line(&mut self, line: &SaleLine) -> DbResult<()> {
        sqlx::query(
            r#"
            UPDATE sale_lines
            SET quantity = ?2, unit_price = ?3, line_total = ?4
            WHERE id = ?1
            "#,
        )
        .bind(&line.id)
        .bind(line.quantity)
        .bind(line.unit_price)
        .bind(line.line_total)
        .execute(&mut *self.conn)
        .await?;

        Ok(())
    }

    /// Deletes a sale and (by cascade) its lines.
    pub async fn delete(&mut self, id: &str) -> DbResult<()> {
        debug!(id = %id, "Deleting sale");

        sqlx::query("DELETE FROM sales WHERE id = ?1")
            .bind(id)
            .execute(&mut *self.conn)
            .await?;

        Ok(())
    }

    /// The customer's sales with an outstanding balance, oldest supply date
    /// first (ties by creation order), excluding `exclude_id`.
    ///
    /// Lines are not loaded.
    pub async fn open_for_customer(
        &mut self,
        customer_id: &str,
        exclude_id: Option<&str>,
    ) -> DbResult<Vec<Sale>> {
        let sql = format!(
            "SELECT {} FROM sales \
             WHERE customer_id = ?1 AND balance > 0 AND id <> COALESCE(?2, '') \
             ORDER BY occurred_at ASC, rowid ASC",
            SALE_COLUMNS
        );

        let sales = sqlx::query_as::<_, Sale>(&sql)
            .bind(customer_id)
            .bind(exclude_id)
            .fetch_all(&mut *self.conn)
            .await?;

        Ok(sales)
    }
}
