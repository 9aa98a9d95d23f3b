//! # Payment Repository
//!
//! Append-only payment records. For every obligation,
//! `sum_for(kind, id) == obligation.amount_paid`.

use sqlx::SqliteConnection;
use tracing::debug;

use crate::error::DbResult;
use stockbook_core::{Money, ObligationKind, PaymentRecord};

/// Repository for payment records.
#[derive(Debug)]
pub struct PaymentRepository<'c> {
    conn: &'c mut SqliteConnection,
}

impl<'c> PaymentRepository<'c> {
    pub fn new(conn: &'c mut SqliteConnection) -> Self {
        PaymentRepository { conn }
    }

    pub async fn insert(&mut self, payment: &PaymentRecord) -> DbResult<()> {
        debug!(
            id = %payment.id,
            obligation_kind = %payment.obligation_kind,
            obligation_id = %payment.obligation_id,
            amount = payment.amount.cents(),
            "Recording payment"
        );

        sqlx::query(
            r#"
            INSERT INTO payments (
                id, obligation_kind, obligation_id, amount, payment_date,
                payment_mode, notes, created_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
            "#,
        )
        .bind(&payment.id)
        .bind(payment.obligation_kind)
        .bind(&payment.obligation_id)
        .bind(payment.amount)
        .bind(payment.payment_date)
        .bind(payment.payment_mode)
        .bind(&payment.notes)
        .bind(payment.created_at)
        .execute(&mut *self.conn)
        .await?;

        Ok(())
    }

    /// All payments for an obligation in the order they were recorded.
    pub async fn list_for(
        &mut self,
        kind: ObligationKind,
        obligation_id: &str,
    ) -> DbResult<Vec<PaymentRecord>> {
        let payments = sqlx::query_as::<_, PaymentRecord>(
            r#"
            SELECT id, obligation_kind, obligation_id, amount, payment_date,
                   payment_mode, notes, created_at
            FROM payments
            WHERE obligation_kind = ?1 AND obligation_id = ?2
            ORDER BY rowid ASC
            "#,
        )
        .bind(kind)
        .bind(obligation_id)
        .fetch_all(&mut *self.conn)
        .await?;

        Ok(payments)
    }

    /// Σ amount for an obligation.
    pub async fn sum_for(&mut self, kind: ObligationKind, obligation_id: &str) -> DbResult<Money> {
        let cents: i64 = sqlx::query_scalar(
            r#"
            SELECT COALESCE(SUM(amount), 0)
            FROM payments
            WHERE obligation_kind = ?1 AND obligation_id = ?2
            "#,
        )
        .bind(kind)
        .bind(obligation_id)
        .fetch_one(&mut *self.conn)
        .await?;

        Ok(Money::from_cents(cents))
    }

    pub async fn count_for(&mut self, kind: ObligationKind, obligation_id: &str) -> DbResult<i64> {
        let count: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM payments WHERE obligation_kind = ?1 AND obligation_id = ?2",
        )
        .bind(kind)
        .bind(obligation_id)
        .fetch_one(&mut *self.conn)
        .await?;

        Ok(count)
    }
}
