//! # Sequence Repository
//!
//! Daily counters behind human-readable codes (`SAL-20261017-0003`).
//!
//! ```text
//! INSERT INTO sequences (scope, day, last_value) VALUES ('SAL', '2026-10-17', 1)
//! ON CONFLICT (scope, day) DO UPDATE SET last_value = last_value + 1
//! RETURNING last_value
//! ```
//! A single statement, so two writers can never draw the same value; run
//! inside the obligation's transaction, a rolled-back sale also gives its
//! number back.

use chrono::NaiveDate;
use sqlx::SqliteConnection;

use crate::error::DbResult;

/// Repository for daily sequence counters.
#[derive(Debug)]
pub struct SequenceRepository<'c> {
    conn: &'c mut SqliteConnection,
}

impl<'c> SequenceRepository<'c> {
    pub fn new(conn: &'c mut SqliteConnection) -> Self {
        SequenceRepository { conn }
    }

    /// Allocates the next value for `(scope, day)`, starting at 1.
    pub async fn next(&mut self, scope: &str, day: NaiveDate) -> DbResult<i64> {
        let value: i64 = sqlx::query_scalar(
            r#"
            INSERT INTO sequences (scope, day, last_value) VALUES (?1, ?2, 1)
            ON CONFLICT (scope, day) DO UPDATE SET last_value = last_value + 1
            RETURNING last_value
            "#,
        )
        .bind(scope)
        .bind(day.format("%Y-%m-%d").to_string())
        .fetch_one(&mut *self.conn)
        .await?;

        Ok(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pool::{Database, DbConfig};

    #[tokio::test]
    async fn test_counters_are_per_scope_and_day() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let mut conn = db.acquire().await.unwrap();
        let mut seq = SequenceRepository::new(&mut conn);

        let day1 = NaiveDate::from_ymd_opt(2026, 10, 17).unwrap();
        let day2 = NaiveDate::from_ymd_opt(2026, 10, 18).unwrap();

        assert_eq!(seq.next("SAL", day1).await.unwrap(), 1);
        assert_eq!(seq.next("SAL", day1).await.unwrap(), 2);
        assert_eq!(seq.next("PUR", day1).await.unwrap(), 1);
        assert_eq!(seq.next("SAL", day2).await.unwrap(), 1);
        assert_eq!(seq.next("SAL", day1).await.unwrap(), 3);
    }
}
