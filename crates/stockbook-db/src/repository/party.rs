//! # Party Repositories
//!
//! Customers and suppliers. A customer row also carries the store-credit
//! balance; it is only ever changed through [`CustomerRepository::adjust_credit`],
//! which keeps it within `0..=MAX_MONEY`.

use chrono::Utc;
use sqlx::SqliteConnection;
use tracing::debug;

use crate::error::DbResult;
use stockbook_core::{Customer, Money, Supplier, MAX_MONEY};

/// Repository for customer database operations.
#[derive(Debug)]
pub struct CustomerRepository<'c> {
    conn: &'c mut SqliteConnection,
}

impl<'c> CustomerRepository<'c> {
    pub fn new(conn: &'c mut SqliteConnection) -> Self {
        CustomerRepository { conn }
    }

    pub async fn insert(&mut self, customer: &Customer) -> DbResult<()> {
        debug!(id = %customer.id, name = %customer.name, "Inserting customer");

        sqlx::query(
            r#"
            INSERT INTO customers (id, name, phone, credit_balance, created_at, updated_at)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6)
            "#,
        )
        .bind(&customer.id)
        .bind(&customer.name)
        .bind(&customer.phone)
        .bind(customer.credit_balance)
        .bind(customer.created_at)
        .bind(customer.updated_at)
        .execute(&mut *self.conn)
        .await?;

        Ok(())
    }

    pub async fn get(&mut self, id: &str) -> DbResult<Option<Customer>> {
        let customer = sqlx::query_as::<_, Customer>(
            r#"
            SELECT id, name, phone, credit_balance, created_at, updated_at
            FROM customers
            WHERE id = ?1
            "#,
        )
        .bind(id)
        .fetch_optional(&mut *self.conn)
        .await?;

        Ok(customer)
    }

    /// Adds `delta` (possibly negative) to the customer's credit balance.
    ///
    /// Returns the new balance, or `None` when the customer does not exist or
    /// the balance would leave `0..=MAX_MONEY`. Nothing is written in either
    /// case. An `i64` overflow in SQLite yields a REAL, which fails the bound.
    pub async fn adjust_credit(&mut self, id: &str, delta: Money) -> DbResult<Option<Money>> {
        debug!(id = %id, delta = delta.cents(), "Adjusting customer credit");

        let balance: Option<Money> = sqlx::query_scalar(
            r#"
            UPDATE customers
            SET credit_balance = credit_balance + ?2,
                updated_at = ?3
            WHERE id = ?1
              AND credit_balance + ?2 >= 0
              AND credit_balance + ?2 <= ?4
            RETURNING credit_balance
            "#,
        )
        .bind(id)
        .bind(delta)
        .bind(Utc::now())
        .bind(MAX_MONEY)
        .fetch_optional(&mut *self.conn)
        .await?;

        Ok(balance)
    }
}

/// Repository for supplier database operations.
#[derive(Debug)]
pub struct SupplierRepository<'c> {
    conn: &'c mut SqliteConnection,
}

impl<'c> SupplierRepository<'c> {
    pub fn new(conn: &'c mut SqliteConnection) -> Self {
        SupplierRepository { conn }
    }

    pub async fn insert(&mut self, supplier: &Supplier) -> DbResult<()> {
        debug!(id = %supplier.id, name = %supplier.name, "Inserting supplier");

        sqlx::query(
            r#"
            INSERT INTO suppliers (id, name, phone, created_at)
            VALUES (?1, ?2, ?3, ?4)
            "#,
        )
        .bind(&supplier.id)
        .bind(&supplier.name)
        .bind(&supplier.phone)
        .bind(supplier.created_at)
        .execute(&mut *self.conn)
        .await?;

        Ok(())
    }

    pub async fn get(&mut self, id: &str) -> DbResult<Option<Supplier>> {
        let supplier = sqlx::query_as::<_, Supplier>(
            "SELECT id, name, phone, created_at FROM suppliers WHERE id = ?1",
        )
        .bind(id)
        .fetch_optional(&mut *self.conn)
        .await?;

        Ok(supplier)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pool::{Database, DbConfig};

    #[tokio::test]
    async fn test_credit_never_goes_negative() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let mut conn = db.acquire().await.unwrap();
        let now = Utc::now();

        let mut repo = CustomerRepository::new(&mut conn);
        repo.insert(&Customer {
            id: "c1".to_string(),
            name: "Ama".to_string(),
            phone: None,
            credit_balance: Money::from_cents(1_000),
            created_at: now,
            updated_at: now,
        })
        .await
        .unwrap();

        assert_eq!(
            repo.adjust_credit("c1", Money::from_cents(-400)).await.unwrap(),
            Some(Money::from_cents(600))
        );
        assert_eq!(repo.adjust_credit("c1", Money::from_cents(-601)).await.unwrap(), None);
        assert_eq!(
            repo.get("c1").await.unwrap().unwrap().credit_balance,
            Money::from_cents(600)
        );
        assert_eq!(repo.adjust_credit("missing", Money::from_cents(1)).await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_credit_capped_at_max_money() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let mut conn = db.acquire().await.unwrap();
        let now = Utc::now();

        let mut repo = CustomerRepository::new(&mut conn);
        repo.insert(&Customer {
            id: "c1".to_string(),
            name: "Ama".to_string(),
            phone: None,
            credit_balance: Money::from_cents(100),
            created_at: now,
            updated_at: now,
        })
        .await
        .unwrap();

        assert_eq!(repo.adjust_credit("c1", Money::from_cents(i64::MAX)).await.unwrap(), None);
        assert_eq!(
            repo.adjust_credit("c1", Money::from_cents(MAX_MONEY.cents() - 100))
                .await
                .unwrap(),
            Some(MAX_MONEY)
        );
        assert_eq!(repo.adjust_credit("c1", Money::from_cents(1)).await.unwrap(), None);
        assert_eq!(repo.get("c1").await.unwrap().unwrap().credit_balance, MAX_MONEY);
    }
}
