//! # Catalog Repositories
//!
//! Products (sold) and materials (bought). Stock levels live in
//! `stock_items`, not here.

use sqlx::SqliteConnection;
use tracing::debug;

use crate::error::DbResult;
use stockbook_core::{Material, Product};

/// Repository for product database operations.
#[derive(Debug)]
pub struct ProductRepository<'c> {
    conn: &'c mut SqliteConnection,
}

impl<'c> ProductRepository<'c> {
    pub fn new(conn: &'c mut SqliteConnection) -> Self {
        ProductRepository { conn }
    }

    pub async fn insert(&mut self, product: &Product) -> DbResult<()> {
        debug!(id = %product.id, sku = %product.sku, "Inserting product");

        sqlx::query(
            r#"
            INSERT INTO products (id, sku, name, unit, unit_price, is_active, created_at)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
            "#,
        )
        .bind(&product.id)
        .bind(&product.sku)
        .bind(&product.name)
        .bind(&product.unit)
        .bind(product.unit_price)
        .bind(product.is_active)
        .bind(product.created_at)
        .execute(&mut *self.conn)
        .await?;

        Ok(())
    }

    pub async fn get(&mut self, id: &str) -> DbResult<Option<Product>> {
        let product = sqlx::query_as::<_, Product>(
            r#"
            SELECT id, sku, name, unit, unit_price, is_active, created_at
            FROM products
            WHERE id = ?1
            "#,
        )
        .bind(id)
        .fetch_optional(&mut *self.conn)
        .await?;

        Ok(product)
    }

    pub async fn get_by_sku(&mut self, sku: &str) -> DbResult<Option<Product>> {
        let product = sqlx::query_as::<_, Product>(
            r#"
            SELECT id, sku, name, unit, unit_price, is_active, created_at
            FROM products
            WHERE sku = ?1
            "#,
        )
        .bind(sku)
        .fetch_optional(&mut *self.conn)
        .await?;

        Ok(product)
    }
}

/// Repository for raw material database operations.
#[derive(Debug)]
pub struct MaterialRepository<'c> {
    conn: &'c mut SqliteConnection,
}

impl<'c> MaterialRepository<'c> {
    pub fn new(conn: &'c mut SqliteConnection) -> Self {
        MaterialRepository { conn }
    }

    pub async fn insert(&mut self, material: &Material) -> DbResult<()> {
        debug!(id = %material.id, code = %material.code, "Inserting material");

        sqlx::query(
            r#"
            INSERT INTO materials (id, code, name, unit, created_at)
            VALUES (?1, ?2, ?3, ?4, ?5)
            "#,
        )
        .bind(&material.id)
        .bind(&material.code)
        .bind(&material.name)
        .bind(&material.unit)
        .bind(material.created_at)
        .execute(&mut *self.conn)
        .await?;

        Ok(())
    }

    pub async fn get(&mut self, id: &str) -> DbResult<Option<Material>> {
        let material = sqlx::query_as::<_, Material>(
            "SELECT id, code, name, unit, created_at FROM materials WHERE id = ?1",
        )
        .bind(id)
        .fetch_optional(&mut *self.conn)
        .await?;

        Ok(material)
    }
}
