//! Registering the parties and items the engine trades in. Stock rows are
//! not created here; they appear on the first movement.

use chrono::Utc;
use serde::{Deserialize, Serialize};
use tracing::info;
use ts_rs::TS;

use stockbook_core::validation::{validate_code, validate_name, validate_non_negative, validate_price};
use stockbook_core::{Actor, Customer, Material, Money, Operation, Product, Supplier};
use stockbook_db::{
    new_id, CustomerRepository, MaterialRepository, ProductRepository, SupplierRepository,
};

use crate::engine::SettlementEngine;
use crate::error::EngineResult;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct NewCustomer {
    pub name: String,
    #[serde(default)]
    pub phone: Option<String>,
    /// Store credit carried over from another system. The only credit that
    /// enters outside a sale or payment, so no payment record backs it.
    #[serde(default)]
    pub opening_credit: Money,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct NewSupplier {
    pub name: String,
    #[serde(default)]
    pub phone: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct NewProduct {
    pub sku: String,
    pub name: String,
    pub unit: String,
    pub unit_price: Money,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct NewMaterial {
    pub code: String,
    pub name: String,
    pub unit: String,
}

fn clean_phone(phone: Option<String>) -> Option<String> {
    phone
        .map(|p| p.trim().to_string())
        .filter(|p| !p.is_empty())
}

impl SettlementEngine {
    pub async fn register_customer(
        &self,
        actor: &Actor,
        request: NewCustomer,
    ) -> EngineResult<Customer> {
        self.authorize(actor, Operation::ManageRegistry)?;
        validate_name(&request.name)?;
        validate_non_negative("opening_credit", request.opening_credit)?;

        let now = Utc::now();
        let customer = Customer {
            id: new_id(),
            name: request.name.trim().to_string(),
            phone: clean_phone(request.phone),
            credit_balance: request.opening_credit,
            created_at: now,
            updated_at: now,
        };

        let mut conn = self.db.acquire().await?;
        CustomerRepository::new(&mut conn).insert(&customer).await?;

        info!(customer_id = %customer.id, name = %customer.name, "Customer registered");
        Ok(customer)
    }

    pub async fn register_supplier(
        &self,
        actor: &Actor,
        request: NewSupplier,
    ) -> EngineResult<Supplier> {
        self.authorize(actor, Operation::ManageRegistry)?;
        validate_name(&request.name)?;

        let supplier = Supplier {
            id: new_id(),
            name: request.name.trim().to_string(),
            phone: clean_phone(request.phone),
            created_at: Utc::now(),
        };

        let mut conn = self.db.acquire().await?;
        SupplierRepository::new(&mut conn).insert(&supplier).await?;

        info!(supplier_id = %supplier.id, name = %supplier.name, "Supplier registered");
        Ok(supplier)
    }

    /// A duplicate SKU is a `Conflict`.
    pub async fn register_product(
        &self,
        actor: &Actor,
        request: NewProduct,
    ) -> EngineResult<Product> {
        self.authorize(actor, Operation::ManageRegistry)?;
        validate_code("sku", &request.sku)?;
        validate_name(&request.name)?;
        validate_code("unit", &request.unit)?;
        validate_price(request.unit_price)?;

        let product = Product {
            id: new_id(),
            sku: request.sku.trim().to_string(),
            name: request.name.trim().to_string(),
            unit: request.unit.trim().to_string(),
            unit_price: request.unit_price,
            is_active: true,
            created_at: Utc::now(),
        };

        let mut conn = self.db.acquire().await?;
        ProductRepository::new(&mut conn).insert(&product).await?;

        info!(product_id = %product.id, sku = %product.sku, "Product registered");
        Ok(product)
    }

    pub async fn register_material(
        &self,
        actor: &Actor,
        request: NewMaterial,
    ) -> EngineResult<Material> {
        self.authorize(actor, Operation::ManageRegistry)?;
        validate_code("code", &request.code)?;
        validate_name(&request.name)?;
        validate_code("unit", &request.unit)?;

        let material = Material {
            id: new_id(),
            code: request.code.trim().to_string(),
            name: request.name.trim().to_string(),
            unit: request.unit.trim().to_string(),
            created_at: Utc::now(),
        };

        let mut conn = self.db.acquire().await?;
        MaterialRepository::new(&mut conn).insert(&material).await?;

        info!(material_id = %material.id, code = %material.code, "Material registered");
        Ok(material)
    }
}
