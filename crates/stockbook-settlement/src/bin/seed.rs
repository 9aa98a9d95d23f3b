//! # Seed Data Generator
//!
//! Registers a small demo catalogue and runs a few settlements through the
//! engine so a fresh database has stock, open balances and store credit to
//! look at.
//!
//! ## Usage
//! ```bash
//! # Use the default config (stockbook.toml in the platform config dir)
//! cargo run -p stockbook-settlement --bin seed
//!
//! # Specify a config file
//! cargo run -p stockbook-settlement --bin seed -- --config ./dev.toml
//!
//! # Override just the database path
//! STOCKBOOK_DB_PATH=./data/stockbook.db cargo run -p stockbook-settlement --bin seed
//! ```
//!
//! ## What It Does
//! 1. Registers one customer, one supplier, three products and one material
//! 2. Receives opening stock for every item
//! 3. Sells on account, then overpays a second sale so the excess settles
//!    the first and the rest lands as store credit
//! 4. Books a part-paid purchase and pays it off

use std::env;
use std::path::PathBuf;

use chrono::{Duration, Utc};

use stockbook_core::settlement::CreditRequest;
use stockbook_core::{Actor, ItemKind, Money, ObligationKind, PaymentMode, Quantity, Role};
use stockbook_settlement::{
    init_tracing, CreatePurchaseRequest, CreateSaleRequest, EngineConfig, NewCustomer,
    NewMaterial, NewProduct, NewSupplier, ReceiveGoodsRequest, RecordPaymentRequest,
    SaleLineInput, SettlementEngine,
};

/// (sku, name, unit, price in cents, opening stock)
const PRODUCTS: &[(&str, &str, &str, i64, i64)] = &[
    ("RICE-5KG", "Basmati Rice 5kg", "bag", 185_000, 40),
    ("ATTA-10KG", "Chakki Atta 10kg", "bag", 142_000, 25),
    ("OIL-1L", "Cooking Oil 1L", "btl", 56_000, 60),
];

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    init_tracing();

    let args: Vec<String> = env::args().collect();
    let mut config_path: Option<PathBuf> = None;

    let mut i = 1;
    while i < args.len() {
        match args[i].as_str() {
            "--config" | "-c" => {
                if i + 1 < args.len() {
                    config_path = Some(PathBuf::from(&args[i + 1]));
                    i += 1;
                }
            }
            "--help" | "-h" => {
                println!("Stockbook Seed Data Generator");
                println!();
                println!("Usage: seed [OPTIONS]");
                println!();
                println!("Options:");
                println!("  -c, --config <PATH>  Config file (default: platform config dir)");
                println!("  -h, --help           Show this help message");
                return Ok(());
            }
            _ => {}
        }
        i += 1;
    }

    let config = EngineConfig::load(config_path)?;
    println!("Stockbook Seed Data Generator");
    println!("=============================");
    println!("Database: {}", config.database.path.display());
    println!();

    let engine = SettlementEngine::open(config).await?;
    let owner = Actor::new("seed", Role::Owner);

    // Registry
    let customer = engine
        .register_customer(
            &owner,
            NewCustomer {
                name: "Bilal Traders".into(),
                phone: Some("0300-1234567".into()),
                opening_credit: Money::zero(),
            },
        )
        .await?;
    let supplier = engine
        .register_supplier(
            &owner,
            NewSupplier {
                name: "Punjab Flour Mills".into(),
                phone: None,
            },
        )
        .await?;
    let material = engine
        .register_material(
            &owner,
            NewMaterial {
                code: "WHEAT".into(),
                name: "Wheat".into(),
                unit: "kg".into(),
            },
        )
        .await?;

    let mut product_ids = Vec::with_capacity(PRODUCTS.len());
    for (sku, name, unit, price, opening) in PRODUCTS {
        let product = engine
            .register_product(
                &owner,
                NewProduct {
                    sku: (*sku).into(),
                    name: (*name).into(),
                    unit: (*unit).into(),
                    unit_price: Money::from_cents(*price),
                },
            )
            .await?;
        engine
            .receive_goods(
                &owner,
                ReceiveGoodsRequest {
                    item_kind: ItemKind::Product,
                    item_id: product.id.clone(),
                    quantity: Quantity::from_units(*opening),
                    reference_number: Some(format!("GRN-{}", sku)),
                    notes: Some("Opening stock".into()),
                },
            )
            .await?;
        product_ids.push((product.id, product.unit_price));
    }
    println!("✓ Registered {} products with opening stock", product_ids.len());

    // Sales
    let (rice, rice_price) = &product_ids[0];
    let (oil, oil_price) = &product_ids[2];

    let on_account = engine
        .create_sale(
            &owner,
            CreateSaleRequest {
                customer_id: customer.id.clone(),
                items: vec![SaleLineInput {
                    product_id: rice.clone(),
                    quantity: Quantity::from_units(2),
                    unit_price: *rice_price,
                }],
                occurred_at: Utc::now() - Duration::days(3),
                payment_mode: PaymentMode::OnAccount,
                cash_tendered: Money::zero(),
                credit: CreditRequest::default(),
            },
        )
        .await?;
    println!(
        "✓ Sale {} on account, balance {}",
        on_account.sale.code, on_account.sale.balance
    );

    let overpaid = engine
        .create_sale(
            &owner,
            CreateSaleRequest {
                customer_id: customer.id.clone(),
                items: vec![SaleLineInput {
                    product_id: oil.clone(),
                    quantity: Quantity::from_units(3),
                    unit_price: *oil_price,
                }],
                occurred_at: Utc::now(),
                payment_mode: PaymentMode::Cash,
                cash_tendered: Money::from_cents(600_000),
                credit: CreditRequest::default(),
            },
        )
        .await?;
    println!(
        "✓ Sale {} paid in cash; {} applied to older sales, {} to store credit",
        overpaid.sale.code, overpaid.excess_applied, overpaid.credit_added
    );

    // Purchase
    let purchase = engine
        .create_purchase(
            &owner,
            CreatePurchaseRequest {
                supplier_id: supplier.id.clone(),
                material_id: material.id.clone(),
                quantity: Quantity::from_units(500),
                total: Money::from_cents(6_250_000),
                amount_paid: Money::from_cents(2_000_000),
                occurred_at: Utc::now(),
                payment_mode: PaymentMode::BankTransfer,
                notes: None,
            },
        )
        .await?;
    engine
        .record_payment(
            &owner,
            RecordPaymentRequest {
                obligation_kind: ObligationKind::Purchase,
                obligation_id: purchase.id.clone(),
                amount: purchase.balance,
                payment_date: Utc::now(),
                payment_mode: PaymentMode::Cheque,
                notes: Some("Final settlement".into()),
            },
        )
        .await?;
    println!("✓ Purchase {} booked and paid off", purchase.code);

    let credit = engine.customer_credit(&owner, &customer.id).await?;
    let chain = engine
        .verify_stock_chain(&owner, ItemKind::Material, &material.id)
        .await?;

    println!();
    println!("Customer credit: {}", credit);
    println!(
        "Wheat ledger: {} entries, intact: {}",
        chain.entries,
        chain.is_intact()
    );
    println!("✓ Seed complete!");

    engine.close().await;
    Ok(())
}
