//! # Domain Types
//!
//! Entities and enums shared by every layer of Stockbook.
//!
//! ## Type Map
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                         Domain Types                                    │
//! │                                                                         │
//! │  ┌─────────────────┐   ┌─────────────────┐   ┌─────────────────┐       │
//! │  │   StockItem     │   │  LedgerEntry    │   │      Sale       │       │
//! │  │  ─────────────  │   │  ─────────────  │   │  ─────────────  │       │
//! │  │  item_kind/id   │◄──│  stock_item_id  │   │  customer_id    │       │
//! │  │  quantity_on_   │   │  before/change/ │   │  total          │       │
//! │  │    hand         │   │    after        │   │  amount_paid    │       │
//! │  └─────────────────┘   │  reference_id ──┼──►│  balance/status │       │
//! │                        └─────────────────┘   └────────┬────────┘       │
//! │  ┌─────────────────┐   ┌─────────────────┐            │                │
//! │  │    Purchase     │   │ PaymentRecord   │◄───────────┘                │
//! │  │  supplier_id    │──►│  obligation_id  │                             │
//! │  │  material_id    │   │  amount         │                             │
//! │  └─────────────────┘   └─────────────────┘                             │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Storage Units
//! Every `Money` field is persisted as integer cents and every `Quantity`
//! field as integer thousandths of a unit.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use ts_rs::TS;

use crate::money::Money;
use crate::quantity::Quantity;
use crate::settlement::ObligationTotals;

// =============================================================================
// Enums
// =============================================================================

/// What kind of stockable thing an inventory row tracks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "lowercase"))]
#[ts(export)]
#[serde(rename_all = "snake_case")]
pub enum ItemKind {
    /// Finished goods sold to customers.
    Product,
    /// Raw materials bought from suppliers.
    Material,
}

impl ItemKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ItemKind::Product => "product",
            ItemKind::Material => "material",
        }
    }
}

impl fmt::Display for ItemKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The business event behind a ledger entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "snake_case"))]
#[ts(export)]
#[serde(rename_all = "snake_case")]
pub enum TransactionKind {
    Sale,
    Purchase,
    Adjustment,
    GoodsReceived,
    Replacement,
}

impl TransactionKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            TransactionKind::Sale => "sale",
            TransactionKind::Purchase => "purchase",
            TransactionKind::Adjustment => "adjustment",
            TransactionKind::GoodsReceived => "goods_received",
            TransactionKind::Replacement => "replacement",
        }
    }
}

impl fmt::Display for TransactionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// What a ledger entry's `reference_id` points at.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "snake_case"))]
#[ts(export)]
#[serde(rename_all = "snake_case")]
pub enum ReferenceKind {
    Sale,
    Purchase,
    Adjustment,
    GoodsReceipt,
    Replacement,
}

/// Sales and purchases are both obligations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "lowercase"))]
#[ts(export)]
#[serde(rename_all = "snake_case")]
pub enum ObligationKind {
    Sale,
    Purchase,
}

impl ObligationKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ObligationKind::Sale => "sale",
            ObligationKind::Purchase => "purchase",
        }
    }

    /// The ledger transaction kind stock movements of this obligation use.
    pub fn transaction_kind(&self) -> TransactionKind {
        match self {
            ObligationKind::Sale => TransactionKind::Sale,
            ObligationKind::Purchase => TransactionKind::Purchase,
        }
    }

    /// The ledger reference kind pointing at this obligation.
    pub fn reference_kind(&self) -> ReferenceKind {
        match self {
            ObligationKind::Sale => ReferenceKind::Sale,
            ObligationKind::Purchase => ReferenceKind::Purchase,
        }
    }
}

impl fmt::Display for ObligationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Payment status of an obligation.
///
/// Never set by hand: always the output of
/// [`derive_status`](crate::settlement::derive_status).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "lowercase"))]
#[ts(export)]
#[serde(rename_all = "snake_case")]
pub enum ObligationStatus {
    /// Nothing paid yet.
    Pending,
    /// Something paid, balance outstanding.
    Partial,
    /// Fully paid.
    Paid,
}

impl fmt::Display for ObligationStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ObligationStatus::Pending => "pending",
            ObligationStatus::Partial => "partial",
            ObligationStatus::Paid => "paid",
        };
        f.write_str(s)
    }
}

/// How money changed hands.
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "snake_case"))]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "snake_case")]
pub enum PaymentMode {
    Cash,
    Card,
    BankTransfer,
    Cheque,
    /// Nothing collected at the counter; the balance stays on account.
    OnAccount,
    /// Consumed from the customer's credit balance.
    StoreCredit,
}

/// Direction of a manual stock adjustment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "snake_case")]
pub enum AdjustmentDirection {
    Add,
    Subtract,
}

/// Business reason for handing out a replacement.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "lowercase"))]
#[ts(export)]
#[serde(rename_all = "snake_case")]
pub enum ReplacementReason {
    Damaged,
    Defective,
    Expired,
    Other,
}

// =============================================================================
// Parties & Catalog
// =============================================================================

/// A customer. Holds the store-credit balance.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
pub struct Customer {
    pub id: String,
    pub name: String,
    pub phone: Option<String>,
    /// Prepaid/overpaid funds not yet consumed. Never negative.
    pub credit_balance: Money,
    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,
    #[ts(as = "String")]
    pub updated_at: DateTime<Utc>,
}

/// A supplier of raw materials. Suppliers hold no store credit.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
pub struct Supplier {
    pub id: String,
    pub name: String,
    pub phone: Option<String>,
    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,
}

/// A product available for sale.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
pub struct Product {
    pub id: String,
    /// Stock Keeping Unit - business identifier.
    pub sku: String,
    pub name: String,
    pub unit: String,
    /// List price; sales may override it per line.
    pub unit_price: Money,
    pub is_active: bool,
    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,
}

/// A raw material consumed in production.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
pub struct Material {
    pub id: String,
    pub code: String,
    pub name: String,
    pub unit: String,
    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,
}

// =============================================================================
// Stock
// =============================================================================

/// Caller-supplied policy for a lazily created stock row.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct StockDefaults {
    pub unit: String,
    pub minimum_stock: Quantity,
    pub reorder_point: Quantity,
    pub maximum_stock: Option<Quantity>,
}

impl Default for StockDefaults {
    fn default() -> Self {
        StockDefaults {
            unit: "pcs".to_string(),
            minimum_stock: Quantity::zero(),
            reorder_point: Quantity::zero(),
            maximum_stock: None,
        }
    }
}

/// Current quantity of one product or material.
///
/// ## Invariant
/// `quantity_on_hand >= 0` after every committed ledger entry, and it equals
/// the `quantity_after` of the item's most recent ledger entry.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
pub struct StockItem {
    pub id: String,
    pub item_id: String,
    pub item_kind: ItemKind,
    pub quantity_on_hand: Quantity,
    pub unit: String,
    pub minimum_stock: Quantity,
    pub reorder_point: Quantity,
    pub maximum_stock: Option<Quantity>,
    #[ts(as = "Option<String>")]
    pub last_restocked_at: Option<DateTime<Utc>>,
    /// Bumped on every quantity change.
    pub version: i64,
    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,
    #[ts(as = "String")]
    pub updated_at: DateTime<Utc>,
}

impl StockItem {
    /// Builds a fresh, empty stock row from defaults.
    pub fn initial(
        id: String,
        item_kind: ItemKind,
        item_id: &str,
        defaults: &StockDefaults,
        now: DateTime<Utc>,
    ) -> Self {
        StockItem {
            id,
            item_id: item_id.to_string(),
            item_kind,
            quantity_on_hand: Quantity::zero(),
            unit: defaults.unit.clone(),
            minimum_stock: defaults.minimum_stock,
            reorder_point: defaults.reorder_point,
            maximum_stock: defaults.maximum_stock,
            last_restocked_at: None,
            version: 0,
            created_at: now,
            updated_at: now,
        }
    }

    /// True when `quantity` can be taken out without going negative.
    #[inline]
    pub fn can_supply(&self, quantity: Quantity) -> bool {
        self.quantity_on_hand >= quantity
    }

    /// True when stock has fallen to or below the reorder point.
    #[inline]
    pub fn needs_reorder(&self) -> bool {
        self.quantity_on_hand <= self.reorder_point
    }
}

// =============================================================================
// Inventory Ledger
// =============================================================================

/// Immutable record of one stock quantity change.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
pub struct LedgerEntry {
    pub id: String,
    pub stock_item_id: String,
    pub item_id: String,
    pub item_kind: ItemKind,
    pub transaction_kind: TransactionKind,
    /// Signed: negative for stock leaving.
    pub quantity_change: Quantity,
    pub quantity_before: Quantity,
    pub quantity_after: Quantity,
    pub reference_id: String,
    pub reference_kind: ReferenceKind,
    pub notes: Option<String>,
    pub actor_id: Option<String>,
    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,
}

impl LedgerEntry {
    /// `quantity_after == quantity_before + quantity_change`.
    pub fn is_balanced(&self) -> bool {
        self.quantity_before.checked_add(self.quantity_change) == Some(self.quantity_after)
    }
}

/// Paging window for ledger listings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct Page {
    pub limit: u32,
    pub offset: u32,
}

impl Default for Page {
    fn default() -> Self {
        Page {
            limit: 50,
            offset: 0,
        }
    }
}

// =============================================================================
// Obligations
// =============================================================================

/// Common view over sales and purchases.
pub trait Obligation {
    fn kind(&self) -> ObligationKind;
    fn obligation_id(&self) -> &str;
    fn totals(&self) -> ObligationTotals;
}

/// A sale to a customer with one or more product lines.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
pub struct Sale {
    pub id: String,
    /// Human-readable daily sequence code, e.g. `SAL-20261017-0001`.
    pub code: String,
    pub customer_id: String,
    pub total: Money,
    pub amount_paid: Money,
    pub balance: Money,
    pub status: ObligationStatus,
    pub payment_mode: PaymentMode,
    /// Supply date; drives oldest-debt-first allocation.
    #[ts(as = "String")]
    pub occurred_at: DateTime<Utc>,
    pub created_by: String,
    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,
    #[ts(as = "String")]
    pub updated_at: DateTime<Utc>,
    #[cfg_attr(feature = "sqlx", sqlx(skip))]
    pub items: Vec<SaleLine>,
}

impl Obligation for Sale {
    fn kind(&self) -> ObligationKind {
        ObligationKind::Sale
    }

    fn obligation_id(&self) -> &str {
        &self.id
    }

    fn totals(&self) -> ObligationTotals {
        ObligationTotals {
            total: self.total,
            amount_paid: self.amount_paid,
            balance: self.balance,
            status: self.status,
        }
    }
}

impl Sale {
    /// Copies recomputed totals onto the sale.
    pub fn apply_totals(&mut self, totals: &ObligationTotals) {
        self.total = totals.total;
        self.amount_paid = totals.amount_paid;
        self.balance = totals.balance;
        self.status = totals.status;
    }

    /// Returns the line for a product, if the sale contains it.
    pub fn line_for_product(&self, product_id: &str) -> Option<&SaleLine> {
        self.items.iter().find(|l| l.product_id == product_id)
    }
}

/// A product line on a sale.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
pub struct SaleLine {
    pub id: String,
    pub sale_id: String,
    pub product_id: String,
    pub quantity: Quantity,
    /// Price at time of sale (frozen).
    pub unit_price: Money,
    /// `unit_price × quantity`.
    pub line_total: Money,
    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,
}

/// A purchase of a single raw material from a supplier.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
pub struct Purchase {
    pub id: String,
    pub code: String,
    pub supplier_id: String,
    pub material_id: String,
    pub quantity: Quantity,
    pub total: Money,
    pub amount_paid: Money,
    pub balance: Money,
    pub status: ObligationStatus,
    pub payment_mode: PaymentMode,
    #[ts(as = "String")]
    pub occurred_at: DateTime<Utc>,
    pub created_by: String,
    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,
    #[ts(as = "String")]
    pub updated_at: DateTime<Utc>,
}

impl Obligation for Purchase {
    fn kind(&self) -> ObligationKind {
        ObligationKind::Purchase
    }

    fn obligation_id(&self) -> &str {
        &self.id
    }

    fn totals(&self) -> ObligationTotals {
        ObligationTotals {
            total: self.total,
            amount_paid: self.amount_paid,
            balance: self.balance,
            status: self.status,
        }
    }
}

impl Purchase {
    pub fn apply_totals(&mut self, totals: &ObligationTotals) {
        self.total = totals.total;
        self.amount_paid = totals.amount_paid;
        self.balance = totals.balance;
        self.status = totals.status;
    }
}

/// One payment towards an obligation. Append-only.
///
/// The sum of an obligation's records equals its `amount_paid`.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
pub struct PaymentRecord {
    pub id: String,
    pub obligation_kind: ObligationKind,
    pub obligation_id: String,
    pub amount: Money,
    #[ts(as = "String")]
    pub payment_date: DateTime<Utc>,
    pub payment_mode: PaymentMode,
    pub notes: Option<String>,
    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,
}

/// A replacement handed out against a previous sale.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
pub struct ReplacementRecord {
    pub id: String,
    pub code: String,
    pub sale_id: String,
    pub product_id: String,
    pub quantity: Quantity,
    pub reason: ReplacementReason,
    pub notes: Option<String>,
    pub ledger_entry_id: String,
    pub actor_id: String,
    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::settlement::derive_status;

    fn sample_sale(total: i64, paid: i64) -> Sale {
        let now = Utc::now();
        let total = Money::from_cents(total);
        let amount_paid = Money::from_cents(paid);
        Sale {
            id: "s1".to_string(),
            code: "SAL-20260101-0001".to_string(),
            customer_id: "c1".to_string(),
            total,
            amount_paid,
            balance: total - amount_paid,
            status: derive_status(amount_paid, total),
            payment_mode: PaymentMode::Cash,
            occurred_at: now,
            created_by: "u1".to_string(),
            created_at: now,
            updated_at: now,
            items: Vec::new(),
        }
    }

    #[test]
    fn test_sale_totals_view() {
        let sale = sample_sale(20_000, 5_000);
        let totals = sale.totals();
        assert_eq!(totals.balance, Money::from_cents(15_000));
        assert_eq!(totals.status, ObligationStatus::Partial);
        assert!(totals.is_consistent());
        assert_eq!(sale.kind(), ObligationKind::Sale);
    }

    #[test]
    fn test_stock_item_initial_and_checks() {
        let defaults = StockDefaults {
            unit: "kg".to_string(),
            minimum_stock: Quantity::from_units(1),
            reorder_point: Quantity::from_units(2),
            maximum_stock: Some(Quantity::from_units(100)),
        };
        let item = StockItem::initial("st1".into(), ItemKind::Material, "m1", &defaults, Utc::now());
        assert_eq!(item.quantity_on_hand, Quantity::zero());
        assert_eq!(item.unit, "kg");
        assert!(item.needs_reorder());
        assert!(!item.can_supply(Quantity::from_milli(1)));
        assert!(item.can_supply(Quantity::zero()));
    }

    #[test]
    fn test_enum_wire_names() {
        assert_eq!(
            serde_json::to_string(&TransactionKind::GoodsReceived).unwrap(),
            "\"goods_received\""
        );
        assert_eq!(serde_json::to_string(&ObligationStatus::Paid).unwrap(), "\"paid\"");
        assert_eq!(ItemKind::Material.to_string(), "material");
    }
}
