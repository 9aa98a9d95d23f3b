//! # Inventory Ledger
//!
//! The only way stock changes. [`InventoryLedger::record`] reads the stock
//! row, applies the delta through the compare-and-set path and appends an
//! entry with before/after snapshots. Both writes share the caller's
//! transaction, so they commit together or not at all.
//!
//! ## Chain Invariant
//! ```text
//! entry[0].before = 0
//! entry[i].before = entry[i-1].after
//! entry[i].after  = entry[i].before + entry[i].change
//! entry[last].after = stock_items.quantity_on_hand
//! ```

use chrono::Utc;
use serde::Serialize;
use sqlx::SqliteConnection;
use tracing::{debug, warn};
use ts_rs::TS;

use stockbook_core::{
    CoreError, ItemKind, LedgerEntry, Page, Quantity, ReferenceKind, TransactionKind,
};
use stockbook_db::{new_id, LedgerRepository, StockRepository};

use crate::error::EngineResult;
use crate::stock::StockStore;

/// One quantity change to record.
#[derive(Debug, Clone, Copy)]
pub struct Posting<'a> {
    pub transaction_kind: TransactionKind,
    /// Signed; negative for stock leaving.
    pub quantity_change: Quantity,
    pub reference_id: &'a str,
    pub reference_kind: ReferenceKind,
    pub notes: Option<&'a str>,
    pub actor_id: Option<&'a str>,
}

/// Outcome of walking one item's ledger.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, TS)]
#[ts(export)]
pub struct ChainReport {
    pub stock_item_id: String,
    pub item_kind: ItemKind,
    pub item_id: String,
    pub entries: usize,
    pub live_quantity: Quantity,
    /// `quantity_after` of the newest entry (zero when there are none).
    pub ledger_quantity: Quantity,
    pub breaks: Vec<ChainBreak>,
}

impl ChainReport {
    pub fn is_intact(&self) -> bool {
        self.breaks.is_empty() && self.live_quantity == self.ledger_quantity
    }
}

/// An entry that does not follow from its predecessor.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, TS)]
#[ts(export)]
pub struct ChainBreak {
    pub entry_id: String,
    pub expected_before: Quantity,
    pub quantity_before: Quantity,
    /// False when `after != before + change` inside the entry itself.
    pub balanced: bool,
}

/// Ledger bound to one connection.
#[derive(Debug)]
pub struct InventoryLedger<'c> {
    conn: &'c mut SqliteConnection,
}

impl<'c> InventoryLedger<'c> {
    pub fn new(conn: &'c mut SqliteConnection) -> Self {
        InventoryLedger { conn }
    }

    /// Applies `posting` to stock row `stock_item_id` and appends the entry.
    ///
    /// Goods received and purchases also stamp `last_restocked_at`.
    pub async fn record(
        &mut self,
        stock_item_id: &str,
        posting: Posting<'_>,
    ) -> EngineResult<LedgerEntry> {
        let stock = StockRepository::new(&mut *self.conn)
            .get(stock_item_id)
            .await?
            .ok_or_else(|| CoreError::not_found("Stock item", stock_item_id))?;

        let now = Utc::now();
        let quantity_before = stock.quantity_on_hand;
        let restocks = posting.quantity_change.is_positive()
            && matches!(
                posting.transaction_kind,
                TransactionKind::GoodsReceived | TransactionKind::Purchase
            );

        let updated = StockStore::new(&mut *self.conn)
            .apply_delta(
                stock_item_id,
                posting.quantity_change,
                Some(quantity_before),
                restocks.then_some(now),
            )
            .await?;

        let entry = LedgerEntry {
            id: new_id(),
            stock_item_id: stock.id.clone(),
            item_id: stock.item_id.clone(),
            item_kind: stock.item_kind,
            transaction_kind: posting.transaction_kind,
            quantity_change: posting.quantity_change,
            quantity_before,
            quantity_after: updated.quantity_on_hand,
            reference_id: posting.reference_id.to_string(),
            reference_kind: posting.reference_kind,
            notes: posting.notes.map(str::to_string),
            actor_id: posting.actor_id.map(str::to_string),
            created_at: now,
        };

        LedgerRepository::new(&mut *self.conn).insert(&entry).await?;

        debug!(
            entry_id = %entry.id,
            item_id = %entry.item_id,
            kind = %entry.transaction_kind,
            before = %entry.quantity_before,
            change = %entry.quantity_change,
            after = %entry.quantity_after,
            reference = %entry.reference_id,
            "Ledger entry recorded"
        );

        Ok(entry)
    }

    /// Newest-first page of an item's entries. Empty when the item has
    /// never been stocked.
    pub async fn list_for_item(
        &mut self,
        item_kind: ItemKind,
        item_id: &str,
        page: Page,
    ) -> EngineResult<Vec<LedgerEntry>> {
        let Some(stock) = StockRepository::new(&mut *self.conn).find(item_kind, item_id).await? else {
            return Ok(Vec::new());
        };

        Ok(LedgerRepository::new(&mut *self.conn)
            .list_for_stock_item(&stock.id, page)
            .await?)
    }

    /// Every entry posted for one sale, purchase, adjustment or receipt.
    pub async fn list_by_reference(&mut self, reference_id: &str) -> EngineResult<Vec<LedgerEntry>> {
        Ok(LedgerRepository::new(&mut *self.conn)
            .list_by_reference(reference_id)
            .await?)
    }

    /// Walks an item's entries oldest first and checks them against each
    /// other and the live quantity.
    pub async fn verify_item(&mut self, item_kind: ItemKind, item_id: &str) -> EngineResult<ChainReport> {
        let stock = StockRepository::new(&mut *self.conn)
            .find(item_kind, item_id)
            .await?
            .ok_or_else(|| CoreError::not_found("Stock item", format!("{} {}", item_kind, item_id)))?;

        let chain = LedgerRepository::new(&mut *self.conn)
            .chain_for_stock_item(&stock.id)
            .await?;

        let mut expected = Quantity::zero();
        let mut breaks = Vec::new();
        for entry in &chain {
            let balanced = entry.is_balanced();
            if entry.quantity_before != expected || !balanced {
                breaks.push(ChainBreak {
                    entry_id: entry.id.clone(),
                    expected_before: expected,
                    quantity_before: entry.quantity_before,
                    balanced,
                });
            }
            expected = entry.quantity_after;
        }

        let report = ChainReport {
            stock_item_id: stock.id,
            item_kind,
            item_id: item_id.to_string(),
            entries: chain.len(),
            live_quantity: stock.quantity_on_hand,
            ledger_quantity: expected,
            breaks,
        };

        if !report.is_intact() {
            warn!(
                item_id = %item_id,
                breaks = report.breaks.len(),
                live = %report.live_quantity,
                ledger = %report.ledger_quantity,
                "Ledger chain does not match stock"
            );
        }

        Ok(report)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorCode;
    use stockbook_core::{Money, Product, StockDefaults};
    use stockbook_db::{Database, DbConfig, ProductRepository};

    async fn stocked_product(db: &Database) -> String {
        let mut conn = db.acquire().await.unwrap();
        ProductRepository::new(&mut conn)
            .insert(&Product {
                id: "p1".into(),
                sku: "SKU-1".into(),
                name: "Widget".into(),
                unit: "pcs".into(),
                unit_price: Money::from_cents(100),
                is_active: true,
                created_at: Utc::now(),
            })
            .await
            .unwrap();
        let item = StockStore::new(&mut conn)
            .get_or_init(ItemKind::Product, "p1", &StockDefaults::default())
            .await
            .unwrap();
        item.id
    }

    fn posting(kind: TransactionKind, units: i64, reference_id: &str) -> Posting<'_> {
        Posting {
            transaction_kind: kind,
            quantity_change: Quantity::from_units(units),
            reference_id,
            reference_kind: ReferenceKind::Adjustment,
            notes: None,
            actor_id: Some("u1"),
        }
    }

    #[tokio::test]
    async fn test_record_snapshots_and_chain() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let stock_item_id = stocked_product(&db).await;
        let mut conn = db.acquire().await.unwrap();
        let mut ledger = InventoryLedger::new(&mut conn);

        let first = ledger
            .record(&stock_item_id, posting(TransactionKind::GoodsReceived, 5, "grn-1"))
            .await
            .unwrap();
        assert_eq!(first.quantity_before, Quantity::zero());
        assert_eq!(first.quantity_after, Quantity::from_units(5));

        let second = ledger
            .record(&stock_item_id, posting(TransactionKind::Sale, -2, "s-1"))
            .await
            .unwrap();
        assert_eq!(second.quantity_before, Quantity::from_units(5));
        assert_eq!(second.quantity_after, Quantity::from_units(3));
        assert!(second.is_balanced());

        let report = ledger.verify_item(ItemKind::Product, "p1").await.unwrap();
        assert!(report.is_intact());
        assert_eq!(report.entries, 2);
        assert_eq!(report.live_quantity, Quantity::from_units(3));

        let page = ledger
            .list_for_item(ItemKind::Product, "p1", Page::default())
            .await
            .unwrap();
        assert_eq!(page[0].id, second.id);

        let by_ref = ledger.list_by_reference("grn-1").await.unwrap();
        assert_eq!(by_ref.len(), 1);
    }

    #[tokio::test]
    async fn test_rejected_posting_leaves_no_entry() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let stock_item_id = stocked_product(&db).await;
        let mut conn = db.acquire().await.unwrap();
        let mut ledger = InventoryLedger::new(&mut conn);

        ledger
            .record(&stock_item_id, posting(TransactionKind::GoodsReceived, 4, "grn-1"))
            .await
            .unwrap();
        let err = ledger
            .record(&stock_item_id, posting(TransactionKind::Adjustment, -10, "adj-1"))
            .await
            .unwrap_err();
        assert_eq!(err.code(), ErrorCode::InsufficientStock);

        assert!(ledger.list_by_reference("adj-1").await.unwrap().is_empty());
        let report = ledger.verify_item(ItemKind::Product, "p1").await.unwrap();
        assert_eq!(report.live_quantity, Quantity::from_units(4));
        assert!(report.is_intact());
    }

    #[tokio::test]
    async fn test_restock_stamp() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let stock_item_id = stocked_product(&db).await;
        let mut conn = db.acquire().await.unwrap();

        InventoryLedger::new(&mut conn)
            .record(&stock_item_id, posting(TransactionKind::Adjustment, 1, "adj-1"))
            .await
            .unwrap();
        let item = StockRepository::new(&mut conn).get(&stock_item_id).await.unwrap().unwrap();
        assert!(item.last_restocked_at.is_none());

        InventoryLedger::new(&mut conn)
            .record(&stock_item_id, posting(TransactionKind::GoodsReceived, 1, "grn-1"))
            .await
            .unwrap();
        let item = StockRepository::new(&mut conn).get(&stock_item_id).await.unwrap().unwrap();
        assert!(item.last_restocked_at.is_some());
    }

    #[tokio::test]
    async fn test_verify_unknown_item() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let mut conn = db.acquire().await.unwrap();
        let err = InventoryLedger::new(&mut conn)
            .verify_item(ItemKind::Product, "ghost")
            .await
            .unwrap_err();
        assert_eq!(err.code(), ErrorCode::NotFound);
    }

    mod movements {
        use proptest::prelude::*;

        use stockbook_core::settlement::CreditRequest;
        use stockbook_core::{AdjustmentDirection, ItemKind, PaymentMode, Quantity, ReplacementReason};

        use crate::engine::testing::{cents, engine, owner, stock_product, units};
        use crate::engine::SettlementEngine;
        use crate::error::{EngineResult, ErrorCode};
        use crate::operations::{
            AdjustStockRequest, CreateSaleRequest, ReceiveGoodsRequest, RecordReplacementRequest,
            SaleLineInput,
        };

        #[derive(Debug, Clone, Copy)]
        enum Movement {
            Receive(i64),
            Add(i64),
            Subtract(i64),
            Sell(i64),
            Replace(i64),
        }

        fn movement() -> impl Strategy<Value = Movement> {
            prop_oneof![
                (1i64..8).prop_map(Movement::Receive),
                (1i64..8).prop_map(Movement::Add),
                (1i64..8).prop_map(Movement::Subtract),
                (1i64..6).prop_map(Movement::Sell),
                (1i64..4).prop_map(Movement::Replace),
            ]
        }

        fn adjustment(direction: AdjustmentDirection, n: i64) -> AdjustStockRequest {
            AdjustStockRequest {
                item_kind: ItemKind::Product,
                item_id: "A".into(),
                direction,
                quantity: units(n),
                reason: "Stock count".into(),
            }
        }

        /// Applies one movement; `Ok(Some(change))` when it committed.
        async fn apply(
            engine: &SettlementEngine,
            movement: Movement,
            last_sale: &mut Option<String>,
        ) -> EngineResult<Option<i64>> {
            match movement {
                Movement::Receive(n) => {
                    engine
                        .receive_goods(
                            &owner(),
                            ReceiveGoodsRequest {
                                item_kind: ItemKind::Product,
                                item_id: "A".into(),
                                quantity: units(n),
                                reference_number: None,
                                notes: None,
                            },
                        )
                        .await?;
                    Ok(Some(n))
                }
                Movement::Add(n) => {
                    engine.adjust_stock(&owner(), adjustment(AdjustmentDirection::Add, n)).await?;
                    Ok(Some(n))
                }
                Movement::Subtract(n) => {
                    engine
                        .adjust_stock(&owner(), adjustment(AdjustmentDirection::Subtract, n))
                        .await?;
                    Ok(Some(-n))
                }
                Movement::Sell(n) => {
                    let outcome = engine
                        .create_sale(
                            &owner(),
                            CreateSaleRequest {
                                customer_id: "c1".into(),
                                items: vec![SaleLineInput {
                                    product_id: "A".into(),
                                    quantity: units(n),
                                    unit_price: cents(100),
                                }],
                                occurred_at: chrono::Utc::now(),
                                payment_mode: PaymentMode::Cash,
                                cash_tendered: cents(0),
                                credit: CreditRequest::default(),
                            },
                        )
                        .await?;
                    *last_sale = Some(outcome.sale.id);
                    Ok(Some(-n))
                }
                Movement::Replace(n) => {
                    let Some(sale_id) = last_sale.clone() else {
                        return Ok(None);
                    };
                    engine
                        .record_replacement(
                            &owner(),
                            RecordReplacementRequest {
                                sale_id,
                                product_id: "A".into(),
                                quantity: units(n),
                                reason: ReplacementReason::Damaged,
                                notes: None,
                            },
                        )
                        .await?;
                    Ok(Some(-n))
                }
            }
        }

        struct Run {
            /// (live, expected) after every movement.
            steps: Vec<(Quantity, Quantity)>,
            final_live: Quantity,
            expected: Quantity,
            intact: bool,
        }

        async fn run(initial: i64, moves: Vec<Movement>) -> Run {
            let engine = engine().await;
            stock_product(&engine, "A", initial).await;

            let mut expected = units(initial);
            let mut last_sale = None;
            let mut steps = Vec::with_capacity(moves.len());

            for movement in moves {
                match apply(&engine, movement, &mut last_sale).await {
                    Ok(Some(change)) => expected += units(change),
                    Ok(None) => {}
                    Err(err) => assert_eq!(err.code(), ErrorCode::InsufficientStock),
                }
                let stock = engine.get_stock(&owner(), ItemKind::Product, "A").await.unwrap();
                steps.push((stock.quantity_on_hand, expected));
            }

            let report = engine
                .verify_stock_chain(&owner(), ItemKind::Product, "A")
                .await
                .unwrap();
            Run {
                steps,
                final_live: report.live_quantity,
                expected,
                intact: report.is_intact(),
            }
        }

        proptest! {
            #![proptest_config(ProptestConfig::with_cases(24))]

            #[test]
            fn prop_random_movements_keep_ledger_consistent(
                initial in 1i64..10,
                moves in proptest::collection::vec(movement(), 1..20),
            ) {
                let runtime = tokio::runtime::Builder::new_current_thread()
                    .enable_all()
                    .build()
                    .unwrap();
                let run = runtime.block_on(run(initial, moves));

                prop_assert!(run.intact);
                prop_assert_eq!(run.final_live, run.expected);
                for (live, expected) in run.steps {
                    prop_assert_eq!(live, expected);
                    prop_assert!(!live.is_negative());
                }
            }
        }
    }
}
