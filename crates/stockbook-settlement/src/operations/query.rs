//! Read-only operations. All of them need `ViewLedger` and run on a plain
//! pooled connection.

use serde::Serialize;
use tracing::warn;
use ts_rs::TS;

use stockbook_core::{
    Actor, ItemKind, LedgerEntry, Money, Obligation, ObligationKind, Operation, Page,
    PaymentRecord, Purchase, Sale, StockItem,
};
use stockbook_db::{CustomerRepository, PaymentRepository, PurchaseRepository, SaleRepository};

use crate::engine::SettlementEngine;
use crate::error::EngineResult;
use crate::ledger::{ChainReport, InventoryLedger};
use crate::operations::missing;
use crate::stock::StockStore;

/// Stored totals of one obligation against its payment records.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, TS)]
#[ts(export)]
pub struct ReconciliationReport {
    pub obligation_kind: ObligationKind,
    pub obligation_id: String,
    pub total: Money,
    pub amount_paid: Money,
    pub balance: Money,
    /// Σ PaymentRecord amounts.
    pub recorded: Money,
    pub payment_count: i64,
    /// `recorded == amount_paid`, `balance == total - amount_paid` and the
    /// status matches.
    pub consistent: bool,
}

impl SettlementEngine {
    pub async fn get_sale(&self, actor: &Actor, sale_id: &str) -> EngineResult<Sale> {
        self.authorize(actor, Operation::ViewLedger)?;
        let mut conn = self.db.acquire().await?;

        Ok(SaleRepository::new(&mut conn)
            .get(sale_id)
            .await?
            .ok_or_else(|| missing("Sale", sale_id))?)
    }

    pub async fn get_purchase(&self, actor: &Actor, purchase_id: &str) -> EngineResult<Purchase> {
        self.authorize(actor, Operation::ViewLedger)?;
        let mut conn = self.db.acquire().await?;

        Ok(PurchaseRepository::new(&mut conn)
            .get(purchase_id)
            .await?
            .ok_or_else(|| missing("Purchase", purchase_id))?)
    }

    pub async fn list_payments(
        &self,
        actor: &Actor,
        kind: ObligationKind,
        obligation_id: &str,
    ) -> EngineResult<Vec<PaymentRecord>> {
        self.authorize(actor, Operation::ViewLedger)?;
        let mut conn = self.db.acquire().await?;

        Ok(PaymentRepository::new(&mut conn)
            .list_for(kind, obligation_id)
            .await?)
    }

    /// Current store credit of a customer.
    pub async fn customer_credit(&self, actor: &Actor, customer_id: &str) -> EngineResult<Money> {
        self.authorize(actor, Operation::ViewLedger)?;
        let mut conn = self.db.acquire().await?;

        let customer = CustomerRepository::new(&mut conn)
            .get(customer_id)
            .await?
            .ok_or_else(|| missing("Customer", customer_id))?;
        Ok(customer.credit_balance)
    }

    pub async fn get_stock(
        &self,
        actor: &Actor,
        item_kind: ItemKind,
        item_id: &str,
    ) -> EngineResult<StockItem> {
        self.authorize(actor, Operation::ViewLedger)?;
        let mut conn = self.db.acquire().await?;

        Ok(StockStore::new(&mut conn)
            .get(item_kind, item_id)
            .await?
            .ok_or_else(|| missing("Stock item", item_id))?)
    }

    pub async fn list_low_stock(&self, actor: &Actor) -> EngineResult<Vec<StockItem>> {
        self.authorize(actor, Operation::ViewLedger)?;
        let mut conn = self.db.acquire().await?;

        StockStore::new(&mut conn).list_low_stock().await
    }

    pub async fn list_ledger_for_item(
        &self,
        actor: &Actor,
        item_kind: ItemKind,
        item_id: &str,
        page: Page,
    ) -> EngineResult<Vec<LedgerEntry>> {
        self.authorize(actor, Operation::ViewLedger)?;
        let mut conn = self.db.acquire().await?;

        InventoryLedger::new(&mut conn)
            .list_for_item(item_kind, item_id, page)
            .await
    }

    pub async fn list_ledger_by_reference(
        &self,
        actor: &Actor,
        reference_id: &str,
    ) -> EngineResult<Vec<LedgerEntry>> {
        self.authorize(actor, Operation::ViewLedger)?;
        let mut conn = self.db.acquire().await?;

        InventoryLedger::new(&mut conn)
            .list_by_reference(reference_id)
            .await
    }

    pub async fn verify_stock_chain(
        &self,
        actor: &Actor,
        item_kind: ItemKind,
        item_id: &str,
    ) -> EngineResult<ChainReport> {
        self.authorize(actor, Operation::ViewLedger)?;
        let mut conn = self.db.acquire().await?;

        InventoryLedger::new(&mut conn)
            .verify_item(item_kind, item_id)
            .await
    }

    pub async fn reconcile_obligation(
        &self,
        actor: &Actor,
        kind: ObligationKind,
        obligation_id: &str,
    ) -> EngineResult<ReconciliationReport> {
        self.authorize(actor, Operation::ViewLedger)?;
        let mut conn = self.db.acquire().await?;

        let totals = match kind {
            ObligationKind::Sale => SaleRepository::new(&mut conn)
                .get(obligation_id)
                .await?
                .ok_or_else(|| missing("Sale", obligation_id))?
                .totals(),
            ObligationKind::Purchase => PurchaseRepository::new(&mut conn)
                .get(obligation_id)
                .await?
                .ok_or_else(|| missing("Purchase", obligation_id))?
                .totals(),
        };

        let mut payments = PaymentRepository::new(&mut conn);
        let recorded = payments.sum_for(kind, obligation_id).await?;
        let payment_count = payments.count_for(kind, obligation_id).await?;

        let consistent = totals.is_consistent() && recorded == totals.amount_paid;
        if !consistent {
            warn!(
                kind = %kind,
                obligation_id = %obligation_id,
                amount_paid = totals.amount_paid.cents(),
                recorded = recorded.cents(),
                "Obligation does not reconcile"
            );
        }

        Ok(ReconciliationReport {
            obligation_kind: kind,
            obligation_id: obligation_id.to_string(),
            total: totals.total,
            amount_paid: totals.amount_paid,
            balance: totals.balance,
            recorded,
            payment_count,
            consistent,
        })
    }
}
