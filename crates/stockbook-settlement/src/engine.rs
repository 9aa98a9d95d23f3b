//! # Settlement Engine
//!
//! The handle callers hold. Every public operation lives in
//! [`operations`](crate::operations) as an `impl SettlementEngine` block and
//! follows the same shape:
//!
//! ```text
//! authorize(actor, op)          ── InsufficientPermission
//!      │
//! validate(request)             ── ValidationError, nothing opened yet
//!      │
//! db.begin_write()              ── BEGIN IMMEDIATE, waits up to busy_timeout
//!      │
//! StockStore / InventoryLedger / repositories / PaymentAllocator
//!      │   any error: tx dropped ⇒ ROLLBACK
//!      ▼
//! tx.commit()
//! ```

use tracing::{debug, info};

use stockbook_core::{Actor, Operation, StockDefaults};
use stockbook_db::Database;

use crate::config::EngineConfig;
use crate::error::EngineResult;

/// Transactional settlement and inventory engine.
///
/// Cheap to clone; clones share the pool.
#[derive(Debug, Clone)]
pub struct SettlementEngine {
    pub(crate) db: Database,
    pub(crate) config: EngineConfig,
    pub(crate) stock_defaults: StockDefaults,
}

impl SettlementEngine {
    /// Wraps an open database.
    pub fn new(db: Database, config: EngineConfig) -> EngineResult<Self> {
        config.validate()?;
        let stock_defaults = config.stock_defaults()?;

        Ok(SettlementEngine {
            db,
            config,
            stock_defaults,
        })
    }

    /// Opens (and migrates) the configured database.
    pub async fn open(config: EngineConfig) -> EngineResult<Self> {
        let db = Database::new(config.to_db_config()).await?;
        info!(path = ?config.database.path, "Settlement engine ready");
        Self::new(db, config)
    }

    pub fn database(&self) -> &Database {
        &self.db
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub async fn close(&self) {
        self.db.close().await;
    }

    pub(crate) fn authorize(&self, actor: &Actor, operation: Operation) -> EngineResult<()> {
        actor.authorize(operation)?;
        debug!(actor_id = %actor.actor_id, role = %actor.role, op = %operation, "Authorized");
        Ok(())
    }
}
