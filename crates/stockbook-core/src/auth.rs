//! # Authorization Policy
//!
//! Authentication happens elsewhere; callers hand the engine an already
//! resolved [`Actor`]. This module decides whether that actor's role may run
//! a given engine operation.
//!
//! ## Permission Matrix
//! ```text
//! ┌──────────────────────┬───────┬─────────┬─────────┬─────────────┬────────┐
//! │ Operation            │ Owner │ Manager │ Cashier │ Storekeeper │ Viewer │
//! ├──────────────────────┼───────┼─────────┼─────────┼─────────────┼────────┤
//! │ CreateSale           │   ✓   │    ✓    │    ✓    │             │        │
//! │ RecordPayment        │   ✓   │    ✓    │    ✓    │             │        │
//! │ RecordReplacement    │   ✓   │    ✓    │    ✓    │             │        │
//! │ CreatePurchase       │   ✓   │    ✓    │         │      ✓      │        │
//! │ ReceiveGoods         │   ✓   │    ✓    │         │      ✓      │        │
//! │ AdjustStock          │   ✓   │    ✓    │         │      ✓      │        │
//! │ CorrectObligation    │   ✓   │    ✓    │         │             │        │
//! │ ManageRegistry       │   ✓   │    ✓    │         │             │        │
//! │ DeleteObligation     │   ✓   │         │         │             │        │
//! │ ViewLedger           │   ✓   │    ✓    │    ✓    │      ✓      │   ✓    │
//! └──────────────────────┴───────┴─────────┴─────────┴─────────────┴────────┘
//! ```

use std::fmt;

use serde::{Deserialize, Serialize};
use ts_rs::TS;

use crate::error::{CoreError, CoreResult};

/// Role of the person calling the engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    Owner,
    Manager,
    Cashier,
    Storekeeper,
    Viewer,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Owner => "owner",
            Role::Manager => "manager",
            Role::Cashier => "cashier",
            Role::Storekeeper => "storekeeper",
            Role::Viewer => "viewer",
        }
    }

    /// Whether this role may run `operation`.
    pub fn permits(&self, operation: Operation) -> bool {
        use Operation::*;
        match self {
            Role::Owner => true,
            Role::Manager => !matches!(operation, DeleteObligation),
            Role::Cashier => matches!(
                operation,
                CreateSale | RecordPayment | RecordReplacement | ViewLedger
            ),
            Role::Storekeeper => matches!(
                operation,
                ReceiveGoods | AdjustStock | CreatePurchase | ViewLedger
            ),
            Role::Viewer => matches!(operation, ViewLedger),
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Engine operations subject to a permission check.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "snake_case")]
pub enum Operation {
    CreateSale,
    CreatePurchase,
    RecordPayment,
    ReceiveGoods,
    AdjustStock,
    RecordReplacement,
    CorrectObligation,
    DeleteObligation,
    /// Registering customers, suppliers, products and materials.
    ManageRegistry,
    /// Every read-only query.
    ViewLedger,
}

impl Operation {
    pub fn as_str(&self) -> &'static str {
        match self {
            Operation::CreateSale => "create_sale",
            Operation::CreatePurchase => "create_purchase",
            Operation::RecordPayment => "record_payment",
            Operation::ReceiveGoods => "receive_goods",
            Operation::AdjustStock => "adjust_stock",
            Operation::RecordReplacement => "record_replacement",
            Operation::CorrectObligation => "correct_obligation",
            Operation::DeleteObligation => "delete_obligation",
            Operation::ManageRegistry => "manage_registry",
            Operation::ViewLedger => "view_ledger",
        }
    }
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The authenticated caller of an engine operation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct Actor {
    pub actor_id: String,
    pub role: Role,
}

impl Actor {
    pub fn new(actor_id: impl Into<String>, role: Role) -> Self {
        Actor {
            actor_id: actor_id.into(),
            role,
        }
    }

    /// Fails with `InsufficientPermission` when the role lacks `operation`.
    pub fn authorize(&self, operation: Operation) -> CoreResult<()> {
        if self.role.permits(operation) {
            Ok(())
        } else {
            Err(CoreError::InsufficientPermission {
                actor_id: self.actor_id.clone(),
                role: self.role.to_string(),
                operation: operation.to_string(),
            })
        }
    }
}
