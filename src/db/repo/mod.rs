//! Repository layer for database operations.
//!
//! Methods are organized across submodules by domain:
//! - `catalog.rs` - stores, machines, products, users (external CRUD boundary)
//! - `routes.rs` - route and route-store lifecycle rows
//! - `movements.rs` - movement ledger and per-movement products
//! - `commissions.rs` - commission upsert and reads
//! - `receivables.rs` - deferred receivable rows
//! - `templates.rs` - versioned route templates

mod catalog;
mod commissions;
mod movements;
mod receivables;
mod routes;
mod templates;

pub use catalog::MachineRow;
pub use movements::{NewMovement, NewMovementProduct, StockLedgerRow};
pub use routes::RoutePlan;

use crate::domain::Money;
use sqlx::sqlite::SqlitePool;
use std::str::FromStr;
use tracing::warn;

/// Repository for database operations.
pub struct Repository {
    pool: SqlitePool,
}

impl Repository {
    /// Create a new repository with the given connection pool.
    pub fn new(pool: SqlitePool) -> Self {
        Repository { pool }
    }
}

/// Parse a money column stored as canonical TEXT, defaulting to zero on a
/// malformed value (logged; should never happen for rows we wrote).
pub(crate) fn parse_money(column: &str, raw: &str) -> Money {
    Money::from_str(raw).unwrap_or_else(|e| {
        warn!(column = column, value = raw, error = %e, "Failed to parse money column, using zero");
        Money::zero()
    })
}
