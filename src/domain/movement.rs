//! Movement: one per-machine visit record in the ledger.

use crate::domain::{FinancialStatus, Money, MovementKind, TimeMs};
use serde::{Deserialize, Serialize};

/// A single service visit to one machine, recorded by a technician.
///
/// Append-mostly: after creation only a small field subset may be edited,
/// and only by the author or an admin.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Movement {
    pub id: i64,
    pub machine_id: i64,
    pub user_id: i64,
    pub route_id: Option<i64>,
    pub store_id: i64,
    pub collected_at: TimeMs,
    pub kind: MovementKind,
    /// Units in the machine before servicing.
    pub total_pre: i64,
    /// Units withdrawn (stock-withdrawal movements only).
    pub left_count: i64,
    /// Units loaded into the machine.
    pub restocked_count: i64,
    /// Units in the machine after servicing; derived, see [`compute_total_post`].
    pub total_post: i64,
    pub tokens_collected: i64,
    pub entry_value_tokens: Option<Money>,
    pub entry_value_bills: Option<Money>,
    pub entry_value_card: Option<Money>,
    pub financial_status: FinancialStatus,
    pub bag_number: Option<String>,
    pub notes: Option<String>,
}

/// One row per product touched during a movement.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct MovementProduct {
    pub movement_id: i64,
    pub product_id: i64,
    pub quantity_dispensed: i64,
    pub quantity_restocked: i64,
}

/// Post-service stock count for a movement.
///
/// Normal visits only add stock; withdrawal visits also remove `left_count`
/// units. Computed before persisting, never re-derived afterwards.
pub fn compute_total_post(
    kind: MovementKind,
    total_pre: i64,
    left_count: i64,
    restocked_count: i64,
) -> i64 {
    match kind {
        MovementKind::Normal => total_pre + restocked_count,
        MovementKind::StockWithdrawal => total_pre - left_count + restocked_count,
    }
}

/// Initial settlement status: a bag number means the cash has not been
/// counted yet.
pub fn initial_financial_status(bag_number: Option<&str>) -> FinancialStatus {
    match bag_number {
        Some(_) => FinancialStatus::Pending,
        None => FinancialStatus::Completed,
    }
}

impl Movement {
    /// Sum of the three payment channels, missing channels counted as zero.
    pub fn revenue(&self) -> Money {
        self.entry_value_tokens.unwrap_or_else(Money::zero)
            + self.entry_value_bills.unwrap_or_else(Money::zero)
            + self.entry_value_card.unwrap_or_else(Money::zero)
    }
}
