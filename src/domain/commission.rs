//! Commission record: per-(store, route) profit/commission snapshot.

use crate::domain::{Money, TimeMs};
use serde::{Deserialize, Serialize};

/// Persisted commission calculation for a store, optionally scoped to one
/// route. At most one row exists per (store, route) pair; recalculation
/// overwrites it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Commission {
    pub id: i64,
    pub store_id: i64,
    pub route_id: Option<i64>,
    pub calculated_at: TimeMs,
    pub total_profit: Money,
    pub total_commission: Money,
    pub details: Vec<CommissionDetail>,
}

/// Per-machine audit line of a commission calculation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CommissionDetail {
    pub machine_id: i64,
    pub revenue: Money,
    pub cost: Money,
    pub profit: Money,
    pub commission_percent: Money,
    pub commission: Money,
}
