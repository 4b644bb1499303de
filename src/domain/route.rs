//! Route and RouteStore: the daily visitation plan.

use crate::domain::{Money, RouteStatus};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// One day's ordered visitation list for a zone.
///
/// `total_machines` is snapshotted from active-machine counts when stores
/// are associated; `machines_completed` is a derived cache recomputed from
/// the ledger (distinct machines with a movement tagged with this route).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Route {
    pub id: i64,
    pub date: NaiveDate,
    pub zone: String,
    pub status: RouteStatus,
    pub assigned_technician_id: Option<i64>,
    pub total_machines: i64,
    pub machines_completed: i64,
    pub remaining_budget: Money,
}

/// Junction row tying a store into a route at a position.
///
/// `position` is a dense 1..N sequence within the route, re-normalized
/// after removals.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RouteStore {
    pub route_id: i64,
    pub store_id: i64,
    pub position: i64,
    pub concluded: bool,
}
