//! Commission arithmetic: revenue − cost → profit → percentage commission.
//!
//! Pure over per-machine inputs; fetching movements and persisting the
//! result live in the orchestration and repository layers.

use crate::domain::{CommissionDetail, Money};

/// Per-machine input to the commission calculation, already resolved from
/// the qualifying movement: channel revenue and dispensed-product cost.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MachineTakings {
    pub machine_id: i64,
    pub commission_percent: Money,
    pub revenue: Money,
    pub cost: Money,
}

/// Aggregated result across a store's machines.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommissionOutcome {
    pub total_profit: Money,
    pub total_commission: Money,
    pub details: Vec<CommissionDetail>,
}

/// Compute profit and commission per machine and accumulate totals.
///
/// Profit may be negative; it is never clamped. Machines the caller could
/// not resolve a movement for are simply absent from `takings`.
pub fn calculate(takings: &[MachineTakings]) -> CommissionOutcome {
    let mut total_profit = Money::zero();
    let mut total_commission = Money::zero();
    let mut details = Vec::with_capacity(takings.len());

    for taking in takings {
        let profit = taking.revenue - taking.cost;
        let commission = profit * (taking.commission_percent / Money::hundred());

        total_profit = total_profit + profit;
        total_commission = total_commission + commission;

        details.push(CommissionDetail {
            machine_id: taking.machine_id,
            revenue: taking.revenue,
            cost: taking.cost,
            profit,
            commission_percent: taking.commission_percent,
            commission,
        });
    }

    CommissionOutcome {
        total_profit,
        total_commission,
        details,
    }
}
