//! Store commission calculation: resolve qualifying movements, run the
//! pure calculator, and upsert the (store, route) commission row.

use crate::db::Repository;
use crate::domain::TimeMs;
use crate::engine::{self, CommissionOutcome, MachineTakings};
use tracing::info;

/// Compute and persist the commission for a store, optionally scoped to a
/// route.
///
/// Returns `None` when the store has no commission-eligible machines
/// (nothing is computed or persisted; "not applicable", not an error).
/// Eligible machines without a qualifying movement are skipped. The result
/// is persisted per the upsert rules in the repository: update in place
/// when a row exists, insert only for a positive aggregate.
///
/// Idempotent; safe to call repeatedly for manual recalculation.
pub async fn calculate_store_commission(
    repo: &Repository,
    store_id: i64,
    route_id: Option<i64>,
    now: TimeMs,
) -> Result<Option<CommissionOutcome>, sqlx::Error> {
    let machines = repo.commission_eligible_machines(store_id).await?;
    if machines.is_empty() {
        return Ok(None);
    }

    let mut takings = Vec::with_capacity(machines.len());
    for machine in &machines {
        let Some(movement) = repo
            .latest_movement_for_machine(machine.id, route_id)
            .await?
        else {
            continue;
        };

        let revenue = movement.revenue();
        let cost = repo.dispensed_cost(movement.id).await?;
        takings.push(MachineTakings {
            machine_id: machine.id,
            commission_percent: machine.commission_percent,
            revenue,
            cost,
        });
    }

    let outcome = engine::calculate(&takings);
    let persisted = repo
        .upsert_commission(store_id, route_id, &outcome, now)
        .await?;

    info!(
        store_id,
        route_id,
        total_profit = %outcome.total_profit,
        total_commission = %outcome.total_commission,
        persisted = persisted.is_some(),
        "Commission calculated"
    );

    Ok(Some(outcome))
}
