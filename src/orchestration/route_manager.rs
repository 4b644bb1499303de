//! Route lifecycle: generation, start, store completion/deferral,
//! conclusion, membership edits, deletion, and the weekly reset hook.

use crate::config::Config;
use crate::db::repo::RoutePlan;
use crate::db::Repository;
use crate::domain::{Route, RouteStatus, RouteStore, TimeMs};
use crate::error::AppError;
use crate::orchestration::commission::calculate_store_commission;
use chrono::{Duration, NaiveDate};
use serde::Serialize;
use std::collections::HashSet;
use std::sync::Arc;
use tracing::{info, warn};

/// Result of completing one store within a route.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CompletionSummary {
    pub completed_count: i64,
    pub total_count: i64,
    pub route_complete: bool,
}

#[derive(Clone)]
pub struct RouteManager {
    repo: Arc<Repository>,
    slots_per_day: usize,
    weekday_labels: Vec<String>,
}

impl RouteManager {
    pub fn new(repo: Arc<Repository>, config: &Config) -> Self {
        Self {
            repo,
            slots_per_day: config.route_slots_per_day,
            weekday_labels: config.route_weekday_labels.clone(),
        }
    }

    /// Generate the week's routes starting at `start_date`.
    ///
    /// With `use_template` and a saved template present, the template is
    /// replayed and any active store it does not mention is appended to
    /// the least-loaded slot. Otherwise active stores are distributed
    /// round-robin across weekday × slot zones. All rows are written in a
    /// single transaction.
    pub async fn generate(
        &self,
        start_date: NaiveDate,
        use_template: bool,
    ) -> Result<Vec<i64>, AppError> {
        let active_stores = self.repo.active_store_ids().await?;

        let template = if use_template {
            self.repo.latest_template().await?
        } else {
            None
        };

        let mut plans = match template.filter(|t| !t.entries.is_empty()) {
            Some(template) => {
                let active: HashSet<i64> = active_stores.iter().copied().collect();
                let mut assigned: HashSet<i64> = HashSet::new();

                let mut plans = Vec::with_capacity(template.entries.len());
                for (idx, entry) in template.entries.iter().enumerate() {
                    let store_ids: Vec<i64> = entry
                        .store_ids
                        .iter()
                        .copied()
                        .filter(|id| active.contains(id))
                        .collect();
                    assigned.extend(store_ids.iter().copied());

                    plans.push(RoutePlan {
                        date: start_date + Duration::days((idx / self.slots_per_day) as i64),
                        zone: entry.zone.clone(),
                        technician_id: entry.technician_id,
                        store_ids,
                        total_machines: 0,
                    });
                }

                // Newly-active stores go to the slot with the fewest stores.
                for store_id in active_stores.iter().filter(|id| !assigned.contains(id)) {
                    if let Some(plan) = plans.iter_mut().min_by_key(|p| p.store_ids.len()) {
                        plan.store_ids.push(*store_id);
                    }
                }

                plans
            }
            None => {
                let slot_count = self.weekday_labels.len() * self.slots_per_day;
                let mut plans: Vec<RoutePlan> = (0..slot_count)
                    .map(|slot| {
                        let day = slot / self.slots_per_day;
                        let slot_of_day = slot % self.slots_per_day;
                        RoutePlan {
                            date: start_date + Duration::days(day as i64),
                            zone: format!("{}-{}", self.weekday_labels[day], slot_of_day + 1),
                            technician_id: None,
                            store_ids: Vec::new(),
                            total_machines: 0,
                        }
                    })
                    .collect();

                for (idx, store_id) in active_stores.iter().enumerate() {
                    plans[idx % slot_count].store_ids.push(*store_id);
                }

                plans
            }
        };

        for plan in &mut plans {
            let mut total = 0i64;
            for store_id in &plan.store_ids {
                total += self.repo.count_active_machines(*store_id).await?;
            }
            plan.total_machines = total;
        }

        let route_ids = self.repo.insert_generated_routes(&plans).await?;
        info!(count = route_ids.len(), start_date = %start_date, "Routes generated");
        Ok(route_ids)
    }

    /// Transition a route to in_progress, recording the technician.
    pub async fn start(&self, route_id: i64, technician_id: i64) -> Result<Route, AppError> {
        let route = self.get_route(route_id).await?;
        if route.status == RouteStatus::Concluded {
            return Err(AppError::Conflict(format!(
                "route {} is already concluded",
                route_id
            )));
        }

        self.repo.start_route_row(route_id, technician_id).await?;
        self.get_route(route_id).await
    }

    /// Mark a store concluded within a route, trigger the commission
    /// side-effect, refresh progress counters, and auto-conclude the route
    /// when every store is done.
    ///
    /// A commission failure is logged and swallowed: the visit workflow
    /// must not be blocked by the financial side-effect.
    pub async fn complete_store(
        &self,
        route_id: i64,
        store_id: i64,
        now: TimeMs,
    ) -> Result<CompletionSummary, AppError> {
        self.get_route(route_id).await?;
        if self.repo.get_route_store(route_id, store_id).await?.is_none() {
            return Err(AppError::NotFound(format!(
                "store {} is not part of route {}",
                store_id, route_id
            )));
        }

        self.repo
            .set_route_store_concluded(route_id, store_id)
            .await?;

        // Retries must not duplicate the commission trigger.
        if !self.repo.commission_exists(store_id, Some(route_id)).await? {
            if let Err(e) =
                calculate_store_commission(&self.repo, store_id, Some(route_id), now).await
            {
                warn!(
                    route_id,
                    store_id,
                    error = %e,
                    "Commission calculation failed during store completion"
                );
            }
        }

        self.repo.recompute_machines_completed(route_id).await?;

        let stores = self.repo.route_stores(route_id).await?;
        let total_count = stores.len() as i64;
        let completed_count = stores.iter().filter(|s| s.concluded).count() as i64;
        let route_complete = total_count > 0 && completed_count == total_count;

        if route_complete {
            self.repo
                .set_route_status(route_id, RouteStatus::Concluded)
                .await?;
            info!(route_id, "Route auto-concluded: all stores done");
        }

        Ok(CompletionSummary {
            completed_count,
            total_count,
            route_complete,
        })
    }

    /// Record that a store's cash will be settled later.
    pub async fn defer_store(
        &self,
        route_id: i64,
        store_id: i64,
        now: TimeMs,
    ) -> Result<i64, AppError> {
        self.get_route(route_id).await?;
        if !self.repo.store_exists(store_id).await? {
            return Err(AppError::NotFound(format!("store {} not found", store_id)));
        }

        if self.repo.pending_receivable_exists(route_id, store_id).await? {
            return Err(AppError::Conflict(format!(
                "a pending receivable already exists for route {} store {}",
                route_id, store_id
            )));
        }

        // The partial unique index backstops the pre-check under races.
        let id = self.repo.insert_receivable(route_id, store_id, now).await?;
        Ok(id)
    }

    /// Explicitly conclude a route; all member stores must be concluded.
    pub async fn conclude(&self, route_id: i64) -> Result<Route, AppError> {
        self.get_route(route_id).await?;

        let pending = self.repo.unconcluded_store_count(route_id).await?;
        if pending > 0 {
            return Err(AppError::Validation(format!(
                "{} stores are still pending in route {}",
                pending, route_id
            )));
        }

        self.repo
            .set_route_status(route_id, RouteStatus::Concluded)
            .await?;
        self.get_route(route_id).await
    }

    /// Add a store to a route, bumping the machine snapshot.
    pub async fn add_store(&self, route_id: i64, store_id: i64) -> Result<(), AppError> {
        self.get_route(route_id).await?;
        if !self.repo.store_exists(store_id).await? {
            return Err(AppError::NotFound(format!("store {} not found", store_id)));
        }

        let machines = self.repo.count_active_machines(store_id).await?;
        self.repo
            .add_store_to_route(route_id, store_id, machines)
            .await
            .map_err(|e| match e {
                sqlx::Error::Database(ref db) if db.is_unique_violation() => AppError::Conflict(
                    format!("route {} already contains store {}", route_id, store_id),
                ),
                other => other.into(),
            })
    }

    /// Remove a store from a route, re-normalizing positions.
    pub async fn remove_store(&self, route_id: i64, store_id: i64) -> Result<(), AppError> {
        self.get_route(route_id).await?;

        let machines = self.repo.count_active_machines(store_id).await?;
        let removed = self
            .repo
            .remove_store_from_route(route_id, store_id, machines)
            .await?;
        if !removed {
            return Err(AppError::NotFound(format!(
                "store {} is not part of route {}",
                store_id, route_id
            )));
        }
        Ok(())
    }

    /// Move a store between routes atomically (remove-then-add).
    pub async fn move_store(
        &self,
        from_route_id: i64,
        to_route_id: i64,
        store_id: i64,
    ) -> Result<(), AppError> {
        self.get_route(from_route_id).await?;
        self.get_route(to_route_id).await?;
        if self
            .repo
            .get_route_store(from_route_id, store_id)
            .await?
            .is_none()
        {
            return Err(AppError::NotFound(format!(
                "store {} is not part of route {}",
                store_id, from_route_id
            )));
        }

        let machines = self.repo.count_active_machines(store_id).await?;
        self.repo
            .move_store_between_routes(from_route_id, to_route_id, store_id, machines)
            .await
            .map_err(|e| match e {
                sqlx::Error::Database(ref db) if db.is_unique_violation() => AppError::Conflict(
                    format!("route {} already contains store {}", to_route_id, store_id),
                ),
                other => other.into(),
            })
    }

    /// Delete a route. Non-pending routes require the force flag, which
    /// cascade-deletes all dependent rows in one transaction.
    pub async fn delete(&self, route_id: i64, force: bool) -> Result<(), AppError> {
        let route = self.get_route(route_id).await?;
        if route.status != RouteStatus::Pending && !force {
            return Err(AppError::Conflict(format!(
                "route {} is {}; only pending routes can be deleted without force",
                route_id, route.status
            )));
        }

        self.repo.delete_route_cascade(route_id).await?;
        info!(route_id, force, "Route deleted");
        Ok(())
    }

    /// Idempotent weekly-reset entry point for the external scheduler:
    /// concludes stale routes dated before the cutoff.
    pub async fn reset_weekly_state(&self, cutoff: NaiveDate) -> Result<u64, AppError> {
        let affected = self.repo.conclude_routes_before(cutoff).await?;
        info!(cutoff = %cutoff, affected, "Weekly reset applied");
        Ok(affected)
    }

    /// Read model for route progress: the route and its store checklist.
    pub async fn progress(&self, route_id: i64) -> Result<(Route, Vec<RouteStore>), AppError> {
        let route = self.get_route(route_id).await?;
        let stores = self.repo.route_stores(route_id).await?;
        Ok((route, stores))
    }

    async fn get_route(&self, route_id: i64) -> Result<Route, AppError> {
        self.repo
            .get_route(route_id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("route {} not found", route_id)))
    }
}
