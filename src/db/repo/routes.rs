//! Route and route-store persistence.

use super::{parse_money, Repository};
use crate::domain::{Route, RouteStatus, RouteStore};
use chrono::NaiveDate;
use sqlx::Row;
use tracing::warn;

/// One route to be created by generation, with its member stores in visit
/// order and the active-machine snapshot already resolved.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RoutePlan {
    pub date: NaiveDate,
    pub zone: String,
    pub technician_id: Option<i64>,
    pub store_ids: Vec<i64>,
    pub total_machines: i64,
}

const DATE_FMT: &str = "%Y-%m-%d";

impl Repository {
    /// Persist a batch of generated routes atomically. Nothing is written
    /// if any insert fails.
    pub async fn insert_generated_routes(
        &self,
        plans: &[RoutePlan],
    ) -> Result<Vec<i64>, sqlx::Error> {
        let mut tx = self.pool.begin().await?;
        let mut route_ids = Vec::with_capacity(plans.len());

        for plan in plans {
            let result = sqlx::query(
                r#"
                INSERT INTO routes (date, zone, status, assigned_technician_id, total_machines)
                VALUES (?, ?, 'pending', ?, ?)
                "#,
            )
            .bind(plan.date.format(DATE_FMT).to_string())
            .bind(&plan.zone)
            .bind(plan.technician_id)
            .bind(plan.total_machines)
            .execute(&mut *tx)
            .await?;
            let route_id = result.last_insert_rowid();

            for (idx, store_id) in plan.store_ids.iter().enumerate() {
                sqlx::query(
                    "INSERT INTO route_stores (route_id, store_id, position) VALUES (?, ?, ?)",
                )
                .bind(route_id)
                .bind(store_id)
                .bind((idx + 1) as i64)
                .execute(&mut *tx)
                .await?;
            }

            route_ids.push(route_id);
        }

        tx.commit().await?;
        Ok(route_ids)
    }

    pub async fn get_route(&self, route_id: i64) -> Result<Option<Route>, sqlx::Error> {
        let row = sqlx::query(
            r#"
            SELECT id, date, zone, status, assigned_technician_id,
                   total_machines, machines_completed, remaining_budget
            FROM routes WHERE id = ?
            "#,
        )
        .bind(route_id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row.map(route_from_row))
    }

    pub async fn set_route_status(
        &self,
        route_id: i64,
        status: RouteStatus,
    ) -> Result<(), sqlx::Error> {
        sqlx::query("UPDATE routes SET status = ? WHERE id = ?")
            .bind(status.as_str())
            .bind(route_id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    pub async fn start_route_row(
        &self,
        route_id: i64,
        technician_id: i64,
    ) -> Result<(), sqlx::Error> {
        sqlx::query(
            "UPDATE routes SET status = 'in_progress', assigned_technician_id = ? WHERE id = ?",
        )
        .bind(technician_id)
        .bind(route_id)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    /// Member stores of a route in visit order.
    pub async fn route_stores(&self, route_id: i64) -> Result<Vec<RouteStore>, sqlx::Error> {
        let rows = sqlx::query(
            r#"
            SELECT route_id, store_id, position, concluded
            FROM route_stores WHERE route_id = ?
            ORDER BY position ASC
            "#,
        )
        .bind(route_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows.iter().map(route_store_from_row).collect())
    }

    pub async fn get_route_store(
        &self,
        route_id: i64,
        store_id: i64,
    ) -> Result<Option<RouteStore>, sqlx::Error> {
        let row = sqlx::query(
            r#"
            SELECT route_id, store_id, position, concluded
            FROM route_stores WHERE route_id = ? AND store_id = ?
            "#,
        )
        .bind(route_id)
        .bind(store_id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row.as_ref().map(route_store_from_row))
    }

    pub async fn set_route_store_concluded(
        &self,
        route_id: i64,
        store_id: i64,
    ) -> Result<(), sqlx::Error> {
        sqlx::query(
            "UPDATE route_stores SET concluded = 1 WHERE route_id = ? AND store_id = ?",
        )
        .bind(route_id)
        .bind(store_id)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    pub async fn unconcluded_store_count(&self, route_id: i64) -> Result<i64, sqlx::Error> {
        let row = sqlx::query(
            "SELECT COUNT(*) AS n FROM route_stores WHERE route_id = ? AND concluded = 0",
        )
        .bind(route_id)
        .fetch_one(&self.pool)
        .await?;
        Ok(row.get("n"))
    }

    /// Refresh the derived `machines_completed` cache from the ledger:
    /// distinct machines with at least one movement tagged with this route.
    pub async fn recompute_machines_completed(&self, route_id: i64) -> Result<i64, sqlx::Error> {
        sqlx::query(
            r#"
            UPDATE routes
            SET machines_completed =
                (SELECT COUNT(DISTINCT machine_id) FROM movements WHERE route_id = ?)
            WHERE id = ?
            "#,
        )
        .bind(route_id)
        .bind(route_id)
        .execute(&self.pool)
        .await?;

        let row = sqlx::query("SELECT machines_completed FROM routes WHERE id = ?")
            .bind(route_id)
            .fetch_one(&self.pool)
            .await?;
        Ok(row.get("machines_completed"))
    }

    /// Append a store to a route and bump the machine snapshot, atomically.
    /// A duplicate membership surfaces as a unique-constraint violation.
    pub async fn add_store_to_route(
        &self,
        route_id: i64,
        store_id: i64,
        machine_count: i64,
    ) -> Result<(), sqlx::Error> {
        let mut tx = self.pool.begin().await?;

        sqlx::query(
            r#"
            INSERT INTO route_stores (route_id, store_id, position)
            VALUES (?, ?, (SELECT COALESCE(MAX(position), 0) + 1 FROM route_stores WHERE route_id = ?))
            "#,
        )
        .bind(route_id)
        .bind(store_id)
        .bind(route_id)
        .execute(&mut *tx)
        .await?;

        sqlx::query("UPDATE routes SET total_machines = total_machines + ? WHERE id = ?")
            .bind(machine_count)
            .bind(route_id)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;
        Ok(())
    }

    /// Drop a store from a route, re-normalize positions to a dense 1..N
    /// sequence, and decrement the machine snapshot (floored at zero).
    /// Returns false when the store was not a member.
    pub async fn remove_store_from_route(
        &self,
        route_id: i64,
        store_id: i64,
        machine_count: i64,
    ) -> Result<bool, sqlx::Error> {
        let mut tx = self.pool.begin().await?;

        let result = sqlx::query(
            "DELETE FROM route_stores WHERE route_id = ? AND store_id = ?",
        )
        .bind(route_id)
        .bind(store_id)
        .execute(&mut *tx)
        .await?;

        if result.rows_affected() == 0 {
            tx.rollback().await?;
            return Ok(false);
        }

        renormalize_positions(&mut tx, route_id).await?;

        sqlx::query(
            "UPDATE routes SET total_machines = MAX(0, total_machines - ?) WHERE id = ?",
        )
        .bind(machine_count)
        .bind(route_id)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(true)
    }

    /// Move a store between routes as a remove-then-add in one transaction.
    /// Inserting into the destination first lets the (route, store) unique
    /// constraint reject the move before the source row is touched.
    pub async fn move_store_between_routes(
        &self,
        from_route_id: i64,
        to_route_id: i64,
        store_id: i64,
        machine_count: i64,
    ) -> Result<(), sqlx::Error> {
        let mut tx = self.pool.begin().await?;

        sqlx::query(
            r#"
            INSERT INTO route_stores (route_id, store_id, position)
            VALUES (?, ?, (SELECT COALESCE(MAX(position), 0) + 1 FROM route_stores WHERE route_id = ?))
            "#,
        )
        .bind(to_route_id)
        .bind(store_id)
        .bind(to_route_id)
        .execute(&mut *tx)
        .await?;

        sqlx::query("DELETE FROM route_stores WHERE route_id = ? AND store_id = ?")
            .bind(from_route_id)
            .bind(store_id)
            .execute(&mut *tx)
            .await?;

        renormalize_positions(&mut tx, from_route_id).await?;

        sqlx::query(
            "UPDATE routes SET total_machines = MAX(0, total_machines - ?) WHERE id = ?",
        )
        .bind(machine_count)
        .bind(from_route_id)
        .execute(&mut *tx)
        .await?;
        sqlx::query("UPDATE routes SET total_machines = total_machines + ? WHERE id = ?")
            .bind(machine_count)
            .bind(to_route_id)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;
        Ok(())
    }

    /// Delete a route with all dependent rows in one transaction: ledger
    /// movements and their products, commissions, receivables, memberships.
    pub async fn delete_route_cascade(&self, route_id: i64) -> Result<(), sqlx::Error> {
        let mut tx = self.pool.begin().await?;

        sqlx::query(
            "DELETE FROM movement_products WHERE movement_id IN (SELECT id FROM movements WHERE route_id = ?)",
        )
        .bind(route_id)
        .execute(&mut *tx)
        .await?;
        sqlx::query("DELETE FROM movements WHERE route_id = ?")
            .bind(route_id)
            .execute(&mut *tx)
            .await?;
        sqlx::query(
            "DELETE FROM commission_details WHERE commission_id IN (SELECT id FROM commissions WHERE route_id = ?)",
        )
        .bind(route_id)
        .execute(&mut *tx)
        .await?;
        sqlx::query("DELETE FROM commissions WHERE route_id = ?")
            .bind(route_id)
            .execute(&mut *tx)
            .await?;
        sqlx::query("DELETE FROM deferred_receivables WHERE route_id = ?")
            .bind(route_id)
            .execute(&mut *tx)
            .await?;
        sqlx::query("DELETE FROM route_stores WHERE route_id = ?")
            .bind(route_id)
            .execute(&mut *tx)
            .await?;
        sqlx::query("DELETE FROM routes WHERE id = ?")
            .bind(route_id)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;
        Ok(())
    }

    /// Conclude every non-concluded route dated strictly before the cutoff.
    /// Idempotent; re-running with the same cutoff affects nothing.
    pub async fn conclude_routes_before(&self, cutoff: NaiveDate) -> Result<u64, sqlx::Error> {
        let result = sqlx::query(
            "UPDATE routes SET status = 'concluded' WHERE date < ? AND status != 'concluded'",
        )
        .bind(cutoff.format(DATE_FMT).to_string())
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected())
    }
}

async fn renormalize_positions(
    tx: &mut sqlx::Transaction<'_, sqlx::Sqlite>,
    route_id: i64,
) -> Result<(), sqlx::Error> {
    let rows = sqlx::query(
        "SELECT store_id FROM route_stores WHERE route_id = ? ORDER BY position ASC",
    )
    .bind(route_id)
    .fetch_all(&mut **tx)
    .await?;

    for (idx, row) in rows.iter().enumerate() {
        let store_id: i64 = row.get("store_id");
        sqlx::query("UPDATE route_stores SET position = ? WHERE route_id = ? AND store_id = ?")
            .bind((idx + 1) as i64)
            .bind(route_id)
            .bind(store_id)
            .execute(&mut **tx)
            .await?;
    }

    Ok(())
}

fn route_from_row(row: sqlx::sqlite::SqliteRow) -> Route {
    let date_str: String = row.get("date");
    let date = NaiveDate::parse_from_str(&date_str, DATE_FMT).unwrap_or_else(|e| {
        warn!(date = %date_str, error = %e, "Failed to parse route date, using epoch");
        NaiveDate::default()
    });
    let status_str: String = row.get("status");
    let status = RouteStatus::parse(&status_str).unwrap_or_else(|| {
        warn!(status = %status_str, "Unknown route status, treating as pending");
        RouteStatus::Pending
    });
    let budget: String = row.get("remaining_budget");

    Route {
        id: row.get("id"),
        date,
        zone: row.get("zone"),
        status,
        assigned_technician_id: row.get("assigned_technician_id"),
        total_machines: row.get("total_machines"),
        machines_completed: row.get("machines_completed"),
        remaining_budget: parse_money("remaining_budget", &budget),
    }
}

fn route_store_from_row(row: &sqlx::sqlite::SqliteRow) -> RouteStore {
    RouteStore {
        route_id: row.get("route_id"),
        store_id: row.get("store_id"),
        position: row.get("position"),
        concluded: row.get("concluded"),
    }
}
