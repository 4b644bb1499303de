//! Commission persistence: one row per (store, route), atomically upserted.

use super::{parse_money, Repository};
use crate::domain::{Commission, CommissionDetail, Money, TimeMs};
use crate::engine::CommissionOutcome;
use sqlx::Row;

impl Repository {
    pub async fn commission_exists(
        &self,
        store_id: i64,
        route_id: Option<i64>,
    ) -> Result<bool, sqlx::Error> {
        let row = sqlx::query(
            "SELECT 1 FROM commissions WHERE store_id = ? AND route_id IS ?",
        )
        .bind(store_id)
        .bind(route_id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row.is_some())
    }

    /// Persist a commission outcome for (store, route).
    ///
    /// An existing row is overwritten in place (totals, details,
    /// calculated_at); a new row is inserted only when the aggregate
    /// commission is positive. The partial unique indexes on commissions
    /// make the insert race-safe: a concurrent insert degrades into the
    /// update arm of the upsert. Returns the commission id when persisted.
    pub async fn upsert_commission(
        &self,
        store_id: i64,
        route_id: Option<i64>,
        outcome: &CommissionOutcome,
        calculated_at: TimeMs,
    ) -> Result<Option<i64>, sqlx::Error> {
        let mut tx = self.pool.begin().await?;

        let updated = sqlx::query(
            r#"
            UPDATE commissions
            SET total_profit = ?, total_commission = ?, calculated_at = ?
            WHERE store_id = ? AND route_id IS ?
            "#,
        )
        .bind(outcome.total_profit.to_canonical_string())
        .bind(outcome.total_commission.to_canonical_string())
        .bind(calculated_at.as_ms())
        .bind(store_id)
        .bind(route_id)
        .execute(&mut *tx)
        .await?;

        let commission_id = if updated.rows_affected() > 0 {
            let row = sqlx::query(
                "SELECT id FROM commissions WHERE store_id = ? AND route_id IS ?",
            )
            .bind(store_id)
            .bind(route_id)
            .fetch_one(&mut *tx)
            .await?;
            Some(row.get::<i64, _>("id"))
        } else if outcome.total_commission.is_positive() {
            let insert_sql = match route_id {
                Some(_) => {
                    r#"
                    INSERT INTO commissions (store_id, route_id, calculated_at, total_profit, total_commission)
                    VALUES (?, ?, ?, ?, ?)
                    ON CONFLICT(store_id, route_id) WHERE route_id IS NOT NULL DO UPDATE SET
                        total_profit = excluded.total_profit,
                        total_commission = excluded.total_commission,
                        calculated_at = excluded.calculated_at
                    "#
                }
                None => {
                    r#"
                    INSERT INTO commissions (store_id, route_id, calculated_at, total_profit, total_commission)
                    VALUES (?, ?, ?, ?, ?)
                    ON CONFLICT(store_id) WHERE route_id IS NULL DO UPDATE SET
                        total_profit = excluded.total_profit,
                        total_commission = excluded.total_commission,
                        calculated_at = excluded.calculated_at
                    "#
                }
            };
            sqlx::query(insert_sql)
                .bind(store_id)
                .bind(route_id)
                .bind(calculated_at.as_ms())
                .bind(outcome.total_profit.to_canonical_string())
                .bind(outcome.total_commission.to_canonical_string())
                .execute(&mut *tx)
                .await?;

            let row = sqlx::query(
                "SELECT id FROM commissions WHERE store_id = ? AND route_id IS ?",
            )
            .bind(store_id)
            .bind(route_id)
            .fetch_one(&mut *tx)
            .await?;
            Some(row.get::<i64, _>("id"))
        } else {
            None
        };

        if let Some(commission_id) = commission_id {
            sqlx::query("DELETE FROM commission_details WHERE commission_id = ?")
                .bind(commission_id)
                .execute(&mut *tx)
                .await?;

            for detail in &outcome.details {
                sqlx::query(
                    r#"
                    INSERT INTO commission_details
                    (commission_id, machine_id, revenue, cost, profit, commission_percent, commission)
                    VALUES (?, ?, ?, ?, ?, ?, ?)
                    "#,
                )
                .bind(commission_id)
                .bind(detail.machine_id)
                .bind(detail.revenue.to_canonical_string())
                .bind(detail.cost.to_canonical_string())
                .bind(detail.profit.to_canonical_string())
                .bind(detail.commission_percent.to_canonical_string())
                .bind(detail.commission.to_canonical_string())
                .execute(&mut *tx)
                .await?;
            }
        }

        tx.commit().await?;
        Ok(commission_id)
    }

    pub async fn get_commission(
        &self,
        store_id: i64,
        route_id: Option<i64>,
    ) -> Result<Option<Commission>, sqlx::Error> {
        let row = sqlx::query(
            r#"
            SELECT id, store_id, route_id, calculated_at, total_profit, total_commission
            FROM commissions WHERE store_id = ? AND route_id IS ?
            "#,
        )
        .bind(store_id)
        .bind(route_id)
        .fetch_optional(&self.pool)
        .await?;

        let Some(row) = row else {
            return Ok(None);
        };

        let id: i64 = row.get("id");
        let total_profit: String = row.get("total_profit");
        let total_commission: String = row.get("total_commission");

        let detail_rows = sqlx::query(
            r#"
            SELECT machine_id, revenue, cost, profit, commission_percent, commission
            FROM commission_details WHERE commission_id = ?
            ORDER BY machine_id ASC
            "#,
        )
        .bind(id)
        .fetch_all(&self.pool)
        .await?;

        let money_col = |row: &sqlx::sqlite::SqliteRow, column: &str| -> Money {
            let raw: String = row.get(column);
            parse_money(column, &raw)
        };

        let details = detail_rows
            .iter()
            .map(|r| CommissionDetail {
                machine_id: r.get("machine_id"),
                revenue: money_col(r, "revenue"),
                cost: money_col(r, "cost"),
                profit: money_col(r, "profit"),
                commission_percent: money_col(r, "commission_percent"),
                commission: money_col(r, "commission"),
            })
            .collect();

        Ok(Some(Commission {
            id,
            store_id: row.get("store_id"),
            route_id: row.get("route_id"),
            calculated_at: TimeMs::new(row.get("calculated_at")),
            total_profit: parse_money("total_profit", &total_profit),
            total_commission: parse_money("total_commission", &total_commission),
            details,
        }))
    }
}
