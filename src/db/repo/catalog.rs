//! Catalog reads and fixture writes for stores, machines, products, users.
//!
//! Entity CRUD is an external collaborator; this module carries only what
//! the route/commission core needs to read, plus minimal insert helpers
//! used by seeding and tests.

use super::{parse_money, Repository};
use crate::domain::Money;
use sqlx::Row;

/// Machine row as the commission calculator sees it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MachineRow {
    pub id: i64,
    pub store_id: i64,
    pub name: String,
    pub commission_percent: Money,
    pub active: bool,
}

impl Repository {
    pub async fn insert_user(&self, name: &str, role: &str) -> Result<i64, sqlx::Error> {
        let result = sqlx::query("INSERT INTO users (name, role) VALUES (?, ?)")
            .bind(name)
            .bind(role)
            .execute(&self.pool)
            .await?;
        Ok(result.last_insert_rowid())
    }

    pub async fn insert_store(&self, name: &str, active: bool) -> Result<i64, sqlx::Error> {
        let result = sqlx::query("INSERT INTO stores (name, active) VALUES (?, ?)")
            .bind(name)
            .bind(active)
            .execute(&self.pool)
            .await?;
        Ok(result.last_insert_rowid())
    }

    pub async fn insert_machine(
        &self,
        store_id: i64,
        name: &str,
        commission_percent: Money,
        active: bool,
    ) -> Result<i64, sqlx::Error> {
        let result = sqlx::query(
            "INSERT INTO machines (store_id, name, commission_percent, active) VALUES (?, ?, ?, ?)",
        )
        .bind(store_id)
        .bind(name)
        .bind(commission_percent.to_canonical_string())
        .bind(active)
        .execute(&self.pool)
        .await?;
        Ok(result.last_insert_rowid())
    }

    pub async fn insert_product(&self, name: &str, unit_cost: Money) -> Result<i64, sqlx::Error> {
        let result = sqlx::query("INSERT INTO products (name, unit_cost) VALUES (?, ?)")
            .bind(name)
            .bind(unit_cost.to_canonical_string())
            .execute(&self.pool)
            .await?;
        Ok(result.last_insert_rowid())
    }

    pub async fn set_store_active(&self, store_id: i64, active: bool) -> Result<(), sqlx::Error> {
        sqlx::query("UPDATE stores SET active = ? WHERE id = ?")
            .bind(active)
            .bind(store_id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    pub async fn store_exists(&self, store_id: i64) -> Result<bool, sqlx::Error> {
        let row = sqlx::query("SELECT 1 FROM stores WHERE id = ?")
            .bind(store_id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row.is_some())
    }

    /// Ids of all active stores, ordered by id for deterministic generation.
    pub async fn active_store_ids(&self) -> Result<Vec<i64>, sqlx::Error> {
        let rows = sqlx::query("SELECT id FROM stores WHERE active = 1 ORDER BY id ASC")
            .fetch_all(&self.pool)
            .await?;
        Ok(rows.iter().map(|r| r.get("id")).collect())
    }

    /// Count of active machines belonging to a store.
    pub async fn count_active_machines(&self, store_id: i64) -> Result<i64, sqlx::Error> {
        let row = sqlx::query(
            "SELECT COUNT(*) AS n FROM machines WHERE store_id = ? AND active = 1",
        )
        .bind(store_id)
        .fetch_one(&self.pool)
        .await?;
        Ok(row.get("n"))
    }

    pub async fn get_machine(&self, machine_id: i64) -> Result<Option<MachineRow>, sqlx::Error> {
        let row = sqlx::query(
            "SELECT id, store_id, name, commission_percent, active FROM machines WHERE id = ?",
        )
        .bind(machine_id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row.map(machine_from_row))
    }

    /// Active machines of a store whose commission percentage is above zero;
    /// only these participate in commission calculation.
    pub async fn commission_eligible_machines(
        &self,
        store_id: i64,
    ) -> Result<Vec<MachineRow>, sqlx::Error> {
        let rows = sqlx::query(
            r#"
            SELECT id, store_id, name, commission_percent, active
            FROM machines
            WHERE store_id = ? AND active = 1
            ORDER BY id ASC
            "#,
        )
        .bind(store_id)
        .fetch_all(&self.pool)
        .await?;

        // Percent comparison happens in Rust: the column is canonical TEXT.
        Ok(rows
            .into_iter()
            .map(machine_from_row)
            .filter(|m| m.commission_percent.is_positive())
            .collect())
    }

    pub async fn product_unit_cost(&self, product_id: i64) -> Result<Option<Money>, sqlx::Error> {
        let row = sqlx::query("SELECT unit_cost FROM products WHERE id = ?")
            .bind(product_id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row.map(|r| {
            let raw: String = r.get("unit_cost");
            parse_money("unit_cost", &raw)
        }))
    }
}

fn machine_from_row(row: sqlx::sqlite::SqliteRow) -> MachineRow {
    let pct: String = row.get("commission_percent");
    MachineRow {
        id: row.get("id"),
        store_id: row.get("store_id"),
        name: row.get("name"),
        commission_percent: parse_money("commission_percent", &pct),
        active: row.get("active"),
    }
}
