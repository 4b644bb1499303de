//! Versioned route template persistence.

use super::Repository;
use crate::domain::{RouteTemplate, TemplateEntry, TimeMs};
use sqlx::Row;

impl Repository {
    /// Save a new template version atomically. Versions only grow; older
    /// templates are kept for audit but never replayed.
    pub async fn save_template(
        &self,
        entries: &[TemplateEntry],
        created_at: TimeMs,
    ) -> Result<(i64, i64), sqlx::Error> {
        let mut tx = self.pool.begin().await?;

        let row = sqlx::query("SELECT COALESCE(MAX(version), 0) + 1 AS v FROM route_templates")
            .fetch_one(&mut *tx)
            .await?;
        let version: i64 = row.get("v");

        let result = sqlx::query(
            "INSERT INTO route_templates (version, created_at) VALUES (?, ?)",
        )
        .bind(version)
        .bind(created_at.as_ms())
        .execute(&mut *tx)
        .await?;
        let template_id = result.last_insert_rowid();

        for (idx, entry) in entries.iter().enumerate() {
            let result = sqlx::query(
                r#"
                INSERT INTO route_template_entries (template_id, zone, technician_id, position)
                VALUES (?, ?, ?, ?)
                "#,
            )
            .bind(template_id)
            .bind(&entry.zone)
            .bind(entry.technician_id)
            .bind((idx + 1) as i64)
            .execute(&mut *tx)
            .await?;
            let entry_id = result.last_insert_rowid();

            for (store_idx, store_id) in entry.store_ids.iter().enumerate() {
                sqlx::query(
                    "INSERT INTO route_template_entry_stores (entry_id, store_id, position) VALUES (?, ?, ?)",
                )
                .bind(entry_id)
                .bind(store_id)
                .bind((store_idx + 1) as i64)
                .execute(&mut *tx)
                .await?;
            }
        }

        tx.commit().await?;
        Ok((template_id, version))
    }

    /// Latest saved template with entries in position order, if any.
    pub async fn latest_template(&self) -> Result<Option<RouteTemplate>, sqlx::Error> {
        let row = sqlx::query(
            "SELECT id, version FROM route_templates ORDER BY version DESC LIMIT 1",
        )
        .fetch_optional(&self.pool)
        .await?;

        let Some(row) = row else {
            return Ok(None);
        };
        let template_id: i64 = row.get("id");
        let version: i64 = row.get("version");

        let entry_rows = sqlx::query(
            r#"
            SELECT id, zone, technician_id
            FROM route_template_entries
            WHERE template_id = ?
            ORDER BY position ASC
            "#,
        )
        .bind(template_id)
        .fetch_all(&self.pool)
        .await?;

        let mut entries = Vec::with_capacity(entry_rows.len());
        for entry_row in entry_rows {
            let entry_id: i64 = entry_row.get("id");
            let store_rows = sqlx::query(
                r#"
                SELECT store_id FROM route_template_entry_stores
                WHERE entry_id = ?
                ORDER BY position ASC
                "#,
            )
            .bind(entry_id)
            .fetch_all(&self.pool)
            .await?;

            entries.push(TemplateEntry {
                zone: entry_row.get("zone"),
                technician_id: entry_row.get("technician_id"),
                store_ids: store_rows.iter().map(|r| r.get("store_id")).collect(),
            });
        }

        Ok(Some(RouteTemplate {
            id: template_id,
            version,
            entries,
        }))
    }
}
