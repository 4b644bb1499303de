//! Deferred receivable persistence.

use super::Repository;
use crate::domain::{DeferredReceivable, TimeMs};
use sqlx::Row;

impl Repository {
    /// Create a pending receivable for (route, store). The partial unique
    /// index on unreceived rows rejects a second pending entry.
    pub async fn insert_receivable(
        &self,
        route_id: i64,
        store_id: i64,
        marked_at: TimeMs,
    ) -> Result<i64, sqlx::Error> {
        let result = sqlx::query(
            "INSERT INTO deferred_receivables (route_id, store_id, marked_at) VALUES (?, ?, ?)",
        )
        .bind(route_id)
        .bind(store_id)
        .bind(marked_at.as_ms())
        .execute(&self.pool)
        .await?;
        Ok(result.last_insert_rowid())
    }

    pub async fn pending_receivable_exists(
        &self,
        route_id: i64,
        store_id: i64,
    ) -> Result<bool, sqlx::Error> {
        let row = sqlx::query(
            "SELECT 1 FROM deferred_receivables WHERE route_id = ? AND store_id = ? AND received = 0",
        )
        .bind(route_id)
        .bind(store_id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row.is_some())
    }

    pub async fn get_receivable(
        &self,
        receivable_id: i64,
    ) -> Result<Option<DeferredReceivable>, sqlx::Error> {
        let row = sqlx::query(
            r#"
            SELECT id, route_id, store_id, received, marked_at, received_at
            FROM deferred_receivables WHERE id = ?
            "#,
        )
        .bind(receivable_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(|r| DeferredReceivable {
            id: r.get("id"),
            route_id: r.get("route_id"),
            store_id: r.get("store_id"),
            received: r.get("received"),
            marked_at: TimeMs::new(r.get("marked_at")),
            received_at: r.get::<Option<i64>, _>("received_at").map(TimeMs::new),
        }))
    }

    /// Flip a pending receivable to received. The `received = 0` guard makes
    /// the flip one-way; returns false when no pending row matched.
    pub async fn mark_receivable_received(
        &self,
        receivable_id: i64,
        received_at: TimeMs,
    ) -> Result<bool, sqlx::Error> {
        let result = sqlx::query(
            "UPDATE deferred_receivables SET received = 1, received_at = ? WHERE id = ? AND received = 0",
        )
        .bind(received_at.as_ms())
        .bind(receivable_id)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }
}

#[cfg(test)]
mod tests {
    use super::super::test_support::setup_test_db;
    use super::*;
    use crate::db::repo::RoutePlan;

    async fn fixture(repo: &Repository) -> (i64, i64) {
        let store = repo.insert_store("Loja", true).await.unwrap();
        let route_ids = repo
            .insert_generated_routes(&[RoutePlan {
                date: chrono::NaiveDate::parse_from_str("2026-08-24", "%Y-%m-%d").unwrap(),
                zone: "mon-1".to_string(),
                technician_id: None,
                store_ids: vec![store],
                total_machines: 0,
            }])
            .await
            .unwrap();
        (route_ids[0], store)
    }

    #[tokio::test]
    async fn test_duplicate_pending_rejected_by_index() {
        let (repo, _temp) = setup_test_db().await;
        let (route, store) = fixture(&repo).await;

        repo.insert_receivable(route, store, TimeMs::new(1000))
            .await
            .unwrap();
        let err = repo
            .insert_receivable(route, store, TimeMs::new(2000))
            .await
            .unwrap_err();
        match err {
            sqlx::Error::Database(db) => assert!(db.is_unique_violation()),
            other => panic!("expected unique violation, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_receive_then_new_pending_allowed() {
        let (repo, _temp) = setup_test_db().await;
        let (route, store) = fixture(&repo).await;

        let id = repo
            .insert_receivable(route, store, TimeMs::new(1000))
            .await
            .unwrap();
        assert!(repo
            .mark_receivable_received(id, TimeMs::new(1500))
            .await
            .unwrap());
        // the flip never reverts
        assert!(!repo
            .mark_receivable_received(id, TimeMs::new(1600))
            .await
            .unwrap());

        // once settled, a new pending entry may be created
        repo.insert_receivable(route, store, TimeMs::new(2000))
            .await
            .unwrap();
        assert!(repo.pending_receivable_exists(route, store).await.unwrap());
    }

    #[tokio::test]
    async fn test_get_receivable_roundtrip() {
        let (repo, _temp) = setup_test_db().await;
        let (route, store) = fixture(&repo).await;

        let id = repo
            .insert_receivable(route, store, TimeMs::new(1000))
            .await
            .unwrap();
        let receivable = repo.get_receivable(id).await.unwrap().unwrap();
        assert!(!receivable.received);
        assert_eq!(receivable.marked_at, TimeMs::new(1000));
        assert_eq!(receivable.received_at, None);
    }
}
