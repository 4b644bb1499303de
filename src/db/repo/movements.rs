//! Movement ledger persistence.

use super::{parse_money, Repository};
use crate::domain::{
    FinancialStatus, Money, Movement, MovementKind, MovementProduct, TimeMs,
};
use sqlx::Row;
use tracing::warn;

/// A movement about to enter the ledger; `total_post` and the initial
/// `financial_status` are already derived by the domain layer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewMovement {
    pub machine_id: i64,
    pub user_id: i64,
    pub route_id: Option<i64>,
    pub store_id: i64,
    pub collected_at: TimeMs,
    pub kind: MovementKind,
    pub total_pre: i64,
    pub left_count: i64,
    pub restocked_count: i64,
    pub total_post: i64,
    pub tokens_collected: i64,
    pub entry_value_tokens: Option<Money>,
    pub entry_value_bills: Option<Money>,
    pub entry_value_card: Option<Money>,
    pub financial_status: FinancialStatus,
    pub bag_number: Option<String>,
    pub notes: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NewMovementProduct {
    pub product_id: i64,
    pub quantity_dispensed: i64,
    pub quantity_restocked: i64,
}

/// One joined ledger row for the stock-delta report.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StockLedgerRow {
    pub machine_id: i64,
    pub product_id: i64,
    pub collected_at: TimeMs,
    pub quantity_dispensed: i64,
    pub quantity_restocked: i64,
}

impl Repository {
    /// Insert a movement and its product rows atomically.
    pub async fn insert_movement(
        &self,
        movement: &NewMovement,
        products: &[NewMovementProduct],
    ) -> Result<i64, sqlx::Error> {
        let mut tx = self.pool.begin().await?;

        let result = sqlx::query(
            r#"
            INSERT INTO movements
            (machine_id, user_id, route_id, store_id, collected_at, kind,
             total_pre, left_count, restocked_count, total_post, tokens_collected,
             entry_value_tokens, entry_value_bills, entry_value_card,
             financial_status, bag_number, notes)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(movement.machine_id)
        .bind(movement.user_id)
        .bind(movement.route_id)
        .bind(movement.store_id)
        .bind(movement.collected_at.as_ms())
        .bind(movement.kind.as_str())
        .bind(movement.total_pre)
        .bind(movement.left_count)
        .bind(movement.restocked_count)
        .bind(movement.total_post)
        .bind(movement.tokens_collected)
        .bind(movement.entry_value_tokens.map(|m| m.to_canonical_string()))
        .bind(movement.entry_value_bills.map(|m| m.to_canonical_string()))
        .bind(movement.entry_value_card.map(|m| m.to_canonical_string()))
        .bind(movement.financial_status.as_str())
        .bind(movement.bag_number.as_deref())
        .bind(movement.notes.as_deref())
        .execute(&mut *tx)
        .await?;
        let movement_id = result.last_insert_rowid();

        for product in products {
            sqlx::query(
                r#"
                INSERT INTO movement_products
                (movement_id, product_id, quantity_dispensed, quantity_restocked)
                VALUES (?, ?, ?, ?)
                "#,
            )
            .bind(movement_id)
            .bind(product.product_id)
            .bind(product.quantity_dispensed)
            .bind(product.quantity_restocked)
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;
        Ok(movement_id)
    }

    pub async fn get_movement(&self, movement_id: i64) -> Result<Option<Movement>, sqlx::Error> {
        let row = sqlx::query(
            r#"
            SELECT id, machine_id, user_id, route_id, store_id, collected_at, kind,
                   total_pre, left_count, restocked_count, total_post, tokens_collected,
                   entry_value_tokens, entry_value_bills, entry_value_card,
                   financial_status, bag_number, notes
            FROM movements WHERE id = ?
            "#,
        )
        .bind(movement_id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row.map(movement_from_row))
    }

    /// The qualifying movement for commission purposes: the machine's most
    /// recent movement tagged with the route when a route is given,
    /// otherwise its most recent movement overall.
    pub async fn latest_movement_for_machine(
        &self,
        machine_id: i64,
        route_id: Option<i64>,
    ) -> Result<Option<Movement>, sqlx::Error> {
        let row = match route_id {
            Some(route_id) => {
                sqlx::query(
                    r#"
                    SELECT id, machine_id, user_id, route_id, store_id, collected_at, kind,
                           total_pre, left_count, restocked_count, total_post, tokens_collected,
                           entry_value_tokens, entry_value_bills, entry_value_card,
                           financial_status, bag_number, notes
                    FROM movements
                    WHERE machine_id = ? AND route_id = ?
                    ORDER BY collected_at DESC, id DESC
                    LIMIT 1
                    "#,
                )
                .bind(machine_id)
                .bind(route_id)
                .fetch_optional(&self.pool)
                .await?
            }
            None => {
                sqlx::query(
                    r#"
                    SELECT id, machine_id, user_id, route_id, store_id, collected_at, kind,
                           total_pre, left_count, restocked_count, total_post, tokens_collected,
                           entry_value_tokens, entry_value_bills, entry_value_card,
                           financial_status, bag_number, notes
                    FROM movements
                    WHERE machine_id = ?
                    ORDER BY collected_at DESC, id DESC
                    LIMIT 1
                    "#,
                )
                .bind(machine_id)
                .fetch_optional(&self.pool)
                .await?
            }
        };
        Ok(row.map(movement_from_row))
    }

    pub async fn movement_products(
        &self,
        movement_id: i64,
    ) -> Result<Vec<MovementProduct>, sqlx::Error> {
        let rows = sqlx::query(
            r#"
            SELECT movement_id, product_id, quantity_dispensed, quantity_restocked
            FROM movement_products WHERE movement_id = ?
            ORDER BY product_id ASC
            "#,
        )
        .bind(movement_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows
            .iter()
            .map(|row| MovementProduct {
                movement_id: row.get("movement_id"),
                product_id: row.get("product_id"),
                quantity_dispensed: row.get("quantity_dispensed"),
                quantity_restocked: row.get("quantity_restocked"),
            })
            .collect())
    }

    /// Cost of the products dispensed in one movement: Σ unit_cost × qty.
    ///
    /// Summed in Rust to keep money arithmetic lossless.
    pub async fn dispensed_cost(&self, movement_id: i64) -> Result<Money, sqlx::Error> {
        let rows = sqlx::query(
            r#"
            SELECT p.unit_cost, mp.quantity_dispensed
            FROM movement_products mp
            JOIN products p ON p.id = mp.product_id
            WHERE mp.movement_id = ?
            ORDER BY mp.product_id ASC
            "#,
        )
        .bind(movement_id)
        .fetch_all(&self.pool)
        .await?;

        let mut cost = Money::zero();
        for row in rows {
            let unit_cost_str: String = row.get("unit_cost");
            let unit_cost = parse_money("unit_cost", &unit_cost_str);
            let qty: i64 = row.get("quantity_dispensed");
            cost = cost + unit_cost * Money::from(qty);
        }
        Ok(cost)
    }

    /// Edit the author-mutable field subset of a movement.
    pub async fn update_movement_editables(
        &self,
        movement_id: i64,
        tokens_collected: i64,
        bag_number: Option<&str>,
        notes: Option<&str>,
    ) -> Result<(), sqlx::Error> {
        sqlx::query(
            "UPDATE movements SET tokens_collected = ?, bag_number = ?, notes = ? WHERE id = ?",
        )
        .bind(tokens_collected)
        .bind(bag_number)
        .bind(notes)
        .bind(movement_id)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    /// Fill the payment channels of a pending movement and complete it.
    ///
    /// The `financial_status = 'pending'` guard in the statement makes the
    /// pending-to-completed transition one-way; returns false when no
    /// pending row matched.
    pub async fn fill_movement_financials(
        &self,
        movement_id: i64,
        tokens: Money,
        bills: Money,
        card: Money,
    ) -> Result<bool, sqlx::Error> {
        let result = sqlx::query(
            r#"
            UPDATE movements
            SET entry_value_tokens = ?, entry_value_bills = ?, entry_value_card = ?,
                financial_status = 'completed'
            WHERE id = ? AND financial_status = 'pending'
            "#,
        )
        .bind(tokens.to_canonical_string())
        .bind(bills.to_canonical_string())
        .bind(card.to_canonical_string())
        .bind(movement_id)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    /// Ledger reads for reporting, filtered by any of store/machine/route.
    pub async fn query_movements(
        &self,
        store_id: Option<i64>,
        machine_id: Option<i64>,
        route_id: Option<i64>,
    ) -> Result<Vec<Movement>, sqlx::Error> {
        let rows = sqlx::query(
            r#"
            SELECT id, machine_id, user_id, route_id, store_id, collected_at, kind,
                   total_pre, left_count, restocked_count, total_post, tokens_collected,
                   entry_value_tokens, entry_value_bills, entry_value_card,
                   financial_status, bag_number, notes
            FROM movements
            WHERE (? IS NULL OR store_id = ?)
              AND (? IS NULL OR machine_id = ?)
              AND (? IS NULL OR route_id = ?)
            ORDER BY collected_at ASC, id ASC
            "#,
        )
        .bind(store_id)
        .bind(store_id)
        .bind(machine_id)
        .bind(machine_id)
        .bind(route_id)
        .bind(route_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows.into_iter().map(movement_from_row).collect())
    }

    /// Joined (movement × product) counters for the stock-delta report,
    /// grouped later per (product, machine) pair by the caller.
    pub async fn stock_ledger_rows(
        &self,
        machine_id: Option<i64>,
        product_id: Option<i64>,
        from_ms: Option<i64>,
        to_ms: Option<i64>,
    ) -> Result<Vec<StockLedgerRow>, sqlx::Error> {
        let rows = sqlx::query(
            r#"
            SELECT m.machine_id, mp.product_id, m.collected_at,
                   mp.quantity_dispensed, mp.quantity_restocked
            FROM movement_products mp
            JOIN movements m ON m.id = mp.movement_id
            WHERE (? IS NULL OR m.machine_id = ?)
              AND (? IS NULL OR mp.product_id = ?)
              AND (? IS NULL OR m.collected_at >= ?)
              AND (? IS NULL OR m.collected_at <= ?)
            ORDER BY m.machine_id ASC, mp.product_id ASC, m.collected_at ASC
            "#,
        )
        .bind(machine_id)
        .bind(machine_id)
        .bind(product_id)
        .bind(product_id)
        .bind(from_ms)
        .bind(from_ms)
        .bind(to_ms)
        .bind(to_ms)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows
            .iter()
            .map(|row| StockLedgerRow {
                machine_id: row.get("machine_id"),
                product_id: row.get("product_id"),
                collected_at: TimeMs::new(row.get("collected_at")),
                quantity_dispensed: row.get("quantity_dispensed"),
                quantity_restocked: row.get("quantity_restocked"),
            })
            .collect())
    }
}

fn movement_from_row(row: sqlx::sqlite::SqliteRow) -> Movement {
    let kind_str: String = row.get("kind");
    let kind = MovementKind::parse(&kind_str).unwrap_or_else(|| {
        warn!(kind = %kind_str, "Unknown movement kind, treating as normal");
        MovementKind::Normal
    });
    let status_str: String = row.get("financial_status");
    let financial_status = FinancialStatus::parse(&status_str).unwrap_or_else(|| {
        warn!(status = %status_str, "Unknown financial status, treating as completed");
        FinancialStatus::Completed
    });

    let money_opt = |column: &str| -> Option<Money> {
        row.get::<Option<String>, _>(column)
            .map(|raw| parse_money(column, &raw))
    };

    Movement {
        id: row.get("id"),
        machine_id: row.get("machine_id"),
        user_id: row.get("user_id"),
        route_id: row.get("route_id"),
        store_id: row.get("store_id"),
        collected_at: TimeMs::new(row.get("collected_at")),
        kind,
        total_pre: row.get("total_pre"),
        left_count: row.get("left_count"),
        restocked_count: row.get("restocked_count"),
        total_post: row.get("total_post"),
        tokens_collected: row.get("tokens_collected"),
        entry_value_tokens: money_opt("entry_value_tokens"),
        entry_value_bills: money_opt("entry_value_bills"),
        entry_value_card: money_opt("entry_value_card"),
        financial_status,
        bag_number: row.get("bag_number"),
        notes: row.get("notes"),
    }
}
