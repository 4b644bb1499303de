use axum::extract::{Query, State};
use axum::Json;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use super::AppState;
use crate::engine::{infer_units_sold, LedgerEntry};
use crate::error::AppError;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StockDeltasQuery {
    pub machine_id: Option<i64>,
    pub product_id: Option<i64>,
    pub from_ms: Option<i64>,
    pub to_ms: Option<i64>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StockDeltaDto {
    pub machine_id: i64,
    pub product_id: i64,
    pub visits: usize,
    /// Null when the pair has fewer than two visits to compare.
    pub units_sold: Option<i64>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StockDeltasResponse {
    pub deltas: Vec<StockDeltaDto>,
}

/// Display-only sell-through approximation per (machine, product) pair,
/// inferred from the visit ledger.
pub async fn stock_deltas(
    Query(params): Query<StockDeltasQuery>,
    State(state): State<AppState>,
) -> Result<Json<StockDeltasResponse>, AppError> {
    let rows = state
        .repo
        .stock_ledger_rows(
            params.machine_id,
            params.product_id,
            params.from_ms,
            params.to_ms,
        )
        .await?;

    let mut grouped: BTreeMap<(i64, i64), Vec<LedgerEntry>> = BTreeMap::new();
    for row in rows {
        grouped
            .entry((row.machine_id, row.product_id))
            .or_default()
            .push(LedgerEntry {
                collected_at: row.collected_at,
                dispensed: row.quantity_dispensed,
                restocked: row.quantity_restocked,
            });
    }

    let deltas = grouped
        .into_iter()
        .map(|((machine_id, product_id), entries)| StockDeltaDto {
            machine_id,
            product_id,
            visits: entries.len(),
            units_sold: infer_units_sold(&entries),
        })
        .collect();

    Ok(Json(StockDeltasResponse { deltas }))
}
