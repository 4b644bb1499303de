use axum::extract::{Path, State};
use axum::Json;
use serde::{Deserialize, Serialize};

use super::AppState;
use crate::domain::{CommissionDetail, Money, TimeMs};
use crate::error::AppError;
use crate::orchestration::calculate_store_commission;

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CalculateRequest {
    pub route_id: Option<i64>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CommissionResponse {
    pub store_id: i64,
    pub route_id: Option<i64>,
    pub total_profit: Money,
    pub total_commission: Money,
    pub details: Vec<CommissionDetail>,
}

/// Manual recalculation entry point; the same computation also runs
/// automatically when a store is completed within a route.
pub async fn calculate_commission(
    Path(store_id): Path<i64>,
    State(state): State<AppState>,
    Json(req): Json<CalculateRequest>,
) -> Result<Json<CommissionResponse>, AppError> {
    if !state.repo.store_exists(store_id).await? {
        return Err(AppError::NotFound(format!("store {} not found", store_id)));
    }

    let outcome = calculate_store_commission(&state.repo, store_id, req.route_id, TimeMs::now())
        .await?
        .ok_or_else(|| {
            AppError::NotFound(format!(
                "store {} has no commission-eligible machines",
                store_id
            ))
        })?;

    Ok(Json(CommissionResponse {
        store_id,
        route_id: req.route_id,
        total_profit: outcome.total_profit,
        total_commission: outcome.total_commission,
        details: outcome.details,
    }))
}
