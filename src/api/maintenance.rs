use axum::extract::State;
use axum::Json;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use super::{AppState, CurrentUser};
use crate::error::AppError;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WeeklyResetRequest {
    pub cutoff_date: NaiveDate,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct WeeklyResetResponse {
    pub routes_concluded: u64,
}

/// Invoked by the external scheduler (or an operator) at week boundaries.
/// Idempotent: re-running with the same cutoff affects nothing new.
pub async fn weekly_reset(
    State(state): State<AppState>,
    user: CurrentUser,
    Json(req): Json<WeeklyResetRequest>,
) -> Result<Json<WeeklyResetResponse>, AppError> {
    if !user.role.is_admin() {
        return Err(AppError::Forbidden(
            "weekly reset requires an admin".to_string(),
        ));
    }

    let routes_concluded = state
        .route_manager
        .reset_weekly_state(req.cutoff_date)
        .await?;
    Ok(Json(WeeklyResetResponse { routes_concluded }))
}
