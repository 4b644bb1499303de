use axum::extract::{Path, State};
use axum::Json;
use serde::Serialize;

use super::{AppState, CurrentUser};
use crate::domain::{DeferredReceivable, TimeMs};
use crate::error::AppError;

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReceivableDto {
    pub id: i64,
    pub route_id: i64,
    pub store_id: i64,
    pub received: bool,
    pub marked_at: i64,
    pub received_at: Option<i64>,
}

impl From<DeferredReceivable> for ReceivableDto {
    fn from(r: DeferredReceivable) -> Self {
        ReceivableDto {
            id: r.id,
            route_id: r.route_id,
            store_id: r.store_id,
            received: r.received,
            marked_at: r.marked_at.as_ms(),
            received_at: r.received_at.map(|t| t.as_ms()),
        }
    }
}

pub async fn receive_receivable(
    Path(receivable_id): Path<i64>,
    State(state): State<AppState>,
    _user: CurrentUser,
) -> Result<Json<ReceivableDto>, AppError> {
    let receivable = state
        .settlement
        .receive(receivable_id, TimeMs::now())
        .await?;
    Ok(Json(receivable.into()))
}
