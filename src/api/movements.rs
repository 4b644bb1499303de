use axum::extract::{Path, Query, State};
use axum::Json;
use serde::{Deserialize, Serialize};

use super::{AppState, CurrentUser};
use crate::db::repo::{NewMovement, NewMovementProduct};
use crate::domain::{
    compute_total_post, initial_financial_status, Money, Movement, MovementKind, TimeMs,
};
use crate::error::AppError;

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MovementDto {
    pub id: i64,
    pub machine_id: i64,
    pub user_id: i64,
    pub route_id: Option<i64>,
    pub store_id: i64,
    pub collected_at: i64,
    pub kind: String,
    pub total_pre: i64,
    pub left_count: i64,
    pub restocked_count: i64,
    pub total_post: i64,
    pub tokens_collected: i64,
    pub entry_value_tokens: Option<Money>,
    pub entry_value_bills: Option<Money>,
    pub entry_value_card: Option<Money>,
    pub financial_status: String,
    pub bag_number: Option<String>,
    pub notes: Option<String>,
}

impl From<Movement> for MovementDto {
    fn from(m: Movement) -> Self {
        MovementDto {
            id: m.id,
            machine_id: m.machine_id,
            user_id: m.user_id,
            route_id: m.route_id,
            store_id: m.store_id,
            collected_at: m.collected_at.as_ms(),
            kind: m.kind.as_str().to_string(),
            total_pre: m.total_pre,
            left_count: m.left_count,
            restocked_count: m.restocked_count,
            total_post: m.total_post,
            tokens_collected: m.tokens_collected,
            entry_value_tokens: m.entry_value_tokens,
            entry_value_bills: m.entry_value_bills,
            entry_value_card: m.entry_value_card,
            financial_status: m.financial_status.as_str().to_string(),
            bag_number: m.bag_number,
            notes: m.notes,
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MovementProductRequest {
    pub product_id: i64,
    pub quantity_dispensed: i64,
    pub quantity_restocked: i64,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateMovementRequest {
    pub machine_id: i64,
    pub route_id: Option<i64>,
    pub collected_at: Option<i64>,
    pub kind: Option<MovementKind>,
    pub total_pre: i64,
    pub left_count: Option<i64>,
    pub restocked_count: i64,
    pub tokens_collected: Option<i64>,
    pub entry_value_tokens: Option<Money>,
    pub entry_value_bills: Option<Money>,
    pub entry_value_card: Option<Money>,
    pub bag_number: Option<String>,
    pub notes: Option<String>,
    #[serde(default)]
    pub products: Vec<MovementProductRequest>,
}

pub async fn create_movement(
    State(state): State<AppState>,
    user: CurrentUser,
    Json(req): Json<CreateMovementRequest>,
) -> Result<Json<MovementDto>, AppError> {
    let kind = req.kind.unwrap_or(MovementKind::Normal);
    let left_count = req.left_count.unwrap_or(0);
    let tokens_collected = req.tokens_collected.unwrap_or(0);

    if req.total_pre < 0 || left_count < 0 || req.restocked_count < 0 || tokens_collected < 0 {
        return Err(AppError::Validation(
            "stock and token counts must not be negative".to_string(),
        ));
    }
    for product in &req.products {
        if product.quantity_dispensed < 0 || product.quantity_restocked < 0 {
            return Err(AppError::Validation(
                "product quantities must not be negative".to_string(),
            ));
        }
    }

    let machine = state
        .repo
        .get_machine(req.machine_id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("machine {} not found", req.machine_id)))?;

    if let Some(route_id) = req.route_id {
        if state.repo.get_route(route_id).await?.is_none() {
            return Err(AppError::NotFound(format!("route {} not found", route_id)));
        }
    }

    let movement = NewMovement {
        machine_id: machine.id,
        user_id: user.user_id,
        route_id: req.route_id,
        store_id: machine.store_id,
        collected_at: req.collected_at.map(TimeMs::new).unwrap_or_else(TimeMs::now),
        kind,
        total_pre: req.total_pre,
        left_count,
        restocked_count: req.restocked_count,
        total_post: compute_total_post(kind, req.total_pre, left_count, req.restocked_count),
        tokens_collected,
        entry_value_tokens: req.entry_value_tokens,
        entry_value_bills: req.entry_value_bills,
        entry_value_card: req.entry_value_card,
        financial_status: initial_financial_status(req.bag_number.as_deref()),
        bag_number: req.bag_number,
        notes: req.notes,
    };

    let products: Vec<NewMovementProduct> = req
        .products
        .iter()
        .map(|p| NewMovementProduct {
            product_id: p.product_id,
            quantity_dispensed: p.quantity_dispensed,
            quantity_restocked: p.quantity_restocked,
        })
        .collect();

    let movement_id = state.repo.insert_movement(&movement, &products).await?;
    let created = state
        .repo
        .get_movement(movement_id)
        .await?
        .ok_or_else(|| AppError::Internal("movement vanished after insert".to_string()))?;
    Ok(Json(created.into()))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EditMovementRequest {
    pub tokens_collected: i64,
    pub bag_number: Option<String>,
    pub notes: Option<String>,
}

/// Edit the mutable subset of a movement. Only the recording technician or
/// an admin may edit; everything else in the ledger is append-only.
pub async fn edit_movement(
    Path(movement_id): Path<i64>,
    State(state): State<AppState>,
    user: CurrentUser,
    Json(req): Json<EditMovementRequest>,
) -> Result<Json<MovementDto>, AppError> {
    if req.tokens_collected < 0 {
        return Err(AppError::Validation(
            "tokens_collected must not be negative".to_string(),
        ));
    }

    let movement = state
        .repo
        .get_movement(movement_id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("movement {} not found", movement_id)))?;

    if movement.user_id != user.user_id && !user.role.is_admin() {
        return Err(AppError::Forbidden(
            "only the recording technician or an admin may edit a movement".to_string(),
        ));
    }

    state
        .repo
        .update_movement_editables(
            movement_id,
            req.tokens_collected,
            req.bag_number.as_deref(),
            req.notes.as_deref(),
        )
        .await?;

    let updated = state
        .repo
        .get_movement(movement_id)
        .await?
        .ok_or_else(|| AppError::Internal("movement vanished after update".to_string()))?;
    Ok(Json(updated.into()))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FillFinancialsRequest {
    pub entry_value_tokens: Money,
    pub entry_value_bills: Money,
    pub entry_value_card: Money,
}

pub async fn fill_financials(
    Path(movement_id): Path<i64>,
    State(state): State<AppState>,
    _user: CurrentUser,
    Json(req): Json<FillFinancialsRequest>,
) -> Result<Json<MovementDto>, AppError> {
    if req.entry_value_tokens.is_negative()
        || req.entry_value_bills.is_negative()
        || req.entry_value_card.is_negative()
    {
        return Err(AppError::Validation(
            "payment channel values must not be negative".to_string(),
        ));
    }

    let movement = state
        .settlement
        .fill_financials(
            movement_id,
            req.entry_value_tokens,
            req.entry_value_bills,
            req.entry_value_card,
        )
        .await?;
    Ok(Json(movement.into()))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MovementsQuery {
    pub store_id: Option<i64>,
    pub machine_id: Option<i64>,
    pub route_id: Option<i64>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MovementsResponse {
    pub movements: Vec<MovementDto>,
}

pub async fn list_movements(
    Query(params): Query<MovementsQuery>,
    State(state): State<AppState>,
) -> Result<Json<MovementsResponse>, AppError> {
    let movements = state
        .repo
        .query_movements(params.store_id, params.machine_id, params.route_id)
        .await?;
    Ok(Json(MovementsResponse {
        movements: movements.into_iter().map(Into::into).collect(),
    }))
}
