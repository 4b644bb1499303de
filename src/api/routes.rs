use axum::extract::{Path, Query, State};
use axum::Json;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use super::{AppState, CurrentUser};
use crate::domain::{Money, Route, RouteStore, TemplateEntry, TimeMs};
use crate::error::AppError;
use crate::orchestration::CompletionSummary;

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RouteDto {
    pub id: i64,
    pub date: NaiveDate,
    pub zone: String,
    pub status: String,
    pub assigned_technician_id: Option<i64>,
    pub total_machines: i64,
    pub machines_completed: i64,
    pub remaining_budget: Money,
}

impl From<Route> for RouteDto {
    fn from(route: Route) -> Self {
        RouteDto {
            id: route.id,
            date: route.date,
            zone: route.zone,
            status: route.status.as_str().to_string(),
            assigned_technician_id: route.assigned_technician_id,
            total_machines: route.total_machines,
            machines_completed: route.machines_completed,
            remaining_budget: route.remaining_budget,
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RouteStoreDto {
    pub store_id: i64,
    pub position: i64,
    pub concluded: bool,
}

impl From<RouteStore> for RouteStoreDto {
    fn from(rs: RouteStore) -> Self {
        RouteStoreDto {
            store_id: rs.store_id,
            position: rs.position,
            concluded: rs.concluded,
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RouteProgressResponse {
    pub route: RouteDto,
    pub stores: Vec<RouteStoreDto>,
}

fn progress_response(route: Route, stores: Vec<RouteStore>) -> RouteProgressResponse {
    RouteProgressResponse {
        route: route.into(),
        stores: stores.into_iter().map(Into::into).collect(),
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerateRequest {
    /// Week start; defaults to today when omitted.
    pub date: Option<NaiveDate>,
    pub use_template: Option<bool>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerateResponse {
    pub route_ids: Vec<i64>,
}

pub async fn generate_routes(
    State(state): State<AppState>,
    body: Option<Json<GenerateRequest>>,
) -> Result<Json<GenerateResponse>, AppError> {
    let req = body.map(|Json(r)| r).unwrap_or_default();
    let start_date = req.date.unwrap_or_else(|| chrono::Utc::now().date_naive());
    let route_ids = state
        .route_manager
        .generate(start_date, req.use_template.unwrap_or(false))
        .await?;
    Ok(Json(GenerateResponse { route_ids }))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SaveTemplateRequest {
    pub entries: Vec<TemplateEntry>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SaveTemplateResponse {
    pub template_id: i64,
    pub version: i64,
}

pub async fn save_template(
    State(state): State<AppState>,
    Json(req): Json<SaveTemplateRequest>,
) -> Result<Json<SaveTemplateResponse>, AppError> {
    if req.entries.is_empty() {
        return Err(AppError::Validation(
            "template must have at least one entry".to_string(),
        ));
    }
    let (template_id, version) = state.repo.save_template(&req.entries, TimeMs::now()).await?;
    Ok(Json(SaveTemplateResponse {
        template_id,
        version,
    }))
}

pub async fn get_route(
    Path(route_id): Path<i64>,
    State(state): State<AppState>,
) -> Result<Json<RouteProgressResponse>, AppError> {
    let (route, stores) = state.route_manager.progress(route_id).await?;
    Ok(Json(progress_response(route, stores)))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StartRouteRequest {
    pub technician_id: Option<i64>,
}

pub async fn start_route(
    Path(route_id): Path<i64>,
    State(state): State<AppState>,
    user: CurrentUser,
    body: Option<Json<StartRouteRequest>>,
) -> Result<Json<RouteDto>, AppError> {
    // an admin may start a route on another technician's behalf
    let technician_id = body
        .and_then(|Json(r)| r.technician_id)
        .unwrap_or(user.user_id);
    let route = state.route_manager.start(route_id, technician_id).await?;
    Ok(Json(route.into()))
}

pub async fn conclude_route(
    Path(route_id): Path<i64>,
    State(state): State<AppState>,
) -> Result<Json<RouteDto>, AppError> {
    let route = state.route_manager.conclude(route_id).await?;
    Ok(Json(route.into()))
}

#[derive(Debug, Deserialize)]
pub struct DeleteRouteQuery {
    pub force: Option<bool>,
}

pub async fn delete_route(
    Path(route_id): Path<i64>,
    Query(params): Query<DeleteRouteQuery>,
    State(state): State<AppState>,
) -> Result<Json<serde_json::Value>, AppError> {
    state
        .route_manager
        .delete(route_id, params.force.unwrap_or(false))
        .await?;
    Ok(Json(serde_json::json!({"deleted": route_id})))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AddStoreRequest {
    pub store_id: i64,
}

pub async fn add_store(
    Path(route_id): Path<i64>,
    State(state): State<AppState>,
    Json(req): Json<AddStoreRequest>,
) -> Result<Json<RouteProgressResponse>, AppError> {
    state.route_manager.add_store(route_id, req.store_id).await?;
    let (route, stores) = state.route_manager.progress(route_id).await?;
    Ok(Json(progress_response(route, stores)))
}

pub async fn remove_store(
    Path((route_id, store_id)): Path<(i64, i64)>,
    State(state): State<AppState>,
) -> Result<Json<RouteProgressResponse>, AppError> {
    state.route_manager.remove_store(route_id, store_id).await?;
    let (route, stores) = state.route_manager.progress(route_id).await?;
    Ok(Json(progress_response(route, stores)))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MoveStoreRequest {
    pub to_route_id: i64,
}

pub async fn move_store(
    Path((route_id, store_id)): Path<(i64, i64)>,
    State(state): State<AppState>,
    Json(req): Json<MoveStoreRequest>,
) -> Result<Json<RouteProgressResponse>, AppError> {
    state
        .route_manager
        .move_store(route_id, req.to_route_id, store_id)
        .await?;
    let (route, stores) = state.route_manager.progress(req.to_route_id).await?;
    Ok(Json(progress_response(route, stores)))
}

pub async fn complete_store(
    Path((route_id, store_id)): Path<(i64, i64)>,
    State(state): State<AppState>,
    _user: CurrentUser,
) -> Result<Json<CompletionSummary>, AppError> {
    let summary = state
        .route_manager
        .complete_store(route_id, store_id, TimeMs::now())
        .await?;
    Ok(Json(summary))
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DeferResponse {
    pub receivable_id: i64,
}

pub async fn defer_store(
    Path((route_id, store_id)): Path<(i64, i64)>,
    State(state): State<AppState>,
    _user: CurrentUser,
) -> Result<Json<DeferResponse>, AppError> {
    let receivable_id = state
        .route_manager
        .defer_store(route_id, store_id, TimeMs::now())
        .await?;
    Ok(Json(DeferResponse { receivable_id }))
}
