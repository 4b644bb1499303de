pub mod commissions;
pub mod health;
pub mod maintenance;
pub mod movements;
pub mod receivables;
pub mod reports;
pub mod routes;

use crate::config::Config;
use crate::db::Repository;
use crate::domain::Role;
use crate::error::AppError;
use crate::orchestration::{RouteManager, SettlementTracker};
use axum::async_trait;
use axum::extract::FromRequestParts;
use axum::http::request::Parts;
use axum::routing::{get, post, put};
use axum::Router;
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};

#[derive(Clone)]
pub struct AppState {
    pub repo: Arc<Repository>,
    pub config: Config,
    pub route_manager: Arc<RouteManager>,
    pub settlement: Arc<SettlementTracker>,
}

impl AppState {
    pub fn new(repo: Arc<Repository>, config: Config) -> Self {
        let route_manager = Arc::new(RouteManager::new(repo.clone(), &config));
        let settlement = Arc::new(SettlementTracker::new(repo.clone()));
        Self {
            repo,
            config,
            route_manager,
            settlement,
        }
    }
}

/// Identity established by the fronting auth layer, forwarded as headers.
/// Authentication itself is an external collaborator; these headers are
/// trusted as-is.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CurrentUser {
    pub user_id: i64,
    pub role: Role,
}

#[async_trait]
impl<S> FromRequestParts<S> for CurrentUser
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let user_id = parts
            .headers
            .get("x-user-id")
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.parse::<i64>().ok())
            .ok_or_else(|| {
                AppError::Validation("missing or invalid x-user-id header".to_string())
            })?;

        let role = parts
            .headers
            .get("x-user-role")
            .and_then(|v| v.to_str().ok())
            .and_then(Role::parse)
            .ok_or_else(|| {
                AppError::Validation("missing or invalid x-user-role header".to_string())
            })?;

        Ok(CurrentUser { user_id, role })
    }
}

pub fn create_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/health", get(health::health))
        .route("/ready", get(health::ready))
        .route("/routes/generate", post(routes::generate_routes))
        .route("/routes/template", post(routes::save_template))
        .route(
            "/routes/:route_id",
            get(routes::get_route).delete(routes::delete_route),
        )
        .route("/routes/:route_id/start", post(routes::start_route))
        .route("/routes/:route_id/conclude", post(routes::conclude_route))
        .route("/routes/:route_id/stores", post(routes::add_store))
        .route(
            "/routes/:route_id/stores/:store_id",
            axum::routing::delete(routes::remove_store),
        )
        .route(
            "/routes/:route_id/stores/:store_id/move",
            post(routes::move_store),
        )
        .route(
            "/routes/:route_id/stores/:store_id/complete",
            post(routes::complete_store),
        )
        .route(
            "/routes/:route_id/stores/:store_id/defer",
            post(routes::defer_store),
        )
        .route(
            "/stores/:store_id/commission/calculate",
            post(commissions::calculate_commission),
        )
        .route(
            "/movements",
            post(movements::create_movement).get(movements::list_movements),
        )
        .route("/movements/:movement_id", put(movements::edit_movement))
        .route(
            "/movements/:movement_id/financial",
            put(movements::fill_financials),
        )
        .route(
            "/deferred-receivables/:receivable_id/receive",
            put(receivables::receive_receivable),
        )
        .route("/reports/stock-deltas", get(reports::stock_deltas))
        .route(
            "/maintenance/weekly-reset",
            post(maintenance::weekly_reset),
        )
        .layer(cors)
        .with_state(state)
}
