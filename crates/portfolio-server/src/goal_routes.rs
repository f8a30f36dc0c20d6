use axum::{
    extract::{Path, State},
    routing::get,
    Json, Router,
};
use portfolio_core::{AccountId, HoldingGoal};
use rust_decimal::Decimal;
use serde::Deserialize;

use crate::{ApiResponse, AppError, AppState};

#[derive(Deserialize)]
pub struct GoalRequest {
    pub holding_name: String,
    pub goal_percentage: Decimal,
}

pub fn goal_routes() -> Router<AppState> {
    Router::new().route("/api/goals/:account_id", get(list_goals).put(set_goals))
}

async fn list_goals(
    State(state): State<AppState>,
    Path(account_id): Path<AccountId>,
) -> Result<Json<ApiResponse<Vec<HoldingGoal>>>, AppError> {
    let goals = state
        .db
        .list_goals(account_id)
        .await
        .map_err(AppError::valuation)?;
    Ok(Json(ApiResponse::success(goals)))
}

async fn set_goals(
    State(state): State<AppState>,
    Path(account_id): Path<AccountId>,
    Json(request): Json<Vec<GoalRequest>>,
) -> Result<Json<ApiResponse<Vec<HoldingGoal>>>, AppError> {
    if state.db.get_account(account_id).await?.is_none() {
        return Err(AppError::not_found(format!("Account {} not found", account_id)));
    }
    if request.iter().any(|g| g.holding_name.trim().is_empty()) {
        return Err(AppError::bad_request("Holding name is required"));
    }

    let goals: Vec<(String, Decimal)> = request
        .into_iter()
        .map(|g| (g.holding_name.trim().to_string(), g.goal_percentage))
        .collect();
    let stored = state
        .db
        .set_goals(account_id, &goals)
        .await
        .map_err(AppError::valuation)?;
    Ok(Json(ApiResponse::success(stored)))
}
