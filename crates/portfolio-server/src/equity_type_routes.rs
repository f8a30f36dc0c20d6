use axum::{
    extract::{Path, State},
    routing::{get, post},
    Json, Router,
};
use portfolio_core::EquityType;
use portfolio_store::AllocationUpdate;
use rust_decimal::Decimal;
use std::str::FromStr;

use crate::{ApiResponse, AppError, AppState};

pub fn equity_type_routes() -> Router<AppState> {
    Router::new()
        .route("/api/equity-types", get(list_equity_types))
        .route("/api/equity-types/:name", get(get_equity_type))
        .route("/api/equity-types/:name/:allocation", post(set_allocation))
}

async fn list_equity_types(
    State(state): State<AppState>,
) -> Result<Json<ApiResponse<Vec<EquityType>>>, AppError> {
    let types = state
        .db
        .list_equity_types()
        .await
        .map_err(AppError::valuation)?;
    Ok(Json(ApiResponse::success(types)))
}

async fn get_equity_type(
    State(state): State<AppState>,
    Path(name): Path<String>,
) -> Result<Json<ApiResponse<EquityType>>, AppError> {
    let equity_type = state
        .db
        .get_equity_type(&name)
        .await
        .map_err(AppError::valuation)?
        .ok_or_else(|| AppError::not_found(format!("Equity type {} not found", name)))?;
    Ok(Json(ApiResponse::success(equity_type)))
}

async fn set_allocation(
    State(state): State<AppState>,
    Path((name, allocation)): Path<(String, String)>,
) -> Result<Json<ApiResponse<AllocationUpdate>>, AppError> {
    let allocation = Decimal::from_str(allocation.trim())
        .map_err(|_| AppError::bad_request(format!("'{}' is not a number", allocation)))?;

    let update = state
        .db
        .set_wanted_allocation(&name, allocation)
        .await
        .map_err(AppError::valuation)?;
    Ok(Json(ApiResponse::success(update)))
}
