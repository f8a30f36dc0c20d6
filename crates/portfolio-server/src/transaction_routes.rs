use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    routing::get,
    Json, Router,
};
use portfolio_core::{AccountId, Transaction};
use serde::Deserialize;

use crate::{ApiResponse, AppError, AppState};

#[derive(Deserialize)]
pub struct TransactionQuery {
    pub account_id: Option<AccountId>,
}

pub fn transaction_routes() -> Router<AppState> {
    Router::new()
        .route("/api/transactions", get(list_transactions).post(create_transaction))
        .route(
            "/api/transactions/:id",
            get(get_transaction)
                .put(update_transaction)
                .delete(delete_transaction),
        )
}

async fn ensure_account(state: &AppState, account_id: AccountId) -> Result<(), AppError> {
    if state.db.get_account(account_id).await?.is_none() {
        return Err(AppError::bad_request(format!("Account {} does not exist", account_id)));
    }
    Ok(())
}

async fn list_transactions(
    State(state): State<AppState>,
    Query(query): Query<TransactionQuery>,
) -> Result<Json<ApiResponse<Vec<Transaction>>>, AppError> {
    let transactions = match query.account_id {
        Some(account_id) => state.db.list_transactions(account_id).await?,
        None => state.db.list_all_transactions().await?,
    };
    Ok(Json(ApiResponse::success(transactions)))
}

async fn get_transaction(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<Json<ApiResponse<Transaction>>, AppError> {
    let transaction = state
        .db
        .get_transaction(id)
        .await?
        .ok_or_else(|| AppError::not_found(format!("Transaction {} not found", id)))?;
    Ok(Json(ApiResponse::success(transaction)))
}

async fn create_transaction(
    State(state): State<AppState>,
    Json(mut transaction): Json<Transaction>,
) -> Result<(StatusCode, Json<ApiResponse<Transaction>>), AppError> {
    ensure_account(&state, transaction.account_id).await?;

    let id = state.db.create_transaction(&transaction).await?;
    transaction.id = Some(id);
    Ok((StatusCode::CREATED, Json(ApiResponse::success(transaction))))
}

async fn update_transaction(
    State(state): State<AppState>,
    Path(id): Path<i64>,
    Json(mut transaction): Json<Transaction>,
) -> Result<Json<ApiResponse<Transaction>>, AppError> {
    ensure_account(&state, transaction.account_id).await?;

    if !state.db.update_transaction(id, &transaction).await? {
        return Err(AppError::not_found(format!("Transaction {} not found", id)));
    }
    transaction.id = Some(id);
    Ok(Json(ApiResponse::success(transaction)))
}

async fn delete_transaction(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<Json<ApiResponse<i64>>, AppError> {
    if !state.db.delete_transaction(id).await? {
        return Err(AppError::not_found(format!("Transaction {} not found", id)));
    }
    Ok(Json(ApiResponse::success(id)))
}
