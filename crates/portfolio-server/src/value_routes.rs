use axum::{
    extract::{Path, Query, State},
    routing::get,
    Json, Router,
};
use portfolio_core::{Account, AccountId, EquityCategory, InvestmentSummary, KronRebalance, TotalValue};
use portfolio_store::ValuePoint;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use valuation_engine::summary::portfolio_total;
use valuation_engine::AccountSummary;

use crate::{ApiResponse, AppError, AppState};

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AccountValues {
    pub accounts: Vec<TotalValue>,
    pub total_value: Decimal,
}

impl AccountValues {
    fn new(accounts: Vec<TotalValue>) -> Self {
        let total_value = portfolio_total(&accounts);
        Self {
            accounts,
            total_value,
        }
    }
}

#[derive(Deserialize)]
pub struct RebalanceQuery {
    #[serde(default)]
    pub new_money: Decimal,
}

pub fn value_routes() -> Router<AppState> {
    Router::new()
        .route("/api/value/all", get(all_values))
        .route("/api/value/type/:account_type", get(values_for_type))
        .route("/api/value/summary", get(portfolio_summary))
        .route("/api/value/rebalance/:account_id", get(holding_rebalance))
        .route("/api/value/account/:account_id", get(account_summary))
        .route("/api/value/history/:account_id", get(value_history))
}

/// Norwegian account wrapper names resolve to the asset class they hold.
pub fn category_for_account_type(account_type: &str) -> EquityCategory {
    match account_type {
        "Aksjesparekonto" => EquityCategory::Fund,
        "Aksjefondskonto" => EquityCategory::Stock,
        other => EquityCategory::parse(other),
    }
}

fn matches_type(account: &Account, account_type: &str, category: EquityCategory) -> bool {
    account.account_type.eq_ignore_ascii_case(account_type)
        || (category.is_known() && account.category() == category)
}

async fn all_values(
    State(state): State<AppState>,
) -> Result<Json<ApiResponse<AccountValues>>, AppError> {
    let values = state
        .engine
        .calculate_all_values()
        .await
        .map_err(AppError::valuation)?;
    Ok(Json(ApiResponse::success(AccountValues::new(values))))
}

async fn values_for_type(
    State(state): State<AppState>,
    Path(account_type): Path<String>,
) -> Result<Json<ApiResponse<AccountValues>>, AppError> {
    let category = category_for_account_type(&account_type);
    let accounts: Vec<Account> = state
        .db
        .list_accounts()
        .await?
        .into_iter()
        .filter(|a| matches_type(a, &account_type, category))
        .collect();

    let values = state
        .engine
        .calculate_account_values(&accounts)
        .await
        .map_err(AppError::valuation)?;
    Ok(Json(ApiResponse::success(AccountValues::new(values))))
}

async fn portfolio_summary(
    State(state): State<AppState>,
) -> Result<Json<ApiResponse<Vec<InvestmentSummary>>>, AppError> {
    let rows = state
        .engine
        .calculate_portfolio_summary()
        .await
        .map_err(AppError::valuation)?;
    Ok(Json(ApiResponse::success(rows)))
}

async fn holding_rebalance(
    State(state): State<AppState>,
    Path(account_id): Path<AccountId>,
    Query(query): Query<RebalanceQuery>,
) -> Result<Json<ApiResponse<Vec<KronRebalance>>>, AppError> {
    if query.new_money < Decimal::ZERO {
        return Err(AppError::bad_request("new_money must not be negative"));
    }
    let plan = state
        .engine
        .calculate_holding_rebalance(account_id, query.new_money)
        .await
        .map_err(AppError::valuation)?;
    Ok(Json(ApiResponse::success(plan)))
}

async fn account_summary(
    State(state): State<AppState>,
    Path(account_id): Path<AccountId>,
) -> Result<Json<ApiResponse<AccountSummary>>, AppError> {
    let account = state
        .db
        .get_account(account_id)
        .await?
        .ok_or_else(|| AppError::not_found(format!("Account {} not found", account_id)))?;
    let summary = state
        .engine
        .summarize_account(&account)
        .await
        .map_err(AppError::valuation)?;
    Ok(Json(ApiResponse::success(summary)))
}

async fn value_history(
    State(state): State<AppState>,
    Path(account_id): Path<AccountId>,
) -> Result<Json<ApiResponse<Vec<ValuePoint>>>, AppError> {
    let points = state.db.value_over_time(account_id).await?;
    Ok(Json(ApiResponse::success(points)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::app_router;
    use crate::tests::{call, test_state};
    use axum::http::StatusCode;
    use portfolio_store::NewAccount;
    use rust_decimal_macros::dec;

    fn manual(name: &str, account_type: &str) -> NewAccount {
        NewAccount {
            name: name.to_string(),
            account_type: account_type.to_string(),
            is_automatic: false,
            total_value: None,
            access_info: None,
        }
    }

    #[test]
    fn test_account_type_mapping() {
        assert_eq!(category_for_account_type("Aksjesparekonto"), EquityCategory::Fund);
        assert_eq!(category_for_account_type("Aksjefondskonto"), EquityCategory::Stock);
        assert_eq!(category_for_account_type("LOAN"), EquityCategory::Loan);
        assert_eq!(category_for_account_type("Sparekonto"), EquityCategory::Unknown);
    }

    #[tokio::test]
    async fn test_values_with_empty_ledgers() {
        let state = test_state().await;
        state.db.create_account(&manual("Fond", "FUND")).await.unwrap();
        state.db.create_account(&manual("Aksjer", "STOCK")).await.unwrap();
        let app = app_router(state);

        let (status, body) = call(app.clone(), "GET", "/api/value/all", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["data"]["accounts"].as_array().unwrap().len(), 2);
        assert_eq!(body["data"]["totalValue"], 0.0);

        let (_, body) = call(app, "GET", "/api/value/type/Aksjesparekonto", None).await;
        let accounts = body["data"]["accounts"].as_array().unwrap();
        assert_eq!(accounts.len(), 1);
        assert_eq!(accounts[0]["account_name"], "Fond");
    }

    #[tokio::test]
    async fn test_summary_without_target_is_unprocessable() {
        let state = test_state().await;
        state.db.create_account(&manual("Fond", "FUND")).await.unwrap();
        let app = app_router(state);

        let (status, body) = call(app, "GET", "/api/value/summary", None).await;
        assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
        assert!(body["error"].as_str().unwrap().contains("FUND"));
    }

    #[tokio::test]
    async fn test_summary_with_targets() {
        let state = test_state().await;
        state.db.create_account(&manual("Fond", "FUND")).await.unwrap();
        state.db.set_wanted_allocation("FUND", dec!(100)).await.unwrap();
        let app = app_router(state);

        let (status, body) = call(app, "GET", "/api/value/summary", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["data"][0]["equity_type"], "FUND");
    }

    #[tokio::test]
    async fn test_rebalance_unknown_account() {
        let app = app_router(test_state().await);
        let (status, _) = call(app.clone(), "GET", "/api/value/rebalance/9?new_money=500", None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        let (status, _) = call(app, "GET", "/api/value/rebalance/9?new_money=-1", None).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }
}
