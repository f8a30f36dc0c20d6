use axum::{
    extract::{Path, State},
    http::StatusCode,
    routing::get,
    Json, Router,
};
use portfolio_core::{Account, AccountId};
use portfolio_store::NewAccount;

use crate::{ApiResponse, AppError, AppState};

pub fn account_routes() -> Router<AppState> {
    Router::new()
        .route("/api/accounts", get(list_accounts).post(create_account))
        .route(
            "/api/accounts/:id",
            get(get_account).put(update_account).delete(delete_account),
        )
}

async fn load(state: &AppState, id: AccountId) -> Result<Account, AppError> {
    state
        .db
        .get_account(id)
        .await?
        .ok_or_else(|| AppError::not_found(format!("Account {} not found", id)))
}

/// Access info never leaves the server.
async fn list_accounts(
    State(state): State<AppState>,
) -> Result<Json<ApiResponse<Vec<Account>>>, AppError> {
    let accounts = state.db.list_accounts().await?;
    Ok(Json(ApiResponse::success(
        accounts.iter().map(Account::redacted).collect(),
    )))
}

async fn get_account(
    State(state): State<AppState>,
    Path(id): Path<AccountId>,
) -> Result<Json<ApiResponse<Account>>, AppError> {
    let account = load(&state, id).await?;
    Ok(Json(ApiResponse::success(account.redacted())))
}

async fn create_account(
    State(state): State<AppState>,
    Json(request): Json<NewAccount>,
) -> Result<(StatusCode, Json<ApiResponse<Account>>), AppError> {
    request.validate().map_err(AppError::bad_request)?;

    let id = state.db.create_account(&request).await?;
    let account = load(&state, id).await?;
    Ok((StatusCode::CREATED, Json(ApiResponse::success(account.redacted()))))
}

async fn update_account(
    State(state): State<AppState>,
    Path(id): Path<AccountId>,
    Json(request): Json<NewAccount>,
) -> Result<Json<ApiResponse<Account>>, AppError> {
    let existing = load(&state, id).await?;

    // Automatic accounts may keep their stored credentials on update.
    let has_credentials = request.access_info.is_some() || existing.credentials().is_some();
    if request.is_automatic && !has_credentials {
        return Err(AppError::bad_request(
            "Automatic accounts need an account key or a username and password",
        ));
    }
    if request.name.trim().is_empty() {
        return Err(AppError::bad_request("Account name is required"));
    }

    if !state.db.update_account(id, &request).await? {
        return Err(AppError::not_found(format!("Account {} not found", id)));
    }
    let account = load(&state, id).await?;
    Ok(Json(ApiResponse::success(account.redacted())))
}

async fn delete_account(
    State(state): State<AppState>,
    Path(id): Path<AccountId>,
) -> Result<Json<ApiResponse<AccountId>>, AppError> {
    if !state.db.delete_account(id).await? {
        return Err(AppError::not_found(format!("Account {} not found", id)));
    }
    tracing::info!("Deleted account {}", id);
    Ok(Json(ApiResponse::success(id)))
}

#[cfg(test)]
mod tests {
    use crate::app_router;
    use crate::tests::{call, test_state};
    use axum::http::StatusCode;
    use serde_json::json;

    #[tokio::test]
    async fn test_account_lifecycle_hides_access_info() {
        let app = app_router(test_state().await);

        let (status, body) = call(
            app.clone(),
            "POST",
            "/api/accounts",
            Some(json!({
                "name": "Kron",
                "account_type": "FUND",
                "is_automatic": true,
                "access_info": {"account_key": "acc-1", "access_key": "secret"}
            })),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED);
        assert!(body["data"]["access_info"].is_null());
        let id = body["data"]["id"].as_i64().unwrap();

        let (status, body) = call(app.clone(), "GET", "/api/accounts", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["data"].as_array().unwrap().len(), 1);
        assert!(body["data"][0]["access_info"].is_null());

        let (status, body) = call(
            app.clone(),
            "PUT",
            &format!("/api/accounts/{}", id),
            Some(json!({"name": "Kron indeks", "account_type": "FUND", "is_automatic": true})),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["data"]["name"], "Kron indeks");

        let (status, _) = call(app.clone(), "DELETE", &format!("/api/accounts/{}", id), None).await;
        assert_eq!(status, StatusCode::OK);
        let (status, body) = call(app, "GET", &format!("/api/accounts/{}", id), None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body["success"], false);
    }

    #[tokio::test]
    async fn test_automatic_account_requires_credentials() {
        let app = app_router(test_state().await);
        let (status, body) = call(
            app,
            "POST",
            "/api/accounts",
            Some(json!({"name": "Lån", "account_type": "LOAN", "is_automatic": true})),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(body["error"].as_str().unwrap().contains("Automatic accounts"));
    }

    #[tokio::test]
    async fn test_delete_missing_account() {
        let app = app_router(test_state().await);
        let (status, _) = call(app, "DELETE", "/api/accounts/99", None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }
}
