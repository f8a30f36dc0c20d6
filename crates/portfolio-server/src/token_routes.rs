use axum::{extract::State, routing::post, Json, Router};
use portfolio_core::ProviderToken;
use serde::Deserialize;

use crate::{ApiResponse, AppError, AppState};

#[derive(Deserialize)]
pub struct TokenRequest {
    pub refresh_token: String,
    pub access_token: String,
    #[serde(default)]
    pub token_type: Option<String>,
}

pub fn token_routes() -> Router<AppState> {
    Router::new().route("/api/token", post(set_token))
}

/// Replace the stored Kron token pair.
async fn set_token(
    State(state): State<AppState>,
    Json(request): Json<TokenRequest>,
) -> Result<Json<ApiResponse<&'static str>>, AppError> {
    if request.refresh_token.trim().is_empty() || request.access_token.trim().is_empty() {
        return Err(AppError::bad_request("refresh_token and access_token are required"));
    }

    state
        .db
        .save_kron_token(&ProviderToken {
            access_token: request.access_token,
            refresh_token: request.refresh_token,
            token_type: request.token_type,
        })
        .await?;
    tracing::info!("Kron token updated");
    Ok(Json(ApiResponse::success("Token updated")))
}
