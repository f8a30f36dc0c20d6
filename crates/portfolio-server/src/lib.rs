//! HTTP API and job scheduler for the portfolio valuation service.

pub mod account_routes;
pub mod config;
pub mod equity_type_routes;
pub mod goal_routes;
pub mod jobs;
pub mod token_routes;
pub mod transaction_routes;
pub mod value_routes;

use anyhow::Result;
use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};
use barebitcoin_client::BareBitcoinClient;
use e24_client::E24Client;
use fundingpartner_client::FundingPartnerClient;
use kron_client::KronClient;
use notification_service::NotificationService;
use portfolio_core::ValuationError;
use portfolio_store::PortfolioDb;
use provider_trait::FixedPriceOverlay;
use serde::Serialize;
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use valuation_engine::{CryptoLedgerProvider, ProviderSet, StockLedgerProvider, ValuationEngine};

use crate::config::AppConfig;

#[derive(Clone)]
pub struct AppState {
    pub db: Arc<PortfolioDb>,
    pub engine: Arc<ValuationEngine>,
    pub kron: Arc<KronClient>,
    pub barebitcoin: Arc<BareBitcoinClient>,
    pub notifications: Arc<NotificationService>,
    pub config: Arc<AppConfig>,
}

#[derive(Debug, Serialize)]
pub struct ApiResponse<T> {
    pub success: bool,
    pub data: Option<T>,
    pub error: Option<String>,
}

impl<T> ApiResponse<T> {
    pub fn success(data: T) -> Self {
        Self {
            success: true,
            data: Some(data),
            error: None,
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self {
            success: false,
            data: None,
            error: Some(message.into()),
        }
    }
}

/// Handler error rendered as a failed `ApiResponse`.
pub struct AppError {
    status: StatusCode,
    error: anyhow::Error,
}

impl AppError {
    pub fn with_status(status: StatusCode, error: anyhow::Error) -> Self {
        Self { status, error }
    }

    pub fn not_found(message: impl std::fmt::Display) -> Self {
        Self::with_status(StatusCode::NOT_FOUND, anyhow::anyhow!("{}", message))
    }

    pub fn bad_request(message: impl std::fmt::Display) -> Self {
        Self::with_status(StatusCode::BAD_REQUEST, anyhow::anyhow!("{}", message))
    }

    /// Status code for an engine or store failure.
    pub fn valuation(error: ValuationError) -> Self {
        let status = match &error {
            ValuationError::AccountNotFound(_) => StatusCode::NOT_FOUND,
            ValuationError::InvalidAllocation(_) => StatusCode::BAD_REQUEST,
            ValuationError::MissingTargetAllocation(_) => StatusCode::UNPROCESSABLE_ENTITY,
            ValuationError::StoreUnavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
            ValuationError::Provider(_) => StatusCode::BAD_GATEWAY,
        };
        Self::with_status(status, error.into())
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        if self.status.is_server_error() {
            tracing::error!("Request failed: {:#}", self.error);
        } else {
            tracing::debug!("Request rejected: {:#}", self.error);
        }
        let body = ApiResponse::<()>::error(format!("{:#}", self.error));
        (self.status, Json(body)).into_response()
    }
}

impl<E> From<E> for AppError
where
    E: Into<anyhow::Error>,
{
    fn from(err: E) -> Self {
        Self::with_status(StatusCode::INTERNAL_SERVER_ERROR, err.into())
    }
}

/// Wire the store, providers and engine together.
pub async fn build_state(config: AppConfig) -> Result<AppState> {
    let db = Arc::new(PortfolioDb::new(&config.database_url).await?);

    let kron = Arc::new(KronClient::from_env(db.clone())?);
    let barebitcoin = Arc::new(BareBitcoinClient::from_env()?);
    let fundingpartner = Arc::new(FundingPartnerClient::from_env()?);
    let stock_prices = Arc::new(FixedPriceOverlay::new(
        config.fixed_prices.clone(),
        Arc::new(E24Client::from_env()?),
    ));

    let providers = ProviderSet {
        token_pair: kron.clone(),
        exchange: barebitcoin.clone(),
        lending: fundingpartner,
        manual_crypto: Arc::new(CryptoLedgerProvider::new(db.clone(), barebitcoin.clone())),
        manual_ledger: Arc::new(StockLedgerProvider::new(db.clone(), stock_prices)),
    };
    let engine = Arc::new(ValuationEngine::new(db.clone(), providers));
    let notifications = Arc::new(NotificationService::new(&config.notifications));

    Ok(AppState {
        db,
        engine,
        kron,
        barebitcoin,
        notifications,
        config: Arc::new(config),
    })
}

async fn health() -> Json<ApiResponse<&'static str>> {
    Json(ApiResponse::success("ok"))
}

pub fn app_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health))
        .merge(account_routes::account_routes())
        .merge(transaction_routes::transaction_routes())
        .merge(equity_type_routes::equity_type_routes())
        .merge(goal_routes::goal_routes())
        .merge(value_routes::value_routes())
        .merge(token_routes::token_routes())
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}

/// Install the tracing subscriber. `RUST_LOG_FORMAT=json` switches to JSON
/// lines.
pub fn init_tracing() {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));

    let json = std::env::var("RUST_LOG_FORMAT")
        .map(|v| v.eq_ignore_ascii_case("json"))
        .unwrap_or(false);

    if json {
        tracing_subscriber::fmt().json().with_env_filter(filter).init();
    } else {
        tracing_subscriber::fmt().with_env_filter(filter).init();
    }

    std::panic::set_hook(Box::new(|info| {
        tracing::error!("Panic: {}", info);
    }));
}

pub async fn run_server() -> Result<()> {
    dotenvy::dotenv().ok();
    init_tracing();

    let config = AppConfig::from_env()?;
    let bind_addr = config.bind_addr.clone();
    let state = build_state(config).await?;

    if state.config.run_jobs_on_startup {
        for job in &state.config.schedules {
            jobs::run_logged(&state, job.kind).await;
        }
    }
    let handles = jobs::spawn_jobs(state.clone());
    tracing::info!("Scheduled {} jobs", handles.len());

    let app = app_router(state);
    let listener = tokio::net::TcpListener::bind(&bind_addr).await?;
    tracing::info!("Portfolio server listening on {}", bind_addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            tokio::signal::ctrl_c().await.ok();
            tracing::info!("Shutdown signal received");
        })
        .await?;

    for handle in handles {
        handle.abort();
    }
    Ok(())
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::Request;
    use tower::ServiceExt;

    pub(crate) async fn test_state() -> AppState {
        let config = AppConfig {
            database_url: "sqlite::memory:".to_string(),
            ..Default::default()
        };
        build_state(config).await.unwrap()
    }

    /// Send a request and decode the JSON body.
    pub(crate) async fn call(
        app: Router,
        method: &str,
        uri: &str,
        body: Option<serde_json::Value>,
    ) -> (StatusCode, serde_json::Value) {
        let request = Request::builder()
            .method(method)
            .uri(uri)
            .header("content-type", "application/json");
        let request = match body {
            Some(json) => request.body(Body::from(json.to_string())).unwrap(),
            None => request.body(Body::empty()).unwrap(),
        };

        let response = app.oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let json = serde_json::from_slice(&bytes).unwrap_or(serde_json::Value::Null);
        (status, json)
    }

    #[tokio::test]
    async fn test_health() {
        let app = app_router(test_state().await);
        let (status, body) = call(app, "GET", "/health", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["success"], true);
        assert_eq!(body["data"], "ok");
    }

    #[tokio::test]
    async fn test_unknown_route_is_404() {
        let app = app_router(test_state().await);
        let (status, _) = call(app, "GET", "/api/nothing", None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[test]
    fn test_error_status_mapping() {
        assert_eq!(
            AppError::valuation(ValuationError::AccountNotFound(1)).status,
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            AppError::valuation(ValuationError::MissingTargetAllocation("FUND".into())).status,
            StatusCode::UNPROCESSABLE_ENTITY
        );
        assert_eq!(
            AppError::valuation(ValuationError::StoreUnavailable("locked".into())).status,
            StatusCode::SERVICE_UNAVAILABLE
        );
    }
}
