use anyhow::{anyhow, Context, Result};
use barebitcoin_client::ApiKeys;
use chrono::{DateTime, Utc};
use chrono_tz::Tz;
use cron::Schedule;
use notification_service::Notification;
use portfolio_core::Account;
use rust_decimal::Decimal;
use tokio::task::JoinHandle;
use tracing::{error, info, warn};
use valuation_engine::ProviderKind;

use crate::config::ScheduledJob;
use crate::AppState;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JobKind {
    InvestmentSummary,
    ValueOverTime,
    KronSummary,
    KronTokenRefresh,
    LimitOrders,
}

impl JobKind {
    pub const ALL: [JobKind; 5] = [
        JobKind::InvestmentSummary,
        JobKind::ValueOverTime,
        JobKind::KronSummary,
        JobKind::KronTokenRefresh,
        JobKind::LimitOrders,
    ];

    /// Variable holding the job's cron expression.
    pub fn env_key(&self) -> &'static str {
        match self {
            JobKind::InvestmentSummary => "INVESTMENT_SUMMARY_CRON",
            JobKind::ValueOverTime => "VALUE_OVER_TIME_CRON",
            JobKind::KronSummary => "KRON_SUMMARY_CRON",
            JobKind::KronTokenRefresh => "KRON_REFRESH_TOKEN_CRON",
            JobKind::LimitOrders => "LIMIT_ORDER_CRON",
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            JobKind::InvestmentSummary => "investment_summary",
            JobKind::ValueOverTime => "value_over_time",
            JobKind::KronSummary => "kron_summary",
            JobKind::KronTokenRefresh => "kron_refresh_token",
            JobKind::LimitOrders => "limit_orders",
        }
    }
}

/// Next fire time strictly after `now`, in the schedule's timezone.
pub fn next_fire(schedule: &Schedule, timezone: Tz, now: DateTime<Utc>) -> Option<DateTime<Tz>> {
    schedule.after(&now.with_timezone(&timezone)).next()
}

/// Change in portfolio value since the previous run. No previous run counts
/// as zero.
pub fn since_last(total: Decimal, previous: Option<Decimal>) -> Decimal {
    total - previous.unwrap_or_default()
}

/// Spawn one loop per scheduled job.
pub fn spawn_jobs(state: AppState) -> Vec<JoinHandle<()>> {
    let timezone = state.config.timezone;
    let jobs = state.config.schedules.clone();

    jobs.into_iter()
        .map(|ScheduledJob { kind, schedule }| {
            let state = state.clone();
            tokio::spawn(async move {
                loop {
                    let Some(next) = next_fire(&schedule, timezone, Utc::now()) else {
                        warn!("Job {} has no upcoming fire time, stopping", kind.name());
                        return;
                    };
                    info!("Next fire time for {}: {}", kind.name(), next);

                    let wait = (next.with_timezone(&Utc) - Utc::now())
                        .to_std()
                        .unwrap_or_default();
                    tokio::time::sleep(wait).await;

                    run_logged(&state, kind).await;
                }
            })
        })
        .collect()
}

/// Run a job, logging instead of propagating failure.
pub async fn run_logged(state: &AppState, kind: JobKind) {
    info!("Running job {}", kind.name());
    match run_job(state, kind).await {
        Ok(()) => info!("Job {} finished", kind.name()),
        Err(e) => error!("Job {} failed: {:#}", kind.name(), e),
    }
}

pub async fn run_job(state: &AppState, kind: JobKind) -> Result<()> {
    match kind {
        JobKind::InvestmentSummary => investment_summary(state).await,
        JobKind::ValueOverTime => value_over_time(state).await,
        JobKind::KronSummary => kron_summary(state).await,
        JobKind::KronTokenRefresh => kron_token_refresh(state).await,
        JobKind::LimitOrders => limit_orders(state).await,
    }
}

async fn investment_summary(state: &AppState) -> Result<()> {
    let rows = state.engine.calculate_portfolio_summary().await?;
    let total: Decimal = rows.iter().map(|row| row.market_value).sum();

    let previous = state.db.last_total_value().await?;
    let since = since_last(total, previous);
    state.db.update_last_total_value(total).await?;

    info!("Portfolio total {} ({} since last)", total, since);
    state
        .notifications
        .send_async(&Notification::portfolio_summary(rows, total, since))
        .await;
    Ok(())
}

async fn value_over_time(state: &AppState) -> Result<()> {
    let values = state.engine.calculate_all_values().await?;
    let today = Utc::now().with_timezone(&state.config.timezone).date_naive();

    for value in &values {
        let Some(account_id) = value.account_id else {
            continue;
        };
        state
            .db
            .record_value_over_time(account_id, today, value.market_value)
            .await?;
        state
            .db
            .update_account_total_value(account_id, value.market_value)
            .await?;
    }
    info!("Recorded value over time for {} accounts", values.len());
    Ok(())
}

fn is_token_pair(account: &Account) -> bool {
    ProviderKind::for_account(account) == Some(ProviderKind::TokenPair)
}

async fn kron_summary(state: &AppState) -> Result<()> {
    let accounts: Vec<Account> = state
        .db
        .list_accounts()
        .await?
        .into_iter()
        .filter(is_token_pair)
        .collect();

    if accounts.is_empty() {
        info!("No token-pair accounts to summarize");
        return Ok(());
    }

    let now = Utc::now();
    for account in &accounts {
        if let Some(expires_at) = account
            .access_info
            .as_ref()
            .and_then(|info| state.config.access_key_expiry.warning_due(info, now))
        {
            warn!("Access key for {} expires {}", account.name, expires_at);
            state
                .notifications
                .send_async(&Notification::access_key_expiring(&account.name, expires_at))
                .await;
        }

        if let Err(e) = summarize_account(state, account).await {
            error!("Summary for {} failed: {:#}", account.name, e);
        }
    }
    Ok(())
}

async fn summarize_account(state: &AppState, account: &Account) -> Result<()> {
    let summary = state.engine.summarize_account(account).await?;
    let since = since_last(summary.total_value, Some(account.total_value));

    state
        .notifications
        .send_async(&Notification::account_summary(
            &account.name,
            summary.rows,
            summary.total_value,
            since,
        ))
        .await;

    state
        .db
        .update_account_total_value(account.id, summary.total_value)
        .await?;
    Ok(())
}

async fn kron_token_refresh(state: &AppState) -> Result<()> {
    if let Some(seed) = &state.config.kron_seed {
        info!("Seeding Kron token from environment");
        state.db.save_kron_token(seed).await?;
        return Ok(());
    }
    state.kron.refresh_and_store().await?;
    Ok(())
}

async fn limit_orders(state: &AppState) -> Result<()> {
    let account_id = state
        .config
        .limit_order_account_id
        .context("LIMIT_ORDER_ACCOUNT_ID not set")?;
    let account = state
        .db
        .get_account(account_id)
        .await?
        .ok_or_else(|| anyhow!("Limit order account {} not found", account_id))?;

    let keys = ApiKeys::from_account(&account)?;
    let placed = state
        .barebitcoin
        .replace_limit_orders(&keys, &state.config.ladder)
        .await?;
    info!("Placed {} limit orders for {}", placed.len(), account.name);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::parse_cron;
    use crate::tests::test_state;
    use chrono::TimeZone;
    use portfolio_store::NewAccount;
    use rust_decimal_macros::dec;

    #[test]
    fn test_next_fire_respects_timezone() {
        let schedule = parse_cron("0 8 * * *").unwrap();
        // 06:30 UTC is 08:30 in Oslo during summer time
        let now = Utc.with_ymd_and_hms(2024, 6, 3, 6, 30, 0).unwrap();
        let next = next_fire(&schedule, chrono_tz::Europe::Oslo, now).unwrap();
        assert_eq!(next.with_timezone(&Utc), Utc.with_ymd_and_hms(2024, 6, 4, 6, 0, 0).unwrap());
    }

    #[test]
    fn test_since_last() {
        assert_eq!(since_last(dec!(1000), Some(dec!(900))), dec!(100));
        assert_eq!(since_last(dec!(1000), None), dec!(1000));
    }

    #[test]
    fn test_env_keys_are_distinct() {
        let mut keys: Vec<&str> = JobKind::ALL.iter().map(|k| k.env_key()).collect();
        keys.sort();
        keys.dedup();
        assert_eq!(keys.len(), JobKind::ALL.len());
    }

    #[tokio::test]
    async fn test_investment_summary_stores_last_total() {
        let state = test_state().await;
        state.db.set_wanted_allocation("FUND", dec!(100)).await.unwrap();
        state
            .db
            .create_account(&NewAccount {
                name: "Fond".to_string(),
                account_type: "FUND".to_string(),
                is_automatic: false,
                total_value: None,
                access_info: None,
            })
            .await
            .unwrap();

        run_job(&state, JobKind::InvestmentSummary).await.unwrap();
        assert_eq!(state.db.last_total_value().await.unwrap(), Some(Decimal::ZERO));
    }

    #[tokio::test]
    async fn test_value_over_time_records_each_account() {
        let state = test_state().await;
        let id = state
            .db
            .create_account(&NewAccount {
                name: "Aksjer".to_string(),
                account_type: "STOCK".to_string(),
                is_automatic: false,
                total_value: Some(dec!(500)),
                access_info: None,
            })
            .await
            .unwrap();

        run_job(&state, JobKind::ValueOverTime).await.unwrap();
        let points = state.db.value_over_time(id).await.unwrap();
        assert_eq!(points.len(), 1);
        assert_eq!(points[0].value, Decimal::ZERO);
        let account = state.db.get_account(id).await.unwrap().unwrap();
        assert_eq!(account.total_value, Decimal::ZERO);
    }

    #[tokio::test]
    async fn test_limit_orders_need_an_account() {
        let state = test_state().await;
        assert!(run_job(&state, JobKind::LimitOrders).await.is_err());
    }

    #[tokio::test]
    async fn test_token_seed_is_stored() {
        let mut state = test_state().await;
        let mut config = (*state.config).clone();
        config.kron_seed = Some(portfolio_core::ProviderToken {
            access_token: "a".to_string(),
            refresh_token: "r".to_string(),
            token_type: None,
        });
        state.config = std::sync::Arc::new(config);

        run_job(&state, JobKind::KronTokenRefresh).await.unwrap();
        let stored = state.db.load_kron_token().await.unwrap().unwrap();
        assert_eq!(stored.refresh_token, "r");
    }
}
