use anyhow::{anyhow, Context, Result};
use barebitcoin_client::LimitLadder;
use chrono_tz::Tz;
use cron::Schedule;
use kron_client::AccessKeyExpiry;
use notification_service::NotificationConfig;
use portfolio_core::{AccountId, ProviderToken};
use rust_decimal::Decimal;
use std::collections::HashMap;
use std::str::FromStr;

use crate::jobs::JobKind;

/// A job together with the schedule it fires on.
#[derive(Debug, Clone)]
pub struct ScheduledJob {
    pub kind: JobKind,
    pub schedule: Schedule,
}

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub database_url: String,
    pub bind_addr: String,
    pub timezone: Tz,
    pub schedules: Vec<ScheduledJob>,
    pub run_jobs_on_startup: bool,
    pub limit_order_account_id: Option<AccountId>,
    pub ladder: LimitLadder,
    /// Prices for instruments without a public quote, keyed by ticker.
    pub fixed_prices: HashMap<String, Decimal>,
    pub kron_seed: Option<ProviderToken>,
    pub access_key_expiry: AccessKeyExpiry,
    pub notifications: NotificationConfig,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            database_url: "sqlite:portfolio.db".to_string(),
            bind_addr: "0.0.0.0:3000".to_string(),
            timezone: chrono_tz::Europe::Oslo,
            schedules: Vec::new(),
            run_jobs_on_startup: false,
            limit_order_account_id: None,
            ladder: LimitLadder::default(),
            fixed_prices: HashMap::new(),
            kron_seed: None,
            access_key_expiry: AccessKeyExpiry::default(),
            notifications: NotificationConfig::default(),
        }
    }
}

/// Accepts both five-field expressions and the seconds-first form.
pub fn parse_cron(expr: &str) -> Result<Schedule> {
    let expr = expr.trim();
    let normalized = if expr.split_whitespace().count() == 5 {
        format!("0 {}", expr)
    } else {
        expr.to_string()
    };
    Schedule::from_str(&normalized).map_err(|e| anyhow!("Invalid cron expression '{}': {}", expr, e))
}

/// `TICKER=price,TICKER=price`.
pub fn parse_fixed_prices(raw: &str) -> Result<HashMap<String, Decimal>> {
    let mut prices = HashMap::new();
    for entry in raw.split(',').map(str::trim).filter(|e| !e.is_empty()) {
        let (ticker, price) = entry
            .split_once('=')
            .with_context(|| format!("Fixed price '{}' is not TICKER=price", entry))?;
        let price = Decimal::from_str(price.trim())
            .with_context(|| format!("Invalid fixed price for {}", ticker.trim()))?;
        prices.insert(ticker.trim().to_ascii_uppercase(), price);
    }
    Ok(prices)
}

fn parse_var<T: FromStr>(get: &impl Fn(&str) -> Option<String>, key: &str, default: T) -> Result<T>
where
    T::Err: std::fmt::Display,
{
    match get(key) {
        Some(raw) => raw
            .trim()
            .parse()
            .map_err(|e| anyhow!("Invalid {}: {}", key, e)),
        None => Ok(default),
    }
}

impl AppConfig {
    /// Load `.env`-backed configuration from the process environment.
    pub fn from_env() -> Result<Self> {
        let mut config = Self::from_vars(|key| std::env::var(key).ok())?;
        config.notifications = NotificationConfig::from_env();
        Ok(config)
    }

    /// Build from a variable lookup. Blank values count as unset.
    pub fn from_vars(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());
        let defaults = Self::default();

        let timezone = match get("SCHEDULE_TIMEZONE") {
            Some(name) => name
                .parse::<Tz>()
                .map_err(|e| anyhow!("Invalid SCHEDULE_TIMEZONE: {}", e))?,
            None => defaults.timezone,
        };

        let mut schedules = Vec::new();
        for kind in JobKind::ALL {
            if let Some(expr) = get(kind.env_key()) {
                let schedule =
                    parse_cron(&expr).with_context(|| format!("{} is invalid", kind.env_key()))?;
                schedules.push(ScheduledJob { kind, schedule });
            }
        }

        let limit_order_account_id = get("LIMIT_ORDER_ACCOUNT_ID")
            .map(|id| id.trim().parse::<AccountId>())
            .transpose()
            .map_err(|e| anyhow!("Invalid LIMIT_ORDER_ACCOUNT_ID: {}", e))?;

        let ladder = LimitLadder {
            count: parse_var(&get, "LIMIT_ORDER_COUNT", defaults.ladder.count)?,
            amount: parse_var(&get, "LIMIT_ORDER_AMOUNT", defaults.ladder.amount)?,
            step_percent: parse_var(&get, "LIMIT_ORDER_STEP_PERCENT", defaults.ladder.step_percent)?,
        };

        let fixed_prices = match get("FIXED_PRICES") {
            Some(raw) => parse_fixed_prices(&raw)?,
            None => HashMap::new(),
        };

        let kron_seed = match (get("KRON_REFRESH_TOKEN"), get("KRON_ACCESS_TOKEN")) {
            (Some(refresh_token), Some(access_token)) => Some(ProviderToken {
                access_token,
                refresh_token,
                token_type: None,
            }),
            _ => None,
        };

        let access_key_expiry = AccessKeyExpiry::new(
            parse_var(&get, "ACCESS_KEY_WARN_DAYS", defaults.access_key_expiry.warn_after_days)?,
            parse_var(&get, "ACCESS_KEY_TTL_DAYS", defaults.access_key_expiry.ttl_days)?,
        );
        if access_key_expiry.warn_after_days > access_key_expiry.ttl_days {
            return Err(anyhow!("ACCESS_KEY_WARN_DAYS must not exceed ACCESS_KEY_TTL_DAYS"));
        }

        Ok(Self {
            database_url: get("DATABASE_URL").unwrap_or(defaults.database_url),
            bind_addr: get("BIND_ADDR").unwrap_or(defaults.bind_addr),
            timezone,
            schedules,
            run_jobs_on_startup: parse_var(&get, "RUN_JOBS_ON_STARTUP", false)?,
            limit_order_account_id,
            ladder,
            fixed_prices,
            kron_seed,
            access_key_expiry,
            notifications: defaults.notifications,
        })
    }
}
