use chrono::{DateTime, Duration, Utc};
use portfolio_core::AccessInfo;

/// Access keys issued by Kron are valid for a fixed number of days after
/// they were last edited. A warning is due some days before that.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AccessKeyExpiry {
    pub warn_after_days: i64,
    pub ttl_days: i64,
}

impl Default for AccessKeyExpiry {
    fn default() -> Self {
        Self {
            warn_after_days: 80,
            ttl_days: 90,
        }
    }
}

impl AccessKeyExpiry {
    pub fn new(warn_after_days: i64, ttl_days: i64) -> Self {
        Self {
            warn_after_days,
            ttl_days,
        }
    }

    pub fn expires_at(&self, last_edited: DateTime<Utc>) -> DateTime<Utc> {
        last_edited + Duration::days(self.ttl_days)
    }

    /// Returns the expiry time when a warning is due at `now`.
    pub fn warning_due(&self, info: &AccessInfo, now: DateTime<Utc>) -> Option<DateTime<Utc>> {
        let last_edited = info.last_edited?;
        if now >= last_edited + Duration::days(self.warn_after_days) {
            Some(self.expires_at(last_edited))
        } else {
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn edited(at: DateTime<Utc>) -> AccessInfo {
        AccessInfo {
            account_key: Some("acc".to_string()),
            last_edited: Some(at),
            ..Default::default()
        }
    }

    #[test]
    fn test_no_warning_before_threshold() {
        let edited_at = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        let policy = AccessKeyExpiry::default();
        let now = edited_at + Duration::days(79);
        assert_eq!(policy.warning_due(&edited(edited_at), now), None);
    }

    #[test]
    fn test_warning_on_threshold_day() {
        let edited_at = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        let policy = AccessKeyExpiry::default();
        let now = edited_at + Duration::days(80);
        assert_eq!(
            policy.warning_due(&edited(edited_at), now),
            Some(edited_at + Duration::days(90))
        );
    }

    #[test]
    fn test_unknown_edit_time_never_warns() {
        let info = AccessInfo::token_pair("acc", None);
        assert_eq!(AccessKeyExpiry::default().warning_due(&info, Utc::now()), None);
    }
}
