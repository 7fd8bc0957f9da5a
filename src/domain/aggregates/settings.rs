//! Global settings singleton and the completion-date policy.

use chrono::{DateTime, Duration, Local, NaiveDate, NaiveDateTime, NaiveTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};

/// Key of the one settings record.
pub const GLOBAL_SETTINGS_KEY: &str = "globalSettings";

/// Days between "now" and the completion date used before an admin sets one.
pub const FALLBACK_COMPLETION_DAYS: i64 = 3;
/// Local hour of day the fallback completion date lands on.
pub const FALLBACK_COMPLETION_HOUR: u32 = 17;

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GlobalSettings {
    pub default_completion_date: DateTime<Utc>,
}

/// Completion date used while no admin value is stored: three calendar days
/// after `now` in `now`'s time zone, at 17:00 local time.
pub fn fallback_completion_date<Tz: TimeZone>(now: &DateTime<Tz>) -> DateTime<Utc> {
    let day = now.date_naive() + Duration::days(FALLBACK_COMPLETION_DAYS);
    let at = day.and_time(NaiveTime::from_hms_opt(FALLBACK_COMPLETION_HOUR, 0, 0).unwrap_or_default());
    now.timezone()
        .from_local_datetime(&at)
        .earliest()
        .map(|t| t.with_timezone(&Utc))
        .unwrap_or_else(|| Utc.from_utc_datetime(&at))
}

/// Parses a date the way the admin UI sends them: an RFC 3339 timestamp, a
/// local `YYYY-MM-DDTHH:MM[:SS]`, or a bare `YYYY-MM-DD` (midnight UTC).
pub fn parse_date(raw: &str) -> Option<DateTime<Utc>> {
    let raw = raw.trim();
    if let Ok(t) = DateTime::parse_from_rfc3339(raw) {
        return Some(t.with_timezone(&Utc));
    }
    for format in ["%Y-%m-%dT%H:%M:%S", "%Y-%m-%dT%H:%M"] {
        if let Ok(naive) = NaiveDateTime::parse_from_str(raw, format) {
            return Local.from_local_datetime(&naive).earliest().map(|t| t.with_timezone(&Utc));
        }
    }
    NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .map(|naive| Utc.from_utc_datetime(&naive))
}

/// Validates a new default completion date: it must parse and lie strictly after `now`.
pub fn parse_completion_date(raw: &str, now: DateTime<Utc>) -> Result<DateTime<Utc>, SettingsError> {
    let date = parse_date(raw).ok_or_else(|| SettingsError::InvalidDate(raw.to_string()))?;
    if date <= now { return Err(SettingsError::NotInFuture(date)); }
    Ok(date)
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SettingsError {
    #[error("'{0}' is not a valid date")]
    InvalidDate(String),
    #[error("the completion date must be in the future (got {0})")]
    NotInFuture(DateTime<Utc>),
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::FixedOffset;

    #[test]
    fn test_fallback_is_three_days_at_five_pm_local() {
        let israel = FixedOffset::east_opt(3 * 3600).unwrap();
        let now = israel.with_ymd_and_hms(2025, 3, 30, 22, 45, 10).unwrap();
        let fallback = fallback_completion_date(&now);
        assert_eq!(fallback.with_timezone(&israel), israel.with_ymd_and_hms(2025, 4, 2, 17, 0, 0).unwrap());
        assert_eq!(fallback, Utc.with_ymd_and_hms(2025, 4, 2, 14, 0, 0).unwrap());
    }

    #[test]
    fn test_fallback_uses_local_calendar_day() {
        // 23:30 UTC on the 1st is already the 2nd in UTC+3
        let now = Utc.with_ymd_and_hms(2025, 1, 1, 23, 30, 0).unwrap();
        let israel = FixedOffset::east_opt(3 * 3600).unwrap();
        let fallback = fallback_completion_date(&now.with_timezone(&israel));
        assert_eq!(fallback.with_timezone(&israel).date_naive(), NaiveDate::from_ymd_opt(2025, 1, 5).unwrap());
    }

    #[test]
    fn test_parse_date_formats() {
        assert_eq!(parse_date("2030-05-01"), Some(Utc.with_ymd_and_hms(2030, 5, 1, 0, 0, 0).unwrap()));
        assert_eq!(parse_date("2030-05-01T10:00:00+03:00"), Some(Utc.with_ymd_and_hms(2030, 5, 1, 7, 0, 0).unwrap()));
        assert!(parse_date("2030-05-01T10:00").is_some());
        assert_eq!(parse_date("next tuesday"), None);
        assert_eq!(parse_date("2030-02-30"), None);
    }

    #[test]
    fn test_completion_date_must_be_future() {
        let now = Utc.with_ymd_and_hms(2030, 5, 1, 12, 0, 0).unwrap();
        assert!(matches!(parse_completion_date("2030-05-01", now), Err(SettingsError::NotInFuture(_))));
        assert!(matches!(parse_completion_date("garbage", now), Err(SettingsError::InvalidDate(_))));
        assert_eq!(parse_completion_date("2030-05-02", now).unwrap(), Utc.with_ymd_and_hms(2030, 5, 2, 0, 0, 0).unwrap());
    }
}
