//! Get-or-default access to the global settings record. Every reader of the
//! default completion date goes through here so the fallback lives in one place.

use std::sync::Arc;

use chrono::{DateTime, Local, Utc};

use crate::domain::aggregates::settings::{fallback_completion_date, parse_completion_date};
use crate::domain::aggregates::GlobalSettings;
use crate::error::ApiResult;
use crate::store::SettingsStore;

#[derive(Clone)]
pub struct SettingsService {
    store: Arc<dyn SettingsStore>,
}

impl SettingsService {
    pub fn new(store: Arc<dyn SettingsStore>) -> Self { Self { store } }

    /// The stored default, or three days from now at 17:00 local time when
    /// no admin has set one.
    pub async fn default_completion_date(&self) -> ApiResult<DateTime<Utc>> {
        Ok(match self.store.load().await? {
            Some(settings) => settings.default_completion_date,
            None => fallback_completion_date(&Local::now()),
        })
    }

    #[tracing::instrument(skip(self))]
    pub async fn set_default_completion_date(&self, raw: &str) -> ApiResult<GlobalSettings> {
        let date = parse_completion_date(raw, Utc::now()).map_err(|e| {
            tracing::warn!(error = %e, "completion date rejected");
            e
        })?;
        let saved = self.store.save_completion_date(date).await?;
        tracing::info!(date = %saved.default_completion_date, "default completion date updated");
        Ok(saved)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::AppError;
    use crate::store::MemoryStore;
    use chrono::{Duration, Timelike};

    #[tokio::test]
    async fn test_fallback_before_first_write() {
        let service = SettingsService::new(Arc::new(MemoryStore::new()));
        let date = service.default_completion_date().await.unwrap().with_timezone(&Local);
        assert_eq!((date.hour(), date.minute(), date.second()), (17, 0, 0));
        assert_eq!(date.date_naive(), Local::now().date_naive() + Duration::days(3));
    }

    #[tokio::test]
    async fn test_write_then_read_returns_stored_value() {
        let service = SettingsService::new(Arc::new(MemoryStore::new()));
        let saved = service.set_default_completion_date("2099-06-01T09:30:00Z").await.unwrap();
        assert_eq!(service.default_completion_date().await.unwrap(), saved.default_completion_date);
        assert_eq!(saved.default_completion_date.to_rfc3339(), "2099-06-01T09:30:00+00:00");
    }

    #[tokio::test]
    async fn test_past_and_garbage_dates_rejected() {
        let service = SettingsService::new(Arc::new(MemoryStore::new()));
        assert!(matches!(service.set_default_completion_date("2001-01-01").await, Err(AppError::BadRequest(_))));
        assert!(matches!(service.set_default_completion_date("soon").await, Err(AppError::BadRequest(_))));
        assert!(service.store.load().await.unwrap().is_none());
    }
}
