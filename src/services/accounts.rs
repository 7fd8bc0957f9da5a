use std::sync::Arc;

use chrono::Utc;
use serde::Deserialize;
use tracing::{info, warn};
use uuid::Uuid;

use crate::domain::aggregates::{Account, AccountView, Registration};
use crate::error::{ApiResult, AppError};
use crate::store::AccountStore;

#[derive(Clone, Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AddressInput {
    #[serde(default)]
    pub area: String,
    #[serde(default)]
    pub settlement: String,
    #[serde(default)]
    pub details: String,
}

#[derive(Clone, Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RegisterRequest {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub phone: String,
    #[serde(default)]
    pub address: AddressInput,
    #[serde(default)]
    pub is_admin: bool,
    pub password: Option<String>,
}

impl From<RegisterRequest> for Registration {
    fn from(r: RegisterRequest) -> Self {
        Registration {
            name: r.name,
            phone: r.phone,
            area: r.address.area,
            settlement: r.address.settlement,
            details: r.address.details,
            is_admin: r.is_admin,
            password: r.password,
        }
    }
}

#[derive(Clone)]
pub struct AccountService {
    store: Arc<dyn AccountStore>,
}

impl AccountService {
    pub fn new(store: Arc<dyn AccountStore>) -> Self { Self { store } }

    pub async fn register(&self, request: RegisterRequest) -> ApiResult<AccountView> {
        let account = Account::register(request.into(), Utc::now())?;
        if self.store.find_by_phone(&account.profile().phone).await?.is_some() {
            warn!(phone = %account.profile().phone, "phone already registered");
            return Err(AppError::BadRequest("an account with this phone number already exists".into()));
        }
        self.store.insert(&account).await?;
        info!(account_id = %account.id(), admin = account.is_admin(), "account registered");
        Ok(account.view())
    }

    pub async fn find(&self, id: Uuid) -> ApiResult<Option<Account>> {
        Ok(self.store.find_by_id(id).await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryStore;

    fn request(phone: &str) -> RegisterRequest {
        RegisterRequest {
            name: "Noa".into(),
            phone: phone.into(),
            address: AddressInput { area: "חיפה".into(), settlement: "Haifa".into(), details: "Carmel 7".into() },
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn test_register_normalizes_and_rejects_duplicates() {
        let service = AccountService::new(Arc::new(MemoryStore::new()));
        let view = service.register(request("050-123-4567")).await.unwrap();
        assert_eq!(view.phone.as_str(), "0501234567");
        assert!(!view.is_admin);
        assert!(service.find(view.id).await.unwrap().is_some());

        let err = service.register(request("0501234567")).await.unwrap_err();
        assert!(matches!(err, AppError::BadRequest(m) if m.contains("already exists")));
    }

    #[tokio::test]
    async fn test_admin_needs_long_enough_password() {
        let service = AccountService::new(Arc::new(MemoryStore::new()));
        let mut admin = request("0529999999");
        admin.is_admin = true;
        admin.password = Some("12345".into());
        assert!(matches!(service.register(admin.clone()).await, Err(AppError::BadRequest(_))));
        admin.password = Some("123456".into());
        let view = service.register(admin).await.unwrap();
        assert!(view.is_admin);
        let stored = service.find(view.id).await.unwrap().unwrap();
        assert!(stored.credential().is_some());
    }

    #[tokio::test]
    async fn test_bad_region_and_phone() {
        let service = AccountService::new(Arc::new(MemoryStore::new()));
        let mut bad_area = request("0521111111");
        bad_area.address.area = "Mars".into();
        assert!(matches!(service.register(bad_area).await, Err(AppError::BadRequest(_))));
        assert!(matches!(service.register(request("0721111111")).await, Err(AppError::BadRequest(_))));
    }
}
