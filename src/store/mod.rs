//! Persistence seams. Each store is a trait so services can run against
//! Postgres in production and the in-memory backend in tests and local runs.

use std::{cmp::Ordering, sync::Arc};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::domain::aggregates::{Account, GlobalSettings, Order, OrderStatus, Product};
use crate::domain::value_objects::{PhoneNumber, Region};

pub mod memory;
pub mod postgres;

pub use memory::MemoryStore;
pub use postgres::PgStore;

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
    #[error("{0} already exists")]
    Conflict(String),
    #[error("corrupt record: {0}")]
    Corrupt(String),
}

pub type StoreResult<T> = std::result::Result<T, StoreError>;

/// Inclusive date interval; a missing bound is unbounded.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct DateRange {
    pub start: Option<DateTime<Utc>>,
    pub end: Option<DateTime<Utc>>,
}

impl DateRange {
    pub fn contains(&self, at: DateTime<Utc>) -> bool {
        self.start.map_or(true, |s| at >= s) && self.end.map_or(true, |e| at <= e)
    }
}

/// Order filter after manufacturer and address filters were resolved to id sets.
/// All present conditions must hold.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct OrderQuery {
    pub status: Option<OrderStatus>,
    pub order_date: DateRange,
    pub completion_date: DateRange,
    /// Orders containing at least one of these products.
    pub product_ids: Option<Vec<Uuid>>,
    /// Orders placed by one of these accounts.
    pub user_ids: Option<Vec<Uuid>>,
}

impl OrderQuery {
    pub fn matches(&self, order: &Order) -> bool {
        self.status.map_or(true, |s| s == order.status)
            && self.order_date.contains(order.order_date)
            && self.completion_date.contains(order.completion_date)
            && self.product_ids.as_ref().map_or(true, |ids| order.products.iter().any(|l| ids.contains(&l.product_id)))
            && self.user_ids.as_ref().map_or(true, |ids| ids.contains(&order.user_id))
    }
}

/// Sortable order fields exposed to the admin list.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SortKey {
    OrderDate,
    CompletionDate,
    UserName,
    TotalPrice,
    Status,
}

impl SortKey {
    /// Maps a wire name to a key; anything outside the allow-list is `None`.
    pub fn parse(raw: &str) -> Option<Self> {
        match raw {
            "orderDate" => Some(Self::OrderDate),
            "completionDate" => Some(Self::CompletionDate),
            "userName" => Some(Self::UserName),
            "totalPrice" => Some(Self::TotalPrice),
            "status" => Some(Self::Status),
            _ => None,
        }
    }

    pub fn column(self) -> &'static str {
        match self {
            Self::OrderDate => "order_date",
            Self::CompletionDate => "completion_date",
            Self::UserName => "user_name",
            Self::TotalPrice => "total_price",
            Self::Status => "status",
        }
    }

    pub fn compare(self, a: &Order, b: &Order) -> Ordering {
        match self {
            Self::OrderDate => a.order_date.cmp(&b.order_date),
            Self::CompletionDate => a.completion_date.cmp(&b.completion_date),
            Self::UserName => a.user_name.cmp(&b.user_name),
            Self::TotalPrice => a.total_price.cmp(&b.total_price),
            Self::Status => a.status.as_str().cmp(b.status.as_str()),
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct OrderSort {
    pub key: SortKey,
    pub descending: bool,
}

impl Default for OrderSort {
    fn default() -> Self { Self { key: SortKey::OrderDate, descending: true } }
}

impl OrderSort {
    /// Total order: ties on the key fall back to the id so pages never overlap.
    pub fn compare(&self, a: &Order, b: &Order) -> Ordering {
        let ord = self.key.compare(a, b).then_with(|| a.id.cmp(&b.id));
        if self.descending { ord.reverse() } else { ord }
    }
}

#[async_trait]
pub trait CatalogStore: Send + Sync {
    async fn find_by_id(&self, id: Uuid) -> StoreResult<Option<Product>>;
    async fn find_by_ids(&self, ids: &[Uuid]) -> StoreResult<Vec<Product>>;
    /// Products sorted by name.
    async fn list(&self, specials_only: bool) -> StoreResult<Vec<Product>>;
    /// Distinct non-empty manufacturer names, unsorted.
    async fn manufacturers(&self) -> StoreResult<Vec<String>>;
    /// Products whose manufacturer contains `needle`, ignoring case.
    async fn ids_by_manufacturer(&self, needle: &str) -> StoreResult<Vec<Uuid>>;
    async fn insert(&self, product: &Product) -> StoreResult<()>;
    async fn update(&self, product: &Product) -> StoreResult<bool>;
    async fn delete(&self, id: Uuid) -> StoreResult<bool>;
}

#[async_trait]
pub trait AccountStore: Send + Sync {
    async fn find_by_id(&self, id: Uuid) -> StoreResult<Option<Account>>;
    async fn find_by_phone(&self, phone: &PhoneNumber) -> StoreResult<Option<Account>>;
    /// Accounts in `area` whose settlement contains `settlement`, ignoring case.
    async fn ids_by_address(&self, area: Option<Region>, settlement: Option<&str>) -> StoreResult<Vec<Uuid>>;
    /// Fails with [`StoreError::Conflict`] when the phone number is taken.
    async fn insert(&self, account: &Account) -> StoreResult<()>;
}

#[async_trait]
pub trait SettingsStore: Send + Sync {
    async fn load(&self) -> StoreResult<Option<GlobalSettings>>;
    /// Creates the settings record if it does not exist yet.
    async fn save_completion_date(&self, date: DateTime<Utc>) -> StoreResult<GlobalSettings>;
}

/// Orders are written as whole documents. `save` replaces the stored record
/// without a version check, so the last concurrent writer wins.
#[async_trait]
pub trait OrderStore: Send + Sync {
    async fn insert(&self, order: &Order) -> StoreResult<()>;
    async fn save(&self, order: &Order) -> StoreResult<()>;
    async fn find_by_id(&self, id: Uuid) -> StoreResult<Option<Order>>;
    async fn find_for_user(&self, id: Uuid, user_id: Uuid) -> StoreResult<Option<Order>>;
    /// Newest first.
    async fn list_for_user(&self, user_id: Uuid) -> StoreResult<Vec<Order>>;
    async fn find(&self, query: &OrderQuery, sort: OrderSort) -> StoreResult<Vec<Order>>;
    /// One page of matches plus the total match count.
    async fn page(&self, query: &OrderQuery, sort: OrderSort, offset: u64, limit: u64) -> StoreResult<(Vec<Order>, u64)>;
}

/// Resolves a bearer token to the account it was issued for. Tokens are issued
/// elsewhere; this side only checks them.
#[async_trait]
pub trait CredentialVerifier: Send + Sync {
    async fn verify(&self, token: &str) -> StoreResult<Option<Uuid>>;
}

/// The four stores the services need, usually all backed by one value.
#[derive(Clone)]
pub struct Stores {
    pub catalog: Arc<dyn CatalogStore>,
    pub accounts: Arc<dyn AccountStore>,
    pub settings: Arc<dyn SettingsStore>,
    pub orders: Arc<dyn OrderStore>,
}

impl Stores {
    pub fn shared<S>(store: Arc<S>) -> Self
    where
        S: CatalogStore + AccountStore + SettingsStore + OrderStore + 'static,
    {
        Self { catalog: store.clone(), accounts: store.clone(), settings: store.clone(), orders: store }
    }
}
