//! Admin reporting: filtered and paginated order lists, per-product summaries
//! and the rows behind the CSV export.

use std::{collections::HashMap, sync::Arc};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::domain::aggregates::settings::parse_date;
use crate::domain::aggregates::{Order, OrderStatus};
use crate::domain::value_objects::Region;
use crate::error::{ApiResult, AppError};
use crate::store::{
    AccountStore, CatalogStore, DateRange, OrderQuery, OrderSort, OrderStore, SortKey,
};

pub const MAX_PAGE_SIZE: u64 = 100;

/// Query-string filters shared by the admin list, summary and export.
#[derive(Clone, Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderFilterParams {
    pub status: Option<String>,
    pub order_date_start: Option<String>,
    pub order_date_end: Option<String>,
    pub completion_date_start: Option<String>,
    pub completion_date_end: Option<String>,
    pub manufacturer: Option<String>,
    pub user_area: Option<String>,
    pub user_settlement: Option<String>,
    pub sort_by: Option<String>,
    pub sort_order: Option<String>,
    pub page: Option<String>,
    pub limit: Option<String>,
}

impl OrderFilterParams {
    fn sort(&self) -> OrderSort {
        match self.sort_by.as_deref().and_then(SortKey::parse) {
            Some(key) => OrderSort { key, descending: self.sort_order.as_deref() != Some("asc") },
            None => OrderSort::default(),
        }
    }

    fn date_ranges(&self) -> ApiResult<(DateRange, DateRange)> {
        let order_date = DateRange {
            start: date_bound("orderDateStart", &self.order_date_start)?,
            end: date_bound("orderDateEnd", &self.order_date_end)?,
        };
        let completion_date = DateRange {
            start: date_bound("completionDateStart", &self.completion_date_start)?,
            end: date_bound("completionDateEnd", &self.completion_date_end)?,
        };
        Ok((order_date, completion_date))
    }
}

fn non_empty(raw: &Option<String>) -> Option<&str> {
    raw.as_deref().map(str::trim).filter(|s| !s.is_empty())
}

fn date_bound(name: &str, raw: &Option<String>) -> ApiResult<Option<DateTime<Utc>>> {
    match non_empty(raw) {
        None => Ok(None),
        Some(value) => parse_date(value).map(Some).ok_or_else(|| {
            AppError::BadRequest(format!("invalid date for {name}: '{value}'"))
        }),
    }
}

/// `None` falls back to `default`; an explicitly empty value disables the filter.
fn status_filter(
    raw: &Option<String>,
    default: Option<OrderStatus>,
) -> ApiResult<Option<OrderStatus>> {
    match raw.as_deref().map(str::trim) {
        None => Ok(default),
        Some("") => Ok(None),
        Some(value) => Ok(Some(value.parse()?)),
    }
}

fn positive(raw: &Option<String>) -> Option<u64> {
    non_empty(raw).and_then(|v| v.parse::<u64>().ok()).filter(|v| *v >= 1)
}

#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderPage {
    pub orders: Vec<Order>,
    pub current_page: u64,
    pub total_pages: u64,
    pub total_orders: u64,
}

impl OrderPage {
    fn empty() -> Self { Self { orders: vec![], current_page: 1, total_pages: 0, total_orders: 0 } }
}

#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProductSummary {
    pub product_id: Uuid,
    pub product_name: String,
    pub manufacturer: Option<String>,
    pub total_quantity: u64,
    pub users: Vec<Purchase>,
}

/// One order's share of a product in the summary.
#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Purchase {
    pub order_id: Uuid,
    pub user_id: Uuid,
    pub user_name: String,
    pub user_phone: String,
    pub quantity: u32,
    pub order_date: DateTime<Utc>,
    pub completion_date: DateTime<Utc>,
}

/// Groups line items by product. Names and manufacturers come from the line
/// snapshots, so products deleted from the catalog still show up. The
/// manufacturer filter matches the snapshot, ignoring case.
pub fn summarize(orders: &[Order], manufacturer: Option<&str>) -> Vec<ProductSummary> {
    let needle = manufacturer.map(str::to_lowercase);
    let mut groups: HashMap<Uuid, ProductSummary> = HashMap::new();
    for order in orders {
        for line in order.products() {
            if let Some(needle) = &needle {
                let matches = line
                    .manufacturer
                    .as_deref()
                    .is_some_and(|m| m.to_lowercase().contains(needle.as_str()));
                if !matches {
                    continue;
                }
            }
            let entry = groups.entry(line.product_id).or_insert_with(|| ProductSummary {
                product_id: line.product_id,
                product_name: line.name.clone(),
                manufacturer: line.manufacturer.clone(),
                total_quantity: 0,
                users: vec![],
            });
            entry.total_quantity += u64::from(line.quantity);
            entry.users.push(Purchase {
                order_id: order.id(),
                user_id: order.user_id(),
                user_name: order.user_name().to_string(),
                user_phone: order.user_phone().to_string(),
                quantity: line.quantity,
                order_date: order.order_date(),
                completion_date: order.completion_date(),
            });
        }
    }
    let mut summary: Vec<ProductSummary> = groups.into_values().collect();
    summary.sort_by(|a, b| {
        a.product_name
            .cmp(&b.product_name)
            .then_with(|| a.product_id.cmp(&b.product_id))
    });
    summary
}

#[derive(Clone)]
pub struct ReportingService {
    catalog: Arc<dyn CatalogStore>,
    accounts: Arc<dyn AccountStore>,
    orders: Arc<dyn OrderStore>,
    page_size: u64,
}

impl ReportingService {
    pub fn new(
        catalog: Arc<dyn CatalogStore>,
        accounts: Arc<dyn AccountStore>,
        orders: Arc<dyn OrderStore>,
        page_size: u64,
    ) -> Self {
        Self { catalog, accounts, orders, page_size }
    }

    /// Turns the request filters into an order query. `None` means a
    /// manufacturer or address filter matched nothing, so no order can match.
    async fn resolve(&self, params: &OrderFilterParams) -> ApiResult<Option<OrderQuery>> {
        let status = status_filter(&params.status, None)?;
        let (order_date, completion_date) = params.date_ranges()?;

        let product_ids = match non_empty(&params.manufacturer) {
            Some(needle) => {
                let ids = self.catalog.ids_by_manufacturer(needle).await?;
                if ids.is_empty() {
                    tracing::debug!(manufacturer = needle, "no products for manufacturer");
                    return Ok(None);
                }
                Some(ids)
            }
            None => None,
        };

        let area = non_empty(&params.user_area);
        let settlement = non_empty(&params.user_settlement);
        let user_ids = if area.is_some() || settlement.is_some() {
            let region = match area.map(str::parse::<Region>) {
                Some(Err(_)) => return Ok(None),
                Some(Ok(region)) => Some(region),
                None => None,
            };
            let ids = self.accounts.ids_by_address(region, settlement).await?;
            if ids.is_empty() {
                return Ok(None);
            }
            Some(ids)
        } else {
            None
        };

        Ok(Some(OrderQuery { status, order_date, completion_date, product_ids, user_ids }))
    }

    pub async fn list(&self, params: &OrderFilterParams) -> ApiResult<OrderPage> {
        let Some(query) = self.resolve(params).await? else {
            return Ok(OrderPage::empty());
        };
        let page = positive(&params.page).unwrap_or(1);
        let limit = positive(&params.limit).unwrap_or(self.page_size).min(MAX_PAGE_SIZE);
        let offset = (page - 1).saturating_mul(limit);

        let (orders, total) = self.orders.page(&query, params.sort(), offset, limit).await?;
        Ok(OrderPage {
            orders,
            current_page: page,
            total_pages: total.div_ceil(limit),
            total_orders: total,
        })
    }

    /// Per-product totals. Without an explicit `status` only confirmed orders count.
    pub async fn summary_by_product(
        &self,
        params: &OrderFilterParams,
    ) -> ApiResult<Vec<ProductSummary>> {
        let status = status_filter(&params.status, Some(OrderStatus::Confirmed))?;
        let (order_date, completion_date) = params.date_ranges()?;
        let query = OrderQuery { status, order_date, completion_date, ..Default::default() };
        let sort = OrderSort { key: SortKey::OrderDate, descending: false };
        let orders = self.orders.find(&query, sort).await?;
        Ok(summarize(&orders, non_empty(&params.manufacturer)))
    }

    /// Every match, newest first. No matches is a not-found.
    pub async fn export_rows(&self, params: &OrderFilterParams) -> ApiResult<Vec<Order>> {
        let not_found =
            || AppError::NotFound("no orders found matching the criteria for export".into());
        let query = self.resolve(params).await?.ok_or_else(not_found)?;
        let orders = self.orders.find(&query, OrderSort::default()).await?;
        if orders.is_empty() {
            return Err(not_found());
        }
        Ok(orders)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::aggregates::{Account, LineItem, NewProduct, OrderCustomer, Product, Registration};
    use crate::store::MemoryStore;
    use rust_decimal_macros::dec;

    fn line(product: &Product, quantity: u32) -> LineItem {
        LineItem {
            product_id: product.id, name: product.name.clone(), quantity, price_at_order: product.price_per_unit,
            selected_serving_option: None, manufacturer: product.manufacturer.clone(), packet_count: None,
        }
    }

    fn product(name: &str, manufacturer: &str) -> Product {
        Product::create(NewProduct {
            name: name.into(), price_per_unit: dec!(5), manufacturer: Some(manufacturer.into()), ..Default::default()
        }, Utc::now()).unwrap()
    }

    fn account(name: &str, phone: &str, area: &str, settlement: &str) -> Account {
        Account::register(Registration {
            name: name.into(), phone: phone.into(), area: area.into(), settlement: settlement.into(),
            details: "1".into(), ..Default::default()
        }, Utc::now()).unwrap()
    }

    fn order(account: &Account, lines: Vec<LineItem>) -> Order {
        let p = account.profile();
        let customer = OrderCustomer { id: p.id, name: p.name.clone(), phone: p.phone.to_string() };
        Order::place(customer, "somewhere", lines, Utc::now(), None, Utc::now()).unwrap()
    }

    struct Fixture {
        service: ReportingService,
        milk: Product,
        bread: Product,
    }

    async fn fixture() -> Fixture {
        let store = Arc::new(MemoryStore::new());
        let milk = product("Milk", "Tnuva");
        let bread = product("Bread", "Angel");
        for p in [&milk, &bread] {
            CatalogStore::insert(store.as_ref(), p).await.unwrap();
        }
        let dana = account("Dana", "0525551234", "ערבה", "Yotvata");
        let avi = account("Avi", "0541112222", "מרכז", "Tel Aviv");
        for a in [&dana, &avi] {
            AccountStore::insert(store.as_ref(), a).await.unwrap();
        }
        let mut orders = vec![
            order(&dana, vec![line(&milk, 2), line(&bread, 1)]),
            order(&dana, vec![line(&bread, 3)]),
            order(&avi, vec![line(&milk, 4)]),
        ];
        orders[2].set_status(OrderStatus::Delivered, Utc::now()).unwrap();
        for o in &orders {
            OrderStore::insert(store.as_ref(), o).await.unwrap();
        }
        let service = ReportingService::new(store.clone(), store.clone(), store, 15);
        Fixture { service, milk, bread }
    }

    fn params() -> OrderFilterParams { OrderFilterParams::default() }

    #[tokio::test]
    async fn test_unknown_manufacturer_short_circuits() {
        let f = fixture().await;
        let page = f.service.list(&OrderFilterParams { manufacturer: Some("Nobody".into()), ..params() }).await.unwrap();
        assert_eq!(page, OrderPage { orders: vec![], current_page: 1, total_pages: 0, total_orders: 0 });
    }

    #[tokio::test]
    async fn test_filters_combine() {
        let f = fixture().await;
        let page = f.service.list(&OrderFilterParams { manufacturer: Some("tnu".into()), ..params() }).await.unwrap();
        assert_eq!(page.total_orders, 2);

        let page = f.service
            .list(&OrderFilterParams { manufacturer: Some("tnu".into()), user_settlement: Some("yotv".into()), ..params() })
            .await
            .unwrap();
        assert_eq!(page.total_orders, 1);

        let page = f.service.list(&OrderFilterParams { user_area: Some("מרכז".into()), ..params() }).await.unwrap();
        assert_eq!(page.total_orders, 1);
        assert_eq!(page.orders[0].user_name(), "Avi");

        let page = f.service.list(&OrderFilterParams { user_area: Some("Atlantis".into()), ..params() }).await.unwrap();
        assert_eq!(page.total_orders, 0);
    }

    #[tokio::test]
    async fn test_pagination_and_sort() {
        let f = fixture().await;
        let page = f.service
            .list(&OrderFilterParams {
                sort_by: Some("totalPrice".into()), sort_order: Some("asc".into()),
                page: Some("2".into()), limit: Some("2".into()), ..params()
            })
            .await
            .unwrap();
        assert_eq!((page.current_page, page.total_pages, page.total_orders), (2, 2, 3));
        assert_eq!(page.orders.len(), 1);
        assert_eq!(page.orders[0].total_price(), dec!(20));

        // unknown sort key falls back to newest first
        let page = f.service.list(&OrderFilterParams { sort_by: Some("password".into()), ..params() }).await.unwrap();
        assert!(page.orders.windows(2).all(|w| w[0].order_date() >= w[1].order_date()));
    }

    #[tokio::test]
    async fn test_bad_status_or_date_is_rejected() {
        let f = fixture().await;
        let bad_status = f.service.list(&OrderFilterParams { status: Some("Shipped".into()), ..params() }).await;
        assert!(matches!(bad_status, Err(AppError::BadRequest(_))));
        let bad_date = f.service.list(&OrderFilterParams { order_date_start: Some("yesterday".into()), ..params() }).await;
        assert!(matches!(bad_date, Err(AppError::BadRequest(m)) if m.contains("orderDateStart")));
    }

    #[tokio::test]
    async fn test_summary_defaults_to_confirmed() {
        let f = fixture().await;
        let summary = f.service.summary_by_product(&params()).await.unwrap();
        assert_eq!(summary.iter().map(|s| s.product_name.as_str()).collect::<Vec<_>>(), ["Bread", "Milk"]);
        assert_eq!(summary[0].total_quantity, 4);
        assert_eq!(summary[0].product_id, f.bread.id);
        assert_eq!(summary[1].total_quantity, 2);

        let all = f.service.summary_by_product(&OrderFilterParams { status: Some(String::new()), ..params() }).await.unwrap();
        let milk = all.iter().find(|s| s.product_id == f.milk.id).unwrap();
        assert_eq!(milk.total_quantity, 6);
        assert_eq!(milk.users.len(), 2);

        let angel = f.service.summary_by_product(&OrderFilterParams { manufacturer: Some("ANGEL".into()), ..params() }).await.unwrap();
        assert_eq!(angel.len(), 1);
        assert_eq!(angel[0].users.iter().map(|u| u.quantity).sum::<u32>(), 4);
    }

    #[tokio::test]
    async fn test_summary_keeps_products_deleted_after_ordering() {
        use crate::domain::pricing::ServingOptionPolicy;
        use crate::services::orders::{BasketItem, PlaceOrder};
        use crate::services::{CatalogService, LogPublisher, OrderEngine, SettingsService};

        let store = Arc::new(MemoryStore::new());
        let cheese = product("Cheese", "Gad");
        CatalogStore::insert(store.as_ref(), &cheese).await.unwrap();
        let dana = account("Dana", "0525551234", "ערבה", "Yotvata");
        AccountStore::insert(store.as_ref(), &dana).await.unwrap();

        let engine = OrderEngine::new(
            store.clone(),
            store.clone(),
            SettingsService::new(store.clone()),
            Arc::new(LogPublisher),
            ServingOptionPolicy::Optional,
        );
        let basket = PlaceOrder {
            products: vec![BasketItem { product_id: cheese.id.to_string(), quantity: 3.into(), ..Default::default() }],
            delivery_address: "Yotvata 1".into(),
            note: None,
        };
        let placed = engine.place(&dana, basket).await.unwrap();

        CatalogService::new(store.clone()).delete(&cheese.id.to_string()).await.unwrap();
        assert!(CatalogStore::find_by_id(store.as_ref(), cheese.id).await.unwrap().is_none());

        let service = ReportingService::new(store.clone(), store.clone(), store, 15);
        let summary = service.summary_by_product(&params()).await.unwrap();
        assert_eq!(summary.len(), 1);
        assert_eq!(summary[0].product_id, cheese.id);
        assert_eq!(summary[0].product_name, "Cheese");
        assert_eq!(summary[0].manufacturer.as_deref(), Some("Gad"));
        assert_eq!(summary[0].total_quantity, 3);
        assert_eq!(summary[0].users.len(), 1);
        assert_eq!(summary[0].users[0].order_id, placed.id());
        assert_eq!(summary[0].users[0].quantity, 3);

        let by_maker = service.summary_by_product(&OrderFilterParams { manufacturer: Some("gad".into()), ..params() }).await.unwrap();
        assert_eq!(by_maker.len(), 1);
    }

    #[tokio::test]
    async fn test_export_rows_not_found_when_empty() {
        let f = fixture().await;
        assert_eq!(f.service.export_rows(&params()).await.unwrap().len(), 3);
        let none = f.service.export_rows(&OrderFilterParams { status: Some("Cancelled".into()), ..params() }).await;
        assert!(matches!(none, Err(AppError::NotFound(_))));
    }
}
