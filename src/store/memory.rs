//! In-memory backend used by tests and by local runs without `DATABASE_URL`.

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::RwLock;
use uuid::Uuid;

use super::{AccountStore, CatalogStore, OrderQuery, OrderSort, OrderStore, SettingsStore, StoreError, StoreResult};
use crate::domain::aggregates::{Account, GlobalSettings, Order, Product};
use crate::domain::value_objects::{PhoneNumber, Region};

#[derive(Default)]
pub struct MemoryStore {
    products: RwLock<HashMap<Uuid, Product>>,
    accounts: RwLock<HashMap<Uuid, Account>>,
    orders: RwLock<HashMap<Uuid, Order>>,
    settings: RwLock<Option<GlobalSettings>>,
}

impl MemoryStore {
    pub fn new() -> Self { Self::default() }
}

fn contains_ignore_case(haystack: &str, needle: &str) -> bool {
    haystack.to_lowercase().contains(&needle.to_lowercase())
}

#[async_trait]
impl CatalogStore for MemoryStore {
    async fn find_by_id(&self, id: Uuid) -> StoreResult<Option<Product>> {
        Ok(self.products.read().await.get(&id).cloned())
    }

    async fn find_by_ids(&self, ids: &[Uuid]) -> StoreResult<Vec<Product>> {
        let products = self.products.read().await;
        Ok(products.values().filter(|p| ids.contains(&p.id)).cloned().collect())
    }

    async fn list(&self, specials_only: bool) -> StoreResult<Vec<Product>> {
        let mut list: Vec<Product> = self.products.read().await
            .values()
            .filter(|p| !specials_only || p.is_special_offer)
            .cloned()
            .collect();
        list.sort_by(|a, b| a.name.cmp(&b.name).then_with(|| a.id.cmp(&b.id)));
        Ok(list)
    }

    async fn manufacturers(&self) -> StoreResult<Vec<String>> {
        let mut names: Vec<String> = self.products.read().await
            .values()
            .filter_map(|p| p.manufacturer.clone())
            .filter(|m| !m.is_empty())
            .collect();
        names.sort();
        names.dedup();
        Ok(names)
    }

    async fn ids_by_manufacturer(&self, needle: &str) -> StoreResult<Vec<Uuid>> {
        Ok(self.products.read().await
            .values()
            .filter(|p| p.manufacturer.as_deref().is_some_and(|m| contains_ignore_case(m, needle)))
            .map(|p| p.id)
            .collect())
    }

    async fn insert(&self, product: &Product) -> StoreResult<()> {
        self.products.write().await.insert(product.id, product.clone());
        Ok(())
    }

    async fn update(&self, product: &Product) -> StoreResult<bool> {
        let mut products = self.products.write().await;
        match products.get_mut(&product.id) {
            Some(slot) => { *slot = product.clone(); Ok(true) }
            None => Ok(false),
        }
    }

    async fn delete(&self, id: Uuid) -> StoreResult<bool> {
        Ok(self.products.write().await.remove(&id).is_some())
    }
}

#[async_trait]
impl AccountStore for MemoryStore {
    async fn find_by_id(&self, id: Uuid) -> StoreResult<Option<Account>> {
        Ok(self.accounts.read().await.get(&id).cloned())
    }

    async fn find_by_phone(&self, phone: &PhoneNumber) -> StoreResult<Option<Account>> {
        Ok(self.accounts.read().await.values().find(|a| &a.profile().phone == phone).cloned())
    }

    async fn ids_by_address(&self, area: Option<Region>, settlement: Option<&str>) -> StoreResult<Vec<Uuid>> {
        Ok(self.accounts.read().await
            .values()
            .filter(|a| {
                let address = &a.profile().address;
                area.map_or(true, |r| address.area == r)
                    && settlement.map_or(true, |s| contains_ignore_case(&address.settlement, s))
            })
            .map(Account::id)
            .collect())
    }

    async fn insert(&self, account: &Account) -> StoreResult<()> {
        let mut accounts = self.accounts.write().await;
        if accounts.values().any(|a| a.profile().phone == account.profile().phone) {
            return Err(StoreError::Conflict(format!("account with phone {}", account.profile().phone)));
        }
        accounts.insert(account.id(), account.clone());
        Ok(())
    }
}

#[async_trait]
impl SettingsStore for MemoryStore {
    async fn load(&self) -> StoreResult<Option<GlobalSettings>> {
        Ok(self.settings.read().await.clone())
    }

    async fn save_completion_date(&self, date: DateTime<Utc>) -> StoreResult<GlobalSettings> {
        let settings = GlobalSettings { default_completion_date: date };
        *self.settings.write().await = Some(settings.clone());
        Ok(settings)
    }
}

#[async_trait]
impl OrderStore for MemoryStore {
    async fn insert(&self, order: &Order) -> StoreResult<()> {
        let mut orders = self.orders.write().await;
        if orders.contains_key(&order.id) {
            return Err(StoreError::Conflict(format!("order {}", order.id)));
        }
        let mut stored = order.clone();
        stored.events.clear();
        orders.insert(order.id, stored);
        Ok(())
    }

    async fn save(&self, order: &Order) -> StoreResult<()> {
        let mut stored = order.clone();
        stored.events.clear();
        self.orders.write().await.insert(order.id, stored);
        Ok(())
    }

    async fn find_by_id(&self, id: Uuid) -> StoreResult<Option<Order>> {
        Ok(self.orders.read().await.get(&id).cloned())
    }

    async fn find_for_user(&self, id: Uuid, user_id: Uuid) -> StoreResult<Option<Order>> {
        Ok(self.orders.read().await.get(&id).filter(|o| o.user_id == user_id).cloned())
    }

    async fn list_for_user(&self, user_id: Uuid) -> StoreResult<Vec<Order>> {
        let query = OrderQuery { user_ids: Some(vec![user_id]), ..Default::default() };
        self.find(&query, OrderSort::default()).await
    }

    async fn find(&self, query: &OrderQuery, sort: OrderSort) -> StoreResult<Vec<Order>> {
        let mut matches: Vec<Order> = self.orders.read().await.values().filter(|o| query.matches(o)).cloned().collect();
        matches.sort_by(|a, b| sort.compare(a, b));
        Ok(matches)
    }

    async fn page(&self, query: &OrderQuery, sort: OrderSort, offset: u64, limit: u64) -> StoreResult<(Vec<Order>, u64)> {
        let all = self.find(query, sort).await?;
        let total = all.len() as u64;
        let page = all.into_iter().skip(offset as usize).take(limit as usize).collect();
        Ok((page, total))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::aggregates::{LineItem, NewProduct, OrderCustomer, OrderStatus};
    use crate::store::{DateRange, SortKey};
    use rust_decimal_macros::dec;

    fn order_for(user: Uuid, name: &str, product: Uuid, total: u32) -> Order {
        let line = LineItem {
            product_id: product, name: "Bread".into(), quantity: total, price_at_order: dec!(1),
            selected_serving_option: None, manufacturer: None, packet_count: None,
        };
        let customer = OrderCustomer { id: user, name: name.into(), phone: "0520000000".into() };
        Order::place(customer, "somewhere", vec![line], Utc::now(), None, Utc::now()).unwrap()
    }

    #[tokio::test]
    async fn test_query_conjunction_and_paging() {
        let store = MemoryStore::new();
        let (alice, bob, bread) = (Uuid::new_v4(), Uuid::new_v4(), Uuid::new_v4());
        for (user, name, qty) in [(alice, "Alice", 3), (bob, "Bob", 1), (alice, "Alice", 2)] {
            OrderStore::insert(&store, &order_for(user, name, bread, qty)).await.unwrap();
        }

        let query = OrderQuery { user_ids: Some(vec![alice]), product_ids: Some(vec![bread]), ..Default::default() };
        let sort = OrderSort { key: SortKey::TotalPrice, descending: false };
        let (page, total) = store.page(&query, sort, 0, 1).await.unwrap();
        assert_eq!(total, 2);
        assert_eq!(page.len(), 1);
        assert_eq!(page[0].total_price(), dec!(2));

        let query = OrderQuery { status: Some(OrderStatus::Pending), ..Default::default() };
        assert!(store.find(&query, OrderSort::default()).await.unwrap().is_empty());

        let query = OrderQuery { order_date: DateRange { start: Some(Utc::now() + chrono::Duration::hours(1)), end: None }, ..Default::default() };
        assert!(store.find(&query, OrderSort::default()).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_manufacturer_lookup_ignores_case() {
        let store = MemoryStore::new();
        let product = Product::create(NewProduct { name: "Yogurt".into(), manufacturer: Some("Tnuva".into()), ..Default::default() }, Utc::now()).unwrap();
        CatalogStore::insert(&store, &product).await.unwrap();
        assert_eq!(store.ids_by_manufacturer("NUV").await.unwrap(), vec![product.id]);
        assert!(store.ids_by_manufacturer("strauss").await.unwrap().is_empty());
    }
}
