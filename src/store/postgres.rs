//! Postgres backend. Line items are stored as a JSONB array on the order row.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sha2::{Digest, Sha256};
use sqlx::{postgres::PgPool, types::Json, FromRow, Postgres, QueryBuilder};
use uuid::Uuid;

use super::{
    AccountStore, CatalogStore, CredentialVerifier, OrderQuery, OrderSort, OrderStore,
    SettingsStore, StoreError, StoreResult,
};
use crate::domain::aggregates::{
    Account, Address, GlobalSettings, InvalidStatus, LineItem, Order, Product, Profile,
    GLOBAL_SETTINGS_KEY,
};
use crate::domain::value_objects::{CredentialHash, PhoneNumber, Region, RegionError};

const PRODUCT_COLUMNS: &str = "id, name, price_per_unit, photo, description, is_special_offer, manufacturer, \
    serving_options, default_packet_count, created_at, updated_at";
const ACCOUNT_COLUMNS: &str = "id, name, phone, area, settlement, address_details, is_admin, credential, \
    created_at, updated_at";
const ORDER_COLUMNS: &str = "id, user_id, user_name, user_phone, delivery_address, products, total_price, order_date, \
    modification_date, completion_date, status, note, created_at, updated_at";

#[derive(Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub fn new(pool: PgPool) -> Self { Self { pool } }
}

#[derive(FromRow)]
struct ProductRow {
    id: Uuid,
    name: String,
    price_per_unit: Decimal,
    photo: Option<String>,
    description: String,
    is_special_offer: bool,
    manufacturer: Option<String>,
    serving_options: Vec<String>,
    default_packet_count: i32,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl TryFrom<ProductRow> for Product {
    type Error = StoreError;

    fn try_from(row: ProductRow) -> Result<Self, Self::Error> {
        Ok(Product {
            id: row.id,
            name: row.name,
            price_per_unit: row.price_per_unit,
            photo: row.photo,
            description: row.description,
            is_special_offer: row.is_special_offer,
            manufacturer: row.manufacturer,
            serving_options: row.serving_options,
            default_packet_count: u32::try_from(row.default_packet_count).map_err(|_| {
                StoreError::Corrupt(format!(
                    "product {} has packet count {}",
                    row.id, row.default_packet_count
                ))
            })?,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

#[derive(FromRow)]
struct AccountRow {
    id: Uuid,
    name: String,
    phone: String,
    area: String,
    settlement: String,
    address_details: String,
    is_admin: bool,
    credential: Option<String>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl TryFrom<AccountRow> for Account {
    type Error = StoreError;

    fn try_from(row: AccountRow) -> Result<Self, Self::Error> {
        let id = row.id;
        let corrupt = |what: String| StoreError::Corrupt(format!("account {id}: {what}"));
        let profile = Profile {
            id: row.id,
            name: row.name,
            phone: PhoneNumber::parse(&row.phone).map_err(|e| corrupt(e.to_string()))?,
            address: Address {
                area: row.area.parse().map_err(|e: RegionError| corrupt(e.to_string()))?,
                settlement: row.settlement,
                details: row.address_details,
            },
            created_at: row.created_at,
            updated_at: row.updated_at,
        };
        match (row.is_admin, row.credential) {
            (false, _) => Ok(Account::Customer(profile)),
            (true, Some(stored)) => {
                Ok(Account::Admin { profile, credential: CredentialHash::from_stored(stored) })
            }
            (true, None) => Err(corrupt("administrator without credential".into())),
        }
    }
}

#[derive(FromRow)]
struct OrderRow {
    id: Uuid,
    user_id: Uuid,
    user_name: String,
    user_phone: String,
    delivery_address: String,
    products: Json<Vec<LineItem>>,
    total_price: Decimal,
    order_date: DateTime<Utc>,
    modification_date: Option<DateTime<Utc>>,
    completion_date: DateTime<Utc>,
    status: String,
    note: Option<String>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl TryFrom<OrderRow> for Order {
    type Error = StoreError;

    fn try_from(row: OrderRow) -> Result<Self, Self::Error> {
        Ok(Order {
            id: row.id,
            user_id: row.user_id,
            user_name: row.user_name,
            user_phone: row.user_phone,
            delivery_address: row.delivery_address,
            products: row.products.0,
            total_price: row.total_price,
            order_date: row.order_date,
            modification_date: row.modification_date,
            completion_date: row.completion_date,
            status: row
                .status
                .parse()
                .map_err(|e: InvalidStatus| StoreError::Corrupt(e.to_string()))?,
            note: row.note,
            created_at: row.created_at,
            updated_at: row.updated_at,
            events: vec![],
        })
    }
}

fn collect<R, T>(rows: Vec<R>) -> StoreResult<Vec<T>>
where
    T: TryFrom<R, Error = StoreError>,
{
    rows.into_iter().map(T::try_from).collect()
}

fn push_order_filters(qb: &mut QueryBuilder<'_, Postgres>, query: &OrderQuery) {
    qb.push(" WHERE TRUE");
    if let Some(status) = query.status {
        qb.push(" AND status = ").push_bind(status.as_str());
    }
    let ranges = [("order_date", query.order_date), ("completion_date", query.completion_date)];
    for (column, range) in ranges {
        if let Some(start) = range.start {
            qb.push(format!(" AND {column} >= ")).push_bind(start);
        }
        if let Some(end) = range.end {
            qb.push(format!(" AND {column} <= ")).push_bind(end);
        }
    }
    if let Some(ids) = &query.product_ids {
        qb.push(
            " AND EXISTS (SELECT 1 FROM jsonb_array_elements(products) AS item \
             WHERE (item->>'productId')::uuid = ANY(",
        )
        .push_bind(ids.clone())
            .push("))");
    }
    if let Some(ids) = &query.user_ids {
        qb.push(" AND user_id = ANY(").push_bind(ids.clone()).push(")");
    }
}

fn push_order_sort(qb: &mut QueryBuilder<'_, Postgres>, sort: OrderSort) {
    let direction = if sort.descending { "DESC" } else { "ASC" };
    qb.push(format!(" ORDER BY {} {direction}, id {direction}", sort.key.column()));
}

fn packet_count_column(p: &Product) -> StoreResult<i32> {
    i32::try_from(p.default_packet_count).map_err(|_| {
        StoreError::Corrupt(format!(
            "product {} packet count {} does not fit",
            p.id, p.default_packet_count
        ))
    })
}

fn map_unique(err: sqlx::Error, what: impl FnOnce() -> String) -> StoreError {
    if let sqlx::Error::Database(db) = &err {
        if db.is_unique_violation() {
            return StoreError::Conflict(what());
        }
    }
    StoreError::Database(err)
}

#[async_trait]
impl CatalogStore for PgStore {
    async fn find_by_id(&self, id: Uuid) -> StoreResult<Option<Product>> {
        let sql = format!("SELECT {PRODUCT_COLUMNS} FROM products WHERE id = $1");
        let row = sqlx::query_as::<_, ProductRow>(&sql).bind(id).fetch_optional(&self.pool).await?;
        row.map(Product::try_from).transpose()
    }

    async fn find_by_ids(&self, ids: &[Uuid]) -> StoreResult<Vec<Product>> {
        let sql = format!("SELECT {PRODUCT_COLUMNS} FROM products WHERE id = ANY($1)");
        let rows = sqlx::query_as::<_, ProductRow>(&sql).bind(ids).fetch_all(&self.pool).await?;
        collect(rows)
    }

    async fn list(&self, specials_only: bool) -> StoreResult<Vec<Product>> {
        let rows = sqlx::query_as::<_, ProductRow>(&format!(
            "SELECT {PRODUCT_COLUMNS} FROM products WHERE ($1 = FALSE OR is_special_offer) ORDER BY name, id"
        ))
        .bind(specials_only)
        .fetch_all(&self.pool)
        .await?;
        collect(rows)
    }

    async fn manufacturers(&self) -> StoreResult<Vec<String>> {
        let rows: Vec<(String,)> = sqlx::query_as(
            "SELECT DISTINCT manufacturer FROM products WHERE manufacturer IS NOT NULL AND manufacturer <> ''",
        )
        .fetch_all(&self.pool)
        .await?;
        Ok(rows.into_iter().map(|(m,)| m).collect())
    }

    async fn ids_by_manufacturer(&self, needle: &str) -> StoreResult<Vec<Uuid>> {
        let rows: Vec<(Uuid,)> = sqlx::query_as(
            "SELECT id FROM products WHERE strpos(lower(coalesce(manufacturer, '')), lower($1)) > 0",
        )
        .bind(needle)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows.into_iter().map(|(id,)| id).collect())
    }

    async fn insert(&self, p: &Product) -> StoreResult<()> {
        sqlx::query(&format!(
            "INSERT INTO products ({PRODUCT_COLUMNS}) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)"
        ))
        .bind(p.id)
        .bind(&p.name)
        .bind(p.price_per_unit)
        .bind(&p.photo)
        .bind(&p.description)
        .bind(p.is_special_offer)
        .bind(&p.manufacturer)
        .bind(&p.serving_options)
        .bind(packet_count_column(p)?)
        .bind(p.created_at)
        .bind(p.updated_at)
        .execute(&self.pool)
        .await
        .map_err(|e| map_unique(e, || format!("product {}", p.id)))?;
        Ok(())
    }

    async fn update(&self, p: &Product) -> StoreResult<bool> {
        let result = sqlx::query(
            "UPDATE products SET name = $2, price_per_unit = $3, photo = $4, description = $5, is_special_offer = $6, \
             manufacturer = $7, serving_options = $8, default_packet_count = $9, updated_at = $10 WHERE id = $1",
        )
        .bind(p.id)
        .bind(&p.name)
        .bind(p.price_per_unit)
        .bind(&p.photo)
        .bind(&p.description)
        .bind(p.is_special_offer)
        .bind(&p.manufacturer)
        .bind(&p.serving_options)
        .bind(packet_count_column(p)?)
        .bind(p.updated_at)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn delete(&self, id: Uuid) -> StoreResult<bool> {
        let result =
            sqlx::query("DELETE FROM products WHERE id = $1").bind(id).execute(&self.pool).await?;
        Ok(result.rows_affected() > 0)
    }
}

#[async_trait]
impl AccountStore for PgStore {
    async fn find_by_id(&self, id: Uuid) -> StoreResult<Option<Account>> {
        let sql = format!("SELECT {ACCOUNT_COLUMNS} FROM accounts WHERE id = $1");
        let row = sqlx::query_as::<_, AccountRow>(&sql).bind(id).fetch_optional(&self.pool).await?;
        row.map(Account::try_from).transpose()
    }

    async fn find_by_phone(&self, phone: &PhoneNumber) -> StoreResult<Option<Account>> {
        let sql = format!("SELECT {ACCOUNT_COLUMNS} FROM accounts WHERE phone = $1");
        let row = sqlx::query_as::<_, AccountRow>(&sql)
            .bind(phone.as_str())
            .fetch_optional(&self.pool)
            .await?;
        row.map(Account::try_from).transpose()
    }

    async fn ids_by_address(
        &self,
        area: Option<Region>,
        settlement: Option<&str>,
    ) -> StoreResult<Vec<Uuid>> {
        let rows: Vec<(Uuid,)> = sqlx::query_as(
            "SELECT id FROM accounts WHERE ($1::text IS NULL OR area = $1) \
             AND ($2::text IS NULL OR strpos(lower(settlement), lower($2)) > 0)",
        )
        .bind(area.map(Region::label))
        .bind(settlement)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows.into_iter().map(|(id,)| id).collect())
    }

    async fn insert(&self, account: &Account) -> StoreResult<()> {
        let p = account.profile();
        sqlx::query(&format!(
            "INSERT INTO accounts ({ACCOUNT_COLUMNS}) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)"
        ))
        .bind(p.id)
        .bind(&p.name)
        .bind(p.phone.as_str())
        .bind(p.address.area.label())
        .bind(&p.address.settlement)
        .bind(&p.address.details)
        .bind(account.is_admin())
        .bind(account.credential().map(CredentialHash::as_str))
        .bind(p.created_at)
        .bind(p.updated_at)
        .execute(&self.pool)
        .await
        .map_err(|e| map_unique(e, || format!("account with phone {}", p.phone)))?;
        Ok(())
    }
}

#[async_trait]
impl SettingsStore for PgStore {
    async fn load(&self) -> StoreResult<Option<GlobalSettings>> {
        let row: Option<(DateTime<Utc>,)> = sqlx::query_as(
            "SELECT default_completion_date FROM admin_settings WHERE setting_key = $1",
        )
        .bind(GLOBAL_SETTINGS_KEY)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row.map(|(date,)| GlobalSettings { default_completion_date: date }))
    }

    async fn save_completion_date(&self, date: DateTime<Utc>) -> StoreResult<GlobalSettings> {
        let (stored,): (DateTime<Utc>,) = sqlx::query_as(
            "INSERT INTO admin_settings (setting_key, default_completion_date, updated_at) VALUES ($1, $2, NOW()) \
             ON CONFLICT (setting_key) DO UPDATE SET default_completion_date = EXCLUDED.default_completion_date, \
             updated_at = NOW() RETURNING default_completion_date",
        )
        .bind(GLOBAL_SETTINGS_KEY)
        .bind(date)
        .fetch_one(&self.pool)
        .await?;
        Ok(GlobalSettings { default_completion_date: stored })
    }
}

#[async_trait]
impl OrderStore for PgStore {
    async fn insert(&self, o: &Order) -> StoreResult<()> {
        sqlx::query(&format!(
            "INSERT INTO orders ({ORDER_COLUMNS}) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14)"
        ))
        .bind(o.id)
        .bind(o.user_id)
        .bind(&o.user_name)
        .bind(&o.user_phone)
        .bind(&o.delivery_address)
        .bind(Json(o.products.clone()))
        .bind(o.total_price)
        .bind(o.order_date)
        .bind(o.modification_date)
        .bind(o.completion_date)
        .bind(o.status.as_str())
        .bind(&o.note)
        .bind(o.created_at)
        .bind(o.updated_at)
        .execute(&self.pool)
        .await
        .map_err(|e| map_unique(e, || format!("order {}", o.id)))?;
        Ok(())
    }

    async fn save(&self, o: &Order) -> StoreResult<()> {
        sqlx::query(
            "UPDATE orders SET delivery_address = $2, products = $3, total_price = $4, modification_date = $5, \
             completion_date = $6, status = $7, note = $8, updated_at = $9 WHERE id = $1",
        )
        .bind(o.id)
        .bind(&o.delivery_address)
        .bind(Json(o.products.clone()))
        .bind(o.total_price)
        .bind(o.modification_date)
        .bind(o.completion_date)
        .bind(o.status.as_str())
        .bind(&o.note)
        .bind(o.updated_at)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn find_by_id(&self, id: Uuid) -> StoreResult<Option<Order>> {
        let sql = format!("SELECT {ORDER_COLUMNS} FROM orders WHERE id = $1");
        let row = sqlx::query_as::<_, OrderRow>(&sql).bind(id).fetch_optional(&self.pool).await?;
        row.map(Order::try_from).transpose()
    }

    async fn find_for_user(&self, id: Uuid, user_id: Uuid) -> StoreResult<Option<Order>> {
        let sql = format!("SELECT {ORDER_COLUMNS} FROM orders WHERE id = $1 AND user_id = $2");
        let row = sqlx::query_as::<_, OrderRow>(&sql)
            .bind(id)
            .bind(user_id)
            .fetch_optional(&self.pool)
            .await?;
        row.map(Order::try_from).transpose()
    }

    async fn list_for_user(&self, user_id: Uuid) -> StoreResult<Vec<Order>> {
        let rows = sqlx::query_as::<_, OrderRow>(&format!(
            "SELECT {ORDER_COLUMNS} FROM orders WHERE user_id = $1 ORDER BY order_date DESC, id DESC"
        ))
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;
        collect(rows)
    }

    async fn find(&self, query: &OrderQuery, sort: OrderSort) -> StoreResult<Vec<Order>> {
        let mut qb = QueryBuilder::new(format!("SELECT {ORDER_COLUMNS} FROM orders"));
        push_order_filters(&mut qb, query);
        push_order_sort(&mut qb, sort);
        let rows = qb.build_query_as::<OrderRow>().fetch_all(&self.pool).await?;
        collect(rows)
    }

    async fn page(
        &self,
        query: &OrderQuery,
        sort: OrderSort,
        offset: u64,
        limit: u64,
    ) -> StoreResult<(Vec<Order>, u64)> {
        let mut count = QueryBuilder::new("SELECT COUNT(*) FROM orders");
        push_order_filters(&mut count, query);
        let (total,): (i64,) = count.build_query_as().fetch_one(&self.pool).await?;

        let mut qb = QueryBuilder::new(format!("SELECT {ORDER_COLUMNS} FROM orders"));
        push_order_filters(&mut qb, query);
        push_order_sort(&mut qb, sort);
        qb.push(" LIMIT ").push_bind(limit as i64).push(" OFFSET ").push_bind(offset as i64);
        let rows = qb.build_query_as::<OrderRow>().fetch_all(&self.pool).await?;

        Ok((collect(rows)?, total.max(0) as u64))
    }
}

/// Hex SHA-256 of a bearer token, the form the issuer writes to `sessions`.
pub fn token_digest(token: &str) -> String {
    hex::encode(Sha256::digest(token.as_bytes()))
}

#[async_trait]
impl CredentialVerifier for PgStore {
    async fn verify(&self, token: &str) -> StoreResult<Option<Uuid>> {
        let row: Option<(Uuid,)> = sqlx::query_as(
            "SELECT account_id FROM sessions WHERE token_digest = $1 AND expires_at > NOW()",
        )
        .bind(token_digest(token))
        .fetch_optional(&self.pool)
        .await?;
        Ok(row.map(|(id,)| id))
    }
}
