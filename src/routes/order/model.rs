use std::collections::HashSet;

use chrono::{DateTime, Duration, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, PgExecutor, PgPool, Postgres, QueryBuilder, types::Json};
use uuid::Uuid;

use crate::routes::user::model::Address;
use crate::utils::{generate_numeric_code, round_money};

/// Orders above this item total ship free.
pub const FREE_SHIPPING_THRESHOLD: Decimal = Decimal::from_parts(1000, 0, 0, false, 0);
pub const FLAT_SHIPPING: Decimal = Decimal::from_parts(50, 0, 0, false, 0);
pub const TAX_RATE: Decimal = Decimal::from_parts(10, 0, 0, false, 2);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OrderStatus {
    Ordered,
    Shipped,
    OutForDelivery,
    Delivered,
    Cancelled,
}

impl OrderStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            OrderStatus::Ordered => "ordered",
            OrderStatus::Shipped => "shipped",
            OrderStatus::OutForDelivery => "out_for_delivery",
            OrderStatus::Delivered => "delivered",
            OrderStatus::Cancelled => "cancelled",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StatusEntry {
    pub order_status: OrderStatus,
    pub status_date_time: DateTime<Utc>,
}

impl StatusEntry {
    pub fn now(order_status: OrderStatus) -> Self {
        Self {
            order_status,
            status_date_time: Utc::now(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderItem {
    pub product_id: Uuid,
    pub name: String,
    pub quantity: i32,
    pub price: Decimal,
    pub image: Option<String>,
}

#[derive(Debug, Clone, Serialize, FromRow)]
pub struct Order {
    pub id: Uuid,
    pub order_number: String,
    pub user_id: Uuid,
    #[sqlx(json)]
    pub order_items: Vec<OrderItem>,
    #[sqlx(json)]
    pub shipping_address: Address,
    pub items_price: Decimal,
    pub tax_price: Decimal,
    pub shipping_price: Decimal,
    pub total_price: Decimal,
    pub is_delivered: bool,
    pub delivered_at: Option<DateTime<Utc>>,
    pub is_cancelled: bool,
    pub cancelled_at: Option<DateTime<Utc>>,
    #[sqlx(json)]
    pub status_history: Vec<StatusEntry>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Order {
    pub fn current_status(&self) -> Option<OrderStatus> {
        self.status_history.last().map(|s| s.order_status)
    }

    /// Keep only the lines for `product_ids`.
    pub fn retain_lines(&mut self, product_ids: &HashSet<Uuid>) {
        self.order_items.retain(|line| product_ids.contains(&line.product_id));
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OrderTotals {
    pub items_price: Decimal,
    pub tax_price: Decimal,
    pub shipping_price: Decimal,
    pub total_price: Decimal,
}

impl OrderTotals {
    pub fn compute(items_price: Decimal) -> Self {
        let items_price = round_money(items_price, 2);
        let tax_price = round_money(items_price * TAX_RATE, 2);
        let shipping_price = if items_price > FREE_SHIPPING_THRESHOLD {
            Decimal::ZERO
        } else {
            FLAT_SHIPPING
        };
        Self {
            items_price,
            tax_price,
            shipping_price,
            total_price: items_price + tax_price + shipping_price,
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct CreateOrderRequest {
    pub address_id: Uuid,
}

#[derive(Debug, Deserialize)]
pub struct BuyNowRequest {
    pub product_id: Uuid,
    #[serde(default = "one")]
    pub quantity: i32,
}

fn one() -> i32 {
    1
}

#[derive(Debug, Deserialize)]
pub struct UpdateOrderRequest {
    pub status: Option<OrderStatus>,
}

#[derive(Debug, Default, Deserialize)]
pub struct OrderQuery {
    pub user: Option<Uuid>,
    pub status: Option<OrderStatus>,
    pub from: Option<NaiveDate>,
    pub to: Option<NaiveDate>,
    pub page: Option<i64>,
    pub limit: Option<i64>,
}

pub fn order_number() -> String {
    format!("ORD{}", generate_numeric_code(10))
}

fn push_order_filters<'a>(qb: &mut QueryBuilder<'a, Postgres>, q: &'a OrderQuery) {
    qb.push(" WHERE TRUE");
    if let Some(user) = q.user {
        qb.push(" AND user_id = ").push_bind(user);
    }
    if let Some(status) = q.status {
        qb.push(" AND status_history->-1->>'order_status' = ").push_bind(status.as_str());
    }
    if let Some(from) = q.from {
        qb.push(" AND created_at >= ").push_bind(from.and_hms_opt(0, 0, 0).map(|d| d.and_utc()));
    }
    if let Some(to) = q.to {
        // inclusive of the whole `to` day
        qb.push(" AND created_at < ")
            .push_bind((to + Duration::days(1)).and_hms_opt(0, 0, 0).map(|d| d.and_utc()));
    }
}

impl Order {
    pub async fn create<'e, E: PgExecutor<'e>>(
        executor: E,
        user_id: Uuid,
        items: &[OrderItem],
        address: &Address,
        totals: OrderTotals,
    ) -> Result<Self, sqlx::Error> {
        sqlx::query_as::<_, Order>(
            r#"
            INSERT INTO orders (
                id, order_number, user_id, order_items, shipping_address,
                items_price, tax_price, shipping_price, total_price, status_history
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
            RETURNING *
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(order_number())
        .bind(user_id)
        .bind(Json(items))
        .bind(Json(address))
        .bind(totals.items_price)
        .bind(totals.tax_price)
        .bind(totals.shipping_price)
        .bind(totals.total_price)
        .bind(Json(vec![StatusEntry::now(OrderStatus::Ordered)]))
        .fetch_one(executor)
        .await
    }

    pub async fn find(pool: &PgPool, id: Uuid) -> Result<Option<Self>, sqlx::Error> {
        sqlx::query_as::<_, Order>("SELECT * FROM orders WHERE id = $1")
            .bind(id)
            .fetch_optional(pool)
            .await
    }

    pub async fn list(pool: &PgPool) -> Result<Vec<Self>, sqlx::Error> {
        sqlx::query_as::<_, Order>("SELECT * FROM orders ORDER BY created_at DESC")
            .fetch_all(pool)
            .await
    }

    pub async fn for_user(pool: &PgPool, user_id: Uuid) -> Result<Vec<Self>, sqlx::Error> {
        sqlx::query_as::<_, Order>("SELECT * FROM orders WHERE user_id = $1 ORDER BY created_at DESC")
            .bind(user_id)
            .fetch_all(pool)
            .await
    }

    /// Orders with at least one line for any of `product_ids`.
    pub async fn containing_products(pool: &PgPool, product_ids: &[Uuid]) -> Result<Vec<Self>, sqlx::Error> {
        sqlx::query_as::<_, Order>(
            r#"
            SELECT * FROM orders o
            WHERE EXISTS (
                SELECT 1 FROM jsonb_array_elements(o.order_items) li
                WHERE (li->>'product_id')::uuid = ANY($1)
            )
            ORDER BY o.created_at DESC
            "#,
        )
        .bind(product_ids)
        .fetch_all(pool)
        .await
    }

    pub async fn query(
        pool: &PgPool,
        q: &OrderQuery,
        limit: i64,
        offset: i64,
    ) -> Result<(Vec<Self>, i64), sqlx::Error> {
        let mut count = QueryBuilder::<Postgres>::new("SELECT COUNT(*) FROM orders");
        push_order_filters(&mut count, q);
        let total: i64 = count.build_query_scalar().fetch_one(pool).await?;

        let mut select = QueryBuilder::<Postgres>::new("SELECT * FROM orders");
        push_order_filters(&mut select, q);
        select
            .push(" ORDER BY created_at DESC LIMIT ")
            .push_bind(limit)
            .push(" OFFSET ")
            .push_bind(offset);
        let orders = select.build_query_as::<Order>().fetch_all(pool).await?;
        Ok((orders, total))
    }

    /// Append a status; delivered and cancelled also stamp their flags.
    pub async fn push_status(pool: &PgPool, id: Uuid, status: OrderStatus) -> Result<Option<Self>, sqlx::Error> {
        let delivered = status == OrderStatus::Delivered;
        let cancelled = status == OrderStatus::Cancelled;
        sqlx::query_as::<_, Order>(
            r#"
            UPDATE orders SET
                status_history = status_history || $2,
                is_delivered = is_delivered OR $3,
                delivered_at = CASE WHEN $3 THEN NOW() ELSE delivered_at END,
                is_cancelled = is_cancelled OR $4,
                cancelled_at = CASE WHEN $4 THEN NOW() ELSE cancelled_at END,
                updated_at = NOW()
            WHERE id = $1
            RETURNING *
            "#,
        )
        .bind(id)
        .bind(Json(vec![StatusEntry::now(status)]))
        .bind(delivered)
        .bind(cancelled)
        .fetch_optional(pool)
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn large_order_ships_free() {
        let t = OrderTotals::compute(Decimal::new(1500, 0));
        assert_eq!(t.tax_price, Decimal::new(15000, 2));
        assert_eq!(t.shipping_price, Decimal::ZERO);
        assert_eq!(t.total_price, Decimal::new(165000, 2));
    }

    #[test]
    fn small_order_pays_flat_shipping() {
        let t = OrderTotals::compute(Decimal::new(500, 0));
        assert_eq!(t.tax_price, Decimal::new(50, 0));
        assert_eq!(t.shipping_price, Decimal::new(50, 0));
        assert_eq!(t.total_price, Decimal::new(600, 0));
    }

    #[test]
    fn threshold_itself_is_not_free() {
        let t = OrderTotals::compute(Decimal::new(1000, 0));
        assert_eq!(t.shipping_price, FLAT_SHIPPING);
    }

    #[test]
    fn tax_is_rounded_to_cents() {
        let t = OrderTotals::compute(Decimal::new(33333, 3));
        assert_eq!(t.items_price, Decimal::new(3333, 2));
        assert_eq!(t.tax_price, Decimal::new(333, 2));
    }

    #[test]
    fn status_uses_snake_case() {
        let json = serde_json::to_string(&OrderStatus::OutForDelivery).unwrap();
        assert_eq!(json, "\"out_for_delivery\"");
        assert_eq!(OrderStatus::OutForDelivery.as_str(), "out_for_delivery");
    }

    #[test]
    fn order_numbers_are_prefixed() {
        let n = order_number();
        assert!(n.starts_with("ORD"));
        assert_eq!(n.len(), 13);
    }
}
