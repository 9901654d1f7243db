use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, PgExecutor, PgPool, types::Json};
use uuid::Uuid;
use validator::Validate;

use crate::error::AppError;
use crate::routes::product::model::ProductView;

const CAS_ATTEMPTS: usize = 3;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CartItem {
    pub product_id: Uuid,
    pub quantity: i32,
    pub price_at_add_time: Decimal,
}

#[derive(Debug, Clone, Serialize, FromRow)]
pub struct Cart {
    pub user_id: Uuid,
    #[sqlx(json)]
    pub items: Vec<CartItem>,
    pub total_items: i32,
    pub total_price: Decimal,
    #[serde(skip_serializing)]
    pub version: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct CartTotals {
    pub total_items: i32,
    pub total_price: Decimal,
}

/// Totals are always derived from the lines, never adjusted incrementally.
pub fn totals(items: &[CartItem]) -> CartTotals {
    items.iter().fold(CartTotals::default(), |acc, item| CartTotals {
        total_items: acc.total_items + item.quantity,
        total_price: acc.total_price + item.price_at_add_time * Decimal::from(item.quantity),
    })
}

/// Add `quantity` of a product; an existing line grows instead of duplicating.
pub fn add_item(items: &mut Vec<CartItem>, product_id: Uuid, quantity: i32, price: Decimal) {
    match items.iter_mut().find(|i| i.product_id == product_id) {
        Some(line) => line.quantity += quantity,
        None => items.push(CartItem {
            product_id,
            quantity,
            price_at_add_time: price,
        }),
    }
}

/// Apply a signed quantity change; a line reaching zero or below is removed.
pub fn apply_delta(items: &mut Vec<CartItem>, product_id: Uuid, delta: i32) -> Result<(), AppError> {
    let index = items
        .iter()
        .position(|i| i.product_id == product_id)
        .ok_or_else(|| AppError::not_found("Cart item"))?;
    let quantity = items[index].quantity + delta;
    if quantity <= 0 {
        items.remove(index);
    } else {
        items[index].quantity = quantity;
    }
    Ok(())
}

pub fn remove_item(items: &mut Vec<CartItem>, product_id: Uuid) -> Result<(), AppError> {
    let before = items.len();
    items.retain(|i| i.product_id != product_id);
    if items.len() == before {
        return Err(AppError::not_found("Cart item"));
    }
    Ok(())
}

#[derive(Debug, Deserialize, Validate)]
pub struct AddToCartRequest {
    pub product_id: Uuid,
    #[validate(range(min = 1, max = 1000, message = "quantity must be at least 1"))]
    pub quantity: i32,
}

#[derive(Debug, Deserialize, Validate)]
pub struct UpdateCartRequest {
    pub product_id: Uuid,
    #[validate(range(min = -1000, max = 1000))]
    pub quantity: i32,
}

#[derive(Debug, Serialize)]
pub struct CartLine {
    #[serde(flatten)]
    pub item: CartItem,
    pub product: Option<ProductView>,
}

#[derive(Debug, Serialize)]
pub struct CartView {
    pub user_id: Uuid,
    pub items: Vec<CartLine>,
    pub total_items: i32,
    pub total_price: Decimal,
}

impl Cart {
    pub async fn find(pool: &PgPool, user_id: Uuid) -> Result<Option<Self>, sqlx::Error> {
        sqlx::query_as::<_, Cart>("SELECT * FROM carts WHERE user_id = $1")
            .bind(user_id)
            .fetch_optional(pool)
            .await
    }

    async fn insert(pool: &PgPool, user_id: Uuid, items: &[CartItem]) -> Result<Option<Self>, sqlx::Error> {
        let totals = totals(items);
        sqlx::query_as::<_, Cart>(
            r#"
            INSERT INTO carts (user_id, items, total_items, total_price)
            VALUES ($1, $2, $3, $4)
            ON CONFLICT (user_id) DO NOTHING
            RETURNING *
            "#,
        )
        .bind(user_id)
        .bind(Json(items))
        .bind(totals.total_items)
        .bind(totals.total_price)
        .fetch_optional(pool)
        .await
    }

    /// Compare-and-swap on `version`; `None` means another writer got there first.
    pub async fn swap<'e, E: PgExecutor<'e>>(
        executor: E,
        user_id: Uuid,
        version: i64,
        items: &[CartItem],
    ) -> Result<Option<Self>, sqlx::Error> {
        let totals = totals(items);
        sqlx::query_as::<_, Cart>(
            r#"
            UPDATE carts
            SET items = $3, total_items = $4, total_price = $5,
                version = version + 1, updated_at = NOW()
            WHERE user_id = $1 AND version = $2
            RETURNING *
            "#,
        )
        .bind(user_id)
        .bind(version)
        .bind(Json(items))
        .bind(totals.total_items)
        .bind(totals.total_price)
        .fetch_optional(executor)
        .await
    }

    /// Read-modify-write retried on lost races. A missing cart is created only when `create` is set.
    pub async fn modify<F>(pool: &PgPool, user_id: Uuid, create: bool, mut edit: F) -> Result<Self, AppError>
    where
        F: FnMut(&mut Vec<CartItem>) -> Result<(), AppError>,
    {
        for attempt in 1..=CAS_ATTEMPTS {
            let saved = match Cart::find(pool, user_id).await? {
                Some(cart) => {
                    let mut items = cart.items;
                    edit(&mut items)?;
                    Cart::swap(pool, user_id, cart.version, &items).await?
                }
                None if create => {
                    let mut items = Vec::new();
                    edit(&mut items)?;
                    Cart::insert(pool, user_id, &items).await?
                }
                None => return Err(AppError::not_found("Cart")),
            };
            if let Some(cart) = saved {
                return Ok(cart);
            }
            tracing::debug!(%user_id, attempt, "cart changed concurrently, retrying");
        }
        Err(AppError::Conflict("Cart was modified concurrently, please retry".into()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn price(units: i64) -> Decimal {
        Decimal::new(units, 0)
    }

    #[test]
    fn totals_are_reductions_over_lines() {
        let mut items = Vec::new();
        add_item(&mut items, Uuid::new_v4(), 2, price(100));
        add_item(&mut items, Uuid::new_v4(), 1, Decimal::new(4999, 2));
        let t = totals(&items);
        assert_eq!(t.total_items, 3);
        assert_eq!(t.total_price, Decimal::new(24999, 2));
    }

    #[test]
    fn re_adding_increments_quantity() {
        let id = Uuid::new_v4();
        let mut items = Vec::new();
        add_item(&mut items, id, 1, price(10));
        add_item(&mut items, id, 2, price(12));
        assert_eq!(items.len(), 1);
        assert_eq!(items[0].quantity, 3);
        // first price is kept
        assert_eq!(items[0].price_at_add_time, price(10));
    }

    #[test]
    fn delta_to_zero_or_below_removes_line() {
        let id = Uuid::new_v4();
        let mut items = Vec::new();
        add_item(&mut items, id, 2, price(10));
        apply_delta(&mut items, id, -1).unwrap();
        assert_eq!(items[0].quantity, 1);
        apply_delta(&mut items, id, -5).unwrap();
        assert!(items.is_empty());
        assert_eq!(totals(&items), CartTotals::default());
    }

    #[test]
    fn delta_on_missing_line_is_not_found() {
        let mut items = Vec::new();
        let err = apply_delta(&mut items, Uuid::new_v4(), 1).unwrap_err();
        assert!(matches!(err, AppError::NotFound(_)));
    }

    #[test]
    fn remove_drops_only_that_line() {
        let a = Uuid::new_v4();
        let b = Uuid::new_v4();
        let mut items = Vec::new();
        add_item(&mut items, a, 1, price(5));
        add_item(&mut items, b, 1, price(7));
        remove_item(&mut items, a).unwrap();
        assert_eq!(items.len(), 1);
        assert_eq!(totals(&items).total_price, price(7));
        assert!(remove_item(&mut items, a).is_err());
    }
}
