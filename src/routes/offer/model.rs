use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, PgPool, types::Json};
use uuid::Uuid;

use crate::error::AppError;
use crate::routes::product::model::ProductView;

pub const BEST_SELLING: &str = "Best Selling";
pub const DAILY_OFFER: &str = "Daily Offer";

/// Window given to products flagged at creation time.
pub const FLAGGED_OFFER_DAYS: i64 = 30;

const CAS_ATTEMPTS: usize = 3;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OfferProduct {
    pub product_id: Uuid,
    pub start_date: DateTime<Utc>,
    pub end_date: DateTime<Utc>,
}

impl OfferProduct {
    pub fn starting_now(product_id: Uuid, days: i64) -> Self {
        let now = Utc::now();
        Self {
            product_id,
            start_date: now,
            end_date: now + Duration::days(days),
        }
    }

    pub fn check(&self) -> Result<(), AppError> {
        if self.end_date <= self.start_date {
            return Err(AppError::Validation(format!(
                "end_date must be after start_date for product {}",
                self.product_id
            )));
        }
        Ok(())
    }

    pub fn is_active_at(&self, now: DateTime<Utc>) -> bool {
        self.start_date <= now && now < self.end_date
    }
}

#[derive(Debug, Clone, Serialize, FromRow)]
pub struct Offer {
    pub id: Uuid,
    #[sqlx(rename = "type")]
    #[serde(rename = "type")]
    pub offer_type: String,
    pub description: Option<String>,
    #[sqlx(json)]
    pub products: Vec<OfferProduct>,
    pub is_active: bool,
    pub created_by: Option<Uuid>,
    pub updated_by: Option<Uuid>,
    #[serde(skip_serializing)]
    pub version: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Serialize)]
pub struct OfferProductView {
    #[serde(flatten)]
    pub window: OfferProduct,
    pub product: Option<ProductView>,
}

#[derive(Debug, Serialize)]
pub struct OfferView {
    pub id: Uuid,
    #[serde(rename = "type")]
    pub offer_type: String,
    pub description: Option<String>,
    pub is_active: bool,
    pub total_products: usize,
    pub products: Vec<OfferProductView>,
}

#[derive(Debug, Deserialize)]
pub struct AddOfferRequest {
    #[serde(rename = "type")]
    pub offer_type: String,
    pub description: Option<String>,
    #[serde(default)]
    pub products: Vec<OfferProduct>,
}

#[derive(Debug, Deserialize)]
pub struct NamedOfferProduct {
    pub name: String,
    pub start_date: DateTime<Utc>,
    pub end_date: DateTime<Utc>,
}

#[derive(Debug, Deserialize)]
pub struct OfferStatusRequest {
    pub is_active: bool,
}

/// Append windows for products not yet in the offer. Returns how many were added.
pub fn merge_products(existing: &mut Vec<OfferProduct>, incoming: &[OfferProduct]) -> usize {
    let mut added = 0;
    for window in incoming {
        if existing.iter().any(|p| p.product_id == window.product_id) {
            continue;
        }
        existing.push(window.clone());
        added += 1;
    }
    added
}

/// Replace the window of one product, appending it when absent.
pub fn set_window(existing: &mut Vec<OfferProduct>, window: OfferProduct) {
    match existing.iter_mut().find(|p| p.product_id == window.product_id) {
        Some(current) => *current = window,
        None => existing.push(window),
    }
}

pub fn remove_product(existing: &mut Vec<OfferProduct>, product_id: Uuid) -> bool {
    let before = existing.len();
    existing.retain(|p| p.product_id != product_id);
    existing.len() != before
}

pub fn active_windows(products: &[OfferProduct], now: DateTime<Utc>) -> Vec<OfferProduct> {
    products.iter().filter(|p| p.is_active_at(now)).cloned().collect()
}

/// Distinct product ids of a request, sorted.
pub fn distinct_ids(products: &[OfferProduct]) -> Vec<Uuid> {
    let mut ids: Vec<Uuid> = products.iter().map(|p| p.product_id).collect();
    ids.sort();
    ids.dedup();
    ids
}

impl Offer {
    pub async fn find(pool: &PgPool, id: Uuid) -> Result<Option<Self>, sqlx::Error> {
        sqlx::query_as::<_, Offer>("SELECT * FROM offers WHERE id = $1")
            .bind(id)
            .fetch_optional(pool)
            .await
    }

    pub async fn find_by_type(pool: &PgPool, offer_type: &str) -> Result<Option<Self>, sqlx::Error> {
        sqlx::query_as::<_, Offer>("SELECT * FROM offers WHERE LOWER(type) = LOWER($1)")
            .bind(offer_type.trim())
            .fetch_optional(pool)
            .await
    }

    pub async fn list_active(pool: &PgPool) -> Result<Vec<Self>, sqlx::Error> {
        sqlx::query_as::<_, Offer>("SELECT * FROM offers WHERE is_active ORDER BY created_at DESC")
            .fetch_all(pool)
            .await
    }

    /// Admin-defined offers, excluding the two catalog-driven ones.
    pub async fn list_dynamic(pool: &PgPool) -> Result<Vec<Self>, sqlx::Error> {
        sqlx::query_as::<_, Offer>(
            r#"
            SELECT * FROM offers
            WHERE LOWER(type) <> LOWER($1) AND LOWER(type) <> LOWER($2)
            ORDER BY created_at DESC
            "#,
        )
        .bind(DAILY_OFFER)
        .bind(BEST_SELLING)
        .fetch_all(pool)
        .await
    }

    async fn insert(
        pool: &PgPool,
        offer_type: &str,
        description: Option<&str>,
        products: &[OfferProduct],
        admin_id: Option<Uuid>,
    ) -> Result<Self, sqlx::Error> {
        sqlx::query_as::<_, Offer>(
            r#"
            INSERT INTO offers (id, type, description, products, created_by, updated_by)
            VALUES ($1, $2, $3, $4, $5, $5)
            RETURNING *
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(offer_type.trim())
        .bind(description)
        .bind(Json(products))
        .bind(admin_id)
        .fetch_one(pool)
        .await
    }

    /// Write `products` only if nobody changed the offer since `version` was read.
    async fn swap_products(
        pool: &PgPool,
        id: Uuid,
        version: i64,
        products: &[OfferProduct],
        admin_id: Option<Uuid>,
    ) -> Result<Option<Self>, sqlx::Error> {
        sqlx::query_as::<_, Offer>(
            r#"
            UPDATE offers
            SET products = $3, updated_by = COALESCE($4, updated_by),
                version = version + 1, updated_at = NOW()
            WHERE id = $1 AND version = $2
            RETURNING *
            "#,
        )
        .bind(id)
        .bind(version)
        .bind(Json(products))
        .bind(admin_id)
        .fetch_optional(pool)
        .await
    }

    /// Read-modify-write of an offer's product list under optimistic concurrency.
    ///
    /// With `create` set, a missing offer is created from the edited list.
    pub async fn modify_products<F>(
        pool: &PgPool,
        offer_type: &str,
        admin_id: Option<Uuid>,
        create: bool,
        description: Option<&str>,
        mut edit: F,
    ) -> Result<Self, AppError>
    where
        F: FnMut(&mut Vec<OfferProduct>) -> Result<(), AppError>,
    {
        for attempt in 1..=CAS_ATTEMPTS {
            match Offer::find_by_type(pool, offer_type).await? {
                Some(offer) => {
                    let mut products = offer.products.clone();
                    edit(&mut products)?;
                    if products == offer.products {
                        return Ok(offer);
                    }
                    if let Some(updated) =
                        Offer::swap_products(pool, offer.id, offer.version, &products, admin_id).await?
                    {
                        return Ok(updated);
                    }
                }
                None => {
                    if !create {
                        return Err(AppError::not_found("Offer"));
                    }
                    let mut products = Vec::new();
                    edit(&mut products)?;
                    match Offer::insert(pool, offer_type, description, &products, admin_id).await {
                        Ok(offer) => return Ok(offer),
                        // created concurrently, retry as an update
                        Err(sqlx::Error::Database(db)) if db.is_unique_violation() => {}
                        Err(e) => return Err(e.into()),
                    }
                }
            }
            tracing::debug!(offer_type, attempt, "offer changed concurrently, retrying");
        }
        Err(AppError::Conflict("Offer was modified concurrently, please retry".into()))
    }

    pub async fn set_active(pool: &PgPool, id: Uuid, is_active: bool, admin_id: Uuid) -> Result<Option<Self>, sqlx::Error> {
        sqlx::query_as::<_, Offer>(
            r#"
            UPDATE offers SET is_active = $2, updated_by = $3, version = version + 1, updated_at = NOW()
            WHERE id = $1
            RETURNING *
            "#,
        )
        .bind(id)
        .bind(is_active)
        .bind(admin_id)
        .fetch_optional(pool)
        .await
    }

    pub async fn toggle_by_type(pool: &PgPool, offer_type: &str, admin_id: Uuid) -> Result<Option<Self>, sqlx::Error> {
        sqlx::query_as::<_, Offer>(
            r#"
            UPDATE offers SET is_active = NOT is_active, updated_by = $2, version = version + 1, updated_at = NOW()
            WHERE LOWER(type) = LOWER($1)
            RETURNING *
            "#,
        )
        .bind(offer_type.trim())
        .bind(admin_id)
        .fetch_optional(pool)
        .await
    }

    /// Product ids whose window covers `now`, in offer order.
    pub async fn active_product_ids(pool: &PgPool, offer_type: &str) -> Result<Vec<Uuid>, sqlx::Error> {
        let now = Utc::now();
        Ok(Offer::find_by_type(pool, offer_type)
            .await?
            .filter(|o| o.is_active)
            .map(|o| active_windows(&o.products, now).into_iter().map(|p| p.product_id).collect())
            .unwrap_or_default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn window(product_id: Uuid, start_offset: i64, end_offset: i64) -> OfferProduct {
        let now = Utc::now();
        OfferProduct {
            product_id,
            start_date: now + Duration::hours(start_offset),
            end_date: now + Duration::hours(end_offset),
        }
    }

    #[test]
    fn adding_same_product_twice_is_a_no_op() {
        let id = Uuid::new_v4();
        let mut products = Vec::new();
        assert_eq!(merge_products(&mut products, &[window(id, -1, 1)]), 1);
        assert_eq!(merge_products(&mut products, &[window(id, -5, 5)]), 0);
        assert_eq!(products.len(), 1);
    }

    #[test]
    fn set_window_replaces_or_appends() {
        let a = Uuid::new_v4();
        let mut products = vec![window(a, -1, 1)];
        let replacement = window(a, 2, 3);
        set_window(&mut products, replacement.clone());
        assert_eq!(products, vec![replacement]);
        set_window(&mut products, window(Uuid::new_v4(), 0, 1));
        assert_eq!(products.len(), 2);
    }

    #[test]
    fn activity_is_half_open() {
        let w = window(Uuid::new_v4(), 0, 1);
        assert!(w.is_active_at(w.start_date));
        assert!(!w.is_active_at(w.end_date));
        let list = vec![w.clone(), window(Uuid::new_v4(), 2, 3)];
        assert_eq!(active_windows(&list, w.start_date).len(), 1);
    }

    #[test]
    fn inverted_window_rejected() {
        assert!(window(Uuid::new_v4(), 2, 1).check().is_err());
        assert!(window(Uuid::new_v4(), 1, 1).check().is_err());
        assert!(window(Uuid::new_v4(), 1, 2).check().is_ok());
    }

    #[test]
    fn remove_reports_whether_anything_changed() {
        let a = Uuid::new_v4();
        let mut products = vec![window(a, 0, 1)];
        assert!(!remove_product(&mut products, Uuid::new_v4()));
        assert!(remove_product(&mut products, a));
        assert!(products.is_empty());
    }
}
