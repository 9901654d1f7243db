use chrono::{DateTime, Utc};
use serde::Serialize;
use sqlx::{FromRow, PgPool};
use uuid::Uuid;

#[derive(Debug, Clone, Serialize, FromRow)]
pub struct Banner {
    pub id: Uuid,
    pub image: Option<String>,
    pub offer_name: Option<String>,
    pub product_id: Option<Uuid>,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Default)]
pub struct BannerChanges {
    pub image: Option<String>,
    pub offer_name: Option<String>,
    pub product_id: Option<Uuid>,
    pub is_active: Option<bool>,
}

impl Banner {
    pub async fn create(
        pool: &PgPool,
        image: Option<String>,
        offer_name: Option<&str>,
        product_id: Option<Uuid>,
    ) -> Result<Self, sqlx::Error> {
        sqlx::query_as::<_, Banner>(
            r#"
            INSERT INTO banners (id, image, offer_name, product_id)
            VALUES ($1, $2, $3, $4)
            RETURNING *
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(image)
        .bind(offer_name)
        .bind(product_id)
        .fetch_one(pool)
        .await
    }

    pub async fn find(pool: &PgPool, id: Uuid) -> Result<Option<Self>, sqlx::Error> {
        sqlx::query_as::<_, Banner>("SELECT * FROM banners WHERE id = $1")
            .bind(id)
            .fetch_optional(pool)
            .await
    }

    pub async fn list_active(pool: &PgPool) -> Result<Vec<Self>, sqlx::Error> {
        sqlx::query_as::<_, Banner>("SELECT * FROM banners WHERE is_active ORDER BY created_at DESC")
            .fetch_all(pool)
            .await
    }

    pub async fn update(pool: &PgPool, id: Uuid, changes: BannerChanges) -> Result<Option<Self>, sqlx::Error> {
        sqlx::query_as::<_, Banner>(
            r#"
            UPDATE banners SET
                image = COALESCE($2, image),
                offer_name = COALESCE($3, offer_name),
                product_id = COALESCE($4, product_id),
                is_active = COALESCE($5, is_active)
            WHERE id = $1
            RETURNING *
            "#,
        )
        .bind(id)
        .bind(changes.image)
        .bind(changes.offer_name)
        .bind(changes.product_id)
        .bind(changes.is_active)
        .fetch_optional(pool)
        .await
    }

    pub async fn delete(pool: &PgPool, id: Uuid) -> Result<bool, sqlx::Error> {
        let result = sqlx::query("DELETE FROM banners WHERE id = $1")
            .bind(id)
            .execute(pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }
}
