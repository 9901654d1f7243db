use sqlx::PgPool;
use uuid::Uuid;

pub async fn products(pool: &PgPool, user_id: Uuid) -> Result<Vec<Uuid>, sqlx::Error> {
    Ok(
        sqlx::query_scalar::<_, Vec<Uuid>>("SELECT products FROM wishlists WHERE user_id = $1")
            .bind(user_id)
            .fetch_optional(pool)
            .await?
            .unwrap_or_default(),
    )
}

/// Atomic add; a product already present is left in place.
pub async fn add(pool: &PgPool, user_id: Uuid, product_id: Uuid) -> Result<Vec<Uuid>, sqlx::Error> {
    sqlx::query_scalar::<_, Vec<Uuid>>(
        r#"
        INSERT INTO wishlists (user_id, products)
        VALUES ($1, ARRAY[$2]::uuid[])
        ON CONFLICT (user_id) DO UPDATE
        SET products = CASE
                WHEN $2 = ANY(wishlists.products) THEN wishlists.products
                ELSE array_append(wishlists.products, $2)
            END,
            updated_at = NOW()
        RETURNING products
        "#,
    )
    .bind(user_id)
    .bind(product_id)
    .fetch_one(pool)
    .await
}

pub async fn remove(pool: &PgPool, user_id: Uuid, product_id: Uuid) -> Result<Option<Vec<Uuid>>, sqlx::Error> {
    sqlx::query_scalar::<_, Vec<Uuid>>(
        r#"
        UPDATE wishlists
        SET products = array_remove(products, $2), updated_at = NOW()
        WHERE user_id = $1
        RETURNING products
        "#,
    )
    .bind(user_id)
    .bind(product_id)
    .fetch_optional(pool)
    .await
}

pub async fn contains(pool: &PgPool, user_id: Uuid, product_id: Uuid) -> Result<bool, sqlx::Error> {
    sqlx::query_scalar::<_, bool>(
        "SELECT EXISTS(SELECT 1 FROM wishlists WHERE user_id = $1 AND $2 = ANY(products))",
    )
    .bind(user_id)
    .bind(product_id)
    .fetch_one(pool)
    .await
}

pub async fn clear(pool: &PgPool, user_id: Uuid) -> Result<u64, sqlx::Error> {
    let result = sqlx::query("DELETE FROM wishlists WHERE user_id = $1")
        .bind(user_id)
        .execute(pool)
        .await?;
    Ok(result.rows_affected())
}
