use sqlx::PgPool;
use uuid::Uuid;

pub const RECENTLY_VIEWED_LIMIT: usize = 10;

/// Move `product_id` to the front, dropping older duplicates and the tail past the limit.
pub fn record_view(products: &mut Vec<Uuid>, product_id: Uuid) {
    products.retain(|id| *id != product_id);
    products.insert(0, product_id);
    products.truncate(RECENTLY_VIEWED_LIMIT);
}

pub async fn load(pool: &PgPool, user_id: Uuid) -> Result<Vec<Uuid>, sqlx::Error> {
    Ok(
        sqlx::query_scalar::<_, Vec<Uuid>>("SELECT products FROM recently_viewed WHERE user_id = $1")
            .bind(user_id)
            .fetch_optional(pool)
            .await?
            .unwrap_or_default(),
    )
}

/// Record a view under a row lock so concurrent views never lose each other.
pub async fn save(pool: &PgPool, user_id: Uuid, product_id: Uuid) -> Result<Vec<Uuid>, sqlx::Error> {
    let mut tx = pool.begin().await?;

    sqlx::query("INSERT INTO recently_viewed (user_id) VALUES ($1) ON CONFLICT (user_id) DO NOTHING")
        .bind(user_id)
        .execute(&mut *tx)
        .await?;
    let mut products = sqlx::query_scalar::<_, Vec<Uuid>>(
        "SELECT products FROM recently_viewed WHERE user_id = $1 FOR UPDATE",
    )
    .bind(user_id)
    .fetch_one(&mut *tx)
    .await?;

    record_view(&mut products, product_id);

    sqlx::query("UPDATE recently_viewed SET products = $2, updated_at = NOW() WHERE user_id = $1")
        .bind(user_id)
        .bind(&products)
        .execute(&mut *tx)
        .await?;
    tx.commit().await?;

    Ok(products)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn re_view_moves_to_front_without_duplicates() {
        let a = Uuid::new_v4();
        let b = Uuid::new_v4();
        let mut list = Vec::new();
        record_view(&mut list, a);
        record_view(&mut list, b);
        record_view(&mut list, a);
        assert_eq!(list, vec![a, b]);
    }

    #[test]
    fn list_is_capped() {
        let mut list = Vec::new();
        let ids: Vec<Uuid> = (0..15).map(|_| Uuid::new_v4()).collect();
        for id in &ids {
            record_view(&mut list, *id);
        }
        assert_eq!(list.len(), RECENTLY_VIEWED_LIMIT);
        assert_eq!(list[0], ids[14]);
        assert!(!list.contains(&ids[0]));
    }
}
