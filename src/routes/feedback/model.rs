use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, PgPool};
use uuid::Uuid;
use validator::Validate;

#[derive(Debug, Deserialize, Validate)]
pub struct FeedbackRequest {
    pub product_id: Uuid,
    #[validate(length(min = 1, max = 2000, message = "message must be 1-2000 characters"))]
    pub message: String,
    #[validate(range(min = 1, max = 5, message = "rating must be between 1 and 5"))]
    pub rating: Option<i16>,
}

#[derive(Debug, Clone, Serialize, FromRow)]
pub struct Feedback {
    pub id: Uuid,
    pub user_id: Uuid,
    pub product_id: Uuid,
    pub message: String,
    pub rating: Option<i16>,
    pub response: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// Feedback joined with the author's and product's display names.
#[derive(Debug, Clone, Serialize, FromRow)]
pub struct FeedbackEntry {
    #[sqlx(flatten)]
    #[serde(flatten)]
    pub feedback: Feedback,
    pub user_name: String,
    pub product_name: String,
}

const ENTRY_SELECT: &str = r#"
    SELECT f.*, u.first_name || ' ' || u.last_name AS user_name, p.name AS product_name
    FROM feedback f
    JOIN users u ON u.id = f.user_id
    JOIN products p ON p.id = f.product_id
"#;

impl Feedback {
    pub async fn create(pool: &PgPool, user_id: Uuid, req: &FeedbackRequest) -> Result<Self, sqlx::Error> {
        sqlx::query_as::<_, Feedback>(
            r#"
            INSERT INTO feedback (id, user_id, product_id, message, rating)
            VALUES ($1, $2, $3, $4, $5)
            RETURNING *
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(user_id)
        .bind(req.product_id)
        .bind(req.message.trim())
        .bind(req.rating)
        .fetch_one(pool)
        .await
    }

    pub async fn by_product(pool: &PgPool, product_id: Uuid) -> Result<Vec<FeedbackEntry>, sqlx::Error> {
        sqlx::query_as::<_, FeedbackEntry>(&format!(
            "{ENTRY_SELECT} WHERE f.product_id = $1 ORDER BY f.created_at DESC"
        ))
        .bind(product_id)
        .fetch_all(pool)
        .await
    }

    pub async fn by_user(pool: &PgPool, user_id: Uuid) -> Result<Vec<FeedbackEntry>, sqlx::Error> {
        sqlx::query_as::<_, FeedbackEntry>(&format!(
            "{ENTRY_SELECT} WHERE f.user_id = $1 ORDER BY f.created_at DESC"
        ))
        .bind(user_id)
        .fetch_all(pool)
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rating_outside_range_rejected() {
        let req = FeedbackRequest {
            product_id: Uuid::new_v4(),
            message: "Great keyboard".into(),
            rating: Some(6),
        };
        assert!(req.validate().is_err());

        let req = FeedbackRequest {
            rating: None,
            ..req
        };
        assert!(req.validate().is_ok());
    }

    #[test]
    fn empty_message_rejected() {
        let req = FeedbackRequest {
            product_id: Uuid::new_v4(),
            message: String::new(),
            rating: Some(4),
        };
        assert!(req.validate().is_err());
    }
}
