use std::sync::Arc;

use chrono::{DateTime, Utc};
use redis::{AsyncCommands, Client as RedisClient};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::keys::{BUY_NOW_TTL_SECS, buy_now_key};

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct BuyNowItem {
    pub product_id: Uuid,
    pub quantity: i32,
    pub price: Decimal,
}

/// Single-product checkout kept outside the cart.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct BuyNowSession {
    pub session_id: String,
    pub user_id: Uuid,
    pub items: Vec<BuyNowItem>,
    pub total_items: i32,
    pub total_price: Decimal,
    pub created_at: DateTime<Utc>,
}

impl BuyNowSession {
    pub fn new(user_id: Uuid, product_id: Uuid, quantity: i32, price: Decimal) -> Self {
        Self {
            session_id: Uuid::new_v4().to_string(),
            user_id,
            items: vec![BuyNowItem {
                product_id,
                quantity,
                price,
            }],
            total_items: quantity,
            total_price: price * Decimal::from(quantity),
            created_at: Utc::now(),
        }
    }
}

pub struct BuyNowCacheOperations;

impl BuyNowCacheOperations {
    pub async fn save(redis: &Arc<RedisClient>, session: &BuyNowSession) -> Result<(), redis::RedisError> {
        let mut conn = redis.get_multiplexed_async_connection().await?;

        let json = serde_json::to_string(session).map_err(|e| {
            redis::RedisError::from((redis::ErrorKind::IoError, "Serialization error", e.to_string()))
        })?;

        let _: () = conn
            .set_ex(buy_now_key(&session.session_id), json, BUY_NOW_TTL_SECS)
            .await?;
        Ok(())
    }

    pub async fn get(redis: &Arc<RedisClient>, session_id: &str) -> Result<Option<BuyNowSession>, redis::RedisError> {
        let mut conn = redis.get_multiplexed_async_connection().await?;

        let result: Option<String> = conn.get(buy_now_key(session_id)).await?;
        match result {
            Some(json) => {
                let session = serde_json::from_str(&json).map_err(|e| {
                    redis::RedisError::from((redis::ErrorKind::IoError, "Deserialization error", e.to_string()))
                })?;
                Ok(Some(session))
            }
            None => Ok(None),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn session_totals_follow_quantity() {
        let session = BuyNowSession::new(Uuid::new_v4(), Uuid::new_v4(), 3, Decimal::new(19999, 2));
        assert_eq!(session.total_items, 3);
        assert_eq!(session.total_price, Decimal::new(59997, 2));
        assert_eq!(session.items.len(), 1);
    }

    #[test]
    fn session_survives_json() {
        let session = BuyNowSession::new(Uuid::new_v4(), Uuid::new_v4(), 1, Decimal::new(500, 0));
        let json = serde_json::to_string(&session).unwrap();
        let back: BuyNowSession = serde_json::from_str(&json).unwrap();
        assert_eq!(back, session);
    }
}
